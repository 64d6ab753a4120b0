//! Footprint Leads Library
//!
//! Finds large commercial sites for a keyword: candidate search over a
//! territory, contact enrichment, building footprint resolution from
//! OpenStreetMap, area estimation and filtering.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core pipeline logic.
//! - `integrations`: External service integrations.
//! - `aggregate`: Area threshold and region/department filters.
//! - `area`: Planar area estimation.
//! - `budget`: Upstream call forecast and ceiling.
//! - `config`: Configuration management.
//! - `enrich`: Place detail enrichment.
//! - `errors`: Error handling types.
//! - `export`: CSV export.
//! - `footprint`: Outline validation, merging and footprint lookup.
//! - `grid`: Territory sampling grid.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `overpass`: OpenStreetMap building client.
//! - `pipeline`: One end-to-end run.
//! - `places`: Google Places client.
//! - `search`: Candidate discovery.
//! - `territory`: Regions and department codes.

pub mod api;
pub mod core;
pub mod integrations;

pub mod aggregate;
pub mod area;
pub mod budget;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod export;
pub mod footprint;
pub mod grid;
pub mod handlers;
pub mod models;
pub mod overpass;
pub mod pipeline;
pub mod places;
pub mod search;
pub mod territory;
