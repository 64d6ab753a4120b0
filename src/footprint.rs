//! Building footprint resolution.
//!
//! Outlines around a coordinate come from a [`BuildingSource`]. Each one is
//! checked on its own; a malformed outline is dropped with a debug line and
//! never reaches the caller. The survivors are merged with a geometric union,
//! so overlapping or adjoining buildings count once.

use crate::area::planar_area_m2;
use crate::errors::AppError;
use crate::models::Coordinate;
use async_trait::async_trait;
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BooleanOps, Centroid, Coord, Line, LineString, MultiPolygon, Polygon};
use moka::future::Cache;
use std::fmt;
use std::sync::Arc;
use wkt::ToWkt;

/// Search radius around a candidate, in meters.
pub const DEFAULT_FOOTPRINT_RADIUS_M: u32 = 50;

/// Merged ground plan of the buildings found near a coordinate.
///
/// Always has a strictly positive area.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub(crate) geometry: MultiPolygon<f64>,
    pub(crate) area_m2: f64,
    pub(crate) centroid: Coordinate,
}

impl Footprint {
    /// Wraps a merged geometry. `None` when it encloses no area.
    pub fn from_geometry(geometry: MultiPolygon<f64>) -> Option<Self> {
        let area_m2 = planar_area_m2(&geometry);
        if !area_m2.is_finite() || area_m2 <= 0.0 {
            return None;
        }
        let centroid = geometry.centroid()?;
        Some(Self {
            geometry,
            area_m2,
            centroid: Coordinate::new(centroid.y(), centroid.x()),
        })
    }

    /// Union of already validated outlines. `None` for an empty input.
    pub fn from_outlines(outlines: Vec<Polygon<f64>>) -> Option<Self> {
        merge_outlines(outlines).and_then(Self::from_geometry)
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn area_m2(&self) -> f64 {
        self.area_m2
    }

    pub fn centroid(&self) -> Coordinate {
        self.centroid
    }

    pub fn wkt(&self) -> String {
        self.geometry.wkt_string()
    }
}

/// Why an outline was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineDefect {
    TooFewVertices(usize),
    NotClosed,
    NonFinite,
    SelfIntersecting,
    ZeroArea,
}

impl fmt::Display for OutlineDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlineDefect::TooFewVertices(n) => write!(f, "only {} distinct vertices", n),
            OutlineDefect::NotClosed => write!(f, "ring is not closed"),
            OutlineDefect::NonFinite => write!(f, "non-finite coordinate"),
            OutlineDefect::SelfIntersecting => write!(f, "ring intersects itself"),
            OutlineDefect::ZeroArea => write!(f, "ring encloses no area"),
        }
    }
}

/// Turns a vertex sequence into a polygon (x = longitude, y = latitude) if it
/// is a closed, simple ring with positive area.
pub fn validate_outline(vertices: &[Coordinate]) -> Result<Polygon<f64>, OutlineDefect> {
    if vertices
        .iter()
        .any(|v| !v.latitude.is_finite() || !v.longitude.is_finite())
    {
        return Err(OutlineDefect::NonFinite);
    }

    let mut ring: Vec<Coord<f64>> = Vec::with_capacity(vertices.len());
    for v in vertices {
        let c = Coord {
            x: v.longitude,
            y: v.latitude,
        };
        if ring.last() != Some(&c) {
            ring.push(c);
        }
    }

    // A closed triangle is four coordinates, the last repeating the first
    if ring.len() < 4 {
        return Err(OutlineDefect::TooFewVertices(ring.len().saturating_sub(1)));
    }
    if ring.first() != ring.last() {
        return Err(OutlineDefect::NotClosed);
    }

    let edges: Vec<Line<f64>> = ring.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    if has_self_intersection(&edges) {
        return Err(OutlineDefect::SelfIntersecting);
    }

    let polygon = Polygon::new(LineString::new(ring), vec![]);
    if polygon.unsigned_area() <= 0.0 {
        return Err(OutlineDefect::ZeroArea);
    }
    Ok(polygon)
}

fn has_self_intersection(edges: &[Line<f64>]) -> bool {
    let n = edges.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                // neighbours meet at their shared vertex
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return true,
            }
        }
    }
    false
}

/// Geometric union of all outlines. `None` for an empty input.
pub fn merge_outlines(outlines: Vec<Polygon<f64>>) -> Option<MultiPolygon<f64>> {
    let mut outlines = outlines.into_iter();
    let first = MultiPolygon::new(vec![outlines.next()?]);
    let merged = outlines.fold(first, |acc, outline| {
        acc.union(&MultiPolygon::new(vec![outline]))
    });
    if merged.0.is_empty() {
        None
    } else {
        Some(merged)
    }
}

/// Source of raw building outlines around a point.
#[async_trait]
pub trait BuildingSource: Send + Sync {
    /// Vertex rings of the buildings within `radius_m` of `at`. May be empty.
    async fn building_outlines(
        &self,
        at: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<Vec<Coordinate>>, AppError>;
}

#[async_trait]
impl<T: BuildingSource + ?Sized> BuildingSource for Arc<T> {
    async fn building_outlines(
        &self,
        at: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<Vec<Coordinate>>, AppError> {
        (**self).building_outlines(at, radius_m).await
    }
}

/// Footprint of the building standing at a coordinate.
#[async_trait]
pub trait FootprintLookup: Send + Sync {
    /// `Ok(None)` when no valid building was found, which is routine.
    async fn footprint_at(&self, at: Coordinate) -> Result<Option<Footprint>, AppError>;
}

/// Resolves footprints from a [`BuildingSource`].
///
/// Lives for one run. Candidates sharing a coordinate share one lookup.
pub struct FootprintResolver<B> {
    source: B,
    radius_m: u32,
    cache: Cache<(u64, u64), Option<Footprint>>,
}

impl<B: BuildingSource> FootprintResolver<B> {
    pub fn new(source: B, radius_m: u32) -> Self {
        Self {
            source,
            radius_m,
            cache: Cache::builder().max_capacity(10_000).build(),
        }
    }

    pub fn radius_m(&self) -> u32 {
        self.radius_m
    }

    async fn resolve(&self, at: Coordinate) -> Result<Option<Footprint>, AppError> {
        let key = (at.latitude.to_bits(), at.longitude.to_bits());
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!(
                "Footprint cache hit for ({}, {})",
                at.latitude,
                at.longitude
            );
            return Ok(cached);
        }

        let rings = self.source.building_outlines(at, self.radius_m).await?;
        let total = rings.len();
        let outlines: Vec<Polygon<f64>> = rings
            .iter()
            .filter_map(|ring| match validate_outline(ring) {
                Ok(polygon) => Some(polygon),
                Err(defect) => {
                    tracing::debug!(
                        "Discarding building outline near ({}, {}): {}",
                        at.latitude,
                        at.longitude,
                        defect
                    );
                    None
                }
            })
            .collect();

        tracing::debug!(
            "{} of {} outlines valid near ({}, {})",
            outlines.len(),
            total,
            at.latitude,
            at.longitude
        );

        let footprint = Footprint::from_outlines(outlines);
        self.cache.insert(key, footprint.clone()).await;
        Ok(footprint)
    }
}

#[async_trait]
impl<B: BuildingSource> FootprintLookup for FootprintResolver<B> {
    async fn footprint_at(&self, at: Coordinate) -> Result<Option<Footprint>, AppError> {
        self.resolve(at).await
    }
}
