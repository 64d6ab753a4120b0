use crate::footprint::Footprint;
use serde::{Deserialize, Serialize};

// ============ Pipeline Entities ============

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A discovered place. Identity is `external_id`, whichever search path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable upstream identifier (Google `place_id`).
    pub external_id: String,
    pub coordinate: Coordinate,
}

/// A candidate with contact metadata layered on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCandidate {
    pub candidate: Candidate,
    pub display_name: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub map_link: Option<String>,
    pub directory_link: String,
    /// First-level administrative division, when the address carries one.
    pub region: Option<String>,
    /// Second-level administrative division, when the address carries one.
    pub department: Option<String>,
    /// Short form of `department`, the zero-padded code (`44`).
    pub department_code: Option<String>,
}

impl EnrichedCandidate {
    pub fn external_id(&self) -> &str {
        &self.candidate.external_id
    }

    pub fn coordinate(&self) -> Coordinate {
        self.candidate.coordinate
    }
}

/// Geometry attached to a lead: the merged footprint, or the bare point as fallback.
#[derive(Debug, Clone)]
pub enum LeadGeometry {
    Footprint(Footprint),
    Point(Coordinate),
}

impl LeadGeometry {
    /// Where a map marker for this geometry goes.
    pub fn marker(&self) -> Coordinate {
        match self {
            LeadGeometry::Footprint(footprint) => footprint.centroid(),
            LeadGeometry::Point(point) => *point,
        }
    }

    /// Well-known-text serialization.
    pub fn wkt(&self) -> String {
        match self {
            LeadGeometry::Footprint(footprint) => footprint.wkt(),
            LeadGeometry::Point(point) => crate::export::point_wkt(*point),
        }
    }
}

/// A fully enriched, footprint-resolved candidate.
#[derive(Debug, Clone)]
pub struct Lead {
    pub enriched: EnrichedCandidate,
    pub geometry: LeadGeometry,
    /// Zero when no footprint was found.
    pub area_m2: f64,
}

impl Lead {
    pub fn new(enriched: EnrichedCandidate, footprint: Option<Footprint>, area_m2: f64) -> Self {
        let geometry = match footprint {
            Some(footprint) => LeadGeometry::Footprint(footprint),
            None => LeadGeometry::Point(enriched.coordinate()),
        };
        Self {
            enriched,
            geometry,
            area_m2,
        }
    }

    pub fn has_footprint(&self) -> bool {
        matches!(self.geometry, LeadGeometry::Footprint(_))
    }
}

/// Geographic restriction applied to one search invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "areas", rename_all = "snake_case")]
pub enum SearchScope {
    /// Whole territory, optionally sampled with the grid.
    Territory,
    Regions(Vec<String>),
    Departments(Vec<String>),
}

impl SearchScope {
    /// Departments win over regions when both are supplied.
    pub fn from_filters(regions: &[String], departments: &[String]) -> Self {
        let departments = non_blank(departments);
        if !departments.is_empty() {
            return SearchScope::Departments(departments);
        }
        let regions = non_blank(regions);
        if !regions.is_empty() {
            return SearchScope::Regions(regions);
        }
        SearchScope::Territory
    }

    /// Named areas to query, empty for the whole territory.
    pub fn areas(&self) -> &[String] {
        match self {
            SearchScope::Territory => &[],
            SearchScope::Regions(areas) | SearchScope::Departments(areas) => areas,
        }
    }
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// Preset site categories and the search keyword each maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteCategory {
    ColdStorage,
    ChargingStations,
    Offices,
    RealEstateFunds,
}

impl SiteCategory {
    pub const ALL: [SiteCategory; 4] = [
        SiteCategory::ColdStorage,
        SiteCategory::ChargingStations,
        SiteCategory::Offices,
        SiteCategory::RealEstateFunds,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            SiteCategory::ColdStorage => "entrepôt frigorifique",
            SiteCategory::ChargingStations => "station de recharge véhicule électrique",
            SiteCategory::Offices => "bureau",
            SiteCategory::RealEstateFunds => "fonds immobilier",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SiteCategory::ColdStorage => "Entrepôts frigorifiques",
            SiteCategory::ChargingStations => "Bornes de recharge",
            SiteCategory::Offices => "Bureaux",
            SiteCategory::RealEstateFunds => "Fonds immobiliers",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "cold_storage" => Some(SiteCategory::ColdStorage),
            "charging_stations" => Some(SiteCategory::ChargingStations),
            "offices" => Some(SiteCategory::Offices),
            "real_estate_funds" => Some(SiteCategory::RealEstateFunds),
            _ => None,
        }
    }
}

// ============ API Models ============

/// Body of `/api/v1/leads/search`, `/api/v1/leads/export` and `/api/v1/leads/estimate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadSearchRequest {
    /// Free keyword. Takes precedence over `category`.
    pub keyword: Option<String>,
    pub category: Option<SiteCategory>,
    /// Regions to scope the search to.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Department codes to scope the search to. Win over `regions`.
    #[serde(default)]
    pub departments: Vec<String>,
    /// Sample the whole territory with the grid instead of one text query.
    #[serde(default)]
    pub use_grid: bool,
    /// Overrides the configured minimum area.
    pub min_area_m2: Option<f64>,
    /// Keep only leads whose resolved region is listed.
    #[serde(default)]
    pub region_filter: Vec<String>,
    /// Keep only leads whose resolved department is listed.
    #[serde(default)]
    pub department_filter: Vec<String>,
}

impl LeadSearchRequest {
    /// Keyword to search for, from the free text or the preset category.
    pub fn resolved_keyword(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .or_else(|| self.category.map(|c| c.keyword().to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetEstimateResponse {
    /// Calls the planned run would make.
    pub estimated_calls: usize,
    /// Calls a full-territory grid run would make.
    pub grid_estimate: usize,
    pub ceiling: usize,
    pub within_budget: bool,
}

/// JSON view of a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadSummary {
    pub external_id: String,
    pub display_name: String,
    pub region: Option<String>,
    pub department: Option<String>,
    pub department_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub area_m2: f64,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub map_link: Option<String>,
    pub directory_link: String,
    pub marker: Coordinate,
    pub wkt: String,
}

impl From<&Lead> for LeadSummary {
    fn from(lead: &Lead) -> Self {
        let enriched = &lead.enriched;
        Self {
            external_id: enriched.external_id().to_string(),
            display_name: enriched.display_name.clone(),
            region: enriched.region.clone(),
            department: enriched.department.clone(),
            department_code: enriched.department_code.clone(),
            latitude: enriched.candidate.coordinate.latitude,
            longitude: enriched.candidate.coordinate.longitude,
            area_m2: lead.area_m2,
            phone: enriched.phone.clone(),
            website: enriched.website.clone(),
            map_link: enriched.map_link.clone(),
            directory_link: enriched.directory_link.clone(),
            marker: lead.geometry.marker(),
            wkt: lead.geometry.wkt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadSearchResponse {
    pub run_id: uuid::Uuid,
    pub keyword: String,
    pub found: usize,
    /// Queries and lookups that failed and were left out.
    pub failed_lookups: usize,
    /// True when some upstream call failed, so `leads` may be incomplete.
    pub partial: bool,
    pub estimated_calls: usize,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub leads: Vec<LeadSummary>,
}
