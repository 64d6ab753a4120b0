/// Lead pipeline
///
/// One run, strictly forward:
/// 1. Forecast the call volume and refuse the run above the ceiling
/// 2. Search candidates (scoped text queries, grid, or one territory query)
/// 3. Enrich each candidate with contact and address metadata
/// 4. Resolve footprints, estimate areas, apply threshold and filters
///
/// Nothing is kept between runs; the footprint cache lives and dies with one run.
use crate::aggregate::{aggregate_leads, LeadFilter};
use crate::budget::{ensure_within_budget, estimate_api_calls, planned_points};
use crate::config::{Config, Pacing};
use crate::enrich::enrich_candidates;
use crate::errors::AppError;
use crate::footprint::{BuildingSource, FootprintLookup, FootprintResolver};
use crate::grid::Grid;
use crate::models::{Lead, LeadSearchRequest, LeadSearchResponse, LeadSummary, SearchScope};
use crate::overpass::OverpassClient;
use crate::places::{GooglePlacesClient, PlacesApi};
use crate::search::{search_candidates, SearchSettings};
use crate::territory;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Everything the operator chooses for one run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub keyword: String,
    pub scope: SearchScope,
    /// Sample the territory with the grid. Ignored for region/department scopes.
    pub use_grid: bool,
    pub min_area_m2: f64,
    pub filter: LeadFilter,
}

impl RunParams {
    /// Validates an API request and fills in the configured defaults.
    pub fn from_request(request: &LeadSearchRequest, default_min_area: f64) -> Result<Self, AppError> {
        let keyword = request.resolved_keyword().ok_or_else(|| {
            AppError::BadRequest("Enter a keyword or pick a category to start".to_string())
        })?;

        let bad_regions = territory::unknown(&request.regions, territory::is_known_region);
        if !bad_regions.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Unknown region(s): {}",
                bad_regions.join(", ")
            )));
        }
        let bad_departments =
            territory::unknown(&request.departments, territory::is_known_department);
        if !bad_departments.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Unknown department code(s): {}",
                bad_departments.join(", ")
            )));
        }

        let min_area_m2 = request.min_area_m2.unwrap_or(default_min_area);
        if !min_area_m2.is_finite() || min_area_m2 < 0.0 {
            return Err(AppError::BadRequest(
                "min_area_m2 must be a non-negative number".to_string(),
            ));
        }

        Ok(Self {
            keyword,
            scope: SearchScope::from_filters(&request.regions, &request.departments),
            use_grid: request.use_grid,
            min_area_m2,
            filter: LeadFilter::new(&request.region_filter, &request.department_filter),
        })
    }

    fn grid<'g>(&self, grid: &'g Grid) -> Option<&'g Grid> {
        (self.use_grid && self.scope == SearchScope::Territory).then_some(grid)
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub keyword: String,
    pub estimated_calls: usize,
    pub candidates_found: usize,
    pub failed_queries: usize,
    /// Detail and footprint lookups that failed; those candidates are missing.
    pub failed_lookups: usize,
    pub leads: Vec<Lead>,
    pub generated_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn found(&self) -> usize {
        self.leads.len()
    }

    pub fn is_partial(&self) -> bool {
        self.failed_queries > 0 || self.failed_lookups > 0
    }

    pub fn to_response(&self) -> LeadSearchResponse {
        LeadSearchResponse {
            run_id: self.run_id,
            keyword: self.keyword.clone(),
            found: self.found(),
            failed_lookups: self.failed_queries + self.failed_lookups,
            partial: self.is_partial(),
            estimated_calls: self.estimated_calls,
            generated_at: self.generated_at,
            leads: self.leads.iter().map(LeadSummary::from).collect(),
        }
    }
}

/// The wired pipeline: upstream clients plus run-independent settings.
#[derive(Clone)]
pub struct LeadPipeline {
    places: Arc<dyn PlacesApi>,
    buildings: Arc<dyn BuildingSource>,
    settings: SearchSettings,
    grid: Grid,
    footprint_radius_m: u32,
    call_budget: usize,
}

impl LeadPipeline {
    pub fn new(
        places: Arc<dyn PlacesApi>,
        buildings: Arc<dyn BuildingSource>,
        config: &Config,
    ) -> Self {
        Self {
            places,
            buildings,
            settings: SearchSettings {
                territory_name: config.territory_name.clone(),
                nearby_radius_m: config.nearby_radius_m,
                pacing: config.pacing,
            },
            grid: Grid::france(),
            footprint_radius_m: config.footprint_radius_m,
            call_budget: config.api_call_budget,
        }
    }

    /// Wires the Google Places and Overpass clients from configuration.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let places = GooglePlacesClient::new(
            config.places_base_url.clone(),
            config.google_api_key.clone(),
            config.search_language.clone(),
        )?;
        let buildings = OverpassClient::new(config.overpass_url.clone())?;
        Ok(Self::new(Arc::new(places), Arc::new(buildings), config))
    }

    pub fn with_grid(mut self, grid: Grid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.settings.pacing = pacing;
        self
    }

    pub fn call_budget(&self) -> usize {
        self.call_budget
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Calls a run with `params` would make, search plus one detail per point.
    pub fn estimate(&self, params: &RunParams) -> usize {
        estimate_api_calls(
            planned_points(&params.scope, params.grid(&self.grid)),
            true,
        )
    }

    /// Runs the pipeline once with a fresh footprint resolver.
    pub async fn run(&self, params: RunParams) -> Result<PipelineReport, AppError> {
        let resolver = FootprintResolver::new(self.buildings.clone(), self.footprint_radius_m);
        self.run_with(&resolver, params).await
    }

    /// Runs the pipeline once against the given footprint lookup.
    pub async fn run_with<F: FootprintLookup + ?Sized>(
        &self,
        footprints: &F,
        params: RunParams,
    ) -> Result<PipelineReport, AppError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("lead_run", %run_id, keyword = %params.keyword);
        self.execute(run_id, footprints, params).instrument(span).await
    }

    async fn execute<F: FootprintLookup + ?Sized>(
        &self,
        run_id: Uuid,
        footprints: &F,
        params: RunParams,
    ) -> Result<PipelineReport, AppError> {
        let estimated_calls = self.estimate(&params);
        ensure_within_budget(estimated_calls, self.call_budget)?;
        tracing::info!(
            "Run authorized: ~{} calls (budget {})",
            estimated_calls,
            self.call_budget
        );

        let search = search_candidates(
            self.places.as_ref(),
            &params.keyword,
            &params.scope,
            params.grid(&self.grid),
            &self.settings,
        )
        .await?;

        let enrichment = if search.candidates.is_empty() {
            Default::default()
        } else {
            enrich_candidates(
                self.places.as_ref(),
                &search.candidates,
                &self.settings.pacing,
            )
            .await?
        };

        let aggregation = aggregate_leads(
            footprints,
            enrichment.enriched,
            params.min_area_m2,
            &params.filter,
        )
        .await?;

        let report = PipelineReport {
            run_id,
            keyword: params.keyword,
            estimated_calls,
            candidates_found: search.candidates.len(),
            failed_queries: search.failed_queries,
            failed_lookups: enrichment.failures.len() + aggregation.failures.len(),
            leads: aggregation.leads,
            generated_at: Utc::now(),
        };

        if report.is_partial() {
            tracing::warn!(
                "{} leads found, results may be partial: {} failed queries, {} failed lookups",
                report.found(),
                report.failed_queries,
                report.failed_lookups
            );
        } else {
            tracing::info!("✓ {} leads found", report.found());
        }
        Ok(report)
    }
}
