/// Candidate discovery
///
/// Turns a keyword and a scope into the deduplicated set of candidates:
/// 1. Build one query per named area, per grid point, or a single territory query
/// 2. Follow each query's continuation tokens until exhausted
/// 3. Union the results, first occurrence of an `external_id` wins
use crate::config::Pacing;
use crate::errors::{AppError, ResultExt};
use crate::grid::Grid;
use crate::models::{Candidate, SearchScope};
use crate::places::{PlaceQuery, PlacesApi};
use std::collections::HashSet;

/// Settings shared by every query of one search.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Appended as `in {territory}` to a whole-territory text query.
    pub territory_name: String,
    /// Radius of each grid-point proximity query.
    pub nearby_radius_m: u32,
    pub pacing: Pacing,
}

/// Result of a search, with enough bookkeeping to tell a partial result apart.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub candidates: Vec<Candidate>,
    pub queries: usize,
    /// Queries whose contribution was dropped after an upstream failure.
    pub failed_queries: usize,
}

impl SearchOutcome {
    pub fn is_partial(&self) -> bool {
        self.failed_queries > 0
    }
}

/// Text of a scoped query: `{keyword} in {area}`.
pub fn scoped_query_text(keyword: &str, area: &str) -> String {
    format!("{} in {}", keyword.trim(), area.trim())
}

/// The queries a search over `scope` issues, in order.
pub fn plan_queries(
    keyword: &str,
    scope: &SearchScope,
    grid: Option<&Grid>,
    settings: &SearchSettings,
) -> Vec<PlaceQuery> {
    match (scope, grid) {
        (SearchScope::Territory, Some(grid)) => grid
            .points()
            .map(|location| PlaceQuery::Nearby {
                keyword: keyword.trim().to_string(),
                location,
                radius_m: settings.nearby_radius_m,
            })
            .collect(),
        (SearchScope::Territory, None) => vec![PlaceQuery::Text {
            query: scoped_query_text(keyword, &settings.territory_name),
        }],
        (SearchScope::Regions(areas), _) | (SearchScope::Departments(areas), _) => areas
            .iter()
            .map(|area| PlaceQuery::Text {
                query: scoped_query_text(keyword, area),
            })
            .collect(),
    }
}

/// Runs one query through its whole continuation chain.
///
/// The token is only valid after a short server-side warm-up, so the
/// configured delay is always waited out before it is used.
pub async fn run_query<P: PlacesApi + ?Sized>(
    api: &P,
    query: &PlaceQuery,
    pacing: &Pacing,
) -> Result<Vec<Candidate>, AppError> {
    let mut page = api
        .search_page(query, None)
        .await
        .with_context(|| format!("Search {}", query.describe()))?;
    let mut results = std::mem::take(&mut page.candidates);
    let mut pages = 1;

    while let Some(token) = page.next_page_token.take() {
        tokio::time::sleep(pacing.page_token_delay).await;
        page = api
            .search_page(query, Some(&token))
            .await
            .with_context(|| format!("Search {} page {}", query.describe(), pages + 1))?;
        results.append(&mut page.candidates);
        pages += 1;
    }

    tracing::debug!(
        "{}: {} results over {} page(s)",
        query.describe(),
        results.len(),
        pages
    );
    Ok(results)
}

/// Appends `batch` to `into`, skipping ids already seen.
pub fn merge_unique(
    into: &mut Vec<Candidate>,
    seen: &mut HashSet<String>,
    batch: Vec<Candidate>,
) -> usize {
    let before = into.len();
    for candidate in batch {
        if seen.insert(candidate.external_id.clone()) {
            into.push(candidate);
        }
    }
    into.len() - before
}

/// Deduplicates by `external_id`, keeping the first occurrence and the input order.
pub fn dedupe_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut unique = Vec::with_capacity(candidates.len());
    let mut seen = HashSet::new();
    merge_unique(&mut unique, &mut seen, candidates);
    unique
}

/// Searches `keyword` within `scope`.
///
/// A failing query drops only its own contribution and is counted in
/// `failed_queries`. A rejected credential, or every query failing, aborts
/// the search with an error.
pub async fn search_candidates<P: PlacesApi + ?Sized>(
    api: &P,
    keyword: &str,
    scope: &SearchScope,
    grid: Option<&Grid>,
    settings: &SearchSettings,
) -> Result<SearchOutcome, AppError> {
    if keyword.trim().is_empty() {
        return Err(AppError::BadRequest("Keyword cannot be empty".to_string()));
    }

    let queries = plan_queries(keyword, scope, grid, settings);
    tracing::info!(
        "Searching '{}' with {} quer{}",
        keyword,
        queries.len(),
        if queries.len() == 1 { "y" } else { "ies" }
    );

    let mut outcome = SearchOutcome {
        queries: queries.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut last_error = None;

    for query in &queries {
        match run_query(api, query, &settings.pacing).await {
            Ok(batch) => {
                let found = batch.len();
                let added = merge_unique(&mut outcome.candidates, &mut seen, batch);
                tracing::debug!("{}: {} new of {}", query.describe(), added, found);
            }
            Err(e) if e.is_fatal() => {
                tracing::error!("Search aborted: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("Query dropped: {}", e);
                outcome.failed_queries += 1;
                last_error = Some(e);
            }
        }
    }

    if outcome.queries > 0 && outcome.failed_queries == outcome.queries {
        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(AppError::ExternalApiError(format!(
            "All {} search queries failed, last error: {}",
            outcome.queries, cause
        )));
    }

    tracing::info!(
        "Found {} unique candidates ({} failed queries)",
        outcome.candidates.len(),
        outcome.failed_queries
    );
    Ok(outcome)
}
