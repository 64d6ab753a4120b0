//! Lead aggregation: footprint + area onto enriched candidates, then filters.

use crate::area::estimate_area_m2;
use crate::enrich::LookupFailure;
use crate::errors::AppError;
use crate::footprint::FootprintLookup;
use crate::models::{EnrichedCandidate, Lead};
use std::collections::HashSet;

/// Inclusive lower bound on area.
pub fn meets_threshold(area_m2: f64, min_area_m2: f64) -> bool {
    area_m2 >= min_area_m2
}

/// Optional post-hoc inclusion filters. An empty set lets everything through.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    regions: HashSet<String>,
    departments: HashSet<String>,
}

impl LeadFilter {
    pub fn new<R, D>(regions: R, departments: D) -> Self
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        fn collect<I>(values: I) -> HashSet<String>
        where
            I: IntoIterator,
            I::Item: AsRef<str>,
        {
            values
                .into_iter()
                .map(|v| v.as_ref().trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        }

        Self {
            regions: collect(regions),
            departments: collect(departments),
        }
    }

    pub fn is_open(&self) -> bool {
        self.regions.is_empty() && self.departments.is_empty()
    }

    /// A lead with no region fails a non-empty region filter; same for department.
    /// Departments match by name or by code.
    pub fn accepts(&self, lead: &Lead) -> bool {
        let listed = |set: &HashSet<String>, value: &Option<String>| {
            value.as_ref().is_some_and(|v| set.contains(v))
        };
        let e = &lead.enriched;
        (self.regions.is_empty() || listed(&self.regions, &e.region))
            && (self.departments.is_empty()
                || listed(&self.departments, &e.department)
                || listed(&self.departments, &e.department_code))
    }

    /// Keeps accepted leads, preserving order.
    pub fn apply(&self, leads: Vec<Lead>) -> Vec<Lead> {
        if self.is_open() {
            return leads;
        }
        leads.into_iter().filter(|lead| self.accepts(lead)).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregationOutcome {
    pub leads: Vec<Lead>,
    /// Leads that had enough area but were filtered out by region/department.
    pub filtered_out: usize,
    /// Candidates below the area threshold.
    pub below_threshold: usize,
    /// Candidates whose footprint lookup failed.
    pub failures: Vec<LookupFailure>,
}

/// Builds the lead set.
///
/// Candidates are processed in input order, so the output order is stable.
/// A failed footprint lookup drops that candidate and is reported in
/// `failures`; only a fatal error stops the aggregation.
pub async fn aggregate_leads<F: FootprintLookup + ?Sized>(
    footprints: &F,
    candidates: Vec<EnrichedCandidate>,
    min_area_m2: f64,
    filter: &LeadFilter,
) -> Result<AggregationOutcome, AppError> {
    let mut outcome = AggregationOutcome::default();
    let mut leads = Vec::new();
    let total = candidates.len();

    for enriched in candidates {
        let footprint = match footprints.footprint_at(enriched.coordinate()).await {
            Ok(footprint) => footprint,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "Footprint lookup failed for {}: {}",
                    enriched.external_id(),
                    e
                );
                outcome.failures.push(LookupFailure {
                    external_id: enriched.external_id().to_string(),
                    error: e,
                });
                continue;
            }
        };

        let area_m2 = estimate_area_m2(footprint.as_ref());
        if !meets_threshold(area_m2, min_area_m2) {
            tracing::debug!(
                "{} below threshold: {:.0} m² < {:.0} m²",
                enriched.external_id(),
                area_m2,
                min_area_m2
            );
            outcome.below_threshold += 1;
            continue;
        }
        leads.push(Lead::new(enriched, footprint, area_m2));
    }

    let kept = leads.len();
    outcome.leads = filter.apply(leads);
    outcome.filtered_out = kept - outcome.leads.len();

    tracing::info!(
        "{} lead(s) from {} candidate(s): {} below {} m², {} filtered, {} failed",
        outcome.leads.len(),
        total,
        outcome.below_threshold,
        min_area_m2,
        outcome.filtered_out,
        outcome.failures.len()
    );
    Ok(outcome)
}
