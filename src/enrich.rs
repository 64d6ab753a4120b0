/// Detail enrichment
///
/// Resolves each candidate into contact and address metadata:
/// 1. Look up place details, one candidate at a time, paced
/// 2. Pick region and department out of the address components
/// 3. Normalise the phone number and build the directory link
///
/// A failed lookup drops that candidate only.
use crate::config::Pacing;
use crate::errors::AppError;
use crate::models::{Candidate, EnrichedCandidate};
use crate::places::{AddressComponent, PlaceDetails, PlacesApi};
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use url::Url;

/// Placeholder when the detail service has no name.
pub const UNKNOWN_NAME: &str = "Non dispo";

const REGION_TYPE: &str = "administrative_area_level_1";
const DEPARTMENT_TYPE: &str = "administrative_area_level_2";
const DIRECTORY_SEARCH_URL: &str = "https://www.pagesjaunes.fr/recherche";

/// A candidate whose detail lookup failed.
#[derive(Debug, Clone)]
pub struct LookupFailure {
    pub external_id: String,
    pub error: AppError,
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
    pub enriched: Vec<EnrichedCandidate>,
    pub failures: Vec<LookupFailure>,
}

fn first_of_type<'a>(components: &'a [AddressComponent], kind: &str) -> Option<&'a AddressComponent> {
    components.iter().find(|c| c.types.iter().any(|t| t == kind))
}

fn trimmed(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

/// (region, department) from structured address components. Either may be absent.
pub fn admin_divisions(components: &[AddressComponent]) -> (Option<String>, Option<String>) {
    (
        first_of_type(components, REGION_TYPE).and_then(|c| trimmed(&c.long_name)),
        first_of_type(components, DEPARTMENT_TYPE).and_then(|c| trimmed(&c.long_name)),
    )
}

/// Department code (`short_name` of the second-level division), if it looks like one.
pub fn department_code(components: &[AddressComponent]) -> Option<String> {
    first_of_type(components, DEPARTMENT_TYPE)
        .and_then(|c| trimmed(&c.short_name))
        .filter(|code| crate::territory::is_known_department(code))
}

/// Directory search link for a business name, the name percent-encoded as one path segment.
pub fn directory_link(display_name: &str) -> String {
    let mut url = match Url::parse(DIRECTORY_SEARCH_URL) {
        Ok(url) => url,
        Err(_) => return DIRECTORY_SEARCH_URL.to_string(),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(display_name.trim());
    }
    url.to_string()
}

/// E.164 form of a French number when valid, the trimmed input otherwise.
pub fn normalize_phone(raw: &str) -> String {
    match phonenumber::parse(Some(CountryId::FR), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            number.format().mode(Mode::E164).to_string()
        }
        _ => {
            tracing::debug!("Keeping phone as given: {}", raw);
            raw.trim().to_string()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Layers place details on top of a candidate.
pub fn enrich_candidate(candidate: &Candidate, details: PlaceDetails) -> EnrichedCandidate {
    let (region, department) = admin_divisions(&details.address_components);
    let department_code = department_code(&details.address_components);
    let display_name =
        non_empty(details.display_name).unwrap_or_else(|| UNKNOWN_NAME.to_string());
    let directory_link = directory_link(&display_name);

    EnrichedCandidate {
        candidate: candidate.clone(),
        phone: non_empty(details.phone).map(|p| normalize_phone(&p)),
        website: non_empty(details.website),
        map_link: non_empty(details.map_link),
        directory_link,
        display_name,
        region,
        department,
        department_code,
    }
}

/// Enriches every candidate, sequentially, waiting `pacing.detail_delay`
/// between lookups.
///
/// Per-candidate failures are logged and collected. A rejected credential,
/// or every lookup failing, is returned as an error.
pub async fn enrich_candidates<P: PlacesApi + ?Sized>(
    api: &P,
    candidates: &[Candidate],
    pacing: &Pacing,
) -> Result<EnrichmentOutcome, AppError> {
    let total = candidates.len();
    let mut outcome = EnrichmentOutcome {
        enriched: Vec::with_capacity(total),
        failures: Vec::new(),
    };

    tracing::info!("Enriching {} candidate(s)", total);

    for (idx, candidate) in candidates.iter().enumerate() {
        match api.place_details(&candidate.external_id).await {
            Ok(details) => outcome.enriched.push(enrich_candidate(candidate, details)),
            Err(e) if e.is_fatal() => {
                tracing::error!("Enrichment aborted: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("✗ Place details failed ({}): {}", candidate.external_id, e);
                outcome.failures.push(LookupFailure {
                    external_id: candidate.external_id.clone(),
                    error: e,
                });
            }
        }

        // Rate limiting between lookups
        if idx + 1 < total {
            tokio::time::sleep(pacing.detail_delay).await;
        }
    }

    if total > 0 && outcome.failures.len() == total {
        return Err(AppError::ExternalApiError(format!(
            "All {} detail lookups failed",
            total
        )));
    }

    tracing::info!(
        "Enriched {} of {} candidate(s)",
        outcome.enriched.len(),
        total
    );
    Ok(outcome)
}
