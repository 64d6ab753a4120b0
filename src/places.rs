use crate::errors::AppError;
use crate::models::{Candidate, Coordinate};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Fields requested from Place Details. Keeps the call in the basic+contact SKU.
const DETAIL_FIELDS: &str = "name,international_phone_number,website,url,address_component";

/// One logical search against the places service.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceQuery {
    /// Free text, e.g. `entrepôt frigorifique in Bretagne`.
    Text { query: String },
    /// Keyword around a point.
    Nearby {
        keyword: String,
        location: Coordinate,
        radius_m: u32,
    },
}

impl PlaceQuery {
    pub fn describe(&self) -> String {
        match self {
            PlaceQuery::Text { query } => format!("text '{}'", query),
            PlaceQuery::Nearby {
                keyword,
                location,
                radius_m,
            } => format!(
                "nearby '{}' at ({}, {}) r={}m",
                keyword, location.latitude, location.longitude, radius_m
            ),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub candidates: Vec<Candidate>,
    /// Present while more results remain.
    pub next_page_token: Option<String>,
}

/// Structured address part, tagged with its types.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Contact and address metadata of one place.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlaceDetails {
    #[serde(rename = "name")]
    pub display_name: Option<String>,
    #[serde(rename = "international_phone_number")]
    pub phone: Option<String>,
    pub website: Option<String>,
    #[serde(rename = "url")]
    pub map_link: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

/// Logical contract of the search and detail services.
#[async_trait]
pub trait PlacesApi: Send + Sync {
    /// Fetches one page. `page_token` continues a previous page of the same query.
    async fn search_page(
        &self,
        query: &PlaceQuery,
        page_token: Option<&str>,
    ) -> Result<SearchPage, AppError>;

    async fn place_details(&self, external_id: &str) -> Result<PlaceDetails, AppError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
    next_page_token: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    place_id: Option<String>,
    geometry: Option<PlaceGeometry>,
}

#[derive(Debug, Deserialize)]
struct PlaceGeometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<PlaceDetails>,
    error_message: Option<String>,
}

/// Maps a Places `status` to an error. `OK` and `ZERO_RESULTS` pass.
fn check_status(status: &str, error_message: Option<&str>, what: &str) -> Result<(), AppError> {
    let detail = error_message.unwrap_or("no error message");
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "REQUEST_DENIED" => Err(AppError::Unauthorized(format!(
            "{} denied: {}",
            what, detail
        ))),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(AppError::ExternalApiError(format!(
            "{} quota exhausted ({}): {}",
            what, status, detail
        ))),
        other => Err(AppError::ExternalApiError(format!(
            "{} returned status {}: {}",
            what, other, detail
        ))),
    }
}

/// Client for the Google Places web service.
#[derive(Clone)]
pub struct GooglePlacesClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl GooglePlacesClient {
    /// Creates a new `GooglePlacesClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the Places API, without trailing slash.
    /// * `api_key` - API key. Must not be blank.
    /// * `language` - Language code for results (`fr`).
    pub fn new(base_url: String, api_key: String, language: String) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigMissing(
                "Google Places API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Places client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            language,
        })
    }

    fn search_url(
        &self,
        query: &PlaceQuery,
        page_token: Option<&str>,
    ) -> Result<reqwest::Url, AppError> {
        let mut params: Vec<(&str, String)> = vec![
            ("key", self.api_key.clone()),
            ("language", self.language.clone()),
        ];
        let endpoint = match query {
            PlaceQuery::Text { query } => {
                params.push(("query", query.clone()));
                "textsearch"
            }
            PlaceQuery::Nearby {
                keyword,
                location,
                radius_m,
            } => {
                params.push((
                    "location",
                    format!("{},{}", location.latitude, location.longitude),
                ));
                params.push(("radius", radius_m.to_string()));
                params.push(("keyword", keyword.clone()));
                "nearbysearch"
            }
        };
        if let Some(token) = page_token {
            params.push(("pagetoken", token.to_string()));
        }

        reqwest::Url::parse_with_params(&format!("{}/{}/json", self.base_url, endpoint), &params)
            .map_err(|e| AppError::InternalError(format!("Failed to build Places URL: {}", e)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: reqwest::Url,
        what: &str,
    ) -> Result<T, AppError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("{} request failed: {}", what, e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "{} returned {}: {}",
                what, status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse {} response: {}", what, e))
        })
    }
}

#[async_trait]
impl PlacesApi for GooglePlacesClient {
    async fn search_page(
        &self,
        query: &PlaceQuery,
        page_token: Option<&str>,
    ) -> Result<SearchPage, AppError> {
        let url = self.search_url(query, page_token)?;
        // Redact key from logs
        tracing::debug!(
            "Places search: {} (continuation: {})",
            query.describe(),
            page_token.is_some()
        );

        let body: SearchResponse = self.get_json(url, "Places search").await?;
        check_status(&body.status, body.error_message.as_deref(), "Places search")?;

        let mut candidates = Vec::with_capacity(body.results.len());
        for result in body.results {
            match (result.place_id, result.geometry) {
                (Some(external_id), Some(geometry)) => candidates.push(Candidate {
                    external_id,
                    coordinate: Coordinate::new(geometry.location.lat, geometry.location.lng),
                }),
                (id, _) => {
                    tracing::warn!("Skipping search result without id or location: {:?}", id);
                }
            }
        }

        Ok(SearchPage {
            candidates,
            next_page_token: body.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn place_details(&self, external_id: &str) -> Result<PlaceDetails, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/details/json", self.base_url),
            &[
                ("key", self.api_key.as_str()),
                ("place_id", external_id),
                ("language", self.language.as_str()),
                ("fields", DETAIL_FIELDS),
            ],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build Places URL: {}", e)))?;

        tracing::debug!("Place details for {}", external_id);

        let body: DetailsResponse = self.get_json(url, "Place details").await?;
        check_status(&body.status, body.error_message.as_deref(), "Place details")?;

        body.result.ok_or_else(|| {
            AppError::ExternalApiError(format!("Place details for {} had no result", external_id))
        })
    }
}
