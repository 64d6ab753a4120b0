use crate::errors::AppError;
use crate::footprint::BuildingSource;
use crate::models::Coordinate;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Server-side query timeout, in seconds.
const QUERY_TIMEOUT_SECS: u32 = 25;

/// Overpass QL for building ways around a point, with inline geometry.
pub fn building_query(at: Coordinate, radius_m: u32) -> String {
    format!(
        "[out:json][timeout:{}];\nway(around:{},{},{})[building];\nout body geom;",
        QUERY_TIMEOUT_SECS, radius_m, at.latitude, at.longitude
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<RawElement>,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: u64,
    geometry: Option<Vec<Option<RawPosition>>>,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    lat: Option<f64>,
    lon: Option<f64>,
}

impl RawElement {
    /// Vertex ring of a way, `None` unless every vertex is present.
    fn into_ring(self) -> Option<Vec<Coordinate>> {
        if self.kind != "way" {
            return None;
        }
        self.geometry?
            .into_iter()
            .map(|p| {
                let p = p?;
                Some(Coordinate::new(p.lat?, p.lon?))
            })
            .collect()
    }
}

/// Client for an Overpass API interpreter endpoint.
#[derive(Clone)]
pub struct OverpassClient {
    client: Client,
    url: String,
}

impl OverpassClient {
    /// Creates a new `OverpassClient`.
    ///
    /// # Arguments
    ///
    /// * `url` - Interpreter URL, e.g. `https://overpass-api.de/api/interpreter`.
    pub fn new(url: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(QUERY_TIMEOUT_SECS) + 5))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Overpass client: {}", e))
            })?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl BuildingSource for OverpassClient {
    async fn building_outlines(
        &self,
        at: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<Vec<Coordinate>>, AppError> {
        let query = building_query(at, radius_m);
        tracing::debug!(
            "Overpass: buildings within {}m of ({}, {})",
            radius_m,
            at.latitude,
            at.longitude
        );

        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Overpass request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Overpass returned {}: {}",
                status, error_text
            )));
        }

        let body: OverpassResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Overpass response: {}", e))
        })?;

        let total = body.elements.len();
        let rings: Vec<Vec<Coordinate>> = body
            .elements
            .into_iter()
            .filter_map(|element| {
                let id = element.id;
                let ring = element.into_ring();
                if ring.is_none() {
                    tracing::debug!("Overpass element {} has no usable geometry", id);
                }
                ring
            })
            .collect();

        tracing::debug!("Overpass: {} of {} elements usable", rings.len(), total);
        Ok(rings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_text() {
        let q = building_query(Coordinate::new(48.8566, 2.3522), 50);
        assert_eq!(
            q,
            "[out:json][timeout:25];\nway(around:50,48.8566,2.3522)[building];\nout body geom;"
        );
    }

    #[test]
    fn test_parse_elements() {
        let raw = serde_json::json!({
            "elements": [
                {"type": "way", "id": 1, "geometry": [
                    {"lat": 48.0, "lon": 2.0}, {"lat": 48.0, "lon": 2.001},
                    {"lat": 48.001, "lon": 2.001}, {"lat": 48.0, "lon": 2.0}
                ]},
                {"type": "way", "id": 2, "geometry": [{"lat": 48.0}, null]},
                {"type": "node", "id": 3, "lat": 48.0, "lon": 2.0},
                {"type": "way", "id": 4}
            ]
        });
        let body: OverpassResponse = serde_json::from_value(raw).unwrap();
        let rings: Vec<_> = body
            .elements
            .into_iter()
            .filter_map(RawElement::into_ring)
            .collect();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 4);
        assert_eq!(rings[0][1], Coordinate::new(48.0, 2.001));
    }
}
