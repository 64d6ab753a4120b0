/// Integration tests with mocked external APIs
/// Runs the clients and the whole pipeline against wiremock servers
use footprint_leads::aggregate::LeadFilter;
use footprint_leads::config::{Config, Pacing};
use footprint_leads::enrich::enrich_candidates;
use footprint_leads::errors::AppError;
use footprint_leads::export::leads_to_csv;
use footprint_leads::footprint::{BuildingSource, FootprintLookup, FootprintResolver};
use footprint_leads::models::{Candidate, Coordinate, SearchScope};
use footprint_leads::overpass::OverpassClient;
use footprint_leads::pipeline::{LeadPipeline, RunParams};
use footprint_leads::places::{GooglePlacesClient, PlaceQuery, PlacesApi};
use footprint_leads::search::{search_candidates, SearchSettings};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(places_base_url: String, overpass_url: String) -> Config {
    Config {
        port: 0,
        google_api_key: "test_key".to_string(),
        places_base_url,
        overpass_url,
        search_language: "fr".to_string(),
        territory_name: "France".to_string(),
        min_area_m2: 10_000.0,
        api_call_budget: 5_000,
        footprint_radius_m: 50,
        nearby_radius_m: 40_000,
        pacing: Pacing::none(),
    }
}

fn places_client(server: &MockServer) -> GooglePlacesClient {
    GooglePlacesClient::new(server.uri(), "test_key".to_string(), "fr".to_string()).unwrap()
}

fn settings() -> SearchSettings {
    SearchSettings {
        territory_name: "France".to_string(),
        nearby_radius_m: 40_000,
        pacing: Pacing::none(),
    }
}

fn place(id: &str, lat: f64, lng: f64) -> serde_json::Value {
    json!({
        "place_id": id,
        "name": id,
        "geometry": { "location": { "lat": lat, "lng": lng } }
    })
}

fn details(name: &str) -> serde_json::Value {
    json!({
        "status": "OK",
        "result": {
            "name": name,
            "international_phone_number": "+33 2 40 00 00 00",
            "website": "https://example.fr",
            "url": "https://maps.google.com/?cid=42",
            "address_components": [
                { "long_name": "Nantes", "short_name": "Nantes", "types": ["locality", "political"] },
                { "long_name": "Loire-Atlantique", "short_name": "44", "types": ["administrative_area_level_2", "political"] },
                { "long_name": "Pays de la Loire", "short_name": "PDL", "types": ["administrative_area_level_1", "political"] }
            ]
        }
    })
}

/// Two 0.001° squares overlapping by half, plus elements that must be ignored.
fn overpass_buildings() -> serde_json::Value {
    json!({
        "version": 0.6,
        "elements": [
            { "type": "way", "id": 1, "geometry": [
                { "lat": 47.2, "lon": -1.55 }, { "lat": 47.2, "lon": -1.549 },
                { "lat": 47.201, "lon": -1.549 }, { "lat": 47.201, "lon": -1.55 },
                { "lat": 47.2, "lon": -1.55 }
            ]},
            { "type": "way", "id": 2, "geometry": [
                { "lat": 47.2, "lon": -1.5495 }, { "lat": 47.2, "lon": -1.5485 },
                { "lat": 47.201, "lon": -1.5485 }, { "lat": 47.201, "lon": -1.5495 },
                { "lat": 47.2, "lon": -1.5495 }
            ]},
            { "type": "way", "id": 3, "geometry": [
                { "lat": 47.3, "lon": -1.5 }, { "lat": 47.3, "lon": -1.4 },
                { "lat": 47.4, "lon": -1.4 }
            ]},
            { "type": "node", "id": 4, "lat": 47.2, "lon": -1.55 }
        ]
    })
}

// Union of the two squares: 1.5e-6 deg² at 111 km per degree
const MERGED_AREA_M2: f64 = 18_481.5;

#[tokio::test]
async fn test_text_search_follows_page_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .and(query_param("pagetoken", "next-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [place("b", 45.0, 4.0), place("a", 48.0, 2.0)]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .and(query_param("query", "entrepôt frigorifique in France"))
        .and(query_param("key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [place("a", 48.0, 2.0), { "place_id": "no-geometry" }],
            "next_page_token": "next-1"
        })))
        .mount(&mock_server)
        .await;

    let client = places_client(&mock_server);
    let outcome = search_candidates(
        &client,
        "entrepôt frigorifique",
        &SearchScope::Territory,
        None,
        &settings(),
    )
    .await
    .unwrap();

    let ids: Vec<_> = outcome
        .candidates
        .iter()
        .map(|c| c.external_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(outcome.candidates[1].coordinate, Coordinate::new(45.0, 4.0));
    assert!(!outcome.is_partial());
}

#[tokio::test]
async fn test_nearby_search_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/nearbysearch/json"))
        .and(query_param("location", "41,-5.5"))
        .and(query_param("radius", "40000"))
        .and(query_param("keyword", "bureau"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ZERO_RESULTS",
            "results": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = places_client(&mock_server);
    let page = client
        .search_page(
            &PlaceQuery::Nearby {
                keyword: "bureau".to_string(),
                location: Coordinate::new(41.0, -5.5),
                radius_m: 40_000,
            },
            None,
        )
        .await
        .unwrap();
    assert!(page.candidates.is_empty());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn test_denied_key_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        })))
        .mount(&mock_server)
        .await;

    let client = places_client(&mock_server);
    let error = search_candidates(
        &client,
        "bureau",
        &SearchScope::Regions(vec!["Bretagne".into(), "Corse".into()]),
        None,
        &settings(),
    )
    .await
    .unwrap_err();

    assert!(error.is_fatal());
    assert!(error.to_string().contains("API key is invalid"));
    // Aborted on the first query
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_server_error_drops_one_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .and(query_param("query", "bureau in Bretagne"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .and(query_param("query", "bureau in Corse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [place("ajaccio", 41.93, 8.74)]
        })))
        .mount(&mock_server)
        .await;

    let client = places_client(&mock_server);
    let outcome = search_candidates(
        &client,
        "bureau",
        &SearchScope::Regions(vec!["Bretagne".into(), "Corse".into()]),
        None,
        &settings(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.failed_queries, 1);
}

#[tokio::test]
async fn test_details_enrichment() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/details/json"))
        .and(query_param("place_id", "p1"))
        .and(query_param(
            "fields",
            "name,international_phone_number,website,url,address_component",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(details("Froid Atlantique")))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/details/json"))
        .and(query_param("place_id", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "NOT_FOUND"
        })))
        .mount(&mock_server)
        .await;

    let client = places_client(&mock_server);
    let candidates = vec![
        Candidate {
            external_id: "p1".to_string(),
            coordinate: Coordinate::new(47.2, -1.55),
        },
        Candidate {
            external_id: "p2".to_string(),
            coordinate: Coordinate::new(47.3, -1.5),
        },
    ];

    let outcome = enrich_candidates(&client, &candidates, &Pacing::none())
        .await
        .unwrap();

    assert_eq!(outcome.enriched.len(), 1);
    let enriched = &outcome.enriched[0];
    assert_eq!(enriched.display_name, "Froid Atlantique");
    assert_eq!(enriched.phone.as_deref(), Some("+33240000000"));
    assert_eq!(enriched.region.as_deref(), Some("Pays de la Loire"));
    assert_eq!(enriched.department.as_deref(), Some("Loire-Atlantique"));
    assert_eq!(
        enriched.directory_link,
        "https://www.pagesjaunes.fr/recherche/Froid%20Atlantique"
    );
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].external_id, "p2");
}

#[tokio::test]
async fn test_overpass_outlines_and_merged_footprint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/interpreter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(overpass_buildings()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = OverpassClient::new(format!("{}/api/interpreter", mock_server.uri())).unwrap();
    let at = Coordinate::new(47.2005, -1.5495);

    // The node is skipped; the open way is still handed over as a ring
    let rings = client.building_outlines(at, 50).await.unwrap();
    assert_eq!(rings.len(), 3);

    let resolver = FootprintResolver::new(client, 50);
    let footprint = resolver.footprint_at(at).await.unwrap().unwrap();
    assert!((footprint.area_m2() - MERGED_AREA_M2).abs() < 1.0);
    assert!(footprint.wkt().starts_with("MULTIPOLYGON"));

    // Same coordinate again comes from the cache
    let again = resolver.footprint_at(at).await.unwrap();
    assert_eq!(again, Some(footprint));
}

#[tokio::test]
async fn test_overpass_failure_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/interpreter"))
        .respond_with(ResponseTemplate::new(504).set_body_string("Gateway Timeout"))
        .mount(&mock_server)
        .await;

    let client = OverpassClient::new(format!("{}/api/interpreter", mock_server.uri())).unwrap();
    let result = client
        .building_outlines(Coordinate::new(47.2, -1.55), 50)
        .await;
    assert!(matches!(result, Err(AppError::ExternalApiError(_))));
}

#[tokio::test]
async fn test_full_pipeline_to_csv() {
    let places_server = MockServer::start().await;
    let overpass_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .and(query_param("query", "entrepôt frigorifique in Loire-Atlantique"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [place("p1", 47.2005, -1.5495), place("p2", 47.2006, -1.5494)]
        })))
        .mount(&places_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/details/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(details("Froid, Atlantique")))
        .mount(&places_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/interpreter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(overpass_buildings()))
        .mount(&overpass_server)
        .await;

    let config = create_test_config(
        places_server.uri(),
        format!("{}/api/interpreter", overpass_server.uri()),
    );
    let pipeline = LeadPipeline::new(
        Arc::new(places_client(&places_server)),
        Arc::new(OverpassClient::new(config.overpass_url.clone()).unwrap()),
        &config,
    );

    let params = RunParams {
        keyword: "entrepôt frigorifique".to_string(),
        scope: SearchScope::Regions(vec!["Loire-Atlantique".to_string()]),
        use_grid: false,
        min_area_m2: 10_000.0,
        filter: LeadFilter::new(["Pays de la Loire"], ["44"]),
    };
    assert_eq!(pipeline.estimate(&params), 2);

    let report = pipeline.run(params).await.unwrap();
    assert_eq!(report.found(), 2);
    assert!(!report.is_partial());
    assert_eq!(report.leads[0].enriched.department_code.as_deref(), Some("44"));
    assert!(report.leads.iter().all(|l| l.has_footprint()));
    assert!(report
        .leads
        .iter()
        .all(|l| (l.area_m2 - MERGED_AREA_M2).abs() < 1.0));

    let csv = leads_to_csv(&report.leads).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("region,department,latitude,longitude,surface_m2"));
    assert!(lines[1].starts_with("Pays de la Loire,Loire-Atlantique,47.2005,-1.5495,"));
    assert!(lines[1].contains("\"Froid, Atlantique\""));
}

#[tokio::test]
async fn test_pipeline_below_threshold_yields_header_only_csv() {
    let places_server = MockServer::start().await;
    let overpass_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [place("p1", 47.2005, -1.5495)]
        })))
        .mount(&places_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/details/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(details("Petit Froid")))
        .mount(&places_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/interpreter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(overpass_buildings()))
        .mount(&overpass_server)
        .await;

    let config = create_test_config(
        places_server.uri(),
        format!("{}/api/interpreter", overpass_server.uri()),
    );
    let pipeline = LeadPipeline::from_config(&config).unwrap();

    let params = RunParams {
        keyword: "entrepôt".to_string(),
        scope: SearchScope::Territory,
        use_grid: false,
        min_area_m2: 50_000.0,
        filter: LeadFilter::default(),
    };
    let report = pipeline.run(params).await.unwrap();
    assert_eq!(report.found(), 0);
    assert_eq!(leads_to_csv(&report.leads).unwrap().lines().count(), 1);
}
