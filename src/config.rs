use std::time::Duration;

pub const DEFAULT_PLACES_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Pacing delays imposed by the upstream services.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Wait before a continuation token may be used.
    pub page_token_delay: Duration,
    /// Wait between two successive detail lookups.
    pub detail_delay: Duration,
}

impl Pacing {
    /// No waiting at all. Only meant for tests against fakes and mock servers.
    pub fn none() -> Self {
        Self {
            page_token_delay: Duration::ZERO,
            detail_delay: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_token_delay: Duration::from_millis(2000),
            detail_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub google_api_key: String,
    pub places_base_url: String,
    pub overpass_url: String,
    pub search_language: String,
    pub territory_name: String,
    pub min_area_m2: f64,
    pub api_call_budget: usize,
    pub footprint_radius_m: u32,
    pub nearby_radius_m: u32,
    pub pacing: Pacing,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            google_api_key: std::env::var("GOOGLE_API_KEY")
                .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("GOOGLE_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            places_base_url: http_url_or_default("PLACES_BASE_URL", DEFAULT_PLACES_BASE_URL)?,
            overpass_url: http_url_or_default("OVERPASS_URL", DEFAULT_OVERPASS_URL)?,
            search_language: std::env::var("SEARCH_LANGUAGE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "fr".to_string()),
            territory_name: std::env::var("TERRITORY_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "France".to_string()),
            min_area_m2: std::env::var("MIN_AREA_M2")
                .unwrap_or_else(|_| "10000".to_string())
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("MIN_AREA_M2 must be a number"))
                .and_then(|area| {
                    if !area.is_finite() || area < 0.0 {
                        anyhow::bail!("MIN_AREA_M2 must be a non-negative number");
                    }
                    Ok(area)
                })?,
            api_call_budget: std::env::var("API_CALL_BUDGET")
                .unwrap_or_else(|_| "5000".to_string())
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("API_CALL_BUDGET must be a positive integer"))
                .and_then(|budget| {
                    if budget == 0 {
                        anyhow::bail!("API_CALL_BUDGET must be greater than zero");
                    }
                    Ok(budget)
                })?,
            footprint_radius_m: parse_or_default(
                "FOOTPRINT_RADIUS_M",
                crate::footprint::DEFAULT_FOOTPRINT_RADIUS_M,
            )?,
            nearby_radius_m: parse_or_default("NEARBY_RADIUS_M", 40_000)?,
            pacing: Pacing {
                page_token_delay: Duration::from_millis(parse_or_default(
                    "PAGE_TOKEN_DELAY_MS",
                    2000,
                )?),
                detail_delay: Duration::from_millis(parse_or_default("DETAIL_DELAY_MS", 1000)?),
            },
        };

        // Never log the API key
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Places Base URL: {}", config.places_base_url);
        tracing::debug!("Overpass URL: {}", config.overpass_url);
        tracing::debug!(
            "Minimum area: {} m², call budget: {}",
            config.min_area_m2,
            config.api_call_budget
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn http_url_or_default(name: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_or_default<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer", name)),
        _ => Ok(default),
    }
}
