use crate::budget::estimate_api_calls;
use crate::config::Config;
use crate::errors::AppError;
use crate::export::leads_to_csv;
use crate::models::*;
use crate::pipeline::{LeadPipeline, RunParams};
use crate::territory;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// File name offered to the browser for CSV exports.
pub const EXPORT_FILE_NAME: &str = "leads.csv";

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Wired search, detail and footprint clients.
    pub pipeline: LeadPipeline,
}

/// Lead routes, without the transport layers `main` adds on top.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/categories", get(list_categories))
        .route("/api/v1/leads/estimate", post(estimate_leads))
        .route("/api/v1/leads/search", post(search_leads))
        .route("/api/v1/leads/export", post(export_leads))
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "footprint-leads",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/categories
///
/// Preset categories and the scope values the search endpoints accept.
pub async fn list_categories() -> Json<serde_json::Value> {
    let categories: Vec<_> = SiteCategory::ALL
        .iter()
        .map(|c| {
            json!({
                "category": c,
                "label": c.label(),
                "keyword": c.keyword(),
            })
        })
        .collect();

    Json(json!({
        "categories": categories,
        "regions": territory::REGIONS,
        "departments": territory::department_codes(),
    }))
}

/// POST /api/v1/leads/estimate
///
/// Forecasts the upstream calls a search with this body would make. Never
/// calls upstream.
pub async fn estimate_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LeadSearchRequest>,
) -> Result<Json<BudgetEstimateResponse>, AppError> {
    let params = RunParams::from_request(&request, state.config.min_area_m2)?;
    let estimated_calls = state.pipeline.estimate(&params);
    let ceiling = state.pipeline.call_budget();

    Ok(Json(BudgetEstimateResponse {
        estimated_calls,
        grid_estimate: estimate_api_calls(state.pipeline.grid().len(), true),
        ceiling,
        within_budget: estimated_calls <= ceiling,
    }))
}

/// POST /api/v1/leads/search
///
/// Runs the pipeline and returns the leads as JSON.
pub async fn search_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LeadSearchRequest>,
) -> Result<Json<LeadSearchResponse>, AppError> {
    let params = RunParams::from_request(&request, state.config.min_area_m2)?;
    tracing::info!("POST /leads/search - keyword: '{}'", params.keyword);

    let report = state.pipeline.run(params).await?;
    Ok(Json(report.to_response()))
}

/// POST /api/v1/leads/export
///
/// Runs the pipeline and returns the leads as a CSV attachment.
pub async fn export_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LeadSearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let params = RunParams::from_request(&request, state.config.min_area_m2)?;
    tracing::info!("POST /leads/export - keyword: '{}'", params.keyword);

    let report = state.pipeline.run(params).await?;
    let body = leads_to_csv(&report.leads)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        body,
    ))
}
