use crate::config::Config;
use crate::errors::AppError;
use crate::fuel::FuelCostService;
use crate::gemini::GeminiClient;
use crate::models::*;
use crate::offer::OfferAnalysisService;
use crate::search::CarSearchService;
use crate::source::ProvidedListings;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the Gemini generateContent endpoint.
    pub client: GeminiClient,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "auto-hunter-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/filters/extract
///
/// Turns a free-text query into structured search filters. Fail-open: model
/// trouble yields all-null filters, never an error response.
pub async fn extract_filters(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<SearchFilters>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("query must not be empty".to_string()));
    }

    let service = CarSearchService::new(state.client.clone());
    let filters = service.parse_query(&req.query).await;
    Ok(Json(filters))
}

/// POST /api/v1/search
///
/// Full pipeline over caller-supplied listings: extract filters, run the
/// retrieval seam, rank and annotate, then summarize. Mirrors the search
/// flow of the UI with scraping handled upstream.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("query must not be empty".to_string()));
    }

    let service = CarSearchService::new(state.client.clone());

    let filters = service.parse_query(&req.query).await;
    let source = ProvidedListings(req.listings);
    let raw_results = service.search_cars(&source, &filters).await;

    let (results, summary) = if raw_results.is_empty() {
        (Vec::new(), String::new())
    } else {
        let ranked = service.rank_and_annotate(&req.query, &raw_results).await;
        let context = req.context_text.as_deref().unwrap_or("");
        let summary = service.summarize_results(&ranked, context).await;
        (ranked, summary)
    };

    tracing::info!(
        result_count = results.len(),
        filtered = !filters.is_empty(),
        "Search pipeline finished"
    );

    Ok(Json(SearchResponse {
        filters,
        results,
        summary,
    }))
}

/// POST /api/v1/listings/rank
pub async fn rank_listings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RankRequest>,
) -> Result<Json<RankResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("query must not be empty".to_string()));
    }

    let service = CarSearchService::new(state.client.clone());
    let results = service.rank_and_annotate(&req.query, &req.listings).await;
    Ok(Json(RankResponse { results }))
}

/// POST /api/v1/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(AppError::BadRequest(
            "question must not be empty".to_string(),
        ));
    }

    let service = CarSearchService::new(state.client.clone());
    let context = req.context_text.as_deref().unwrap_or("");
    let answer = service
        .chat_about_results(&req.question, &req.listings, context)
        .await;
    Ok(Json(ChatResponse { answer }))
}

/// POST /api/v1/offers/analyze
///
/// Always returns a fully populated assessment; parse trouble on the model
/// side surfaces as the documented fallback values, not as an error.
pub async fn analyze_offer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OfferAnalysisRequest>,
) -> Result<Json<OfferAssessment>, AppError> {
    if req.description.trim().is_empty() {
        return Err(AppError::BadRequest(
            "description must not be empty".to_string(),
        ));
    }

    let service = OfferAnalysisService::new(state.client.clone());
    let assessment = service
        .analyze(
            &req.description,
            req.price,
            req.mileage,
            req.year,
            &req.comparison_listings,
        )
        .await;
    Ok(Json(assessment))
}

/// POST /api/v1/fuel/estimate
pub async fn fuel_estimate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FuelEstimateRequest>,
) -> Result<Json<FuelEstimateResponse>, AppError> {
    for (name, value) in [
        ("km_per_month", req.km_per_month),
        ("avg_consumption", req.avg_consumption),
        ("fuel_price", req.fuel_price),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::BadRequest(format!(
                "{} must be a non-negative number",
                name
            )));
        }
    }

    let service = FuelCostService::new(state.client.clone());
    let breakdown = service.analyze(
        req.km_per_month,
        req.avg_consumption,
        req.fuel_price,
        req.avg_person_weight,
        req.num_people,
    );

    let recommendation = if req.with_recommendation {
        service.recommendation(&breakdown).await
    } else {
        None
    };

    Ok(Json(FuelEstimateResponse {
        breakdown,
        recommendation,
    }))
}
