use auto_hunter_api::config::Config;
use auto_hunter_api::gemini::GeminiClient;
use auto_hunter_api::handlers::{self, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes logging, loads configuration, constructs the Gemini client and
/// starts the Axum server. A missing API key disables the AI features but
/// never prevents startup.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auto_hunter_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let client = GeminiClient::new(&config)?;
    if client.has_api_key() {
        tracing::info!("Gemini client initialized: {}", config.gemini_base_url);
    } else {
        tracing::warn!("Gemini client running without credentials; AI endpoints degrade to defaults");
    }

    let app_state = Arc::new(AppState {
        config: config.clone(),
        client,
    });

    let api_routes = Router::new()
        .route("/api/v1/search", post(handlers::search))
        .route("/api/v1/filters/extract", post(handlers::extract_filters))
        .route("/api/v1/listings/rank", post(handlers::rank_listings))
        .route("/api/v1/chat", post(handlers::chat))
        .route("/api/v1/offers/analyze", post(handlers::analyze_offer))
        .route("/api/v1/fuel/estimate", post(handlers::fuel_estimate))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 2MB max payload (listings batches are small)
                .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)),
        );

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
