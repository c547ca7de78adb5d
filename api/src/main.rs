use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use assura_core::models::{ModelLoadError, ModelRegistry};
use assura_core::recommendation::RecommendationEngine;
use assura_core::thresholds::ThresholdError;

mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod seed;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Assura API",
        version = "0.1.0",
        description = "Insurance cost prediction, risk tiering and plan recommendation."
    ),
    paths(
        routes::health::health_check,
        routes::models::list_models,
        routes::models::get_model,
        routes::models::predict,
        routes::plans::list_plans,
        routes::predictions::create_prediction,
        routes::predictions::list_predictions,
        routes::predictions::list_model_names,
    ),
    components(schemas(
        HealthResponse,
        routes::models::ModelSummary,
        routes::models::ModelDetail,
        routes::plans::PlansResponse,
        assura_core::error::ApiError,
        assura_core::thresholds::RiskTier,
        assura_core::thresholds::RiskThresholds,
        assura_core::plan::TierRates,
        assura_core::plan::PlanResponse,
        assura_core::profile::Sex,
        assura_core::profile::Region,
        assura_core::profile::InsuranceProfile,
        assura_core::attribution::TopFactor,
        assura_core::recommendation::AttributionStatus,
        assura_core::recommendation::PredictionResponse,
        assura_core::predictions::CreatePredictionRequest,
        assura_core::predictions::CreatePredictionResponse,
        assura_core::predictions::PredictionRecord,
        assura_core::predictions::Paginated<assura_core::predictions::PredictionRecord>,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// "ok" when the database is reachable and models are loaded, else "degraded"
    pub status: String,
    pub version: String,
    /// "ok" or "unreachable"
    pub database: String,
    /// Number of models in the in-memory registry
    pub models_loaded: usize,
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("failed to load risk thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
    #[error("failed to load models: {0}")]
    Models(#[from] ModelLoadError),
    #[error("no models found in {0}")]
    NoModels(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

fn app(state: state::AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::models::catalog_router())
        .merge(routes::plans::router())
        .merge(routes::models::predict_router().layer(middleware::rate_limit::predict_layer()))
        .merge(routes::predictions::router().layer(middleware::rate_limit::history_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

async fn run() -> Result<(), StartupError> {
    let config = config::AppConfig::from_env()?;

    let thresholds = config.thresholds.load()?;
    tracing::info!(
        q1 = thresholds.q1(),
        q2 = thresholds.q2(),
        "risk thresholds loaded"
    );

    let registry = ModelRegistry::load_dir(&config.models_dir)?;
    if registry.is_empty() {
        return Err(StartupError::NoModels(
            config.models_dir.display().to_string(),
        ));
    }
    tracing::info!(count = registry.len(), "models loaded");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("../migrations").run(&pool).await?;

    let registered = seed::register_models(&pool, &registry).await?;
    tracing::info!(registered, "model registry synchronized");

    let app_state = state::AppState {
        db: pool,
        registry: Arc::new(registry),
        engine: Arc::new(RecommendationEngine::new(thresholds)),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Assura API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assura_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "startup failed");
        std::process::exit(1);
    }
}
