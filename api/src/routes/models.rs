use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use assura_core::attribution::{Attributor, OcclusionAttributor};
use assura_core::error::ApiError;
use assura_core::models::{LoadedModel, Scorer};
use assura_core::profile::InsuranceProfile;
use assura_core::recommendation::PredictionResponse;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn catalog_router() -> Router<AppState> {
    Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/models/{model_name}", get(get_model))
}

pub fn predict_router() -> Router<AppState> {
    Router::new().route("/v1/models/{model_name}/predict", post(predict))
}

/// Benchmark metrics and input columns of one model
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ModelSummary {
    pub metrics: BTreeMap<String, f64>,
    pub columns: Vec<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ModelDetail {
    pub model_name: String,
    pub metrics: BTreeMap<String, f64>,
    pub columns: Vec<String>,
}

impl From<&LoadedModel> for ModelSummary {
    fn from(model: &LoadedModel) -> Self {
        Self {
            metrics: model.benchmark.clone(),
            columns: model.columns.clone(),
        }
    }
}

fn not_found(model_name: &str) -> AppError {
    AppError::NotFound {
        resource: format!("model/{model_name}"),
    }
}

/// List loaded models
///
/// Keyed by model name; each entry carries benchmark metrics and the ordered
/// input columns the model expects.
#[utoipa::path(
    get,
    path = "/v1/models",
    responses(
        (status = 200, description = "Loaded models", body = BTreeMap<String, ModelSummary>)
    ),
    tag = "models"
)]
pub async fn list_models(State(state): State<AppState>) -> Json<BTreeMap<String, ModelSummary>> {
    Json(
        state
            .registry
            .iter()
            .map(|m| (m.name.clone(), ModelSummary::from(m)))
            .collect(),
    )
}

/// Get one model's metrics and columns
#[utoipa::path(
    get,
    path = "/v1/models/{model_name}",
    params(("model_name" = String, Path, description = "Model name (file stem in the model directory)")),
    responses(
        (status = 200, description = "Model details", body = ModelDetail),
        (status = 404, description = "Unknown model", body = ApiError)
    ),
    tag = "models"
)]
pub async fn get_model(
    State(state): State<AppState>,
    Path(model_name): Path<String>,
) -> Result<Json<ModelDetail>, AppError> {
    let model = state
        .registry
        .get(&model_name)
        .ok_or_else(|| not_found(&model_name))?;

    Ok(Json(ModelDetail {
        model_name: model.name.clone(),
        metrics: model.benchmark.clone(),
        columns: model.columns.clone(),
    }))
}

/// Predict insurance cost and recommend a plan
///
/// Encodes the profile against the model's columns, scores it, and returns the
/// prediction with an MAE interval, the risk tier, the priced plan, the three
/// most influential features and health suggestions. When the feature ranking
/// cannot be computed, `top_factors` is empty and `attribution_status` is
/// `unavailable`.
#[utoipa::path(
    post,
    path = "/v1/models/{model_name}/predict",
    params(("model_name" = String, Path, description = "Model to score with")),
    request_body = InsuranceProfile,
    responses(
        (status = 200, description = "Prediction and recommendation", body = PredictionResponse),
        (status = 400, description = "Invalid profile", body = ApiError),
        (status = 404, description = "Unknown model", body = ApiError)
    ),
    tag = "models"
)]
pub async fn predict(
    State(state): State<AppState>,
    Path(model_name): Path<String>,
    AppJson(profile): AppJson<InsuranceProfile>,
) -> Result<Json<PredictionResponse>, AppError> {
    let model = state
        .registry
        .get(&model_name)
        .ok_or_else(|| not_found(&model_name))?;

    let features = profile.to_model_input(&model.columns)?;
    let prediction = model.predict(&features)?;

    let attributor = OcclusionAttributor::new(model.baseline().clone());
    let recommendation = state
        .engine
        .build_recommendation(prediction, &features, |f| {
            attributor.attribute(f, model.as_ref())
        })?;

    tracing::info!(
        model = %model_name,
        prediction,
        risk_level = %recommendation.risk_tier,
        "prediction computed"
    );

    Ok(Json(PredictionResponse::new(
        prediction,
        model.mae(),
        &recommendation,
    )))
}
