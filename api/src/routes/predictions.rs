use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use sqlx::types::Json as SqlJson;

use assura_core::attribution::TopFactor;
use assura_core::error::ApiError;
use assura_core::predictions::{
    CreatePredictionRequest, CreatePredictionResponse, PageRequest, Paginated, PredictionQuery,
    PredictionRecord,
};

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/predictions", get(list_predictions).post(create_prediction))
        .route("/v1/model-names", get(list_model_names))
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct PredictionRow {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    age: i32,
    sex: String,
    bmi: f64,
    children: i32,
    smoker: bool,
    region: String,
    prediction: f64,
    interval_min: f64,
    interval_max: f64,
    mae: f64,
    risk_level: String,
    plan_name: String,
    franchise: f64,
    ceiling: String,
    refund_estimate: f64,
    annual_price: f64,
    monthly_price: f64,
    suggestions: SqlJson<Vec<String>>,
    top_factors: SqlJson<Vec<TopFactor>>,
    model_name: String,
    created_at: DateTime<Utc>,
}

impl PredictionRow {
    fn into_record(self) -> PredictionRecord {
        PredictionRecord {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
            sex: self.sex,
            bmi: self.bmi,
            children: self.children,
            smoker: self.smoker,
            region: self.region,
            prediction: self.prediction,
            interval_min: self.interval_min,
            interval_max: self.interval_max,
            mae: self.mae,
            risk_level: self.risk_level,
            plan_name: self.plan_name,
            franchise: self.franchise,
            ceiling: self.ceiling,
            refund_estimate: self.refund_estimate,
            annual_price: self.annual_price,
            monthly_price: self.monthly_price,
            suggestions: self.suggestions.0,
            top_factors: self.top_factors.0,
            model_name: self.model_name,
            created_at: self.created_at,
        }
    }
}

/// Shared WHERE clause for listing and counting. Every filter is optional:
/// a NULL parameter disables its condition.
const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR m.name = $1)
      AND ($2::text IS NULL OR p.sex = $2)
      AND ($3::bool IS NULL OR p.smoker = $3)
      AND ($4::text IS NULL OR p.region = $4)
      AND ($5::bigint IS NULL OR p.age >= $5)
      AND ($6::bigint IS NULL OR p.age <= $6)
      AND ($7::bigint IS NULL OR p.children >= $7)
      AND ($8::bigint IS NULL OR p.children <= $8)
"#;

/// Bind the eight filter parameters of [`FILTER_CLAUSE`] in order.
macro_rules! bind_filters {
    ($query:expr, $params:expr) => {
        $query
            .bind($params.model_name.as_deref())
            .bind($params.sex.map(|s| s.as_str()))
            .bind($params.smoker)
            .bind($params.region.map(|r| r.as_str()))
            .bind($params.age_min.map(i64::from))
            .bind($params.age_max.map(i64::from))
            .bind($params.children_min.map(i64::from))
            .bind($params.children_max.map(i64::from))
    };
}

fn list_sql() -> String {
    format!(
        r#"
        SELECT p.id, p.first_name, p.last_name, p.age, p.sex, p.bmi, p.children, p.smoker,
               p.region, p.prediction, p.interval_min, p.interval_max, p.mae, p.risk_level,
               p.plan_name, p.franchise, p.ceiling, p.refund_estimate, p.annual_price,
               p.monthly_price, p.suggestions, p.top_factors, m.name AS model_name, p.created_at
        FROM predictions p
        JOIN model_info m ON m.id = p.model_id
        {FILTER_CLAUSE}
        ORDER BY p.created_at DESC, p.id DESC
        LIMIT $9 OFFSET $10
        "#
    )
}

fn count_sql() -> String {
    format!(
        r#"
        SELECT COUNT(*)
        FROM predictions p
        JOIN model_info m ON m.id = p.model_id
        {FILTER_CLAUSE}
        "#
    )
}

/// Fetch one page of predictions matching `params`, newest first.
async fn fetch_page(
    pool: &sqlx::PgPool,
    params: &PredictionQuery,
    page: PageRequest,
) -> Result<Paginated<PredictionRecord>, AppError> {
    let count_sql = count_sql();
    let total: i64 = bind_filters!(sqlx::query_scalar::<_, i64>(&count_sql), params)
        .fetch_one(pool)
        .await?;

    let list_sql = list_sql();
    let rows = bind_filters!(sqlx::query_as::<_, PredictionRow>(&list_sql), params)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    let items = rows.into_iter().map(PredictionRow::into_record).collect();
    Ok(Paginated::new(items, total, page))
}

fn to_column_int(value: u32, field: &str) -> Result<i32, AppError> {
    i32::try_from(value).map_err(|_| AppError::Validation {
        message: format!("{field} is out of range"),
        field: Some(format!("profile.{field}")),
        received: Some(serde_json::json!(value)),
        docs_hint: None,
    })
}

/// Save a prediction to the history
///
/// Stores the submitted profile together with the prediction response the
/// client received from `POST /v1/models/{model_name}/predict`.
#[utoipa::path(
    post,
    path = "/v1/predictions",
    request_body = CreatePredictionRequest,
    responses(
        (status = 201, description = "Prediction stored", body = CreatePredictionResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Model is not registered", body = ApiError)
    ),
    tag = "predictions"
)]
pub async fn create_prediction(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreatePredictionRequest>,
) -> Result<(StatusCode, Json<CreatePredictionResponse>), AppError> {
    req.profile.validate()?;
    let age = to_column_int(req.profile.age, "age")?;
    let children = to_column_int(req.profile.children, "children")?;

    let model_id: i64 = sqlx::query_scalar("SELECT id FROM model_info WHERE name = $1")
        .bind(&req.model_name)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: format!("model/{}", req.model_name),
        })?;

    let profile = &req.profile;
    let response = &req.response;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO predictions (
            first_name, last_name, age, sex, bmi, children, smoker, region,
            prediction, interval_min, interval_max, mae, risk_level,
            plan_name, franchise, ceiling, refund_estimate, annual_price, monthly_price,
            suggestions, top_factors, model_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22)
        RETURNING id
        "#,
    )
    .bind(profile.first_name.as_deref())
    .bind(profile.last_name.as_deref())
    .bind(age)
    .bind(profile.sex.as_str())
    .bind(profile.bmi)
    .bind(children)
    .bind(profile.smoker)
    .bind(profile.region.as_str())
    .bind(response.prediction)
    .bind(response.interval[0])
    .bind(response.interval[1])
    .bind(response.mae)
    .bind(response.risk_level.as_str())
    .bind(&response.plan.name)
    .bind(response.plan.franchise)
    .bind(response.plan.ceiling.to_string())
    .bind(response.plan.refund_estimate)
    .bind(response.plan.annual_price)
    .bind(response.plan.monthly_price)
    .bind(SqlJson(&response.suggestions))
    .bind(SqlJson(&response.top_factors))
    .bind(model_id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(id, model = %req.model_name, "prediction stored");

    Ok((StatusCode::CREATED, Json(CreatePredictionResponse { id })))
}

/// List stored predictions
///
/// Filters combine with AND. Results are ordered newest first; `page` is
/// 1-based and `pages` is never less than 1.
#[utoipa::path(
    get,
    path = "/v1/predictions",
    params(PredictionQuery),
    responses(
        (status = 200, description = "Page of stored predictions", body = Paginated<PredictionRecord>),
        (status = 400, description = "Invalid filter", body = ApiError)
    ),
    tag = "predictions"
)]
pub async fn list_predictions(
    State(state): State<AppState>,
    Query(params): Query<PredictionQuery>,
) -> Result<Json<Paginated<PredictionRecord>>, AppError> {
    let page = params.validate()?;
    let result = fetch_page(&state.db, &params, page).await?;
    Ok(Json(result))
}

/// List model names registered in the history store
#[utoipa::path(
    get,
    path = "/v1/model-names",
    responses(
        (status = 200, description = "Registered model names", body = Vec<String>)
    ),
    tag = "predictions"
)]
pub async fn list_model_names(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let names = sqlx::query_scalar::<_, String>("SELECT name FROM model_info ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(names))
}
