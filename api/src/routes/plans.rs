use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use assura_core::plan::{MARGIN, TierRates};
use assura_core::thresholds::{RiskThresholds, RiskTier};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/plans", get(list_plans))
}

/// Rate table per tier plus the active pricing parameters
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PlansResponse {
    pub lower: TierRates,
    pub moderate: TierRates,
    pub high: TierRates,
    /// Loading applied to the refund estimate: `annual_price = refund / (1 - margin)`
    pub margin: f64,
    /// Cut points between tiers; a prediction equal to a cut point takes the higher tier
    pub thresholds: RiskThresholds,
}

/// List plan tiers
///
/// Deductible and ceiling rates are fractions of the predicted cost.
#[utoipa::path(
    get,
    path = "/v1/plans",
    responses(
        (status = 200, description = "Plan tiers and pricing parameters", body = PlansResponse)
    ),
    tag = "plans"
)]
pub async fn list_plans(State(state): State<AppState>) -> Json<PlansResponse> {
    Json(PlansResponse {
        lower: TierRates::for_tier(RiskTier::Lower),
        moderate: TierRates::for_tier(RiskTier::Moderate),
        high: TierRates::for_tier(RiskTier::High),
        margin: MARGIN,
        thresholds: *state.engine.thresholds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::test_support::test_state;

    #[tokio::test]
    async fn exposes_rate_table_and_thresholds() {
        let response = router()
            .with_state(test_state())
            .oneshot(
                Request::builder()
                    .uri("/v1/plans")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("body should be json");

        assert_eq!(body["lower"]["deductible_rate"], 0.3);
        assert_eq!(body["moderate"]["ceiling_rate"], 0.9);
        assert_eq!(body["high"]["deductible_rate"], 0.1);
        assert_eq!(body["margin"], 0.05);
        assert_eq!(body["thresholds"]["q1"], 9000.0);
        assert_eq!(body["thresholds"]["q2"], 16000.0);
    }
}
