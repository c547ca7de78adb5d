//! Recommendation assembly: risk tier, priced plan, health suggestions and the
//! most influential features behind a prediction.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::attribution::{AttributionError, AttributionFactor, TopFactor};
use crate::plan::{Plan, PlanResponse, compute_plan, round2};
use crate::profile::FeatureVector;
use crate::thresholds::{RiskThresholds, RiskTier};

pub const MAX_TOP_FACTORS: usize = 3;
pub const HIGH_BMI: f64 = 30.0;
pub const YOUTH_AGE_LIMIT: f64 = 25.0;

pub const SMOKER_SUGGESTION: &str =
    "The client is a smoker. Offer support to help them quit smoking.";
pub const BMI_SUGGESTION: &str = "High BMI: offer nutritional support or health sports.";
pub const YOUTH_SUGGESTION: &str = "Young client: consider offering the youth plan.";

/// Whether the factor ranking could be computed. `Unavailable` with no factors
/// is distinct from `Available` with an empty ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttributionStatus {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub risk_tier: RiskTier,
    pub plan: Plan,
    /// At most [`MAX_TOP_FACTORS`], by descending absolute contribution
    pub top_factors: Vec<AttributionFactor>,
    pub suggestions: Vec<String>,
    pub attribution_status: AttributionStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum RecommendationError {
    #[error("prediction must be a finite number, got {0}")]
    NonFinitePrediction(f64),
}

/// Builds recommendations against a fixed set of risk thresholds.
///
/// Holds no mutable state; share one instance across all requests.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    thresholds: RiskThresholds,
}

impl RecommendationEngine {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    pub fn classify_risk(&self, prediction: f64) -> RiskTier {
        self.thresholds.classify_risk(prediction)
    }

    /// Compose tier, plan, suggestions and factor ranking for one prediction.
    ///
    /// `attribution_fn` is best-effort: when it fails the recommendation is still
    /// returned, with no factors and [`AttributionStatus::Unavailable`].
    pub fn build_recommendation<F>(
        &self,
        prediction: f64,
        features: &FeatureVector,
        attribution_fn: F,
    ) -> Result<Recommendation, RecommendationError>
    where
        F: FnOnce(&FeatureVector) -> Result<Vec<AttributionFactor>, AttributionError>,
    {
        if !prediction.is_finite() {
            return Err(RecommendationError::NonFinitePrediction(prediction));
        }

        let risk_tier = self.classify_risk(prediction);
        let plan = compute_plan(prediction, risk_tier);
        let suggestions = suggestions_for(features);

        let (top_factors, attribution_status) = match attribution_fn(features) {
            Ok(factors) => (rank_factors(factors), AttributionStatus::Available),
            Err(err) => {
                tracing::warn!(error = %err, "attribution failed, returning recommendation without factors");
                (Vec::new(), AttributionStatus::Unavailable)
            }
        };

        Ok(Recommendation {
            risk_tier,
            plan,
            top_factors,
            suggestions,
            attribution_status,
        })
    }
}

/// Rule-based suggestions in fixed order: smoking, BMI, youth.
/// A rule whose feature is absent does not fire.
pub fn suggestions_for(features: &FeatureVector) -> Vec<String> {
    let mut suggestions = Vec::new();
    if features.get("smoker_yes") == Some(1.0) {
        suggestions.push(SMOKER_SUGGESTION.to_string());
    }
    if features.get("bmi").is_some_and(|bmi| bmi > HIGH_BMI) {
        suggestions.push(BMI_SUGGESTION.to_string());
    }
    if features.get("age").is_some_and(|age| age < YOUTH_AGE_LIMIT) {
        suggestions.push(YOUTH_SUGGESTION.to_string());
    }
    suggestions
}

/// Stable sort by descending absolute contribution, truncated to the top entries.
pub fn rank_factors(mut factors: Vec<AttributionFactor>) -> Vec<AttributionFactor> {
    factors.sort_by(|a, b| {
        b.signed_contribution
            .abs()
            .total_cmp(&a.signed_contribution.abs())
    });
    factors.truncate(MAX_TOP_FACTORS);
    factors
}

/// Response body for a prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PredictionResponse {
    pub prediction: f64,
    /// `[prediction - MAE, prediction + MAE]`
    #[schema(value_type = Vec<f64>)]
    pub interval: [f64; 2],
    pub mae: f64,
    pub risk_level: RiskTier,
    pub plan: PlanResponse,
    pub top_factors: Vec<TopFactor>,
    pub suggestions: Vec<String>,
    pub attribution_status: AttributionStatus,
}

impl PredictionResponse {
    /// Round every figure to cents for the wire.
    pub fn new(prediction: f64, mae: f64, recommendation: &Recommendation) -> Self {
        Self {
            prediction: round2(prediction),
            interval: [round2(prediction - mae), round2(prediction + mae)],
            mae: round2(mae),
            risk_level: recommendation.risk_tier,
            plan: PlanResponse::from(&recommendation.plan),
            top_factors: recommendation.top_factors.iter().map(TopFactor::from).collect(),
            suggestions: recommendation.suggestions.clone(),
            attribution_status: recommendation.attribution_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Ceiling;

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(RiskThresholds::new(9000.0, 16000.0).unwrap())
    }

    fn factor(name: &str, contribution: f64) -> AttributionFactor {
        AttributionFactor {
            feature_name: name.to_string(),
            signed_contribution: contribution,
            raw_value: 1.0,
        }
    }

    fn no_factors(_: &FeatureVector) -> Result<Vec<AttributionFactor>, AttributionError> {
        Ok(Vec::new())
    }

    #[test]
    fn all_suggestions_fire_in_fixed_order() {
        let features: FeatureVector = [("smoker_yes", 1.0), ("bmi", 35.0), ("age", 22.0)]
            .into_iter()
            .collect();
        let rec = engine().build_recommendation(5000.0, &features, no_factors).unwrap();
        assert_eq!(
            rec.suggestions,
            vec![SMOKER_SUGGESTION, BMI_SUGGESTION, YOUTH_SUGGESTION]
        );
    }

    #[test]
    fn healthy_profile_gets_no_suggestions() {
        let features: FeatureVector = [("smoker_yes", 0.0), ("bmi", 22.0), ("age", 40.0)]
            .into_iter()
            .collect();
        let rec = engine().build_recommendation(5000.0, &features, no_factors).unwrap();
        assert!(rec.suggestions.is_empty());
    }

    #[test]
    fn missing_features_do_not_fire_rules() {
        let rec = engine()
            .build_recommendation(5000.0, &FeatureVector::default(), no_factors)
            .unwrap();
        assert!(rec.suggestions.is_empty());
    }

    #[test]
    fn boundary_values_do_not_fire_rules() {
        let features: FeatureVector = [("smoker_yes", 0.0), ("bmi", 30.0), ("age", 25.0)]
            .into_iter()
            .collect();
        assert!(suggestions_for(&features).is_empty());
    }

    #[test]
    fn keeps_top_three_by_absolute_contribution() {
        let features = FeatureVector::default();
        let rec = engine()
            .build_recommendation(20000.0, &features, |_| {
                Ok(vec![
                    factor("age", 3000.0),
                    factor("sex_male", -50.0),
                    factor("smoker_yes", 23000.0),
                    factor("bmi", -4000.0),
                    factor("children", 400.0),
                ])
            })
            .unwrap();
        let names: Vec<&str> = rec.top_factors.iter().map(|f| f.feature_name.as_str()).collect();
        assert_eq!(names, vec!["smoker_yes", "bmi", "age"]);
        assert_eq!(rec.attribution_status, AttributionStatus::Available);
    }

    #[test]
    fn equal_contributions_keep_input_order() {
        let ranked = rank_factors(vec![factor("a", 10.0), factor("b", -10.0), factor("c", 10.0)]);
        let names: Vec<&str> = ranked.iter().map(|f| f.feature_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn attribution_failure_degrades_to_empty_factors() {
        let features: FeatureVector = [("smoker_yes", 1.0), ("bmi", 22.0), ("age", 40.0)]
            .into_iter()
            .collect();
        let rec = engine()
            .build_recommendation(20000.0, &features, |_| {
                Err(AttributionError::Unavailable("explainer crashed".to_string()))
            })
            .unwrap();

        assert!(rec.top_factors.is_empty());
        assert_eq!(rec.attribution_status, AttributionStatus::Unavailable);
        assert_eq!(rec.risk_tier, RiskTier::High);
        assert_eq!(rec.suggestions, vec![SMOKER_SUGGESTION]);
        assert!((rec.plan.refund_estimate - 14000.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_finite_prediction() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = engine().build_recommendation(bad, &FeatureVector::default(), no_factors);
            assert!(matches!(result, Err(RecommendationError::NonFinitePrediction(_))));
        }
    }

    #[test]
    fn attribution_is_not_called_for_rejected_prediction() {
        let mut called = false;
        let _ = engine().build_recommendation(f64::NAN, &FeatureVector::default(), |_| {
            called = true;
            Ok(Vec::new())
        });
        assert!(!called);
    }

    #[test]
    fn response_rounds_every_figure() {
        let rec = engine()
            .build_recommendation(5000.004, &FeatureVector::default(), |_| {
                Ok(vec![factor("age", 1234.5678)])
            })
            .unwrap();
        let response = PredictionResponse::new(5000.004, 4181.1949, &rec);

        assert_eq!(response.prediction, 5000.0);
        assert_eq!(response.mae, 4181.19);
        assert_eq!(response.interval, [818.81, 9181.2]);
        assert_eq!(response.risk_level, RiskTier::Lower);
        assert_eq!(response.plan.name, "Lower");
        assert_eq!(response.plan.ceiling, Ceiling::Amount(5000.0));
        assert_eq!(response.top_factors[0].feature, "age");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["risk_level"], "lower");
        assert_eq!(json["attribution_status"], "available");
        assert_eq!(json["plan"]["annual_price"], 3684.21);
    }
}
