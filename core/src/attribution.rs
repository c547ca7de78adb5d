//! Per-feature attribution of a model score.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{ScoreError, Scorer};
use crate::profile::FeatureVector;

/// One feature's signed contribution to a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionFactor {
    pub feature_name: String,
    pub signed_contribution: f64,
    pub raw_value: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    #[error("scoring failed during attribution: {0}")]
    Score(#[from] ScoreError),
    #[error("attribution produced a non-finite contribution for '{0}'")]
    NonFinite(String),
    #[error("attribution unavailable: {0}")]
    Unavailable(String),
}

/// Explains a prediction as one contribution per input feature.
pub trait Attributor: Send + Sync {
    fn attribute(
        &self,
        features: &FeatureVector,
        scorer: &dyn Scorer,
    ) -> Result<Vec<AttributionFactor>, AttributionError>;
}

/// Model-agnostic occlusion attribution.
///
/// Each feature's contribution is `f(x) - f(x with that feature at its baseline)`.
/// For a linear model this is exactly `coefficient * (x - baseline)`.
#[derive(Debug, Clone, Default)]
pub struct OcclusionAttributor {
    baseline: BTreeMap<String, f64>,
}

impl OcclusionAttributor {
    pub fn new(baseline: BTreeMap<String, f64>) -> Self {
        Self { baseline }
    }

    fn baseline_for(&self, name: &str) -> f64 {
        self.baseline.get(name).copied().unwrap_or(0.0)
    }
}

impl Attributor for OcclusionAttributor {
    fn attribute(
        &self,
        features: &FeatureVector,
        scorer: &dyn Scorer,
    ) -> Result<Vec<AttributionFactor>, AttributionError> {
        let full = scorer.predict(features)?;

        features
            .iter()
            .map(|(name, value)| {
                let occluded = scorer.predict(&features.with_value(name, self.baseline_for(name)))?;
                let contribution = full - occluded;
                if !contribution.is_finite() {
                    return Err(AttributionError::NonFinite(name.to_string()));
                }
                Ok(AttributionFactor {
                    feature_name: name.to_string(),
                    signed_contribution: contribution,
                    raw_value: value,
                })
            })
            .collect()
    }
}

/// Attribution factor in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TopFactor {
    pub feature: String,
    /// Signed contribution to the prediction
    pub contribution: f64,
    /// Encoded input value
    pub value: f64,
}

impl From<&AttributionFactor> for TopFactor {
    fn from(factor: &AttributionFactor) -> Self {
        Self {
            feature: factor.feature_name.clone(),
            contribution: factor.signed_contribution,
            value: factor.raw_value,
        }
    }
}
