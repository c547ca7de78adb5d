//! Scoring models and the on-disk model registry.
//!
//! A model directory holds, per model `<name>`:
//! - `<name>.json`: the model definition (tagged by `kind`)
//! - `<name>_columns.json`: ordered list of input columns
//! - `<name>_benchmark.json`: evaluation metrics (e.g. `MAE`, `RMSE`, `R2`)
//!
//! The registry is loaded once at startup and is read-only afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::profile::FeatureVector;

const COLUMNS_SUFFIX: &str = "_columns.json";
const BENCHMARK_SUFFIX: &str = "_benchmark.json";

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("feature '{0}' is missing from the input")]
    MissingFeature(String),
    #[error("model produced a non-finite score ({0})")]
    NonFinite(f64),
}

/// Anything that maps a feature vector to a cost prediction.
pub trait Scorer: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ScoreError>;
}

fn feature(features: &FeatureVector, name: &str) -> Result<f64, ScoreError> {
    features
        .get(name)
        .ok_or_else(|| ScoreError::MissingFeature(name.to_string()))
}

fn finite(score: f64) -> Result<f64, ScoreError> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(ScoreError::NonFinite(score))
    }
}

/// Ordinary linear regression: `intercept + Σ coefficient * feature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
}

impl Scorer for LinearModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        let mut score = self.intercept;
        for (name, coefficient) in &self.coefficients {
            score += coefficient * feature(features, name)?;
        }
        finite(score)
    }
}

/// One node of a regression tree. Splits send `value < threshold` left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: String,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Flat node list; node 0 is the root and children always follow their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        let mut index = 0;
        // Child indices are validated to be strictly increasing, so this terminates.
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split {
                    feature: name,
                    threshold,
                    left,
                    right,
                } => {
                    index = if feature(features, name)? < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    fn validate(&self, columns: &[String]) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if !columns.contains(feature) {
                    return Err(format!("node {i} splits on unknown column '{feature}'"));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {i} has a non-finite threshold"));
                }
                for child in [*left, *right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(format!("node {i} has invalid child index {child}"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Additive tree ensemble (gradient boosting style): `base_score + Σ tree(x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
}

impl Scorer for TreeEnsemble {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        let mut score = self.base_score;
        for tree in &self.trees {
            score += tree.evaluate(features)?;
        }
        finite(score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

/// Model file contents: the scoring function plus the reference point used
/// when attributing a prediction to individual features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(flatten)]
    pub kind: ModelKind,
    /// Per-feature reference values; features not listed default to 0.
    #[serde(default)]
    pub baseline: BTreeMap<String, f64>,
}

impl ModelDefinition {
    fn validate(&self, columns: &[String]) -> Result<(), String> {
        match &self.kind {
            ModelKind::Linear(linear) => {
                if let Some(name) = linear.coefficients.keys().find(|k| !columns.contains(*k)) {
                    return Err(format!("coefficient for unknown column '{name}'"));
                }
                if !linear.intercept.is_finite()
                    || linear.coefficients.values().any(|c| !c.is_finite())
                {
                    return Err("non-finite parameter".to_string());
                }
            }
            ModelKind::TreeEnsemble(ensemble) => {
                for (t, tree) in ensemble.trees.iter().enumerate() {
                    tree.validate(columns).map_err(|e| format!("tree {t}: {e}"))?;
                }
            }
        }
        if let Some(name) = self.baseline.keys().find(|k| !columns.contains(*k)) {
            return Err(format!("baseline for unknown column '{name}'"));
        }
        Ok(())
    }
}

impl Scorer for ModelDefinition {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        match &self.kind {
            ModelKind::Linear(m) => m.predict(features),
            ModelKind::TreeEnsemble(m) => m.predict(features),
        }
    }
}

/// A model together with its input schema and benchmark metrics.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub name: String,
    pub definition: ModelDefinition,
    pub columns: Vec<String>,
    pub benchmark: BTreeMap<String, f64>,
}

impl LoadedModel {
    pub fn new(
        name: impl Into<String>,
        definition: ModelDefinition,
        columns: Vec<String>,
        benchmark: BTreeMap<String, f64>,
    ) -> Result<Self, ModelLoadError> {
        let name = name.into();
        definition
            .validate(&columns)
            .map_err(|reason| ModelLoadError::InvalidDefinition {
                model: name.clone(),
                reason,
            })?;
        Ok(Self {
            name,
            definition,
            columns,
            benchmark,
        })
    }

    /// Mean absolute error from the benchmark; 0 when not reported.
    pub fn mae(&self) -> f64 {
        self.benchmark.get("MAE").copied().unwrap_or(0.0)
    }

    pub fn baseline(&self) -> &BTreeMap<String, f64> {
        &self.definition.baseline
    }
}

impl Scorer for LoadedModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        self.definition.predict(features)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("model '{model}' is invalid: {reason}")]
    InvalidDefinition { model: String, reason: String },
}

/// Immutable set of models keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<LoadedModel>>,
}

impl ModelRegistry {
    pub fn from_models(models: impl IntoIterator<Item = LoadedModel>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|m| (m.name.clone(), Arc::new(m)))
                .collect(),
        }
    }

    /// Load every `<name>.json` in `dir` along with its companion files.
    pub fn load_dir(dir: &Path) -> Result<Self, ModelLoadError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ModelLoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ModelLoadError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.ends_with(COLUMNS_SUFFIX) || file_name.ends_with(BENCHMARK_SUFFIX) {
                continue;
            }
            if let Some(name) = file_name.strip_suffix(".json") {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut models = Vec::with_capacity(names.len());
        for name in names {
            let definition: ModelDefinition = read_json(&dir.join(format!("{name}.json")))?;
            let columns: Vec<String> = read_json(&dir.join(format!("{name}{COLUMNS_SUFFIX}")))?;
            let benchmark: BTreeMap<String, f64> =
                read_json(&dir.join(format!("{name}{BENCHMARK_SUFFIX}")))?;

            tracing::info!(model = %name, columns = columns.len(), "loaded model");
            models.push(LoadedModel::new(name, definition, columns, benchmark)?);
        }

        Ok(Self::from_models(models))
    }

    pub fn get(&self, name: &str) -> Option<Arc<LoadedModel>> {
        self.models.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedModel> {
        self.models.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ModelLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Vec<String> {
        vec!["age".to_string(), "bmi".to_string(), "smoker_yes".to_string()]
    }

    fn linear() -> ModelDefinition {
        serde_json::from_value(json!({
            "kind": "linear",
            "intercept": 1000.0,
            "coefficients": {"age": 200.0, "bmi": 50.0, "smoker_yes": 20000.0},
            "baseline": {"age": 39.0}
        }))
        .unwrap()
    }

    fn ensemble() -> ModelDefinition {
        serde_json::from_value(json!({
            "kind": "tree_ensemble",
            "base_score": 5000.0,
            "trees": [
                {"nodes": [
                    {"feature": "smoker_yes", "threshold": 0.5, "left": 1, "right": 2},
                    {"value": 0.0},
                    {"value": 20000.0}
                ]},
                {"nodes": [
                    {"feature": "age", "threshold": 40.0, "left": 1, "right": 2},
                    {"value": -1000.0},
                    {"value": 3000.0}
                ]}
            ]
        }))
        .unwrap()
    }

    fn features(age: f64, bmi: f64, smoker: f64) -> FeatureVector {
        [("age", age), ("bmi", bmi), ("smoker_yes", smoker)]
            .into_iter()
            .collect()
    }

    #[test]
    fn linear_model_scores_weighted_sum() {
        let score = linear().predict(&features(30.0, 20.0, 1.0)).unwrap();
        assert_eq!(score, 1000.0 + 6000.0 + 1000.0 + 20000.0);
    }

    #[test]
    fn linear_model_reports_missing_feature() {
        let partial: FeatureVector = [("age", 30.0)].into_iter().collect();
        assert!(matches!(
            linear().predict(&partial),
            Err(ScoreError::MissingFeature(name)) if name == "bmi"
        ));
    }

    #[test]
    fn tree_ensemble_walks_each_tree() {
        let model = ensemble();
        assert_eq!(model.predict(&features(30.0, 20.0, 0.0)).unwrap(), 4000.0);
        assert_eq!(model.predict(&features(45.0, 20.0, 1.0)).unwrap(), 28000.0);
        // Threshold equality goes right.
        assert_eq!(model.predict(&features(40.0, 20.0, 0.0)).unwrap(), 8000.0);
    }

    #[test]
    fn rejects_backward_child_index() {
        let definition: ModelDefinition = serde_json::from_value(json!({
            "kind": "tree_ensemble",
            "trees": [{"nodes": [
                {"feature": "age", "threshold": 1.0, "left": 0, "right": 1},
                {"value": 1.0}
            ]}]
        }))
        .unwrap();
        let err = LoadedModel::new("cyclic", definition, columns(), BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ModelLoadError::InvalidDefinition { .. }));
    }

    #[test]
    fn rejects_coefficient_for_unknown_column() {
        let err = LoadedModel::new(
            "linear",
            linear(),
            vec!["age".to_string(), "bmi".to_string()],
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("smoker_yes"));
    }

    #[test]
    fn mae_defaults_to_zero() {
        let model = LoadedModel::new("linear", linear(), columns(), BTreeMap::new()).unwrap();
        assert_eq!(model.mae(), 0.0);
    }

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        std::fs::write(dir.join(name), value.to_string()).unwrap();
    }

    #[test]
    fn loads_models_with_companion_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "linear.json", serde_json::to_value(linear()).unwrap());
        write(dir.path(), "linear_columns.json", json!(columns()));
        write(dir.path(), "linear_benchmark.json", json!({"MAE": 4181.19, "R2": 0.78}));
        write(dir.path(), "forest.json", serde_json::to_value(ensemble()).unwrap());
        write(dir.path(), "forest_columns.json", json!(columns()));
        write(dir.path(), "forest_benchmark.json", json!({"MAE": 2550.0}));
        std::fs::write(dir.path().join("README.md"), "not a model").unwrap();

        let registry = ModelRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
        let names: Vec<&str> = registry.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["forest", "linear"]);

        let model = registry.get("linear").unwrap();
        assert_eq!(model.mae(), 4181.19);
        assert_eq!(model.baseline().get("age"), Some(&39.0));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn missing_companion_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "linear.json", serde_json::to_value(linear()).unwrap());
        write(dir.path(), "linear_columns.json", json!(columns()));

        let err = ModelRegistry::load_dir(dir.path()).unwrap_err();
        match err {
            ModelLoadError::Io { path, .. } => {
                assert!(path.ends_with("linear_benchmark.json"))
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
