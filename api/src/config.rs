use std::path::PathBuf;

use assura_core::thresholds::{RiskThresholds, ThresholdError};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_REFERENCE_DATA: &str = "data/insurance.csv";
const DEFAULT_REFERENCE_COLUMN: &str = "charges";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
    #[error("ASSURA_RISK_Q1 and ASSURA_RISK_Q2 must be set together")]
    PartialThresholds,
}

/// Where the risk thresholds come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdSource {
    Explicit { q1: f64, q2: f64 },
    Reference { path: PathBuf, column: String },
}

impl ThresholdSource {
    pub fn load(&self) -> Result<RiskThresholds, ThresholdError> {
        match self {
            ThresholdSource::Explicit { q1, q2 } => RiskThresholds::new(*q1, *q2),
            ThresholdSource::Reference { path, column } => {
                RiskThresholds::from_csv_path(path, column)
            }
        }
    }
}

/// Process configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub models_dir: PathBuf,
    pub thresholds: ThresholdSource,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let models_dir = lookup("ASSURA_MODELS_DIR")
            .unwrap_or_else(|| DEFAULT_MODELS_DIR.to_string())
            .into();

        let q1 = parse_optional_f64(&lookup, "ASSURA_RISK_Q1")?;
        let q2 = parse_optional_f64(&lookup, "ASSURA_RISK_Q2")?;
        let thresholds = match (q1, q2) {
            (Some(q1), Some(q2)) => ThresholdSource::Explicit { q1, q2 },
            (None, None) => ThresholdSource::Reference {
                path: lookup("ASSURA_REFERENCE_DATA")
                    .unwrap_or_else(|| DEFAULT_REFERENCE_DATA.to_string())
                    .into(),
                column: lookup("ASSURA_REFERENCE_COLUMN")
                    .unwrap_or_else(|| DEFAULT_REFERENCE_COLUMN.to_string()),
            },
            _ => return Err(ConfigError::PartialThresholds),
        };

        Ok(Self {
            database_url,
            port,
            models_dir,
            thresholds,
        })
    }
}

fn parse_optional_f64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<f64>, ConfigError> {
    lookup(var)
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| ConfigError::Invalid { var, value: raw })
        })
        .transpose()
}
