//! Risk tiering: two quantile cut points split predicted costs into three bands.
//!
//! Thresholds are derived once from a reference distribution of historical costs
//! (33rd and 66th percentile) and never recomputed from live traffic.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const LOWER_QUANTILE: f64 = 0.33;
pub const UPPER_QUANTILE: f64 = 0.66;

/// Ordered risk band. Declaration order is the band order (`Lower < Moderate < High`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Lower,
    Moderate,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::Lower, RiskTier::Moderate, RiskTier::High];

    /// Wire form: `lower`, `moderate`, `high`.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Lower => "lower",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
        }
    }

    /// Capitalized form used as a plan name.
    pub fn display_name(self) -> &'static str {
        match self {
            RiskTier::Lower => "Lower",
            RiskTier::Moderate => "Moderate",
            RiskTier::High => "High",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("thresholds must be finite (q1={q1}, q2={q2})")]
    NonFinite { q1: f64, q2: f64 },
    #[error("q1 ({q1}) must not exceed q2 ({q2})")]
    Inverted { q1: f64, q2: f64 },
    #[error("reference sample is empty")]
    EmptySample,
    #[error("reference sample contains a non-finite value at row {row}")]
    NonFiniteSample { row: usize },
    #[error("column '{column}' not found in reference data header")]
    MissingColumn { column: String },
    #[error("row {row}: cannot parse '{value}' as a number")]
    InvalidValue { row: usize, value: String },
    #[error("failed to read reference data: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed reference CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Immutable pair of cut points with `q1 <= q2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct RiskThresholds {
    q1: f64,
    q2: f64,
}

impl RiskThresholds {
    pub fn new(q1: f64, q2: f64) -> Result<Self, ThresholdError> {
        if !q1.is_finite() || !q2.is_finite() {
            return Err(ThresholdError::NonFinite { q1, q2 });
        }
        if q1 > q2 {
            return Err(ThresholdError::Inverted { q1, q2 });
        }
        Ok(Self { q1, q2 })
    }

    /// Derive thresholds from a sample of historical costs.
    pub fn from_reference(sample: &[f64]) -> Result<Self, ThresholdError> {
        if sample.is_empty() {
            return Err(ThresholdError::EmptySample);
        }
        if let Some(row) = sample.iter().position(|v| !v.is_finite()) {
            return Err(ThresholdError::NonFiniteSample { row });
        }

        let mut sorted = sample.to_vec();
        sorted.sort_by(f64::total_cmp);

        Self::new(
            quantile_sorted(&sorted, LOWER_QUANTILE),
            quantile_sorted(&sorted, UPPER_QUANTILE),
        )
    }

    /// Read `column` from a CSV file and derive thresholds from it.
    pub fn from_csv_path(path: &Path, column: &str) -> Result<Self, ThresholdError> {
        let file = File::open(path)?;
        let sample = reference_sample_from_reader(file, column)?;
        Self::from_reference(&sample)
    }

    pub fn q1(&self) -> f64 {
        self.q1
    }

    pub fn q2(&self) -> f64 {
        self.q2
    }

    /// Strict `<` chaining: a prediction equal to a cut point lands in the higher band.
    pub fn classify_risk(&self, prediction: f64) -> RiskTier {
        if prediction < self.q1 {
            RiskTier::Lower
        } else if prediction < self.q2 {
            RiskTier::Moderate
        } else {
            RiskTier::High
        }
    }
}

/// Quantile with linear interpolation between the two nearest order statistics.
/// `sorted` must be non-empty and ascending.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    let fraction = position - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * fraction
}

/// Extract one numeric column from CSV with a header row.
/// Row numbers in errors are 1-based data rows.
pub fn reference_sample_from_csv(text: &str, column: &str) -> Result<Vec<f64>, ThresholdError> {
    reference_sample_from_reader(text.as_bytes(), column)
}

pub fn reference_sample_from_reader<R: Read>(
    reader: R,
    column: &str,
) -> Result<Vec<f64>, ThresholdError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let index = reader
        .headers()?
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| ThresholdError::MissingColumn {
            column: column.to_string(),
        })?;

    reader
        .records()
        .enumerate()
        .map(|(i, record)| {
            let record = record?;
            let raw = record.get(index).unwrap_or_default();
            raw.parse::<f64>().map_err(|_| ThresholdError::InvalidValue {
                row: i + 1,
                value: raw.to_string(),
            })
        })
        .collect()
}
