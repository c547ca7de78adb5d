//! Applicant profile and its encoding into a model feature vector.
//!
//! Categorical fields are one-hot encoded against a fixed baseline category
//! (`female` for sex, `northeast` for region), so the encoded layout is:
//! `age, bmi, children, sex_male, smoker_yes, region_northwest,
//! region_southeast, region_southwest`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_AGE: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Region::Northeast => "northeast",
            Region::Northwest => "northwest",
            Region::Southeast => "southeast",
            Region::Southwest => "southwest",
        }
    }
}

/// Personal details submitted for a cost prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InsuranceProfile {
    /// Only stored when the client opts in to saving identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Age in years, 0..=120
    pub age: u32,
    pub sex: Sex,
    /// Body mass index, strictly positive
    pub bmi: f64,
    /// Number of dependent children
    pub children: u32,
    pub smoker: bool,
    pub region: Region,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("age must be between 0 and {max}, got {0}", max = MAX_AGE)]
    AgeOutOfRange(u32),
    #[error("bmi must be a positive finite number, got {0}")]
    InvalidBmi(f64),
    #[error("encoded columns do not match the model (missing: {missing:?}, unexpected: {unexpected:?})")]
    ColumnMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

impl ProfileError {
    /// Request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ProfileError::AgeOutOfRange(_) => "age",
            ProfileError::InvalidBmi(_) => "bmi",
            ProfileError::ColumnMismatch { .. } => "body",
        }
    }
}

impl InsuranceProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.age > MAX_AGE {
            return Err(ProfileError::AgeOutOfRange(self.age));
        }
        if !self.bmi.is_finite() || self.bmi <= 0.0 {
            return Err(ProfileError::InvalidBmi(self.bmi));
        }
        Ok(())
    }

    fn encoded(&self) -> [(&'static str, f64); 8] {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        [
            ("age", f64::from(self.age)),
            ("bmi", self.bmi),
            ("children", f64::from(self.children)),
            ("sex_male", flag(self.sex == Sex::Male)),
            ("smoker_yes", flag(self.smoker)),
            ("region_northwest", flag(self.region == Region::Northwest)),
            ("region_southeast", flag(self.region == Region::Southeast)),
            ("region_southwest", flag(self.region == Region::Southwest)),
        ]
    }

    /// Validate and encode into the column order a model expects.
    ///
    /// The encoded column set must equal `columns` exactly.
    pub fn to_model_input(&self, columns: &[String]) -> Result<FeatureVector, ProfileError> {
        self.validate()?;

        let encoded = self.encoded();
        let produced: BTreeSet<&str> = encoded.iter().map(|(name, _)| *name).collect();
        let expected: BTreeSet<&str> = columns.iter().map(String::as_str).collect();

        if produced != expected || expected.len() != columns.len() {
            return Err(ProfileError::ColumnMismatch {
                missing: expected
                    .difference(&produced)
                    .map(|s| s.to_string())
                    .collect(),
                unexpected: produced
                    .difference(&expected)
                    .map(|s| s.to_string())
                    .collect(),
            });
        }

        let entries = columns
            .iter()
            .filter_map(|column| {
                encoded
                    .iter()
                    .find(|(name, _)| *name == column.as_str())
                    .map(|(name, value)| (name.to_string(), *value))
            })
            .collect();
        Ok(FeatureVector::new(entries))
    }
}

/// Named numeric features in model column order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    entries: Vec<(String, f64)>,
}

impl FeatureVector {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Copy of this vector with `name` set to `value`. No-op if absent.
    pub fn with_value(&self, name: &str, value: f64) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(n, v)| (n.clone(), if n == name { value } else { *v }))
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: [&str; 8] = [
        "age",
        "sex_male",
        "bmi",
        "children",
        "smoker_yes",
        "region_northwest",
        "region_southeast",
        "region_southwest",
    ];

    fn columns() -> Vec<String> {
        COLUMNS.iter().map(|s| s.to_string()).collect()
    }

    fn profile() -> InsuranceProfile {
        InsuranceProfile {
            first_name: None,
            last_name: None,
            age: 31,
            sex: Sex::Male,
            bmi: 27.5,
            children: 2,
            smoker: true,
            region: Region::Southwest,
        }
    }

    #[test]
    fn encodes_in_model_column_order() {
        let features = profile().to_model_input(&columns()).unwrap();
        let names: Vec<&str> = features.iter().map(|(n, _)| n).collect();
        assert_eq!(names, COLUMNS.to_vec());
        assert_eq!(features.get("age"), Some(31.0));
        assert_eq!(features.get("sex_male"), Some(1.0));
        assert_eq!(features.get("smoker_yes"), Some(1.0));
        assert_eq!(features.get("region_southwest"), Some(1.0));
        assert_eq!(features.get("region_northwest"), Some(0.0));
    }

    #[test]
    fn baseline_region_encodes_all_zero() {
        let mut p = profile();
        p.region = Region::Northeast;
        p.sex = Sex::Female;
        let features = p.to_model_input(&columns()).unwrap();
        for name in ["sex_male", "region_northwest", "region_southeast", "region_southwest"] {
            assert_eq!(features.get(name), Some(0.0), "{name}");
        }
    }

    #[test]
    fn rejects_column_mismatch() {
        let mut cols = columns();
        cols.retain(|c| c != "children");
        cols.push("income".to_string());
        match profile().to_model_input(&cols) {
            Err(ProfileError::ColumnMismatch {
                missing,
                unexpected,
            }) => {
                assert_eq!(missing, vec!["income".to_string()]);
                assert_eq!(unexpected, vec!["children".to_string()]);
            }
            other => panic!("expected column mismatch, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_columns() {
        let mut cols = columns();
        cols.push("age".to_string());
        assert!(matches!(
            profile().to_model_input(&cols),
            Err(ProfileError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut p = profile();
        p.age = 121;
        assert!(matches!(p.validate(), Err(ProfileError::AgeOutOfRange(121))));

        let mut p = profile();
        p.bmi = 0.0;
        let err = p.validate().unwrap_err();
        assert_eq!(err.field(), "bmi");

        let mut p = profile();
        p.bmi = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn deserializes_lowercase_enums() {
        let p: InsuranceProfile = serde_json::from_str(
            r#"{"age":40,"sex":"female","bmi":22.0,"children":0,"smoker":false,"region":"northwest"}"#,
        )
        .unwrap();
        assert_eq!(p.sex, Sex::Female);
        assert_eq!(p.region, Region::Northwest);
        assert!(p.first_name.is_none());
    }

    #[test]
    fn with_value_replaces_single_feature() {
        let features: FeatureVector = [("age", 40.0), ("bmi", 22.0)].into_iter().collect();
        let replaced = features.with_value("bmi", 0.0);
        assert_eq!(replaced.get("bmi"), Some(0.0));
        assert_eq!(replaced.get("age"), Some(40.0));
        assert_eq!(features.get("bmi"), Some(22.0));
    }
}
