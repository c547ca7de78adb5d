use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::attribution::TopFactor;
use crate::profile::{InsuranceProfile, Region, Sex};
use crate::recommendation::PredictionResponse;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Request to persist a prediction the client has already received.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePredictionRequest {
    pub profile: InsuranceProfile,
    pub response: PredictionResponse,
    /// Registered model that produced the response
    pub model_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePredictionResponse {
    pub id: i64,
}

/// A stored prediction. Records are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PredictionRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub age: i32,
    pub sex: String,
    pub bmi: f64,
    pub children: i32,
    pub smoker: bool,
    pub region: String,
    pub prediction: f64,
    pub interval_min: f64,
    pub interval_max: f64,
    pub mae: f64,
    pub risk_level: String,
    pub plan_name: String,
    pub franchise: f64,
    /// Rounded amount as text, or "Infinite"
    pub ceiling: String,
    pub refund_estimate: f64,
    pub annual_price: f64,
    pub monthly_price: f64,
    pub suggestions: Vec<String>,
    pub top_factors: Vec<TopFactor>,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

/// Filters and paging for the prediction history.
///
/// Equality filters: `model_name`, `sex`, `smoker`, `region`.
/// Inclusive ranges: `age_min..=age_max`, `children_min..=children_max`.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PredictionQuery {
    /// 1-based page number (default 1)
    pub page: Option<u32>,
    /// Page size (default 10, max 100)
    pub limit: Option<u32>,
    pub model_name: Option<String>,
    pub sex: Option<Sex>,
    pub smoker: Option<bool>,
    pub region: Option<Region>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub children_min: Option<u32>,
    pub children_max: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{field}_min ({min}) must not exceed {field}_max ({max})")]
    InvertedRange {
        field: &'static str,
        min: u32,
        max: u32,
    },
}

impl QueryError {
    pub fn field(&self) -> String {
        match self {
            QueryError::InvertedRange { field, .. } => format!("{field}_min"),
        }
    }
}

impl PredictionQuery {
    /// Check range filters and resolve paging defaults.
    pub fn validate(&self) -> Result<PageRequest, QueryError> {
        check_range("age", self.age_min, self.age_max)?;
        check_range("children", self.children_min, self.children_max)?;
        Ok(PageRequest::new(self.page, self.limit))
    }
}

fn check_range(field: &'static str, min: Option<u32>, max: Option<u32>) -> Result<(), QueryError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(QueryError::InvertedRange { field, min, max }),
        _ => Ok(()),
    }
}

/// Normalized paging: `page >= 1`, `1 <= limit <= MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

/// Page-numbered result set.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    /// Number of records matching the filters across all pages
    pub total: i64,
    pub page: u32,
    /// Total page count; at least 1 even when nothing matches
    pub pages: u32,
    pub limit: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let limit = i64::from(request.limit);
        let pages = ((total.max(0) + limit - 1) / limit).max(1);
        Self {
            items,
            total,
            page: request.page,
            pages: u32::try_from(pages).unwrap_or(u32::MAX),
            limit: request.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults() {
        let page = PredictionQuery::default().validate().unwrap();
        assert_eq!(page, PageRequest { page: 1, limit: 10 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(
            PageRequest::new(Some(3), Some(5000)),
            PageRequest { page: 3, limit: 100 }
        );
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn page_count_rounds_up() {
        let request = PageRequest::new(Some(1), Some(10));
        assert_eq!(Paginated::<()>::new(vec![], 0, request).pages, 1);
        assert_eq!(Paginated::<()>::new(vec![], 10, request).pages, 1);
        assert_eq!(Paginated::<()>::new(vec![], 11, request).pages, 2);
        assert_eq!(Paginated::<()>::new(vec![], 95, request).pages, 10);
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let query = PredictionQuery {
            age_min: Some(50),
            age_max: Some(30),
            ..Default::default()
        };
        let err = query.validate().unwrap_err();
        assert_eq!(err.field(), "age_min");

        let query = PredictionQuery {
            children_min: Some(3),
            children_max: Some(1),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn open_and_equal_ranges_are_accepted() {
        let query = PredictionQuery {
            age_min: Some(30),
            age_max: Some(30),
            children_max: Some(2),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
    }
}
