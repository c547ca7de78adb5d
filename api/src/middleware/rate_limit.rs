use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode, header};
use axum::response::IntoResponse;
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

use assura_core::error::codes;

type RateLimitLayer = GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, Body>;

fn ip_layer(replenish: Duration, burst: u32, name: &str) -> RateLimitLayer {
    let config = GovernorConfigBuilder::default()
        .period(replenish)
        .burst_size(burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| panic!("invalid governor config for {name}"));
    GovernorLayer::new(config).error_handler(json_error_handler)
}

/// Rate limit for POST /v1/models/{model_name}/predict: 60 requests/minute per IP.
pub fn predict_layer() -> RateLimitLayer {
    ip_layer(Duration::from_secs(1), 20, "predict")
}

/// Rate limit for /v1/predictions: 120 requests/minute per IP.
pub fn history_layer() -> RateLimitLayer {
    ip_layer(Duration::from_millis(500), 30, "history")
}

/// Returns the ApiError JSON shape with a Retry-After header when throttled.
fn json_error_handler(err: GovernorError) -> Response<Body> {
    let (status, retry_after, message) = match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Some(wait_time),
            format!("Too many requests. Retry after {wait_time} seconds."),
        ),
        GovernorError::UnableToExtractKey => (
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "Unable to determine client identity for rate limiting".to_string(),
        ),
        GovernorError::Other { code, msg, .. } => (code, None, msg.unwrap_or_default()),
    };

    let body = serde_json::json!({
        "error": codes::RATE_LIMITED,
        "message": message,
        "request_id": uuid::Uuid::now_v7().to_string(),
    });

    let mut response = (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body.to_string(),
    )
        .into_response();

    if let Some(wait) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(wait));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn throttled_response_is_json_with_retry_after() {
        let response = json_error_handler(GovernorError::TooManyRequests {
            wait_time: 7,
            headers: None,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from(7u64))
        );

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("body should be json");
        assert_eq!(body["error"], "rate_limited");
    }

    #[test]
    fn layers_build() {
        let _ = predict_layer();
        let _ = history_layer();
    }
}
