use crate::util::api_request;

/// List all loaded models, or show one when `name` is given.
pub async fn run(api_url: &str, name: Option<&str>) -> i32 {
    let path = match name {
        Some(n) => format!("/v1/models/{n}"),
        None => "/v1/models".to_string(),
    };
    api_request(api_url, reqwest::Method::GET, &path, &[], None).await
}
