use clap::Args;

use crate::util::api_request;

#[derive(Args)]
pub struct HistoryArgs {
    /// Page number (1-based)
    #[arg(long)]
    pub page: Option<u32>,
    /// Items per page (1-100, default 10)
    #[arg(long)]
    pub limit: Option<u32>,
    /// Only predictions made with this model
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long, value_parser = ["male", "female"])]
    pub sex: Option<String>,
    /// Filter on smoker status (true/false)
    #[arg(long)]
    pub smoker: Option<bool>,
    #[arg(long, value_parser = ["northeast", "northwest", "southeast", "southwest"])]
    pub region: Option<String>,
    #[arg(long)]
    pub age_min: Option<u32>,
    #[arg(long)]
    pub age_max: Option<u32>,
    #[arg(long)]
    pub children_min: Option<u32>,
    #[arg(long)]
    pub children_max: Option<u32>,
    /// List the model names known to the history store instead
    #[arg(long, conflicts_with_all = ["page", "limit", "model"])]
    pub model_names: bool,
}

impl HistoryArgs {
    fn query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                query.push((key.to_string(), v));
            }
        };
        push("page", self.page.map(|v| v.to_string()));
        push("limit", self.limit.map(|v| v.to_string()));
        push("model_name", self.model.clone());
        push("sex", self.sex.clone());
        push("smoker", self.smoker.map(|v| v.to_string()));
        push("region", self.region.clone());
        push("age_min", self.age_min.map(|v| v.to_string()));
        push("age_max", self.age_max.map(|v| v.to_string()));
        push("children_min", self.children_min.map(|v| v.to_string()));
        push("children_max", self.children_max.map(|v| v.to_string()));
        query
    }
}

pub async fn run(api_url: &str, args: HistoryArgs) -> i32 {
    if args.model_names {
        return api_request(api_url, reqwest::Method::GET, "/v1/model-names", &[], None).await;
    }
    api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/predictions",
        &args.query(),
        None,
    )
    .await
}
