use clap::Args;
use serde_json::json;

use crate::util::{api_request, api_request_value, print_json};

#[derive(Args)]
pub struct PredictArgs {
    /// Model to score with (see `assura models`)
    #[arg(long)]
    pub model: String,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    /// Age in years (0-120)
    #[arg(long)]
    pub age: u32,
    #[arg(long, value_parser = ["male", "female"])]
    pub sex: String,
    /// Body mass index
    #[arg(long)]
    pub bmi: f64,
    /// Number of dependent children
    #[arg(long, default_value_t = 0)]
    pub children: u32,
    #[arg(long)]
    pub smoker: bool,
    #[arg(long, value_parser = ["northeast", "northwest", "southeast", "southwest"])]
    pub region: String,
    /// Store the prediction in the history after computing it
    #[arg(long)]
    pub save: bool,
}

impl PredictArgs {
    fn profile(&self) -> serde_json::Value {
        let mut profile = json!({
            "age": self.age,
            "sex": self.sex,
            "bmi": self.bmi,
            "children": self.children,
            "smoker": self.smoker,
            "region": self.region,
        });
        if let Some(first) = &self.first_name {
            profile["first_name"] = json!(first);
        }
        if let Some(last) = &self.last_name {
            profile["last_name"] = json!(last);
        }
        profile
    }
}

pub async fn run(api_url: &str, args: PredictArgs) -> i32 {
    let profile = args.profile();
    let path = format!("/v1/models/{}/predict", args.model);

    if !args.save {
        return api_request(api_url, reqwest::Method::POST, &path, &[], Some(&profile)).await;
    }

    let response = match api_request_value(api_url, reqwest::Method::POST, &path, Some(&profile)).await {
        Ok(body) => body,
        Err(code) => return code,
    };

    let record = json!({
        "profile": profile,
        "response": response,
        "model_name": args.model,
    });
    match api_request_value(api_url, reqwest::Method::POST, "/v1/predictions", Some(&record)).await {
        Ok(saved) => {
            print_json(&json!({
                "id": saved["id"],
                "prediction": response,
            }));
            0
        }
        Err(code) => code,
    }
}
