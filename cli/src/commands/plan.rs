use clap::Args;
use serde_json::json;

use assura_core::plan::{PlanResponse, compute_plan};
use assura_core::thresholds::RiskThresholds;

use crate::util::{exit_error, print_json};

/// Price a plan locally, without contacting the API.
#[derive(Args)]
pub struct PlanArgs {
    /// Predicted annual cost
    #[arg(long, allow_negative_numbers = true)]
    pub prediction: f64,
    /// Lower risk cut point
    #[arg(long)]
    pub q1: f64,
    /// Upper risk cut point
    #[arg(long)]
    pub q2: f64,
}

fn price(args: &PlanArgs) -> Result<serde_json::Value, String> {
    if !args.prediction.is_finite() {
        return Err(format!("prediction must be finite, got {}", args.prediction));
    }
    let thresholds = RiskThresholds::new(args.q1, args.q2).map_err(|e| e.to_string())?;
    let tier = thresholds.classify_risk(args.prediction);
    let plan = PlanResponse::from(&compute_plan(args.prediction, tier));
    Ok(json!({
        "risk_level": tier,
        "plan": plan,
    }))
}

pub fn run(args: PlanArgs) -> i32 {
    match price(&args) {
        Ok(output) => {
            print_json(&output);
            0
        }
        Err(message) => exit_error(&message, Some("Use --q1 <= --q2 and finite numbers.")),
    }
}
