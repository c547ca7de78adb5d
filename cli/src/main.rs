mod commands;
mod util;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "assura", version, about = "Assura CLI: insurance cost predictions and plan recommendations")]
struct Cli {
    /// API base URL
    #[arg(long, env = "ASSURA_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// List loaded models, or show one model's metrics and columns
    Models {
        /// Model name
        name: Option<String>,
    },
    /// Show plan tiers, margin and active risk thresholds
    Plans,
    /// Predict the cost for a profile and recommend a plan
    Predict(commands::predict::PredictArgs),
    /// Browse stored predictions
    History(commands::history::HistoryArgs),
    /// Price a plan offline from a prediction and thresholds
    Plan(commands::plan::PlanArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Models { name } => commands::models::run(&cli.api_url, name.as_deref()).await,
        Commands::Plans => commands::plans::run(&cli.api_url).await,
        Commands::Predict(args) => commands::predict::run(&cli.api_url, args).await,
        Commands::History(args) => commands::history::run(&cli.api_url, args).await,
        Commands::Plan(args) => commands::plan::run(args),
    };

    std::process::exit(code);
}
