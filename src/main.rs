use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use medv_serve::config::load_config;
use medv_serve::features::RawFeatures;
use medv_serve::pipeline::Pipeline;
use medv_serve::state::AppState;
use medv_serve::web;
use medv_serve::MedvError;

#[derive(Parser, Debug)]
#[command(author, version, about = "Median home value prediction service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured bind port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Check configuration and artifacts, then exit
    Validate,
    /// Score one JSON request from a file or stdin and print the result
    Predict {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config()?;
    info!(addr = %config.bind_addr(), "configuration loaded");

    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let state = AppState::initialize(config)?;
            web::serve(state).await
        }
        Command::Validate => {
            let pipeline = Pipeline::load(&config.scaler_path, &config.model_path)?;
            println!("configuration OK ({})", config.bind_addr());
            println!(
                "artifacts OK ({} trees, learning rate {})",
                pipeline.tree_count(),
                pipeline.learning_rate()
            );
            Ok(())
        }
        Command::Predict { input } => {
            let text = match input {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("cannot read stdin")?;
                    buffer
                }
            };
            let parsed: Value = serde_json::from_str(&text)
                .map_err(|_| MedvError::validation("body", "input is not valid JSON"))?;
            let object = parsed
                .as_object()
                .ok_or_else(|| MedvError::validation("body", "input must be a JSON object"))?;
            let raw = RawFeatures::from_json(object)?;

            let pipeline = Pipeline::load(&config.scaler_path, &config.model_path)?;
            let prediction = pipeline.predict(&raw)?;
            println!(
                "{}",
                json!({
                    "success": true,
                    "prediction": prediction,
                    "formatted": format!("{prediction:.2}"),
                })
            );
            Ok(())
        }
    }
}
