mod audio;
mod batch;
mod config;
mod dialogue;
mod inference;

use serde::Deserialize;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use crate::batch::{FileOutcome, Orchestrator};
use crate::config::Config;
use crate::inference::HttpSynthesizer;

#[derive(Deserialize, Debug)]
struct Environment {
    inference_api_key: Option<String>,
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "dialogue-to-speech",
    about = "Convert a folder of JSON dialogues to WAV files"
)]
struct Args {
    /// Path to the batch configuration TOML file (defaults to ./dialogue-to-speech.toml when present)
    #[structopt(short = "c", long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dialogue_to_speech=info")),
        )
        .init();

    dotenv::dotenv().ok();
    let environment = envy::from_env::<Environment>()?;
    let args = Args::from_args();

    let config = Config::load(args.config.as_deref()).await?;
    let synthesizer = HttpSynthesizer::new(&config.inference, environment.inference_api_key)?;

    let summary = Orchestrator::new(config, synthesizer).run().await?;
    if summary.reports.is_empty() {
        return Ok(());
    }

    for report in &summary.reports {
        if let FileOutcome::Failed { stage, reason } = &report.outcome {
            println!(
                "  {} ({}) failed during {stage}: {reason}",
                report.name,
                report.input.display()
            );
        }
    }

    println!(
        "Done: {} saved, {} skipped, {} failed.",
        summary.succeeded(),
        summary.skipped(),
        summary.failed()
    );

    Ok(())
}
