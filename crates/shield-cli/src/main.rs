use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shield::hazard::{HazardData, StaticHazardData};
use shield::prompt_template::SystemInstruction;
use shield::providers::factory::get_provider;
use shield::Session;

mod configuration;
mod error;
mod prompt;
mod repl;
mod speech;

use configuration::Settings;
use repl::{spawn_effect_listener, Repl};
use speech::{CommandRecognizer, CommandSynthesizer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file layered under SHIELD_* environment variables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Basin to start in (ni, na, ep, wp, si, au, sp)
    #[arg(short, long)]
    region: Option<String>,

    /// Start with spoken replies muted
    #[arg(long)]
    mute: bool,

    /// Tera template replacing the bundled system instruction
    #[arg(long)]
    system_template: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shield=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::new(),
    }
    .context("Failed to load configuration")?;

    let provider_config = settings.provider.into_config();
    let provider = get_provider(provider_config.clone())?;
    let briefing_provider = get_provider(provider_config)?;
    let hazards: Arc<dyn HazardData> = Arc::new(StaticHazardData::new());

    let mut builder = Session::builder(provider)
        .region(cli.region.unwrap_or(settings.agent.initial_region.clone()))
        .model_timeout(settings.agent.model_timeout())
        .hazards(Arc::clone(&hazards))
        .muted(cli.mute || settings.agent.muted);
    if let Some(template) = cli.system_template.or(settings.agent.system_template) {
        builder = builder.instruction(SystemInstruction::from_file(template));
    }
    if let Some(command) = settings.voice.speak_command {
        builder = builder.synthesizer(Arc::new(CommandSynthesizer::new(command)));
    }
    if let Some(command) = settings.voice.listen_command {
        builder = builder.recognizer(Arc::new(CommandRecognizer::new(command)));
    }
    let (session, receiver) = builder.build()?;

    let listener = spawn_effect_listener(session.clone(), receiver);
    let mut repl = Repl::new(session, briefing_provider, hazards);
    let result = repl.start().await;
    listener.abort();
    result
}
