use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use personachat_cli::app::{self, ChatOptions};
use personachat_core::llm::DEFAULT_TEMPERATURE;
use personachat_core::{ConfigStore, ModelSettings};

#[derive(Parser)]
#[command(name = "personachat")]
#[command(about = "PersonaChat - persona chat client with resumable sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Model settings file to use instead of choosing from the settings directory
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Preset (persona) name for new conversations
    #[arg(short, long, default_value = "assistant")]
    preset: String,

    /// Sampling temperature
    #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,
}

#[derive(Subcommand)]
enum Command {
    /// Create a model settings file in the settings directory
    NewSettings {
        /// Model name or identifier
        #[arg(long)]
        model: String,

        /// API key (may be left empty for local servers)
        #[arg(long, default_value = "")]
        api_key: String,

        /// API endpoint URL
        #[arg(long)]
        url: String,

        /// Replace an existing file with the same name
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = ConfigStore::from_env();

    match cli.command {
        Some(Command::NewSettings {
            model,
            api_key,
            url,
            force,
        }) => {
            let settings = ModelSettings::new(model, api_key, url);
            let path = app::create_settings(&config, &settings, force)?;
            println!("Settings file created: {}", path.display());
        }
        None => {
            let options = ChatOptions {
                settings_file: cli.settings,
                preset: cli.preset,
                temperature: cli.temperature,
            };
            app::run_chat(&config, options).await?;
        }
    }

    Ok(())
}
