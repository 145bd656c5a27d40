// Ideaforge - iterative idea refinement
// Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ideaforge::config::{load_config, Config, ProviderEntry};
use ideaforge::providers::{create_provider, LlmProvider, ScriptedProvider};
use ideaforge::refine::RefineLoop;
use ideaforge::server;
use ideaforge::session::RunSlot;

#[derive(Parser)]
#[command(name = "ideaforge")]
#[command(version, about = "Enhance a prompt, generate ideas, critique and refine them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Config file (default: ~/.ideaforge/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Bind address, overrides the config file
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run the loop once and print the result as JSON
    Run {
        /// Config file (default: ~/.ideaforge/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Use canned model replies instead of a real provider
        #[arg(long)]
        dry_run: bool,
        /// What to generate ideas about
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `run` output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ideaforge=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            config.validate()?;

            let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(&config.provider)?);
            let slot = RunSlot::new(build_loop(provider, &config)?);
            server::serve(slot, &config.server).await
        }

        Commands::Run {
            config,
            dry_run,
            prompt,
        } => {
            let (config, provider) = if dry_run {
                let config = dry_run_config(config.as_deref());
                let provider: Arc<dyn LlmProvider> = Arc::new(dry_run_provider(&config));
                (config, provider)
            } else {
                let config = load_config(config.as_deref())?;
                config.validate()?;
                let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(&config.provider)?);
                (config, provider)
            };

            let refine = build_loop(provider, &config)?;
            let result = refine.run(&prompt).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to serialize result")?
            );
            Ok(())
        }
    }
}

fn build_loop(provider: Arc<dyn LlmProvider>, config: &Config) -> Result<RefineLoop> {
    let persona = config.persona.resolve()?;
    tracing::info!(
        provider = provider.name(),
        model = provider.default_model(),
        persona = %persona.name,
        "Refinement loop ready"
    );
    Ok(RefineLoop::new(provider, persona, config.refine.clone())?)
}

/// Config file settings when one loads; defaults otherwise. No API key needed.
fn dry_run_config(path: Option<&std::path::Path>) -> Config {
    load_config(path).unwrap_or_else(|e| {
        tracing::debug!("Dry run without config: {:#}", e);
        Config::new(ProviderEntry::Gemini {
            api_key: "dry-run".to_string(),
            model: None,
            base_url: None,
        })
    })
}

/// Canned replies for a full run: one enhancement, then a generate/critique
/// pair per iteration with ratings rising 5 points each round.
fn dry_run_provider(config: &Config) -> ScriptedProvider {
    let provider = ScriptedProvider::new();
    provider.push_text("Generate a varied set of practical, specific ideas for the request.");

    let count = config.refine.ideas_min;
    for round in 0..config.refine.max_iterations {
        let ideas: Vec<serde_json::Value> = (1..=count)
            .map(|i| {
                serde_json::json!({
                    "title": format!("Sample idea {i} (round {})", round + 1),
                    "description": "A placeholder idea produced by the dry-run provider.",
                })
            })
            .collect();
        provider.push_text(serde_json::Value::Array(ideas).to_string());

        let rating = (60 + 5 * round).min(100);
        provider.push_text(
            serde_json::json!({
                "ratings": vec![rating; count],
                "feedback": "Dry run: make the ideas more specific.",
                "overallScore": "B",
            })
            .to_string(),
        );
    }
    provider
}
