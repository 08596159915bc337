//! # Playerwatch
//!
//! Finds display players that have been offline too long and mails one
//! report per store.
//!
//! Usage:
//!   playerwatch run                      # One run now, print the result
//!   playerwatch serve                    # HTTP trigger + cron schedule
//!   playerwatch check-config             # Validate config and templates
//!   playerwatch --config ./pw.toml run   # Custom config file

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use playerwatch_channels::{HttpFetcher, Mailer, TemplateLoader};
use playerwatch_core::config::{AppConfig, Mode, format_duration};
use playerwatch_core::{PlayerwatchConfig, Trigger};
use playerwatch_gateway::AppState;
use playerwatch_pipeline::{Pipeline, RunResponse};
use playerwatch_scheduler::{Schedule, spawn_scheduler};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "playerwatch",
    version,
    about = "📺 Playerwatch: offline display player reports"
)]
struct Cli {
    /// Path to config file (default: ~/.playerwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and print the response.
    Run,
    /// Serve the HTTP trigger and, if `app.schedule` is set, the timer.
    Serve,
    /// Load and validate the config, then print a summary.
    CheckConfig,
}

fn load_config(path: Option<&str>) -> Result<PlayerwatchConfig> {
    let mut config = match path {
        Some(p) => PlayerwatchConfig::load_from(Path::new(&shellexpand::tilde(p).to_string()))?,
        None => PlayerwatchConfig::load()?,
    };
    config.apply_env()?;
    Ok(config)
}

fn init_logging(app: &AppConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&app.log_level))
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if app.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_pipeline(config: &PlayerwatchConfig) -> Result<Arc<Pipeline>> {
    let client = reqwest::Client::builder()
        .timeout(config.app.run_timeout)
        .build()?;
    let fetcher = HttpFetcher::new(client, &config.data.url, &config.data.api_key);

    let loader = TemplateLoader::new(shellexpand::tilde(&config.mail.templates_dir).to_string())?;
    let mailer = Mailer::new(config.mail.clone(), &loader)?;

    Ok(Arc::new(Pipeline::new(
        Arc::new(fetcher),
        Arc::new(mailer),
        config,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.app, cli.verbose);
    tracing::info!(
        version = %config.app.version,
        mode = ?config.app.mode,
        "📺 Playerwatch starting"
    );
    if config.app.mode == Mode::Dev {
        tracing::debug!(config = ?config.redacted(), "Effective config");
    }
    config.validate()?;

    match cli.command {
        Commands::Run => {
            let pipeline = build_pipeline(&config)?;
            let response = RunResponse::from_result(pipeline.run(Trigger::Manual).await);
            println!("{}", serde_json::to_string_pretty(&response)?);
            if response.status_code != 200 {
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            let pipeline = build_pipeline(&config)?;

            if let Some(expression) = &config.app.schedule {
                let schedule = Schedule::parse(expression)?;
                let timer_pipeline = pipeline.clone();
                tokio::spawn(spawn_scheduler(schedule, move || {
                    let pipeline = timer_pipeline.clone();
                    async move {
                        pipeline
                            .run(Trigger::Timer)
                            .await
                            .map(|s| {
                                format!("{} stores, {} sent, {} failed", s.stores, s.sent, s.failed)
                            })
                            .map_err(|e| e.to_string())
                    }
                }));
            } else {
                tracing::info!("No app.schedule set, timer trigger disabled");
            }

            playerwatch_gateway::start(&config.gateway, AppState::new(pipeline)).await?;
        }
        Commands::CheckConfig => {
            let loader = TemplateLoader::new(shellexpand::tilde(&config.mail.templates_dir).to_string())?;
            let template = loader.load(&config.mail.template_name)?;
            if let Some(expression) = &config.app.schedule {
                Schedule::parse(expression)?;
            }

            println!("✅ Config OK\n");
            println!("  Version:           {}", config.app.version);
            println!("  Mode:              {:?}", config.app.mode);
            println!("  Data URL:          {}", config.data.url);
            println!("  Max offline:       {}", format_duration(config.data.max_offline));
            println!("  Allowed companies: {}", config.data.allowed_companies.join(", "));
            println!("  Recipients:        {}", config.mail.to.join(", "));
            println!("  Template:          {}", template.name());
            println!("  Max concurrency:   {}", config.app.max_concurrency);
            println!(
                "  Schedule:          {}",
                config.app.schedule.as_deref().unwrap_or("(none)")
            );
            println!(
                "  Gateway:           http://{}:{}",
                config.gateway.host, config.gateway.port
            );
        }
    }

    Ok(())
}
