//! Delve CLI - ask a database a question
//!
//! Usage:
//!   delve ask "<question>" [--config <file>] [--offline] [--format json|text]
//!   delve config [--config <file>]
//!
//! Examples:
//!   delve ask "Who are the top 10 users by application usage?"
//!   delve ask "How many employees are in each department?" --format text
//!   delve ask "top 5 customers" --offline
//!
//! Logs go to stderr (filter with DELVE_LOG, default `info`); stdout carries
//! only the report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use delve::config::Settings;
use delve::introspection::{DatabaseIntrospection, WorkerIntrospection};
use delve::model::Report;
use delve::orchestrator::{Orchestrator, OrchestratorConfig};
use delve::understanding::{
    AnthropicChatClient, ChatUnderstanding, OfflineUnderstanding, TextUnderstanding,
};
use delve::worker::WorkerClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "delve")]
#[command(about = "Delve - progressive multi-table analysis from natural-language questions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question about the configured database
    Ask {
        /// The question, in plain language
        question: String,

        /// Path to a delve.toml (searched for if not specified)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use the built-in fallbacks instead of a language model
        #[arg(long)]
        offline: bool,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Print the resolved configuration
    Config {
        /// Path to a delve.toml (searched for if not specified)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// The full report as JSON
    Json,
    /// Answer, metrics and patterns as text
    Text,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("DELVE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Ask {
            question,
            config,
            offline,
            format,
        } => cmd_ask(question, config, offline, format).await,
        Commands::Config { config } => cmd_config(config),
    }
}

fn load_settings(path: Option<PathBuf>) -> Option<Settings> {
    let result = match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    match result {
        Ok(settings) => Some(settings),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            None
        }
    }
}

async fn cmd_ask(
    question: String,
    config: Option<PathBuf>,
    offline: bool,
    format: OutputFormat,
) -> ExitCode {
    let Some(settings) = load_settings(config) else {
        return ExitCode::FAILURE;
    };

    let connection_string = match settings.connection.resolved_connection_string() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error resolving connection string: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = match WorkerClient::spawn_with_settings(&settings.worker).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error starting database worker: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let db: Arc<dyn DatabaseIntrospection> = Arc::new(WorkerIntrospection::new(
        client,
        settings.connection.driver.clone(),
        connection_string,
    ));
    let understanding = build_understanding(&settings, offline);
    let orchestrator = Orchestrator::new(db, understanding, OrchestratorConfig::from(&settings));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            on_interrupt.cancel();
        }
    });

    let report = orchestrator.run_with_cancel(&question, cancel).await;

    match format {
        OutputFormat::Json => match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                return ExitCode::FAILURE;
            }
        },
        OutputFormat::Text => print_text(&report),
    }

    if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn build_understanding(settings: &Settings, offline: bool) -> Arc<dyn TextUnderstanding> {
    let lm = &settings.language_model;
    if offline || !lm.enabled {
        info!("running without a language model");
        return Arc::new(OfflineUnderstanding::new());
    }

    match lm.api_key() {
        Ok(key) => {
            let client = AnthropicChatClient::new(key)
                .with_model(lm.model.clone())
                .with_max_tokens(lm.max_tokens);
            Arc::new(ChatUnderstanding::new(client))
        }
        Err(e) => {
            warn!(error = %e, "language model unavailable; running offline");
            Arc::new(OfflineUnderstanding::new())
        }
    }
}

fn print_text(report: &Report) {
    if let Some(error) = &report.error_message {
        println!("Error: {}", error);
    }
    if !report.final_answer.is_empty() {
        println!("{}\n", report.final_answer);
    }

    if !report.insights.metrics.is_empty() {
        println!("Metrics:");
        for metric in &report.insights.metrics {
            println!("  {}: {}", metric.name, metric.value);
        }
    }

    if !report.insights.patterns.is_empty() {
        println!("\nPatterns:");
        for pattern in &report.insights.patterns {
            println!("  - {}", pattern);
        }
    }

    if !report.insights.recommendations.is_empty() {
        println!("\nRecommendations:");
        for recommendation in &report.insights.recommendations {
            println!("  - {}", recommendation);
        }
    }

    println!(
        "\n{} step(s), {} table(s), {} ms",
        report.metadata.total_steps,
        report.metadata.tables_analyzed,
        report.metadata.total_duration_ms
    );
}

fn cmd_config(config: Option<PathBuf>) -> ExitCode {
    let Some(settings) = load_settings(config) else {
        return ExitCode::FAILURE;
    };

    match toml::to_string_pretty(&settings) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error rendering configuration: {}", e);
            ExitCode::FAILURE
        }
    }
}
