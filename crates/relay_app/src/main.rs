use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use relay_ai::routing::{ClassificationHint, RouteRequest, RoutingOptions, TaskClassifier};
use relay_ai::{ProviderId, RouterService, TaskCategory, UserTier};
use relay_core::config::ConfigManager;
use relay_core::logging;

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Route a prompt to an LLM provider, grade the answer, fall back when it falls short")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to ~/.relay/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Task category; inferred from the prompt when omitted
    #[arg(long)]
    category: Option<TaskCategory>,

    /// User tier (free, standard, premium, enterprise)
    #[arg(long)]
    tier: Option<UserTier>,

    /// Send the request to this provider only
    #[arg(long)]
    provider: Option<ProviderId>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    system: Option<String>,

    /// Accept the first response without grading it
    #[arg(long)]
    no_scoring: bool,

    #[arg(long)]
    max_retries: Option<u32>,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Overall request budget in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Node type hint for classification, e.g. "json-parser"
    #[arg(long)]
    node_type: Option<String>,

    /// Classify the prompt and exit without calling any provider
    #[arg(long)]
    classify: bool,

    /// Print the full routing result as JSON
    #[arg(long)]
    json: bool,

    /// Prompt text
    #[arg(required = true, trailing_var_arg = true)]
    prompt: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match cli.config.clone() {
        Some(path) => ConfigManager::from_path(path),
        None => ConfigManager::new(),
    }
    .context("Failed to load config")?;
    let config = manager.get();

    let _guard = logging::init_logging(&config.log_level)?;
    info!("Config loaded from {}", manager.path().display());

    let prompt = cli.prompt.join(" ");
    let hint = cli.node_type.clone().map(|node_type| ClassificationHint {
        node_type: Some(node_type),
        ..Default::default()
    });

    if cli.classify {
        let result = TaskClassifier::new().classify(&prompt, hint.as_ref());
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let service = RouterService::new(&config);
    let request = RouteRequest {
        prompt,
        system_prompt: cli.system,
        options: RoutingOptions {
            task_category: cli.category,
            user_specified_temperature: cli.temperature,
            user_tier: cli.tier,
            force_provider: cli.provider,
            enable_scoring: !cli.no_scoring,
            max_retries: cli.max_retries,
            timeout_ms: cli.timeout_ms,
            deadline_ms: cli.deadline_ms,
            classification_hint: hint,
        },
    };

    let result = service.route(request).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.content);
        let path: Vec<String> = result.routing_path.iter().map(ToString::to_string).collect();
        eprintln!(
            "-- {} {} | {} | temperature {:.2} | confidence {:.1} | {}",
            result.provider_id,
            result.model,
            result.task_category,
            result.temperature,
            result.confidence,
            path.join(" -> ")
        );
    }

    Ok(())
}
