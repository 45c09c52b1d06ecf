//! Wires the routing pipeline together from a YAML registry and the
//! environment's credentials, then dispatches one of the four exposed
//! operations (spec §6): `route`, `consensus`, `providers`, `cost`.

use crate::args::{Cli, Commands, ConsensusArgs, RouteArgs};
use crate::error::exit_code;
use clap::Parser;
use fluent_agent::consensus::{ConsensusEngine, ConsensusOptions, ConsensusResult};
use fluent_agent::executor::ConversationExecutor;
use fluent_agent::orchestrator::{Orchestrator, RouteRequest};
use fluent_core::config::RouterConfig;
use fluent_core::cost_ledger::CostLedger;
use fluent_core::credentials::EnvCredentialProvider;
use fluent_core::error::RouterError;
use fluent_core::registry::ModelRegistry;
use fluent_core::registry_config::{load_registry_yaml, parse_registry_yaml};
use fluent_core::types::{ApiResponse, Provider};
use fluent_engines::analyzer::TaskAnalyzer;
use fluent_engines::client_pool::ClientPool;
use fluent_engines::selector::Selector;
use owo_colors::OwoColorize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SAMPLE_REGISTRY: &str = include_str!("../assets/sample_registry.yaml");

/// The assembled routing pipeline a single CLI invocation runs against.
/// Everything here is process-lifetime: the cost ledger starts empty on
/// every invocation since disk persistence is an external collaborator's
/// concern (spec §1 out-of-scope), not the core's.
struct Pipeline {
    registry: Arc<ModelRegistry>,
    analyzer: Arc<TaskAnalyzer>,
    selector: Arc<Selector>,
    client_pool: Arc<ClientPool>,
    cost_ledger: Arc<CostLedger>,
    orchestrator: Arc<Orchestrator>,
}

fn load_models(registry_path: &Option<String>) -> anyhow::Result<Vec<fluent_core::types::ModelCapability>> {
    match registry_path {
        Some(path) => load_registry_yaml(path)
            .map_err(|e| anyhow::anyhow!("failed to load model registry from '{path}': {e}")),
        None => Ok(parse_registry_yaml(SAMPLE_REGISTRY).expect("bundled sample registry is well-formed")),
    }
}

fn build_pipeline(registry_path: &Option<String>) -> anyhow::Result<Pipeline> {
    let models = load_models(registry_path)?;
    let registry = Arc::new(ModelRegistry::new(models));
    let analyzer = Arc::new(TaskAnalyzer::new());
    let selector = Arc::new(Selector::new(registry.clone()));
    let client_pool = Arc::new(ClientPool::new(Arc::new(EnvCredentialProvider::new())));
    let cost_ledger = Arc::new(CostLedger::new());
    let config = RouterConfig::default();
    let executor = Arc::new(ConversationExecutor::new(cost_ledger.clone(), config.tool_loop_max_iterations));
    let orchestrator = Arc::new(Orchestrator::new(
        registry.clone(),
        analyzer.clone(),
        selector.clone(),
        client_pool.clone(),
        executor,
        cost_ledger.clone(),
        config,
    ));

    Ok(Pipeline {
        registry,
        analyzer,
        selector,
        client_pool,
        cost_ledger,
        orchestrator,
    })
}

/// Parses arguments, builds the pipeline, dispatches the requested
/// operation, and maps any surfaced [`RouterError`] onto the exit codes
/// from spec §6 before returning control to `main`.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let pipeline = build_pipeline(&cli.registry)?;

    let code = match cli.command {
        Commands::Route(args) => run_route(&pipeline, args, cli.json).await,
        Commands::Consensus(args) => run_consensus(&pipeline, args, cli.json).await,
        Commands::Providers => run_providers(&pipeline, cli.json).await,
        Commands::Cost => run_cost(&pipeline, cli.json).await,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run_route(pipeline: &Pipeline, args: RouteArgs, json: bool) -> i32 {
    let request = RouteRequest {
        prompt: args.prompt,
        model_id: args.model,
        task_type: args.task_type.map(Into::into),
        priority: args.priority.into(),
        messages: None,
        request_options: Default::default(),
        deadline: Some(Duration::from_secs(args.timeout_secs)),
    };

    match pipeline.orchestrator.route_request(request, CancellationToken::new()).await {
        Ok(response) => {
            print_response(&response, json);
            0
        }
        Err(err) => report_error(&err, json),
    }
}

async fn run_consensus(pipeline: &Pipeline, args: ConsensusArgs, json: bool) -> i32 {
    let engine = ConsensusEngine::new(
        pipeline.selector.clone(),
        pipeline.analyzer.clone(),
        pipeline.orchestrator.clone(),
    );
    let options = ConsensusOptions {
        strategy: args.strategy.into(),
        num_voters: args.num_voters,
        task_type: None,
        priority: fluent_core::types::Priority::Balanced,
        request_options: Default::default(),
        deadline: Duration::from_secs(args.deadline_secs),
    };

    match engine.consensus(&args.prompt, options, CancellationToken::new()).await {
        Ok(result) => {
            print_consensus(&result, json);
            0
        }
        Err(err) => report_error(&err, json),
    }
}

async fn run_providers(pipeline: &Pipeline, json: bool) -> i32 {
    let mut seen = HashSet::new();
    let mut availability: Vec<(Provider, bool)> = Vec::new();
    for model in pipeline.registry.list() {
        if seen.insert(model.provider) {
            let available = pipeline.client_pool.get(model.provider).await.is_ok();
            availability.push((model.provider, available));
        }
    }

    if json {
        let mut obj = serde_json::Map::new();
        for (provider, available) in &availability {
            obj.insert(provider.to_string(), serde_json::Value::Bool(*available));
        }
        println!("{}", serde_json::Value::Object(obj));
    } else {
        for (provider, available) in &availability {
            let status = if *available {
                "available".green().to_string()
            } else {
                "unavailable".red().to_string()
            };
            println!("{:<12} {status}", provider.to_string());
        }
    }
    0
}

async fn run_cost(pipeline: &Pipeline, json: bool) -> i32 {
    let report = pipeline.cost_ledger.report().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report).expect("cost report serializes"));
    } else {
        println!(
            "{} ${:.4}  ({} input / {} output tokens)",
            "total cost:".bold(),
            report.total_cost_usd,
            report.total_input_tokens,
            report.total_output_tokens
        );
        for (model_id, breakdown) in &report.per_model {
            println!(
                "  {:<24} {:>4} req  ${:.4}",
                model_id, breakdown.requests, breakdown.cost_usd
            );
        }
    }
    0
}

fn report_error(err: &RouterError, json: bool) -> i32 {
    if json {
        let body = serde_json::json!({ "error": err.kind(), "message": err.to_string() });
        eprintln!("{body}");
    } else {
        eprintln!("{} {err}", "error:".red().bold());
    }
    exit_code(err)
}

fn print_response(response: &ApiResponse, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(response).expect("response serializes"));
        return;
    }
    println!("{}", response.content);
    println!(
        "{} model={} finish_reason={:?} tokens={}in/{}out",
        "—".dimmed(),
        response.model_id.cyan(),
        response.finish_reason,
        response.usage.input_tokens,
        response.usage.output_tokens
    );
}

fn print_consensus(result: &ConsensusResult, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(result).expect("consensus result serializes"));
        return;
    }
    if result.quorum_lost {
        println!("{}", "quorum lost: too many abstentions to resolve a winner".red());
    } else if result.no_consensus {
        println!("{}", "no consensus: voters disagreed under a unanimous strategy".yellow());
    } else {
        match &result.winning_response {
            Some(response) => println!("{response}"),
            None => println!("{}", "no winning response".yellow()),
        }
    }
    println!("{}", "votes:".bold());
    for vote in &result.votes {
        let outcome = match &vote.response {
            Some(r) => truncate_for_display(r),
            None => "abstained".dimmed().to_string(),
        };
        println!("  {:<24} weight={:.2}  {outcome}", vote.voter_id, vote.weight);
    }
}

fn truncate_for_display(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX).collect();
        format!("{truncated}…")
    }
}
