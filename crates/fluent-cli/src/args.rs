//! Command-line argument definitions for the orchestrator CLI.

use clap::{Parser, Subcommand, ValueEnum};
use fluent_agent::consensus::ConsensusStrategy;
use fluent_core::types::{Priority, TaskType};

#[derive(Parser, Debug)]
#[command(
    name = "fluent",
    version,
    about = "Routes a prompt to the best-suited model backend, with scored fallback and multi-model consensus"
)]
pub struct Cli {
    /// Path to a YAML model registry (see fluent_core::registry_config). Falls
    /// back to the bundled sample registry when omitted.
    #[arg(long, global = true)]
    pub registry: Option<String>,

    /// Emit machine-readable JSON instead of formatted text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Route a single prompt to the best-suited model, falling back across
    /// the scored chain on provider failure.
    Route(RouteArgs),
    /// Fan a prompt out to several models in parallel and compute a
    /// consensus response.
    Consensus(ConsensusArgs),
    /// List every provider referenced by the registry and whether
    /// credentials are available for it.
    Providers,
    /// Print the accumulated cost ledger for this process.
    Cost,
}

#[derive(clap::Args, Debug)]
pub struct RouteArgs {
    /// The prompt to route.
    pub prompt: String,

    /// Bypass task analysis and selection, pinning a specific registry id.
    #[arg(long)]
    pub model: Option<String>,

    /// Override the analyzer's heuristic task-type classification.
    #[arg(long, value_enum)]
    pub task_type: Option<TaskTypeArg>,

    /// Tradeoff the selector should optimize for.
    #[arg(long, value_enum, default_value = "balanced")]
    pub priority: PriorityArg,

    /// Overall deadline in seconds; exceeding it aborts the in-flight call
    /// and returns `cancelled` without walking the remaining fallback chain.
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,
}

#[derive(clap::Args, Debug)]
pub struct ConsensusArgs {
    /// The prompt every voter answers independently.
    pub prompt: String,

    /// How the tally of voter responses is resolved into a winner.
    #[arg(long, value_enum, default_value = "majority")]
    pub strategy: StrategyArg,

    /// Number of distinct top-scored models to fan out to. Capped to the
    /// registry size; asking for more than exist just uses all of them.
    #[arg(long, default_value_t = 3)]
    pub num_voters: usize,

    /// Overall deadline in seconds for the slowest voter; voters that
    /// exceed it are recorded as abstentions rather than failing the vote.
    #[arg(long, default_value_t = 30)]
    pub deadline_secs: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TaskTypeArg {
    CodeGeneration,
    Debugging,
    ArchitecturalDesign,
    Documentation,
    Testing,
    DataAnalysis,
    Reasoning,
    Vision,
    General,
}

impl From<TaskTypeArg> for TaskType {
    fn from(value: TaskTypeArg) -> Self {
        match value {
            TaskTypeArg::CodeGeneration => TaskType::CodeGeneration,
            TaskTypeArg::Debugging => TaskType::Debugging,
            TaskTypeArg::ArchitecturalDesign => TaskType::ArchitecturalDesign,
            TaskTypeArg::Documentation => TaskType::Documentation,
            TaskTypeArg::Testing => TaskType::Testing,
            TaskTypeArg::DataAnalysis => TaskType::DataAnalysis,
            TaskTypeArg::Reasoning => TaskType::Reasoning,
            TaskTypeArg::Vision => TaskType::Vision,
            TaskTypeArg::General => TaskType::General,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PriorityArg {
    Quality,
    Speed,
    Cost,
    Balanced,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Quality => Priority::Quality,
            PriorityArg::Speed => Priority::Speed,
            PriorityArg::Cost => Priority::Cost,
            PriorityArg::Balanced => Priority::Balanced,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum StrategyArg {
    Majority,
    Unanimous,
    Weighted,
    Synthesis,
}

impl From<StrategyArg> for ConsensusStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Majority => ConsensusStrategy::Majority,
            StrategyArg::Unanimous => ConsensusStrategy::Unanimous,
            StrategyArg::Weighted => ConsensusStrategy::Weighted,
            StrategyArg::Synthesis => ConsensusStrategy::Synthesis,
        }
    }
}
