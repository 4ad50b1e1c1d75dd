//! Taskloop CLI - objective-driven task loop over a generation backend
//!
//! Usage:
//!   taskloop init [DIR]                  Write a default .taskloop/config.toml
//!   taskloop run <objective> <first>     Run the loop until it stops

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taskloop_agent::{
    AnthropicGateway, GenerationGateway, InMemoryVectorIndex, OpenAiEmbedder, VectorBackend,
};
use taskloop_core::config::CONFIG_DIR;
use taskloop_core::{ModelTier, TaskloopConfig};
use taskloop_orchestrator::{Orchestrator, RunEvent, RunOutcome, StopReason};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "taskloop")]
#[command(author, version, about = "Objective-driven task loop")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Project directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run the task loop toward an objective
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// What the loop is working toward
    objective: String,

    /// First task to execute
    first_task: String,

    /// Ask after every cycle whether the objective is reached
    #[arg(long)]
    stop_check: bool,

    /// Use vector retrieval for prompt context
    #[arg(long)]
    semantic: bool,

    /// Use the advanced model tier
    #[arg(long)]
    advanced: bool,

    /// Stop after this many cycles
    #[arg(long)]
    max_cycles: Option<usize>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens per response
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Directory containing .taskloop/
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

impl RunArgs {
    /// Command-line flags win over the config file
    fn apply(&self, config: &mut TaskloopConfig) {
        if self.stop_check {
            config.run.enable_stop_check = true;
        }
        if self.semantic {
            config.run.use_semantic_context = true;
        }
        if self.advanced {
            config.generation.model_tier = ModelTier::Advanced;
        }
        if let Some(max_cycles) = self.max_cycles {
            config.run.max_cycles = Some(max_cycles);
        }
        if let Some(temperature) = self.temperature {
            config.generation.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.generation.max_output_tokens = max_tokens;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { path } => cmd_init(&path),
        Commands::Run(args) => cmd_run(args).await,
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = TaskloopConfig::path(path);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    let written = TaskloopConfig::write_default(path).context("Failed to write config")?;
    println!("Wrote default config to {}", written.display());
    println!("\nSet ANTHROPIC_API_KEY before running:");
    println!("  taskloop run \"<objective>\" \"<first task>\"");
    Ok(())
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let mut config =
        TaskloopConfig::load_or_default(&args.root).context("Failed to load configuration")?;
    args.apply(&mut config);

    let gateway: Arc<dyn GenerationGateway> = Arc::new(
        AnthropicGateway::from_config(&config.generation)
            .context("Generation backend is not configured")?,
    );
    let vector = semantic_backend(&config);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut orchestrator = Orchestrator::from_config(
        &args.objective,
        &args.first_task,
        &config,
        gateway,
        vector,
    )
    .context("Invalid run configuration")?
    .with_cancellation(cancel_rx)
    .with_events(event_tx);

    if config.run.activity_log {
        orchestrator = orchestrator.with_activity_logging(args.root.join(CONFIG_DIR));
    }

    info!(run_id = orchestrator.run_id(), "Starting run");
    let mut handle = orchestrator.spawn();

    // Single listener for the whole run; re-armed after each press
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupts = 0;

    let result = loop {
        tokio::select! {
            Some(event) = event_rx.recv() => print_event(&event),
            _ = &mut ctrl_c => {
                interrupts += 1;
                match Interrupt::after_presses(interrupts) {
                    Interrupt::Cancel => {
                        println!("\nStopping after the current phase (Ctrl+C again to abort)...");
                        let _ = cancel_tx.send(true);
                    }
                    Interrupt::Abort => {
                        handle.abort();
                        anyhow::bail!("Run aborted");
                    }
                }
                ctrl_c.set(tokio::signal::ctrl_c());
            }
            joined = &mut handle => break joined.context("Run task panicked")?,
        }
    };

    while let Ok(event) = event_rx.try_recv() {
        print_event(&event);
    }

    let outcome = result.context("Run failed")?;
    print_summary(&outcome);
    Ok(())
}

/// What a Ctrl+C press does during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Let the in-flight phase finish, then stop
    Cancel,
    /// Stop waiting on the run and exit
    Abort,
}

impl Interrupt {
    fn after_presses(presses: usize) -> Self {
        if presses <= 1 {
            Interrupt::Cancel
        } else {
            Interrupt::Abort
        }
    }
}

/// In-process index over OpenAI embeddings, or None with a warning
fn semantic_backend(config: &TaskloopConfig) -> Option<Arc<dyn VectorBackend>> {
    if !config.run.use_semantic_context {
        return None;
    }

    match OpenAiEmbedder::from_config(&config.semantic) {
        Ok(embedder) => Some(Arc::new(InMemoryVectorIndex::new(Arc::new(embedder)))),
        Err(e) => {
            warn!("Semantic context unavailable ({}), using raw context", e);
            None
        }
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::RunStarted { objective, .. } => {
            println!("*** OBJECTIVE ***\n{}", objective);
        }
        RunEvent::PhaseEntered { .. } => {}
        RunEvent::TaskPopped { task } => {
            println!("\n*** NEXT TASK ***\n{}", task);
        }
        RunEvent::TaskCompleted { result, .. } => {
            println!("\n*** TASK RESULT ***\n{}", result);
        }
        RunEvent::QueueReplaced {
            phase,
            tasks,
            report,
        } => {
            println!("\n*** TASK LIST ({}) ***", phase);
            if tasks.is_empty() {
                println!("(empty)");
            }
            for task in tasks {
                println!("{}", task);
            }
            if report.discarded > 0 {
                println!("({} malformed lines dropped)", report.discarded);
            }
        }
        RunEvent::StopChecked { keep_going } => {
            println!(
                "\n*** OBJECTIVE REACHED: {} ***",
                if *keep_going { "no" } else { "yes" }
            );
        }
        RunEvent::RunTerminated { .. } => {}
        RunEvent::RunFailed { error } => {
            eprintln!("\nRun failed: {}", error);
        }
    }
}

fn print_summary(outcome: &RunOutcome) {
    let headline = match outcome.stop_reason {
        StopReason::ObjectiveComplete => "Objective complete",
        StopReason::Cancelled => "Run cancelled",
        StopReason::MaxCycles => "Cycle limit reached",
        StopReason::Terminal => "Run finished",
    };

    println!("\n=== {} ===", headline);
    println!("Cycles:     {}", outcome.cycles);
    println!("Phases run: {}", outcome.phases_run);
    println!("Queued:     {}", outcome.final_state.task_queue.len());
}
