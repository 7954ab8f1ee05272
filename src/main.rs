//! # Research Report Generator
//!
//! Generates a research report on a topic with a panel of AI analysts.
//!
//! 1. An analyst panel is proposed for the topic
//! 2. You approve the panel or give feedback to regenerate it
//! 3. Each analyst interviews an expert backed by web and Wikipedia search
//! 4. The interviews are combined into one report with sources
//!
//! ## Quick Start
//! ```bash
//! export OPENAI_API_KEY=... TAVILY_API_KEY=...
//! cargo run -- "Context engineering for LLM agents"
//! ```

/// Configuration management
mod config;

/// Model and retrieval wiring
mod agent;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rig_research_graph::pregel::checkpoint::{create_checkpointer, Checkpointer, CheckpointerConfig};
use rig_research_graph::pregel::{RunStatus, WorkflowResult};
use rig_research_graph::research::{ResearchGraphState, ResearchGraphUpdate, ResearchWorkflowBuilder};
use rig_research_graph::CompiledWorkflow;

use crate::config::{Config, Provider};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "research-report",
    version,
    about = "Generate a research report with a panel of AI analysts",
    long_about = r#"
Research Report Generator

Proposes a panel of analysts for a topic, lets you review it, interviews an
expert for each analyst (web + Wikipedia retrieval) and writes a report.

PREREQUISITES:
  OPENAI_API_KEY   (or --provider ollama with a running Ollama server)
  TAVILY_API_KEY   for web search

EXAMPLES:
  # Interactive run, review the analyst panel before interviews start
  research-report "The state of Rust async runtimes"

  # Non-interactive, local model
  research-report --provider ollama --model llama3.2 --approve "WebAssembly"

  # Persist the pause point, approve later from another process
  research-report --checkpoint-dir .runs --run-id wasm "WebAssembly"
  research-report --checkpoint-dir .runs --run-id wasm --resume --approve "WebAssembly"
"#
)]
struct Args {
    /// The research topic
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Maximum number of analysts
    #[arg(short = 'a', long, env = "MAX_ANALYSTS")]
    max_analysts: Option<usize>,

    /// Expert answers per interview
    #[arg(short = 't', long = "max-turns", env = "MAX_NUM_TURNS")]
    max_turns: Option<usize>,

    /// LLM provider: openai or ollama
    #[arg(short = 'p', long, env = "LLM_PROVIDER")]
    provider: Option<String>,

    /// Model name (overrides LLM_MODEL)
    #[arg(short = 'm', long, env = "LLM_MODEL")]
    model: Option<String>,

    /// Approve the generated panel without prompting
    #[arg(long, default_value = "false")]
    approve: bool,

    /// Directory for checkpoints; enables resuming a paused run
    #[arg(long, value_name = "DIR", env = "CHECKPOINT_DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Stable run id used for checkpoint files
    #[arg(long, default_value = "research")]
    run_id: String,

    /// Resume the latest checkpoint of --run-id instead of starting over
    #[arg(long, default_value = "false", requires = "checkpoint_dir")]
    resume: bool,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the final workflow state as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    /// Print the workflow graph as a Mermaid diagram and exit
    #[arg(long, default_value = "false")]
    print_graph: bool,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long, default_value = "false")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config = load_config(&args)?;
    info!(
        provider = %config.provider,
        model = %config.model,
        max_analysts = config.max_analysts,
        max_num_turns = config.max_num_turns,
        "Configuration loaded"
    );

    let ctx = agent::build_context(&config)?;
    let checkpoints = match &args.checkpoint_dir {
        Some(dir) => CheckpointerConfig::File {
            path: dir.clone(),
            compression: true,
        },
        None => CheckpointerConfig::Memory,
    };
    let workflow = ResearchWorkflowBuilder::new(ctx)
        .checkpointer(create_checkpointer(checkpoints, &args.run_id))
        .build()?
        .with_workflow_id(&args.run_id);

    if args.print_graph {
        println!("{}", workflow.to_mermaid());
        return Ok(());
    }

    let result = match run(&workflow, &args, &config).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Research failed");
            return Err(e);
        }
    };

    let state = result.state;
    if !state.errors.error_history.is_empty() {
        warn!(
            errors = state.errors.error_history.len(),
            "Run finished with recorded errors"
        );
        for entry in &state.errors.error_history {
            warn!(node = %entry.node, error_type = %entry.error_type, message = %entry.message, "recorded error");
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let Some(report) = state.final_report else {
        anyhow::bail!("The workflow finished without a report (no analysts were interviewed)");
    };
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &report)
                .await
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("\n{report}"),
    }

    info!("Research completed successfully");
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_env()?;

    if let Some(provider) = &args.provider {
        config.set_provider(provider.parse::<Provider>()?);
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(max) = args.max_analysts {
        config.max_analysts = max;
    }
    if let Some(turns) = args.max_turns {
        config.max_num_turns = turns;
    }

    config.validate()?;
    Ok(config)
}

/// Run (or resume) until the report is done, asking for panel feedback at each pause.
async fn run(
    workflow: &CompiledWorkflow<ResearchGraphState>,
    args: &Args,
    config: &Config,
) -> Result<WorkflowResult<ResearchGraphState>> {
    let mut result = if args.resume {
        let checkpointer = workflow
            .checkpointer()
            .context("Resuming needs --checkpoint-dir")?;
        let checkpoint = checkpointer
            .latest()
            .await?
            .with_context(|| format!("No checkpoint found for run '{}'", args.run_id))?;
        info!(superstep = checkpoint.superstep, "Resuming from checkpoint");

        if checkpoint.is_interrupt() {
            // Paused at the panel review: ask again below
            WorkflowResult {
                state: checkpoint.state.clone(),
                supersteps: checkpoint.superstep,
                status: RunStatus::Interrupted {
                    before: checkpoint.interrupted_before.clone(),
                },
                checkpoint: Some(checkpoint),
            }
        } else {
            workflow.resume(checkpoint, None).await?
        }
    } else {
        info!(topic = %args.topic, "Starting research");
        workflow
            .invoke(ResearchGraphState::new(&args.topic, config.max_analysts))
            .await?
    };

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while result.is_interrupted() {
        print_panel(&result.state);
        let checkpoint = result
            .checkpoint
            .context("Interrupted run returned no checkpoint")?;

        let feedback = if args.approve {
            None
        } else {
            println!("Press Enter to approve, or describe how to change the panel:");
            stdin
                .next_line()
                .await?
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
        };

        match &feedback {
            Some(text) => info!(feedback = %text, "Regenerating analyst panel"),
            None => info!("Analyst panel approved"),
        }
        result = workflow
            .resume(checkpoint, Some(ResearchGraphUpdate::feedback(feedback)))
            .await?;
    }

    Ok(result)
}

fn print_panel(state: &ResearchGraphState) {
    println!("\n{}", "=".repeat(60));
    println!("ANALYST PANEL: {}", state.topic);
    println!("{}", "=".repeat(60));
    for (i, analyst) in state.analysts.iter().enumerate() {
        println!("{}. {} ({}, {})", i + 1, analyst.name, analyst.role, analyst.affiliation);
        println!("   {}", analyst.description);
    }
    if state.analysts.is_empty() {
        println!("(no analysts were generated)");
    }
    println!();
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// `RUST_LOG` wins over `--verbose` when set.
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
