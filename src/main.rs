//! # Research Assistant
//!
//! Command-line front-end for the `research-workflow` engine.
//!
//! A panel of analyst personas is generated for a topic, each analyst
//! interviews an expert grounded in web and Wikipedia search, and one report
//! section is written per interview.
//!
//! ## Quick Start
//! ```bash
//! # Offline, deterministic run
//! cargo run -- --mock "Design patterns"
//!
//! # Real run, pausing to review the analysts
//! cargo run -- --interactive "Design patterns"
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================
/// Configuration management
mod config;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use research_workflow::search::CombinedSearch;
use research_workflow::trace::{FileTraceSink, LoggingTraceSink, TraceSink};
use research_workflow::{
    FileRunStore, Generators, LLMConfig, LlmResearchGenerator, MockResearchGenerator,
    OpenAIProvider, ResearchConfig, ResearchOrchestrator, ResearchState, RunOutcome, TavilySearch,
    WikipediaSearch,
};

use crate::config::AppConfig;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "research-assistant",
    version = "0.1.0",
    about = "Researches a topic through a panel of AI analysts and writes a report",
    long_about = r#"
Research Assistant - a panel of AI analysts researches your topic.

For every analyst it will:
  1. Interview an expert, grounded in web and Wikipedia search
  2. Write a report section from the interview, with citations

PREREQUISITES (real runs):
  OPENAI_API_KEY   required
  TAVILY_API_KEY   optional, enables web search

EXAMPLES:
  # Deterministic offline run
  research-assistant --mock "Design patterns"

  # Four analysts, three interview turns each
  research-assistant --analysts 4 --turns 3 "Rust async runtimes"

  # Review the generated analysts before the interviews start
  research-assistant --interactive "Vector databases"
"#
)]
struct Args {
    /// The topic to research
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Maximum number of analysts (1-10)
    #[arg(short = 'a', long = "analysts", env = "RESEARCH_MAX_ANALYSTS", default_value_t = 3)]
    analysts: usize,

    /// Maximum interview turns per analyst
    #[arg(short = 't', long = "turns", env = "RESEARCH_MAX_TURNS", default_value_t = 2)]
    turns: usize,

    /// Use the deterministic mock generators (no API keys needed)
    #[arg(long = "mock")]
    mock: bool,

    /// Feedback that shapes analyst generation
    #[arg(short = 'f', long = "feedback")]
    feedback: Option<String>,

    /// Pause after generating the analysts and read feedback from stdin
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Print the final report as JSON instead of markdown
    #[arg(long = "json")]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::from_env()?;
    init_logging(args.verbose, &config.log_level)?;
    config.validate()?;

    let research_config = ResearchConfig::new()
        .with_max_analysts(args.analysts)
        .with_max_interview_turns(args.turns);
    research_config
        .validate()
        .context("Invalid --analysts/--turns")?;

    let generators = if args.mock {
        info!("Using mock generators");
        mock_generators()
    } else {
        llm_generators(&config)?
    };

    let mut orchestrator = ResearchOrchestrator::new(generators, research_config);
    if let Some(dir) = &config.run_dir {
        info!(dir = %dir.display(), "Persisting suspended runs to disk");
        orchestrator = orchestrator.with_run_store(Arc::new(FileRunStore::new(
            dir.clone(),
            config.run_compression,
        )));
    }

    let state = if args.interactive {
        run_interactive(&orchestrator, &args).await?
    } else {
        orchestrator
            .run_configured_research(&args.topic, args.feedback.clone())
            .await?
    };

    print_result(&state, args.json)
}

// =============================================================================
// WIRING
// =============================================================================
fn mock_generators() -> Generators {
    let mock = Arc::new(MockResearchGenerator::new());
    Generators::from_backend(mock.clone(), mock)
}

/// OpenAI-backed generators with Wikipedia and, if configured, Tavily search
fn llm_generators(config: &AppConfig) -> Result<Generators> {
    let llm_config = LLMConfig::new(config.openai_model.clone())
        .with_temperature(config.openai_temperature);
    let provider = OpenAIProvider::from_env_with_config(llm_config.clone())
        .context("Failed to create OpenAI provider")?;

    let trace: Arc<dyn TraceSink> = match &config.trace_dir {
        Some(dir) => Arc::new(FileTraceSink::new(dir.clone())),
        None => Arc::new(LoggingTraceSink::new()),
    };

    let generator = Arc::new(
        LlmResearchGenerator::new(Arc::new(provider))
            .with_config(llm_config)
            .with_trace_sink(trace),
    );

    let mut search = CombinedSearch::new().with_provider(
        "wikipedia",
        Arc::new(WikipediaSearch::new().with_max_docs(config.wikipedia_max_docs)),
    );
    match &config.tavily_api_key {
        Some(key) => {
            search = search.with_provider(
                "tavily",
                Arc::new(TavilySearch::new(key.clone()).with_max_results(config.tavily_max_results)),
            );
        }
        None => info!("TAVILY_API_KEY not set, web search disabled"),
    }

    info!(
        model = %config.openai_model,
        search_providers = search.len(),
        "LLM generators configured"
    );
    Ok(Generators::from_backend(generator.clone(), Arc::new(search)).with_query_generator(generator))
}

/// Pause at the feedback gate, show the analysts, resume with stdin input
async fn run_interactive(orchestrator: &ResearchOrchestrator, args: &Args) -> Result<ResearchState> {
    let outcome = orchestrator
        .run_configured_research_with_interruption(&args.topic, args.feedback.clone())
        .await?;

    let run_id = match outcome {
        RunOutcome::Paused { run_id, state, message } => {
            println!("\n{}\n", message);
            for (i, analyst) in state.analysts.iter().enumerate() {
                println!("{}. {} ({}, {})", i + 1, analyst.name, analyst.role, analyst.affiliation);
                println!("   {}\n", analyst.description);
            }
            run_id
        }
        finished => return Ok(finished.into_state()),
    };

    println!("Feedback on the analysts (empty line to proceed):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let feedback = lines
        .next_line()
        .await
        .context("Failed to read feedback from stdin")?
        .unwrap_or_default();

    let finished = orchestrator
        .continue_research_with_feedback(&run_id, &feedback)
        .await?;
    Ok(finished.into_state())
}

fn print_result(state: &ResearchState, json: bool) -> Result<()> {
    if let Some(err) = state.error() {
        error!(error = %err, "Research failed");
        anyhow::bail!("Research failed: {}", err);
    }

    let report = state
        .final_report
        .as_ref()
        .context("Run finished without a report")?;

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("\n{}", "=".repeat(60));
        println!("RESEARCH REPORT");
        println!("{}\n", "=".repeat(60));
        println!("{}", report.to_markdown());
    }

    info!(project_id = %report.project_id, sections = report.total_sections, "Research completed successfully");
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// `--verbose` forces debug; otherwise RUST_LOG (or "info") decides.
fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
