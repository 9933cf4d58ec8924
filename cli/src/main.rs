//! Binary entry point for the orchestration bus: `dashboard`, `acp-bus`,
//! `orchestrator run "<task>"` (spec §6).
//!
//! Exit codes: `0` normal, `1` config/validation failure, `128+sig` on
//! signal termination (grounded in `original_source/utils.py`'s
//! `validate_config` exiting with code 1 for bad config, and standard
//! shell signal-exit-code convention for the rest).

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use cli::acp_bus;
use cli::llm::HttpLlmClient;
use cli::orchestrator;
use orch_core::NullBridge;

const APP_NAME: &str = "orchestrator-bus";

#[derive(Parser, Debug)]
#[command(name = "orchestrator-bus")]
#[command(about = "Multi-agent orchestration bus: dashboard, acp-bus, orchestrator run")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the dashboard HTTP server (JSON REST + SSE).
    Dashboard(DashboardArgs),
    /// Expose the tool registry over stdin/stdout as newline-delimited JSON.
    AcpBus,
    /// Wrap the LLM graph for a single task.
    Orchestrator(OrchestratorArgs),
}

#[derive(clap::Args, Debug)]
struct DashboardArgs {
    /// Listen address (default 127.0.0.1:8080 or DASHBOARD_ADDR)
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,
}

#[derive(clap::Args, Debug)]
struct OrchestratorArgs {
    #[command(subcommand)]
    cmd: OrchestratorCommand,
}

#[derive(Subcommand, Debug)]
enum OrchestratorCommand {
    /// Run one task to completion (or the step limit) and print the answer.
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Task text for the master agent to execute.
    task: String,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] store::StoreError),
    #[error(transparent)]
    Orchestrator(#[from] orchestrator::OrchestratorError),
    #[error("{0}")]
    Other(String),
}

async fn run_dashboard(args: DashboardArgs) -> Result<(), CliError> {
    let addr = args.addr.or_else(|| std::env::var("DASHBOARD_ADDR").ok());
    tracing::info!(addr = addr.as_deref().unwrap_or("default"), "starting dashboard server");
    serve::run_serve(addr.as_deref())
        .await
        .map_err(|e| CliError::Other(e.to_string()))
}

async fn run_acp_bus() -> Result<(), CliError> {
    tracing::info!("starting acp-bus stdio loop");
    let pool = store::get_pool().await?;
    store::ensure_schema(&pool).await?;
    acp_bus::serve_stdio(&pool, Arc::new(NullBridge))
        .await
        .map_err(|e| CliError::Other(e.to_string()))
}

async fn run_orchestrator(args: RunArgs) -> Result<(), CliError> {
    tracing::info!(task = %args.task, "starting orchestrator run");
    let pool = store::get_pool().await?;
    store::ensure_schema(&pool).await?;
    let llm = HttpLlmClient::from_env().map_err(|e| CliError::Config(e.to_string()))?;
    let answer = orchestrator::run_task(&pool, Arc::new(llm), Arc::new(NullBridge), &args.task).await?;
    println!("{answer}");
    Ok(())
}

async fn run_command(cmd: Command) -> Result<(), CliError> {
    match cmd {
        Command::Dashboard(a) => run_dashboard(a).await,
        Command::AcpBus => run_acp_bus().await,
        Command::Orchestrator(OrchestratorArgs { cmd: OrchestratorCommand::Run(a) }) => {
            run_orchestrator(a).await
        }
    }
}

#[cfg(unix)]
async fn run_with_signal_handling(cmd: Command) -> i32 {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => return code_for_result(run_command(cmd).await),
    };
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(_) => return code_for_result(run_command(cmd).await),
    };

    tokio::select! {
        result = run_command(cmd) => code_for_result(result),
        _ = term.recv() => 128 + 15,
        _ = interrupt.recv() => 128 + 2,
    }
}

#[cfg(not(unix))]
async fn run_with_signal_handling(cmd: Command) -> i32 {
    code_for_result(run_command(cmd).await)
}

fn code_for_result(result: Result<(), CliError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            1
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_and_apply(APP_NAME, None::<&Path>) {
        eprintln!("{APP_NAME}: config error: {e}");
        std::process::exit(1);
    }
    let _log_guard = config::init_logging(APP_NAME).ok();

    let args = Args::parse();
    let code = run_with_signal_handling(args.cmd).await;
    std::process::exit(code);
}
