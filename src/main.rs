use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use fixloop::domain::{LoopEvent, LoopOutcome, LoopState, Phase};
use fixloop::engine::Engine;
use fixloop::gateway::{CommandPipeline, CommandResponseAgent};
use fixloop::observer::ChannelObserver;
use fixloop::storage::StateLayout;
use log::{error, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, ModeArg};
use config::Config;

fn setup_logging(default_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fixloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("fixloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let env = env_logger::Env::default().default_filter_or(default_level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(|| config.storage.state_dir.clone());
    let layout = StateLayout::new(state_dir);

    if cli.is_verbose() {
        println!("{} {}", "State directory:".yellow(), layout.root().display());
    }

    match &cli.command {
        Commands::Run { reset, mode } => handle_run_command(*reset, *mode, &layout, config).await,
        Commands::Status => handle_status_command(&layout),
        Commands::Reset => handle_reset_command(&layout),
    }
}

async fn handle_run_command(
    reset: bool,
    mode: Option<ModeArg>,
    layout: &StateLayout,
    config: &Config,
) -> Result<()> {
    fs::create_dir_all(layout.root()).context("Failed to create state directory")?;

    let mut engine_config = config.engine_config();
    if let Some(mode) = mode {
        engine_config.output_mode = mode.into();
    }
    info!(
        "Running with output mode {} and at most {} iterations",
        engine_config.output_mode, engine_config.policy.max_iterations
    );

    let agent = Arc::new(CommandResponseAgent::new(config.agent.clone()));
    let pipeline = Arc::new(CommandPipeline::new(
        config.pipeline.clone(),
        layout.completion_signal_path(),
    ));
    let (observer, events) = ChannelObserver::new();
    let mut engine = Engine::new(agent, pipeline, Arc::new(observer), layout, engine_config);

    if reset {
        engine.reset().context("Failed to reset loop state")?;
        println!("{}", "Cleared checkpoint and fingerprint".yellow());
    }

    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            println!("{}", "Stopping after the current phase...".yellow());
            token.cancel();
        }
    });

    let printer = tokio::spawn(print_events(events));
    let result = engine.run().await;
    // Dropping the engine closes the event stream so the printer drains and exits
    drop(engine);
    let _ = printer.await;

    match result {
        Ok(outcome @ LoopOutcome::Succeeded { .. }) | Ok(outcome @ LoopOutcome::Cancelled { .. }) => {
            info!("Run ended: {}", outcome);
            Ok(())
        }
        Ok(outcome) => Err(eyre!("Loop gave up: {}", outcome)),
        Err(e) => {
            // The printer has already shown the fault; this only sets the exit status
            error!("Loop aborted: {}", e);
            Err(e).context("Loop aborted")
        }
    }
}

async fn print_events(mut events: UnboundedReceiver<LoopEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            LoopEvent::PhaseChanged { phase: Phase::Idle, .. } => {}
            LoopEvent::PhaseChanged { iteration, phase } => {
                println!("{} {}", format!("[{}]", iteration).dimmed(), phase.to_string().cyan());
            }
            LoopEvent::LogLine { message, is_error: true } => println!("    {}", message.red()),
            LoopEvent::LogLine { message, .. } => println!("    {}", message),
            LoopEvent::Finished(outcome) if outcome.is_success() => {
                println!("{}", outcome.to_string().green().bold());
            }
            LoopEvent::Finished(outcome @ LoopOutcome::Faulted { .. }) => {
                println!("{}", outcome.to_string().red().bold());
            }
            LoopEvent::Finished(outcome) => println!("{}", outcome.to_string().yellow().bold()),
        }
    }
}

fn handle_status_command(layout: &StateLayout) -> Result<()> {
    info!("Showing status for {}", layout.root().display());
    println!("{} {}", "State directory:".green(), layout.root().display());

    match layout.checkpoint_store().load() {
        Some(state) => {
            println!("  Phase:      {}", state.phase);
            println!("  Iteration:  {}", state.iteration);
            println!("  Updated:    {}", state.updated_at.to_rfc3339());
            if state.nudge {
                println!("  Pending:    stale-failure nudge");
            }
            let resumed = state.normalized();
            if resumed.phase != state.phase {
                println!("  Resumes at: {}", resumed.phase);
            }
        }
        None => println!(
            "  No checkpoint, a run starts at {}",
            LoopState::initial().phase
        ),
    }

    match layout.fingerprint_store().load() {
        Some(fingerprint) => {
            let short = fingerprint
                .content_hash
                .get(..12)
                .unwrap_or(&fingerprint.content_hash);
            println!(
                "  Last failure: {} observed {} (iteration {})",
                short,
                fingerprint.observed_at.to_rfc3339(),
                fingerprint.iteration
            );
        }
        None => println!("  No failure recorded"),
    }
    Ok(())
}

fn handle_reset_command(layout: &StateLayout) -> Result<()> {
    info!("Resetting state in {}", layout.root().display());
    layout
        .checkpoint_store()
        .clear()
        .context("Failed to clear checkpoint")?;
    layout
        .fingerprint_store()
        .clear()
        .context("Failed to clear fingerprint")?;
    println!("{}", "Cleared checkpoint and fingerprint".green());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging at the configured level
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
