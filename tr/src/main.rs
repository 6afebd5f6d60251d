//! ToolRelay - tool execution runtime
//!
//! CLI entry point for chatting with a tool-using model and inspecting
//! the configured tool source.

use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use toolrelay::cli::{get_log_path, Cli, Command};
use toolrelay::config::Config;
use toolrelay::driver::ConversationDriver;
use toolrelay::environment::EnvironmentProber;
use toolrelay::executor::ProcessExecutor;
use toolrelay::invoker::{ToolHandler, ToolInvoker};
use toolrelay::llm::create_client;
use toolrelay::registry::{ToolRegistry, ToolSelector};

fn setup_logging(cli_log_level: Option<&str>, verbose: bool) -> Result<()> {
    // Logs go to a file so stdout stays clean for the conversation
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolrelay")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config verbose flag > INFO default
    let level = match cli_log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
        None if verbose => tracing::Level::DEBUG,
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("toolrelay.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.runtime.verbose).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Chat { tool, system_prompt }) => cmd_chat(&config, tool, system_prompt).await,
        Some(Command::Tools) => cmd_tools(&config).await,
        Some(Command::Env { force }) => cmd_env(&config, force).await,
        None => cmd_chat(&config, vec![], None).await,
    }
}

/// Interactive conversation loop
async fn cmd_chat(config: &Config, tool_specs: Vec<String>, system_prompt: Option<String>) -> Result<()> {
    debug!(tool_count = tool_specs.len(), "cmd_chat: called");
    config.validate()?;

    let registry = Arc::new(ToolRegistry::from_config(&config.runtime)?);
    registry
        .initialize()
        .await
        .context("Failed to load tool catalog")?;

    let prober = Arc::new(EnvironmentProber::new(config.runtime.skip_environment_check));
    let executor = ProcessExecutor::new(prober, Duration::from_millis(config.runtime.execution_timeout_ms));
    let invoker = Arc::new(ToolInvoker::new(registry.clone(), executor));

    let selectors: Vec<ToolSelector> = tool_specs.iter().map(|s| ToolSelector::parse(s)).collect();
    let handler = ToolHandler::new(invoker, selectors);

    let client = create_client(&config.llm)?;
    let mut driver = ConversationDriver::new(client, handler, config.llm.max_tokens, config.llm.max_turns);
    if let Some(prompt) = system_prompt {
        driver = driver.with_system_prompt(prompt);
    }

    println!(
        "ToolRelay chat - {} tools loaded ({} provider, model {})",
        registry.get_all().await.len(),
        config.llm.provider,
        config.llm.model
    );
    println!("Type 'exit' to quit, '/reset' to clear the conversation.");
    println!("Logs: {}", get_log_path().display());

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("you> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                driver.reset_conversation();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        let outcome = driver.invoke(input).await;
        debug!(turns = outcome.turns, "cmd_chat: turn complete");
        println!("assistant> {}", outcome.text);
    }

    Ok(())
}

/// Print the configured source's catalog
async fn cmd_tools(config: &Config) -> Result<()> {
    debug!("cmd_tools: called");
    let registry = Arc::new(ToolRegistry::from_config(&config.runtime)?);
    registry
        .initialize()
        .await
        .context("Failed to load tool catalog")?;

    let mut tools: Vec<_> = registry.get_all().await.into_values().collect();
    tools.sort_by(|a, b| a.name.cmp(&b.name));

    if tools.is_empty() {
        println!("No tools available from the configured source.");
        return Ok(());
    }

    println!("{} tool(s) ({:?} source):", tools.len(), registry.mode());
    for tool in tools {
        println!(
            "  {} [{} {}] - {}",
            tool.name, tool.script_kind, tool.version_name, tool.description
        );
    }
    Ok(())
}

/// Report script runtime availability
async fn cmd_env(config: &Config, force: bool) -> Result<()> {
    debug!(force, "cmd_env: called");
    let prober = EnvironmentProber::new(config.runtime.skip_environment_check);

    let results = if force {
        // Reprobe everything the loaded catalog references, not just the
        // built-in kinds; a missing or broken source degrades to built-ins
        let referenced = match ToolRegistry::from_config(&config.runtime) {
            Ok(registry) => match registry.initialize().await {
                Ok(()) => registry.referenced_kinds().await,
                Err(e) => {
                    debug!(error = %e, "cmd_env: catalog load failed, probing built-ins only");
                    Vec::new()
                }
            },
            Err(e) => {
                debug!(error = %e, "cmd_env: no tool source, probing built-ins only");
                Vec::new()
            }
        };
        prober.force_reprobe(&referenced).await
    } else {
        prober.probe_all().await
    };

    let mut kinds: Vec<_> = results.into_iter().collect();
    kinds.sort_by_key(|(kind, _)| kind.to_string());

    for (kind, check) in kinds {
        if check.valid {
            println!("  {}: ok ({})", kind, check.executor);
        } else {
            println!("  {}: unavailable - {}", kind, check.error.unwrap_or_default());
        }
    }
    Ok(())
}
