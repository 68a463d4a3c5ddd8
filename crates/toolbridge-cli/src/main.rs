//! Toolbridge CLI - chat with an LLM that can call your HTTP API
//!
//! On startup the target API's OpenAPI document is fetched and every POST
//! operation becomes a tool the model may call. The session then runs in a
//! rustyline prompt until `exit`, `quit`, `q` or Ctrl-D.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use toolbridge::{ApiClient, ChatOrchestrator, DEFAULT_CONNECT_TIMEOUT, OpenAIClient, ToolInvoker};

mod config;
mod display;
mod repl;

use config::{FileConfig, Overrides};
use repl::ReplConsole;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    /// (default: ~/.config/toolbridge/config.toml if it exists)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the target HTTP API (or set TOOLBRIDGE_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Model to use for chat completion (or set TOOLBRIDGE_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// OpenAI-compatible LLM endpoint
    #[arg(long)]
    llm_base_url: Option<String>,

    /// API key for the LLM (or set the variable named by llm.api_key_env)
    #[arg(long)]
    api_key: Option<String>,

    /// Tool executions allowed per user turn before a text reply is forced
    #[arg(long)]
    max_tool_round_trips: Option<u32>,
}

impl From<Args> for Overrides {
    fn from(args: Args) -> Self {
        Self {
            api_url: args.api_url,
            model: args.model,
            llm_base_url: args.llm_base_url,
            api_key: args.api_key,
            max_tool_round_trips: args.max_tool_round_trips,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before the logger reads RUST_LOG
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env loaded: {e}"),
    }

    let mut args = Args::parse();
    let config_path = args.config.take();
    let settings = FileConfig::load(config_path.as_deref())?
        .resolve(args.into(), |name| std::env::var(name).ok())?;

    let api = ApiClient::with_timeouts(
        &settings.api_url,
        DEFAULT_CONNECT_TIMEOUT,
        settings.tool_timeout,
    )?;
    let tools = toolbridge::discover_tools(&api)
        .await
        .with_context(|| format!("Failed to load tools from {}", settings.api_url))?;
    let invoker = ToolInvoker::from_tools(tools)?;

    let tool_list = invoker.get_all_tools();
    if tool_list.is_empty() {
        display::display_warning("The API exposes no POST operations; the model has no tools.");
    }

    info!(
        "Using model {} via {}",
        settings.llm.model, settings.llm.provider
    );
    let client = OpenAIClient::new(settings.llm)?;

    let mut orchestrator = ChatOrchestrator::new(client, invoker)
        .with_system_instruction(settings.system_instruction)
        .with_max_tool_round_trips(settings.max_tool_round_trips)
        .with_event_callback(|event| async move { display::display_event(&event) });

    display::display_banner(&settings.api_url, &tool_list);

    let mut console = ReplConsole::new()?;
    orchestrator.run(&mut console).await?;

    display::display_usage(&orchestrator.usage());
    println!("Goodbye!");

    Ok(())
}
