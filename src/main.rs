use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};

use assistant_core::collaborators::memory::{InMemoryBilling, InMemoryWorkspace};
use assistant_core::collaborators::{Collaborators, PluginDescriptor};
use assistant_core::config::Config;
use assistant_core::functions::FunctionRegistry;
use assistant_core::service::{AssistantService, Turn};
use assistant_core::stream::BroadcastTransport;

/// A turn to replay, plus the plugins the in-memory catalog should know.
#[derive(Debug, Deserialize)]
struct TurnFile {
    #[serde(flatten)]
    turn: Turn,
    #[serde(default)]
    plugins: Vec<PluginDescriptor>,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    if args.iter().any(|a| a == "--list-functions") {
        match serde_json::to_string_pretty(&FunctionRegistry::definitions()) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("failed to encode function definitions: {e}"),
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = flag_value(&args, "--config").map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let Some(turn_path) = flag_value(&args, "--turn").map(PathBuf::from) else {
        print_usage();
        return;
    };

    let turn_file: TurnFile = match std::fs::read_to_string(&turn_path)
        .map_err(assistant_core::AssistantError::from)
        .and_then(|s| serde_json::from_str(&s).map_err(Into::into))
    {
        Ok(t) => t,
        Err(e) => {
            error!(path = %turn_path.display(), "failed to read turn: {e}");
            std::process::exit(1);
        }
    };

    info!(
        assistant_enabled = config.assistant_enabled,
        billing = config.billing.enabled,
        topic = %config.stream.topic,
        "assistant-core starting"
    );

    let workspace = Arc::new(InMemoryWorkspace::new());
    for plugin in turn_file.plugins {
        workspace.add_plugin(plugin);
    }
    let collaborators = Collaborators::from_workspace(&workspace);
    let transport = Arc::new(BroadcastTransport::new(config.stream.channel_capacity));
    let mut rx = transport.subscribe();
    let service = AssistantService::new(
        &config,
        Arc::new(InMemoryBilling::new()),
        collaborators,
        transport,
    );

    let outcome = service.run_turn(&turn_file.turn).await;

    while let Ok(published) = rx.try_recv() {
        println!("{} {}", published.topic, published.payload);
    }

    match outcome {
        Ok(outcome) => {
            if let Some(result) = outcome.function_result {
                println!("function {} ({}): {}", result.function, result.call_id, result.to_tool_output());
            }
        }
        Err(e) => {
            error!("turn failed: {e}");
            std::process::exit(1);
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn print_usage() {
    println!(
        "assistant-core — entitlement gate, function dispatch and message streaming

USAGE:
    assistant-core --turn <PATH> [OPTIONS]

OPTIONS:
    --turn <PATH>       Replay the turn described in a JSON file
    --config <PATH>     Path to config file (default: ~/.config/assistant-core/config.toml)
    --default-config    Print default config to stdout and exit
    --list-functions    Print the function catalog as JSON and exit
    -h, --help          Print this help message

ENVIRONMENT:
    FEATURE_AI_ASSISTANT_ENABLED   Override `assistant_enabled` (true/false)
    RUST_LOG                       Log filter (default: info)"
    );
}
