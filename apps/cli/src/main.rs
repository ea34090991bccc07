use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, DEFAULT_CONFIG_PATH},
    CounterStore, HttpRemoteClient, StaticIdentity, StoreView,
};
use shared::domain::SendMode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Drive a counter node's request flows from the terminal")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    /// Skip asking the node for its identity.
    #[arg(long)]
    node: Option<String>,
    /// Print the resulting view as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and show the current counters.
    Status,
    Ping {
        message: String,
    },
    /// Post a `PingLocal` body to `/api` to exercise the node's rejection path.
    PingMismatch {
        message: Option<String>,
    },
    Send {
        message: String,
        #[arg(long, default_value_t = SendMode::Local)]
        mode: SendMode,
        #[arg(long)]
        target: Option<String>,
    },
    /// Have the node forward a mismatched request to `target`.
    Mismatch {
        #[arg(long)]
        target: String,
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(node) = args.node {
        settings.node = Some(node);
    }

    let client = Arc::new(HttpRemoteClient::from_settings(&settings)?);
    let node = match settings.node.clone() {
        Some(node) => Some(node),
        None => client.resolve_node_identity().await,
    };
    info!(server_url = %settings.server_url, node = ?node, "starting counter cli");
    let store = CounterStore::over_http(client, Arc::new(StaticIdentity::new(node)));

    store.initialize().await;
    if store.view().is_connected {
        run(&store, args.command).await;
    }

    let view = store.view();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view);
    }
    Ok(if view.error.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn run(store: &CounterStore, command: Command) {
    match command {
        Command::Status => {}
        Command::Ping { message } => {
            store.set_http_message(message);
            store.send_ping().await;
        }
        Command::PingMismatch { message } => {
            store.set_http_message(message.unwrap_or_default());
            store.trigger_http_mismatch().await;
        }
        Command::Send {
            message,
            mode,
            target,
        } => {
            store.set_send_mode(mode);
            store.set_remote_node(target.unwrap_or_default());
            store.set_process_message(message);
            store.send_message().await;
        }
        Command::Mismatch { target, message } => {
            store.set_mismatch_node(target);
            store.set_mismatch_message(message);
            store.trigger_mismatch().await;
        }
    }
}

fn print_view(view: &StoreView) {
    match &view.node_id {
        Some(node) => println!("node:   {node}"),
        None => println!("node:   (not connected)"),
    }
    match &view.counters {
        Some(counters) => {
            print_counter("http", counters.http_count, &counters.http_last_message);
            print_counter("local", counters.local_count, &counters.local_last_message);
            print_counter("remote", counters.remote_count, &counters.remote_last_message);
        }
        None => println!("counters unavailable"),
    }
    if let Some(error) = &view.error {
        eprintln!("error:  {error}");
    }
}

fn print_counter(label: &str, count: u64, last_message: &Option<String>) {
    let last = last_message.as_deref().unwrap_or("-");
    println!("{label:<7} {count:>5}  last: {last}");
}
