use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use driftwood::client::ConnectionManager;
use driftwood::config::Config;
use driftwood::resolver::{LinkResolver, Scheme};
use driftwood::state::{Snapshot, Store};
use driftwood::telemetry::logging::{self as logctl, LogConfig, LogLevel};
use driftwood::transport::websocket::WebSocketDialer;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("driftwood: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logctl::init(&cli.logging.to_config()).context("configuring logging")?;

    let mut config = Config::from_env();
    if let Some(port) = cli.backend_port {
        config.backend_port = port;
    }

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(&config).await,
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "driftwood",
    about = "Mirror the local launcher daemon's state into the terminal",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "DRIFTWOOD_BACKEND_PORT",
        help = "Port the local launcher daemon serves on (default 443)"
    )]
    backend_port: Option<u16>,

    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "DRIFTWOOD_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "DRIFTWOOD_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    file: Option<PathBuf>,
}

impl LoggingArgs {
    fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow projection changes as they arrive (default)
    Watch,
}

async fn watch(config: &Config) -> anyhow::Result<()> {
    let resolver = LinkResolver::new(config.backend_port);
    let url = resolver
        .resolve("/ws", Scheme::Wss)
        .context("resolving mirror endpoint")?;
    info!(target: "watch", %url, backoff_ms = config.reconnect_ms, "mirroring launcher state");

    let store = Arc::new(Store::new());
    let dialer = Arc::new(WebSocketDialer::new(url));
    let manager = ConnectionManager::new(dialer, store.clone())
        .with_backoff(config.reconnect_backoff());

    let mut updates = store.subscribe();
    manager.open();

    print_snapshot(&store.snapshot());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print_snapshot(&snapshot);
            }
        }
    }

    manager.close();
    info!(target: "watch", "mirror closed");
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "connection={} login={} connector={}",
        snapshot.connection.as_str(),
        snapshot.login.as_str(),
        if snapshot.connector_linked { "linked" } else { "unlinked" },
    );
    for (product, sessions) in snapshot.sessions.iter() {
        let ids: Vec<String> = sessions.iter().map(ToString::to_string).collect();
        println!("  {product}: [{}]", ids.join(", "));
    }
}
