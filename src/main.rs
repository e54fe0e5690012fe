use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use rust_room_chat::ChatRoom;
use rust_room_chat::api;
use rust_room_chat::config::{self, AppConfig};
use rust_room_chat::presence::{Clock, SystemClock};
use rust_room_chat::storage::{MemoryStorage, SqliteStorage};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;

#[derive(Parser)]
#[command(
    name = "rust_room_chat",
    version,
    about = "Shared-room chat relay with presence tracking"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Listen address, overrides config and PORT
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
    /// SQLite database file, overrides config and DATABASE_PATH
    #[arg(long, value_name = "FILE", conflicts_with = "in_memory")]
    database: Option<String>,
    /// Keep participants and messages in memory only
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = resolve_config(&cli)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let policy = app_config.name_policy()?;
    let room = match &app_config.database_path {
        Some(path) => {
            log::info!("Using SQLite storage at {path}");
            let storage = Arc::new(SqliteStorage::with_path(path)?);
            ChatRoom::with_storage(storage, clock, policy, app_config.default_message_limit)
        }
        None => {
            log::info!("Using in-memory storage");
            let storage = Arc::new(MemoryStorage::new());
            ChatRoom::with_storage(storage, clock, policy, app_config.default_message_limit)
        }
    };
    let room = Arc::new(room);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Arc::new(room.sweeper(app_config.sweeper()));
    let sweeper_handle = sweeper.spawn(shutdown_rx);

    let addr = app_config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    log::info!("Chat server listening on {addr}");

    axum::serve(listener, api::router(room))
        .with_graceful_shutdown(async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {err}");
            }
            log::info!("Received shutdown signal, stopping chat server...");
        })
        .await?;

    shutdown_tx.send(true).ok();
    sweeper_handle.await?;

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, config::ConfigError> {
    let mut app_config = AppConfig::from_file(&cli.config)?;
    app_config.apply_env();

    if let Some(bind) = &cli.bind {
        app_config.bind_addr = bind.clone();
    }
    if let Some(database) = &cli.database {
        app_config.database_path = Some(database.clone());
    }
    if cli.in_memory {
        app_config.database_path = None;
    }

    Ok(app_config)
}
