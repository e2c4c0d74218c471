mod config_commands;
mod db_commands;
mod queue_commands;
mod trigger_commands;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    courier_config::CourierConfig,
    courier_gateway::{AppState, GatewayServices},
    courier_store::Stores,
};

#[derive(Parser)]
#[command(name = "courier", about = "Courier: scheduled and conversational outbound messaging")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of the discovered one.
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway and the in-process scheduler (default).
    Serve {
        /// Address to bind to (overrides config value).
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides config value).
        #[arg(long)]
        port: Option<u16>,
        /// Do not start the in-process scheduler.
        #[arg(long, default_value_t = false)]
        no_scheduler: bool,
    },
    /// Outbound queue operations.
    Queue {
        #[command(subcommand)]
        action: queue_commands::QueueAction,
    },
    /// Trigger generator operations.
    Trigger {
        #[command(subcommand)]
        action: trigger_commands::TriggerAction,
    },
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// The explicit config file when given, otherwise discovery with defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<CourierConfig> {
    match path {
        Some(path) => {
            let mut config = courier_config::load_config(path)?;
            courier_config::apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(courier_config::discover_and_load()),
    }
}

/// Services wired exactly as `serve` wires them, without the HTTP listener.
pub(crate) async fn open_state(config: CourierConfig) -> anyhow::Result<AppState> {
    let pool =
        courier_store::connect(&config.database.url, config.database.max_connections).await?;
    let stores = Stores::new(pool);
    let services = GatewayServices::from_config(&config, &stores)?;
    AppState::new(config, stores, services)
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            courier_gateway::start_gateway(config).await
        },
        Some(Commands::Serve {
            bind,
            port,
            no_scheduler,
        }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if no_scheduler {
                config.schedule.enabled = false;
            }
            courier_gateway::start_gateway(config).await
        },
        Some(Commands::Queue { action }) => {
            let config = load_config(cli.config.as_deref())?;
            queue_commands::handle_queue(action, config).await
        },
        Some(Commands::Trigger { action }) => {
            let config = load_config(cli.config.as_deref())?;
            trigger_commands::handle_trigger(action, config).await
        },
        Some(Commands::Db { action }) => {
            let config = load_config(cli.config.as_deref())?;
            db_commands::handle_db(action, &config).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
    }
}
