//! Luxlog Service - light-sensor ingestion and reporting API.
//!
//! Run with: `cargo run -p luxlog-service`

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use luxlog_service::{AppState, Config};
use luxlog_store::{ExportRange, Store};

/// Luxlog Service - HTTP API for light-sensor readings.
#[derive(Parser, Debug)]
#[command(name = "luxlog-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Directory of dashboard files (overrides config).
    #[arg(long, global = true)]
    static_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server in the foreground (default behavior).
    Run,

    /// Export one device's readings in a time range as CSV.
    Export {
        /// Device id to export.
        #[arg(long)]
        device: String,

        /// Inclusive start, e.g. "2024-05-01T00:00" or "2024-05-01 00:00:00".
        #[arg(long)]
        start: String,

        /// Inclusive end, same formats as --start.
        #[arg(long)]
        end: String,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List every device that has reported a reading.
    Devices {
        /// Also print each device's reading count, tab-separated.
        #[arg(long)]
        counts: bool,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so CSV on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("luxlog_service=info".parse()?)
                .add_directive("luxlog_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        Some(Command::Export {
            device,
            start,
            end,
            output,
        }) => export(&config, &device, &start, &end, output),
        Some(Command::Devices { counts }) => list_devices(&config, counts),
        Some(Command::Config) => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Some(Command::Run) | None => run_server(config).await,
    }
}

/// Load the config file and apply command-line overrides.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }
    if let Some(dir) = &args.static_dir {
        config.server.static_dir = Some(dir.clone());
    }

    config.validate()?;
    Ok(config)
}

fn export(
    config: &Config,
    device: &str,
    start: &str,
    end: &str,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = Store::open(&config.storage.path)?;
    let clock = config.time.clock()?;
    let range = ExportRange::parse(device, start, end, &clock)?;

    let rows = match &output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            store.export_csv(&range, &clock, BufWriter::new(file))?
        }
        None => store.export_csv(&range, &clock, io::stdout().lock())?,
    };

    info!("Exported {} readings for {}", rows, device);
    Ok(())
}

fn list_devices(config: &Config, counts: bool) -> anyhow::Result<()> {
    let store = Store::open(&config.storage.path)?;
    let mut stdout = io::stdout().lock();
    for device in store.list_devices()? {
        if counts {
            let n = store.count_readings(Some(&device))?;
            writeln!(stdout, "{}\t{}", device, n)?;
        } else {
            writeln!(stdout, "{}", device)?;
        }
    }
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let store = Store::open(&config.storage.path)?;

    let static_dir = config.server.static_dir.clone();
    match &static_dir {
        Some(dir) => info!("Serving static files from {}", dir.display()),
        None => info!("No static directory configured"),
    }

    let bind = config.server.bind.clone();
    let state = AppState::new(store, config)?;
    let app = luxlog_service::app(state, static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
