//! # Hexapod mock controller
//!
//! Serves a simulated hexapod controller over TCP so the engineering client
//! can be exercised without hardware.
//!
//! # Usage
//!
//! ```bash
//! # M2 hexapod on the configured port
//! hexgui_sim 2
//!
//! # Camera hexapod on a specific port, verbose
//! hexgui_sim 1 --port 5570 -v
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hexgui_common::config::{HexguiConfig, SettingsOverride};
use hexgui_common::consts::DEFAULT_CONFIG_PATH;
use hexgui_common::controller::HexapodKind;
use hexgui_sim::connector::telemetry_period;
use hexgui_sim::server;
use hexgui_sim::MockController;
use parking_lot::Mutex;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Hexapod mock controller
#[derive(Parser, Debug)]
#[command(name = "hexgui_sim")]
#[command(version)]
#[command(about = "Simulated hexapod controller serving the controller wire protocol")]
struct Args {
    /// Hexapod index: 1 camera, 2 M2
    #[arg(value_parser = parse_hexapod)]
    hexapod: HexapodKind,

    /// Configuration file (host and port are taken from [connection])
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen host, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Telemetry rate [Hz], overrides the configuration
    #[arg(long)]
    rate: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn parse_hexapod(s: &str) -> Result<HexapodKind, String> {
    s.parse::<u8>()
        .ok()
        .and_then(HexapodKind::from_index)
        .ok_or_else(|| format!("unknown hexapod index '{s}' (expected 1 or 2)"))
}

fn main() {
    if let Err(e) = run() {
        error!("mock controller failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    let overrides = SettingsOverride {
        host: args.host.clone(),
        port: args.port,
        ..Default::default()
    };
    let config = HexguiConfig::load_or_default(&args.config)?.with_overrides(&overrides);
    config.validate()?;

    let rate = args.rate.unwrap_or(config.telemetry.nominal_rate_hz);
    let period = telemetry_period(rate)?;

    info!(
        "hexgui_sim v{} starting: {:?} hexapod at {} ({} Hz)",
        env!("CARGO_PKG_VERSION"),
        args.hexapod,
        config.connection.address(),
        rate
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = server::bind(&config.connection.address()).await?;
        let controller = Arc::new(Mutex::new(MockController::new(args.hexapod)));

        tokio::select! {
            result = server::serve(listener, controller, period) => result?,
            _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
        }
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    info!("hexgui_sim shutdown complete");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
