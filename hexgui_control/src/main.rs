//! # hexgui
//!
//! Engineering console for the camera and M2 hexapod controllers.
//!
//! Connects to the controller (or to the in-process simulator with
//! `--simulate`) and runs the operator console on stdin.
//!
//! # Usage
//!
//! ```bash
//! # Camera hexapod, simulated
//! hexgui 1 --simulate
//!
//! # M2 hexapod at a specific address, debug logs
//! hexgui 2 --host 10.0.0.12 --port 5560 -d debug
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use hexgui_common::config::{HexguiConfig, LogLevel, SettingsOverride};
use hexgui_common::consts::DEFAULT_CONFIG_PATH;
use hexgui_common::controller::HexapodKind;
use hexgui_common::transport::Connector;
use hexgui_control::console::{self, StdinConfirm};
use hexgui_control::{Session, TcpConnector};
use hexgui_sim::SimulationConnector;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// hexgui: hexapod controller engineering console
#[derive(Parser, Debug)]
#[command(name = "hexgui")]
#[command(version)]
#[command(about = "Manual control of the camera and M2 hexapod controllers")]
struct Args {
    /// Hexapod index: 1 camera, 2 M2
    #[arg(value_parser = parse_hexapod)]
    hexapod: HexapodKind,

    /// Use the in-process simulator instead of TCP
    #[arg(short, long)]
    simulate: bool,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Controller host, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Controller port, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'd', long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Enable verbose logging (DEBUG level)
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

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    s.parse().map_err(|e: hexgui_common::config::ConfigError| e.to_string())
}

fn main() {
    let args = Args::parse();

    let overrides = SettingsOverride {
        host: args.host.clone(),
        port: args.port,
        log_level: args.log_level,
        ..Default::default()
    };
    let loaded = HexguiConfig::load_or_default(&args.config).map(|c| c.with_overrides(&overrides));
    let level = match &loaded {
        Ok(config) => config.shared.log_level,
        Err(_) => args.log_level.unwrap_or_default(),
    };
    setup_tracing(&args, level);

    info!("hexgui v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match loaded {
        Ok(config) => run(&args, config),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("hexgui shutdown complete");
}

fn run(args: &Args, config: HexguiConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let connector: Arc<dyn Connector> = if args.simulate {
        Arc::new(SimulationConnector::new(args.hexapod))
    } else {
        Arc::new(TcpConnector::new())
    };
    info!(
        hexapod = ?args.hexapod,
        transport = connector.name(),
        address = %config.connection.address(),
        "session configured"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let session = Session::new(config, args.hexapod, connector, Arc::new(StdinConfirm));

    if let Err(e) = runtime.block_on(session.connect()) {
        warn!(error = %e, "initial connection failed, use 'connect' to retry");
    }

    console::run(&runtime, &session)?;

    if let Err(e) = runtime.block_on(session.disconnect()) {
        warn!(error = %e, "link left open at exit");
    }
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
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
