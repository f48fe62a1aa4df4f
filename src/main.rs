//! # aprs2influxdb
//!
//! Connects to APRS-IS and saves the packet stream to InfluxDB.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load the settings file and apply command line overrides
//!    - Set up logging to stdout and an hourly rotated file
//!    - Connect to APRS-IS and log in (exit 1 on failure)
//!
//! 2. **Main Loop**
//!    - Send a heartbeat every `interval` minutes
//!    - Decode, translate and write each received packet
//!    - Handle Ctrl+C for graceful shutdown
//!
//! # Examples
//!
//! ```bash
//! aprs2influxdb --callsign W1AW-9 --dbhost localhost --dbname aprs
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use aprs2influxdb::config::{Config, Overrides, CONFIG_FILE_NAME};
use aprs2influxdb::influx::HttpLineWriter;
use aprs2influxdb::logging;
use aprs2influxdb::session::Session;
use aprs2influxdb::translate::Translator;

/// Connects to APRS-IS and saves stream to local InfluxDB
#[derive(Parser, Debug)]
#[command(name = "aprs2influxdb")]
#[command(version)]
struct Args {
    /// Settings file (default: first of ./config.toml,
    /// ~/.local/etc/aprs2influxdb/config.toml, /etc/aprs2influxdb/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the merged settings to the settings file and exit
    #[arg(long = "init-config")]
    init_config: bool,

    /// Set InfluxDB host
    #[arg(long)]
    dbhost: Option<String>,

    /// Set InfluxDB port
    #[arg(long)]
    dbport: Option<u16>,

    /// Set InfluxDB user
    #[arg(long)]
    dbuser: Option<String>,

    /// Set InfluxDB password
    #[arg(long)]
    dbpassword: Option<String>,

    /// Set InfluxDB database name
    #[arg(long)]
    dbname: Option<String>,

    /// Set APRS-IS login callsign
    #[arg(long)]
    callsign: Option<String>,

    /// Set APRS-IS port
    #[arg(long)]
    port: Option<u16>,

    /// Set APRS-IS heartbeat interval in minutes
    #[arg(long)]
    interval: Option<u64>,

    /// Set logging level to DEBUG
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            dbhost: self.dbhost.clone(),
            dbport: self.dbport,
            dbuser: self.dbuser.clone(),
            dbpassword: self.dbpassword.clone(),
            dbname: self.dbname.clone(),
            callsign: self.callsign.clone(),
            port: self.port,
            interval: self.interval,
            debug: self.debug,
        }
    }
}

/// Load the settings file and merge command line overrides
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, source) =
        Config::load_or_default(args.config.as_deref()).context("Failed to load settings")?;
    config
        .apply_overrides(&args.overrides())
        .context("Invalid settings")?;
    Ok((config, source))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, source) = load_config(&args)?;

    if args.init_config {
        let path = args
            .config
            .clone()
            .or(source)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        config
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote settings to {}", path.display());
        return Ok(());
    }

    let _log_guard = logging::init(&config.logging)?;

    info!("aprs2influxdb v{} starting...", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => info!("Using settings from {}", path.display()),
        None => info!("No settings file found, using defaults"),
    }
    if config.aprsis.is_nocall() {
        warn!("APRS-IS ignores the callsign \"{}\"!", config.aprsis.callsign);
    }

    let writer = HttpLineWriter::new(&config.influx)?;
    info!("Writing to InfluxDB at {} (database {})", writer.url(), config.influx.dbname);

    let translator = Translator::new(&config.translate);
    let mut session = Session::new(config.aprsis.clone(), translator, writer);

    let stream = match session.connect().await {
        Ok(stream) => stream,
        Err(e) => {
            error!("{}", e);
            error!(
                "APRS Login Callsign: {} Port: {}",
                config.aprsis.callsign, config.aprsis.port
            );
            return Err(e.into());
        }
    };

    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = session.run(stream) => {
            if let Err(e) = result {
                error!("{}", e);
                return Err(e.into());
            }
        }

        // Handle Ctrl+C for graceful shutdown
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    session.shutdown();
    let stats = session.stats();
    info!(
        "Total packets written: {} ({} write errors)",
        stats.written, stats.write_errors
    );

    Ok(())
}
