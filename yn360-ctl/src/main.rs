//! Command line control for YN360 light fixtures
//!
//! Replicas come from `$YN360_HOME/fixture.json` (default `~/.yn360`) or from
//! `--device ADDRESS=CONTROL_UUID` flags, which take precedence.
//!
//! Usage:
//!   yn360-ctl scan [--duration SECS]      - List nearby BLE devices
//!   yn360-ctl discover <ADDRESS>          - Print a replica entry for the fixture file
//!   yn360-ctl on | off
//!   yn360-ctl brightness <0-255>
//!   yn360-ctl rgb <R> <G> <B> [--brightness N]
//!   yn360-ctl temp <KELVIN> [--brightness N]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::info;
use tracing_subscriber::EnvFilter;

use yn360_channel::{BleTransport, Fixture, FixtureAddress, FixtureFile, ReplicaEntry, ReplicaSet};
use yn360_proto::DesiredState;

#[derive(Parser)]
#[command(name = "yn360-ctl")]
#[command(about = "Control YN360 LED lights over Bluetooth LE")]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Replica as ADDRESS=CONTROL_UUID, repeat for replicas of one light
    #[arg(short, long = "device", global = true, value_parser = parse_replica)]
    devices: Vec<ReplicaEntry>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for YN360 lights
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Find the control characteristic of a light
    Discover {
        /// BLE address of the light
        address: String,
    },
    /// Turn the light on
    On,
    /// Turn the light off
    Off,
    /// Dimmable white at the given level
    Brightness { level: u8 },
    /// RGB color, optionally dimmed
    Rgb {
        red: u8,
        green: u8,
        blue: u8,
        #[arg(short, long)]
        brightness: Option<u8>,
    },
    /// White color temperature in Kelvin (3200-5600)
    Temp {
        kelvin: u16,
        #[arg(short, long)]
        brightness: Option<u8>,
    },
}

fn parse_replica(s: &str) -> Result<ReplicaEntry, String> {
    let (address, control) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDRESS=CONTROL_UUID, got {s:?}"))?;
    let control = control
        .trim()
        .parse()
        .map_err(|e| format!("invalid control characteristic {control:?}: {e}"))?;

    Ok(ReplicaEntry { address: FixtureAddress::new(address.trim()), control })
}

fn get_home() -> PathBuf {
    std::env::var("YN360_HOME").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|home| home.join(".yn360"))
            .unwrap_or_else(|| PathBuf::from(".yn360"))
    })
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file = FixtureFile::load(&get_home().join("fixture.json"))?;
    let transport = BleTransport::new(file.channel.scan_window).await?;

    let desired = match cli.command {
        Commands::Scan { duration } => return scan(&transport, duration).await,
        Commands::Discover { address } => {
            return discover(&transport, address, file.channel.connect_timeout).await;
        }
        Commands::On => DesiredState::on(),
        Commands::Off => DesiredState::off(),
        Commands::Brightness { level } => DesiredState::default().with_brightness(level),
        Commands::Rgb { red, green, blue, brightness } => {
            dimmed(brightness).with_rgb(red, green, blue)
        }
        Commands::Temp { kelvin, brightness } => dimmed(brightness).with_color_temp(kelvin),
    };

    let entries = if cli.devices.is_empty() { file.replicas } else { cli.devices };
    let replicas = ReplicaSet::new(entries.into_iter().map(|e| (e.address, e.control)))?;
    let fixture = Fixture::new(Arc::new(transport), replicas, file.channel);

    let result = fixture.apply_desired_state(desired).await;
    fixture.shutdown().await;
    result?;

    if let Some(address) = fixture.last_success().await {
        info!("command accepted by {address}");
    }
    println!("{}", serde_json::to_string_pretty(&fixture.state().await)?);
    Ok(())
}

fn dimmed(brightness: Option<u8>) -> DesiredState {
    match brightness {
        Some(level) => DesiredState::default().with_brightness(level),
        None => DesiredState::default(),
    }
}

async fn scan(transport: &BleTransport, duration: u64) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for YN360 lights ({} seconds)...", duration);

    let devices = transport.scan(Duration::from_secs(duration)).await?;

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device.rssi.map(|r| format!("{} dBm", r)).unwrap_or_else(|| "N/A".to_string());
        let marker = if device.is_yn360 { " [YN360]" } else { "" };
        println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
    }

    Ok(())
}

async fn discover(
    transport: &BleTransport,
    address: String,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let address = FixtureAddress::new(address);
    let control = transport.find_control_handle(&address, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&ReplicaEntry { address, control })?);
    Ok(())
}
