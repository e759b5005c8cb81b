use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use oxitopdump::config::Config;
use oxitopdump::emulator::{fixture_bottles, open_device_port, Emulator};

/// Emulates an OxiTop OC110 data logger on a serial port
#[derive(Debug, Parser)]
#[command(name = "oxitopemu", version)]
struct Args {
    /// Serial port to serve the emulated unit on
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate of the emulated unit
    #[arg(short, long)]
    baud: Option<u32>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every line exchanged with the host
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    println!("🧪 OxiTop OC110 emulator v{}\n", oxitopdump::VERSION);

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.serial_port = port;
    }
    if let Some(baud) = args.baud {
        config.emulator.baud_rate = baud;
    }
    config.validate()?;

    let port = open_device_port(&config.serial_port, &config.emulator)?;
    let emulator = Emulator::spawn(port, fixture_bottles()?, &config.emulator)?;

    println!("✅ Emulator running on {}. Press Ctrl+C to stop.", config.serial_port);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("⏹️  Interrupt received, stopping emulator");
    emulator.stop()?;
    println!("👋 Emulator stopped");
    Ok(())
}
