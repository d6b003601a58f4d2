use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sk6_rs::config::DEFAULT_MAX_IDLE_READS;
use sk6_rs::notify::{Interest, Notification, Notifier};
use sk6_rs::{DeviceConfig, Reader, SK6, Session, ShakeError};

/// Talk to a SHAKE SK6 over a serial port, or decode a captured stream.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional file path to log output to.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream events and sensor values until Ctrl+C.
    Monitor {
        #[command(flatten)]
        port: PortArgs,
        /// Seconds between sensor snapshots.
        #[arg(short, long, default_value_t = 1)]
        interval: u64,
        /// Append playback readings to this file.
        #[arg(long)]
        playback_log: Option<PathBuf>,
    },
    /// Decode a byte stream captured from the device.
    Decode {
        /// Capture file containing the raw serial bytes.
        input: PathBuf,
    },
    /// Read one configuration register.
    ReadReg {
        #[command(flatten)]
        port: PortArgs,
        /// Register address in hex, e.g. 0x0004.
        #[arg(value_parser = parse_address)]
        address: u16,
    },
    /// Write one configuration register.
    WriteReg {
        #[command(flatten)]
        port: PortArgs,
        /// Register address in hex, e.g. 0x0004.
        #[arg(value_parser = parse_address)]
        address: u16,
        /// Value in hex, e.g. 0x3F.
        #[arg(value_parser = parse_value)]
        value: u8,
    },
}

#[derive(clap::Args, Debug)]
struct PortArgs {
    /// Serial port the SK6 is attached to.
    #[arg(short, long)]
    port: String,
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,
    /// Acknowledgment timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    ack_timeout_ms: u64,
    /// Empty 100 ms reads tolerated before the port is considered gone.
    #[arg(long, default_value_t = DEFAULT_MAX_IDLE_READS)]
    max_idle_reads: u32,
}

fn parse_address(s: &str) -> Result<u16, String> {
    u16::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16).map_err(|e| e.to_string())
}

fn parse_value(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16).map_err(|e| e.to_string())
}

/// Sets up the tracing subscriber for console and optional file logging.
fn setup_logging(verbosity: &Verbosity<InfoLevel>, log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(path) = log_file {
        let file = File::create(path).with_context(|| format!("Failed to create log file at {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file);
        let layer = fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn open(port: &PortArgs, playback_log: Option<PathBuf>) -> Result<SK6> {
    info!("Opening {} at {} baud", port.port, port.baud);
    let source = serialport::new(&port.port, port.baud)
        .timeout(Duration::from_millis(100))
        .open()
        .with_context(|| format!("Failed to open serial port {}", port.port))?;
    let sink = source.try_clone().context("Failed to clone serial port handle")?;

    let mut config = DeviceConfig::default()
        .with_ack_timeout(Duration::from_millis(port.ack_timeout_ms))
        .with_max_idle_reads(port.max_idle_reads);
    if let Some(path) = playback_log {
        config = config.with_playback_log(path);
    }
    SK6::new(source, sink, config).context("Failed to start SK6 reader")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(&cli.verbose, cli.log_file.as_ref())?;

    if let Err(e) = run(cli.command).await {
        error!("Application failed: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Monitor {
            port,
            interval,
            playback_log,
        } => monitor(&port, interval, playback_log).await,
        Commands::Decode { input } => decode(&input),
        Commands::ReadReg { port, address } => {
            let sk6 = open(&port, None)?;
            let value = sk6
                .read_register(address)
                .await
                .with_context(|| format!("Failed to read register {address:#06x}"))?;
            println!("{address:#06x} = {value:#04x}");
            sk6.close().await.ok();
            Ok(())
        }
        Commands::WriteReg { port, address, value } => {
            let sk6 = open(&port, None)?;
            sk6.write_register(address, value)
                .await
                .with_context(|| format!("Failed to write register {address:#06x}"))?;
            info!("Wrote {value:#04x} to {address:#06x}");
            sk6.close().await.ok();
            Ok(())
        }
    }
}

async fn monitor(port: &PortArgs, interval: u64, playback_log: Option<PathBuf>) -> Result<()> {
    let sk6 = open(port, playback_log)?;
    sk6.on_event(|event| info!("Event: {}", event));

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !sk6.is_running() {
                    warn!("Reader stopped");
                    break;
                }
                info!("{}", sk6.sensors());
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down gracefully.");
                break;
            }
        }
    }

    if let Some(device_info) = sk6.device_info() {
        info!("Device: {} firmware {:.2}", device_info.serial, device_info.firmware_revision);
    }
    match sk6.close().await {
        Ok(()) | Err(ShakeError::TransportClosed { .. }) => Ok(()),
        Err(e) => Err(e).context("Reader failed"),
    }
}

/// Prints events as the offline reader extracts them.
struct PrintEvents;

impl Notifier for PrintEvents {
    fn wants(&self, interest: Interest) -> bool {
        interest == Interest::Events
    }

    fn notify(&self, notification: Notification) {
        if let Notification::Event(event) = notification {
            println!("event: {event}");
        }
    }
}

fn decode(input: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read capture {:?}", input))?;
    info!("Decoding {} bytes from {:?}", bytes.len(), input);

    let session = Session::new(Box::new(PrintEvents));
    let sensors = session.sensors.clone();
    let device_info = session.device_info.clone();
    // a cursor at end of stream never delivers again, so one idle cycle means done
    let reader = Reader::new(Cursor::new(bytes), session).with_max_idle_reads(1);

    match reader.run() {
        Ok(()) | Err(ShakeError::TransportClosed { .. }) => {}
        Err(e) => return Err(e).context("Decoding failed"),
    }

    if let Some(info) = device_info.lock().ok().and_then(|info| info.clone()) {
        println!("device: {} ({:?})", info.serial, info.modules);
    }
    let state = sensors.lock().map(|state| state.clone()).unwrap_or_default();
    println!("final state: {state}");
    println!("playback packets: {}", state.playback_packets);
    Ok(())
}
