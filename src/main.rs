// src/main.rs - Command-line entry point
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;
use timesync_rs::cancel::{self, WatchOutcome};
use timesync_rs::clock::wall_time;
use timesync_rs::codec;
use timesync_rs::config::{self, Config};
use timesync_rs::keyboard::{CrlfWriter, KeyPressSource};
use timesync_rs::sender;
use timesync_rs::serial;
use timesync_rs::CancellationToken;

const DEFAULT_CONFIG_PATH: &str = "timesync.toml";
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(20);

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Parser, Debug)]
#[command(
    name = "timesync",
    about = "Send the host's Unix time to a serial device once per second",
    version
)]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<String>,

    /// Serial port (overrides config file).
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate (overrides config file).
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Offset from UTC in hours (overrides config file).
    #[arg(long, global = true, allow_negative_numbers = true)]
    offset: Option<i32>,

    /// Log every byte written.
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send time updates until the cancel key is pressed (default).
    Send,
    /// List serial ports present on this machine.
    Ports,
    /// Decode a 4-byte payload given as 8 hex digits.
    Decode { payload: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode, BoxError> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else if args.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(|| CrlfWriter(std::io::stderr()))
        .init();

    match args.command {
        Some(Command::Ports) => list_ports(),
        Some(Command::Decode { ref payload }) => decode(payload),
        Some(Command::Send) | None => {
            let config = resolve_config(&args)?;
            send(config).await
        }
    }
}

fn resolve_config(args: &Args) -> Result<Config, BoxError> {
    let path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut config = config::load_or_default(path, args.config.is_some()).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", path, e);
        Box::new(e) as BoxError
    })?;

    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud = baud;
    }
    if let Some(offset) = args.offset {
        config.clock.utc_offset_hours = offset;
    }
    config.validate()?;
    Ok(config)
}

async fn send(config: Config) -> Result<ExitCode, BoxError> {
    tracing::info!("Starting timesync {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Port: {} @ {} baud, UTC offset {:+} h",
        config.serial.port, config.serial.baud, config.clock.utc_offset_hours
    );

    let token = CancellationToken::new();
    let source = KeyPressSource::new(config.cancel.key)?;
    tracing::info!("Press {} to stop", config.cancel.key);
    let watcher = cancel::spawn_watcher(source, token.clone(), KEY_POLL_INTERVAL);

    // Failures are logged where they happen; only the outcome matters here.
    let report = sender::run_serial(&config, &token).await.ok();

    // The watcher also exits once it sees the latch set by a failed send.
    match watcher.await? {
        Ok(WatchOutcome::Requested) => tracing::debug!("Watcher stopped on key press"),
        Ok(WatchOutcome::AlreadyCancelled) => tracing::debug!("Watcher stopped after sender exit"),
        Err(e) => return Err(Box::new(e)),
    }

    match report {
        Some(report) => {
            match report.last_sent {
                Some(last) => tracing::info!("Stopped after {} update(s), last Unix time {}", report.messages_sent, last),
                None => tracing::info!("Stopped after {} update(s)", report.messages_sent),
            }
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

fn list_ports() -> Result<ExitCode, BoxError> {
    let ports = serial::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(ExitCode::SUCCESS)
}

fn decode(text: &str) -> Result<ExitCode, BoxError> {
    let payload = codec::parse_hex_payload(text)?;
    let value = codec::decode_timestamp(&payload);
    match wall_time(i64::from(value)) {
        Some(local) => println!("{} ({})", value, local.format("%Y-%m-%d %H:%M:%S")),
        None => println!("{}", value),
    }
    Ok(ExitCode::SUCCESS)
}
