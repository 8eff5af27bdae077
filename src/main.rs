//! gpslink - serial GPS link
//!
//! Runs the link supervisor against a serial receiver and prints every
//! published channel update, or runs one-shot port diagnostics.

use clap::{Parser, Subcommand};
use gpslink_core::cli::{exit_code_description, CliResult, ExitCodes, OutputFormat};
use gpslink_core::config::AppConfig;
use gpslink_core::core::link::probe;
use gpslink_core::core::transport::available_port_options;
use gpslink_core::{logging, BaudDetection, GpsLink, SerialPortFactory, WriterSink};
use std::path::PathBuf;
use std::process::ExitCode;

/// GpsLink CLI
#[derive(Parser, Debug)]
#[command(
    name = "gpslink",
    version,
    about = "Serial NMEA GPS link with automatic reconnection",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "GPSLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the link and print published updates until Ctrl-C
    Run {
        /// Serial port (overrides config)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate (overrides config)
        #[arg(short, long)]
        baud: Option<u32>,
    },

    /// List available serial ports
    ListPorts,

    /// Find the baud rate at which a port emits NMEA fix sentences
    DetectBaud {
        /// Serial port path
        path: String,
    },

    /// Check whether a port emits NMEA fix sentences at a baud rate
    TestPort {
        /// Serial port path
        path: String,

        /// Baud rate
        baud: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(result) => return finish(&result),
    };

    let _log_guard = match logging::init_tracing(&config.logging, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let result = match run_command(&cli, config).await {
        Ok(result) => result,
        Err(e) => CliResult::error(ExitCodes::ERROR, format!("{e:#}")),
    };
    finish(&result)
}

fn load_config(cli: &Cli) -> Result<AppConfig, CliResult> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    Ok(config)
}

fn finish(result: &CliResult) -> ExitCode {
    if !result.is_success() {
        if let Some(msg) = result.message() {
            eprintln!("Error: {msg} ({})", exit_code_description(result.code()));
        }
    }
    result.to_exit_code()
}

async fn run_command(cli: &Cli, mut config: AppConfig) -> anyhow::Result<CliResult> {
    match &cli.command {
        Commands::Run { port, baud } => {
            if let Some(port) = port {
                config.serial.port.clone_from(port);
            }
            if let Some(baud) = baud {
                config.serial.baud_rate = *baud;
            }
            run_link(cli, &config).await
        }
        Commands::ListPorts => list_ports(cli),
        Commands::DetectBaud { path } => detect_baud(cli, &config, path).await,
        Commands::TestPort { path, baud } => test_port(cli, &config, path, *baud).await,
    }
}

async fn run_link(cli: &Cli, config: &AppConfig) -> anyhow::Result<CliResult> {
    if let Err(e) = config.validate() {
        return Ok(e.into());
    }
    let link_config = config.link_config();
    tracing::info!(
        "gpslink v{} on {} @ {} baud",
        gpslink_core::VERSION,
        link_config.port,
        link_config.baud_rate
    );

    let sink = WriterSink::new(std::io::stdout(), cli.format.into());
    let link = GpsLink::start(link_config, SerialPortFactory::new(), sink);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupted, shutting down");
    link.shutdown().await?;

    Ok(CliResult::success())
}

fn list_ports(cli: &Cli) -> anyhow::Result<CliResult> {
    let options = available_port_options(&SerialPortFactory::new());

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&options)?),
        OutputFormat::Text => {
            for option in &options {
                println!("{:<20} {}", option.value, option.label);
            }
        }
    }

    Ok(CliResult::success())
}

async fn detect_baud(cli: &Cli, config: &AppConfig, path: &str) -> anyhow::Result<CliResult> {
    let link_config = config.link_config();
    let detection = match probe::detect_baud_rate(
        &SerialPortFactory::new(),
        path,
        &link_config.baud_candidates,
        link_config.probe_window,
    )
    .await
    {
        Ok(detection) => detection,
        Err(e) => return Ok(e.into()),
    };

    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "path": path, "baud_rate": detection.rate() })
        ),
        OutputFormat::Text => println!("{detection}"),
    }

    Ok(match detection {
        BaudDetection::Detected(_) => CliResult::success(),
        BaudDetection::Undetected => {
            CliResult::device_not_found(format!("No NMEA output detected on {path}"))
        }
    })
}

async fn test_port(
    cli: &Cli,
    config: &AppConfig,
    path: &str,
    baud_rate: u32,
) -> anyhow::Result<CliResult> {
    let alive = match probe::test_port(
        &SerialPortFactory::new(),
        path,
        baud_rate,
        config.link_config().probe_window,
    )
    .await
    {
        Ok(alive) => alive,
        Err(e) => return Ok(e.into()),
    };

    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "path": path, "baud_rate": baud_rate, "alive": alive })
        ),
        OutputFormat::Text => println!("{}", if alive { "alive" } else { "silent" }),
    }

    Ok(if alive {
        CliResult::success()
    } else {
        CliResult::device_not_found(format!("No NMEA output on {path} at {baud_rate} baud"))
    })
}
