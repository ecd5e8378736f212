use clap::{Arg, Command};
use emulator::EmulatorConfig;
use tracing::info;

fn validate_interval(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err("Interval must be a positive number of milliseconds".to_owned()),
    }
}

fn read_token_file(path: &str) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map(|content| content.trim().to_owned())
        .map_err(|e| format!("reading token file '{}': {}", path, e))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "emulator starting");

    let matches = Command::new("Device Emulator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A synthetic telemetry device for exercising the relay")
        .arg(
            Arg::new("server")
                .help("Address of the ingest gateway")
                .short('s')
                .long("server")
                .default_value("127.0.0.1:9000"),
        )
        .arg(
            Arg::new("device_id")
                .help("Device identity; must match the token claim")
                .short('d')
                .long("device-id")
                .required(true),
        )
        .arg(
            Arg::new("device_name")
                .help("Human-readable device name")
                .short('n')
                .long("device-name"),
        )
        .arg(
            Arg::new("token")
                .help("Raw signed token")
                .long("token")
                .conflicts_with("token_file"),
        )
        .arg(
            Arg::new("token_file")
                .help("File containing the raw token on a single line")
                .long("token-file"),
        )
        .arg(
            Arg::new("interval")
                .help("Delay between frames in milliseconds")
                .short('i')
                .long("interval")
                .value_parser(validate_interval)
                .default_value("3000"),
        )
        .get_matches();

    let token = match (
        matches.get_one::<String>("token"),
        matches.get_one::<String>("token_file"),
    ) {
        (Some(token), _) => token.clone(),
        (None, Some(path)) => match read_token_file(path) {
            Ok(token) => token,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        (None, None) => {
            eprintln!("Error: one of --token or --token-file is required");
            std::process::exit(1);
        }
    };

    let config = EmulatorConfig {
        server_addr: matches
            .get_one::<String>("server")
            .expect("server has a default")
            .clone(),
        device_id: matches
            .get_one::<String>("device_id")
            .expect("device_id is required")
            .clone(),
        device_name: matches.get_one::<String>("device_name").cloned(),
        token,
        interval_ms: *matches
            .get_one::<u64>("interval")
            .expect("interval has a default"),
    };

    emulator::run(config).await;
}
