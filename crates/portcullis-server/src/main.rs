//! Portcullis - Entry point

use std::path::PathBuf;

use portcullis_config::{ConfigLoader, LogFormat, PortcullisConfig};
use portcullis_server::{Server, ServerResult};
use portcullis_telemetry::{init_logging, init_metrics, LogConfig};
use tracing::{error, info};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("portcullis {}", portcullis_server::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Portcullis - Forward-auth decision service

USAGE:
    portcullis [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    PORTCULLIS__SERVER__LISTEN_ADDR           Listen address (default: 0.0.0.0)
    PORTCULLIS__SERVER__LISTEN_PORT           Listen port (default: 9091)
    PORTCULLIS__SERVER__REQUEST_TIMEOUT       Per-request deadline (default: 5s)
    PORTCULLIS__POLICY__DEFAULT               Default policy (default: two_factor)
    PORTCULLIS__TELEMETRY__LOGGING__LEVEL     Log filter (default: info)
    PORTCULLIS__TELEMETRY__LOGGING__FORMAT    json or pretty (default: json)
    PORTCULLIS__TELEMETRY__METRICS__ENABLED   Serve Prometheus metrics (default: true)

EXAMPLES:
    # Run with configuration file
    portcullis --config /etc/portcullis/portcullis.toml

    # Override the port
    PORTCULLIS__SERVER__LISTEN_PORT=9092 portcullis -c portcullis.toml
"
    );
}

fn load_config(path: Option<PathBuf>) -> ServerResult<PortcullisConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = path {
        loader = loader.with_file(path)?;
    }
    Ok(loader.with_env_prefix("PORTCULLIS").load()?)
}

fn log_config(config: &PortcullisConfig) -> LogConfig {
    LogConfig {
        level: config.telemetry.logging.level.clone(),
        json_format: config.telemetry.logging.format == LogFormat::Json,
        ..LogConfig::default()
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&log_config(&config)) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = init_metrics(config.telemetry.metrics.enabled) {
        error!(error = %e, "failed to initialize metrics");
        std::process::exit(1);
    }

    info!(
        service = %config.telemetry.service_name,
        version = portcullis_server::VERSION,
        domains = config.domains.len(),
        strategies = config.authn.strategies.len(),
        "starting Portcullis"
    );

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, category = e.category(), "failed to create server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!(error = %e, category = e.category(), "server error");
        std::process::exit(1);
    }
}
