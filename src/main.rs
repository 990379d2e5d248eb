//! driftkv server entry point.
//!
//! Parses the command line, installs logging, binds the listener, and runs
//! the worker pool until Ctrl+C.

use driftkv::protocol::DEFAULT_MAX_COMMAND_SIZE;
use driftkv::server::Server;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration.
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Number of pool workers
    workers: usize,
    /// Bound on a single framed command, in bytes
    max_command_size: usize,
    /// Per-connection idle timeout, in seconds
    idle_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: driftkv::DEFAULT_HOST.to_string(),
            port: driftkv::DEFAULT_PORT,
            workers: driftkv::DEFAULT_WORKERS,
            max_command_size: DEFAULT_MAX_COMMAND_SIZE,
            idle_timeout_secs: driftkv::DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments.
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = Self::value_of(&args, i, "--host");
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = Self::parsed_value_of(&args, i, "--port");
                    i += 2;
                }
                "--workers" | "-w" => {
                    config.workers = Self::parsed_value_of(&args, i, "--workers");
                    if config.workers == 0 {
                        eprintln!("Error: --workers must be positive");
                        std::process::exit(1);
                    }
                    i += 2;
                }
                "--max-command-size" => {
                    config.max_command_size =
                        Self::parsed_value_of(&args, i, "--max-command-size");
                    if config.max_command_size == 0 {
                        eprintln!("Error: --max-command-size must be positive");
                        std::process::exit(1);
                    }
                    i += 2;
                }
                "--timeout" | "-t" => {
                    config.idle_timeout_secs = Self::parsed_value_of(&args, i, "--timeout");
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("driftkv version {}", driftkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn value_of(args: &[String], i: usize, flag: &str) -> String {
        match args.get(i + 1) {
            Some(value) => value.clone(),
            None => {
                eprintln!("Error: {flag} requires a value");
                std::process::exit(1);
            }
        }
    }

    fn parsed_value_of<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
        Self::value_of(args, i, flag).parse().unwrap_or_else(|_| {
            eprintln!("Error: invalid value for {flag}");
            std::process::exit(1);
        })
    }

    /// Returns the bind address as a string.
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
driftkv - A Lightweight In-Memory RESP Cache

USAGE:
    driftkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>              Port to listen on (default: 6379)
    -w, --workers <N>              Worker pool size (default: 8)
        --max-command-size <BYTES> Bound on a single command (default: 10240)
    -t, --timeout <SECONDS>        Per-connection idle timeout (default: 60)
    -v, --version                  Print version information
        --help                     Print this help message

EXAMPLES:
    driftkv                        # Start on 127.0.0.1:6379
    driftkv --port 6380 -w 16      # Port 6380, 16 workers
    driftkv --host 0.0.0.0         # Listen on all interfaces

CONNECTING:
    Any RESP client works:
    $ redis-cli -3 -p 6379
    127.0.0.1:6379> SET name driftkv
    127.0.0.1:6379> GET name
    "driftkv"
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
driftkv v{} - Lightweight In-Memory RESP Cache
──────────────────────────────────────────────
Listening on {} with {} workers.
Use Ctrl+C to shutdown gracefully.
"#,
        driftkv::VERSION,
        config.bind_address(),
        config.workers
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    print_banner(&config);

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(addr = %config.bind_address(), "listening");

    let server = Server::new(
        listener,
        config.workers,
        config.max_command_size,
        Duration::from_secs(config.idle_timeout_secs),
    );

    server
        .run(async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
            info!("shutdown signal received, stopping server");
        })
        .await;

    info!("server shutdown complete");
    Ok(())
}
