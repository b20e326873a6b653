//! Realtime fan-out server
//!
//! Run with: cargo run --bin fanout-server -- [BIND_ADDR] [--config PATH]
//!
//! Examples:
//!   fanout-server                          # binds to 0.0.0.0:8000
//!   fanout-server localhost                # binds to 127.0.0.1:8000
//!   fanout-server 127.0.0.1:9000           # binds to 127.0.0.1:9000
//!   fanout-server --config fanout.toml     # settings from a TOML file
//!
//! Settings may also come from `FANOUT_*` environment variables, e.g.
//! `FANOUT_MAX_CONNECTIONS=1000`.
//!
//! ## Subscribe
//!
//!   websocat ws://localhost:8000/ws/my-project/notes
//!
//! ## Write
//!
//!   curl -X POST localhost:8000/projects/my-project/collections/notes/documents \
//!        -H 'content-type: application/json' -d '{"text":"hi"}'

use std::net::SocketAddr;
use std::path::PathBuf;

use fanout_rs::server::config::DEFAULT_PORT;
use fanout_rs::{RealtimeServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8000
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8000
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    bind_addr: Option<SocketAddr>,
    config_path: Option<PathBuf>,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "-c" | "--config" => {
                let path = args.next().ok_or("--config requires a path")?;
                parsed.config_path = Some(PathBuf::from(path));
            }
            addr => parsed.bind_addr = Some(parse_bind_addr(addr)?),
        }
    }

    Ok(parsed)
}

fn print_usage() {
    eprintln!("Usage: fanout-server [BIND_ADDR] [--config PATH]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR        Address to bind to (default: 0.0.0.0:{DEFAULT_PORT})");
    eprintln!("  -c, --config     TOML settings file");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FANOUT_BIND_ADDR, FANOUT_MAX_CONNECTIONS, FANOUT_PING_INTERVAL_SECS,");
    eprintln!("  FANOUT_MAX_MESSAGE_SIZE, FANOUT_QUEUE_CAPACITY, FANOUT_OVERFLOW_POLICY");
    eprintln!("  RUST_LOG         Log filter (default: info)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if args.help {
        print_usage();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
                .add_directive("fanout_rs=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::load(args.config_path.as_deref())?;
    if let Some(addr) = args.bind_addr {
        config = config.bind(addr);
    }

    tracing::info!(
        addr = %config.bind_addr,
        max_connections = config.max_connections,
        queue_capacity = config.registry.subscriber_queue_capacity,
        "Starting realtime server"
    );

    let server = RealtimeServer::new(config);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
