use clap::builder::RangedU64ValueParser;
use clap::Parser;
use log::{error, info};
use server::config::{ChannelCapacity, ServerConfig};
use server::network::ChatServer;
use std::time::Duration;

/// Command line arguments, each with an environment fallback
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "CHAT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, env = "CHAT_PORT", default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Request path accepted for WebSocket upgrades
    #[arg(long, env = "CHAT_WS_PATH", default_value = shared::CHAT_PATH)]
    ws_path: String,

    /// Maximum time a single delivery to one client may take
    #[arg(
        long,
        env = "CHAT_WRITE_TIMEOUT_MS",
        default_value = "5000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    write_timeout_ms: u64,

    /// Broadcast channel capacity; 0 or unset means unbounded
    #[arg(long, env = "CHAT_CHANNEL_CAPACITY")]
    channel_capacity: Option<usize>,

    /// Maximum number of concurrent chat connections
    #[arg(
        short,
        long,
        env = "CHAT_MAX_CONNECTIONS",
        default_value = "1024",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    max_connections: usize,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            ws_path: args.ws_path,
            write_timeout: Duration::from_millis(args.write_timeout_ms),
            channel_capacity: ChannelCapacity::from_option(args.channel_capacity),
            max_connections: args.max_connections,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(Args::parse());
    let server = ChatServer::bind(config).await?;

    let shutdown = server.shutdown_token();
    let mut server_handle = tokio::spawn(server.run());

    tokio::select! {
        result = &mut server_handle => {
            return match result {
                Ok(result) => Ok(result?),
                Err(e) => {
                    error!("Server task panicked: {}", e);
                    Ok(())
                }
            };
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.cancel();
        }
    }

    match server_handle.await {
        Ok(result) => result?,
        Err(e) => error!("Server task panicked: {}", e),
    }

    Ok(())
}
