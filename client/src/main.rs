use clap::Parser;
use client::input::guest_name;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, env = "CHAT_SERVER", default_value = "127.0.0.1:8080")]
    server: String,

    /// Chat endpoint path on the server
    #[arg(long, env = "CHAT_WS_PATH", default_value = shared::CHAT_PATH)]
    path: String,

    /// Name shown next to your messages; a guest name is picked if omitted
    #[arg(short = 'u', long, env = "CHAT_USERNAME")]
    username: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let username = args.username.unwrap_or_else(guest_name);
    let url = format!("ws://{}{}", args.server, args.path);

    info!("Starting client...");
    let mut client = Client::connect(&url, username).await?;
    client.run().await?;

    Ok(())
}
