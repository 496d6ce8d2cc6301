use clap::Parser;
use client::network::ChatClient;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay address to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Player token passed to the identity service
    #[arg(short = 't', long)]
    token: String,

    /// Origin header to present
    #[arg(short = 'o', long, default_value = "null")]
    origin: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    info!("Type a message and press Enter to send, Ctrl+D to quit");

    let client = ChatClient::connect(&args.server, &args.token, &args.origin).await?;
    client.run().await?;

    Ok(())
}
