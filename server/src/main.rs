use clap::Parser;
use log::info;
use server::config::{RelayConfig, DEFAULT_PORT, VERIFY_URL};
use server::network::Server;
use server::verifier::HttpVerifier;
use std::sync::Arc;

/// Main-method of the application.
/// Parses command-line arguments, then runs the relay until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Base URL of the token verification endpoint
        #[clap(long, default_value = VERIFY_URL)]
        verify_url: String,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let address = format!("{}:{}", args.host, args.port);
    let verifier = Arc::new(HttpVerifier::new(args.verify_url));
    let server = Server::new(&address, RelayConfig::default(), verifier).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
