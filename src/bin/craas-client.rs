//! Card event stream client
//!
//! Connects to a service started with `--transport stream` and prints every
//! card read until the service ends the stream.
//!
//!   craas-client --addr 127.0.0.1:8080

use std::process::ExitCode;

use clap::Parser;

use craas::client::CardClient;

/// Print card reads from a craas service
#[derive(Debug, Parser)]
#[command(name = "craas-client", version)]
struct Cli {
    /// Service address
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("craas=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut client = match CardClient::connect(cli.addr.as_str()).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(addr = %cli.addr, error = %e, "Failed to connect");
            return ExitCode::FAILURE;
        }
    };

    loop {
        match client.next_card().await {
            Ok(Some(card)) => println!("Received {}", card.id),
            Ok(None) => {
                tracing::info!("Stream ended by the service");
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                tracing::error!(error = %e, "Stream failed");
                return ExitCode::FAILURE;
            }
        }
    }
}
