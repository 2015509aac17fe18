//! Card reader TCP service
//!
//! Run with a card reader:
//!   craas --serial /dev/ttyUSB0
//!
//! Run with the interactive console (type a card id and press enter):
//!   craas --testing
//!
//! Serve the framed card event stream instead of raw bytes:
//!   craas --testing --transport stream --port :9000
//!
//! Exit status:
//!   0  shut down by Ctrl+C
//!   1  invalid options or the listener could not bind
//!   2  the event source failed (device disconnected, console closed)

use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use craas::config::{ServiceOptions, DEFAULT_LISTEN};
use craas::source::console::DEFAULT_PROMPT;
use craas::source::{ConsoleSource, EventSource, SerialSource};
use craas::{Broadcaster, Server, ServiceConfig, SourceConfig, Transport};

/// Invalid options or listener bind failure
const EXIT_STARTUP_FAILURE: u8 = 1;
/// The event source failed permanently
const EXIT_SOURCE_FAILURE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportArg {
    /// Frame bytes written verbatim
    Raw,
    /// Framed card event messages
    Stream,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Raw => Transport::Raw,
            TransportArg::Stream => Transport::Stream,
        }
    }
}

/// Card reader event service
#[derive(Debug, Parser)]
#[command(name = "craas", version)]
struct Cli {
    /// Input "card reads" into a prompt; useful for testing
    #[arg(long)]
    testing: bool,

    /// Serial port the card reader is attached to
    #[arg(long, default_value = "")]
    serial: String,

    /// Network host and port to listen on
    #[arg(long, default_value = DEFAULT_LISTEN)]
    port: String,

    /// Wire format sent to subscribers
    #[arg(long, value_enum, default_value_t = TransportArg::Raw)]
    transport: TransportArg,

    /// Prompt shown in testing mode
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,
}

impl Cli {
    fn into_options(self) -> ServiceOptions {
        ServiceOptions {
            testing: self.testing,
            serial: self.serial,
            port: self.port,
            transport: self.transport.into(),
            prompt: self.prompt,
        }
    }
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    let code = runtime.block_on(run());

    // A pending console read holds a blocking thread that cannot be cancelled
    runtime.shutdown_background();
    code
}

async fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
        // --help / --version
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let config = match ServiceConfig::from_options(cli.into_options()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    init_logging();

    let broadcaster = Broadcaster::with_config(config.broadcast.clone());
    let server = match Server::bind(config.server.clone(), broadcaster.clone()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start listener");
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    match config.source {
        SourceConfig::Serial { path } => match SerialSource::open(&path).await {
            Ok(source) => serve(server, broadcaster, source).await,
            Err(e) => {
                tracing::error!(port = %path.display(), error = %e, "Failed to open serial port");
                eprintln!("error: {}: {}", path.display(), e);
                ExitCode::from(EXIT_SOURCE_FAILURE)
            }
        },
        SourceConfig::Console { prompt } => {
            serve(server, broadcaster, ConsoleSource::stdio(prompt)).await
        }
    }
}

/// Run the publish loop and the accept loop until one of them stops
async fn serve<S: EventSource>(server: Server, broadcaster: Broadcaster, source: S) -> ExitCode {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = broadcaster.run_until(source, shutdown) => match result {
            Ok(()) => {
                tracing::info!("The service is shutting down");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "The service is shutting down");
                eprintln!("error: {}", e);
                ExitCode::from(EXIT_SOURCE_FAILURE)
            }
        },
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Listener stopped");
                eprintln!("error: {}", e);
            }
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("craas=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
