use std::process::ExitCode;

use tracing::{error, info};

use shoal::chat::console;
use shoal::chat::registry::Shutdown;
use shoal::config::NetConfig;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match NetConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("interrupting client"),
                Err(e) => error!("failed to listen for the interrupt signal: {e}"),
            }
            shutdown.trigger();
        });
    }

    if let Err(e) = console::run(config, shutdown).await {
        error!("client error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
