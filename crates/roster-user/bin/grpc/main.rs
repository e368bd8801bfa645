mod cli;

use crate::cli::CLI;
use clap::Parser;
use roster_user::server::serve;
use roster_user::telemetry::init_tracing;
use tracing::{info, warn};

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(err) => {
            warn!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CLI::parse();
    init_tracing(&cli.log_level, cli.log_format.into())?;

    serve(cli.service_config(), shutdown_signal()).await?;

    Ok(())
}
