#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use hopchain::hop::config::resolve_config_path;
use hopchain::hop::{
    ChainFile, CommandResult, CommandRunner, FileResultSink, HopChain, ResultSink, SshConnector,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let config_path = resolve_config_path(std::env::args().nth(1));
    let raw = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|e| format!("Failed to read chain file {}: {}", config_path.display(), e))?;
    let file = ChainFile::from_json(&raw)
        .map_err(|e| format!("Invalid chain file {}: {}", config_path.display(), e))?;

    let options = file.chain_options();
    info!(
        "Connecting through {} hop(s) with timeout {}s, hop_delay={}ms, max_retries={}, compress={}",
        file.hops.len(),
        options.connect_timeout.as_secs(),
        options.hop_delay.as_millis(),
        options.max_retries,
        file.compression()
    );

    let mut chain = HopChain::new(SshConnector::new(file.compression()), options);

    let cancel_token = chain.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the chain");
            cancel_token.cancel();
        }
    });

    let outcome = run(&mut chain, &file).await;

    // Always tear the chain down, whatever happened above
    chain.close().await;
    info!("All connections closed");

    if let Err(e) = &outcome {
        error!("{}", e);
    }
    outcome
}

async fn run(
    chain: &mut HopChain<SshConnector>,
    file: &ChainFile,
) -> Result<(), Box<dyn std::error::Error>> {
    chain.connect(file.hops.clone()).await?;

    let mut sink = FileResultSink::new(file.output_path());
    let runner = CommandRunner::new(chain, file.command_timeout());

    match runner.run(file.commands.iter().cloned()).await {
        Ok(results) => {
            report(&results);
            sink.write(&results)?;
            info!("Results saved to {}", sink.path().display());
            Ok(())
        }
        Err(batch) => {
            report(&batch.completed);
            if !batch.completed.is_empty() {
                sink.write(&batch.completed)?;
                warn!(
                    "Partial results ({} command(s)) saved to {}",
                    batch.completed.len(),
                    sink.path().display()
                );
            }
            Err(batch.into())
        }
    }
}

fn report(results: &[CommandResult]) {
    for result in results {
        info!("Command: {}", result.command);
        info!("Output:\n{}", result.stdout);
        if !result.stderr.is_empty() {
            warn!("Errors:\n{}", result.stderr);
        }
    }
}
