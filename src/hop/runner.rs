//! Sequential command execution on the terminal hop.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::hop::chain::HopChain;
use crate::hop::error::{BatchError, HopError, TransportError};
use crate::hop::transport::{Connector, Transport};
use crate::hop::types::CommandResult;

/// Runs command batches against the terminal transport of a connected chain.
pub struct CommandRunner<'a, C: Connector> {
    chain: &'a HopChain<C>,
    timeout: Duration,
}

impl<'a, C: Connector> CommandRunner<'a, C> {
    /// `timeout` bounds each command separately.
    pub fn new(chain: &'a HopChain<C>, timeout: Duration) -> Self {
        Self { chain, timeout }
    }

    /// Run `commands` one after another, in order.
    ///
    /// The first transport-level failure, timeout or cancellation stops the batch. Results of
    /// the commands that already finished are returned inside the [`BatchError`]; the remaining
    /// commands are never sent.
    pub async fn run<I, S>(&self, commands: I) -> Result<Vec<CommandResult>, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (terminal, host) = match (self.chain.terminal(), self.chain.terminal_host()) {
            (Ok(terminal), Ok(host)) => (terminal, host),
            (Err(error), _) | (_, Err(error)) => {
                return Err(BatchError {
                    completed: Vec::new(),
                    error,
                });
            }
        };

        let cancel_token = self.chain.cancellation_token();
        let mut completed = Vec::new();

        for command in commands {
            let command: String = command.into();
            debug!("Running on {}: {}", host, command);

            let outcome = tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    Err(TransportError::cancelled(format!("command cancelled: {}", command)))
                }

                result = tokio::time::timeout(self.timeout, terminal.run_command(&command)) => {
                    match result {
                        Ok(output) => output,
                        Err(_) => Err(TransportError::execution(format!(
                            "command timed out after {:?}: {}",
                            self.timeout, command
                        ))),
                    }
                }
            };

            match outcome {
                Ok(output) => {
                    let result = CommandResult::from_output(command, output);
                    if let Some(status) = result.exit_status.filter(|status| *status != 0) {
                        info!("Command exited with status {}: {}", status, result.command);
                    }
                    completed.push(result);
                }
                Err(cause) => {
                    warn!(
                        "Aborting batch on {} after {} command(s): {}",
                        host,
                        completed.len(),
                        cause
                    );
                    return Err(BatchError {
                        completed,
                        error: HopError::execution(host, cause),
                    });
                }
            }
        }

        Ok(completed)
    }
}
