//! Authentication strategy trait definition.

use async_trait::async_trait;
use russh::client;

use crate::hop::error::TransportError;
use crate::hop::session::SshClientHandler;

/// Trait for SSH authentication strategies.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - The server rejected the credential
    /// * `Err(TransportError)` - The credential could not be used (`Authentication`) or the
    ///   session failed during the exchange (`Connect`)
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, TransportError>;

    /// Get the name of this authentication strategy.
    ///
    /// Used for logging and debugging purposes.
    fn name(&self) -> &'static str;
}
