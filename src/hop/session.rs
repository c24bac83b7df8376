//! russh client handler used by every hop.
//!
//! `SshClientHandler` accepts all host keys (similar to `StrictHostKeyChecking=no` in
//! OpenSSH). Hops behind a bastion usually have addresses such as `127.0.0.1:2217` that only
//! make sense from the previous hop, so a local known_hosts file cannot describe them.

use russh::{client, keys};
use tracing::debug;

/// Client handler for russh that accepts all host keys.
pub struct SshClientHandler {
    host: String,
}

impl SshClientHandler {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Accepting {:?} host key for {}",
            server_public_key.algorithm(),
            self.host
        );
        Ok(true)
    }
}
