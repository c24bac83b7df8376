//! Authentication chain for trying multiple strategies.

use std::path::PathBuf;

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::hop::error::{ErrorKind, TransportError};
use crate::hop::session::SshClientHandler;
use crate::hop::types::{HopSpec, Secret};

use super::traits::AuthStrategy;
use super::{KeyAuth, PasswordAuth};

/// Authentication chain that tries multiple strategies in order.
///
/// The first successful authentication stops the chain. A transport failure during any
/// strategy stops the chain immediately since the session is gone.
///
/// `authenticate` returns `Ok(true)` or an error; when every strategy is rejected the last
/// `Authentication` error is returned, never `Ok(false)`.
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Build the chain for a hop: password first, then the key file.
    pub fn for_hop(hop: &HopSpec) -> Self {
        let mut chain = Self::new();
        if !hop.credential.is_empty() {
            chain = chain.with_password(hop.credential.clone());
        }
        if let Some(key_path) = &hop.key_path {
            chain = chain.with_key(key_path.clone());
        }
        chain
    }

    pub fn with_password(mut self, password: Secret) -> Self {
        self.strategies.push(Box::new(PasswordAuth::new(password)));
        self
    }

    pub fn with_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.strategies.push(Box::new(KeyAuth::new(key_path)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for AuthChain {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, TransportError> {
        if self.strategies.is_empty() {
            return Err(TransportError::authentication(
                "No credential configured (set a password or key_path)",
            ));
        }

        let mut last_error = None;

        for strategy in &self.strategies {
            debug!("Trying authentication strategy: {}", strategy.name());

            match strategy.authenticate(handle, username).await {
                Ok(true) => {
                    debug!(
                        "Authentication succeeded with strategy: {}",
                        strategy.name()
                    );
                    return Ok(true);
                }
                Ok(false) => {
                    debug!("Authentication rejected with strategy: {}", strategy.name());
                    last_error = Some(TransportError::authentication(format!(
                        "{} authentication rejected for user {}",
                        strategy.name(),
                        username
                    )));
                }
                Err(e) if e.kind == ErrorKind::Authentication => {
                    debug!(
                        "Authentication error with strategy {}: {}",
                        strategy.name(),
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::authentication("All authentication methods failed")
        }))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
