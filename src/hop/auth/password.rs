//! Password-based SSH authentication.

use async_trait::async_trait;
use russh::client;

use crate::hop::error::TransportError;
use crate::hop::session::SshClientHandler;
use crate::hop::types::Secret;

use super::traits::AuthStrategy;

/// Password authentication strategy.
pub struct PasswordAuth {
    password: Secret,
}

impl PasswordAuth {
    pub fn new(password: Secret) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, TransportError> {
        let result = handle
            .authenticate_password(username, self.password.expose())
            .await
            .map_err(|e| TransportError::connect(format!("Password exchange failed: {}", e)))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
