//! Data types shared across the hop chain.
//!
//! Everything that may reach a log line or a serialized report keeps credentials out of it:
//! [`Secret`] prints as `***` and [`HopInfo`] carries no credential at all.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hop::error::HopError;

/// Default SSH port used when a hop does not specify one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A credential that never prints its value.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential. Only authentication code should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// One host in the chain together with the credentials to log into it.
///
/// The position of a hop is defined only by its index in the ordered chain.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct HopSpec {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// Password for the hop. May be empty when `key_path` is used instead.
    #[serde(default, alias = "password")]
    pub credential: Secret,
    /// Optional private key file tried after the password.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl HopSpec {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            credential: Secret::new(credential),
            key_path: None,
        }
    }

    /// Use a private key file in addition to (or instead of) the password.
    pub fn with_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    /// Check the fields that cannot be validated by the type system.
    pub fn validate(&self) -> Result<(), HopError> {
        if self.host.trim().is_empty() {
            return Err(HopError::invalid_chain("hop host must not be empty"));
        }
        if self.port == 0 {
            return Err(HopError::invalid_chain(format!(
                "hop {} has port 0; ports must be in 1-65535",
                self.host
            )));
        }
        if self.username.is_empty() {
            return Err(HopError::invalid_chain(format!(
                "hop {} has no username",
                self.host
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for HopSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HopSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("credential", &self.credential)
            .field("key_path", &self.key_path)
            .finish()
    }
}

impl fmt::Display for HopSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Output of one remote command as returned by a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the server closed the channel without reporting a status.
    pub exit_status: Option<u32>,
}

/// The outcome of one command in a batch.
///
/// A nonzero `exit_status` is a normal result, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<u32>,
}

impl CommandResult {
    /// Build a result, trimming surrounding whitespace from both streams.
    pub fn new(
        command: impl Into<String>,
        stdout: &str,
        stderr: &str,
        exit_status: Option<u32>,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            exit_status,
        }
    }

    pub fn from_output(command: impl Into<String>, output: RemoteOutput) -> Self {
        Self::new(command, &output.stdout, &output.stderr, output.exit_status)
    }
}

/// Lifecycle of a [`HopChain`](super::chain::HopChain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Nothing has been attempted yet.
    Empty,
    /// The hop at this index is being established.
    Connecting(usize),
    /// All hops are established; holds the chain length.
    Connected(usize),
    /// `close()` has run.
    Closed,
    /// A hop failed and everything before it was rolled back.
    Aborted,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainState::Empty => write!(f, "empty"),
            ChainState::Connecting(index) => write!(f, "connecting(hop {})", index),
            ChainState::Connected(len) => write!(f, "connected({} hops)", len),
            ChainState::Closed => write!(f, "closed"),
            ChainState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Display view of an established hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HopInfo {
    pub index: usize,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// RFC 3339 timestamp of when the hop was authenticated
    pub connected_at: String,
}
