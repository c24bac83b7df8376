//! Error types for hop chaining and command execution.
//!
//! Failures are reported on two levels:
//!
//! 1. [`TransportError`] is what a single [`Transport`](super::transport::Transport) or
//!    [`Connector`](super::transport::Connector) reports. It knows *what* went wrong
//!    ([`ErrorKind`]) but not *where* in the chain.
//!
//! 2. [`HopError`] is what callers of the chain see. It lifts a `TransportError` and adds the
//!    failing hop's position and host so an operator can tell which link broke the chain.
//!
//! # Retry Classification
//!
//! - **Retryable**: [`ErrorKind::Connect`] (refused, unreachable, timeout, handshake failure)
//! - **Non-retryable**: everything else. Authentication failures are never retried to avoid
//!   account lockouts, and a channel failure means the parent session is already gone.

use std::fmt;

use crate::hop::types::CommandResult;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Host unreachable, refused, timed out, or the handshake failed.
    Connect,
    /// Credential rejected, key unusable, or host key policy refused the server.
    Authentication,
    /// A tunneled channel could not be opened inside the parent session.
    Channel,
    /// The session died mid-command or the output stream could not be read.
    Execution,
    /// The operation needs a connected chain.
    NotConnected,
    /// The operator cancelled the operation.
    Cancelled,
    /// The chain definition or its lifecycle was misused (empty chain, port 0, reuse).
    InvalidChain,
}

impl ErrorKind {
    /// Whether a failure of this kind may succeed on a fresh attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Connect)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Connect => write!(f, "connection failed"),
            ErrorKind::Authentication => write!(f, "authentication failed"),
            ErrorKind::Channel => write!(f, "channel open failed"),
            ErrorKind::Execution => write!(f, "command execution failed"),
            ErrorKind::NotConnected => write!(f, "chain is not connected"),
            ErrorKind::Cancelled => write!(f, "operation cancelled"),
            ErrorKind::InvalidChain => write!(f, "invalid chain"),
        }
    }
}

/// A failure reported by a single transport, without chain context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connect, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn channel(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Channel, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Execution, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// A failure surfaced by a [`HopChain`](super::chain::HopChain) or
/// [`CommandRunner`](super::runner::CommandRunner).
///
/// `hop_index` is set for connect-time failures and `None` for failures during command
/// execution, where `host` names the terminal host instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopError {
    pub hop_index: Option<usize>,
    pub host: Option<String>,
    pub kind: ErrorKind,
    pub cause: Option<TransportError>,
}

impl HopError {
    /// A failure while establishing the hop at `index`.
    pub fn at_hop(index: usize, host: impl Into<String>, cause: TransportError) -> Self {
        Self {
            hop_index: Some(index),
            host: Some(host.into()),
            kind: cause.kind,
            cause: Some(cause),
        }
    }

    /// A failure while running a command on the terminal host.
    pub fn execution(host: impl Into<String>, cause: TransportError) -> Self {
        Self {
            hop_index: None,
            host: Some(host.into()),
            kind: cause.kind,
            cause: Some(cause),
        }
    }

    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::without_host(TransportError::new(ErrorKind::NotConnected, message))
    }

    pub fn invalid_chain(message: impl Into<String>) -> Self {
        Self::without_host(TransportError::new(ErrorKind::InvalidChain, message))
    }

    /// Attach the position of the hop this error refers to.
    ///
    /// A blank host is left out of the error.
    pub fn for_hop(mut self, index: usize, host: &str) -> Self {
        self.hop_index = Some(index);
        if !host.trim().is_empty() {
            self.host = Some(host.to_string());
        }
        self
    }

    fn without_host(cause: TransportError) -> Self {
        Self {
            hop_index: None,
            host: None,
            kind: cause.kind,
            cause: Some(cause),
        }
    }
}

impl fmt::Display for HopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hop_index, self.host.as_deref()) {
            (Some(index), Some(host)) => write!(f, "hop {} ({}): ", index, host)?,
            (Some(index), None) => write!(f, "hop {}: ", index)?,
            (None, Some(host)) => write!(f, "{}: ", host)?,
            _ => {}
        }
        match &self.cause {
            Some(cause) => write!(f, "{}", cause),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for HopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// A command batch that stopped early.
///
/// `completed` holds the results of every command that finished before `error`.
#[derive(Debug, Clone)]
pub struct BatchError {
    pub completed: Vec<CommandResult>,
    pub error: HopError,
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (after {} completed command(s))",
            self.error,
            self.completed.len()
        )
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod classification {
        use super::*;

        #[test]
        fn test_only_connect_is_retryable() {
            assert!(ErrorKind::Connect.is_retryable());
            assert!(!ErrorKind::Authentication.is_retryable());
            assert!(!ErrorKind::Channel.is_retryable());
            assert!(!ErrorKind::Execution.is_retryable());
            assert!(!ErrorKind::NotConnected.is_retryable());
            assert!(!ErrorKind::Cancelled.is_retryable());
            assert!(!ErrorKind::InvalidChain.is_retryable());
        }

        #[test]
        fn test_transport_error_constructors_set_kind() {
            assert_eq!(TransportError::connect("x").kind, ErrorKind::Connect);
            assert_eq!(
                TransportError::authentication("x").kind,
                ErrorKind::Authentication
            );
            assert_eq!(TransportError::channel("x").kind, ErrorKind::Channel);
            assert_eq!(TransportError::execution("x").kind, ErrorKind::Execution);
            assert_eq!(TransportError::cancelled("x").kind, ErrorKind::Cancelled);
        }

        #[test]
        fn test_hop_error_inherits_cause_kind() {
            let err = HopError::at_hop(2, "10.0.0.3", TransportError::authentication("denied"));
            assert_eq!(err.kind, ErrorKind::Authentication);
            assert_eq!(err.hop_index, Some(2));
        }
    }

    mod display {
        use super::*;

        #[test]
        fn test_connect_failure_names_hop_and_host() {
            let err = HopError::at_hop(1, "bastion-b", TransportError::authentication("denied"));
            assert_eq!(
                err.to_string(),
                "hop 1 (bastion-b): authentication failed: denied"
            );
        }

        #[test]
        fn test_invalid_hop_is_located_in_the_chain() {
            let err = HopError::invalid_chain("bad port").for_hop(3, "db");
            assert_eq!(err.kind, ErrorKind::InvalidChain);
            assert_eq!(err.hop_index, Some(3));
            assert_eq!(err.host.as_deref(), Some("db"));
            assert!(err.to_string().starts_with("hop 3 (db): "));
        }

        #[test]
        fn test_blank_host_is_left_out() {
            let err = HopError::invalid_chain("empty host").for_hop(0, "  ");
            assert_eq!(err.host, None);
            assert!(err.to_string().starts_with("hop 0: "));
        }

        #[test]
        fn test_execution_failure_names_host_only() {
            let err = HopError::execution("target", TransportError::execution("session lost"));
            assert_eq!(
                err.to_string(),
                "target: command execution failed: session lost"
            );
        }

        #[test]
        fn test_not_connected_has_no_host() {
            let err = HopError::not_connected("no active hops");
            assert_eq!(err.to_string(), "chain is not connected: no active hops");
            assert!(err.host.is_none());
        }

        #[test]
        fn test_batch_error_reports_completed_count() {
            let err = BatchError {
                completed: vec![CommandResult::new("echo 1", "1", "", Some(0))],
                error: HopError::execution("target", TransportError::execution("eof")),
            };
            assert!(err.to_string().ends_with("(after 1 completed command(s))"));
        }
    }

    mod sources {
        use super::*;
        use std::error::Error;

        #[test]
        fn test_hop_error_source_is_transport_error() {
            let err = HopError::at_hop(0, "a", TransportError::connect("refused"));
            let source = err.source().map(|s| s.to_string());
            assert_eq!(source.as_deref(), Some("connection failed: refused"));
        }

        #[test]
        fn test_batch_error_source_is_hop_error() {
            let err = BatchError {
                completed: Vec::new(),
                error: HopError::not_connected("empty"),
            };
            assert!(err.source().is_some());
        }
    }
}
