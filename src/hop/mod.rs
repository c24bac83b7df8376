//! Hop chaining and tunnel multiplexing.
//!
//! This module is organized into the following submodules:
//!
//! - `types`: Hop specifications, command results and chain state
//! - `config`: Configuration resolution with environment variable support
//! - `error`: Error kinds, transport errors and chain-level errors
//! - `transport`: The `Transport` and `Connector` seams
//! - `session`: russh client handler
//! - `auth`: Authentication strategies
//! - `client`: russh implementation of the transport seams
//! - `chain`: Ordered hop establishment, rollback and teardown
//! - `runner`: Sequential command execution on the terminal hop
//! - `sink`: Result persistence

pub mod auth;
pub mod chain;
pub mod client;
pub mod config;
pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod runner;
pub mod session;
pub mod sink;
pub mod transport;
pub mod types;

pub use chain::HopChain;
pub use client::{SshConnector, SshTransport};
pub use config::{ChainFile, ChainOptions};
pub use error::{BatchError, ErrorKind, HopError, TransportError};
pub use runner::CommandRunner;
pub use sink::{FileResultSink, ResultSink};
pub use transport::{Connector, SocketSource, Transport};
pub use types::{ChainState, CommandResult, HopInfo, HopSpec, Secret};
