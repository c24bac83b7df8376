//! Transport and connector seams.
//!
//! A [`Transport`] is one authenticated session to one hop. A [`Connector`] establishes a
//! Transport for a [`HopSpec`] from a [`SocketSource`]: either a fresh OS socket or a channel
//! opened inside the previous hop's session.
//!
//! The channel is *moved* into the child Transport. Whoever consumes it owns it, so closing the
//! child (or dropping a failed handshake) releases the channel and it can never be reused.

use async_trait::async_trait;

use crate::hop::error::TransportError;
use crate::hop::types::{HopSpec, RemoteOutput};

/// Where the byte stream for a new hop comes from.
pub enum SocketSource<C> {
    /// Open a new OS-level TCP connection to the hop's host and port.
    Direct,
    /// Ride inside a channel already opened on the previous hop.
    Tunneled(C),
}

impl<C> std::fmt::Debug for SocketSource<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketSource::Direct => write!(f, "Direct"),
            SocketSource::Tunneled(_) => write!(f, "Tunneled"),
        }
    }
}

/// An established, authenticated session bound to one hop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Virtual byte stream multiplexed inside this session.
    type Channel: Send + 'static;

    /// Open a `direct-tcpip` style channel addressed at `host:port`.
    ///
    /// The originator endpoint is a label for the tunneling protocol, not a routable address.
    async fn open_channel_to(&self, host: &str, port: u16) -> Result<Self::Channel, TransportError>;

    /// Run `command` and wait for it to finish.
    ///
    /// A nonzero exit status is returned as a normal [`RemoteOutput`]. Errors are reserved for
    /// transport-level failures.
    async fn run_command(&self, command: &str) -> Result<RemoteOutput, TransportError>;

    /// Release the session and everything it owns. Idempotent and infallible.
    async fn close(&mut self);
}

/// Factory establishing a [`Transport`] for one hop.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Perform the handshake and authentication for `hop` over `source`.
    async fn open(
        &self,
        hop: &HopSpec,
        source: SocketSource<<Self::Transport as Transport>::Channel>,
    ) -> Result<Self::Transport, TransportError>;
}
