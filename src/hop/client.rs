//! russh implementation of [`Connector`] and [`Transport`].
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: keepalive and compression settings shared by every hop.
//!
//! 2. **Socket**: the first hop opens a TCP connection with [`client::connect`]. Every later
//!    hop receives a `direct-tcpip` channel from the previous hop, converts it with
//!    [`russh::Channel::into_stream`] and runs the SSH handshake over it with
//!    [`client::connect_stream`]:
//!
//!    ```text
//!    operator --tcp--> [hop 0] --direct-tcpip--> [hop 1] --direct-tcpip--> ... --> [hop N-1]
//!    ```
//!
//! 3. **Authentication**: the hop's [`AuthChain`] (password, then key file).
//!
//! 4. **Command Execution**: a session channel per command, collecting stdout, stderr and the
//!    exit status.
//!
//! The stream returned by `into_stream` is owned by the child session's background task, so
//! disconnecting the child closes the channel in the parent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::{ChannelMsg, Disconnect, client};
use tracing::{debug, info, warn};

use crate::hop::auth::{AuthChain, AuthStrategy};
use crate::hop::error::TransportError;
use crate::hop::session::SshClientHandler;
use crate::hop::transport::{Connector, SocketSource, Transport};
use crate::hop::types::{HopSpec, RemoteOutput};

/// Originator address announced when opening `direct-tcpip` channels.
///
/// The far side does not route anything back to it.
const ORIGINATOR_ADDRESS: &str = "127.0.0.1";
const ORIGINATOR_PORT: u32 = 0;

/// SSH extended data stream carrying stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Build russh client configuration.
///
/// - No inactivity timeout: a quiet hop must stay open while a later hop runs a long command.
///   Dead peers are detected by keepalives instead.
/// - Keepalive interval of 30 seconds with max 3 keepalives
/// - Compression preference based on `compress` flag (ZLIB if enabled, NONE if disabled)
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Establishes SSH sessions for hops.
pub struct SshConnector {
    config: Arc<client::Config>,
}

impl SshConnector {
    pub fn new(compress: bool) -> Self {
        Self {
            config: build_client_config(compress),
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Transport = SshTransport;

    async fn open(
        &self,
        hop: &HopSpec,
        source: SocketSource<russh::Channel<client::Msg>>,
    ) -> Result<SshTransport, TransportError> {
        let handler = SshClientHandler::new(hop.host.clone());

        let mut handle = match source {
            SocketSource::Direct => {
                debug!("Opening TCP connection to {}:{}", hop.host, hop.port);
                client::connect(self.config.clone(), (hop.host.as_str(), hop.port), handler)
                    .await
                    .map_err(|e| {
                        TransportError::connect(format!(
                            "Failed to connect to {}:{}: {}",
                            hop.host, hop.port, e
                        ))
                    })?
            }
            SocketSource::Tunneled(channel) => {
                debug!("Starting SSH handshake with {} over tunnel", hop);
                client::connect_stream(self.config.clone(), channel.into_stream(), handler)
                    .await
                    .map_err(|e| {
                        TransportError::connect(format!(
                            "SSH handshake over tunnel to {}:{} failed: {}",
                            hop.host, hop.port, e
                        ))
                    })?
            }
        };

        // The chain reports every rejection as an error, never as Ok(false)
        let auth_chain = AuthChain::for_hop(hop);
        if let Err(e) = auth_chain.authenticate(&mut handle, &hop.username).await {
            disconnect(&handle, &hop.host).await;
            return Err(e);
        }

        info!("Authenticated to {}", hop);
        Ok(SshTransport {
            host: hop.host.clone(),
            handle: Some(handle),
        })
    }
}

async fn disconnect(handle: &client::Handle<SshClientHandler>, host: &str) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "Chain closed", "en")
        .await
    {
        debug!("Disconnect from {} reported: {}", host, e);
    }
}

/// An authenticated SSH session to one hop.
pub struct SshTransport {
    host: String,
    handle: Option<client::Handle<SshClientHandler>>,
}

impl SshTransport {
    fn handle(&self) -> Option<&client::Handle<SshClientHandler>> {
        self.handle.as_ref().filter(|handle| !handle.is_closed())
    }
}

#[async_trait]
impl Transport for SshTransport {
    type Channel = russh::Channel<client::Msg>;

    async fn open_channel_to(&self, host: &str, port: u16) -> Result<Self::Channel, TransportError> {
        let handle = self.handle().ok_or_else(|| {
            TransportError::channel(format!("Session to {} is not open", self.host))
        })?;

        handle
            .channel_open_direct_tcpip(host, port as u32, ORIGINATOR_ADDRESS, ORIGINATOR_PORT)
            .await
            .map_err(|e| {
                TransportError::channel(format!(
                    "Failed to open direct-tcpip channel via {} to {}:{}: {}",
                    self.host, host, port, e
                ))
            })
    }

    async fn run_command(&self, command: &str) -> Result<RemoteOutput, TransportError> {
        let handle = self.handle().ok_or_else(|| {
            TransportError::execution(format!("Session to {} is not open", self.host))
        })?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::execution(format!("Failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::execution(format!("Failed to execute command: {}", e)))?;

        // Pre-allocate buffers to reduce reallocations during output collection
        let mut stdout = Vec::with_capacity(4096);
        let mut stderr = Vec::with_capacity(1024);
        let mut exit_status: Option<u32> = None;
        let mut finished = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == SSH_EXTENDED_DATA_STDERR {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                    exit_status = Some(status);
                }
                Some(ChannelMsg::Eof) => {
                    finished = true;
                    // Continue to wait for exit status if not received yet
                    if exit_status.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    finished = true;
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        if !finished && exit_status.is_none() {
            return Err(TransportError::execution(format!(
                "Session to {} ended before the command completed",
                self.host
            )));
        }

        let _ = channel.close().await;

        Ok(RemoteOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.is_closed() {
                warn!("Session to {} was already gone", self.host);
            } else {
                disconnect(&handle, &self.host).await;
            }
            debug!("Released session to {}", self.host);
        }
    }
}
