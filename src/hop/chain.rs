//! Ordered, dependent hop establishment with rollback and LIFO teardown.
//!
//! ## State Machine
//!
//! ```text
//! Empty -> Connecting(0) -> ... -> Connecting(N-1) -> Connected(N) -> Closed
//!                 \______________________/
//!                            | hop failed
//!                            v
//!                         Aborted -> Closed
//! ```
//!
//! The chain is the only owner of its transports. The active transports always form a
//! contiguous prefix of the requested hops, and they are closed in exactly the reverse order
//! they were established.
//!
//! ## Retry Strategy
//!
//! Each hop attempt (channel open, handshake, authentication) is bounded by
//! `connect_timeout`. Transient connect failures are retried with exponential backoff with
//! jitter via `backon`, always on a fresh channel. Authentication failures, channel failures
//! and cancellation are never retried.

use std::sync::atomic::{AtomicU32, Ordering};

use backon::{ExponentialBuilder, Retryable};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::hop::config::{ChainOptions, MAX_RETRY_DELAY};
use crate::hop::error::{HopError, TransportError};
use crate::hop::transport::{Connector, SocketSource, Transport};
use crate::hop::types::{ChainState, HopInfo, HopSpec};

/// An established hop owned by the chain.
struct ActiveHop<T> {
    spec: HopSpec,
    transport: T,
    connected_at: String,
}

/// A chain of nested sessions ending at the terminal host.
pub struct HopChain<C: Connector> {
    id: Uuid,
    connector: C,
    options: ChainOptions,
    active: Vec<ActiveHop<C::Transport>>,
    state: ChainState,
    cancel_token: CancellationToken,
}

impl<C: Connector> HopChain<C> {
    pub fn new(connector: C, options: ChainOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            connector,
            options,
            active: Vec::new(),
            state: ChainState::Empty,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Identifier attached to this chain's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Number of active transports.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Token that cancels an in-flight `connect` or command batch.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// The active hops, first to last.
    pub fn hops(&self) -> Vec<HopInfo> {
        self.active
            .iter()
            .enumerate()
            .map(|(index, hop)| HopInfo {
                index,
                host: hop.spec.host.clone(),
                port: hop.spec.port,
                username: hop.spec.username.clone(),
                connected_at: hop.connected_at.clone(),
            })
            .collect()
    }

    /// Human-readable path through the active hops, e.g. `a@h1:22 -> b@h2:22`.
    pub fn path_description(&self) -> String {
        self.active
            .iter()
            .map(|hop| hop.spec.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// The last established transport, against which commands run.
    pub fn terminal(&self) -> Result<&C::Transport, HopError> {
        self.terminal_hop().map(|hop| &hop.transport)
    }

    /// Host of the terminal transport.
    pub fn terminal_host(&self) -> Result<&str, HopError> {
        self.terminal_hop().map(|hop| hop.spec.host.as_str())
    }

    fn terminal_hop(&self) -> Result<&ActiveHop<C::Transport>, HopError> {
        match self.state {
            ChainState::Connected(_) => self
                .active
                .last()
                .ok_or_else(|| HopError::not_connected("chain has no active hops")),
            state => Err(HopError::not_connected(format!("chain is {}", state))),
        }
    }

    /// Establish every hop in order.
    ///
    /// Hop 0 is reached over a direct socket. Every later hop is reached through a channel
    /// opened on the hop before it. If any hop fails, every hop established so far is closed
    /// in reverse order and the error names the failing hop.
    pub async fn connect(&mut self, hops: Vec<HopSpec>) -> Result<(), HopError> {
        if self.state != ChainState::Empty {
            return Err(HopError::invalid_chain(format!(
                "connect called on a chain that is {}; chains are single-use",
                self.state
            )));
        }
        if hops.is_empty() {
            return Err(HopError::invalid_chain("a chain needs at least one hop"));
        }
        for (index, hop) in hops.iter().enumerate() {
            hop.validate().map_err(|e| e.for_hop(index, &hop.host))?;
        }

        let span = info_span!("hop_chain", chain_id = %self.id, hops = hops.len());
        self.connect_all(hops).instrument(span).await
    }

    async fn connect_all(&mut self, hops: Vec<HopSpec>) -> Result<(), HopError> {
        let total = hops.len();

        for (index, hop) in hops.into_iter().enumerate() {
            self.state = ChainState::Connecting(index);

            if index > 0 && !self.options.hop_delay.is_zero() {
                debug!("Pausing {:?} before hop {}", self.options.hop_delay, index);
                let cancelled = tokio::select! {
                    biased;

                    _ = self.cancel_token.cancelled() => true,
                    _ = tokio::time::sleep(self.options.hop_delay) => false,
                };
                if cancelled {
                    warn!("Cancelled while pausing before hop {} ({})", index, hop);
                    self.state = ChainState::Aborted;
                    self.teardown().await;
                    let cause = TransportError::cancelled(format!("connect to {} cancelled", hop));
                    return Err(HopError::at_hop(index, hop.host, cause));
                }
            }

            match self.establish_hop(index, &hop).await {
                Ok(transport) => {
                    info!("Connected hop {}/{}: {}", index + 1, total, hop);
                    self.active.push(ActiveHop {
                        spec: hop,
                        transport,
                        connected_at: chrono::Utc::now().to_rfc3339(),
                    });
                }
                Err(cause) => {
                    error!("Hop {} ({}) failed: {}", index, hop, cause);
                    self.state = ChainState::Aborted;
                    self.teardown().await;
                    return Err(HopError::at_hop(index, hop.host, cause));
                }
            }
        }

        self.state = ChainState::Connected(self.active.len());
        info!("Chain established: {}", self.path_description());
        Ok(())
    }

    /// Establish one hop, retrying transient connect failures.
    async fn establish_hop(
        &self,
        index: usize,
        hop: &HopSpec,
    ) -> Result<C::Transport, TransportError> {
        let attempt_counter = AtomicU32::new(0);

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.options.retry_delay)
            .with_max_delay(MAX_RETRY_DELAY)
            .with_max_times(self.options.max_retries as usize)
            .with_jitter();

        let result = (|| async {
            let current_attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);
            if current_attempt > 0 {
                warn!("Hop {} retry attempt {} to {}", index, current_attempt, hop);
            }
            self.attempt_hop(hop).await
        })
        .retry(backoff)
        .when(|e: &TransportError| e.is_retryable())
        .notify(|err, dur| {
            warn!("Hop {} to {} failed: {}. Retrying in {:?}", index, hop, err, dur);
        })
        .await;

        let retry_count = attempt_counter.load(Ordering::SeqCst).saturating_sub(1);
        if result.is_ok() && retry_count > 0 {
            info!(
                "Hop {} to {} succeeded after {} retry attempt(s)",
                index, hop, retry_count
            );
        }
        result
    }

    /// One bounded attempt: open the socket source, then hand it to the connector.
    ///
    /// A channel opened here is moved into the connector and dropped with the attempt if the
    /// handshake fails, so a retry always starts on a new channel.
    async fn attempt_hop(&self, hop: &HopSpec) -> Result<C::Transport, TransportError> {
        let attempt = async {
            let source = match self.active.last() {
                None => SocketSource::Direct,
                Some(parent) => {
                    debug!("Opening tunnel via {} to {}:{}", parent.spec, hop.host, hop.port);
                    let channel = parent
                        .transport
                        .open_channel_to(&hop.host, hop.port)
                        .await?;
                    SocketSource::Tunneled(channel)
                }
            };
            self.connector.open(hop, source).await
        };

        let timeout = self.options.connect_timeout;
        tokio::select! {
            biased;

            _ = self.cancel_token.cancelled() => {
                Err(TransportError::cancelled(format!("connect to {} cancelled", hop)))
            }

            result = tokio::time::timeout(timeout, attempt) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::connect(format!(
                    "connect to {} timed out after {:?}",
                    hop, timeout
                ))),
            },
        }
    }

    /// Close every active transport, newest first.
    async fn teardown(&mut self) {
        while let Some(mut hop) = self.active.pop() {
            debug!("Closing hop {}: {}", self.active.len(), hop.spec);
            hop.transport.close().await;
            info!("Closed {}", hop.spec);
        }
    }

    /// Close all active transports in reverse order.
    ///
    /// Safe to call in any state and any number of times; it never fails.
    pub async fn close(&mut self) {
        if self.state == ChainState::Closed {
            return;
        }
        let span = info_span!("hop_chain", chain_id = %self.id);
        self.teardown().instrument(span).await;
        self.state = ChainState::Closed;
    }
}

impl<C: Connector> Drop for HopChain<C> {
    fn drop(&mut self) {
        if !self.active.is_empty() {
            warn!(
                "Chain {} dropped with {} open hop(s); sessions are released without an orderly close",
                self.id,
                self.active.len()
            );
        }
    }
}
