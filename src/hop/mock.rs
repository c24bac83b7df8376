//! Scripted in-memory connector used by the chain and runner tests.
//!
//! Every observable action (session opened, channel opened or released, command executed,
//! session closed) is appended to a shared [`EventLog`] so tests can assert exact ordering.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::hop::error::TransportError;
use crate::hop::transport::{Connector, SocketSource, Transport};
use crate::hop::types::{HopSpec, RemoteOutput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Opened { host: String, via: Option<String> },
    OpenFailed { host: String },
    ChannelOpened { parent: String, target: String },
    ChannelReleased { parent: String, target: String },
    Executed { host: String, command: String },
    Closed { host: String },
    /// `close` found the session already broken.
    CloseOnDeadSession { host: String },
}

impl Event {
    pub(crate) fn opened(host: &str, via: Option<&str>) -> Self {
        Event::Opened {
            host: host.to_string(),
            via: via.map(str::to_string),
        }
    }

    pub(crate) fn open_failed(host: &str) -> Self {
        Event::OpenFailed {
            host: host.to_string(),
        }
    }

    pub(crate) fn channel_opened(parent: &str, target: &str) -> Self {
        Event::ChannelOpened {
            parent: parent.to_string(),
            target: target.to_string(),
        }
    }

    pub(crate) fn channel_released(parent: &str, target: &str) -> Self {
        Event::ChannelReleased {
            parent: parent.to_string(),
            target: target.to_string(),
        }
    }

    pub(crate) fn executed(host: &str, command: &str) -> Self {
        Event::Executed {
            host: host.to_string(),
            command: command.to_string(),
        }
    }

    pub(crate) fn closed(host: &str) -> Self {
        Event::Closed {
            host: host.to_string(),
        }
    }

    pub(crate) fn close_on_dead_session(host: &str) -> Self {
        Event::CloseOnDeadSession {
            host: host.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub(crate) fn closed_hosts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Closed { host } => Some(host),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn executed_commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Executed { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn never_opened(&self, host: &str) -> bool {
        !self.events().iter().any(|e| match e {
            Event::Opened { host: h, .. } | Event::OpenFailed { host: h } => h == host,
            Event::ChannelOpened { target, .. } => target == host,
            _ => false,
        })
    }
}

/// A hop named `name` with deterministic user and password.
pub(crate) fn hop(name: &str) -> HopSpec {
    HopSpec::new(name, 22, format!("user-{}", name), format!("pw-{}", name))
}

pub(crate) fn three_hops() -> Vec<HopSpec> {
    vec![hop("a"), hop("b"), hop("c")]
}

#[derive(Debug, Clone)]
enum CommandScript {
    Output {
        stdout: String,
        stderr: String,
        exit_status: u32,
        delay: Duration,
    },
    SessionLost,
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    passwords: HashMap<String, String>,
    unreachable: HashSet<String>,
    hanging: HashSet<String>,
    refuse_channels: HashSet<String>,
    dead_on_close: HashSet<String>,
    flaky: Mutex<HashMap<String, u32>>,
    commands: HashMap<String, CommandScript>,
}

/// A connector whose behaviour per host and per command is scripted up front.
pub(crate) struct MockConnector {
    log: EventLog,
    script: Arc<Script>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self {
            log: EventLog::default(),
            script: Arc::new(Script::default()),
        }
    }

    pub(crate) fn log(&self) -> EventLog {
        self.log.clone()
    }

    /// Only accept `password` for `host`.
    pub(crate) fn with_password(mut self, host: &str, password: &str) -> Self {
        self.script_mut()
            .passwords
            .insert(host.to_string(), password.to_string());
        self
    }

    pub(crate) fn unreachable(mut self, host: &str) -> Self {
        self.script_mut().unreachable.insert(host.to_string());
        self
    }

    /// The handshake with `host` never completes.
    pub(crate) fn hang(mut self, host: &str) -> Self {
        self.script_mut().hanging.insert(host.to_string());
        self
    }

    /// `host` refuses to open tunneled channels.
    pub(crate) fn refuse_channels_from(mut self, host: &str) -> Self {
        self.script_mut().refuse_channels.insert(host.to_string());
        self
    }

    /// The session to `host` is broken by the time the chain closes it.
    pub(crate) fn dies_before_close(mut self, host: &str) -> Self {
        self.script_mut().dead_on_close.insert(host.to_string());
        self
    }

    /// The first `failures` attempts to reach `host` are refused.
    pub(crate) fn flaky(mut self, host: &str, failures: u32) -> Self {
        self.script_mut()
            .flaky
            .lock()
            .unwrap()
            .insert(host.to_string(), failures);
        self
    }

    pub(crate) fn respond(mut self, command: &str, stdout: &str, stderr: &str, exit: u32) -> Self {
        self.script_mut().commands.insert(
            command.to_string(),
            CommandScript::Output {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_status: exit,
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// `command` succeeds after `delay`.
    pub(crate) fn slow(mut self, command: &str, stdout: &str, delay: Duration) -> Self {
        self.script_mut().commands.insert(
            command.to_string(),
            CommandScript::Output {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_status: 0,
                delay,
            },
        );
        self
    }

    /// The session dies while `command` runs.
    pub(crate) fn lose_session_on(mut self, command: &str) -> Self {
        self.script_mut()
            .commands
            .insert(command.to_string(), CommandScript::SessionLost);
        self
    }

    pub(crate) fn hang_on(mut self, command: &str) -> Self {
        self.script_mut()
            .commands
            .insert(command.to_string(), CommandScript::Hang);
        self
    }

    fn script_mut(&mut self) -> &mut Script {
        Arc::get_mut(&mut self.script).expect("script is only edited before any transport exists")
    }

    fn take_flaky_failure(&self, host: &str) -> bool {
        let mut flaky = self.script.flaky.lock().unwrap();
        match flaky.get_mut(host) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

/// Channel handed from a parent mock transport to its child.
pub(crate) struct MockChannel {
    parent: String,
    target: String,
    log: EventLog,
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.log
            .push(Event::channel_released(&self.parent, &self.target));
    }
}

pub(crate) struct MockTransport {
    host: String,
    username: String,
    socket: Option<MockChannel>,
    script: Arc<Script>,
    log: EventLog,
    closed: bool,
}

impl MockTransport {
    pub(crate) fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn open(
        &self,
        hop: &HopSpec,
        source: SocketSource<MockChannel>,
    ) -> Result<MockTransport, TransportError> {
        let script = &self.script;

        if script.hanging.contains(&hop.host) {
            return std::future::pending().await;
        }

        let failure = if script.unreachable.contains(&hop.host) {
            Some(TransportError::connect(format!("{}: connection refused", hop.host)))
        } else if self.take_flaky_failure(&hop.host) {
            Some(TransportError::connect(format!("{}: connection reset", hop.host)))
        } else {
            match script.passwords.get(&hop.host) {
                Some(expected) if expected != hop.credential.expose() => Some(
                    TransportError::authentication(format!("{}: permission denied", hop.username)),
                ),
                _ => None,
            }
        };

        if let Some(err) = failure {
            self.log.push(Event::open_failed(&hop.host));
            drop(source);
            return Err(err);
        }

        let (socket, via) = match source {
            SocketSource::Direct => (None, None),
            SocketSource::Tunneled(channel) => {
                let parent = channel.parent.clone();
                (Some(channel), Some(parent))
            }
        };
        self.log.push(Event::Opened {
            host: hop.host.clone(),
            via,
        });

        Ok(MockTransport {
            host: hop.host.clone(),
            username: hop.username.clone(),
            socket,
            script: self.script.clone(),
            log: self.log.clone(),
            closed: false,
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Channel = MockChannel;

    async fn open_channel_to(&self, host: &str, _port: u16) -> Result<MockChannel, TransportError> {
        if self.closed {
            return Err(TransportError::channel(format!("{} is closed", self.host)));
        }
        if self.script.refuse_channels.contains(&self.host) {
            return Err(TransportError::channel(format!(
                "{}: administratively prohibited",
                self.host
            )));
        }
        self.log.push(Event::channel_opened(&self.host, host));
        Ok(MockChannel {
            parent: self.host.clone(),
            target: host.to_string(),
            log: self.log.clone(),
        })
    }

    async fn run_command(&self, command: &str) -> Result<RemoteOutput, TransportError> {
        if self.closed {
            return Err(TransportError::execution(format!("{} is closed", self.host)));
        }
        self.log.push(Event::executed(&self.host, command));

        match self.script.commands.get(command) {
            Some(CommandScript::Output {
                stdout,
                stderr,
                exit_status,
                delay,
            }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(RemoteOutput {
                    stdout: format!("{}\n", stdout),
                    stderr: stderr.clone(),
                    exit_status: Some(*exit_status),
                })
            }
            Some(CommandScript::SessionLost) => Err(TransportError::execution(format!(
                "{}: connection reset during command",
                self.host
            ))),
            Some(CommandScript::Hang) => std::future::pending().await,
            None => Ok(default_output(command, &self.username)),
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.script.dead_on_close.contains(&self.host) {
            self.log.push(Event::close_on_dead_session(&self.host));
        } else {
            self.log.push(Event::closed(&self.host));
        }
        self.socket.take();
    }
}

/// Minimal shell: `echo` prints its arguments, `pwd` prints the home directory.
fn default_output(command: &str, username: &str) -> RemoteOutput {
    let stdout = if let Some(rest) = command.strip_prefix("echo ") {
        format!("{}\n", rest.trim_matches('\''))
    } else if command == "pwd" {
        format!("/home/{}\n", username)
    } else {
        String::new()
    };
    RemoteOutput {
        stdout,
        stderr: String::new(),
        exit_status: Some(0),
    }
}
