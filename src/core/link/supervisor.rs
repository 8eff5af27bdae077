//! Link supervisor task
//!
//! Owns every piece of mutable link state: the active transport, the line
//! framer, the change-gated publisher, the state machine and the reconnect
//! deadline. Port events, commands from [`GpsLink`](super::GpsLink) and the
//! reconnect deadline are all handled on this one task, so no locking is
//! needed and events are processed strictly one at a time.

use super::probe::{self, BaudDetection};
use super::{Command, LinkConfig, LinkEvent};
use crate::core::fix::{channels, FixDecoder};
use crate::core::protocol::{LineFramer, NmeaError, Sentence};
use crate::core::publisher::{ChangeGatedPublisher, ChannelValue, StateSink};
use crate::core::state_machine::{LinkState, LinkStateMachine};
use crate::core::transport::{available_port_options, PortEvent, PortFactory, PortHandle};
use std::ops::ControlFlow;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

/// Port event buffer per open transport
const PORT_EVENT_CAPACITY: usize = 256;

struct ActiveLink {
    handle: Box<dyn PortHandle>,
    events: mpsc::Receiver<PortEvent>,
}

/// What woke the supervisor loop
enum Wake {
    Command(Option<Command>),
    Port(Option<PortEvent>),
    ReconnectDue,
}

/// Main link temporarily released for a probe on the same path
#[must_use]
struct DiagnosticSession {
    reopen: bool,
}

pub(crate) struct LinkSupervisor<F, S> {
    config: LinkConfig,
    factory: F,
    publisher: ChangeGatedPublisher<S>,
    framer: LineFramer,
    decoder: FixDecoder,
    machine: LinkStateMachine,
    link: Option<ActiveLink>,
    reconnect_at: Option<Instant>,
    events: broadcast::Sender<LinkEvent>,
}

impl<F: PortFactory, S: StateSink> LinkSupervisor<F, S> {
    pub(crate) fn new(
        config: LinkConfig,
        factory: F,
        sink: S,
        events: broadcast::Sender<LinkEvent>,
    ) -> Self {
        Self {
            framer: LineFramer::with_max_line_length(config.max_line_length),
            publisher: ChangeGatedPublisher::with_floor(sink, config.publish_floor),
            config,
            factory,
            decoder: FixDecoder::new(),
            machine: LinkStateMachine::new(),
            link: None,
            reconnect_at: None,
            events,
        }
    }

    /// Run until shutdown or until every [`GpsLink`](super::GpsLink) handle is dropped
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::info!(
            "Starting GPS link on {} @ {} baud",
            self.config.port,
            self.config.baud_rate
        );
        self.publish_connection(false);
        self.open().await;

        loop {
            let reconnect_at = self.reconnect_at;
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                event = next_port_event(&mut self.link) => Wake::Port(event),
                () = reconnect_due(reconnect_at) => Wake::ReconnectDue,
            };

            match wake {
                Wake::Command(Some(command)) => {
                    if self.handle_command(command).await.is_break() {
                        return;
                    }
                }
                Wake::Command(None) => {
                    tracing::debug!("All link handles dropped");
                    self.shutdown().await;
                    return;
                }
                Wake::Port(Some(event)) => self.handle_port_event(event).await,
                // Reader went away without a close notification
                Wake::Port(None) => self.handle_port_event(PortEvent::Closed).await,
                Wake::ReconnectDue => {
                    self.reconnect_at = None;
                    tracing::info!(
                        "Reconnecting to {} (attempt {})...",
                        self.config.port,
                        self.machine.reconnect_attempt()
                    );
                    self.open().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::ListPorts(reply) => {
                let _ = reply.send(available_port_options(&self.factory));
            }
            Command::DetectBaudRate { path, reply } => {
                let detection = self.detect_baud_rate(&path).await;
                let _ = reply.send(detection);
            }
            Command::TestPort {
                path,
                baud_rate,
                reply,
            } => {
                let alive = self.test_port(&path, baud_rate).await;
                let _ = reply.send(alive);
            }
            Command::State(reply) => {
                let _ = reply.send(self.machine.state());
            }
            Command::Shutdown(reply) => {
                self.shutdown().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_port_event(&mut self, event: PortEvent) {
        match event {
            PortEvent::Data(chunk) => self.handle_data(&chunk),
            PortEvent::Error(reason) => {
                tracing::error!("Serial error on {}: {}", self.config.port, reason);
                self.handle_link_down(&reason);
            }
            PortEvent::Closed => {
                tracing::warn!("Serial port {} closed", self.config.port);
                self.release_link().await;
                self.handle_link_down("port closed");
            }
        }
    }

    fn handle_data(&mut self, chunk: &[u8]) {
        if self.reconnect_at.take().is_some() {
            tracing::debug!("Data received, reconnect cancelled");
        }
        if self.machine.state() == LinkState::Reconnecting {
            self.set_state(LinkState::Open, "data received");
        }

        for line in self.framer.ingest(chunk) {
            for raw in line.sentences() {
                if let Err(e) = self.process_sentence(&raw) {
                    tracing::warn!("Dropping sentence {:?}: {}", raw, e);
                }
            }
        }
    }

    fn process_sentence(&mut self, raw: &str) -> Result<(), NmeaError> {
        let sentence = Sentence::parse(raw)?;
        if let Some(record) = self.decoder.decode(&sentence) {
            for (channel, value) in record.updates() {
                self.publisher.publish_if_changed(channel, value);
            }
            let _ = self.events.send(LinkEvent::Fix(record));
        }
        Ok(())
    }

    /// Mark the link inactive and schedule a reopen unless one is pending
    fn handle_link_down(&mut self, reason: &str) {
        self.publish_connection(false);
        if self.reconnect_at.is_none() {
            let delay = self.config.reconnect_delay;
            self.reconnect_at = Some(Instant::now() + delay);
            tracing::info!("Reconnect to {} in {:?}", self.config.port, delay);
        }
        self.set_state(LinkState::Reconnecting, reason);
    }

    /// Close any current transport and open the configured port
    async fn open(&mut self) {
        self.reconnect_at = None;
        self.close().await;
        self.set_state(LinkState::Opening, "open requested");

        let (tx, rx) = mpsc::channel(PORT_EVENT_CAPACITY);
        match self
            .factory
            .open(&self.config.port, self.config.baud_rate, tx)
            .await
        {
            Ok(handle) => {
                tracing::info!("Connected: {}", handle.connection_info());
                self.link = Some(ActiveLink { handle, events: rx });
                self.set_state(LinkState::Open, "port opened");
            }
            Err(e) => {
                tracing::error!("Failed to open {}: {}", self.config.port, e);
                self.handle_link_down(&format!("open failed: {e}"));
            }
        }
    }

    /// Drop the event stream, then close the transport. Returns whether a
    /// transport was held.
    async fn release_link(&mut self) -> bool {
        self.framer.reset();
        let Some(ActiveLink { mut handle, events }) = self.link.take() else {
            return false;
        };
        drop(events);
        if handle.is_open() {
            if let Err(e) = handle.close().await {
                tracing::warn!("Error closing {}: {}", handle.connection_info(), e);
            }
        }
        true
    }

    async fn close(&mut self) {
        if self.release_link().await {
            self.set_state(LinkState::Closed, "port closed");
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("Shutting down GPS link on {}", self.config.port);
        self.reconnect_at = None;
        self.close().await;
        self.set_state(LinkState::Closed, "shutdown");
        self.publish_connection(false);
    }

    async fn begin_diagnostic(&mut self, path: &str) -> DiagnosticSession {
        let holds_path = path == self.config.port
            && self
                .link
                .as_ref()
                .is_some_and(|link| link.handle.is_open());
        if holds_path {
            tracing::info!("Releasing {} for diagnostics", path);
            self.close().await;
        }
        DiagnosticSession { reopen: holds_path }
    }

    async fn end_diagnostic(&mut self, session: DiagnosticSession) {
        if session.reopen {
            self.open().await;
        }
    }

    async fn detect_baud_rate(&mut self, path: &str) -> BaudDetection {
        let session = self.begin_diagnostic(path).await;
        let detection = probe::detect_baud_rate(
            &self.factory,
            path,
            &self.config.baud_candidates,
            self.config.probe_window,
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Baud detection on {} could not open the port: {}", path, e);
            BaudDetection::Undetected
        });
        self.end_diagnostic(session).await;
        detection
    }

    async fn test_port(&mut self, path: &str, baud_rate: u32) -> bool {
        let session = self.begin_diagnostic(path).await;
        let alive = probe::test_port(&self.factory, path, baud_rate, self.config.probe_window)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Port test on {} could not open the port: {}", path, e);
                false
            });
        self.end_diagnostic(session).await;
        alive
    }

    fn publish_connection(&mut self, active: bool) {
        self.publisher
            .publish_if_changed(channels::CONNECTION, ChannelValue::Bool(active));
    }

    fn set_state(&mut self, state: LinkState, reason: &str) {
        if self.machine.state() == state {
            return;
        }
        match self.machine.transition(state, reason) {
            Ok(()) => {
                let _ = self.events.send(LinkEvent::StateChanged(state));
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }
}

async fn next_port_event(link: &mut Option<ActiveLink>) -> Option<PortEvent> {
    match link {
        Some(link) => link.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
