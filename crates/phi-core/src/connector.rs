//! Session Connector
//!
//! Owns the console's single WAMP connection and reacts to its lifecycle:
//! on open it attaches the session to the router, registers the decision
//! procedure, subscribes presence and robot log topics and reconciles
//! already-joined robots; on close it clears every connectivity flag and
//! reports the loss.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use phi_log::{Level, LogSink, SYSTEM_CHANNEL};
use phi_pack::{leave_session, reconcile, CommandRouter, JoinNotice, TargetRegistry, ON_JOIN, ON_LEAVE};
use phi_wamp::{
    Client, CloseReason, ConnectConfig, ConnectionEvent, ConnectionState, Connector, SessionHandle,
    WampError,
};

use crate::decisions::DecisionQueue;
use crate::Result;

/// Procedure robots call to ask the operator a yes/no question
pub const DECISION_PROCEDURE: &str = "zeus.phi.basic_decision";

pub struct SessionConnector {
    client: Client,
    events: Arc<Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>>,
    router: CommandRouter,
    registry: TargetRegistry,
    decisions: DecisionQueue,
    sink: LogSink,
}

impl SessionConnector {
    pub fn new(
        connector: Arc<dyn Connector>,
        router: CommandRouter,
        decisions: DecisionQueue,
        sink: LogSink,
    ) -> Self {
        let (client, events) = Client::new(connector);
        let registry = router.registry().clone();

        Self {
            client,
            events: Arc::new(Mutex::new(Some(events))),
            router,
            registry,
            decisions,
            sink,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Start a connection
    ///
    /// Returns `Ok(false)` without side effects when a connection already
    /// exists. Invalid settings are an error.
    pub fn connect(&self, config: ConnectConfig) -> Result<bool> {
        match self.client.connect(config) {
            Ok(()) => Ok(true),
            Err(WampError::AlreadyConnected(state)) => {
                tracing::debug!(state = %state, "Connect rejected");
                self.sink.warn(SYSTEM_CHANNEL, "Connection already exists.");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Leave the realm; returns false when there was nothing to close
    pub fn disconnect(&self) -> bool {
        self.client.disconnect()
    }

    /// Spawn the lifecycle loop; later calls do nothing
    pub fn start(&self) -> Option<tokio::task::JoinHandle<()>> {
        let events = self.events.lock().take()?;
        let this = self.clone();
        Some(tokio::spawn(async move { this.run(events).await }))
    }

    async fn run(self, mut events: mpsc::UnboundedReceiver<ConnectionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::StateChanged(state) => {
                    tracing::debug!(state = %state, "Connection state");
                }
                ConnectionEvent::Open(session) => {
                    // Dropped mid-setup; the close event follows
                    if self.on_open(session).await.is_err() {
                        tracing::debug!("Session lost during setup");
                    }
                }
                ConnectionEvent::Close {
                    reason,
                    will_retry,
                    message,
                } => self.on_close(reason, will_retry, message),
            }
        }
    }

    /// Wire a fresh session into the console
    ///
    /// Each step stands alone: a refused registration or subscription is
    /// logged and the rest still run. Only a lost connection stops setup.
    async fn on_open(&self, session: SessionHandle) -> phi_wamp::Result<()> {
        self.registry.clear_connectivity();
        self.router.attach(Arc::new(session.clone()));
        self.sink.info(SYSTEM_CHANNEL, "Connected!");

        match session.register(DECISION_PROCEDURE).await {
            Ok(mut invocations) => {
                let decisions = self.decisions.clone();
                tokio::spawn(async move {
                    while let Some(invocation) = invocations.recv().await {
                        decisions.request(invocation);
                    }
                });
                self.sink.info(SYSTEM_CHANNEL, "Registered all procedures.");
            }
            Err(e) => self.step_failed(format!("register {}", DECISION_PROCEDURE), e)?,
        }

        match session.subscribe(ON_JOIN).await {
            Ok(mut joins) => {
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    while let Some(event) = joins.recv().await {
                        if let Some(notice) = JoinNotice::from_event(&event.args) {
                            notice.apply(&registry);
                        }
                    }
                });
            }
            Err(e) => self.step_failed(format!("subscribe to {}", ON_JOIN), e)?,
        }

        match session.subscribe(ON_LEAVE).await {
            Ok(mut leaves) => {
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    while let Some(event) = leaves.recv().await {
                        if let Some(id) = leave_session(&event.args) {
                            registry.mark_left(id);
                        }
                    }
                });
            }
            Err(e) => self.step_failed(format!("subscribe to {}", ON_LEAVE), e)?,
        }

        for target in self.registry.ids() {
            let topic = format!("{}.log", target);
            let mut records = match session.subscribe(&topic).await {
                Ok(records) => records,
                Err(e) => {
                    self.step_failed(format!("subscribe to {}", topic), e)?;
                    continue;
                }
            };

            let sink = self.sink.clone();
            tokio::spawn(async move {
                while let Some(event) = records.recv().await {
                    let code = event.args.first().and_then(Value::as_i64).unwrap_or(0);
                    let message = match event.args.get(1) {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => continue,
                    };
                    sink.append(&target, message, Level::from_remote_code(code));
                }
            });
        }

        match reconcile(&session, &self.registry).await {
            Ok(found) => tracing::debug!(targets = ?found, "Presence reconciled"),
            Err(e) => self.step_failed("list joined robots".to_string(), e)?,
        }

        Ok(())
    }

    /// Report a failed setup step; a lost connection is passed back up
    fn step_failed(&self, step: String, error: WampError) -> phi_wamp::Result<()> {
        if matches!(error, WampError::ConnectionLost) {
            return Err(error);
        }

        tracing::warn!(step = %step, error = %error, "Session setup step failed");
        self.sink
            .warn(SYSTEM_CHANNEL, format!("Unable to {}: {}.", step, error));
        Ok(())
    }

    fn on_close(&self, reason: CloseReason, will_retry: bool, message: Option<String>) {
        self.router.detach();
        self.registry.clear_connectivity();
        self.decisions.discard();

        tracing::info!(reason = %reason, will_retry, detail = ?message, "Connection closed");

        match reason {
            CloseReason::Left => {
                self.sink.info(SYSTEM_CHANNEL, "Disconnected.");
            }
            CloseReason::Aborted(reason) => {
                self.sink
                    .error(SYSTEM_CHANNEL, format!("Connection refused: {}.", reason));
            }
            _ if will_retry => {
                self.sink.warn(SYSTEM_CHANNEL, "Connection lost. Retrying.");
            }
            _ => {
                self.sink.error(SYSTEM_CHANNEL, "Connection lost.");
            }
        }
    }
}

impl Clone for SessionConnector {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            events: Arc::clone(&self.events),
            router: self.router.clone(),
            registry: self.registry.clone(),
            decisions: self.decisions.clone(),
            sink: self.sink.clone(),
        }
    }
}
