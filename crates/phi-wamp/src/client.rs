//! Supervised connection
//!
//! A [`Client`] owns at most one logical connection. `connect` spawns a
//! supervisor task that performs the handshake, drives the session and
//! reconnects per [`RetryPolicy`] when the transport drops. Lifecycle
//! changes are reported in order on the event channel returned by
//! [`Client::new`].

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::auth::Credentials;
use crate::error::WampError;
use crate::retry::RetryPolicy;
use crate::session::{self, DriveExit, SessionHandle};
use crate::state::ConnectionState;
use crate::transport::{Connector, Transport};
use crate::Result;

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub url: String,
    pub realm: String,
    pub credentials: Credentials,
    pub retry: RetryPolicy,
}

impl ConnectConfig {
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| WampError::InvalidConfig(format!("invalid url {}: {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(WampError::InvalidConfig(format!(
                "url must use ws:// or wss://, got {}",
                self.url
            )));
        }
        if self.realm.trim().is_empty() {
            return Err(WampError::InvalidConfig("realm is required".to_string()));
        }
        if self.credentials.authid.trim().is_empty() {
            return Err(WampError::InvalidConfig("authid is required".to_string()));
        }
        self.retry.validate()
    }
}

/// Why a connection closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// An open session's transport dropped
    Lost,
    /// The endpoint could not be reached or the handshake was cut off
    Unreachable,
    /// The router refused the session
    Aborted(String),
    /// Closed on request
    Left,
}

impl CloseReason {
    pub fn as_str(&self) -> &str {
        match self {
            CloseReason::Lost => "lost",
            CloseReason::Unreachable => "unreachable",
            CloseReason::Aborted(reason) => reason,
            CloseReason::Left => "left",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    /// Emitted once per successful handshake, after `StateChanged(Open)`
    Open(SessionHandle),
    Close {
        reason: CloseReason,
        will_retry: bool,
        message: Option<String>,
    },
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    session: Option<SessionHandle>,
    shutdown: Option<watch::Sender<bool>>,
}

pub struct Client {
    connector: Arc<dyn Connector>,
    inner: Arc<RwLock<Inner>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl Client {
    pub fn new(connector: Arc<dyn Connector>) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let client = Self {
            connector,
            inner: Arc::new(RwLock::new(Inner {
                state: ConnectionState::Closed,
                session: None,
                shutdown: None,
            })),
            events,
        };
        (client, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.read().state.clone()
    }

    /// Handle to the current session while open
    pub fn session(&self) -> Option<SessionHandle> {
        let inner = self.inner.read();
        if inner.state.is_open() {
            inner.session.clone()
        } else {
            None
        }
    }

    /// Start a supervised connection
    ///
    /// Rejected without side effects unless the client is closed. Must be
    /// called from within a tokio runtime.
    pub fn connect(&self, config: ConnectConfig) -> Result<()> {
        let shutdown_rx = {
            let mut inner = self.inner.write();
            if !inner.state.is_closed() {
                return Err(WampError::AlreadyConnected(inner.state.to_string()));
            }
            config.validate()?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            inner.shutdown = Some(shutdown_tx);
            self.set_state(&mut inner, ConnectionState::Connecting);
            shutdown_rx
        };

        tracing::info!(url = %config.url, realm = %config.realm, "Connecting");

        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.supervise(config, shutdown_rx).await });
        Ok(())
    }

    /// Leave the current session, or abandon connecting/retrying
    ///
    /// Returns false when already closed. The final `Close` event carries
    /// [`CloseReason::Left`].
    pub fn disconnect(&self) -> bool {
        let inner = self.inner.read();
        if inner.state.is_closed() {
            return false;
        }
        if let Some(shutdown) = &inner.shutdown {
            let _ = shutdown.send(true);
        }
        true
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        if !inner.state.can_transition_to(&state) {
            tracing::warn!(from = %inner.state, to = %state, "Unexpected connection state change");
        }
        tracing::debug!(from = %inner.state, to = %state, "Connection state changed");
        inner.state = state.clone();
        let _ = self.events.send(ConnectionEvent::StateChanged(state));
    }

    fn opened(&self, handle: SessionHandle) {
        let mut inner = self.inner.write();
        inner.session = Some(handle.clone());
        self.set_state(&mut inner, ConnectionState::Open);
        let _ = self.events.send(ConnectionEvent::Open(handle));
    }

    fn closed(&self, reason: CloseReason, will_retry: bool, message: Option<String>) {
        let mut inner = self.inner.write();
        inner.session = None;
        if will_retry {
            self.set_state(&mut inner, ConnectionState::Retrying(reason.to_string()));
        } else {
            inner.shutdown = None;
            self.set_state(&mut inner, ConnectionState::Closed);
        }
        let _ = self.events.send(ConnectionEvent::Close {
            reason,
            will_retry,
            message,
        });
    }

    async fn open_session(&self, config: &ConnectConfig) -> Result<(Box<dyn Transport>, u64)> {
        let mut transport = self.connector.connect(&config.url).await?;
        match session::join(transport.as_mut(), &config.realm, &config.credentials).await {
            Ok(id) => Ok((transport, id)),
            Err(e) => {
                transport.close().await;
                Err(e)
            }
        }
    }

    async fn supervise(self, config: ConnectConfig, mut shutdown: watch::Receiver<bool>) {
        let mut retries: u32 = 0;

        loop {
            let attempt = tokio::select! {
                attempt = self.open_session(&config) => attempt,
                _ = shutdown_requested(&mut shutdown) => {
                    self.closed(CloseReason::Left, false, None);
                    return;
                }
            };

            let (reason, message) = match attempt {
                Ok((transport, id)) => {
                    retries = 0;
                    let (handle, inbox) = session::channel(id);
                    self.opened(handle.clone());

                    match session::drive(transport, handle, inbox, shutdown.clone()).await {
                        DriveExit::Left => {
                            tracing::info!(session_id = id, "Session closed");
                            self.closed(CloseReason::Left, false, None);
                            return;
                        }
                        DriveExit::Lost(detail) => {
                            tracing::warn!(session_id = id, detail = %detail, "Session lost");
                            (CloseReason::Lost, Some(detail))
                        }
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "Connection refused by router");
                    let reason = match &e {
                        WampError::Aborted { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    self.closed(CloseReason::Aborted(reason), false, Some(e.to_string()));
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, url = %config.url, "Connection attempt failed");
                    (CloseReason::Unreachable, Some(e.to_string()))
                }
            };

            if retries >= config.retry.max_retries {
                tracing::error!(retries, "Giving up on connection");
                self.closed(reason, false, message);
                return;
            }

            retries += 1;
            let delay = config.retry.delay(retries);
            tracing::info!(attempt = retries, delay_secs = delay.as_secs_f64(), "Reconnecting");
            self.closed(reason, true, message);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut shutdown) => {
                    self.closed(CloseReason::Left, false, None);
                    return;
                }
            }
        }
    }
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            inner: Arc::clone(&self.inner),
            events: self.events.clone(),
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConnector, MemoryTransport};
    use crate::message::Message;
    use crate::transport::Transport;
    use serde_json::{json, Map};

    fn config(max_retries: u32) -> ConnectConfig {
        ConnectConfig {
            url: "wss://192.168.193.1/ws/".to_string(),
            realm: "lycanthrope".to_string(),
            credentials: Credentials::new("Zeus", "secret"),
            retry: RetryPolicy {
                max_retries,
                initial_delay: 5.0,
                max_delay: 10.0,
                growth: 1.1,
            },
        }
    }

    /// Play the router side up to WELCOME
    async fn welcome(router: &mut MemoryTransport, session: u64) {
        match router.recv().await {
            Some(Ok(Message::Hello { .. })) => {}
            other => panic!("Expected Hello, got {:?}", other),
        }
        router
            .send(Message::Welcome {
                session,
                details: Map::new(),
            })
            .await
            .unwrap();
    }

    async fn states_until_closed(
        events: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
    ) -> (Vec<ConnectionState>, Vec<(CloseReason, bool)>) {
        let mut states = Vec::new();
        let mut closes = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::StateChanged(state) => states.push(state),
                ConnectionEvent::Open(_) => {}
                ConnectionEvent::Close {
                    reason, will_retry, ..
                } => {
                    closes.push((reason, will_retry));
                    if !will_retry {
                        break;
                    }
                }
            }
        }
        (states, closes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_closes() {
        let connector = MemoryConnector::new();
        let mut router = connector.accept();
        let (client, mut events) = Client::new(Arc::new(connector.clone()));

        tokio::spawn(async move {
            welcome(&mut router, 7).await;
            // Router goes away right after the handshake
        });

        client.connect(config(3)).unwrap();
        let (states, closes) = states_until_closed(&mut events).await;

        use ConnectionState::*;
        assert_eq!(
            states,
            vec![
                Connecting,
                Open,
                Retrying("lost".to_string()),
                Retrying("unreachable".to_string()),
                Retrying("unreachable".to_string()),
                Closed,
            ]
        );
        assert_eq!(
            closes,
            vec![
                (CloseReason::Lost, true),
                (CloseReason::Unreachable, true),
                (CloseReason::Unreachable, true),
                (CloseReason::Unreachable, false),
            ]
        );
        assert_eq!(connector.attempts().len(), 4);
        assert!(client.state().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_rejected() {
        let connector = MemoryConnector::new();
        let mut router = connector.accept();
        let (client, mut events) = Client::new(Arc::new(connector.clone()));

        client.connect(config(0)).unwrap();
        let err = client.connect(config(0)).unwrap_err();
        assert!(matches!(err, WampError::AlreadyConnected(_)));

        welcome(&mut router, 1).await;
        match events.recv().await {
            Some(ConnectionEvent::StateChanged(ConnectionState::Connecting)) => {}
            other => panic!("Expected Connecting, got {:?}", other),
        }
        match events.recv().await {
            Some(ConnectionEvent::StateChanged(ConnectionState::Open)) => {}
            other => panic!("Expected Open, got {:?}", other),
        }
        assert!(client.connect(config(0)).is_err());
        // Only one handshake was attempted
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_has_no_side_effect() {
        let connector = MemoryConnector::new();
        let (client, _events) = Client::new(Arc::new(connector.clone()));

        let mut bad = config(3);
        bad.url = "http://192.168.193.1/ws/".to_string();
        assert!(matches!(
            client.connect(bad),
            Err(WampError::InvalidConfig(_))
        ));

        let mut bad = config(3);
        bad.retry.growth = 1.0;
        assert!(client.connect(bad).is_err());

        assert!(client.state().is_closed());
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_is_not_retried() {
        let connector = MemoryConnector::new();
        let mut router = connector.accept();
        let (client, mut events) = Client::new(Arc::new(connector.clone()));

        tokio::spawn(async move {
            let _hello = router.recv().await;
            router
                .send(Message::Abort {
                    details: Map::new(),
                    reason: "wamp.error.no_such_realm".to_string(),
                })
                .await
                .unwrap();
        });

        client.connect(config(5)).unwrap();
        let (states, closes) = states_until_closed(&mut events).await;

        assert_eq!(
            states,
            vec![ConnectionState::Connecting, ConnectionState::Closed]
        );
        assert_eq!(
            closes,
            vec![(
                CloseReason::Aborted("wamp.error.no_such_realm".to_string()),
                false
            )]
        );
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resets_retry_count() {
        let connector = MemoryConnector::new();
        let mut first = connector.accept();
        connector.refuse("no route");
        let mut second = connector.accept();
        let (client, mut events) = Client::new(Arc::new(connector.clone()));

        tokio::spawn(async move {
            welcome(&mut first, 1).await;
        });
        let keep = tokio::spawn(async move {
            welcome(&mut second, 2).await;
            second
        });

        client.connect(config(2)).unwrap();

        let mut opens = 0;
        while let Some(event) = events.recv().await {
            if let ConnectionEvent::Open(handle) = event {
                opens += 1;
                if opens == 2 {
                    assert_eq!(handle.id(), 2);
                    break;
                }
            }
        }
        assert!(client.state().is_open());
        assert_eq!(client.session().map(|s| s.id()), Some(2));

        let mut router = keep.await.unwrap();
        assert!(client.disconnect());
        match router.recv().await {
            Some(Ok(Message::Goodbye { .. })) => {}
            other => panic!("Expected Goodbye, got {:?}", other),
        }
        let (_, closes) = states_until_closed(&mut events).await;
        assert_eq!(closes, vec![(CloseReason::Left, false)]);
        assert!(client.session().is_none());
        assert!(!client.disconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_through_session() {
        let connector = MemoryConnector::new();
        let mut router = connector.accept();
        let (client, mut events) = Client::new(Arc::new(connector.clone()));
        client.connect(config(0)).unwrap();
        welcome(&mut router, 5).await;

        let handle = loop {
            match events.recv().await {
                Some(ConnectionEvent::Open(handle)) => break handle,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        };

        let call = tokio::spawn(async move { handle.call("wamp.session.count", vec![]).await });
        let request = match router.recv().await {
            Some(Ok(Message::Call { request, .. })) => request,
            other => panic!("Expected Call, got {:?}", other),
        };
        router
            .send(Message::Result {
                request,
                details: Map::new(),
                args: vec![json!(2)],
                kwargs: Map::new(),
            })
            .await
            .unwrap();

        assert_eq!(call.await.unwrap().unwrap().value(), json!(2));
    }
}
