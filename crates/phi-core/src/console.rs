//! Operator console state container
//!
//! All console state lives here and is passed explicitly to the
//! components that need it. Front-ends drive the console through these
//! methods and render from the log sink.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

use phi_input::{target_for_word, InputBinder, Key, VoiceCommand};
use phi_log::{Level, LogSink, SYSTEM_CHANNEL};
use phi_pack::{CommandRequest, CommandRouter, Motion, Operation, Outcome, Pose, Target, TargetRegistry};
use phi_storage::{ArchivedEvent, Database};
use phi_wamp::{ConnectionState, Connector, WebSocketConnector};

use crate::config::Config;
use crate::connector::SessionConnector;
use crate::decisions::{DecisionQueue, PendingDecision};
use crate::error::CoreError;
use crate::settings::Settings;
use crate::Result;

/// Default target under control at startup
const DEFAULT_TARGET: &str = "pack1";

pub struct Console {
    config: Config,
    db: Database,
    settings: Arc<RwLock<Settings>>,
    sink: LogSink,
    registry: TargetRegistry,
    router: CommandRouter,
    binder: InputBinder,
    decisions: DecisionQueue,
    connector: SessionConnector,
    selected: Arc<RwLock<String>>,
}

impl Console {
    /// Open the console database and connect over WebSockets
    pub fn new(config: Config) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        Self::with_parts(config, db, Arc::new(WebSocketConnector))
    }

    /// Build a console on an existing database and transport
    pub fn with_parts(config: Config, db: Database, connector: Arc<dyn Connector>) -> Result<Self> {
        let settings = Settings::load(&db);

        let sink = LogSink::with_archive(db.clone(), Level::Warn);
        sink.init(SYSTEM_CHANNEL);

        let registry = settings.registry();
        for id in registry.ids() {
            sink.init(&id);
        }

        let router = CommandRouter::new(registry.clone(), sink.clone());
        let binder = InputBinder::new(router.clone(), sink.clone());
        binder.set_steps(settings.keys);
        let decisions = DecisionQueue::new(sink.clone());
        let connector = SessionConnector::new(connector, router.clone(), decisions.clone(), sink.clone());

        let selected = registry
            .ids()
            .into_iter()
            .find(|id| id == DEFAULT_TARGET)
            .or_else(|| registry.ids().into_iter().next())
            .ok_or_else(|| CoreError::Config("no targets configured".to_string()))?;

        tracing::info!(database = %config.database_path.display(), "Console initialized");

        Ok(Self {
            config,
            db,
            settings: Arc::new(RwLock::new(settings)),
            sink,
            registry,
            router,
            binder,
            decisions,
            connector,
            selected: Arc::new(RwLock::new(selected)),
        })
    }

    /// Start reacting to connection events; call once inside the runtime
    pub fn start(&self) {
        self.connector.start();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    // === Connection ===

    /// Connect with the saved settings; `Ok(false)` when already connected
    pub fn connect(&self) -> Result<bool> {
        let config = self.settings.read().comm.connect_config();
        self.connector.connect(config)
    }

    pub fn disconnect(&self) -> bool {
        self.connector.disconnect()
    }

    pub fn state(&self) -> ConnectionState {
        self.connector.state()
    }

    // === Targets ===

    pub fn targets(&self) -> Vec<Target> {
        self.registry.list()
    }

    pub fn selected(&self) -> String {
        self.selected.read().clone()
    }

    /// Select the target to control by id or spoken word
    pub fn select(&self, word: &str) -> Result<String> {
        let id = match target_for_word(word) {
            Some(id) if self.registry.contains(id) => id.to_string(),
            _ if self.registry.contains(word) => word.to_string(),
            _ => return Err(CoreError::Pack(phi_pack::PackError::UnknownTarget(word.to_string()))),
        };

        let changed = {
            let mut selected = self.selected.write();
            if *selected == id {
                false
            } else {
                *selected = id.clone();
                true
            }
        };

        if changed {
            self.sink
                .info(SYSTEM_CHANNEL, format!("Controlling {}.", display_name(&id)));
        }
        Ok(id)
    }

    // === Commands ===

    /// Send `operation` to the selected target
    pub async fn call(&self, operation: Operation, args: Vec<Value>) -> Result<Outcome> {
        let request = CommandRequest::new(self.selected(), operation, args);
        Ok(self.router.execute(&request).await?)
    }

    pub async fn set_vector(&self, linear: f64, angular: f64) -> Outcome {
        self.router
            .set_vector(&self.selected(), Motion::new(linear, angular))
            .await
    }

    pub async fn set_head(&self, yaw: f64, pitch: f64) -> Outcome {
        self.router
            .set_head(&self.selected(), Pose::new(yaw, pitch))
            .await
    }

    /// Run a recognized voice phrase
    pub async fn say(&self, phrase: &str) -> Result<Vec<Outcome>> {
        let command = VoiceCommand::parse(phrase)?;
        self.select(&command.target)?;
        Ok(command.execute(&self.router).await)
    }

    // === Keyboard ===

    pub fn bind_keys(&self) -> Result<()> {
        Ok(self.binder.bind(&self.selected())?)
    }

    pub fn unbind_keys(&self) -> bool {
        self.binder.unbind()
    }

    pub async fn press(&self, key: Key) -> Option<Outcome> {
        self.binder.press(key).await
    }

    // === Decisions ===

    pub fn pending_decisions(&self) -> Vec<PendingDecision> {
        self.decisions.pending()
    }

    pub fn decide(&self, answer: bool) -> Result<PendingDecision> {
        self.decisions.resolve(answer)
    }

    // === Settings ===

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Replace and persist settings
    ///
    /// Connection changes apply on the next connect.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        settings.save(&self.db)?;
        self.binder.set_steps(settings.keys);
        *self.settings.write() = settings;
        Ok(())
    }

    pub fn reset_comm(&self) -> Result<()> {
        let mut settings = self.settings();
        settings.reset_comm();
        self.update_settings(settings)?;
        self.sink.info(SYSTEM_CHANNEL, "Connection settings reset.");
        Ok(())
    }

    // === Log ===

    /// Archived warnings and errors, newest first
    pub fn archived(&self, limit: usize) -> Vec<ArchivedEvent> {
        self.sink.archived(limit)
    }

    /// Empty a log channel, and its archive too when `archived` is set
    ///
    /// Returns the number of archived events removed.
    pub fn clear_log(&self, channel: &str, archived: bool) -> usize {
        self.sink.clear(channel);
        if !archived {
            return 0;
        }

        let removed = self.sink.clear_archived(channel);
        tracing::info!(channel, removed, "Cleared archived log events");
        removed
    }
}

/// `pack1` → `pack 1`
fn display_name(id: &str) -> String {
    match id.find(|c: char| c.is_ascii_digit()) {
        Some(split) if split > 0 => format!("{} {}", &id[..split], &id[split..]),
        _ => id.to_string(),
    }
}
