//! Persisted console settings
//!
//! Stored as one JSON blob under [`SETTINGS_KEY`]. Missing fields take
//! their defaults so older blobs keep loading.

use serde::{Deserialize, Serialize};

use phi_input::KeySteps;
use phi_pack::{Target, TargetRegistry};
use phi_storage::Database;
use phi_wamp::{ConnectConfig, Credentials, RetryPolicy};

use crate::Result;

pub const SETTINGS_KEY: &str = "settings";

/// Router connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommSettings {
    pub url: String,
    pub realm: String,
    pub authid: String,
    pub secret: String,
    pub authmethod: String,
    pub max_retries: u32,
    /// Seconds
    pub initial_retry_delay: f64,
    /// Seconds
    pub max_retry_delay: f64,
    pub retry_delay_growth: f64,
}

impl CommSettings {
    pub fn connect_config(&self) -> ConnectConfig {
        let mut credentials = Credentials::new(self.authid.clone(), self.secret.clone());
        credentials.method = self.authmethod.clone();

        ConnectConfig {
            url: self.url.clone(),
            realm: self.realm.clone(),
            credentials,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                initial_delay: self.initial_retry_delay,
                max_delay: self.max_retry_delay,
                growth: self.retry_delay_growth,
            },
        }
    }
}

impl Default for CommSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();

        Self {
            url: "wss://192.168.193.1/ws/".to_string(),
            realm: "lycanthrope".to_string(),
            authid: "Zeus".to_string(),
            secret: "+Ew~77XrvW-c<6sZ".to_string(),
            authmethod: phi_wamp::WAMPCRA.to_string(),
            max_retries: retry.max_retries,
            initial_retry_delay: retry.initial_delay,
            max_retry_delay: retry.max_delay,
            retry_delay_growth: retry.growth,
        }
    }
}

/// A robot the console knows about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSettings {
    pub id: String,
    pub authid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub comm: CommSettings,
    pub targets: Vec<TargetSettings>,
    pub keys: KeySteps,
}

impl Settings {
    /// Read settings, falling back to defaults when absent or unreadable
    pub fn load(db: &Database) -> Self {
        match db.load_json::<Settings>(SETTINGS_KEY) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored settings are unreadable, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, db: &Database) -> Result<()> {
        db.save_json(SETTINGS_KEY, self)?;
        tracing::debug!("Settings saved");
        Ok(())
    }

    /// Restore every connection field to its default
    pub fn reset_comm(&mut self) {
        let defaults = CommSettings::default();

        self.comm.url = defaults.url;
        self.comm.realm = defaults.realm;
        self.comm.authid = defaults.authid;
        self.comm.secret = defaults.secret;
        self.comm.authmethod = defaults.authmethod;
        self.comm.max_retries = defaults.max_retries;
        self.comm.initial_retry_delay = defaults.initial_retry_delay;
        self.comm.max_retry_delay = defaults.max_retry_delay;
        self.comm.retry_delay_growth = defaults.retry_delay_growth;
    }

    pub fn registry(&self) -> TargetRegistry {
        let registry = TargetRegistry::new();
        for target in &self.targets {
            registry.insert(Target::new(target.id.clone(), target.authid.clone()));
        }
        registry
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            comm: CommSettings::default(),
            targets: vec![
                TargetSettings {
                    id: "pack1".to_string(),
                    authid: "DOG-1E5".to_string(),
                },
                TargetSettings {
                    id: "pack2".to_string(),
                    authid: "DOG-4S1".to_string(),
                },
            ],
            keys: KeySteps::default(),
        }
    }
}
