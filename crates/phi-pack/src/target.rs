//! Targets and the target registry

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PackError;
use crate::shape::{shape, ANGULAR_PRECISION, LINEAR_PRECISION, POSE_PRECISION};
use crate::Result;

/// Commanded motion vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub linear: f64,
    pub angular: f64,
}

impl Motion {
    pub fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }

    pub fn shaped(&self) -> Self {
        Self {
            linear: shape(self.linear, LINEAR_PRECISION),
            angular: shape(self.angular, ANGULAR_PRECISION),
        }
    }
}

/// Commanded head pose
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub yaw: f64,
    pub pitch: f64,
}

impl Pose {
    pub fn new(yaw: f64, pitch: f64) -> Self {
        Self { yaw, pitch }
    }

    pub fn shaped(&self) -> Self {
        Self {
            yaw: shape(self.yaw, POSE_PRECISION),
            pitch: shape(self.pitch, POSE_PRECISION),
        }
    }
}

/// One addressable robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Procedure prefix and log channel, e.g. `pack1`
    pub id: String,
    /// Auth id the robot joins the realm with
    pub authid: String,
    pub connected: bool,
    /// WAMP session id recorded at join
    pub session: Option<u64>,
    /// Last-known network address
    pub address: Option<String>,
    pub motion: Motion,
    pub pose: Pose,
}

impl Target {
    pub fn new(id: impl Into<String>, authid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authid: authid.into(),
            connected: false,
            session: None,
            address: None,
            motion: Motion::default(),
            pose: Pose::default(),
        }
    }
}

pub struct TargetRegistry {
    targets: Arc<RwLock<HashMap<String, Target>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            targets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// `pack1` and `pack2` with their factory auth ids
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.insert(Target::new("pack1", "DOG-1E5"));
        registry.insert(Target::new("pack2", "DOG-4S1"));
        registry
    }

    pub fn insert(&self, target: Target) {
        tracing::debug!(target_id = %target.id, authid = %target.authid, "Registered target");
        self.targets.write().insert(target.id.clone(), target);
    }

    pub fn get(&self, id: &str) -> Result<Target> {
        self.targets
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| PackError::UnknownTarget(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.targets.read().contains_key(id)
    }

    /// All targets ordered by id
    pub fn list(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = self.targets.read().values().cloned().collect();
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        targets
    }

    pub fn ids(&self) -> Vec<String> {
        self.list().into_iter().map(|t| t.id).collect()
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.targets
            .read()
            .get(id)
            .map(|t| t.connected)
            .unwrap_or(false)
    }

    /// Apply `f` to one target under the write lock
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Target) -> R) -> Result<R> {
        let mut targets = self.targets.write();
        let target = targets
            .get_mut(id)
            .ok_or_else(|| PackError::UnknownTarget(id.to_string()))?;
        Ok(f(target))
    }

    pub fn set_motion(&self, id: &str, motion: Motion) -> Result<()> {
        self.update(id, |t| t.motion = motion)
    }

    pub fn set_pose(&self, id: &str, pose: Pose) -> Result<()> {
        self.update(id, |t| t.pose = pose)
    }

    /// Forget every connectivity flag and recorded session
    pub fn clear_connectivity(&self) {
        for target in self.targets.write().values_mut() {
            target.connected = false;
            target.session = None;
        }
    }

    /// Record a joined peer; returns the matching target id
    pub fn mark_joined(&self, authid: &str, session: u64, address: Option<String>) -> Option<String> {
        let mut targets = self.targets.write();
        let target = targets.values_mut().find(|t| t.authid == authid)?;

        target.connected = true;
        target.session = Some(session);
        if address.is_some() {
            target.address = address;
        }

        tracing::info!(target_id = %target.id, session_id = session, "Target joined");
        Some(target.id.clone())
    }

    /// Clear the target that joined with `session`; returns its id
    pub fn mark_left(&self, session: u64) -> Option<String> {
        let mut targets = self.targets.write();
        let target = targets
            .values_mut()
            .find(|t| t.session == Some(session))?;

        target.connected = false;
        target.session = None;

        tracing::info!(target_id = %target.id, session_id = session, "Target left");
        Some(target.id.clone())
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Clone for TargetRegistry {
    fn clone(&self) -> Self {
        Self {
            targets: Arc::clone(&self.targets),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let registry = TargetRegistry::with_defaults();
        assert_eq!(registry.ids(), vec!["pack1", "pack2"]);
        assert_eq!(registry.get("pack2").unwrap().authid, "DOG-4S1");
        assert!(!registry.is_connected("pack1"));
        assert!(matches!(
            registry.get("pack3"),
            Err(PackError::UnknownTarget(_))
        ));
    }

    #[test]
    fn test_join_and_leave() {
        let registry = TargetRegistry::with_defaults();

        let joined = registry.mark_joined("DOG-1E5", 101, Some("tcp4://10.0.0.5:51234".to_string()));
        assert_eq!(joined.as_deref(), Some("pack1"));
        assert!(registry.is_connected("pack1"));
        assert_eq!(registry.get("pack1").unwrap().session, Some(101));

        // Unrecognized identities are ignored
        assert_eq!(registry.mark_joined("Zeus", 102, None), None);

        // A leave for some other session changes nothing
        assert_eq!(registry.mark_left(999), None);
        assert!(registry.is_connected("pack1"));

        assert_eq!(registry.mark_left(101).as_deref(), Some("pack1"));
        assert!(!registry.is_connected("pack1"));
        // Address survives for display
        assert_eq!(
            registry.get("pack1").unwrap().address.as_deref(),
            Some("tcp4://10.0.0.5:51234")
        );
    }

    #[test]
    fn test_clear_connectivity() {
        let registry = TargetRegistry::with_defaults();
        registry.mark_joined("DOG-1E5", 1, None);
        registry.mark_joined("DOG-4S1", 2, None);

        registry.clear_connectivity();

        for target in registry.list() {
            assert!(!target.connected);
            assert_eq!(target.session, None);
        }
    }

    #[test]
    fn test_clones_share_state() {
        let registry = TargetRegistry::with_defaults();
        let other = registry.clone();

        other.set_motion("pack1", Motion::new(0.5, 0.08)).unwrap();
        assert_eq!(registry.get("pack1").unwrap().motion, Motion::new(0.5, 0.08));
        assert!(registry.set_pose("pack9", Pose::default()).is_err());
    }

    #[test]
    fn test_shaped() {
        let motion = Motion::new(0.1 + 0.2, 0.08 * 3.0).shaped();
        assert_eq!(motion, Motion::new(0.3, 0.24));

        let pose = Pose::new(1.04, -0.0004).shaped();
        assert_eq!(pose, Pose::new(1.0, 0.0));
    }
}
