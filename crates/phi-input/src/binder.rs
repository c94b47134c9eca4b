//! Input Binder
//!
//! Keyboard control for one target at a time. Each recognized key edits
//! the bound target's commanded motion or pose; the router is only called
//! when the shaped value actually changes.

use parking_lot::RwLock;
use std::sync::Arc;

use phi_log::{LogSink, SYSTEM_CHANNEL};
use phi_pack::{CommandRouter, Outcome};

use crate::error::InputError;
use crate::keys::{Key, KeySteps};
use crate::Result;

pub struct InputBinder {
    bound: Arc<RwLock<Option<String>>>,
    steps: Arc<RwLock<KeySteps>>,
    router: CommandRouter,
    sink: LogSink,
}

impl InputBinder {
    pub fn new(router: CommandRouter, sink: LogSink) -> Self {
        Self {
            bound: Arc::new(RwLock::new(None)),
            steps: Arc::new(RwLock::new(KeySteps::default())),
            router,
            sink,
        }
    }

    pub fn set_steps(&self, steps: KeySteps) {
        *self.steps.write() = steps;
    }

    /// Target currently under keyboard control
    pub fn bound(&self) -> Option<String> {
        self.bound.read().clone()
    }

    /// Put `target` under keyboard control, replacing any previous binding
    pub fn bind(&self, target: &str) -> Result<()> {
        if !self.router.registry().contains(target) {
            return Err(InputError::UnknownTarget(target.to_string()));
        }

        let previous = self.bound.write().replace(target.to_string());
        tracing::debug!(target_id = %target, previous = ?previous, "Keys bound");
        self.sink.info(SYSTEM_CHANNEL, "Binded keys.");
        Ok(())
    }

    /// Release keyboard control; returns whether a binding was removed
    pub fn unbind(&self) -> bool {
        let removed = self.bound.write().take().is_some();
        if removed {
            self.sink.info(SYSTEM_CHANNEL, "Unbinded keys.");
        }
        removed
    }

    /// Handle one key press
    ///
    /// Returns the router outcome when a command was sent, `None` when the
    /// key changed nothing or no target is bound.
    pub async fn press(&self, key: Key) -> Option<Outcome> {
        let target = self.bound()?;
        let current = self.router.registry().get(&target).ok()?;
        let steps = *self.steps.read();

        let (motion, pose) = steps.apply(key, current.motion, current.pose);
        let motion = motion.shaped();
        let pose = pose.shaped();

        if motion != current.motion {
            // Commit before sending so repeated presses accumulate
            let _ = self.router.registry().set_motion(&target, motion);
            Some(self.router.set_vector(&target, motion).await)
        } else if pose != current.pose {
            let _ = self.router.registry().set_pose(&target, pose);
            Some(self.router.set_head(&target, pose).await)
        } else {
            None
        }
    }
}

impl Clone for InputBinder {
    fn clone(&self) -> Self {
        Self {
            bound: Arc::clone(&self.bound),
            steps: Arc::clone(&self.steps),
            router: self.router.clone(),
            sink: self.sink.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phi_pack::recording::RecordingCaller;
    use phi_pack::{Motion, Pose, TargetRegistry};
    use serde_json::json;

    fn binder() -> (InputBinder, Arc<RecordingCaller>, LogSink) {
        let sink = LogSink::new();
        let router = CommandRouter::new(TargetRegistry::with_defaults(), sink.clone());
        let caller = Arc::new(RecordingCaller::new());
        router.attach(caller.clone());
        router.registry().mark_joined("DOG-1E5", 1, None);
        router.registry().mark_joined("DOG-4S1", 2, None);
        (InputBinder::new(router, sink.clone()), caller, sink)
    }

    #[tokio::test]
    async fn test_rebind_moves_control() {
        let (binder, caller, _sink) = binder();

        binder.bind("pack1").unwrap();
        binder.bind("pack2").unwrap();
        assert_eq!(binder.bound().as_deref(), Some("pack2"));

        binder.press(Key::W).await;

        assert_eq!(
            caller.calls(),
            vec![("pack2.set_vector".to_string(), vec![json!(0.5), json!(0.0)])]
        );
        let registry = binder.router.registry();
        assert_eq!(registry.get("pack1").unwrap().motion, Motion::default());
        assert_eq!(registry.get("pack2").unwrap().motion, Motion::new(0.5, 0.0));
    }

    #[tokio::test]
    async fn test_presses_accumulate() {
        let (binder, caller, _sink) = binder();
        binder.bind("pack1").unwrap();

        for _ in 0..3 {
            binder.press(Key::A).await;
        }
        binder.press(Key::D).await;

        let sent: Vec<Vec<serde_json::Value>> = caller.calls().into_iter().map(|(_, a)| a).collect();
        assert_eq!(
            sent,
            vec![
                vec![json!(0.0), json!(0.08)],
                vec![json!(0.0), json!(0.16)],
                vec![json!(0.0), json!(0.24)],
                vec![json!(0.0), json!(0.16)],
            ]
        );
    }

    #[tokio::test]
    async fn test_head_keys_call_set_head() {
        let (binder, caller, _sink) = binder();
        binder.bind("pack1").unwrap();

        let outcome = binder.press(Key::Up).await;

        assert_eq!(outcome, Some(Outcome::Executed(json!(true))));
        assert_eq!(
            caller.calls(),
            vec![("pack1.set_head".to_string(), vec![json!(0.0), json!(1.0)])]
        );
        assert_eq!(
            binder.router.registry().get("pack1").unwrap().pose,
            Pose::new(0.0, 1.0)
        );
    }

    #[tokio::test]
    async fn test_unchanged_value_sends_nothing() {
        let (binder, caller, _sink) = binder();
        binder.set_steps(KeySteps {
            linear: 0.0001,
            ..KeySteps::default()
        });
        binder.bind("pack1").unwrap();

        // Step vanishes in rounding, so nothing changes
        assert_eq!(binder.press(Key::W).await, None);
        assert!(caller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unbind_is_idempotent() {
        let (binder, caller, sink) = binder();
        binder.bind("pack1").unwrap();

        assert!(binder.unbind());
        assert!(!binder.unbind());
        assert_eq!(binder.press(Key::W).await, None);
        assert!(caller.calls().is_empty());

        let messages: Vec<String> = sink
            .events(SYSTEM_CHANNEL)
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["Binded keys.", "Unbinded keys."]);
    }

    #[test]
    fn test_bind_unknown_target() {
        let (binder, _caller, _sink) = binder();
        assert!(matches!(
            binder.bind("pack3"),
            Err(InputError::UnknownTarget(_))
        ));
        assert_eq!(binder.bound(), None);
    }
}
