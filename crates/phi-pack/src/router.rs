//! Command Router
//!
//! Turns a `(target, operation, args)` triple into one remote call and
//! exactly one log outcome on the target's channel. Precondition and
//! remote failures never surface as errors to the caller.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;

use phi_log::{LogSink, SYSTEM_CHANNEL};
use phi_wamp::{CallResult, SessionHandle, WampError};

use crate::operation::{CommandRequest, Operation};
use crate::shape::{capitalize, describe_call, is_truthy, shape, LINEAR_PRECISION};
use crate::target::{Motion, Pose, TargetRegistry};
use crate::Result;

/// Something that can issue RPCs on the open session
#[async_trait]
pub trait RemoteCaller: Send + Sync {
    async fn call(&self, procedure: &str, args: Vec<Value>) -> phi_wamp::Result<CallResult>;
}

#[async_trait]
impl RemoteCaller for SessionHandle {
    async fn call(&self, procedure: &str, args: Vec<Value>) -> phi_wamp::Result<CallResult> {
        SessionHandle::call(self, procedure, args).await
    }
}

/// How a routed command ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Precondition failed; nothing was sent
    Skipped,
    /// Truthy result
    Executed(Value),
    /// Falsy result
    Refused,
    /// Remote error, carrying the logged message
    Failed(String),
}

pub struct CommandRouter {
    session: Arc<RwLock<Option<Arc<dyn RemoteCaller>>>>,
    registry: TargetRegistry,
    sink: LogSink,
}

impl CommandRouter {
    pub fn new(registry: TargetRegistry, sink: LogSink) -> Self {
        Self {
            session: Arc::new(RwLock::new(None)),
            registry,
            sink,
        }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Route calls through `caller` from now on
    pub fn attach(&self, caller: Arc<dyn RemoteCaller>) {
        *self.session.write() = Some(caller);
    }

    /// Stop routing; subsequent checks fail with "Not connected to server!"
    pub fn detach(&self) {
        *self.session.write() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.session.read().is_some()
    }

    /// The caller to use for `target`, logging one warning when there is none
    fn ready(&self, target: &str) -> Option<Arc<dyn RemoteCaller>> {
        let Some(caller) = self.session.read().clone() else {
            self.sink.warn(target, "Not connected to server!");
            return None;
        };

        match self.registry.get(target) {
            Ok(t) if t.connected => Some(caller),
            Ok(_) => {
                self.sink.warn(target, format!("{} is not connected.", target));
                None
            }
            Err(_) => {
                self.sink.warn(SYSTEM_CHANNEL, format!("Unknown robot {}.", target));
                None
            }
        }
    }

    /// True when a call to `target` may be issued
    pub fn check(&self, target: &str) -> bool {
        self.ready(target).is_some()
    }

    pub async fn invoke(&self, target: &str, operation: Operation, args: Vec<Value>) -> Outcome {
        match self.ready(target) {
            Some(caller) => self.dispatch(caller.as_ref(), target, operation, args).await,
            None => Outcome::Skipped,
        }
    }

    pub async fn set_vector(&self, target: &str, motion: Motion) -> Outcome {
        let Some(caller) = self.ready(target) else {
            return Outcome::Skipped;
        };
        let motion = motion.shaped();
        let _ = self.registry.set_motion(target, motion);

        let args = vec![json!(motion.linear), json!(motion.angular)];
        self.dispatch(caller.as_ref(), target, Operation::SetVector, args).await
    }

    pub async fn set_head(&self, target: &str, pose: Pose) -> Outcome {
        let Some(caller) = self.ready(target) else {
            return Outcome::Skipped;
        };
        let pose = pose.shaped();
        let _ = self.registry.set_pose(target, pose);

        let args = vec![json!(pose.yaw), json!(pose.pitch)];
        self.dispatch(caller.as_ref(), target, Operation::SetHead, args).await
    }

    pub async fn lift_leg(&self, target: &str, leg: u8, lift: f64, ms: u64) -> Outcome {
        let args = vec![json!(leg), json!(shape(lift, LINEAR_PRECISION)), json!(ms)];
        self.invoke(target, Operation::LiftLeg, args).await
    }

    pub async fn target_point(&self, target: &str, leg: u8, point: [f64; 3], ms: u64) -> Outcome {
        let point: Vec<f64> = point.iter().map(|v| shape(*v, LINEAR_PRECISION)).collect();
        let args = vec![json!(leg), json!(point), json!(ms)];
        self.invoke(target, Operation::TargetPoint, args).await
    }

    /// Validate and route a request
    ///
    /// Only malformed arguments are an error; every other failure is an
    /// [`Outcome`].
    pub async fn execute(&self, request: &CommandRequest) -> Result<Outcome> {
        let target = request.target.as_str();

        let outcome = match request.operation {
            Operation::SetVector => {
                let motion = Motion::new(request.number(0)?, request.number(1)?);
                self.set_vector(target, motion).await
            }
            Operation::SetHead => {
                let pose = Pose::new(request.number(0)?, request.number(1)?);
                self.set_head(target, pose).await
            }
            Operation::LiftLeg => {
                let leg = leg_index(request)?;
                let ms = duration_ms(request, 2)?;
                self.lift_leg(target, leg, request.number(1)?, ms).await
            }
            Operation::TargetPoint => {
                let leg = leg_index(request)?;
                let point = request
                    .args
                    .get(1)
                    .and_then(Value::as_array)
                    .filter(|p| p.len() == 3)
                    .and_then(|p| {
                        Some([p[0].as_f64()?, p[1].as_f64()?, p[2].as_f64()?])
                    })
                    .ok_or_else(|| request.invalid("point must be [x, y, z]".to_string()))?;
                let ms = duration_ms(request, 2)?;
                self.target_point(target, leg, point, ms).await
            }
            op => {
                if !request.args.is_empty() {
                    return Err(request.invalid(format!("takes no arguments, got {}", request.args.len())));
                }
                self.invoke(target, op, Vec::new()).await
            }
        };

        Ok(outcome)
    }

    async fn dispatch(
        &self,
        caller: &dyn RemoteCaller,
        target: &str,
        operation: Operation,
        args: Vec<Value>,
    ) -> Outcome {
        let procedure = operation.procedure(target);
        let description = describe_call(operation.name(), &args);

        tracing::debug!(procedure = %procedure, "Calling robot");

        match caller.call(&procedure, args).await {
            Ok(result) => {
                let value = result.value();
                if is_truthy(&value) {
                    self.sink.info(target, format!("Executed {}.", description));
                    Outcome::Executed(value)
                } else {
                    self.sink.warn(target, format!("Unable to execute {}.", description));
                    Outcome::Refused
                }
            }
            Err(WampError::Remote(remote)) => {
                let message = capitalize(remote.message().unwrap_or(&remote.uri));
                self.sink.error(target, format!("{}.", message));
                Outcome::Failed(message)
            }
            Err(e) => {
                let message = capitalize(&e.to_string());
                self.sink.error(target, format!("{}.", message));
                Outcome::Failed(message)
            }
        }
    }
}

fn leg_index(request: &CommandRequest) -> Result<u8> {
    request
        .args
        .first()
        .and_then(Value::as_u64)
        .filter(|leg| *leg < 4)
        .map(|leg| leg as u8)
        .ok_or_else(|| request.invalid("leg must be 0-3".to_string()))
}

fn duration_ms(request: &CommandRequest, index: usize) -> Result<u64> {
    request
        .args
        .get(index)
        .and_then(Value::as_u64)
        .ok_or_else(|| request.invalid(format!("argument {} must be a duration in ms", index + 1)))
}

impl Clone for CommandRouter {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            registry: self.registry.clone(),
            sink: self.sink.clone(),
        }
    }
}
