//! Phi Pack Control
//!
//! Everything between an operator intent and a robot RPC:
//! - Target registry with presence-derived connectivity
//! - Command Router: connectivity check → `<target>.<operation>` call →
//!   one normalized log outcome
//! - Numeric argument shaping (fixed precision, near-zero snap)
//!
//! Router outcomes are reported on the target's own log channel.

mod error;
mod operation;
mod presence;
mod router;
mod shape;
mod target;

#[cfg(any(test, feature = "testing"))]
pub mod recording;

pub use error::PackError;
pub use operation::{CommandRequest, Operation};
pub use presence::{leave_session, reconcile, JoinNotice, ON_JOIN, ON_LEAVE};
pub use router::{CommandRouter, Outcome, RemoteCaller};
pub use shape::{
    describe_call, is_truthy, shape, ANGULAR_PRECISION, LINEAR_PRECISION, POSE_PRECISION,
    SNAP_THRESHOLD,
};
pub use target::{Motion, Pose, Target, TargetRegistry};

pub type Result<T> = std::result::Result<T, PackError>;
