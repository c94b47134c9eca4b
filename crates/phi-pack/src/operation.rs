//! Robot operations
//!
//! Every operation is exposed by each robot as `<target>.<name>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::PackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `(linear, angular)`
    SetVector,
    /// `(yaw, pitch)`
    SetHead,
    Stop,
    Pushup,
    /// Start following the motion vector
    Watch,
    StopWatch,
    CenterHead,
    /// Return all servos to their zero position
    Zero,
    /// `(leg, lift, ms)`
    LiftLeg,
    /// `(leg, [x, y, z], ms)`
    TargetPoint,
    ReadRfid,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::SetVector,
        Operation::SetHead,
        Operation::Stop,
        Operation::Pushup,
        Operation::Watch,
        Operation::StopWatch,
        Operation::CenterHead,
        Operation::Zero,
        Operation::LiftLeg,
        Operation::TargetPoint,
        Operation::ReadRfid,
    ];

    /// Procedure name without the target prefix
    pub fn name(&self) -> &'static str {
        match self {
            Operation::SetVector => "set_vector",
            Operation::SetHead => "set_head",
            Operation::Stop => "stop",
            Operation::Pushup => "pushup",
            Operation::Watch => "watch",
            Operation::StopWatch => "stop_watch",
            Operation::CenterHead => "center_head",
            Operation::Zero => "zero",
            Operation::LiftLeg => "lift_leg",
            Operation::TargetPoint => "target_point",
            Operation::ReadRfid => "read_rfid",
        }
    }

    /// Number of positional arguments the robot expects
    pub fn arity(&self) -> usize {
        match self {
            Operation::SetVector | Operation::SetHead => 2,
            Operation::LiftLeg | Operation::TargetPoint => 3,
            _ => 0,
        }
    }

    pub fn procedure(&self, target: &str) -> String {
        format!("{}.{}", target, self.name())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Operation {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase().replace('-', "_");
        // `start_watch` is the robots' older name for `watch`
        if name == "start_watch" {
            return Ok(Operation::Watch);
        }
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.name() == name)
            .ok_or_else(|| PackError::UnknownOperation(s.to_string()))
    }
}

/// A transient `(target, operation, args)` triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub target: String,
    pub operation: Operation,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CommandRequest {
    pub fn new(target: impl Into<String>, operation: Operation, args: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            operation,
            args,
        }
    }

    /// Numeric argument `index`, or an arity error
    pub(crate) fn number(&self, index: usize) -> crate::Result<f64> {
        self.args
            .get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.invalid(format!("argument {} must be a number", index + 1)))
    }

    pub(crate) fn invalid(&self, reason: String) -> PackError {
        PackError::InvalidArguments {
            operation: self.operation.name().to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_names() {
        assert_eq!("set_vector".parse::<Operation>().unwrap(), Operation::SetVector);
        assert_eq!("Center-Head".parse::<Operation>().unwrap(), Operation::CenterHead);
        assert_eq!("start_watch".parse::<Operation>().unwrap(), Operation::Watch);
        assert!(matches!(
            "fly".parse::<Operation>(),
            Err(PackError::UnknownOperation(_))
        ));

        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn test_set_head_keeps_its_own_name() {
        assert_eq!(Operation::SetHead.procedure("pack2"), "pack2.set_head");
        assert_ne!(Operation::SetHead.name(), Operation::SetVector.name());
    }

    #[test]
    fn test_request_numbers() {
        let request = CommandRequest::new("pack1", Operation::SetVector, vec![json!(3), json!("x")]);
        assert_eq!(request.number(0).unwrap(), 3.0);
        assert!(matches!(
            request.number(1),
            Err(PackError::InvalidArguments { .. })
        ));
        assert!(request.number(2).is_err());
    }
}
