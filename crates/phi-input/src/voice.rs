//! Voice phrase grammar
//!
//! Recognized phrases have the form `pack <id> <action>`. The id is
//! whatever the recognizer heard for "one" or "two".

use serde::{Deserialize, Serialize};

use phi_pack::{CommandRouter, Motion, Operation, Outcome};

use crate::error::InputError;
use crate::Result;

/// Map a spoken or typed id to a target id
pub fn target_for_word(word: &str) -> Option<&'static str> {
    match word.trim().to_lowercase().as_str() {
        "one" | "1" | "won" | "pack1" => Some("pack1"),
        "two" | "to" | "too" | "2" | "pack2" => Some("pack2"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceAction {
    Walk,
    Run,
    WalkLeft,
    WalkRight,
    RunLeft,
    RunRight,
    ChaseTail,
    TurnRight,
    Home,
    CenterHead,
    Stop,
}

/// One command in an action's expansion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceStep {
    Call(Operation),
    Vector(Motion),
}

impl VoiceAction {
    fn parse(words: &[&str]) -> Option<Self> {
        let action = match words {
            ["walk"] => VoiceAction::Walk,
            ["run"] => VoiceAction::Run,
            ["walk", "left"] => VoiceAction::WalkLeft,
            ["walk", "right"] => VoiceAction::WalkRight,
            ["run", "left"] => VoiceAction::RunLeft,
            ["run", "right"] => VoiceAction::RunRight,
            ["chase", "tail"] => VoiceAction::ChaseTail,
            ["turn", "right"] => VoiceAction::TurnRight,
            ["home"] => VoiceAction::Home,
            ["center", "head"] => VoiceAction::CenterHead,
            ["stop"] => VoiceAction::Stop,
            _ => return None,
        };
        Some(action)
    }

    /// Commands sent, in order
    pub fn steps(&self) -> Vec<VoiceStep> {
        use VoiceStep::{Call, Vector};

        let drive = |linear, angular| vec![Call(Operation::Watch), Vector(Motion::new(linear, angular))];

        match self {
            VoiceAction::Walk => drive(3.0, 0.0),
            VoiceAction::Run => drive(8.0, 0.0),
            VoiceAction::WalkLeft => drive(3.0, 0.2),
            VoiceAction::WalkRight => drive(3.0, -0.2),
            VoiceAction::RunLeft => drive(8.0, 0.2),
            VoiceAction::RunRight => drive(8.0, -0.2),
            VoiceAction::ChaseTail => drive(0.0, 0.9),
            VoiceAction::TurnRight => drive(0.0, -0.9),
            VoiceAction::Home => vec![Call(Operation::StopWatch), Call(Operation::Zero)],
            VoiceAction::CenterHead => vec![Call(Operation::CenterHead)],
            VoiceAction::Stop => vec![Call(Operation::StopWatch)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCommand {
    pub target: String,
    pub action: VoiceAction,
}

impl VoiceCommand {
    pub fn parse(phrase: &str) -> Result<Self> {
        let lowered = phrase.trim().to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();

        let unknown = || InputError::UnknownPhrase(phrase.trim().to_string());

        match words.as_slice() {
            ["pack", id, rest @ ..] => {
                let target = target_for_word(id).ok_or_else(unknown)?;
                let action = VoiceAction::parse(rest).ok_or_else(unknown)?;
                Ok(Self {
                    target: target.to_string(),
                    action,
                })
            }
            _ => Err(unknown()),
        }
    }

    /// Send the action's commands to the target, in order
    pub async fn execute(&self, router: &CommandRouter) -> Vec<Outcome> {
        let mut outcomes = Vec::new();

        for step in self.action.steps() {
            let outcome = match step {
                VoiceStep::Call(op) => router.invoke(&self.target, op, Vec::new()).await,
                VoiceStep::Vector(motion) => router.set_vector(&self.target, motion).await,
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phi_log::LogSink;
    use phi_pack::recording::RecordingCaller;
    use phi_pack::TargetRegistry;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_target_words() {
        assert_eq!(target_for_word("one"), Some("pack1"));
        assert_eq!(target_for_word("Won"), Some("pack1"));
        assert_eq!(target_for_word("to"), Some("pack2"));
        assert_eq!(target_for_word("2"), Some("pack2"));
        assert_eq!(target_for_word("three"), None);
    }

    #[test]
    fn test_parse_phrases() {
        let cmd = VoiceCommand::parse("Pack one walk left").unwrap();
        assert_eq!(cmd.target, "pack1");
        assert_eq!(cmd.action, VoiceAction::WalkLeft);

        let cmd = VoiceCommand::parse("pack to  chase tail").unwrap();
        assert_eq!(cmd.target, "pack2");
        assert_eq!(cmd.action, VoiceAction::ChaseTail);

        assert_eq!(
            VoiceCommand::parse("pack 1 stop").unwrap().action,
            VoiceAction::Stop
        );
    }

    #[test]
    fn test_unknown_phrases() {
        for phrase in ["pack one fly", "pack nine walk", "walk", "", "pack one"] {
            assert!(matches!(
                VoiceCommand::parse(phrase),
                Err(InputError::UnknownPhrase(_))
            ));
        }
    }

    #[test]
    fn test_home_expansion() {
        assert_eq!(
            VoiceAction::Home.steps(),
            vec![
                VoiceStep::Call(Operation::StopWatch),
                VoiceStep::Call(Operation::Zero)
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_run_right() {
        let sink = LogSink::new();
        let router = CommandRouter::new(TargetRegistry::with_defaults(), sink);
        let caller = Arc::new(RecordingCaller::new());
        router.attach(caller.clone());
        router.registry().mark_joined("DOG-4S1", 9, None);

        let cmd = VoiceCommand::parse("pack two run right").unwrap();
        let outcomes = cmd.execute(&router).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            caller.calls(),
            vec![
                ("pack2.watch".to_string(), vec![]),
                ("pack2.set_vector".to_string(), vec![json!(8.0), json!(-0.2)]),
            ]
        );
    }
}
