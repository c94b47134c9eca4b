//! Phi Input
//!
//! Operator input turned into pack commands:
//! - Keyboard: one bound target at a time, W/S/A/D drive, arrows move the head
//! - Voice: `pack <id> <action>` phrases expand to command sequences
//!
//! Speech recognition itself happens elsewhere; this crate only sees text.

mod binder;
mod error;
mod keys;
mod voice;

pub use binder::InputBinder;
pub use error::InputError;
pub use keys::{Key, KeySteps};
pub use voice::{target_for_word, VoiceAction, VoiceCommand, VoiceStep};

pub type Result<T> = std::result::Result<T, InputError>;
