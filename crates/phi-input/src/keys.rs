//! Control keys and their step sizes

use serde::{Deserialize, Serialize};

use phi_pack::{Motion, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Forward
    W,
    /// Backward
    S,
    /// Turn left
    A,
    /// Turn right
    D,
    /// Head left
    Left,
    /// Head right
    Right,
    /// Head up
    Up,
    /// Head down
    Down,
}

impl Key {
    /// Letter keys, either case
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'w' => Some(Key::W),
            's' => Some(Key::S),
            'a' => Some(Key::A),
            'd' => Some(Key::D),
            _ => None,
        }
    }

    /// DOM `keyCode` values
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            87 => Some(Key::W),
            83 => Some(Key::S),
            65 => Some(Key::A),
            68 => Some(Key::D),
            37 => Some(Key::Left),
            39 => Some(Key::Right),
            38 => Some(Key::Up),
            40 => Some(Key::Down),
            _ => None,
        }
    }

    pub fn moves_body(&self) -> bool {
        matches!(self, Key::W | Key::S | Key::A | Key::D)
    }
}

/// Increment applied per key press
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeySteps {
    pub linear: f64,
    pub angular: f64,
    pub head: f64,
}

impl KeySteps {
    /// Motion and pose after pressing `key`
    pub fn apply(&self, key: Key, motion: Motion, pose: Pose) -> (Motion, Pose) {
        let mut motion = motion;
        let mut pose = pose;

        match key {
            Key::W => motion.linear += self.linear,
            Key::S => motion.linear -= self.linear,
            Key::A => motion.angular += self.angular,
            Key::D => motion.angular -= self.angular,
            Key::Left => pose.yaw += self.head,
            Key::Right => pose.yaw -= self.head,
            Key::Up => pose.pitch += self.head,
            Key::Down => pose.pitch -= self.head,
        }

        (motion, pose)
    }
}

impl Default for KeySteps {
    fn default() -> Self {
        Self {
            linear: 0.5,
            angular: 0.08,
            head: 1.0,
        }
    }
}
