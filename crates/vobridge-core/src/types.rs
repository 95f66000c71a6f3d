use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Navigation
// =============================================================================

/// Arrow-key direction a remote client can move the narrator cursor in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Virtual key code of the arrow key for this direction.
    pub fn key_code(&self) -> KeyCode {
        match self {
            Direction::Up => KeyCode::UP_ARROW,
            Direction::Down => KeyCode::DOWN_ARROW,
            Direction::Left => KeyCode::LEFT_ARROW,
            Direction::Right => KeyCode::RIGHT_ARROW,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a path segment does not name a [`Direction`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown direction: {0:?}")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    /// Exact, case-sensitive match on the lowercase names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

/// macOS virtual key code (`kVK_*` in `Events.h`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const LEFT_ARROW: KeyCode = KeyCode(0x7B);
    pub const RIGHT_ARROW: KeyCode = KeyCode(0x7C);
    pub const DOWN_ARROW: KeyCode = KeyCode(0x7D);
    pub const UP_ARROW: KeyCode = KeyCode(0x7E);
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half of a key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEvent {
    Down,
    Up,
}

impl KeyEvent {
    pub fn is_down(&self) -> bool {
        matches!(self, KeyEvent::Down)
    }
}

// =============================================================================
// Phrases
// =============================================================================

/// A narrator utterance as published by the poller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    /// Text the narrator last spoke.
    pub text: String,
    /// When the poller first observed this text.
    pub observed_at: DateTime<Utc>,
    /// Publish sequence number, starting at 1 for the first phrase.
    pub sequence: u64,
}
