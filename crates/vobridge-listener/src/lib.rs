//! vobridge listener crate - narrator phrase polling and its on/off state machine.
//!
//! The `ListenerController` follows the narrator enablement signal through
//! two states, Idle and Active. While Active it owns exactly one
//! `PollingTask`, which queries the narrator on a fixed cadence and publishes
//! each new phrase into a shared `PhraseSlot` read by the HTTP layer.

pub mod controller;
pub mod phrase;
pub mod poller;

pub use controller::{ListenerController, ListenerState, Transition};
pub use phrase::PhraseSlot;
pub use poller::{PollTiming, PollingLoop, PollingTask};
