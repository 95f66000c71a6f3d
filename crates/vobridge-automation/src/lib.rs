//! vobridge automation crate - ports to the OS narrator and input system.
//!
//! Defines the three collaborator traits the listener and HTTP layer depend
//! on (`NarrationQuery`, `InputInjector`, `EnablementSignal`), the macOS
//! adapters that drive VoiceOver through `osascript`, and mock
//! implementations for tests.

pub mod error;
pub mod mock;
pub mod process;
pub mod signal;
pub mod voiceover;

use async_trait::async_trait;
use tokio::sync::broadcast;

use vobridge_core::types::{KeyCode, KeyEvent};

pub use error::{AutomationError, QueryError};
pub use mock::{InjectorCall, MockInputInjector, MockNarrationQuery};
pub use signal::{ManualEnablementSignal, VoiceOverStatusMonitor};
pub use voiceover::{VoiceOverInjector, VoiceOverQuery};

/// Source of the narrator's most recent utterance.
///
/// Implementations perform a single query per call; retry policy belongs to
/// the caller.
#[async_trait]
pub trait NarrationQuery: Send + Sync {
    /// Return the text the narrator last spoke.
    ///
    /// `Err(QueryError::Empty)` means the query ran but produced no usable
    /// text, which callers handle separately from a failed query.
    async fn latest_phrase(&self) -> Result<String, QueryError>;
}

/// Synthetic input and narrator commands.
#[async_trait]
pub trait InputInjector: Send + Sync {
    /// Post one half of a key press for the given virtual key.
    async fn post_key(&self, key: KeyCode, event: KeyEvent) -> Result<(), AutomationError>;

    /// Ask the narrator to perform the primary action on its cursor.
    async fn perform_primary_action(&self) -> Result<(), AutomationError>;
}

/// Process-wide "narrator is on" flag with change notifications.
///
/// Subscribers may see the same value twice in a row.
pub trait EnablementSignal: Send + Sync {
    /// Current value of the flag.
    fn current(&self) -> bool;

    /// Receive every subsequent notification.
    fn subscribe(&self) -> broadcast::Receiver<bool>;
}
