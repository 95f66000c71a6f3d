//! Single-slot store for the latest narrator phrase.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use vobridge_core::types::Phrase;

#[derive(Debug, Default)]
struct SlotState {
    latest: Option<Phrase>,
    published: u64,
}

/// Shared latest-phrase slot.
///
/// Cloning shares the slot. Only the active polling task writes to it; any
/// number of readers see either a whole previously published phrase or none.
/// A published phrase is never cleared.
#[derive(Debug, Clone, Default)]
pub struct PhraseSlot {
    inner: Arc<RwLock<SlotState>>,
}

impl PhraseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SlotState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// The most recently published phrase, if any.
    pub fn latest(&self) -> Option<Phrase> {
        self.read().latest.clone()
    }

    /// Text of the most recently published phrase, if any.
    pub fn latest_text(&self) -> Option<String> {
        self.read().latest.as_ref().map(|p| p.text.clone())
    }

    /// Number of phrases published since the slot was created.
    pub fn publish_count(&self) -> u64 {
        self.read().published
    }

    /// Replace the current phrase with `text` and return the stored record.
    pub fn publish(&self, text: String) -> Phrase {
        let mut state = self.write();
        state.published += 1;
        let phrase = Phrase {
            text,
            observed_at: Utc::now(),
            sequence: state.published,
        };
        state.latest = Some(phrase.clone());
        phrase
    }
}
