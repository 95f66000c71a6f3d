//! VoiceOver adapters driven through `osascript`.
//!
//! Phrase queries and the primary action use VoiceOver's AppleScript
//! dictionary. Key events go through JavaScript for Automation so that the
//! key-down and key-up halves can be posted as separate Quartz events on the
//! HID event tap.
//!
//! On non-macOS hosts every call fails with `AutomationError::Unavailable`.

use std::time::Duration;

use async_trait::async_trait;

use vobridge_core::types::{KeyCode, KeyEvent};

use crate::error::{AutomationError, QueryError};
use crate::process::{run_osascript, ScriptLanguage};
use crate::{InputInjector, NarrationQuery};

const LAST_PHRASE_SCRIPT: &str = r#"tell application "VoiceOver"
    return content of last phrase
end tell"#;

const PERFORM_ACTION_SCRIPT: &str = r#"tell application "VoiceOver"
    tell vo cursor
        perform action
    end tell
end tell"#;

/// Build the JXA source that posts one keyboard event.
fn key_event_script(key: KeyCode, event: KeyEvent) -> String {
    format!(
        "ObjC.import('CoreGraphics');\n\
         var source = $.CGEventSourceCreate($.kCGEventSourceStateHIDSystemState);\n\
         $.CGEventPost($.kCGHIDEventTap, $.CGEventCreateKeyboardEvent(source, {}, {}));",
        key.0,
        event.is_down()
    )
}

/// Reads VoiceOver's last spoken phrase.
#[derive(Debug, Clone)]
pub struct VoiceOverQuery {
    timeout: Duration,
}

impl VoiceOverQuery {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl NarrationQuery for VoiceOverQuery {
    async fn latest_phrase(&self) -> Result<String, QueryError> {
        let text = run_osascript(ScriptLanguage::AppleScript, LAST_PHRASE_SCRIPT, self.timeout).await?;
        if text.is_empty() {
            return Err(QueryError::Empty);
        }
        Ok(text)
    }
}

/// Posts arrow keys and triggers the VoiceOver cursor action.
#[derive(Debug, Clone)]
pub struct VoiceOverInjector {
    timeout: Duration,
}

impl VoiceOverInjector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl InputInjector for VoiceOverInjector {
    async fn post_key(&self, key: KeyCode, event: KeyEvent) -> Result<(), AutomationError> {
        let script = key_event_script(key, event);
        run_osascript(ScriptLanguage::JavaScript, &script, self.timeout).await?;
        tracing::trace!(key = key.0, ?event, "Key event posted");
        Ok(())
    }

    async fn perform_primary_action(&self) -> Result<(), AutomationError> {
        run_osascript(ScriptLanguage::AppleScript, PERFORM_ACTION_SCRIPT, self.timeout).await?;
        Ok(())
    }
}
