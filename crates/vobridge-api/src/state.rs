//! Application state shared across all route handlers.
//!
//! Passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use vobridge_automation::InputInjector;
use vobridge_listener::ListenerController;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. Handlers
/// only read from the listener; its polling task is never touched here.
#[derive(Clone)]
pub struct AppState {
    /// Phrase source and narrator status.
    pub listener: Arc<ListenerController>,
    /// Key events and the narrator primary action.
    pub injector: Arc<dyn InputInjector>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(listener: Arc<ListenerController>, injector: Arc<dyn InputInjector>) -> Self {
        Self {
            listener,
            injector,
            start_time: Instant::now(),
        }
    }
}
