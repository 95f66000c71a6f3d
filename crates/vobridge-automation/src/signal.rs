//! Enablement signal sources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use crate::process::{run_command, CommandOutput};
use crate::EnablementSignal;

const NOTIFICATION_CAPACITY: usize = 16;

/// Enablement flag set directly by the caller.
///
/// Used when the host cannot report narrator state (`--assume-enabled`) and
/// as the fake signal in tests. Every `set` notifies subscribers, including
/// repeats of the current value.
#[derive(Debug)]
pub struct ManualEnablementSignal {
    enabled: AtomicBool,
    tx: broadcast::Sender<bool>,
}

impl ManualEnablementSignal {
    pub fn new(enabled: bool) -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            enabled: AtomicBool::new(enabled),
            tx,
        }
    }

    /// Store `enabled` and notify subscribers.
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        // No subscribers is fine.
        let _ = self.tx.send(enabled);
    }
}

impl EnablementSignal for ManualEnablementSignal {
    fn current(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Samples the VoiceOver on/off preference and broadcasts changes.
///
/// Reads `com.apple.universalaccess voiceOverOnOffKey` through `defaults`.
/// A missing key or failed read counts as disabled.
pub struct VoiceOverStatusMonitor {
    source: Arc<dyn StatusSource>,
    enabled: AtomicBool,
    tx: broadcast::Sender<bool>,
    interval: Duration,
    timeout: Duration,
    shutdown: Arc<Notify>,
}

impl VoiceOverStatusMonitor {
    /// Create a monitor. Call [`refresh`](Self::refresh) once before reading
    /// `current()`, then drive it with [`run`](Self::run).
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self::with_source(interval, timeout, Arc::new(DefaultsStatus))
    }

    fn with_source(interval: Duration, timeout: Duration, source: Arc<dyn StatusSource>) -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            source,
            enabled: AtomicBool::new(false),
            tx,
            interval,
            timeout,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Sample the preference now; notify subscribers if the value changed.
    pub async fn refresh(&self) -> bool {
        let enabled = self.source.read(self.timeout).await;
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::info!(narrator_enabled = enabled, "VoiceOver status changed");
            let _ = self.tx.send(enabled);
        }
        enabled
    }

    /// Sample on every interval until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "VoiceOver status monitor started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.refresh().await;
                }
                _ = self.shutdown.notified() => {
                    tracing::debug!("VoiceOver status monitor stopped");
                    return;
                }
            }
        }
    }

    /// Signal the monitor loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

impl EnablementSignal for VoiceOverStatusMonitor {
    fn current(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Where the monitor reads the raw on/off value from.
#[async_trait]
trait StatusSource: Send + Sync {
    async fn read(&self, timeout: Duration) -> bool;
}

/// The `defaults` preference store.
struct DefaultsStatus;

#[async_trait]
impl StatusSource for DefaultsStatus {
    async fn read(&self, timeout: Duration) -> bool {
        if !cfg!(target_os = "macos") {
            return false;
        }
        match run_command(
            "defaults",
            &["read", "com.apple.universalaccess", "voiceOverOnOffKey"],
            timeout,
        )
        .await
        {
            Ok(CommandOutput::Success(value)) => parse_defaults_bool(&value),
            Ok(CommandOutput::Failed { .. }) => false,
            Err(e) => {
                tracing::debug!(error = %e, "Could not read VoiceOver status");
                false
            }
        }
    }
}

fn parse_defaults_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "YES")
}
