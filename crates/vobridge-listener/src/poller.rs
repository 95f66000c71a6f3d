//! Narrator phrase polling loop.
//!
//! One loop iteration:
//! 1. Sleep `interval`.
//! 2. Stop if cancelled.
//! 3. Query the narrator.
//! 4. Publish the phrase if it differs from the last one this task saw.
//! 5. On a failed or empty query, sleep `failure_backoff` and start over.
//!
//! Both sleeps wake early on cancellation. The debounce cache lives inside a
//! single run, so a restarted task republishes whatever the narrator says.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use vobridge_automation::{NarrationQuery, QueryError};
use vobridge_core::config::PollingConfig;

use crate::phrase::PhraseSlot;

/// Sleep durations for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub interval: Duration,
    pub failure_backoff: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        (&PollingConfig::default()).into()
    }
}

impl From<&PollingConfig> for PollTiming {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            failure_backoff: config.failure_backoff(),
        }
    }
}

/// Decrements the shared running counter when a loop exits, however it exits.
struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A configured polling loop, not yet running.
pub struct PollingLoop {
    query: Arc<dyn NarrationQuery>,
    slot: PhraseSlot,
    timing: PollTiming,
    running: Arc<AtomicUsize>,
}

impl PollingLoop {
    pub fn new(query: Arc<dyn NarrationQuery>, slot: PhraseSlot, timing: PollTiming) -> Self {
        Self {
            query,
            slot,
            timing,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Count running loops in `counter` (incremented on start, decremented on exit).
    pub fn with_running_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.running = counter;
        self
    }

    /// Launch the loop on the tokio runtime.
    pub fn spawn(self, id: u64) -> PollingTask {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(id, cancel_rx));
        PollingTask {
            id,
            cancel_tx,
            handle,
        }
    }

    /// Poll until `cancel` flips to true or its sender is dropped.
    pub async fn run(self, id: u64, mut cancel: watch::Receiver<bool>) {
        let _guard = RunningGuard::enter(Arc::clone(&self.running));
        tracing::info!(task_id = id, "Phrase polling started");

        let mut previous: Option<String> = None;

        loop {
            if pause(&mut cancel, self.timing.interval).await {
                break;
            }

            let outcome = self.query.latest_phrase().await.and_then(|text| {
                if text.is_empty() {
                    Err(QueryError::Empty)
                } else {
                    Ok(text)
                }
            });

            match outcome {
                Ok(text) => {
                    if previous.as_deref() == Some(text.as_str()) {
                        continue;
                    }
                    // A cancelled task must not write once its successor may be running.
                    if is_cancelled(&cancel) {
                        break;
                    }
                    previous = Some(text.clone());
                    let phrase = self.slot.publish(text);
                    tracing::debug!(
                        task_id = id,
                        sequence = phrase.sequence,
                        phrase = %phrase.text,
                        "New phrase"
                    );
                }
                Err(QueryError::Empty) => {
                    tracing::debug!(
                        task_id = id,
                        backoff_ms = self.timing.failure_backoff.as_millis() as u64,
                        "Narrator returned no phrase, backing off"
                    );
                    if pause(&mut cancel, self.timing.failure_backoff).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        task_id = id,
                        error = %e,
                        backoff_ms = self.timing.failure_backoff.as_millis() as u64,
                        "Narrator query failed, backing off"
                    );
                    if pause(&mut cancel, self.timing.failure_backoff).await {
                        break;
                    }
                }
            }
        }

        tracing::info!(task_id = id, "Phrase polling stopped");
    }
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

/// Sleep for `period` unless cancelled first. Returns whether the loop should stop.
async fn pause(cancel: &mut watch::Receiver<bool>, period: Duration) -> bool {
    if !is_cancelled(cancel) {
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = cancel.wait_for(|cancelled| *cancelled) => {}
        }
    }
    is_cancelled(cancel)
}

/// Handle to a running polling loop.
///
/// Cancellation is cooperative: the loop notices at its next sleep. Dropping
/// the handle cancels the loop as well.
#[derive(Debug)]
pub struct PollingTask {
    id: u64,
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PollingTask {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request the loop to stop.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Not cancelled and still running.
    pub fn is_live(&self) -> bool {
        !self.is_cancelled() && !self.handle.is_finished()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(task_id = self.id, error = %e, "Polling task ended abnormally");
        }
    }
}
