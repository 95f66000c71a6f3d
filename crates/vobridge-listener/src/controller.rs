//! Listener state machine driven by the narrator enablement signal.
//!
//! - Idle -> Active on `true`: spawn one polling task.
//! - Active -> Idle on `false`: cancel the task and drop the handle.
//! - `true` while Active and `false` while Idle are no-ops.
//!
//! Transitions are applied under one mutex, so the signal driver and direct
//! callers cannot interleave and leave two tasks (or none) behind.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use vobridge_automation::{EnablementSignal, NarrationQuery};
use vobridge_core::types::Phrase;

use crate::phrase::PhraseSlot;
use crate::poller::{PollTiming, PollingLoop, PollingTask};

/// Whether a polling task is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    Idle,
    Active,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Idle => write!(f, "Idle"),
            ListenerState::Active => write!(f, "Active"),
        }
    }
}

/// Outcome of applying one enablement notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Stopped,
    Unchanged,
}

/// Owns the polling task and the phrase slot it writes to.
pub struct ListenerController {
    query: Arc<dyn NarrationQuery>,
    timing: PollTiming,
    slot: PhraseSlot,
    task: Mutex<Option<PollingTask>>,
    next_task_id: AtomicU64,
    running: Arc<AtomicUsize>,
    narrator_enabled: AtomicBool,
    shutdown: Notify,
}

impl fmt::Debug for ListenerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerController")
            .field("timing", &self.timing)
            .field("state", &self.state())
            .field("narrator_enabled", &self.is_narrator_enabled())
            .field("running_tasks", &self.running_tasks())
            .finish()
    }
}

impl ListenerController {
    /// Create a controller in the Idle state.
    pub fn new(query: Arc<dyn NarrationQuery>, timing: PollTiming) -> Self {
        Self {
            query,
            timing,
            slot: PhraseSlot::new(),
            task: Mutex::new(None),
            next_task_id: AtomicU64::new(1),
            running: Arc::new(AtomicUsize::new(0)),
            narrator_enabled: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    fn task_guard(&self) -> MutexGuard<'_, Option<PollingTask>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Latest published phrase, in either state.
    pub fn latest_phrase(&self) -> Option<Phrase> {
        self.slot.latest()
    }

    pub fn phrase_slot(&self) -> &PhraseSlot {
        &self.slot
    }

    pub fn state(&self) -> ListenerState {
        match self.task_guard().as_ref() {
            Some(task) if task.is_live() => ListenerState::Active,
            _ => ListenerState::Idle,
        }
    }

    /// Last enablement value the controller was told about.
    pub fn is_narrator_enabled(&self) -> bool {
        self.narrator_enabled.load(Ordering::SeqCst)
    }

    /// Polling loops currently executing, including cancelled ones that have
    /// not reached their next sleep yet.
    pub fn running_tasks(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Apply one enablement notification.
    ///
    /// Must be called from within a tokio runtime since starting a task spawns it.
    pub fn handle_enablement(&self, enabled: bool) -> Transition {
        let mut task = self.task_guard();
        self.narrator_enabled.store(enabled, Ordering::SeqCst);
        tracing::debug!(narrator_enabled = enabled, "Narrator status notification");

        if enabled {
            if task.as_ref().is_some_and(PollingTask::is_live) {
                return Transition::Unchanged;
            }
            if let Some(stale) = task.take() {
                tracing::warn!(task_id = stale.id(), "Replacing polling task that exited on its own");
                stale.cancel();
            }
            let id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
            let polling = PollingLoop::new(Arc::clone(&self.query), self.slot.clone(), self.timing)
                .with_running_counter(Arc::clone(&self.running));
            *task = Some(polling.spawn(id));
            tracing::info!(task_id = id, "Listener: Idle -> Active");
            Transition::Started
        } else {
            match task.take() {
                Some(stopped) => {
                    stopped.cancel();
                    tracing::info!(task_id = stopped.id(), "Listener: Active -> Idle");
                    Transition::Stopped
                }
                None => Transition::Unchanged,
            }
        }
    }

    /// Follow `signal` until [`shutdown`](Self::shutdown) is called.
    ///
    /// The initial state is applied before this returns; notifications are
    /// then consumed by a spawned driver task, one at a time.
    pub fn attach(self: &Arc<Self>, signal: Arc<dyn EnablementSignal>) -> JoinHandle<()> {
        // Subscribe before reading the current value so no change is missed.
        let mut rx = signal.subscribe();
        let initial = signal.current();
        tracing::info!(narrator_enabled = initial, "Narrator status at startup");
        self.handle_enablement(initial);

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = rx.recv() => match msg {
                        Ok(enabled) => {
                            controller.handle_enablement(enabled);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Missed narrator status notifications, resyncing");
                            controller.handle_enablement(signal.current());
                        }
                        Err(RecvError::Closed) => {
                            tracing::debug!("Narrator status signal closed");
                            return;
                        }
                    },
                    _ = controller.shutdown.notified() => {
                        tracing::debug!("Listener driver stopped");
                        return;
                    }
                }
            }
        })
    }

    /// Stop following the signal and cancel any polling task.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task_guard().take() {
            task.cancel();
            tracing::info!(task_id = task.id(), "Polling task cancelled for shutdown");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use vobridge_automation::{ManualEnablementSignal, MockNarrationQuery, QueryError};

    fn fast_timing() -> PollTiming {
        PollTiming {
            interval: Duration::from_millis(5),
            failure_backoff: Duration::from_millis(20),
        }
    }

    fn controller_with(query: Arc<MockNarrationQuery>) -> Arc<ListenerController> {
        Arc::new(ListenerController::new(query, fast_timing()))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached within timeout");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ListenerState::Idle.to_string(), "Idle");
        assert_eq!(ListenerState::Active.to_string(), "Active");
    }

    #[tokio::test]
    async fn test_starts_idle_without_phrase() {
        let controller = controller_with(Arc::new(MockNarrationQuery::new()));
        assert_eq!(controller.state(), ListenerState::Idle);
        assert!(controller.latest_phrase().is_none());
        assert!(!controller.is_narrator_enabled());
    }

    #[tokio::test]
    async fn test_enable_disable_transitions() {
        let controller = controller_with(Arc::new(MockNarrationQuery::always("Hi")));

        assert_eq!(controller.handle_enablement(true), Transition::Started);
        assert_eq!(controller.state(), ListenerState::Active);

        assert_eq!(controller.handle_enablement(false), Transition::Stopped);
        assert_eq!(controller.state(), ListenerState::Idle);

        assert_eq!(controller.handle_enablement(false), Transition::Unchanged);
        assert_eq!(controller.state(), ListenerState::Idle);
    }

    #[tokio::test]
    async fn test_duplicate_enable_is_noop() {
        let controller = controller_with(Arc::new(MockNarrationQuery::always("Hi")));

        assert_eq!(controller.handle_enablement(true), Transition::Started);
        assert_eq!(controller.handle_enablement(true), Transition::Unchanged);
        assert_eq!(controller.handle_enablement(true), Transition::Unchanged);

        wait_until(|| controller.running_tasks() == 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(controller.running_tasks(), 1);
        controller.shutdown();
    }

    #[tokio::test]
    async fn test_rapid_toggling_leaves_at_most_one_task() {
        let controller = controller_with(Arc::new(MockNarrationQuery::always("Hi")));

        for i in 0..50 {
            controller.handle_enablement(i % 3 != 0);
        }
        // Last value was true (49 % 3 != 0).
        assert_eq!(controller.state(), ListenerState::Active);
        wait_until(|| controller.running_tasks() == 1).await;

        controller.handle_enablement(false);
        wait_until(|| controller.running_tasks() == 0).await;
        assert_eq!(controller.state(), ListenerState::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_notifications_keep_single_task() {
        let controller = controller_with(Arc::new(MockNarrationQuery::always("Hi")));

        let mut handles = Vec::new();
        for i in 0..8 {
            let c = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
                    c.handle_enablement((i + j) % 2 == 0);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        controller.handle_enablement(true);
        wait_until(|| controller.running_tasks() == 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(controller.running_tasks(), 1);
        controller.shutdown();
    }

    #[tokio::test]
    async fn test_phrase_survives_disable() {
        let controller = controller_with(Arc::new(MockNarrationQuery::always("Dock")));

        controller.handle_enablement(true);
        wait_until(|| controller.latest_phrase().is_some()).await;
        controller.handle_enablement(false);
        wait_until(|| controller.running_tasks() == 0).await;

        assert_eq!(controller.latest_phrase().unwrap().text, "Dock");
    }

    #[tokio::test]
    async fn test_reenable_resets_debounce() {
        let query = Arc::new(MockNarrationQuery::always("Hello"));
        let controller = controller_with(Arc::clone(&query));

        controller.handle_enablement(true);
        wait_until(|| controller.phrase_slot().publish_count() == 1).await;
        controller.handle_enablement(false);
        wait_until(|| controller.running_tasks() == 0).await;

        controller.handle_enablement(true);
        wait_until(|| controller.phrase_slot().publish_count() == 2).await;
        assert_eq!(controller.latest_phrase().unwrap().text, "Hello");
        controller.shutdown();
    }

    #[tokio::test]
    async fn test_live_task_picks_up_new_phrase() {
        let query = Arc::new(MockNarrationQuery::always("Hello"));
        let controller = controller_with(Arc::clone(&query));

        controller.handle_enablement(true);
        wait_until(|| controller.phrase_slot().publish_count() == 1).await;

        // Narrator hiccups once, then moves on.
        query.push(Err(QueryError::Failed("busy".to_string())));
        query.set_fallback(Ok("World".to_string()));
        wait_until(|| controller.latest_phrase().map(|p| p.text).as_deref() == Some("World")).await;

        assert_eq!(controller.phrase_slot().publish_count(), 2);
        assert_eq!(query.remaining(), 0);
        assert_eq!(controller.running_tasks(), 1);
        controller.shutdown();
    }

    #[tokio::test]
    async fn test_no_polling_while_idle() {
        let query = Arc::new(MockNarrationQuery::always("Hi"));
        let controller = controller_with(Arc::clone(&query));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(query.calls(), 0);

        controller.handle_enablement(true);
        wait_until(|| query.calls() > 0).await;
        controller.handle_enablement(false);
        wait_until(|| controller.running_tasks() == 0).await;

        let calls = query.calls();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(query.calls(), calls);
    }

    #[tokio::test]
    async fn test_attach_applies_initial_state() {
        let controller = controller_with(Arc::new(MockNarrationQuery::always("Hi")));
        let signal = Arc::new(ManualEnablementSignal::new(true));

        let driver = controller.attach(signal);
        assert_eq!(controller.state(), ListenerState::Active);
        assert!(controller.is_narrator_enabled());

        controller.shutdown();
        tokio::time::timeout(Duration::from_secs(2), driver)
            .await
            .expect("driver should stop on shutdown")
            .unwrap();
        assert_eq!(controller.state(), ListenerState::Idle);
    }

    #[tokio::test]
    async fn test_attach_follows_signal() {
        let query = Arc::new(MockNarrationQuery::with_script(vec![
            Err(QueryError::Failed("starting".to_string())),
            Ok("Hello".to_string()),
        ]));
        let controller = controller_with(Arc::clone(&query));
        let signal = Arc::new(ManualEnablementSignal::new(false));

        let driver = controller.attach(Arc::clone(&signal) as Arc<dyn EnablementSignal>);
        assert_eq!(controller.state(), ListenerState::Idle);

        signal.set(true);
        wait_until(|| controller.latest_phrase().is_some()).await;
        assert_eq!(controller.latest_phrase().unwrap().text, "Hello");

        signal.set(true);
        signal.set(false);
        wait_until(|| controller.state() == ListenerState::Idle).await;
        wait_until(|| controller.running_tasks() == 0).await;
        assert!(!controller.is_narrator_enabled());

        controller.shutdown();
        driver.await.unwrap();
    }
}
