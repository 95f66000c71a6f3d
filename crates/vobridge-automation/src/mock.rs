//! Mock ports for testing the listener and HTTP layers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use vobridge_core::types::{KeyCode, KeyEvent};

use crate::error::{AutomationError, QueryError};
use crate::{InputInjector, NarrationQuery};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Narration query that replays a script of responses.
///
/// Once the script is exhausted every call returns the fallback response,
/// `Err(QueryError::Empty)` unless changed with [`with_fallback`](Self::with_fallback).
#[derive(Debug)]
pub struct MockNarrationQuery {
    script: Mutex<VecDeque<Result<String, QueryError>>>,
    fallback: Mutex<Result<String, QueryError>>,
    calls: AtomicUsize,
}

impl MockNarrationQuery {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Err(QueryError::Empty)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock that plays `responses` in order.
    pub fn with_script(responses: Vec<Result<String, QueryError>>) -> Self {
        let mock = Self::new();
        *lock(&mock.script) = responses.into();
        mock
    }

    /// Create a mock that always answers with the same phrase.
    pub fn always(text: &str) -> Self {
        Self::new().with_fallback(Ok(text.to_string()))
    }

    pub fn with_fallback(self, response: Result<String, QueryError>) -> Self {
        *lock(&self.fallback) = response;
        self
    }

    /// Append a response to the end of the script.
    pub fn push(&self, response: Result<String, QueryError>) {
        lock(&self.script).push_back(response);
    }

    /// Replace the response used once the script is exhausted.
    pub fn set_fallback(&self, response: Result<String, QueryError>) {
        *lock(&self.fallback) = response;
    }

    /// Number of queries answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

impl Default for MockNarrationQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NarrationQuery for MockNarrationQuery {
    async fn latest_phrase(&self) -> Result<String, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = lock(&self.script).pop_front() {
            return next;
        }
        lock(&self.fallback).clone()
    }
}

/// A call recorded by [`MockInputInjector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectorCall {
    Key(KeyCode, KeyEvent),
    PrimaryAction,
}

/// Input injector that records calls and returns configured outcomes.
#[derive(Debug, Default)]
pub struct MockInputInjector {
    calls: Mutex<Vec<InjectorCall>>,
    key_error: Mutex<Option<AutomationError>>,
    action_error: Mutex<Option<AutomationError>>,
}

impl MockInputInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every key event fail with `err` (still recorded).
    pub fn failing_keys(err: AutomationError) -> Self {
        let mock = Self::new();
        *lock(&mock.key_error) = Some(err);
        mock
    }

    /// Make the primary action fail with `err` (still recorded).
    pub fn failing_action(err: AutomationError) -> Self {
        let mock = Self::new();
        *lock(&mock.action_error) = Some(err);
        mock
    }

    /// Snapshot of recorded calls in order.
    pub fn calls(&self) -> Vec<InjectorCall> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl InputInjector for MockInputInjector {
    async fn post_key(&self, key: KeyCode, event: KeyEvent) -> Result<(), AutomationError> {
        lock(&self.calls).push(InjectorCall::Key(key, event));
        match lock(&self.key_error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn perform_primary_action(&self) -> Result<(), AutomationError> {
        lock(&self.calls).push(InjectorCall::PrimaryAction);
        match lock(&self.action_error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
