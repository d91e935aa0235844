//! Debounced auto-save.
//!
//! Armed only in shared-collaborative sessions: the caller hands
//! [`AutoSaveScheduler::schedule`] the mode resolved for the triggering
//! mutation, and any other mode leaves the timer disarmed. While shared
//! editing is active, every mutation restarts a single timer; the save
//! callback runs once the session has been quiet for
//! [`AUTO_SAVE_DEBOUNCE`]. There is never more than one timer, and a
//! burst of edits produces exactly one save.

use folio_engine::SessionMode;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Quiescence window before an auto-save fires.
pub const AUTO_SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

/// A single-timer debounce for background saves.
#[derive(Debug, Default)]
pub struct AutoSaveScheduler {
    timer: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl AutoSaveScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arm the timer for a mutation made under `mode`. The previous
    /// pending save, if any, is cancelled, so the callback fires
    /// [`AUTO_SAVE_DEBOUNCE`] after the *last* call.
    ///
    /// Only shared-collaborative sessions auto-save. Any other mode not
    /// only declines to arm but cancels whatever is pending: leaving
    /// shared mode must not let a stale timer fire afterwards.
    ///
    /// The callback is responsible for its own single-flight behavior: if
    /// a save is still in flight when the timer fires, it skips rather
    /// than queues, and the next edit re-arms the timer anyway.
    pub fn schedule<F, Fut>(&self, mode: SessionMode, save: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if self.shut_down.load(Ordering::Acquire) {
            tracing::debug!("auto-save not armed: scheduler is shut down");
            return;
        }
        if !mode.is_shared() {
            tracing::debug!(?mode, "auto-save not armed: session is not shared");
            self.cancel();
            return;
        }

        // Sample the deadline now rather than at the spawned task's first
        // poll, so the window starts at the schedule call itself.
        let sleep = tokio::time::sleep(AUTO_SAVE_DEBOUNCE);
        let handle = tokio::spawn(async move {
            sleep.await;
            save().await;
        });

        let mut timer = match self.timer.lock() {
            Ok(timer) => timer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the pending save, if any. The scheduler stays usable.
    pub fn cancel(&self) {
        let mut timer = match self.timer.lock() {
            Ok(timer) => timer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }

    /// Cancel and prevent any future arming. Used on session teardown so a
    /// late keystroke cannot resurrect the timer.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.cancel();
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
