//! Deferred execution for command steps
//!
//! `TaskScheduler` is the bridge's deferred-execution facility: every step
//! runs as a tokio task tracked in a `JoinSet`, so a registry reload can
//! cancel everything still pending from the previous command set.
//!
//! Tasks run on the runtime captured at construction, so host threads
//! outside any runtime can still trigger commands.

use crate::error::{BridgeError, Result};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

/// Tracks and cancels spawned step tasks
pub struct TaskScheduler {
    tasks: Mutex<JoinSet<()>>,
    runtime: Option<Handle>,
}

impl TaskScheduler {
    /// Create a scheduler bound to the current runtime, if there is one
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Create a scheduler that spawns onto `runtime`
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            runtime: Some(runtime),
        }
    }

    /// Runtime step tasks are spawned on
    ///
    /// Falls back to the caller's runtime when none was captured.
    pub fn runtime(&self) -> Result<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(BridgeError::NoRuntime)
    }

    /// Run a task as soon as the runtime picks it up
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = self.runtime()?;
        let mut tasks = self.lock();
        reap(&mut tasks);
        tasks.spawn_on(task, &runtime);
        Ok(())
    }

    /// Run a task once `delay` has elapsed
    pub fn after<F>(&self, delay: Duration, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit(async move {
            tokio::time::sleep(delay).await;
            task.await;
        })
    }

    /// Abort every outstanding task, returning how many were still pending
    pub fn cancel_all(&self) -> usize {
        let old = {
            let mut tasks = self.lock();
            reap(&mut tasks);
            std::mem::take(&mut *tasks)
        };
        let pending = old.len();
        // Dropping a JoinSet aborts its tasks
        drop(old);
        if pending > 0 {
            tracing::info!(cancelled = pending, "Cancelled scheduled command steps");
        }
        pending
    }

    /// Number of tasks not yet reaped
    pub fn pending(&self) -> usize {
        let mut tasks = self.lock();
        reap(&mut tasks);
        tasks.len()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!(error = %e, "Command step task panicked");
            }
        }
    }
}

/// Attempt bound for one presence-polling sequence
///
/// Owned by a single polling sequence and moved through each tick, so
/// re-checks can never reset the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    /// Checks made so far
    pub attempts: u32,

    /// Checks allowed
    pub max: u32,
}

impl PollState {
    /// Fresh state allowing `max` checks
    pub fn new(max: u32) -> Self {
        Self { attempts: 0, max }
    }

    /// Whether every allowed check has been used
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max
    }
}

/// Check `probe` until it succeeds or `state` runs out of attempts
///
/// The first check happens immediately; later checks are spaced by
/// `interval`. Returns the attempt number that succeeded, or the exhausted
/// state.
pub async fn poll_until<F, Fut>(
    mut state: PollState,
    interval: Duration,
    mut probe: F,
) -> std::result::Result<u32, PollState>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    loop {
        if state.exhausted() {
            return Err(state);
        }
        state.attempts += 1;
        if probe().await {
            return Ok(state.attempts);
        }
        if state.exhausted() {
            return Err(state);
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_after_waits_for_delay() {
        let scheduler = TaskScheduler::new();
        let fired = Arc::new(Mutex::new(None));
        let start = Instant::now();

        let slot = fired.clone();
        scheduler.after(Duration::from_secs(3), async move {
            *slot.lock().unwrap() = Some(Instant::now());
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(fired.lock().unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let at = fired.lock().unwrap().expect("task fired");
        assert!(at - start >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_aborts_pending() {
        let scheduler = TaskScheduler::new();
        let runs = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let runs = runs.clone();
            scheduler.after(Duration::from_secs(5), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert_eq!(scheduler.pending(), 3);
        assert_eq!(scheduler.cancel_all(), 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_tasks_are_reaped() {
        let scheduler = TaskScheduler::new();
        scheduler.submit(async {}).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.cancel_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = poll_until(PollState::new(5), Duration::from_secs(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { n >= 3 }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausts() {
        let calls = AtomicU32::new(0);
        let result = poll_until(PollState::new(4), Duration::from_millis(100), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;

        assert_eq!(result, Err(PollState { attempts: 4, max: 4 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_submit_without_runtime_fails() {
        let scheduler = TaskScheduler::new();
        assert!(matches!(scheduler.runtime(), Err(BridgeError::NoRuntime)));
        assert!(matches!(
            scheduler.submit(async {}),
            Err(BridgeError::NoRuntime)
        ));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_submit_from_foreign_thread_uses_captured_runtime() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let scheduler = TaskScheduler::with_runtime(rt.handle().clone());
        let (tx, rx) = std::sync::mpsc::channel();

        scheduler
            .submit(async move {
                tx.send(()).unwrap();
            })
            .unwrap();

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_poll_state() {
        let mut state = PollState::new(2);
        assert!(!state.exhausted());
        state.attempts = 2;
        assert!(state.exhausted());
    }
}
