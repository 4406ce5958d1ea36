//! Cancellable one-shot timers
//!
//! The scheduler only needs `schedule(delay, task) -> handle` and
//! `cancel(handle)`. Two implementations:
//! - [`TokioTimer`]: spawned tokio tasks, for hosts running a tokio runtime
//! - [`ManualTimer`]: a virtual clock advanced explicitly, for hosts that
//!   pump their own event loop and for deterministic tests

use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Work to run when a timer fires
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a scheduled timer for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// One-shot timer service
pub trait Timer: Send + Sync + 'static {
    /// Run `task` once after `delay`
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;

    /// Prevent a not-yet-fired timer from running
    ///
    /// Cancelling a fired or unknown handle is a no-op.
    fn cancel(&self, handle: TimerHandle);
}

impl<T: Timer + ?Sized> Timer for Arc<T> {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        (**self).schedule(delay, task)
    }

    fn cancel(&self, handle: TimerHandle) {
        (**self).cancel(handle)
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Timer backed by tokio tasks
#[derive(Clone)]
pub struct TokioTimer {
    runtime: tokio::runtime::Handle,
    next_id: Arc<AtomicU64>,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl TokioTimer {
    /// Timer on the runtime the caller is running in
    pub fn from_current() -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("No tokio runtime: {}", e)))?;
        Ok(Self::with_handle(runtime))
    }

    /// Timer on a specific runtime
    pub fn with_handle(runtime: tokio::runtime::Handle) -> Self {
        Self {
            runtime,
            next_id: Arc::new(AtomicU64::new(1)),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of timers scheduled and not yet fired or cancelled
    pub fn pending(&self) -> usize {
        lock(&self.tasks).len()
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);

        // Held across spawn so the task cannot deregister before it is registered
        let mut registry = lock(&self.tasks);
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&tasks).remove(&id);
            trace!("Timer {} fired", id);
            task();
        });
        registry.insert(id, join);

        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(join) = lock(&self.tasks).remove(&handle.0) {
            trace!("Timer {} cancelled", handle.0);
            join.abort();
        }
    }
}

/// Virtual-clock timer
///
/// Nothing fires until [`ManualTimer::advance`] moves the clock past a
/// deadline. Tasks run on the caller's thread, in deadline order; tasks
/// scheduled by a running task fire in the same `advance` if they fall due.
#[derive(Default)]
pub struct ManualTimer {
    inner: Mutex<ManualClock>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), TimerTask>,
    deadlines: HashMap<u64, Duration>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        lock(&self.inner).now
    }

    /// Number of timers waiting to fire
    pub fn pending(&self) -> usize {
        lock(&self.inner).queue.len()
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&self) -> Option<Duration> {
        lock(&self.inner).queue.keys().next().map(|(due, _)| *due)
    }

    /// Move the clock forward, firing every timer that falls due
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = lock(&self.inner).now + by;
        let mut fired = 0;

        loop {
            let task = {
                let mut clock = lock(&self.inner);
                let next = clock.queue.keys().next().copied();
                let due = match next {
                    Some((due, id)) if due <= target => (due, id),
                    _ => {
                        clock.now = target;
                        break;
                    }
                };
                clock.deadlines.remove(&due.1);
                clock.now = due.0;
                clock.queue.remove(&due)
            };

            // Run without the clock locked so the task can schedule more
            if let Some(task) = task {
                task();
                fired += 1;
            }
        }

        fired
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let mut clock = lock(&self.inner);
        clock.next_id += 1;
        let id = clock.next_id;
        let due = clock.now + delay;
        clock.queue.insert((due, id), task);
        clock.deadlines.insert(id, due);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut clock = lock(&self.inner);
        if let Some(due) = clock.deadlines.remove(&handle.0) {
            clock.queue.remove(&(due, handle.0));
        }
    }
}
