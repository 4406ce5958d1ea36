//! Trigger scheduling for report number assignment
//!
//! One [`TriggerScheduler`] serves one record. It owns the record's field
//! store and an explicit [`AssignmentState`]:
//!
//! - Field changes are debounced: each change replaces the pending timer, and
//!   only the last change of a burst runs a background attempt.
//! - Explicit triggers run immediately in interactive mode.
//! - An attempt that finds another in progress is not dropped. It is
//!   rescheduled after the retry delay with the same mode. There is a single
//!   retry slot and a newer retry replaces an older pending one.
//!
//! The busy flag is set before the assignment starts and is released by a
//! drop guard, so every exit path (success, rejection, failure, panic)
//! returns the scheduler to idle.

use crate::assigner::{AssignOptions, Assignment, IdentifierAssigner, Persistence};
use crate::config::RpnConfig;
use crate::error::Rejection;
use crate::events::{EventBus, RpnEvent, TriggerMode};
use crate::fields::{Field, FieldStore};
use crate::timer::{lock, Timer, TimerHandle};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Whether an assignment is running for this record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentState {
    Idle,
    InProgress,
}

/// What a single trigger produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A report number was issued
    Assigned(Assignment),
    /// The attempt ran and stopped without issuing a number
    Rejected(Rejection),
    /// Another attempt was running; this one is queued for retry
    Deferred,
}

impl AttemptOutcome {
    /// Issued report number, if any
    pub fn identifier(&self) -> Option<String> {
        match self {
            AttemptOutcome::Assigned(assignment) => Some(assignment.identifier.to_string()),
            _ => None,
        }
    }
}

/// Pending timer for one trigger class
struct Slot {
    token: u64,
    handle: TimerHandle,
    mode: TriggerMode,
}

struct Control {
    state: AssignmentState,
    next_token: u64,
    debounce: Option<Slot>,
    retry: Option<Slot>,
    /// Timer callbacks that claimed their slot and have not finished
    firing: usize,
}

struct Shared<S, T> {
    assigner: IdentifierAssigner,
    store: Mutex<S>,
    timer: T,
    events: EventBus,
    debounce: Duration,
    retry_delay: Duration,
    control: Mutex<Control>,
}

/// Debounced, single-flight trigger front-end for one record
pub struct TriggerScheduler<S, T> {
    shared: Arc<Shared<S, T>>,
}

impl<S, T> Clone for TriggerScheduler<S, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Returns the scheduler to idle when dropped
struct BusyGuard<'a> {
    control: &'a Mutex<Control>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(self.control).state = AssignmentState::Idle;
    }
}

impl<S, T> TriggerScheduler<S, T>
where
    S: FieldStore + Send + 'static,
    T: Timer,
{
    /// Create a scheduler for one record
    ///
    /// # Arguments
    ///
    /// * `store` - The record's fields; the scheduler takes ownership
    /// * `timer` - Timer used for debounce and busy-retry
    /// * `config` - Revision tag, pad width and delays
    /// * `events` - Bus that receives one outcome event per attempt
    pub fn new(store: S, timer: T, config: &RpnConfig, events: EventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                assigner: IdentifierAssigner::from_config(config),
                store: Mutex::new(store),
                timer,
                events,
                debounce: config.debounce(),
                retry_delay: config.retry_delay(),
                control: Mutex::new(Control {
                    state: AssignmentState::Idle,
                    next_token: 0,
                    debounce: None,
                    retry: None,
                    firing: 0,
                }),
            }),
        }
    }

    /// Explicit trigger
    ///
    /// `interactive` selects whether gate rejections are surfaced.
    pub fn generate(&self, interactive: bool) -> AttemptOutcome {
        self.shared.attempt(TriggerMode::from_interactive(interactive))
    }

    /// Automatic background attempt made when the record is opened
    pub fn startup(&self) -> AttemptOutcome {
        debug!("Startup attempt");
        self.generate(false)
    }

    /// Notify the scheduler that a field changed
    ///
    /// Tracked inputs restart the debounce timer; other fields are ignored.
    pub fn field_changed(&self, field: Field) {
        if !field.is_tracked_input() {
            trace!("Ignoring change to untracked field '{}'", field);
            return;
        }
        Shared::schedule_debounce(&self.shared);
    }

    /// Write a field as the user would, then notify the change
    ///
    /// Returns whether the store accepted the write.
    pub fn set_field(&self, field: Field, value: &str) -> bool {
        let written = lock(&self.shared.store).write(field, value);
        if written {
            self.field_changed(field);
        } else {
            debug!("Write to '{}' refused", field);
        }
        written
    }

    /// Current assignment state
    pub fn state(&self) -> AssignmentState {
        lock(&self.shared.control).state
    }

    /// Whether a debounced attempt is waiting to fire
    pub fn has_pending_debounce(&self) -> bool {
        lock(&self.shared.control).debounce.is_some()
    }

    /// Mode of the pending busy-retry, if any
    pub fn pending_retry(&self) -> Option<TriggerMode> {
        lock(&self.shared.control).retry.as_ref().map(|slot| slot.mode)
    }

    /// No timer pending, no timer callback running and no attempt in progress
    ///
    /// Once this holds, every event from earlier triggers has been published.
    pub fn is_settled(&self) -> bool {
        let control = lock(&self.shared.control);
        control.debounce.is_none()
            && control.retry.is_none()
            && control.firing == 0
            && control.state == AssignmentState::Idle
    }

    /// Read access to the record
    pub fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&lock(&self.shared.store))
    }

    /// Write access to the record, bypassing change notification
    pub fn with_store_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut lock(&self.shared.store))
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn timer(&self) -> &T {
        &self.shared.timer
    }
}

impl<S, T> Shared<S, T>
where
    S: FieldStore + Send + 'static,
    T: Timer,
{
    fn attempt(self: &Arc<Self>, mode: TriggerMode) -> AttemptOutcome {
        // Already-assigned short-circuit, outside the busy gate. A store held
        // by a running attempt is skipped here and caught by the gate.
        if let Ok(store) = self.store.try_lock() {
            if !store.read(Field::Identifier).is_empty() {
                drop(store);
                return self.report(Uuid::new_v4(), mode, Err(Rejection::AlreadyAssigned));
            }
        }

        {
            let mut control = lock(&self.control);
            if control.state == AssignmentState::InProgress {
                self.defer(&mut control, mode);
                return AttemptOutcome::Deferred;
            }
            control.state = AssignmentState::InProgress;
        }
        let _busy = BusyGuard {
            control: &self.control,
        };

        let attempt_id = Uuid::new_v4();
        let options = AssignOptions {
            validate: mode.is_interactive(),
        };
        trace!(%attempt_id, ?mode, "Assignment attempt started");

        let result = {
            let mut store = lock(&self.store);
            panic::catch_unwind(AssertUnwindSafe(|| {
                self.assigner.assign(&mut *store, options)
            }))
            .unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                Err(Rejection::UnexpectedFailure(message))
            })
        };

        self.report(attempt_id, mode, result)
    }

    /// Log and publish the outcome of an attempt that ran
    fn report(
        &self,
        attempt_id: Uuid,
        mode: TriggerMode,
        result: Result<Assignment, Rejection>,
    ) -> AttemptOutcome {
        let timestamp = chrono::Utc::now();

        match result {
            Ok(assignment) => {
                let identifier = assignment.identifier.to_string();
                info!(%attempt_id, ?mode, "Assigned report number {}", identifier);
                self.events.emit_lossy(RpnEvent::ReportNumberAssigned {
                    attempt_id,
                    identifier: identifier.clone(),
                    sequence: assignment.identifier.sequence,
                    new_max: assignment.trackers.write_max,
                    new_min: assignment.trackers.write_min,
                    timestamp,
                });
                if let Persistence::Failed(error) = &assignment.persistence {
                    self.events.emit_lossy(RpnEvent::PersistenceWarning {
                        attempt_id,
                        identifier,
                        error: error.clone(),
                        timestamp,
                    });
                }
                AttemptOutcome::Assigned(assignment)
            }
            Err(Rejection::UnexpectedFailure(message)) => {
                error!(%attempt_id, ?mode, "Report number generation failed: {}", message);
                self.events.emit_lossy(RpnEvent::AssignmentFailed {
                    attempt_id,
                    mode,
                    error: message.clone(),
                    timestamp,
                });
                AttemptOutcome::Rejected(Rejection::UnexpectedFailure(message))
            }
            Err(rejection) => {
                let user_facing = rejection.is_user_facing(mode.is_interactive());
                if user_facing {
                    info!(%attempt_id, "Rejected: {}", rejection);
                } else {
                    debug!(%attempt_id, "Background attempt stopped: {}", rejection);
                }
                let missing_field = match &rejection {
                    Rejection::MissingField(field) => Some(*field),
                    _ => None,
                };
                self.events.emit_lossy(RpnEvent::AssignmentRejected {
                    attempt_id,
                    mode,
                    reason: rejection.to_string(),
                    missing_field,
                    user_facing,
                    timestamp,
                });
                AttemptOutcome::Rejected(rejection)
            }
        }
    }

    /// Queue a retry for an attempt that found the scheduler busy
    fn defer(self: &Arc<Self>, control: &mut Control, mode: TriggerMode) {
        if let Some(previous) = control.retry.take() {
            debug!(superseded = ?previous.mode, "Pending retry superseded");
            self.timer.cancel(previous.handle);
        }

        let token = next_token(control);
        let weak = Arc::downgrade(self);
        let handle = self.timer.schedule(
            self.retry_delay,
            Box::new(move || Self::fire(&weak, token, SlotKind::Retry)),
        );
        control.retry = Some(Slot {
            token,
            handle,
            mode,
        });

        debug!(?mode, "Assignment in progress, retrying in {:?}", self.retry_delay);
        self.events.emit_lossy(RpnEvent::AssignmentDeferred {
            mode,
            retry_in_ms: self.retry_delay.as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });
    }

    fn schedule_debounce(self: &Arc<Self>) {
        let mut control = lock(&self.control);
        if let Some(previous) = control.debounce.take() {
            self.timer.cancel(previous.handle);
        }

        let token = next_token(&mut control);
        let weak = Arc::downgrade(self);
        let handle = self.timer.schedule(
            self.debounce,
            Box::new(move || Self::fire(&weak, token, SlotKind::Debounce)),
        );
        control.debounce = Some(Slot {
            token,
            handle,
            mode: TriggerMode::Background,
        });
        trace!("Debounce timer (re)started");
    }

    /// Timer callback: claim the slot if it is still ours, then attempt
    fn fire(weak: &Weak<Self>, token: u64, kind: SlotKind) {
        let Some(shared) = weak.upgrade() else {
            return;
        };

        let mode = {
            let mut control = lock(&shared.control);
            let slot = match kind {
                SlotKind::Debounce => &mut control.debounce,
                SlotKind::Retry => &mut control.retry,
            };
            let mode = match slot.take() {
                Some(pending) if pending.token == token => pending.mode,
                other => {
                    // Superseded while firing
                    *slot = other;
                    return;
                }
            };
            control.firing += 1;
            mode
        };

        let outcome = shared.attempt(mode);
        lock(&shared.control).firing -= 1;
        if let AttemptOutcome::Deferred = outcome {
            trace!(?kind, "Timer attempt deferred again");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SlotKind {
    Debounce,
    Retry,
}

fn next_token(control: &mut Control) -> u64 {
    control.next_token += 1;
    control.next_token
}

impl<S, T> Drop for Shared<S, T> {
    fn drop(&mut self) {
        let control = lock(&self.control);
        if control.debounce.is_some() || control.retry.is_some() {
            warn!("Scheduler dropped with a pending attempt");
        }
    }
}
