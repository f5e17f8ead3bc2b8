// ── Alarm escalation timer ──
//
// A forced or tripped alarm raises a monitor's refresh priority to
// Alarm for a bounded or unbounded window, then relaxes it to Normal.
// Expiry is cooperative: callers poke `try_expire` at the end of every
// refresh cycle instead of a background timer firing. The lock is a
// plain std mutex held only for the state check/mutation, never across
// a network call.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::priority::RefreshPriority;

/// When an active alarm window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    At(Instant),
    /// Closed only by an explicit stop (server-originated windows).
    Indefinite,
}

#[derive(Debug)]
struct Slot {
    priority: RefreshPriority,
    deadline: Option<Deadline>,
}

/// Per-device alarm window state.
///
/// Invariant: `deadline` is `Some` exactly while `priority == Alarm`.
#[derive(Debug)]
pub struct AlarmEscalation {
    slot: Mutex<Slot>,
}

impl AlarmEscalation {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                priority: RefreshPriority::Normal,
                deadline: None,
            }),
        }
    }

    /// The current refresh priority driven by the alarm window.
    pub fn priority(&self) -> RefreshPriority {
        self.lock().priority
    }

    pub fn is_alarm(&self) -> bool {
        self.priority() == RefreshPriority::Alarm
    }

    /// Raise to Alarm for `timeout` from now.
    ///
    /// Idempotent while a window is active: a redundant trigger does
    /// not restart the window.
    pub fn start_bounded(&self, timeout: Duration) {
        self.start_bounded_at(Instant::now(), timeout);
    }

    pub(crate) fn start_bounded_at(&self, now: Instant, timeout: Duration) {
        let mut slot = self.lock();
        if slot.priority != RefreshPriority::Alarm {
            debug!(?timeout, "starting alarm refresh window");
            slot.priority = RefreshPriority::Alarm;
            slot.deadline = Some(Deadline::At(now + timeout));
        }
    }

    /// Force priority to Alarm with no deadline.
    ///
    /// Used when the escalation comes from the server's own event
    /// notification: the window closes only when the server reports the
    /// alarm cleared, never by elapsed time. Replaces any bounded
    /// window already in progress.
    pub fn start_unbounded(&self) {
        let mut slot = self.lock();
        if slot.deadline != Some(Deadline::Indefinite) {
            debug!("starting unbounded alarm refresh window");
        }
        slot.priority = RefreshPriority::Alarm;
        slot.deadline = Some(Deadline::Indefinite);
    }

    /// Relax a bounded window whose deadline has passed.
    ///
    /// Returns `true` if the window expired on this call. No-op for
    /// inactive or indefinite windows.
    pub fn try_expire(&self) -> bool {
        self.try_expire_at(Instant::now())
    }

    pub(crate) fn try_expire_at(&self, now: Instant) -> bool {
        let mut slot = self.lock();
        match slot.deadline {
            Some(Deadline::At(deadline))
                if slot.priority == RefreshPriority::Alarm && now >= deadline =>
            {
                debug!("alarm refresh window timed out, relaxing to normal");
                slot.priority = RefreshPriority::Normal;
                slot.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Unconditionally relax to Normal, regardless of remaining time.
    ///
    /// Returns `true` if a window was actually active (a stop without
    /// an active window is not a state transition worth logging).
    pub fn force_stop(&self) -> bool {
        let mut slot = self.lock();
        if slot.priority == RefreshPriority::Alarm {
            debug!("stopping alarm refresh window");
            slot.priority = RefreshPriority::Normal;
            slot.deadline = None;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AlarmEscalation {
    fn default() -> Self {
        Self::new()
    }
}
