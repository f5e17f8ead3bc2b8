// ── Refresh gate ──
//
// Per-device mutual exclusion around the fetch+publish critical
// section. Deliberately coarser than per-field locking: the Monitor
// Service calls dominate the cycle's cost and interleaved fetches would
// produce inconsistent device snapshots.
//
// Alarm-priority entry never queues -- queuing would delay the very
// refresh that matters most. A skipped alarm cycle is retried on the
// next tick.

use tokio::sync::{Mutex, MutexGuard};

use crate::priority::RefreshPriority;

/// Mutual exclusion for one device's refresh cycles.
#[derive(Debug, Default)]
pub struct RefreshGate {
    lock: Mutex<()>,
}

/// Held for the duration of one refresh cycle; releases on drop, so
/// the gate is released on every exit path including panics.
#[derive(Debug)]
pub struct RefreshGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to start a refresh cycle at the given priority.
    ///
    /// `Alarm` attempts a non-blocking acquire and returns `None` when
    /// a cycle is already in flight. Any other priority waits for the
    /// in-flight cycle to finish.
    ///
    /// Non-reentrant: a cycle must never trigger another cycle on the
    /// same device, or a blocking enter deadlocks.
    pub async fn enter(&self, priority: RefreshPriority) -> Option<RefreshGuard<'_>> {
        if priority == RefreshPriority::Alarm {
            self.lock.try_lock().ok().map(RefreshGuard)
        } else {
            Some(RefreshGuard(self.lock.lock().await))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::priority::RefreshPriority as P;

    #[tokio::test]
    async fn alarm_entry_skips_when_cycle_in_flight() {
        let gate = RefreshGate::new();

        let held = gate.enter(P::Normal).await;
        assert!(held.is_some());

        assert!(gate.enter(P::Alarm).await.is_none());

        drop(held);
        assert!(gate.enter(P::Alarm).await.is_some());
    }

    #[tokio::test]
    async fn normal_entry_blocks_until_released() {
        let gate = Arc::new(RefreshGate::new());

        let held = gate.enter(P::Normal).await;

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _guard = gate.enter(P::Normal).await;
            })
        };

        // The second cycle must still be parked on the lock.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .expect("waiter task");
    }

    #[tokio::test]
    async fn no_two_cycles_hold_the_gate_concurrently() {
        let gate = Arc::new(RefreshGate::new());
        let active = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            let active = Arc::clone(&active);
            tasks.push(tokio::spawn(async move {
                let _guard = gate.enter(P::Normal).await;
                let now = active.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                assert_eq!(now, 0, "another cycle was inside the critical section");
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.expect("task");
        }
    }
}
