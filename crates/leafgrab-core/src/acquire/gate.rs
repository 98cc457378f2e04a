//! Admission gate: bounded concurrency with a failure-budget escape.

use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Counters {
    active: usize,
    failures: usize,
}

/// Decides when the next fetch task may start.
///
/// Normal regime: a task is admitted once the number of active tasks is
/// under the cap, so `active` never exceeds the cap. Escape regime: once
/// `failures` reaches the cap, admission stops waiting entirely. A systemic
/// outage would otherwise leave the gate waiting on completions that never
/// come; the cost is an uncontrolled concurrency spike, which callers log.
#[derive(Debug)]
pub struct AdmissionGate {
    cap: usize,
    state: Mutex<Counters>,
    changed: Condvar,
}

impl AdmissionGate {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            state: Mutex::new(Counters::default()),
            changed: Condvar::new(),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Blocks until the task may start, then counts it as active.
    /// Returns true when admission happened through the failure-budget
    /// escape rather than a free slot.
    pub fn admit(&self) -> bool {
        let mut c = self.state.lock().unwrap();
        while c.active >= self.cap && c.failures < self.cap {
            c = self.changed.wait(c).unwrap();
        }
        let escaped = c.failures >= self.cap;
        c.active += 1;
        escaped
    }

    /// Marks a task terminal. `failed` means it exhausted its retry budget.
    /// Must be called exactly once per admitted task, on both outcomes.
    pub fn finish(&self, failed: bool) {
        let mut c = self.state.lock().unwrap();
        c.active = c.active.saturating_sub(1);
        if failed {
            c.failures += 1;
        }
        drop(c);
        self.changed.notify_all();
    }

    /// Tasks currently running.
    pub fn active(&self) -> usize {
        self.state.lock().unwrap().active
    }

    /// Tasks abandoned after retry exhaustion so far.
    pub fn failures(&self) -> usize {
        self.state.lock().unwrap().failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn admits_up_to_cap_without_blocking() {
        let gate = AdmissionGate::new(3);
        assert!(!gate.admit());
        assert!(!gate.admit());
        assert!(!gate.admit());
        assert_eq!(gate.active(), 3);
    }

    #[test]
    fn blocks_at_cap_until_a_task_finishes() {
        let gate = Arc::new(AdmissionGate::new(2));
        gate.admit();
        gate.admit();

        let (tx, rx) = mpsc::channel();
        let g = Arc::clone(&gate);
        let h = thread::spawn(move || {
            g.admit();
            tx.send(()).unwrap();
        });

        // Gate is full; the third admission must wait.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        gate.finish(false);
        rx.recv_timeout(Duration::from_secs(5))
            .expect("admission after finish");
        h.join().unwrap();
        assert_eq!(gate.active(), 2);
    }

    #[test]
    fn failure_budget_escape_bypasses_cap() {
        let gate = AdmissionGate::new(2);
        gate.admit();
        gate.admit();
        gate.finish(true);
        gate.finish(true);
        assert_eq!(gate.failures(), 2);

        // Budget hit: admissions no longer wait on active slots.
        assert!(gate.admit());
        assert!(gate.admit());
        let escaped = gate.admit();
        assert!(escaped);
        assert_eq!(gate.active(), 3, "cap bypassed after budget exhaustion");
    }

    #[test]
    fn finish_decrements_and_counts_failures() {
        let gate = AdmissionGate::new(4);
        gate.admit();
        gate.admit();
        gate.finish(false);
        gate.finish(true);
        assert_eq!(gate.active(), 0);
        assert_eq!(gate.failures(), 1);
    }
}
