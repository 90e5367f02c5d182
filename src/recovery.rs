//! Recovery decisions for the control loop.
//!
//! The node has no background supervisor: every fault is converted into
//! one of a small set of restart or deep-sleep actions executed by the
//! loop itself. The decisions are kept free of I/O so the loop in
//! `main.rs` only has to carry them out.

use crate::rest;

/// Counters owned by the control loop, reset only by a process restart.
pub struct RecoveryState {
    iterations: u32,
}

/// Verdict of the cheap local checks that gate an iteration.
#[derive(Debug, PartialEq, Eq)]
pub enum Preflight {
    /// Free heap dropped below the configured threshold; restart before
    /// exhaustion breaks something less predictable.
    MemoryCritical { free_heap: usize },
    /// The iteration budget ran out. Preventive restart regardless of
    /// health, bounding process uptime.
    AgedOut { iterations: u32 },
    Proceed,
}

/// Classification of a publish attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum PostVerdict {
    /// 200 or 201 exactly.
    Accepted(u16),
    /// Any other status: transient, retried next iteration without restart.
    SoftError(u16),
    /// Transport-level failure: deep sleep, then restart on wake.
    HardFailure,
}

impl RecoveryState {
    pub fn new() -> Self {
        Self { iterations: 0 }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Evaluate the memory watchdog and the aging watchdog, in that
    /// order, before any network I/O is allowed. The iteration counter
    /// only advances when memory is healthy.
    pub fn preflight(
        &mut self,
        free_heap: usize,
        memory_threshold: usize,
        max_iterations: u32,
    ) -> Preflight {
        if free_heap < memory_threshold {
            return Preflight::MemoryCritical { free_heap };
        }

        self.iterations += 1;
        if self.iterations > max_iterations {
            return Preflight::AgedOut {
                iterations: self.iterations,
            };
        }

        Preflight::Proceed
    }
}

impl Default for RecoveryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a publish result onto the recovery branch. The REST layer reports
/// distinct transport/decode/status error kinds; they all land on the
/// hard-failure branch here, which is the policy, not the taxonomy.
pub fn classify_post(result: &Result<u16, rest::Error>) -> PostVerdict {
    match result {
        Ok(status @ (200 | 201)) => PostVerdict::Accepted(*status),
        Ok(status) => PostVerdict::SoftError(*status),
        Err(_) => PostVerdict::HardFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_memory_restarts_before_anything_else() {
        let mut state = RecoveryState::new();
        let verdict = state.preflight(1_999, 2_000, 10);
        assert_eq!(verdict, Preflight::MemoryCritical { free_heap: 1_999 });
        // the aging counter must not advance on a memory restart
        assert_eq!(state.iterations(), 0);
    }

    #[test]
    fn memory_check_precedes_aging_check() {
        let mut state = RecoveryState::new();
        // exhaust the iteration budget with healthy memory
        for _ in 0..3 {
            state.preflight(10_000, 2_000, 2);
        }
        // both watchdogs would fire; memory wins
        assert_eq!(
            state.preflight(100, 2_000, 2),
            Preflight::MemoryCritical { free_heap: 100 }
        );
    }

    #[test]
    fn iteration_budget_forces_preventive_restart() {
        let mut state = RecoveryState::new();
        assert_eq!(state.preflight(10_000, 2_000, 2), Preflight::Proceed);
        assert_eq!(state.preflight(10_000, 2_000, 2), Preflight::Proceed);
        assert_eq!(
            state.preflight(10_000, 2_000, 2),
            Preflight::AgedOut { iterations: 3 }
        );
    }

    #[test]
    fn healthy_iteration_proceeds() {
        let mut state = RecoveryState::new();
        assert_eq!(state.preflight(50_000, 20_000, 1_000), Preflight::Proceed);
        assert_eq!(state.iterations(), 1);
    }

    #[test]
    fn post_success_band_is_exactly_200_and_201() {
        assert_eq!(classify_post(&Ok(200)), PostVerdict::Accepted(200));
        assert_eq!(classify_post(&Ok(201)), PostVerdict::Accepted(201));
        // GET treats 2xx below 202 as success, POST does not get that slack
        assert_eq!(classify_post(&Ok(202)), PostVerdict::SoftError(202));
    }

    #[test]
    fn non_success_status_is_soft() {
        assert_eq!(classify_post(&Ok(503)), PostVerdict::SoftError(503));
        assert_eq!(classify_post(&Ok(404)), PostVerdict::SoftError(404));
    }

    #[test]
    fn transport_failure_is_hard() {
        assert_eq!(
            classify_post(&Err(rest::Error::Transport)),
            PostVerdict::HardFailure
        );
    }
}
