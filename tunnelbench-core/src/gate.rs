use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Stop condition for a run; exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// No new unit of work starts once `started + duration` has passed.
    /// In-flight work is never cancelled.
    Duration(Duration),
    /// A finite budget of work units, claimed atomically.
    Requests(u64),
}

/// Decides whether a worker may start one more unit of work.
///
/// One predicate covers both stop conditions: duration mode compares against
/// a deadline, request mode claims from the shared budget. A claim is never
/// handed out twice, so the number of started units cannot exceed the budget.
#[derive(Debug)]
pub struct WorkGate {
    condition: StopCondition,
    claimed: AtomicU64,
    deadline: OnceLock<Instant>,
}

impl WorkGate {
    #[must_use]
    pub fn new(condition: StopCondition) -> Self {
        Self {
            condition,
            claimed: AtomicU64::new(0),
            deadline: OnceLock::new(),
        }
    }

    /// Arm the deadline relative to an explicit run start.
    pub fn start_at(&self, started: Instant) {
        if let StopCondition::Duration(duration) = self.condition {
            let _ = self.deadline.set(started + duration);
        }
    }

    /// Claim permission for one more unit of work.
    pub fn next(&self) -> bool {
        match self.condition {
            StopCondition::Duration(duration) => {
                let now = Instant::now();
                // Lazily arm from the first observed claim if the runner
                // didn't set an explicit start time.
                let deadline = *self.deadline.get_or_init(|| now + duration);
                now < deadline
            }
            StopCondition::Requests(total) => {
                self.claimed.fetch_add(1, Ordering::Relaxed) < total
            }
        }
    }
}
