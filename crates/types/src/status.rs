use serde::{Deserialize, Serialize};

/// A function's observed status. Ordered per the monotonicity invariant:
/// `Pending < {Invoked, NotInvoked} < Running < {Completed, Failed, Skipped, Timeout}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionStatus {
    Pending,
    Invoked,
    NotInvoked,
    Running,
    Completed,
    Failed,
    Skipped,
    Timeout,
}

impl FunctionStatus {
    fn rank(self) -> u8 {
        match self {
            FunctionStatus::Pending => 0,
            FunctionStatus::Invoked | FunctionStatus::NotInvoked => 1,
            FunctionStatus::Running => 2,
            FunctionStatus::Completed
            | FunctionStatus::Failed
            | FunctionStatus::Skipped
            | FunctionStatus::Timeout => 3,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(
            self,
            FunctionStatus::Completed
                | FunctionStatus::NotInvoked
                | FunctionStatus::Failed
                | FunctionStatus::Skipped
                | FunctionStatus::Timeout
        )
    }

    /// Whether moving from `self` to `next` respects the monotonicity
    /// invariant. A transition to the same status is always permitted (it is
    /// a no-op from the caller's perspective, e.g. re-evaluating Failed on
    /// `LogComplete` after the tailer was already stopped for that reason).
    pub fn can_transition_to(self, next: FunctionStatus) -> bool {
        if self.is_final() {
            // Re-evaluating a final status (e.g. Failed re-checked on
            // LogComplete) is idempotent, but a final status must never
            // move laterally into a different final status.
            return next == self;
        }
        next.rank() >= self.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_states() {
        assert!(FunctionStatus::Completed.is_final());
        assert!(FunctionStatus::NotInvoked.is_final());
        assert!(FunctionStatus::Failed.is_final());
        assert!(FunctionStatus::Skipped.is_final());
        assert!(FunctionStatus::Timeout.is_final());
        assert!(!FunctionStatus::Pending.is_final());
        assert!(!FunctionStatus::Invoked.is_final());
        assert!(!FunctionStatus::Running.is_final());
    }

    #[test]
    fn monotonicity_forbids_regression() {
        assert!(FunctionStatus::Pending.can_transition_to(FunctionStatus::Invoked));
        assert!(FunctionStatus::Invoked.can_transition_to(FunctionStatus::Running));
        assert!(FunctionStatus::Running.can_transition_to(FunctionStatus::Completed));
        assert!(!FunctionStatus::Completed.can_transition_to(FunctionStatus::Running));
        assert!(!FunctionStatus::Failed.can_transition_to(FunctionStatus::Completed));
        // Idempotent re-evaluation after Failed is allowed (same status).
        assert!(FunctionStatus::Failed.can_transition_to(FunctionStatus::Failed));
    }
}
