//! The closed set of per-Entry statuses, ordered for UI coloring.

use serde::{Deserialize, Serialize};

/// Status of one (path, tool) Entry. Declaration order is the severity
/// order used to sort the summary table and to pick swatch colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Not yet run for this snapshot.
    Pending,
    /// Assigned to a worker.
    Running,
    /// Tool exit 0, classified as success.
    Ok,
    /// Tool ran to completion but reported defects.
    Problem,
    /// Tool declined the file (applicable_predicate false, or shebang mismatch).
    NotApplicable,
    /// Exceeded timeout_s.
    TimedOut,
    /// Crashed, missing executable, or unclassifiable failure.
    Error,
    /// Was running when the user paused; resumable.
    Paused,
}

impl Status {
    /// A terminal status is one for which a retrievable body is required
    /// (invariant 4: the cache contains a body iff status is terminal).
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Ok | Status::Problem | Status::TimedOut | Status::Error)
    }

    /// Whether "next issue" navigation should stop on this Entry.
    pub fn is_issue(self) -> bool {
        matches!(self, Status::Problem | Status::TimedOut | Status::Error)
    }

    /// Fallback 8-color swatch for terminals without true-color support.
    pub fn fallback_color_index(self) -> u8 {
        match self {
            Status::Pending => 8,   // bright black / gray
            Status::Running => 6,   // cyan
            Status::Ok => 2,        // green
            Status::Problem => 3,   // yellow
            Status::NotApplicable => 8,
            Status::TimedOut => 5,  // magenta
            Status::Error => 1,     // red
            Status::Paused => 4,    // blue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_matches_declaration() {
        assert!(Status::Pending < Status::Running);
        assert!(Status::Running < Status::Ok);
        assert!(Status::Ok < Status::Problem);
        assert!(Status::Error < Status::Paused);
    }

    #[test]
    fn terminal_statuses() {
        assert!(Status::Ok.is_terminal());
        assert!(Status::Problem.is_terminal());
        assert!(Status::TimedOut.is_terminal());
        assert!(Status::Error.is_terminal());
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Running.is_terminal());
        assert!(!Status::NotApplicable.is_terminal());
        assert!(!Status::Paused.is_terminal());
    }

    #[test]
    fn issue_statuses() {
        assert!(Status::Problem.is_issue());
        assert!(Status::TimedOut.is_issue());
        assert!(Status::Error.is_issue());
        assert!(!Status::Ok.is_issue());
    }
}
