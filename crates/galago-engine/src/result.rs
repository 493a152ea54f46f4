use std::fmt;

use serde::Serialize;

/// Kind of a hole registered by the symbolic coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoleKind {
    /// Selects which state variable an inner tree node splits on.
    Decision,
    /// Interval-typed split bound of an inner node for one variable.
    Threshold,
    /// Selects the action executed at a terminal node.
    Action,
}

impl fmt::Display for HoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoleKind::Decision => write!(f, "decision"),
            HoleKind::Threshold => write!(f, "threshold"),
            HoleKind::Action => write!(f, "action"),
        }
    }
}

/// Name and kind of one registered hole, in hole-id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoleInfo {
    pub name: String,
    pub kind: HoleKind,
}

/// Outcome of a consistency query over a set of choices.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyOutcome {
    /// True iff a single hole assignment selects every queried choice.
    pub consistent: bool,
    /// Per-hole options: the one-element assignment when consistent, the
    /// set of conflicting options otherwise (empty for uninvolved holes).
    pub hole_options: Vec<Vec<usize>>,
}

impl fmt::Display for ConsistencyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.consistent {
            write!(f, "consistent:")?;
        } else {
            write!(f, "inconsistent:")?;
        }
        for (hole, options) in self.hole_options.iter().enumerate() {
            if options.is_empty() {
                continue;
            }
            write!(f, " {hole}={options:?}")?;
        }
        Ok(())
    }
}

/// Aggregated profiling for one counterexample generator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CexProfile {
    /// Completed `construct_conflict` calls.
    pub conflicts: u64,
    /// Waves explored across all conflicts.
    pub waves: u64,
    /// External model-check invocations.
    pub checker_calls: u64,
    pub prepare_elapsed_ms: u128,
    pub explore_elapsed_ms: u128,
    pub check_elapsed_ms: u128,
}

impl fmt::Display for CexProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicts={} waves={} checker_calls={} prepare={}ms explore={}ms check={}ms",
            self.conflicts,
            self.waves,
            self.checker_calls,
            self.prepare_elapsed_ms,
            self.explore_elapsed_ms,
            self.check_elapsed_ms,
        )
    }
}
