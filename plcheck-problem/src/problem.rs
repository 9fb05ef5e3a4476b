//! The immutable query snapshot consumed by the checker.
use crate::constraint::{Phase, PlcConstraint};
use crate::rows::Tableau;
use crate::vars::Bounds;

/// A piecewise-linear constraint together with its phase on query entry.
#[derive(Clone, Debug)]
pub struct ProblemConstraint {
    pub constraint: PlcConstraint,
    pub initial_phase: Phase,
}

impl ProblemConstraint {
    /// A constraint whose phase is still open.
    pub fn unfixed(constraint: PlcConstraint) -> ProblemConstraint {
        ProblemConstraint {
            constraint,
            initial_phase: Phase::NotFixed,
        }
    }
}

/// The original problem: tableau, ground bounds and constraints.
///
/// The checker never mutates a `Problem`; every bound change during checking
/// happens on working copies that are restored on backtracking.
#[derive(Clone, Default, Debug)]
pub struct Problem {
    pub tableau: Tableau,
    pub ground_bounds: Bounds,
    pub constraints: Vec<ProblemConstraint>,
}

impl Problem {
    /// Create a snapshot from its parts.
    pub fn new(
        tableau: Tableau,
        ground_bounds: Bounds,
        constraints: Vec<ProblemConstraint>,
    ) -> Problem {
        debug_assert!(
            tableau.column_count() == 0 || tableau.column_count() == ground_bounds.len()
        );
        Problem {
            tableau,
            ground_bounds,
            constraints,
        }
    }

    /// Number of variables (`n`).
    pub fn var_count(&self) -> usize {
        self.ground_bounds.len()
    }

    /// Number of original equation rows (`m`).
    pub fn row_count(&self) -> usize {
        self.tableau.row_count()
    }
}
