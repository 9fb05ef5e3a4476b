//! Runtime state of the problem constraints during a traversal.
use plcheck_problem::{Phase, PlcConstraint, ProblemConstraint};

/// A restorable copy of the constraint state.
#[derive(Clone, Debug)]
pub struct ConstraintSnapshot {
    phases: Vec<Phase>,
    feasible: Vec<Vec<bool>>,
}

/// Phase statuses and feasible-disjunct masks, indexed like the problem's
/// constraint list.
///
/// The constraints themselves are immutable; everything branch-dependent
/// lives here so it can be snapshotted on descent and restored on ascent.
#[derive(Default, Debug)]
pub struct ConstraintState {
    phases: Vec<Phase>,
    feasible: Vec<Vec<bool>>,
}

impl ConstraintState {
    /// Create the state for a constraint list, starting from the recorded
    /// initial phases with every disjunct feasible.
    pub fn new(constraints: &[ProblemConstraint]) -> ConstraintState {
        let mut state = ConstraintState::default();
        state.reset(constraints);
        state
    }

    /// Reinitialize for a fresh traversal.
    pub fn reset(&mut self, constraints: &[ProblemConstraint]) {
        self.phases = constraints
            .iter()
            .map(|constraint| constraint.initial_phase)
            .collect();
        self.feasible = constraints
            .iter()
            .map(|constraint| match &constraint.constraint {
                PlcConstraint::Disjunction { disjuncts } => vec![true; disjuncts.len()],
                _ => vec![],
            })
            .collect();
    }

    /// The current phase of constraint `index`.
    pub fn phase(&self, index: usize) -> Phase {
        self.phases[index]
    }

    /// Set the phase of constraint `index`.
    pub fn set_phase(&mut self, index: usize, phase: Phase) {
        self.phases[index] = phase;
    }

    /// The feasibility mask of a disjunction constraint; empty for other
    /// kinds.
    pub fn feasible_mask(&self, index: usize) -> &[bool] {
        &self.feasible[index]
    }

    /// Mark one disjunct of constraint `index` as feasible or not.
    pub fn set_feasible(&mut self, index: usize, disjunct: usize, feasible: bool) {
        self.feasible[index][disjunct] = feasible;
    }

    /// A copy sufficient to undo any mutation since it was taken.
    pub fn snapshot(&self) -> ConstraintSnapshot {
        ConstraintSnapshot {
            phases: self.phases.clone(),
            feasible: self.feasible.clone(),
        }
    }

    /// Return to a previously taken snapshot.
    pub fn restore(&mut self, snapshot: ConstraintSnapshot) {
        self.phases = snapshot.phases;
        self.feasible = snapshot.feasible;
    }
}
