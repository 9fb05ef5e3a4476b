//! Records of piecewise-linear bound propagations.
use smallvec::SmallVec;

use plcheck_problem::{BoundSide, ConstraintKind, Var};

/// A coefficient vector over the original tableau rows.
///
/// An empty vector means the explained bound is the ground bound itself.
pub type Explanation = Vec<f64>;

/// An immutable record of one piecewise-linear propagation.
///
/// "From this bound on the causing variable(s), the constraint forces
/// `bound` on the affected variable's side." The stored explanations capture
/// the causing bounds at the moment the propagation happened, so the checker
/// can recompute them from original data alone.
#[derive(Clone, Debug)]
pub struct PlcLemma {
    causing_vars: SmallVec<[Var; 2]>,
    causing_side: BoundSide,
    affected_var: Var,
    affected_side: BoundSide,
    bound: f64,
    kind: ConstraintKind,
    explanations: Vec<Explanation>,
}

impl PlcLemma {
    /// Create a lemma record.
    ///
    /// `explanations` holds one vector per causing variable and may be empty
    /// altogether, meaning every causing bound is the ground bound. ReLU and
    /// Sign propagations have one causing variable, AbsoluteValue has two
    /// (the upper and the lower bound of the input).
    pub fn new(
        causing_vars: impl IntoIterator<Item = Var>,
        causing_side: BoundSide,
        affected_var: Var,
        affected_side: BoundSide,
        bound: f64,
        kind: ConstraintKind,
        explanations: Vec<Explanation>,
    ) -> PlcLemma {
        let causing_vars: SmallVec<[Var; 2]> = causing_vars.into_iter().collect();

        debug_assert!(!causing_vars.is_empty());
        debug_assert!(explanations.is_empty() || explanations.len() == causing_vars.len());
        match kind {
            ConstraintKind::Relu | ConstraintKind::Sign => {
                debug_assert_eq!(causing_vars.len(), 1)
            }
            ConstraintKind::AbsoluteValue => debug_assert_eq!(causing_vars.len(), 2),
            _ => (),
        }

        PlcLemma {
            causing_vars,
            causing_side,
            affected_var,
            affected_side,
            bound,
            kind,
            explanations,
        }
    }

    /// The causing variables, one or two.
    pub fn causing_vars(&self) -> &[Var] {
        &self.causing_vars
    }

    /// The first causing variable.
    pub fn causing_var(&self) -> Var {
        self.causing_vars[0]
    }

    /// The side of the causing bound.
    pub fn causing_side(&self) -> BoundSide {
        self.causing_side
    }

    /// The variable whose bound the lemma tightens.
    pub fn affected_var(&self) -> Var {
        self.affected_var
    }

    /// The side of the affected bound.
    pub fn affected_side(&self) -> BoundSide {
        self.affected_side
    }

    /// The claimed new bound value.
    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// The constraint kind whose rule justified the propagation.
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// The explanation of the `index`-th causing bound.
    ///
    /// Empty when the causing bound was the ground bound.
    pub fn explanation(&self, index: usize) -> &[f64] {
        self.explanations.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}
