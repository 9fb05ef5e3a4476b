//! Piecewise-linear constraints and their phases.
use std::fmt;

use crate::split::CaseSplit;
use crate::vars::Var;

/// The closed set of supported piecewise-linear constraint kinds.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ConstraintKind {
    Relu,
    Sign,
    AbsoluteValue,
    Max,
    Disjunction,
}

/// The active case of a piecewise-linear constraint after branching.
///
/// `Active`/`Inactive` are the ReLU phases, `Positive`/`Negative` the Sign
/// and AbsoluteValue phases. Max and Disjunction constraints track their case
/// through the feasible-disjunct set instead.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Phase {
    NotFixed,
    Active,
    Inactive,
    Positive,
    Negative,
}

impl Phase {
    /// True unless the phase is still open.
    pub fn is_fixed(self) -> bool {
        self != Phase::NotFixed
    }
}

impl Default for Phase {
    fn default() -> Phase {
        Phase::NotFixed
    }
}

/// A piecewise-linear constraint of the original query.
///
/// Each variant carries its participating variables. For `Max`, elements
/// eliminated before the snapshot was taken are kept alongside the largest
/// upper bound they contributed, and the defining case split of every
/// remaining element is part of the snapshot.
#[derive(Clone, Debug)]
pub enum PlcConstraint {
    /// `f = max(b, 0)` with `aux = f - b` in the active phase encoding.
    Relu { b: Var, f: Var, aux: Var },
    /// `f = sign(b)`, i.e. `f in {-1, 1}`.
    Sign { b: Var, f: Var },
    /// `f = |b|` with one auxiliary variable per phase.
    AbsoluteValue {
        b: Var,
        f: Var,
        pos_aux: Var,
        neg_aux: Var,
    },
    /// `f = max(elements)`.
    Max {
        f: Var,
        elements: Vec<Var>,
        eliminated: Vec<Var>,
        /// Largest upper bound among eliminated elements; -infinity when none were
        /// eliminated.
        max_eliminated: f64,
        /// The defining case split of each remaining element, in element
        /// order.
        element_splits: Vec<CaseSplit>,
    },
    /// A disjunction of case splits.
    Disjunction { disjuncts: Vec<CaseSplit> },
}

impl PlcConstraint {
    /// The kind tag of this constraint.
    pub fn kind(&self) -> ConstraintKind {
        match self {
            PlcConstraint::Relu { .. } => ConstraintKind::Relu,
            PlcConstraint::Sign { .. } => ConstraintKind::Sign,
            PlcConstraint::AbsoluteValue { .. } => ConstraintKind::AbsoluteValue,
            PlcConstraint::Max { .. } => ConstraintKind::Max,
            PlcConstraint::Disjunction { .. } => ConstraintKind::Disjunction,
        }
    }

    /// The participating variables, in the constraint's canonical order.
    ///
    /// For `Max` this includes eliminated elements; for `Disjunction` every
    /// variable mentioned by a disjunct.
    pub fn participants(&self) -> Vec<Var> {
        match self {
            PlcConstraint::Relu { b, f, aux } => vec![*b, *f, *aux],
            PlcConstraint::Sign { b, f } => vec![*b, *f],
            PlcConstraint::AbsoluteValue {
                b,
                f,
                pos_aux,
                neg_aux,
            } => vec![*b, *f, *pos_aux, *neg_aux],
            PlcConstraint::Max {
                f,
                elements,
                eliminated,
                ..
            } => {
                let mut vars = vec![*f];
                vars.extend_from_slice(elements);
                vars.extend_from_slice(eliminated);
                vars
            }
            PlcConstraint::Disjunction { disjuncts } => {
                let mut vars = vec![];
                for disjunct in disjuncts {
                    for tightening in disjunct.tightenings() {
                        if !vars.contains(&tightening.var) {
                            vars.push(tightening.var);
                        }
                    }
                    for equation in disjunct.equations() {
                        for &(_, var) in equation.addends.iter() {
                            if !vars.contains(&var) {
                                vars.push(var);
                            }
                        }
                    }
                }
                vars
            }
        }
    }

    /// True when `var` participates in this constraint.
    pub fn participates(&self, var: Var) -> bool {
        self.participants().contains(&var)
    }
}

impl fmt::Display for PlcConstraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlcConstraint::Relu { b, f: out, aux } => {
                write!(f, "{} = relu({}) [aux {}]", out, b, aux)
            }
            PlcConstraint::Sign { b, f: out } => write!(f, "{} = sign({})", out, b),
            PlcConstraint::AbsoluteValue { b, f: out, .. } => write!(f, "{} = abs({})", out, b),
            PlcConstraint::Max { f: out, elements, .. } => {
                write!(f, "{} = max of {} elements", out, elements.len())
            }
            PlcConstraint::Disjunction { disjuncts } => {
                write!(f, "disjunction of {} cases", disjuncts.len())
            }
        }
    }
}
