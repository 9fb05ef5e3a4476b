//! Bound tightenings, linear equations and case splits.
use crate::float;
use crate::vars::{BoundSide, Var};

/// A single bound tightening `(variable, value, side)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tightening {
    pub var: Var,
    pub value: f64,
    pub side: BoundSide,
}

impl Tightening {
    /// Create a tightening.
    pub fn new(var: Var, value: f64, side: BoundSide) -> Tightening {
        Tightening { var, value, side }
    }

    /// True when both describe the same bound up to the comparison epsilon.
    pub fn matches(&self, other: &Tightening) -> bool {
        self.var == other.var
            && self.side == other.side
            && float::are_equal(self.value, other.value)
    }
}

/// Relation of an equation's scalar to its linear form.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Relation {
    /// `scalar = sum of addends`
    Eq,
    /// `sum of addends <= scalar`
    Le,
    /// `sum of addends >= scalar`
    Ge,
}

/// A linear equation `scalar (=|>=|<=) sum(c_i * x_i)` carried by a disjunct.
#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    pub addends: Vec<(f64, Var)>,
    pub scalar: f64,
    pub relation: Relation,
}

impl Equation {
    /// Create an equation from addends, a scalar and a relation.
    pub fn new(addends: Vec<(f64, Var)>, scalar: f64, relation: Relation) -> Equation {
        Equation {
            addends,
            scalar,
            relation,
        }
    }

    /// True when both equations agree up to the comparison epsilon.
    pub fn matches(&self, other: &Equation) -> bool {
        self.relation == other.relation
            && float::are_equal(self.scalar, other.scalar)
            && self.addends.len() == other.addends.len()
            && self
                .addends
                .iter()
                .zip(other.addends.iter())
                .all(|(&(coefficient, var), &(other_coefficient, other_var))| {
                    var == other_var && float::are_equal(coefficient, other_coefficient)
                })
    }
}

/// A case split: the set of tightenings (and disjunct equations) asserted
/// when descending into a child of a certificate node.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct CaseSplit {
    tightenings: Vec<Tightening>,
    equations: Vec<Equation>,
}

impl CaseSplit {
    /// Create an empty split, as carried by the certificate root.
    pub fn new() -> CaseSplit {
        CaseSplit::default()
    }

    /// Create a split of plain tightenings.
    pub fn of_tightenings(tightenings: Vec<Tightening>) -> CaseSplit {
        CaseSplit {
            tightenings,
            equations: vec![],
        }
    }

    /// Append a tightening.
    pub fn add_tightening(&mut self, tightening: Tightening) {
        self.tightenings.push(tightening);
    }

    /// Append an equation.
    pub fn add_equation(&mut self, equation: Equation) {
        self.equations.push(equation);
    }

    /// The stored tightenings, in insertion order.
    pub fn tightenings(&self) -> &[Tightening] {
        &self.tightenings
    }

    /// The stored equations, in insertion order.
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// True when the split asserts nothing.
    pub fn is_empty(&self) -> bool {
        self.tightenings.is_empty() && self.equations.is_empty()
    }

    /// True when both splits assert the same bounds and equations.
    ///
    /// Tightenings are compared as sets, equations in order; values compare
    /// up to the comparison epsilon. Used by the Max and Disjunction
    /// matchers, where the certificate's split order need not follow the
    /// constraint's.
    pub fn matches(&self, other: &CaseSplit) -> bool {
        self.tightenings.len() == other.tightenings.len()
            && self.equations.len() == other.equations.len()
            && self
                .tightenings
                .iter()
                .all(|tightening| other.tightenings.iter().any(|t| tightening.matches(t)))
            && other
                .tightenings
                .iter()
                .all(|tightening| self.tightenings.iter().any(|t| tightening.matches(t)))
            && self
                .equations
                .iter()
                .zip(other.equations.iter())
                .all(|(equation, other_equation)| equation.matches(other_equation))
    }
}
