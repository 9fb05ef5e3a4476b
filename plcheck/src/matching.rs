//! Matching children splits to the problem constraint that was split on.
use plcheck_problem::float;
use plcheck_problem::{BoundSide, CaseSplit, PlcConstraint, ProblemConstraint, Tightening};

use crate::constraints::ConstraintState;

/// Find the problem constraint whose case splits the children splits
/// realize, trying each kind-specific matcher in turn.
pub fn corresponding_constraint(
    constraints: &[ProblemConstraint],
    state: &ConstraintState,
    splits: &[&CaseSplit],
) -> Option<usize> {
    corresponding_relu(constraints, splits)
        .or_else(|| corresponding_sign(constraints, splits))
        .or_else(|| corresponding_abs(constraints, splits))
        .or_else(|| corresponding_max(constraints, splits))
        .or_else(|| corresponding_disjunction(constraints, state, splits))
}

/// True for a two-way split `(v <= c, v >= c)` on a single variable.
///
/// Allowed even when no constraint matches.
pub fn single_var_split(splits: &[&CaseSplit]) -> bool {
    if splits.len() != 2 {
        return false;
    }

    let first = splits[0].tightenings();
    let second = splits[1].tightenings();
    if first.len() != 1 || second.len() != 1 {
        return false;
    }

    first[0].var == second[0].var
        && float::are_equal(first[0].value, second[0].value)
        && first[0].side != second[0].side
}

/// Order the two splits of a dichotomy as (lower-led, upper-led).
fn by_leading_side<'a>(
    splits: &[&'a CaseSplit],
) -> Option<(&'a [Tightening], &'a [Tightening])> {
    if splits.len() != 2 {
        return None;
    }
    let first = splits[0].tightenings();
    let second = splits[1].tightenings();
    if first.is_empty() || second.is_empty() {
        return None;
    }
    if first[0].side == BoundSide::Lower {
        Some((first, second))
    } else {
        Some((second, first))
    }
}

/// Match a ReLU split pair.
///
/// The active child asserts `b >= 0` (optionally also `aux <= 0`), the
/// inactive child `b <= 0, f <= 0`; all split values are zero.
fn corresponding_relu(constraints: &[ProblemConstraint], splits: &[&CaseSplit]) -> Option<usize> {
    let (active, inactive) = by_leading_side(splits)?;

    if !(active.len() == 1 || active.len() == 2) || inactive.len() != 2 {
        return None;
    }

    let b = active[0].var;
    let aux = active[active.len() - 1].var;
    let f = inactive[1].var;

    let all_zero = active
        .iter()
        .chain(inactive.iter())
        .all(|tightening| !float::are_disequal(tightening.value, 0.0));
    if !all_zero {
        return None;
    }

    constraints
        .iter()
        .position(|problem_constraint| match problem_constraint.constraint {
            PlcConstraint::Relu {
                b: relu_b,
                f: relu_f,
                aux: relu_aux,
            } => {
                relu_b == b
                    && [relu_b, relu_f, relu_aux].contains(&f)
                    && (active.len() == 1 || relu_aux == aux)
            }
            _ => false,
        })
}

/// Match a Sign split pair: `(b >= 0, f >= 1)` against `(b <= 0, f <= -1)`.
fn corresponding_sign(constraints: &[ProblemConstraint], splits: &[&CaseSplit]) -> Option<usize> {
    let (positive, negative) = by_leading_side(splits)?;

    if positive.len() != 2 || negative.len() != 2 {
        return None;
    }
    if positive.iter().any(|tightening| tightening.side != BoundSide::Lower)
        || negative.iter().any(|tightening| tightening.side != BoundSide::Upper)
    {
        return None;
    }
    if float::are_disequal(positive[0].value, 0.0)
        || float::are_disequal(positive[1].value, 1.0)
        || float::are_disequal(negative[0].value, 0.0)
        || float::are_disequal(negative[1].value, -1.0)
    {
        return None;
    }

    let b = positive[0].var;
    let f = positive[1].var;

    constraints
        .iter()
        .position(|problem_constraint| match problem_constraint.constraint {
            PlcConstraint::Sign {
                b: sign_b,
                f: sign_f,
            } => sign_b == b && sign_f == f,
            _ => false,
        })
}

/// Match an AbsoluteValue split pair.
///
/// The positive child asserts `b >= 0, pos_aux <= 0`, the negative child
/// `b <= 0, neg_aux <= 0`; all split values are zero.
fn corresponding_abs(constraints: &[ProblemConstraint], splits: &[&CaseSplit]) -> Option<usize> {
    let (positive, negative) = by_leading_side(splits)?;

    if positive.len() != 2 || negative.len() != 2 {
        return None;
    }
    if positive[0].side != BoundSide::Lower
        || positive[1].side != BoundSide::Upper
        || negative.iter().any(|tightening| tightening.side != BoundSide::Upper)
    {
        return None;
    }

    let all_zero = positive
        .iter()
        .chain(negative.iter())
        .all(|tightening| !float::are_disequal(tightening.value, 0.0));
    if !all_zero {
        return None;
    }

    let b = positive[0].var;
    let pos_aux = positive[1].var;
    let neg_aux = negative[1].var;

    constraints
        .iter()
        .position(|problem_constraint| match problem_constraint.constraint {
            PlcConstraint::AbsoluteValue {
                b: abs_b,
                pos_aux: abs_pos,
                neg_aux: abs_neg,
                ..
            } => abs_b == b && abs_pos == pos_aux && abs_neg == neg_aux,
            _ => false,
        })
}

/// Match a Max split family.
///
/// Every child split must be one of the constraint's defining element
/// splits, extended by one `e <= 0` split per eliminated element.
fn corresponding_max(constraints: &[ProblemConstraint], splits: &[&CaseSplit]) -> Option<usize> {
    for (index, problem_constraint) in constraints.iter().enumerate() {
        let (element_splits, eliminated) = match &problem_constraint.constraint {
            PlcConstraint::Max {
                element_splits,
                eliminated,
                ..
            } => (element_splits, eliminated),
            _ => continue,
        };

        let mut defining: Vec<CaseSplit> = element_splits.clone();
        for &element in eliminated.iter() {
            defining.push(CaseSplit::of_tightenings(vec![Tightening::new(
                element,
                0.0,
                BoundSide::Upper,
            )]));
        }

        let matched = splits
            .iter()
            .all(|split| defining.iter().any(|defining_split| defining_split.matches(split)));
        if matched {
            return Some(index);
        }
    }
    None
}

/// Match a Disjunction: the children splits equal the currently feasible
/// disjuncts as a set.
fn corresponding_disjunction(
    constraints: &[ProblemConstraint],
    state: &ConstraintState,
    splits: &[&CaseSplit],
) -> Option<usize> {
    for (index, problem_constraint) in constraints.iter().enumerate() {
        let disjuncts = match &problem_constraint.constraint {
            PlcConstraint::Disjunction { disjuncts } => disjuncts,
            _ => continue,
        };

        let mask = state.feasible_mask(index);
        let feasible: Vec<&CaseSplit> = disjuncts
            .iter()
            .enumerate()
            .filter(|&(disjunct, _)| mask[disjunct])
            .map(|(_, split)| split)
            .collect();

        let covered = splits
            .iter()
            .all(|split| feasible.iter().any(|disjunct| disjunct.matches(split)));
        let covering = feasible
            .iter()
            .all(|disjunct| splits.iter().any(|split| split.matches(disjunct)));
        if covered && covering {
            return Some(index);
        }
    }
    None
}
