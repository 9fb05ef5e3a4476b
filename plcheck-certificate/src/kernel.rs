//! Recomputing derived bounds from stored explanations.
//!
//! An explanation is a coefficient vector over the original equation rows.
//! Since every row asserts `sum(c_i * x_i) = 0`, any linear combination of
//! rows is itself zero, and solving the combination for one variable
//! expresses that variable through all others. Evaluating the solved form
//! against the ground bounds yields the tightest bound the combination
//! alone supports.

use plcheck_problem::float;
use plcheck_problem::{BoundSide, Bounds, Tableau, Var};

/// The negated dense combination of tableau rows scaled by `explanation`.
///
/// Since `0 = sum(c_v * x_v) = (c - 1)*x + x + sum over v != x of c_v * x_v`
/// for any variable `x`, we have `x = -sum over v != x of c_v * x_v -
/// (c - 1)*x`, which is why the combination is returned negated.
pub fn row_combination(explanation: &[f64], tableau: &Tableau) -> Vec<f64> {
    debug_assert_eq!(explanation.len(), tableau.row_count());

    let mut combination = vec![0.0; tableau.column_count()];
    for (row, &scale) in tableau.rows().zip(explanation.iter()) {
        if float::is_zero(scale) {
            continue;
        }
        for &(var, coefficient) in row.entries() {
            if !float::is_zero(coefficient) {
                combination[var.index()] += coefficient * scale;
            }
        }
    }

    for value in combination.iter_mut() {
        *value = if float::is_zero(*value) { 0.0 } else { -*value };
    }

    combination
}

/// Recompute the bound of `(var, side)` described by `explanation`.
///
/// An empty or all-zero explanation denotes the ground bound. The result is
/// the tightest bound on `var` the combination alone supports; whether it
/// improves the current bound is the caller's decision.
pub fn explained_bound(
    var: Var,
    side: BoundSide,
    explanation: &[f64],
    tableau: &Tableau,
    ground_bounds: &Bounds,
) -> f64 {
    if explanation.is_empty() || explanation.iter().all(|&value| float::is_zero(value)) {
        return ground_bounds.get(var, side);
    }

    let mut combination = row_combination(explanation, tableau);
    // Extract `var` from the combination so that it cancels.
    combination[var.index()] = 0.0;

    evaluate(&combination, side, ground_bounds)
}

/// The upper bound of the row combination described by `combination`.
///
/// This is the contradiction check: a combination of equations each equal to
/// zero whose upper bound is strictly negative implies `0 < 0`.
pub fn combination_upper_bound(
    combination: &[f64],
    tableau: &Tableau,
    ground_bounds: &Bounds,
) -> f64 {
    let negated = row_combination(combination, tableau);
    evaluate(&negated, BoundSide::Upper, ground_bounds)
}

/// Evaluate a dense linear form against the ground bounds.
///
/// For an upper bound, positive coefficients pick the variable's ground
/// upper bound and negative ones its ground lower bound; mirrored for a
/// lower bound.
fn evaluate(combination: &[f64], side: BoundSide, ground_bounds: &Bounds) -> f64 {
    let mut derived = 0.0;
    for (index, &coefficient) in combination.iter().enumerate() {
        if float::is_zero(coefficient) {
            continue;
        }
        let var = Var::from_index(index);
        let picked_side = if float::is_positive(coefficient) {
            side
        } else {
            side.opposite()
        };
        let term = coefficient * ground_bounds.get(var, picked_side);
        if !float::is_zero(term) {
            derived += term;
        }
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcheck_problem::test::{ground_bounds, slack_tableau};
    use plcheck_problem::var;
    use plcheck_problem::SparseRow;

    use proptest::prelude::*;

    fn two_var_tableau() -> Tableau {
        // x0 + x1 = 0
        Tableau::new(
            vec![SparseRow::from_entries(vec![(var!(0), 1.0), (var!(1), 1.0)])],
            2,
        )
    }

    #[test]
    fn empty_explanation_returns_the_ground_bound() {
        let tableau = two_var_tableau();
        let bounds = Bounds::new(vec![1.0, 2.0], vec![-1.0, 0.5]);

        assert_eq!(
            explained_bound(var!(1), BoundSide::Upper, &[], &tableau, &bounds),
            2.0
        );
        assert_eq!(
            explained_bound(var!(1), BoundSide::Lower, &[], &tableau, &bounds),
            0.5
        );
        // An all-zero explanation reads the same as an empty one.
        assert_eq!(
            explained_bound(var!(0), BoundSide::Upper, &[0.0], &tableau, &bounds),
            1.0
        );
    }

    #[test]
    fn single_row_explanation_solves_for_the_variable() {
        let tableau = two_var_tableau();
        let bounds = Bounds::new(vec![1.0, 2.0], vec![-1.0, 0.5]);

        // From x0 + x1 = 0: x0 = -x1, so ub(x0) = -lb(x1) and lb(x0) = -ub(x1).
        assert_eq!(
            explained_bound(var!(0), BoundSide::Upper, &[1.0], &tableau, &bounds),
            -0.5
        );
        assert_eq!(
            explained_bound(var!(0), BoundSide::Lower, &[1.0], &tableau, &bounds),
            -2.0
        );
    }

    #[test]
    fn combination_bound_is_the_negated_sum() {
        let tableau = two_var_tableau();
        let bounds = Bounds::new(vec![1.0, 1.0], vec![0.0, 0.0]);

        // -(x0 + x1) has upper bound -(lb(x0) + lb(x1)) = 0.
        assert_eq!(combination_upper_bound(&[1.0], &tableau, &bounds), 0.0);
    }

    proptest! {
        #[test]
        fn ground_bound_idempotence(
            bounds in ground_bounds(1..20usize),
            side_is_upper in proptest::bool::ANY,
        ) {
            let tableau = Tableau::new(vec![], bounds.len());
            let side = if side_is_upper { BoundSide::Upper } else { BoundSide::Lower };
            for index in 0..bounds.len() {
                let var = Var::from_index(index);
                prop_assert_eq!(
                    explained_bound(var, side, &[], &tableau, &bounds),
                    bounds.get(var, side)
                );
            }
        }

        #[test]
        fn explained_upper_bound_is_sound(
            tableau in slack_tableau(2..5usize, 1..4usize),
            row_index in 0..4usize,
        ) {
            // Solving a single original row for its slack variable must
            // reproduce evaluating the row body at its ground bounds.
            let row_count = tableau.row_count();
            let row_index = row_index % row_count;
            let basic_count = tableau.column_count() - row_count;
            let bounds = Bounds::new(
                vec![1.0; tableau.column_count()],
                vec![-1.0; tableau.column_count()],
            );

            let mut explanation = vec![0.0; row_count];
            explanation[row_index] = 1.0;
            let slack = Var::from_index(basic_count + row_index);

            let derived = explained_bound(slack, BoundSide::Upper, &explanation, &tableau, &bounds);

            // slack = the body sum, so its upper bound is sum of |c_i| over the body.
            let mut expected = 0.0;
            for &(var, coefficient) in tableau.row(row_index).entries() {
                if var != slack {
                    expected += coefficient.abs();
                }
            }
            prop_assert!((derived - expected).abs() < 1e-9);
        }
    }
}
