//! The per-variable bound explanation store.
use plcheck_problem::float;
use plcheck_problem::{BoundSide, SparseRow, TableauRow, Var};

use crate::lemma::Explanation;

/// Configuration of the bound explainer.
#[derive(Copy, Clone, Debug)]
pub struct ExplainerConfig {
    /// Whether explanations are recorded at all. A disabled explainer turns
    /// every update into a no-op and reports ground bounds everywhere.
    ///
    /// [default: true]
    pub enabled: bool,
}

impl Default for ExplainerConfig {
    fn default() -> ExplainerConfig {
        ExplainerConfig { enabled: true }
    }
}

/// Explanations of the current bounds of all variables.
///
/// For every variable and side the store keeps a coefficient vector over the
/// original tableau rows; combining the rows with these coefficients and
/// evaluating against the ground bounds reproduces the derived bound. An
/// empty vector means the bound is the ground bound itself.
///
/// The store is written during solving and travels with the certificate; the
/// checker only reads the explanations recorded in lemmas and
/// contradictions.
#[derive(Clone, Debug)]
pub struct BoundExplainer {
    var_count: usize,
    row_count: usize,
    enabled: bool,
    upper: Vec<Explanation>,
    lower: Vec<Explanation>,
}

impl BoundExplainer {
    /// Create an explainer for `var_count` variables over `row_count` rows,
    /// with every bound initially explained by its ground bound.
    pub fn new(var_count: usize, row_count: usize, config: ExplainerConfig) -> BoundExplainer {
        BoundExplainer {
            var_count,
            row_count,
            enabled: config.enabled,
            upper: vec![vec![]; var_count],
            lower: vec![vec![]; var_count],
        }
    }

    /// Number of variables covered.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Number of original rows explanations range over.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// The current explanation of `(var, side)`.
    pub fn get(&self, var: Var, side: BoundSide) -> &[f64] {
        match side {
            BoundSide::Upper => &self.upper[var.index()],
            BoundSide::Lower => &self.lower[var.index()],
        }
    }

    /// Derive a new explanation for the bound of the row's left-hand side.
    ///
    /// Every body entry contributes its variable's existing explanation,
    /// taken from the same side for a positive coefficient and the opposite
    /// side for a negative one, scaled by the coefficient. On top of that
    /// the row's slack coefficients contribute directly, since the slack
    /// columns identify the original equations the row combines.
    pub fn update_from_tableau_row(&mut self, row: &TableauRow, side: BoundSide) {
        if !self.enabled || row.entries.is_empty() {
            return;
        }
        debug_assert!(row.lhs.index() < self.var_count);

        let mut sum = vec![0.0; self.row_count];

        for &(var, coefficient) in row.entries.iter() {
            if float::is_zero(coefficient) {
                continue;
            }
            let chosen = if coefficient < 0.0 { side.opposite() } else { side };
            self.add_scaled(&mut sum, var, chosen, coefficient);
        }

        let coefficients = self.row_coefficients(row);
        for (slot, value) in sum.iter_mut().zip(coefficients.iter()) {
            *slot += value;
        }

        self.inject(row.lhs, side, sum);
    }

    /// Derive a new explanation for `(var, side)` from a row containing
    /// `var` in its body.
    ///
    /// The row is first rewritten with `var` isolated on the left, then the
    /// plain update applies.
    pub fn update_from_row_for_variable(&mut self, row: &TableauRow, side: BoundSide, var: Var) {
        if !self.enabled || row.entries.is_empty() {
            return;
        }
        if var == row.lhs {
            self.update_from_tableau_row(row, side);
            return;
        }
        self.update_from_tableau_row(&row.isolated(var), side);
    }

    /// Derive a new explanation for `(var, side)` from a sparse row
    /// containing `var`.
    ///
    /// Coefficients are normalized by `-c` where `c` is `var`'s coefficient,
    /// which isolates `var` without materializing the rewritten row.
    pub fn update_sparse(&mut self, row: &SparseRow, side: BoundSide, var: Var) {
        if !self.enabled || row.is_empty() {
            return;
        }
        debug_assert!(var.index() < self.var_count);

        let var_coefficient = row.coefficient(var);
        debug_assert!(!float::is_zero(var_coefficient));

        let mut sum = vec![0.0; self.row_count];

        for &(entry_var, coefficient) in row.entries() {
            if entry_var == var || float::is_zero(coefficient) {
                continue;
            }
            let normalized = coefficient / -var_coefficient;
            if float::is_zero(normalized) {
                continue;
            }
            // The sides of the isolated variable and the entry agree exactly
            // when the normalized coefficient is positive.
            let chosen = if (side.is_upper() && float::is_positive(normalized))
                || (!side.is_upper() && float::is_negative(normalized))
            {
                BoundSide::Upper
            } else {
                BoundSide::Lower
            };
            self.add_scaled(&mut sum, entry_var, chosen, normalized);
        }

        let slack_start = self.var_count - self.row_count;
        for &(entry_var, coefficient) in row.entries() {
            if entry_var.index() >= slack_start && !float::is_zero(coefficient) {
                sum[entry_var.index() - slack_start] += -coefficient / var_coefficient;
            }
        }

        self.inject(var, side, sum);
    }

    /// Empty the explanation of `(var, side)`, meaning "ground bound".
    pub fn reset(&mut self, var: Var, side: BoundSide) {
        match side {
            BoundSide::Upper => self.upper[var.index()].clear(),
            BoundSide::Lower => self.lower[var.index()].clear(),
        }
    }

    /// Overwrite an explanation directly, bypassing the update rules.
    ///
    /// Used by precision restoration and when adopting externally supplied
    /// propagations.
    pub fn inject(&mut self, var: Var, side: BoundSide, explanation: Explanation) {
        if !self.enabled {
            return;
        }
        debug_assert!(explanation.is_empty() || explanation.len() == self.row_count);
        match side {
            BoundSide::Upper => self.upper[var.index()] = explanation,
            BoundSide::Lower => self.lower[var.index()] = explanation,
        }
    }

    /// Extend the store by one variable and one row.
    ///
    /// The new variable starts with ground-bound explanations; every stored
    /// explanation grows by a trailing zero so its length keeps matching the
    /// row count.
    pub fn add_variable(&mut self) {
        self.var_count += 1;
        self.row_count += 1;
        self.upper.push(vec![]);
        self.lower.push(vec![]);

        for explanation in self.upper.iter_mut().chain(self.lower.iter_mut()) {
            if !explanation.is_empty() {
                explanation.push(0.0);
            }
        }
    }

    /// `sum += scale * explanation(var, side)`, treating an empty stored
    /// explanation as all zeros.
    fn add_scaled(&self, sum: &mut [f64], var: Var, side: BoundSide, scale: f64) {
        let explanation = self.get(var, side);
        if explanation.is_empty() || float::is_zero(scale) {
            return;
        }
        debug_assert_eq!(explanation.len(), sum.len());
        for (slot, &value) in sum.iter_mut().zip(explanation.iter()) {
            *slot += scale * value;
        }
    }

    /// The original-equation coefficients of a solver row.
    ///
    /// The slack variables occupy the last `m` columns, so a row's slack
    /// coefficients are exactly the coefficients of the original equations
    /// it combines. A left-hand side that is itself a slack variable
    /// contributes `-1`.
    fn row_coefficients(&self, row: &TableauRow) -> Vec<f64> {
        let mut coefficients = vec![0.0; self.row_count];
        let slack_start = self.var_count - self.row_count;

        for &(var, coefficient) in row.entries.iter() {
            if var.index() >= slack_start && !float::is_zero(coefficient) {
                coefficients[var.index() - slack_start] = coefficient;
            }
        }

        if row.lhs.index() >= slack_start {
            coefficients[row.lhs.index() - slack_start] = -1.0;
        }

        coefficients
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::explained_bound;
    use plcheck_problem::var;
    use plcheck_problem::{Bounds, SparseRow, Tableau};

    fn enabled(var_count: usize, row_count: usize) -> BoundExplainer {
        BoundExplainer::new(var_count, row_count, ExplainerConfig::default())
    }

    // One equation x0 + 2*x1 - s0 = 0 over columns (x0, x1, s0).
    fn one_row_tableau() -> Tableau {
        Tableau::new(
            vec![SparseRow::from_entries(vec![
                (var!(0), 1.0),
                (var!(1), 2.0),
                (var!(2), -1.0),
            ])],
            3,
        )
    }

    #[test]
    fn explanations_start_empty() {
        let explainer = enabled(3, 1);
        assert!(explainer.get(var!(0), BoundSide::Upper).is_empty());
        assert!(explainer.get(var!(2), BoundSide::Lower).is_empty());
    }

    #[test]
    fn update_round_trips_through_the_kernel() {
        let tableau = one_row_tableau();
        let bounds = Bounds::new(vec![1.0, 1.0, 3.0], vec![0.0, 0.0, 0.0]);
        let mut explainer = enabled(3, 1);

        // Solver row s0 = x0 + 2*x1.
        let row = TableauRow::new(var!(2), 0.0, vec![(var!(0), 1.0), (var!(1), 2.0)]);
        explainer.update_from_tableau_row(&row, BoundSide::Upper);

        // The basic slack contributes -1, identifying the single original row.
        let explanation = explainer.get(var!(2), BoundSide::Upper);
        assert_eq!(explanation, &[-1.0]);

        // ub(s0) = ub(x0) + 2*ub(x1) = 3.
        let derived = explained_bound(
            var!(2),
            BoundSide::Upper,
            explanation,
            &tableau,
            &bounds,
        );
        assert_eq!(derived, 3.0);
    }

    #[test]
    fn sparse_update_normalizes_by_the_variable_coefficient() {
        let mut explainer = enabled(3, 1);

        // Row x0 + 2*x1 - s0 = 0, explain x1's upper bound:
        // x1 = (s0 - x0) / 2, so the row contributes with weight 1/2.
        let row = SparseRow::from_entries(vec![
            (var!(0), 1.0),
            (var!(1), 2.0),
            (var!(2), -1.0),
        ]);
        explainer.update_sparse(&row, BoundSide::Upper, var!(1));

        assert_eq!(explainer.get(var!(1), BoundSide::Upper), &[0.5]);
    }

    #[test]
    fn add_variable_grows_stored_explanations() {
        let mut explainer = enabled(3, 1);
        explainer.inject(var!(0), BoundSide::Upper, vec![2.0]);

        explainer.add_variable();

        assert_eq!(explainer.var_count(), 4);
        assert_eq!(explainer.row_count(), 2);
        assert_eq!(explainer.get(var!(0), BoundSide::Upper), &[2.0, 0.0]);
        assert!(explainer.get(var!(3), BoundSide::Upper).is_empty());
        assert!(explainer.get(var!(0), BoundSide::Lower).is_empty());
    }

    #[test]
    fn reset_returns_to_the_ground_bound() {
        let mut explainer = enabled(2, 1);
        explainer.inject(var!(1), BoundSide::Lower, vec![1.0]);
        explainer.reset(var!(1), BoundSide::Lower);
        assert!(explainer.get(var!(1), BoundSide::Lower).is_empty());
    }

    use proptest::{collection, prelude::*};

    use plcheck_problem::test::slack_tableau;
    use plcheck_problem::Var;

    fn tableau_with_bounds() -> impl Strategy<Value = (Tableau, Bounds)> {
        slack_tableau(2..5usize, 1..4usize).prop_flat_map(|tableau| {
            let columns = tableau.column_count();
            (
                Just(tableau),
                collection::vec(-5.0..5.0f64, columns),
                collection::vec(0.0..3.0f64, columns),
            )
                .prop_map(|(tableau, lower, widths)| {
                    let upper = lower
                        .iter()
                        .zip(widths.iter())
                        .map(|(low, width)| low + width)
                        .collect();
                    (tableau, Bounds::new(upper, lower))
                })
        })
    }

    proptest! {
        #[test]
        fn tableau_row_round_trip(
            (tableau, bounds) in tableau_with_bounds(),
            row_index in 0..4usize,
        ) {
            let row_count = tableau.row_count();
            let row_index = row_index % row_count;
            let basic_count = tableau.column_count() - row_count;
            let slack = Var::from_index(basic_count + row_index);

            // The solver-shaped form of row `i`: slack = the structural body sum.
            let body: Vec<(Var, f64)> = tableau
                .row(row_index)
                .entries()
                .iter()
                .copied()
                .filter(|&(var, _)| var != slack)
                .collect();
            let solver_row = TableauRow::new(slack, 0.0, body.clone());

            let mut explainer = enabled(tableau.column_count(), row_count);
            explainer.update_from_tableau_row(&solver_row, BoundSide::Upper);

            let derived = explained_bound(
                slack,
                BoundSide::Upper,
                explainer.get(slack, BoundSide::Upper),
                &tableau,
                &bounds,
            );

            // Deriving through the explanation equals evaluating the row
            // body directly against the ground bounds.
            let mut expected = 0.0;
            for &(var, coefficient) in body.iter() {
                let side = if coefficient > 0.0 { BoundSide::Upper } else { BoundSide::Lower };
                expected += coefficient * bounds.get(var, side);
            }
            prop_assert!((derived - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn disabled_explainer_ignores_updates() {
        let mut explainer = BoundExplainer::new(3, 1, ExplainerConfig { enabled: false });
        let row = TableauRow::new(var!(2), 0.0, vec![(var!(0), 1.0), (var!(1), 2.0)]);

        explainer.update_from_tableau_row(&row, BoundSide::Upper);
        explainer.inject(var!(0), BoundSide::Upper, vec![1.0]);

        assert!(explainer.get(var!(2), BoundSide::Upper).is_empty());
        assert!(explainer.get(var!(0), BoundSide::Upper).is_empty());
    }
}
