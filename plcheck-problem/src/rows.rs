//! Sparse rows and the original equation tableau.
use crate::float;
use crate::vars::Var;

/// A sparse linear row over the query variables.
///
/// Encodes the equation `sum(c_i * x_i) = 0` over its entries; zero coefficients may
/// be omitted.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct SparseRow {
    entries: Vec<(Var, f64)>,
}

impl SparseRow {
    /// Create an empty row.
    pub fn new() -> SparseRow {
        SparseRow::default()
    }

    /// Create a row from column/coefficient pairs.
    pub fn from_entries(entries: Vec<(Var, f64)>) -> SparseRow {
        SparseRow { entries }
    }

    /// Append an entry.
    pub fn push(&mut self, var: Var, coefficient: f64) {
        self.entries.push((var, coefficient));
    }

    /// The stored entries, in insertion order.
    pub fn entries(&self) -> &[(Var, f64)] {
        &self.entries
    }

    /// The coefficient of `var`, or zero when absent.
    pub fn coefficient(&self, var: Var) -> f64 {
        self.entries
            .iter()
            .find(|&&(entry_var, _)| entry_var == var)
            .map(|&(_, coefficient)| coefficient)
            .unwrap_or(0.0)
    }

    /// True when the row has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stored entries, including explicit zeros.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The original equation system: `m` sparse rows over `n` columns.
///
/// Row `i` encodes `sum(c_{i,j} * x_j) = 0`. The last `m` columns are the slack
/// variables of the original equations. Read-only during checking.
#[derive(Clone, Default, Debug)]
pub struct Tableau {
    rows: Vec<SparseRow>,
    columns: usize,
}

impl Tableau {
    /// Create a tableau from rows over `columns` variables.
    pub fn new(rows: Vec<SparseRow>, columns: usize) -> Tableau {
        Tableau { rows, columns }
    }

    /// Number of rows (`m`).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (`n`), slack variables included.
    pub fn column_count(&self) -> usize {
        self.columns
    }

    /// Row `index`.
    pub fn row(&self, index: usize) -> &SparseRow {
        &self.rows[index]
    }

    /// Iterator over all rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &SparseRow> {
        self.rows.iter()
    }
}

/// A solver-shaped tableau row with an isolated left-hand side.
///
/// Encodes `lhs = scalar + sum(c_i * x_i)` over the body entries. Used by the bound
/// explainer's update rules, which rewrite such rows into explanation
/// updates.
#[derive(Clone, Debug)]
pub struct TableauRow {
    /// The isolated left-hand side variable.
    pub lhs: Var,
    /// The constant term of the row.
    pub scalar: f64,
    /// The body entries; the left-hand side does not appear here.
    pub entries: Vec<(Var, f64)>,
}

impl TableauRow {
    /// Create a row with the given left-hand side and body.
    pub fn new(lhs: Var, scalar: f64, entries: Vec<(Var, f64)>) -> TableauRow {
        TableauRow {
            lhs,
            scalar,
            entries,
        }
    }

    /// The coefficient of `var` in the body, or zero when absent.
    pub fn coefficient(&self, var: Var) -> f64 {
        self.entries
            .iter()
            .find(|&&(entry_var, _)| entry_var == var)
            .map(|&(_, coefficient)| coefficient)
            .unwrap_or(0.0)
    }

    /// Rewrite the row with `var` isolated on the left instead of `lhs`.
    ///
    /// Every coefficient is scaled by `-1/c` where `c` is `var`'s body
    /// coefficient, and the old left-hand side takes `var`'s place in the
    /// body. `var` must appear in the body with a non-zero coefficient.
    pub fn isolated(&self, var: Var) -> TableauRow {
        let position = self
            .entries
            .iter()
            .position(|&(entry_var, _)| entry_var == var)
            .expect("variable not in row body");
        let var_coefficient = self.entries[position].1;
        debug_assert!(!float::is_zero(var_coefficient));
        let scale = -1.0 / var_coefficient;

        let mut entries: Vec<(Var, f64)> = self
            .entries
            .iter()
            .map(|&(entry_var, coefficient)| {
                let scaled = if float::is_zero(coefficient) {
                    0.0
                } else {
                    coefficient * scale
                };
                (entry_var, scaled)
            })
            .collect();
        // The old lhs replaces the isolated variable in the body.
        entries[position] = (self.lhs, -scale);

        let scalar = if float::is_zero(self.scalar) {
            0.0
        } else {
            self.scalar * scale
        };

        TableauRow::new(var, scalar, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var;

    #[test]
    fn sparse_row_lookup() {
        let row = SparseRow::from_entries(vec![(var!(0), 1.0), (var!(2), -2.0)]);
        assert_eq!(row.coefficient(var!(0)), 1.0);
        assert_eq!(row.coefficient(var!(1)), 0.0);
        assert_eq!(row.coefficient(var!(2)), -2.0);
    }

    #[test]
    fn isolation_rescales_the_body() {
        // x0 = 1 + 2*x1 - x2, isolate x1: x1 = -0.5 - 0.5*(-x0) ...
        let row = TableauRow::new(var!(0), 1.0, vec![(var!(1), 2.0), (var!(2), -1.0)]);
        let isolated = row.isolated(var!(1));

        assert_eq!(isolated.lhs, var!(1));
        assert_eq!(isolated.scalar, -0.5);
        // The old lhs x0 takes x1's slot with coefficient 1/2.
        assert_eq!(isolated.coefficient(var!(0)), 0.5);
        assert_eq!(isolated.coefficient(var!(2)), 0.5);
    }
}
