//! Checker configuration.
use std::path::PathBuf;

/// Configurable parameters of a certificate check.
#[derive(Clone, Debug)]
pub struct CheckerConfig {
    /// Absolute tolerance used when replaying piecewise-linear lemmas.
    ///
    /// A tolerance of zero accepts only exact matches.
    ///
    /// [default: 1e-6]
    pub lemma_tolerance: f64,

    /// Directory that receives `delegated{N}.smtlib` files for leaves marked
    /// for delegation.
    ///
    /// [default: "."]
    pub delegation_dir: PathBuf,
}

impl Default for CheckerConfig {
    fn default() -> CheckerConfig {
        CheckerConfig {
            lemma_tolerance: 1e-6,
            delegation_dir: PathBuf::from("."),
        }
    }
}
