//! Central checker data structure.
use partial_ref::{part, PartialRefTarget};

use plcheck_problem::Problem;

use crate::config::CheckerConfig;
use crate::constraints::ConstraintState;
use crate::traversal::Traversal;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub ConfigP: CheckerConfig);
    part!(pub ConstraintStateP: ConstraintState);
    part!(pub ProblemP: Problem);
    part!(pub TraversalP: Traversal);
}

use parts::*;

/// Central checker data structure.
///
/// This struct contains all data kept by the checker. Functions operating on
/// multiple fields of the context use partial references provided by the
/// `partial_ref` crate. This documents the data dependencies and makes the
/// borrow checker happy without the overhead of passing individual
/// references.
#[derive(PartialRefTarget, Default)]
pub struct Context {
    #[part(ConfigP)]
    pub config: CheckerConfig,
    #[part(ConstraintStateP)]
    pub constraint_state: ConstraintState,
    #[part(ProblemP)]
    pub problem: Problem,
    #[part(TraversalP)]
    pub traversal: Traversal,
}
