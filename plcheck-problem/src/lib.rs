//! Basic problem data types used by the plcheck certificate checker.
//!
//! A query snapshot consists of the original equation tableau, the original
//! (ground) variable bounds and the list of piecewise-linear constraints. The
//! checker never mutates a snapshot; everything derived during checking is
//! reconstructed from these values.

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! var {
    ($x:expr) => {
        $crate::vars::Var::from_index($x)
    };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! tighten {
    ($var:expr, $value:expr, upper) => {
        $crate::split::Tightening::new(
            $crate::var!($var),
            ($value) as f64,
            $crate::vars::BoundSide::Upper,
        )
    };
    ($var:expr, $value:expr, lower) => {
        $crate::split::Tightening::new(
            $crate::var!($var),
            ($value) as f64,
            $crate::vars::BoundSide::Lower,
        )
    };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! split {
    ( $( ( $( $t:tt )* ) ),* ) => {
        $crate::split::CaseSplit::of_tightenings(vec![ $( $crate::tighten!( $( $t )* ) ),* ])
    };
    ( $( ( $( $t:tt )* ) ),* , ) => {
        $crate::split![ $( ( $( $t )* ) ),* ]
    };
}

pub mod constraint;
pub mod float;
pub mod problem;
pub mod rows;
pub mod split;
pub mod vars;


pub use constraint::{ConstraintKind, Phase, PlcConstraint};
pub use problem::{Problem, ProblemConstraint};
pub use rows::{SparseRow, Tableau, TableauRow};
pub use split::{CaseSplit, Equation, Relation, Tightening};
pub use vars::{BoundSide, Bounds, Var};
