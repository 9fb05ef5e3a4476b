//! Proof-certificate checker for piecewise-linear arithmetic solvers.
//!
//! A solver that reports UNSAT on a linear-arithmetic query with
//! piecewise-linear activation constraints emits a certificate tree: internal
//! nodes are case splits on constraints, leaves are contradictions. This
//! crate re-verifies such a tree independently of the solver, reconstructing
//! every bound tightening from the original tableau and the original ground
//! bounds alone.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use failure::Fail;
use partial_ref::{IntoPartialRefMut, PartialRef};

use plcheck_certificate::CertificateNode;
use plcheck_problem::Problem;

pub mod config;

mod constraints;
mod context;
mod delegate;
mod lemmas;
mod matching;
mod traversal;

pub use config::CheckerConfig;

use constraints::ConstraintState;
use context::Context;
use traversal::{check_node, Traversal};

/// Possible errors while checking a certificate.
#[derive(Debug, Fail)]
pub enum CheckerError {
    #[fail(display = "invalid lemma: {}", msg)]
    InvalidLemma { msg: String },
    #[fail(display = "invalid split: {}", msg)]
    InvalidSplit { msg: String },
    #[fail(display = "invalid contradiction: {}", msg)]
    InvalidContradiction { msg: String },
    #[fail(display = "invalid certificate structure: {}", msg)]
    InvalidStructure { msg: String },
    #[fail(display = "error writing delegated leaf: {}", cause)]
    DelegationIo {
        #[cause]
        cause: io::Error,
    },
    #[fail(display = "certificate checking was canceled")]
    Canceled,
    #[doc(hidden)]
    #[fail(display = "__Nonexhaustive")]
    __Nonexhaustive,
}

impl CheckerError {
    fn invalid_lemma(msg: impl Into<String>) -> CheckerError {
        CheckerError::InvalidLemma { msg: msg.into() }
    }

    fn invalid_split(msg: impl Into<String>) -> CheckerError {
        CheckerError::InvalidSplit { msg: msg.into() }
    }

    fn invalid_contradiction(msg: impl Into<String>) -> CheckerError {
        CheckerError::InvalidContradiction { msg: msg.into() }
    }

    fn invalid_structure(msg: impl Into<String>) -> CheckerError {
        CheckerError::InvalidStructure { msg: msg.into() }
    }

    fn delegation_io(cause: io::Error) -> CheckerError {
        CheckerError::DelegationIo { cause }
    }

    /// True for errors that reject the certificate rather than the run.
    fn rejects_certificate(&self) -> bool {
        match self {
            CheckerError::InvalidLemma { .. }
            | CheckerError::InvalidSplit { .. }
            | CheckerError::InvalidContradiction { .. }
            | CheckerError::InvalidStructure { .. } => true,

            CheckerError::DelegationIo { .. }
            | CheckerError::Canceled
            | CheckerError::__Nonexhaustive => false,
        }
    }
}

/// The overall outcome of checking a certificate.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Verdict {
    /// Every branch of the certificate was re-verified.
    Certified,
    /// Some lemma, split, contradiction or node structure did not check out.
    Invalid,
    /// The caller canceled the run; no verdict about the certificate.
    Aborted,
}

/// A caller-held flag polled between nodes to abort a running check.
///
/// Cancellation is cooperative: the checker notices the flag when it next
/// enters a node, restores all bound state and returns
/// [`Verdict::Aborted`].
#[derive(Clone, Default, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token.
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True when cancellation was requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A checker for unsatisfiability certificates.
///
/// Holds the immutable problem snapshot plus the working state of one
/// traversal. The certificate itself stays owned by the caller; `check` may
/// be called repeatedly, each run starting from the original ground bounds.
#[derive(Default)]
pub struct Checker {
    ctx: Box<Context>,
}

impl Checker {
    /// Create a checker for the given problem snapshot.
    pub fn new(problem: Problem, config: CheckerConfig) -> Checker {
        let mut ctx = Box::new(Context::default());
        ctx.traversal = Traversal::new(&problem.ground_bounds);
        ctx.constraint_state = ConstraintState::new(&problem.constraints);
        ctx.config = config;
        ctx.problem = problem;
        Checker { ctx }
    }

    /// A token that aborts this checker's runs when canceled.
    pub fn cancel_token(&self) -> CancelToken {
        self.ctx.traversal.cancel.clone()
    }

    /// The current ground bounds as `(upper, lower)` slices.
    ///
    /// Outside a running check these are the original ground bounds; the
    /// traversal restores every mutation on backtracking.
    pub fn ground_bounds(&self) -> (&[f64], &[f64]) {
        let bounds = self.ctx.traversal.bounds();
        (bounds.upper(), bounds.lower())
    }

    /// Check that `root` proves the problem unsatisfiable.
    ///
    /// Returns the verdict, or an error only for host-side failures such as
    /// delegation I/O; certificate defects map to [`Verdict::Invalid`].
    pub fn check(&mut self, root: &CertificateNode) -> Result<Verdict, CheckerError> {
        self.ctx.traversal.reset(&self.ctx.problem.ground_bounds);
        self.ctx
            .constraint_state
            .reset(&self.ctx.problem.constraints);

        log::info!(
            "checking certificate over {} variables, {} rows and {} constraints",
            self.ctx.problem.var_count(),
            self.ctx.problem.row_count(),
            self.ctx.problem.constraints.len()
        );

        let mut ctx = self.ctx.into_partial_ref_mut();
        match check_node(ctx.borrow(), root) {
            Ok(()) => Ok(Verdict::Certified),
            Err(CheckerError::Canceled) => Ok(Verdict::Aborted),
            Err(error) => {
                if error.rejects_certificate() {
                    log::debug!("certificate rejected: {}", error);
                    Ok(Verdict::Invalid)
                } else {
                    Err(error)
                }
            }
        }
    }
}
