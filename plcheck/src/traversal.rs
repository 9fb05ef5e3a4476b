//! Depth-first certificate replay with backtracking of ground-bound changes.
use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashMap;

use plcheck_certificate::kernel;
use plcheck_certificate::{CertificateNode, Contradiction, Delegation};
use plcheck_problem::{BoundSide, Bounds, CaseSplit, PlcConstraint, Phase, Var};

use crate::context::{parts::*, Context};
use crate::delegate::write_delegated_leaf;
use crate::lemmas::replay_lemmas;
use crate::matching::{corresponding_constraint, single_var_split};
use crate::{CancelToken, CheckerError};

/// Per-node record of the bounds this node's sub-tree overwrote.
///
/// Maps each touched variable to the value its bound had on entry, so
/// ascent restores exactly the touched indices and nothing else.
#[derive(Default, Debug)]
struct Frame {
    upper: FxHashMap<Var, f64>,
    lower: FxHashMap<Var, f64>,
}

/// The mutable bound state of one traversal.
#[derive(Default, Debug)]
pub struct Traversal {
    bounds: Bounds,
    frames: Vec<Frame>,
    pub delegation_counter: usize,
    pub cancel: CancelToken,
}

impl Traversal {
    /// Create the traversal state over the given ground bounds.
    pub fn new(ground_bounds: &Bounds) -> Traversal {
        Traversal {
            bounds: ground_bounds.clone(),
            frames: vec![],
            delegation_counter: 0,
            cancel: CancelToken::new(),
        }
    }

    /// Restart from the original ground bounds.
    pub fn reset(&mut self, ground_bounds: &Bounds) {
        self.bounds = ground_bounds.clone();
        self.frames.clear();
        self.delegation_counter = 0;
    }

    /// The current working bounds.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// The current bound of `(var, side)`.
    pub fn bound(&self, var: Var, side: BoundSide) -> f64 {
        self.bounds.get(var, side)
    }

    /// Overwrite a bound, recording its previous value in the active frame.
    ///
    /// Without an open frame the write is permanent; the traversal opens a
    /// frame per node, so every in-check mutation is undone on ascent.
    pub fn set_bound(&mut self, var: Var, side: BoundSide, value: f64) {
        let previous = self.bounds.get(var, side);
        if let Some(frame) = self.frames.last_mut() {
            let touched = match side {
                BoundSide::Upper => &mut frame.upper,
                BoundSide::Lower => &mut frame.lower,
            };
            touched.entry(var).or_insert(previous);
        }
        self.bounds.set(var, side, value);
    }

    /// Open a frame for a node about to be checked.
    fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Close the newest frame, reverting every bound it touched.
    fn pop_frame(&mut self) {
        let frame = self.frames.pop().expect("no active frame");
        for (var, previous) in frame.upper {
            self.bounds.set(var, BoundSide::Upper, previous);
        }
        for (var, previous) in frame.lower {
            self.bounds.set(var, BoundSide::Lower, previous);
        }
    }
}

/// Check one certificate node and its sub-tree.
///
/// All bound and constraint-state mutations of the sub-tree are undone
/// before this returns, on success and failure alike.
pub fn check_node(
    mut ctx: partial!(
        Context,
        mut ConstraintStateP,
        mut TraversalP,
        ConfigP,
        ProblemP,
    ),
    node: &CertificateNode,
) -> Result<(), CheckerError> {
    if ctx.part(TraversalP).cancel.is_canceled() {
        return Err(CheckerError::Canceled);
    }

    ctx.part_mut(TraversalP).push_frame();
    let snapshot = ctx.part(ConstraintStateP).snapshot();

    let result = check_node_inner(ctx.borrow(), node);

    ctx.part_mut(ConstraintStateP).restore(snapshot);
    ctx.part_mut(TraversalP).pop_frame();

    result
}

fn check_node_inner(
    mut ctx: partial!(
        Context,
        mut ConstraintStateP,
        mut TraversalP,
        ConfigP,
        ProblemP,
    ),
    node: &CertificateNode,
) -> Result<(), CheckerError> {
    // Update ground bounds according to the incoming split.
    for tightening in node.split().tightenings() {
        ctx.part_mut(TraversalP)
            .set_bound(tightening.var, tightening.side, tightening.value);
    }

    replay_lemmas(ctx.borrow(), node)?;

    // Save to file if marked.
    if node.delegation() == Delegation::SaveAndAccept {
        write_delegated_leaf(ctx.borrow())?;
    }

    // A found satisfying assignment or a delegated residual closes the leaf.
    if node.sat_solution() || node.delegation() != Delegation::None {
        return Ok(());
    }

    if node.is_valid_leaf() {
        return verify_contradiction(ctx.borrow(), node);
    }

    // A leafless node the solver never descended into is trivially certified.
    if !node.visited() && node.contradiction().is_none() && node.children().is_empty() {
        return Ok(());
    }

    if !node.is_valid_internal() {
        return Err(CheckerError::invalid_structure(
            "node is neither a leaf with a contradiction nor an internal node with children",
        ));
    }

    let splits: Vec<&CaseSplit> = node.children().iter().map(|child| child.split()).collect();

    let mut borrowed_full = ctx
        .borrow::<partial!(Context, mut ConstraintStateP, mut TraversalP, ConfigP, ProblemP), _>();
    let (problem, borrowed_ctx) = borrowed_full.split_part(ProblemP);
    let matched = corresponding_constraint(
        &problem.constraints,
        borrowed_ctx.part(ConstraintStateP),
        &splits,
    );

    if matched.is_none() && !single_var_split(&splits) {
        return Err(CheckerError::invalid_split(
            "children splits match no problem constraint and no single-variable dichotomy",
        ));
    }

    for child in node.children() {
        // Fix the phase implied by the child's split shape, undoing it once
        // the child's sub-tree is fully checked.
        let before_child = ctx.part(ConstraintStateP).snapshot();
        if let Some(index) = matched {
            fix_child_phase(ctx.borrow(), index, child);
        }

        let result = check_node(ctx.borrow(), child);
        ctx.part_mut(ConstraintStateP).restore(before_child);
        result?;
    }

    Ok(())
}

/// Set the matched constraint's phase to the case the child descends into.
fn fix_child_phase(
    mut ctx: partial!(Context, mut ConstraintStateP, ProblemP),
    index: usize,
    child: &CertificateNode,
) {
    let (problem, mut ctx) = ctx.split_part(ProblemP);
    let state = ctx.part_mut(ConstraintStateP);
    let tightenings = child.split().tightenings();

    let leads_with_lower = |tightenings: &[plcheck_problem::Tightening]| {
        tightenings
            .first()
            .map(|tightening| tightening.side == BoundSide::Lower)
            .unwrap_or(false)
    };

    match &problem.constraints[index].constraint {
        PlcConstraint::Relu { .. } => {
            let active = leads_with_lower(tightenings)
                || tightenings
                    .last()
                    .map(|tightening| tightening.side == BoundSide::Lower)
                    .unwrap_or(false);
            state.set_phase(index, if active { Phase::Active } else { Phase::Inactive });
        }
        PlcConstraint::Sign { .. } | PlcConstraint::AbsoluteValue { .. } => {
            let positive = leads_with_lower(tightenings);
            state.set_phase(
                index,
                if positive {
                    Phase::Positive
                } else {
                    Phase::Negative
                },
            );
        }
        PlcConstraint::Max { .. } => (),
        PlcConstraint::Disjunction { disjuncts } => {
            // The child explores this disjunct; the residual problem of its
            // sub-tree covers only the remaining ones.
            if let Some(disjunct) = disjuncts
                .iter()
                .position(|disjunct| disjunct.matches(child.split()))
            {
                state.set_feasible(index, disjunct, false);
            }
        }
    }
}

/// Verify a leaf's contradiction against the current ground bounds.
fn verify_contradiction(
    ctx: partial!(Context, ProblemP, TraversalP),
    node: &CertificateNode,
) -> Result<(), CheckerError> {
    let traversal = ctx.part(TraversalP);
    let problem = ctx.part(ProblemP);

    match node.contradiction() {
        Some(Contradiction::Bounds { var }) => {
            let upper = traversal.bound(*var, BoundSide::Upper);
            let lower = traversal.bound(*var, BoundSide::Lower);
            // The certificate must crisply contradict; no tolerance here.
            if upper < lower {
                Ok(())
            } else {
                Err(CheckerError::invalid_contradiction(format!(
                    "bounds of {} do not contradict: upper {} >= lower {}",
                    var, upper, lower
                )))
            }
        }
        Some(Contradiction::Linear { combination }) => {
            if combination.len() != problem.row_count() {
                return Err(CheckerError::invalid_contradiction(format!(
                    "contradiction vector has length {}, expected {}",
                    combination.len(),
                    problem.row_count()
                )));
            }
            let derived =
                kernel::combination_upper_bound(combination, &problem.tableau, traversal.bounds());
            if derived < 0.0 {
                Ok(())
            } else {
                Err(CheckerError::invalid_contradiction(format!(
                    "row combination has non-negative upper bound {}",
                    derived
                )))
            }
        }
        None => Err(CheckerError::invalid_structure(
            "leaf carries no contradiction",
        )),
    }
}
