//! Replaying recorded piecewise-linear propagations.
//!
//! Each lemma claims that some causing bound, justified by a stored
//! explanation, forced a tightening through one constraint. Replay first
//! recomputes the causing bound through the kernel, then checks the claim
//! against the rule table of the matched constraint kind. The recomputed
//! bound may be tighter than the recorded one, since an explanation that
//! supports a tight bound supports every looser one; all comparisons carry
//! the configured tolerance.

use partial_ref::{partial, PartialRef};

use plcheck_certificate::kernel;
use plcheck_certificate::{CertificateNode, PlcLemma};
use plcheck_problem::float;
use plcheck_problem::{BoundSide, Bounds, Phase, PlcConstraint, Tableau, Var};

use crate::constraints::ConstraintState;
use crate::context::{parts::*, Context};
use crate::CheckerError;

/// Replay every lemma of a node, in stored order.
pub fn replay_lemmas(
    mut ctx: partial!(
        Context,
        mut ConstraintStateP,
        mut TraversalP,
        ConfigP,
        ProblemP,
    ),
    node: &CertificateNode,
) -> Result<(), CheckerError> {
    for lemma in node.lemmas() {
        replay_lemma(ctx.borrow(), lemma)?;
    }
    Ok(())
}

fn replay_lemma(
    mut ctx: partial!(
        Context,
        mut ConstraintStateP,
        mut TraversalP,
        ConfigP,
        ProblemP,
    ),
    lemma: &PlcLemma,
) -> Result<(), CheckerError> {
    let tolerance = ctx.part(ConfigP).lemma_tolerance;
    let (problem, mut ctx) = ctx.split_part(ProblemP);

    // The propagation must come from a problem constraint containing every
    // variable the lemma mentions.
    let index = problem
        .constraints
        .iter()
        .position(|problem_constraint| {
            let constraint = &problem_constraint.constraint;
            constraint.participates(lemma.affected_var())
                && lemma
                    .causing_vars()
                    .iter()
                    .all(|&causing| constraint.participates(causing))
        })
        .ok_or_else(|| {
            CheckerError::invalid_lemma("no problem constraint contains the lemma's variables")
        })?;

    let constraint = &problem.constraints[index].constraint;
    if constraint.kind() != lemma.kind() {
        return Err(CheckerError::invalid_lemma(format!(
            "lemma kind {:?} does not match constraint {}",
            lemma.kind(),
            constraint
        )));
    }

    let accepted = {
        let mut borrowed = ctx.borrow::<partial!(Context, mut ConstraintStateP, TraversalP), _>();
        let (state, ctx) = borrowed.split_part_mut(ConstraintStateP);
        let bounds = ctx.part(TraversalP).bounds();
        let tableau = &problem.tableau;

        match *constraint {
            PlcConstraint::Relu { b, f, aux } => {
                check_relu_lemma(lemma, b, f, aux, index, state, bounds, tableau, tolerance)
            }
            PlcConstraint::Sign { b, f } => {
                check_sign_lemma(lemma, b, f, index, state, bounds, tableau, tolerance)
            }
            PlcConstraint::AbsoluteValue { b, f, .. } => {
                check_abs_lemma(lemma, b, f, bounds, tableau, tolerance)
            }
            PlcConstraint::Max {
                f, max_eliminated, ..
            } => check_max_lemma(lemma, f, max_eliminated, bounds, tableau, tolerance),
            PlcConstraint::Disjunction { .. } => false,
        }
    };

    if !accepted {
        return Err(CheckerError::invalid_lemma(format!(
            "no {:?} rule justifies tightening {} ({:?}) to {}",
            lemma.kind(),
            lemma.affected_var(),
            lemma.affected_side(),
            lemma.bound()
        )));
    }

    // Adopt the tightening only when it improves the current bound.
    let traversal = ctx.part_mut(TraversalP);
    let current = traversal.bound(lemma.affected_var(), lemma.affected_side());
    let tighter = match lemma.affected_side() {
        BoundSide::Upper => float::lt(lemma.bound(), current),
        BoundSide::Lower => float::gt(lemma.bound(), current),
    };
    if tighter {
        traversal.set_bound(lemma.affected_var(), lemma.affected_side(), lemma.bound());
    }

    Ok(())
}

/// The recomputed causing bound of the lemma's `index`-th causing variable.
fn explained(
    lemma: &PlcLemma,
    index: usize,
    side: BoundSide,
    bounds: &Bounds,
    tableau: &Tableau,
) -> f64 {
    kernel::explained_bound(
        lemma.causing_vars()[index],
        side,
        lemma.explanation(index),
        tableau,
        bounds,
    )
}

/// Validate a ReLU propagation over `b` (input), `f` (output) and
/// `aux = f - b` in the active-phase encoding.
///
/// One arm per tightening rule of the ReLU constraint.
fn check_relu_lemma(
    lemma: &PlcLemma,
    b: Var,
    f: Var,
    aux: Var,
    index: usize,
    state: &mut ConstraintState,
    bounds: &Bounds,
    tableau: &Tableau,
    tolerance: f64,
) -> bool {
    let causing = lemma.causing_var();
    let causing_side = lemma.causing_side();
    let affected = lemma.affected_var();
    let affected_side = lemma.affected_side();
    let bound = lemma.bound();
    let explained = explained(lemma, 0, causing_side, bounds, tableau);

    let upper = BoundSide::Upper;
    let lower = BoundSide::Lower;

    // A lemma of phase-fixing shape settles the constraint's phase.
    if (affected_side == lower && affected == f && float::is_positive(bound))
        || (affected_side == upper && affected == aux && float::is_zero(bound))
    {
        state.set_phase(index, Phase::Active);
    } else if (affected_side == lower && affected == aux && float::is_positive(bound))
        || (affected_side == upper && affected == f && float::is_zero(bound))
    {
        state.set_phase(index, Phase::Inactive);
    }

    // If lb of b is non-negative, then ub of aux is 0
    if causing == b
        && causing_side == lower
        && affected == aux
        && affected_side == upper
        && float::is_zero(bound)
        && !float::is_negative(explained + tolerance)
    {
        true
    }
    // If lb of f is positive, then ub of aux is 0
    else if causing == f
        && causing_side == lower
        && affected == aux
        && affected_side == upper
        && float::is_zero(bound)
        && float::is_positive(explained + tolerance)
    {
        true
    }
    // If lb of b is positive x, then ub of aux is -x
    else if causing == b
        && causing_side == lower
        && affected == aux
        && affected_side == upper
        && float::gte(explained, -bound - tolerance)
        && bound > 0.0
    {
        true
    }
    // If lb of aux is positive, then ub of f is 0
    else if causing == aux
        && causing_side == lower
        && affected == f
        && affected_side == upper
        && float::is_zero(bound)
        && float::is_positive(explained + tolerance)
    {
        true
    }
    // If lb of f is negative, then it is 0
    else if causing == f
        && causing_side == lower
        && affected == f
        && affected_side == lower
        && float::is_zero(bound)
        && float::is_negative(explained - tolerance)
    {
        true
    }
    // Propagate ub from f to b
    else if causing == f
        && causing_side == upper
        && affected == b
        && affected_side == upper
        && float::lte(explained, bound + tolerance)
    {
        true
    }
    // If ub of b is non-positive, then ub of f is 0
    else if causing == b
        && causing_side == upper
        && affected == f
        && affected_side == upper
        && float::is_zero(bound)
        && !float::is_positive(explained - tolerance)
    {
        true
    }
    // If ub of b is non-positive -x, then lb of aux is x
    else if causing == b
        && causing_side == upper
        && affected == aux
        && affected_side == lower
        && bound > 0.0
        && !float::is_positive(explained - tolerance)
        && float::lte(explained, -bound + tolerance)
    {
        true
    }
    // If ub of b is positive, then propagate to f (positivity of the
    // explained bound is not checked, since a negative explained ub always
    // explains a positive bound)
    else if causing == b
        && causing_side == upper
        && affected == f
        && affected_side == upper
        && float::is_positive(bound)
        && float::lte(explained, bound + tolerance)
    {
        true
    }
    // If ub of aux is x, then lb of b is -x
    else {
        causing == aux
            && causing_side == upper
            && affected == b
            && affected_side == lower
            && float::lte(explained, -bound + tolerance)
    }
}

/// Validate a Sign propagation over `b` (input) and `f in {-1, 1}` (output).
fn check_sign_lemma(
    lemma: &PlcLemma,
    b: Var,
    f: Var,
    index: usize,
    state: &mut ConstraintState,
    bounds: &Bounds,
    tableau: &Tableau,
    tolerance: f64,
) -> bool {
    let causing = lemma.causing_var();
    let causing_side = lemma.causing_side();
    let affected = lemma.affected_var();
    let affected_side = lemma.affected_side();
    let bound = lemma.bound();
    let explained = explained(lemma, 0, causing_side, bounds, tableau);

    let upper = BoundSide::Upper;
    let lower = BoundSide::Lower;

    // Any sign lemma fixes the phase.
    if (affected_side == lower && affected == f && float::gt(bound, -1.0))
        || (affected_side == lower && affected == b && !float::is_negative(bound))
    {
        state.set_phase(index, Phase::Positive);
    } else if (affected_side == upper && affected == f && float::lt(bound, 1.0))
        || (affected_side == upper && affected == b && float::is_negative(bound))
    {
        state.set_phase(index, Phase::Negative);
    }

    // If lb of f is > -1, then lb of f is 1
    if causing == f
        && causing_side == lower
        && affected == f
        && affected_side == lower
        && float::are_equal(bound, 1.0)
        && float::gte(explained + tolerance, -1.0)
    {
        true
    }
    // If lb of f is > -1, then lb of b is 0
    else if causing == f
        && causing_side == lower
        && affected == b
        && affected_side == lower
        && float::is_zero(bound)
        && float::gte(explained + tolerance, -1.0)
    {
        true
    }
    // If lb of b is non-negative, then lb of f is 1
    else if causing == b
        && causing_side == lower
        && affected == f
        && affected_side == lower
        && float::are_equal(bound, 1.0)
        && !float::is_negative(explained + tolerance)
    {
        true
    }
    // If ub of f is < 1, then ub of f is -1
    else if causing == f
        && causing_side == upper
        && affected == f
        && affected_side == upper
        && float::are_equal(bound, -1.0)
        && float::lte(explained - tolerance, 1.0)
    {
        true
    }
    // If ub of f is < 1, then ub of b is 0
    else if causing == f
        && causing_side == upper
        && affected == b
        && affected_side == upper
        && float::is_zero(bound)
        && float::lte(explained - tolerance, 1.0)
    {
        true
    }
    // If ub of b is negative, then ub of f is -1
    else {
        causing == b
            && causing_side == upper
            && affected == f
            && affected_side == upper
            && float::are_equal(bound, -1.0)
            && float::is_negative(explained - tolerance)
    }
}

/// Validate an AbsoluteValue propagation.
///
/// Only tightening `f`'s upper bound from either bound of `b`, and raising a
/// negative lower bound of `f` to zero, are supported shapes; everything
/// else is rejected.
fn check_abs_lemma(
    lemma: &PlcLemma,
    b: Var,
    f: Var,
    bounds: &Bounds,
    tableau: &Tableau,
    tolerance: f64,
) -> bool {
    if lemma.affected_var() != f || lemma.causing_vars().len() != 2 {
        return false;
    }

    let causing = lemma.causing_var();
    let causing_side = lemma.causing_side();
    let bound = lemma.bound();
    let affected_side = lemma.affected_side();

    // The upper and the lower bound of the causing variable carry separate
    // explanations.
    let explained_upper = explained(lemma, 0, BoundSide::Upper, bounds, tableau);
    let explained_lower = explained(lemma, 1, BoundSide::Lower, bounds, tableau);

    // Ub of f can be tightened by both ub and -lb of b
    if causing == b
        && affected_side == BoundSide::Upper
        && float::lte(explained_upper, bound + tolerance)
    {
        true
    } else if causing == b
        && affected_side == BoundSide::Upper
        && float::lte(-explained_lower, bound + tolerance)
    {
        true
    }
    // If lb of f is < 0, then it is 0
    else {
        causing == f
            && causing_side == BoundSide::Lower
            && affected_side == BoundSide::Lower
            && float::is_zero(bound)
            && float::is_negative(explained_lower)
    }
}

/// Validate a Max propagation.
///
/// The only supported shape tightens the output's upper bound, either from
/// an element's upper bound or, when the causing variable is the output
/// itself, from the largest eliminated-element bound.
fn check_max_lemma(
    lemma: &PlcLemma,
    f: Var,
    max_eliminated: f64,
    bounds: &Bounds,
    tableau: &Tableau,
    tolerance: f64,
) -> bool {
    let causing = lemma.causing_var();
    let causing_side = lemma.causing_side();
    let affected = lemma.affected_var();
    let affected_side = lemma.affected_side();
    let bound = lemma.bound();
    let explained = explained(lemma, 0, causing_side, bounds, tableau);

    if causing_side != BoundSide::Upper
        || affected != f
        || affected_side != BoundSide::Upper
    {
        return false;
    }

    if causing != f {
        float::lte(explained, bound + tolerance)
    } else {
        float::lte(max_eliminated, bound + tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partial_ref::IntoPartialRefMut;

    use plcheck_certificate::PlcLemma;
    use plcheck_problem::{var, ConstraintKind, Problem, ProblemConstraint, Tableau};

    use crate::traversal::Traversal;

    fn relu_context() -> Box<Context> {
        // b in [-1, 1], f in [0, 1], aux in [0, 1], no rows.
        let problem = Problem::new(
            Tableau::new(vec![], 3),
            Bounds::new(vec![1.0, 1.0, 1.0], vec![-1.0, 0.0, 0.0]),
            vec![ProblemConstraint::unfixed(PlcConstraint::Relu {
                b: var!(0),
                f: var!(1),
                aux: var!(2),
            })],
        );
        let mut ctx = Box::new(Context::default());
        ctx.traversal = Traversal::new(&problem.ground_bounds);
        ctx.constraint_state = ConstraintState::new(&problem.constraints);
        ctx.problem = problem;
        ctx
    }

    fn inactive_relu_lemma() -> PlcLemma {
        // b <= 0 forces f <= 0, with the causing bound taken from the ground
        // bounds (empty explanation).
        PlcLemma::new(
            vec![var!(0)],
            BoundSide::Upper,
            var!(1),
            BoundSide::Upper,
            0.0,
            ConstraintKind::Relu,
            vec![],
        )
    }

    #[test]
    fn accepted_lemma_tightens_and_fixes_the_phase() {
        let mut context = relu_context();
        {
            let mut ctx = context.into_partial_ref_mut();
            // Narrow b to [-1, 0] first, as the enclosing split would.
            ctx.part_mut(TraversalP)
                .set_bound(var!(0), BoundSide::Upper, 0.0);

            replay_lemma(ctx.borrow(), &inactive_relu_lemma()).unwrap();
        }

        assert_eq!(
            context.traversal.bound(var!(1), BoundSide::Upper),
            0.0
        );
        assert_eq!(context.constraint_state.phase(0), Phase::Inactive);
    }

    #[test]
    fn lemma_with_untightened_cause_is_rejected() {
        let mut context = relu_context();
        let mut ctx = context.into_partial_ref_mut();

        // Ground ub of b is 1 > 0: the rule's premise fails.
        match replay_lemma(ctx.borrow(), &inactive_relu_lemma()) {
            Err(CheckerError::InvalidLemma { .. }) => (),
            other => panic!("expected lemma rejection, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn lemma_outside_every_constraint_is_rejected() {
        let mut context = relu_context();
        let mut ctx = context.into_partial_ref_mut();

        let foreign = PlcLemma::new(
            vec![var!(0)],
            BoundSide::Upper,
            var!(9),
            BoundSide::Upper,
            0.0,
            ConstraintKind::Relu,
            vec![],
        );
        match replay_lemma(ctx.borrow(), &foreign) {
            Err(CheckerError::InvalidLemma { .. }) => (),
            other => panic!("expected lemma rejection, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn looser_bounds_do_not_overwrite_tighter_ones() {
        let mut context = relu_context();
        {
            let mut ctx = context.into_partial_ref_mut();
            ctx.part_mut(TraversalP)
                .set_bound(var!(0), BoundSide::Upper, 0.0);
            // f's ub is already 0.5, tighter than nothing but looser than
            // the claimed 0; the lemma updates it.
            ctx.part_mut(TraversalP)
                .set_bound(var!(1), BoundSide::Upper, -0.5);

            replay_lemma(ctx.borrow(), &inactive_relu_lemma()).unwrap();
        }

        // -0.5 was already tighter than the claimed 0, so it stays.
        assert_eq!(
            context.traversal.bound(var!(1), BoundSide::Upper),
            -0.5
        );
    }

    #[test]
    fn zero_tolerance_accepts_exact_premises_only() {
        let mut context = relu_context();
        context.config.lemma_tolerance = 0.0;
        {
            let mut ctx = context.into_partial_ref_mut();
            ctx.part_mut(TraversalP)
                .set_bound(var!(0), BoundSide::Upper, 0.0);
            replay_lemma(ctx.borrow(), &inactive_relu_lemma()).unwrap();
        }

        let mut context = relu_context();
        context.config.lemma_tolerance = 0.0;
        let mut ctx = context.into_partial_ref_mut();
        ctx.part_mut(TraversalP)
            .set_bound(var!(0), BoundSide::Upper, 1e-7);
        assert!(replay_lemma(ctx.borrow(), &inactive_relu_lemma()).is_err());
    }

    #[test]
    fn sign_lemma_fixes_the_negative_phase() {
        let problem = Problem::new(
            Tableau::new(vec![], 2),
            Bounds::new(vec![-0.5, 1.0], vec![-1.0, -1.0]),
            vec![ProblemConstraint::unfixed(PlcConstraint::Sign {
                b: var!(0),
                f: var!(1),
            })],
        );
        let mut context = Box::new(Context::default());
        context.traversal = Traversal::new(&problem.ground_bounds);
        context.constraint_state = ConstraintState::new(&problem.constraints);
        context.problem = problem;

        // b <= -0.5 < 0 forces f <= -1.
        let lemma = PlcLemma::new(
            vec![var!(0)],
            BoundSide::Upper,
            var!(1),
            BoundSide::Upper,
            -1.0,
            ConstraintKind::Sign,
            vec![],
        );
        {
            let mut ctx = context.into_partial_ref_mut();
            replay_lemma(ctx.borrow(), &lemma).unwrap();
        }

        assert_eq!(context.constraint_state.phase(0), Phase::Negative);
        assert_eq!(
            context.traversal.bound(var!(1), BoundSide::Upper),
            -1.0
        );
    }

    #[test]
    fn abs_lemma_tightens_the_output_upper_bound() {
        // b in [-2, 1], f in [0, 5]: |b| <= 2 supports f <= 2.
        let problem = Problem::new(
            Tableau::new(vec![], 4),
            Bounds::new(vec![1.0, 5.0, 1.0, 1.0], vec![-2.0, 0.0, 0.0, 0.0]),
            vec![ProblemConstraint::unfixed(PlcConstraint::AbsoluteValue {
                b: var!(0),
                f: var!(1),
                pos_aux: var!(2),
                neg_aux: var!(3),
            })],
        );
        let mut context = Box::new(Context::default());
        context.traversal = Traversal::new(&problem.ground_bounds);
        context.constraint_state = ConstraintState::new(&problem.constraints);
        context.problem = problem;
        {
            let mut ctx = context.into_partial_ref_mut();

            let lemma = PlcLemma::new(
                vec![var!(0), var!(0)],
                BoundSide::Upper,
                var!(1),
                BoundSide::Upper,
                2.0,
                ConstraintKind::AbsoluteValue,
                vec![],
            );
            replay_lemma(ctx.borrow(), &lemma).unwrap();

            // Affecting anything but f is not a supported Abs shape.
            let unsupported = PlcLemma::new(
                vec![var!(1), var!(1)],
                BoundSide::Upper,
                var!(0),
                BoundSide::Upper,
                2.0,
                ConstraintKind::AbsoluteValue,
                vec![],
            );
            assert!(replay_lemma(ctx.borrow(), &unsupported).is_err());
        }

        assert_eq!(
            context.traversal.bound(var!(1), BoundSide::Upper),
            2.0
        );
    }

    #[test]
    fn max_lemma_accepts_an_element_upper_bound() {
        let problem = Problem::new(
            Tableau::new(vec![], 3),
            Bounds::new(vec![5.0, 2.0, 3.0], vec![0.0, 0.0, 0.0]),
            vec![ProblemConstraint::unfixed(PlcConstraint::Max {
                f: var!(0),
                elements: vec![var!(1), var!(2)],
                eliminated: vec![],
                max_eliminated: std::f64::NEG_INFINITY,
                element_splits: vec![],
            })],
        );
        let mut context = Box::new(Context::default());
        context.traversal = Traversal::new(&problem.ground_bounds);
        context.constraint_state = ConstraintState::new(&problem.constraints);
        context.problem = problem;
        let mut ctx = context.into_partial_ref_mut();

        // ub(x2) = 3 supports f <= 3.
        let lemma = PlcLemma::new(
            vec![var!(2)],
            BoundSide::Upper,
            var!(0),
            BoundSide::Upper,
            3.0,
            ConstraintKind::Max,
            vec![],
        );
        replay_lemma(ctx.borrow(), &lemma).unwrap();

        // But f >= anything is not a supported Max shape.
        let unsupported = PlcLemma::new(
            vec![var!(2)],
            BoundSide::Upper,
            var!(0),
            BoundSide::Lower,
            0.0,
            ConstraintKind::Max,
            vec![],
        );
        assert!(replay_lemma(ctx.borrow(), &unsupported).is_err());
    }
}
