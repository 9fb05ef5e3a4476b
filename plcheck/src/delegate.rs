//! Emission of delegated leaves.
use std::fs;
use std::io::{self, Write};

use partial_ref::{partial, PartialRef};

use plcheck_problem::PlcConstraint;
use plcheck_smtlib as smtlib;

use crate::context::{parts::*, Context};
use crate::CheckerError;

/// Write the residual problem at the current node as `delegated{N}.smtlib`.
///
/// The instance carries the current (tightened) ground bounds, every
/// original row, and each constraint in its current phase; infeasible
/// disjuncts are left out. The target file is truncated if present.
pub fn write_delegated_leaf(
    mut ctx: partial!(Context, mut TraversalP, ConfigP, ConstraintStateP, ProblemP),
) -> Result<(), CheckerError> {
    let (traversal, mut ctx) = ctx.split_part_mut(TraversalP);

    let path = ctx
        .part(ConfigP)
        .delegation_dir
        .join(format!("delegated{}.smtlib", traversal.delegation_counter));

    let file = fs::File::create(&path).map_err(CheckerError::delegation_io)?;
    let mut target = io::BufWriter::new(file);

    write_instance(&mut target, ctx.borrow(), traversal.bounds())
        .map_err(CheckerError::delegation_io)?;
    target.flush().map_err(CheckerError::delegation_io)?;

    traversal.delegation_counter += 1;
    log::info!("wrote delegated leaf {}", path.display());

    Ok(())
}

fn write_instance(
    target: &mut impl io::Write,
    ctx: partial!(Context, ConstraintStateP, ProblemP),
    bounds: &plcheck_problem::Bounds,
) -> io::Result<()> {
    let problem = ctx.part(ProblemP);
    let state = ctx.part(ConstraintStateP);

    smtlib::write_header(target, problem.var_count())?;
    smtlib::write_ground_upper_bounds(target, bounds.upper())?;
    smtlib::write_ground_lower_bounds(target, bounds.lower())?;

    for row in problem.tableau.rows() {
        smtlib::write_tableau_row(target, row)?;
    }

    for (index, problem_constraint) in problem.constraints.iter().enumerate() {
        let phase = state.phase(index);
        match &problem_constraint.constraint {
            PlcConstraint::Relu { b, f, .. } => smtlib::write_relu(target, *b, *f, phase)?,
            PlcConstraint::Sign { b, f } => smtlib::write_sign(target, *b, *f, phase)?,
            PlcConstraint::AbsoluteValue { b, f, .. } => {
                smtlib::write_abs(target, *b, *f, phase)?
            }
            PlcConstraint::Max { f, elements, .. } => smtlib::write_max(target, *f, elements)?,
            PlcConstraint::Disjunction { disjuncts } => {
                let mask = state.feasible_mask(index);
                let feasible = disjuncts
                    .iter()
                    .enumerate()
                    .filter(|&(disjunct, _)| mask[disjunct])
                    .map(|(_, split)| split);
                smtlib::write_disjunction(target, feasible)?
            }
        }
    }

    smtlib::write_footer(target)
}
