//! SMT-LIB writer for the plcheck certificate checker.
//!
//! When the checker accepts a delegated leaf, the residual problem at that
//! leaf is handed to an external solver as a `QF_LRA` instance extended with
//! `ite` terms for the piecewise-linear constraints. This crate emits that
//! textual format, one section writer per instance part, streaming into any
//! [`io::Write`] target.

use std::io;

use plcheck_problem::float::DEFAULT_EPSILON;
use plcheck_problem::{BoundSide, CaseSplit, Equation, Phase, Relation, SparseRow, Var};

/// A numeric literal in fixed notation.
///
/// The precision is `floor(log10(1/epsilon))` decimal digits for the
/// comparison epsilon, with trailing zeros (and a then-dangling point)
/// trimmed. Negative values are wrapped as `( - |v| )`.
pub fn signed_value(value: f64) -> String {
    let precision = (1.0 / DEFAULT_EPSILON).log10().floor() as usize;
    let mut magnitude = format!("{:.*}", precision, value.abs());
    if magnitude.contains('.') {
        while magnitude.ends_with('0') {
            magnitude.pop();
        }
        if magnitude.ends_with('.') {
            magnitude.pop();
        }
    }
    if value >= 0.0 {
        magnitude
    } else {
        format!("( - {} )", magnitude)
    }
}

/// The logic declaration and one `Real` declaration per variable.
pub fn write_header(target: &mut impl io::Write, var_count: usize) -> io::Result<()> {
    writeln!(target, "( set-logic QF_LRA )")?;
    for index in 0..var_count {
        writeln!(target, "( declare-fun x{} () Real )", index)?;
    }
    Ok(())
}

/// The closing `check-sat`/`exit` commands.
pub fn write_footer(target: &mut impl io::Write) -> io::Result<()> {
    writeln!(target, "( check-sat )")?;
    writeln!(target, "( exit )")
}

/// One `<=` assertion per variable against its current upper bound.
pub fn write_ground_upper_bounds(target: &mut impl io::Write, bounds: &[f64]) -> io::Result<()> {
    for (index, &bound) in bounds.iter().enumerate() {
        writeln!(target, "( assert ( <= x{} {} ) )", index, signed_value(bound))?;
    }
    Ok(())
}

/// One `>=` assertion per variable against its current lower bound.
pub fn write_ground_lower_bounds(target: &mut impl io::Write, bounds: &[f64]) -> io::Result<()> {
    for (index, &bound) in bounds.iter().enumerate() {
        writeln!(target, "( assert ( >= x{} {} ) )", index, signed_value(bound))?;
    }
    Ok(())
}

/// An original equation row as `( assert ( = 0 <sum> ) )`.
///
/// Rows with no non-zero entry are skipped entirely.
pub fn write_tableau_row(target: &mut impl io::Write, row: &SparseRow) -> io::Result<()> {
    let terms: Vec<String> = row
        .entries()
        .iter()
        .filter(|&&(_, coefficient)| coefficient != 0.0)
        .map(|&(var, coefficient)| term(coefficient, var))
        .collect();

    if terms.is_empty() {
        return Ok(());
    }
    writeln!(target, "( assert ( = 0 {} ) )", nested_sum(&terms))
}

/// A ReLU constraint in its current phase.
pub fn write_relu(target: &mut impl io::Write, b: Var, f: Var, phase: Phase) -> io::Result<()> {
    match phase {
        Phase::Active => writeln!(target, "( assert ( = {} {} ) )", f, b),
        Phase::Inactive => writeln!(target, "( assert ( = {} 0 ) )", f),
        _ => writeln!(
            target,
            "( assert ( = {} ( ite ( >= {} 0 ) {} 0 ) ) )",
            f, b, b
        ),
    }
}

/// A Sign constraint in its current phase.
pub fn write_sign(target: &mut impl io::Write, b: Var, f: Var, phase: Phase) -> io::Result<()> {
    match phase {
        Phase::Positive => writeln!(target, "( assert ( = {} 1 ) )", f),
        Phase::Negative => writeln!(target, "( assert ( = {} ( - 1 ) ) )", f),
        _ => writeln!(
            target,
            "( assert ( = {} ( ite ( >= {} 0 ) 1 ( - 1 ) ) ) )",
            f, b
        ),
    }
}

/// An AbsoluteValue constraint in its current phase.
pub fn write_abs(target: &mut impl io::Write, b: Var, f: Var, phase: Phase) -> io::Result<()> {
    match phase {
        Phase::Positive => writeln!(target, "( assert ( = {} {} ) )", f, b),
        Phase::Negative => writeln!(target, "( assert ( = {} ( - {} ) ) )", f, b),
        _ => writeln!(
            target,
            "( assert ( = {} ( ite ( >= {} 0 ) {} ( - {} ) ) ) )",
            f, b, b, b
        ),
    }
}

/// A Max constraint: one implication per element.
///
/// Whenever an element dominates all others, the output equals it.
pub fn write_max(target: &mut impl io::Write, f: Var, elements: &[Var]) -> io::Result<()> {
    for &element in elements {
        let pairwise: Vec<String> = elements
            .iter()
            .filter(|&&other| other != element)
            .map(|&other| format!("( >= {} {} )", element, other))
            .collect();

        match pairwise.len() {
            0 => writeln!(target, "( assert ( = {} {} ) )", f, element)?,
            1 => writeln!(
                target,
                "( assert ( {} => ( = {} {} ) ) )",
                pairwise[0], f, element
            )?,
            _ => writeln!(
                target,
                "( assert ( ( and {} ) => ( = {} {} ) ) )",
                pairwise.join(" "),
                f,
                element
            )?,
        }
    }
    Ok(())
}

/// A Disjunction constraint as one `or` over its feasible disjuncts.
///
/// Each disjunct conjoins its equations and tightenings.
pub fn write_disjunction<'a>(
    target: &mut impl io::Write,
    disjuncts: impl IntoIterator<Item = &'a CaseSplit>,
) -> io::Result<()> {
    let rendered: Vec<String> = disjuncts.into_iter().map(disjunct).collect();

    match rendered.len() {
        0 => Ok(()),
        1 => writeln!(target, "( assert {} )", rendered[0]),
        _ => writeln!(target, "( assert ( or {} ) )", rendered.join(" ")),
    }
}

/// The conjunction of a disjunct's equations and tightenings.
fn disjunct(split: &CaseSplit) -> String {
    let mut atoms: Vec<String> = split.equations().iter().map(equation_atom).collect();
    atoms.extend(split.tightenings().iter().map(|tightening| {
        let relation = match tightening.side {
            BoundSide::Lower => ">=",
            BoundSide::Upper => "<=",
        };
        format!(
            "( {} {} {} )",
            relation,
            tightening.var,
            signed_value(tightening.value)
        )
    }));

    if atoms.len() == 1 {
        atoms.pop().unwrap()
    } else {
        format!("( and {} )", atoms.join(" "))
    }
}

/// An equation atom `( rel scalar <sum> )`.
///
/// The relation places the scalar on the dominating side: an `Le` equation
/// asserts the scalar is at least the sum, a `Ge` equation at most.
fn equation_atom(equation: &Equation) -> String {
    let relation = match equation.relation {
        Relation::Eq => "=",
        Relation::Le => ">=",
        Relation::Ge => "<=",
    };
    let terms: Vec<String> = equation
        .addends
        .iter()
        .filter(|&&(coefficient, _)| coefficient != 0.0)
        .map(|&(coefficient, var)| term(coefficient, var))
        .collect();

    format!(
        "( {} {} {} )",
        relation,
        signed_value(equation.scalar),
        nested_sum(&terms)
    )
}

/// A single summand; unit coefficients elide the multiplication.
fn term(coefficient: f64, var: Var) -> String {
    if coefficient == 1.0 {
        format!("{}", var)
    } else if coefficient == -1.0 {
        format!("( - {} )", var)
    } else {
        format!("( * {} {} )", signed_value(coefficient), var)
    }
}

/// A right-nested sum of the given summands.
fn nested_sum(terms: &[String]) -> String {
    match terms.split_first() {
        None => "0".to_string(),
        Some((single, [])) => single.clone(),
        Some((first, rest)) => format!("( + {} {} )", first, nested_sum(rest)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcheck_problem::{split, tighten, var};

    fn lines(buffer: &[u8]) -> Vec<String> {
        std::str::from_utf8(buffer)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn signed_values_are_trimmed_and_wrapped() {
        assert_eq!(signed_value(2.0), "2");
        assert_eq!(signed_value(-1.5), "( - 1.5 )");
        assert_eq!(signed_value(0.0), "0");
        assert_eq!(signed_value(0.25), "0.25");
    }

    #[test]
    fn whole_instance_layout() {
        let mut buffer = vec![];

        write_header(&mut buffer, 2).unwrap();
        write_ground_upper_bounds(&mut buffer, &[1.0, 1.0]).unwrap();
        write_ground_lower_bounds(&mut buffer, &[1.0, -1.0]).unwrap();
        write_tableau_row(
            &mut buffer,
            &SparseRow::from_entries(vec![(var!(0), 1.0), (var!(1), 2.0)]),
        )
        .unwrap();
        write_relu(&mut buffer, var!(0), var!(1), Phase::NotFixed).unwrap();
        write_sign(&mut buffer, var!(0), var!(1), Phase::NotFixed).unwrap();
        write_abs(&mut buffer, var!(0), var!(1), Phase::NotFixed).unwrap();
        write_max(&mut buffer, var!(1), &[var!(2), var!(3), var!(4)]).unwrap();

        let mut first = CaseSplit::new();
        first.add_equation(Equation::new(
            vec![(1.0, var!(0)), (-2.0, var!(1))],
            -4.0,
            Relation::Eq,
        ));
        first.add_tightening(tighten!(1, -2.0, upper));
        let second = split![(1, 2.0, lower), (0, -1.5, upper)];
        write_disjunction(&mut buffer, vec![&first, &second]).unwrap();

        write_footer(&mut buffer).unwrap();

        let expected = vec![
            "( set-logic QF_LRA )",
            "( declare-fun x0 () Real )",
            "( declare-fun x1 () Real )",
            "( assert ( <= x0 1 ) )",
            "( assert ( <= x1 1 ) )",
            "( assert ( >= x0 1 ) )",
            "( assert ( >= x1 ( - 1 ) ) )",
            "( assert ( = 0 ( + x0 ( * 2 x1 ) ) ) )",
            "( assert ( = x1 ( ite ( >= x0 0 ) x0 0 ) ) )",
            "( assert ( = x1 ( ite ( >= x0 0 ) 1 ( - 1 ) ) ) )",
            "( assert ( = x1 ( ite ( >= x0 0 ) x0 ( - x0 ) ) ) )",
            "( assert ( ( and ( >= x2 x3 ) ( >= x2 x4 ) ) => ( = x1 x2 ) ) )",
            "( assert ( ( and ( >= x3 x2 ) ( >= x3 x4 ) ) => ( = x1 x3 ) ) )",
            "( assert ( ( and ( >= x4 x2 ) ( >= x4 x3 ) ) => ( = x1 x4 ) ) )",
            "( assert ( or \
             ( and ( = ( - 4 ) ( + x0 ( * ( - 2 ) x1 ) ) ) ( <= x1 ( - 2 ) ) ) \
             ( and ( >= x1 2 ) ( <= x0 ( - 1.5 ) ) ) ) )",
            "( check-sat )",
            "( exit )",
        ];
        assert_eq!(lines(&buffer), expected);
    }

    proptest::proptest! {
        #[test]
        fn signed_values_parse_back(value in -1000.0..1000.0f64) {
            let rendered = signed_value(value);
            let digits = rendered
                .trim_start_matches("( - ")
                .trim_end_matches(" )");
            let parsed: f64 = digits.parse().unwrap();
            let parsed = if value < 0.0 { -parsed } else { parsed };
            proptest::prop_assert!((parsed - value).abs() <= 1e-9);
        }
    }

    #[test]
    fn phase_fixed_constraints_lose_the_ite() {
        let mut buffer = vec![];
        write_relu(&mut buffer, var!(0), var!(1), Phase::Active).unwrap();
        write_relu(&mut buffer, var!(0), var!(1), Phase::Inactive).unwrap();
        write_sign(&mut buffer, var!(0), var!(1), Phase::Positive).unwrap();
        write_sign(&mut buffer, var!(0), var!(1), Phase::Negative).unwrap();
        write_abs(&mut buffer, var!(0), var!(1), Phase::Positive).unwrap();
        write_abs(&mut buffer, var!(0), var!(1), Phase::Negative).unwrap();

        let expected = vec![
            "( assert ( = x1 x0 ) )",
            "( assert ( = x1 0 ) )",
            "( assert ( = x1 1 ) )",
            "( assert ( = x1 ( - 1 ) ) )",
            "( assert ( = x1 x0 ) )",
            "( assert ( = x1 ( - x0 ) ) )",
        ];
        assert_eq!(lines(&buffer), expected);
    }

    #[test]
    fn single_entry_rows_and_negative_units() {
        let mut buffer = vec![];
        write_tableau_row(&mut buffer, &SparseRow::from_entries(vec![(var!(0), 1.0)])).unwrap();
        write_tableau_row(
            &mut buffer,
            &SparseRow::from_entries(vec![
                (var!(0), -1.0),
                (var!(1), 0.0),
                (var!(2), 3.0),
            ]),
        )
        .unwrap();
        // All-zero rows vanish.
        write_tableau_row(&mut buffer, &SparseRow::from_entries(vec![(var!(1), 0.0)])).unwrap();

        let expected = vec![
            "( assert ( = 0 x0 ) )",
            "( assert ( = 0 ( + ( - x0 ) ( * 3 x2 ) ) ) )",
        ];
        assert_eq!(lines(&buffer), expected);
    }
}
