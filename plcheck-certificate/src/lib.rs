//! Unsatisfiability certificate records for the plcheck certificate checker.
//!
//! A solver run that concludes UNSAT leaves behind a tree of case splits
//! whose leaves are contradictions. This crate holds the value types of that
//! tree (lemmas, contradictions and nodes) together with the bound explainer
//! that produces the per-bound row combinations the checker later replays,
//! and the pure kernel that turns a stored explanation back into a concrete
//! bound.

pub mod explainer;
pub mod kernel;
pub mod lemma;
pub mod node;
pub mod phase_clause;

pub use explainer::{BoundExplainer, ExplainerConfig};
pub use lemma::{Explanation, PlcLemma};
pub use node::{CertificateNode, Contradiction, Delegation};
pub use phase_clause::{PhaseClause, PhaseClauseSet};
