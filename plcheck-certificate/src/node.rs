//! The certificate tree.
use plcheck_problem::{CaseSplit, Var};

use crate::lemma::PlcLemma;

/// A leaf's proof that the current branch is infeasible.
#[derive(Clone, Debug)]
pub enum Contradiction {
    /// The variable's propagated upper bound lies below its lower bound.
    Bounds { var: Var },
    /// A row combination over the `m` original equations whose upper bound
    /// under the current ground bounds is strictly negative, implying
    /// `0 < 0`.
    Linear { combination: Vec<f64> },
}

/// How a leaf without a contradiction is to be discharged.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Delegation {
    /// Close the leaf by contradiction or by its children.
    None,
    /// Emit the residual problem as a delegated leaf file, then accept.
    SaveAndAccept,
    /// Accept without emitting anything.
    AcceptSilently,
}

impl Default for Delegation {
    fn default() -> Delegation {
        Delegation::None
    }
}

/// A node of the certificate tree.
///
/// A node is a *leaf* (contradiction attached, no children), an *internal*
/// node (children attached, no contradiction) or a *stub* (neither, never
/// visited, accepted trivially). Nodes own their children, lemmas and
/// contradiction; the tree is never cyclic.
#[derive(Clone, Default, Debug)]
pub struct CertificateNode {
    split: CaseSplit,
    lemmas: Vec<PlcLemma>,
    children: Vec<CertificateNode>,
    contradiction: Option<Contradiction>,
    sat_solution: bool,
    delegation: Delegation,
    visited: bool,
}

impl CertificateNode {
    /// Create a root node, with no incoming split.
    pub fn root() -> CertificateNode {
        CertificateNode::default()
    }

    /// Create a node reached by the given case split.
    pub fn with_split(split: CaseSplit) -> CertificateNode {
        CertificateNode {
            split,
            ..CertificateNode::default()
        }
    }

    /// The split taken from the parent to reach this node.
    pub fn split(&self) -> &CaseSplit {
        &self.split
    }

    /// The lemmas replayed at this node, in recorded order.
    pub fn lemmas(&self) -> &[PlcLemma] {
        &self.lemmas
    }

    /// Append a lemma.
    pub fn add_lemma(&mut self, lemma: PlcLemma) {
        self.lemmas.push(lemma);
    }

    /// Drop all recorded lemmas.
    pub fn clear_lemmas(&mut self) {
        self.lemmas.clear();
    }

    /// The children, in recorded order.
    pub fn children(&self) -> &[CertificateNode] {
        &self.children
    }

    /// Append a child node.
    pub fn add_child(&mut self, child: CertificateNode) {
        self.children.push(child);
    }

    /// The child reached by `split`, if any.
    pub fn child_by_split(&self, split: &CaseSplit) -> Option<&CertificateNode> {
        self.children.iter().find(|child| child.split.matches(split))
    }

    /// Drop all children, turning the node into a leaf.
    pub fn make_leaf(&mut self) {
        self.children.clear();
    }

    /// The attached contradiction, if any.
    pub fn contradiction(&self) -> Option<&Contradiction> {
        self.contradiction.as_ref()
    }

    /// Attach a contradiction.
    pub fn set_contradiction(&mut self, contradiction: Contradiction) {
        self.contradiction = Some(contradiction);
    }

    /// True when a satisfying assignment was found elsewhere and this leaf is
    /// accepted unconditionally.
    pub fn sat_solution(&self) -> bool {
        self.sat_solution
    }

    /// Mark the leaf as covered by a satisfying assignment.
    pub fn mark_sat_solution(&mut self) {
        self.sat_solution = true;
    }

    /// The delegation status of this node.
    pub fn delegation(&self) -> Delegation {
        self.delegation
    }

    /// Set the delegation status.
    pub fn delegate(&mut self, delegation: Delegation) {
        self.delegation = delegation;
    }

    /// True when the solver descended into this node.
    pub fn visited(&self) -> bool {
        self.visited
    }

    /// Mark the node as visited.
    pub fn mark_visited(&mut self) {
        self.visited = true;
    }

    /// True for a leaf that can be closed by its contradiction.
    pub fn is_valid_leaf(&self) -> bool {
        self.contradiction.is_some() && self.children.is_empty()
    }

    /// True for an internal node that can be closed by its children.
    pub fn is_valid_internal(&self) -> bool {
        self.contradiction.is_none() && !self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcheck_problem::split;

    #[test]
    fn structural_predicates() {
        let mut node = CertificateNode::root();
        assert!(!node.is_valid_leaf());
        assert!(!node.is_valid_internal());

        node.set_contradiction(Contradiction::Bounds {
            var: plcheck_problem::var!(0),
        });
        assert!(node.is_valid_leaf());

        node.add_child(CertificateNode::root());
        assert!(!node.is_valid_leaf());
        assert!(!node.is_valid_internal());
    }

    #[test]
    fn child_lookup_by_split() {
        let mut node = CertificateNode::root();
        node.add_child(CertificateNode::with_split(split![(0, 0.0, lower)]));
        node.add_child(CertificateNode::with_split(split![(0, 0.0, upper)]));

        let child = node.child_by_split(&split![(0, 0.0, upper)]).unwrap();
        assert!(child.split().matches(&split![(0, 0.0, upper)]));
        assert!(node.child_by_split(&split![(1, 0.0, upper)]).is_none());
    }
}
