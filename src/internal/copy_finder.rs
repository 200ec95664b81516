//! Exact structural matching of one pattern against a tree.
//!
//! A pattern node matches a tree node if kinds, texts and children match. Variables bind the
//! tree nodes they match; a variable occurring again has to match a subtree of the same structure
//! as its first binding. Literal values are compared exactly.

use log::trace;
use rustc_hash::FxHashMap;

use crate::{
    tree::Wildcard, Binding, CancellationToken, Kind, NodeId, ParsedPattern, PatternForm,
    SyntaxTree, VariableAssignments,
};

type Bindings = FxHashMap<String, Binding>;

/// Matches one pattern at single nodes of a tree.
#[derive(Debug)]
pub(crate) struct CopyFinder<'a> {
    pattern: &'a ParsedPattern,
    tree: &'a SyntaxTree,
    /// Bindings every match starts with.
    preset: Bindings,
}

impl<'a> CopyFinder<'a> {
    pub(crate) fn new(pattern: &'a ParsedPattern, tree: &'a SyntaxTree) -> Self {
        Self {
            pattern,
            tree,
            preset: Bindings::default(),
        }
    }

    /// Only accepts matches that agree with the given bindings.
    pub(crate) fn with_preset(mut self, preset: &VariableAssignments) -> Self {
        self.preset = preset
            .iter()
            .map(|(variable, binding)| (variable.to_string(), binding.clone()))
            .collect();
        self
    }

    /// Searches the subtree below `root` and calls `found` with every match position in
    /// pre-order. `found` returns false to stop the search.
    ///
    /// Returns `None` if cancelled. The token is polled once per node.
    pub(crate) fn search<F>(
        &self,
        root: NodeId,
        cancel: &CancellationToken,
        mut found: F,
    ) -> Option<()>
    where
        F: FnMut(NodeId) -> bool,
    {
        for id in self.tree.preorder(root) {
            if cancel.is_cancelled() {
                trace!("Copy finder cancelled at node {}", id);
                return None;
            }
            for position in self.matches_at(id) {
                if !found(position) {
                    return Some(());
                }
            }
        }
        Some(())
    }

    /// The positions of the matches anchored at `id`.
    ///
    /// Expression and statement patterns match at `id` itself. Statement sequences match inside
    /// a block; a match is reported at the statement matched by the first pattern statement that
    /// is not a multi-variable, or at the block if there is none.
    pub(crate) fn matches_at(&self, id: NodeId) -> Vec<NodeId> {
        self.assignments_at(id)
            .into_iter()
            .map(|(position, _)| position)
            .collect()
    }

    /// Like [CopyFinder::matches_at], with the variable bindings of every match.
    pub(crate) fn assignments_at(&self, id: NodeId) -> Vec<(NodeId, VariableAssignments)> {
        match self.pattern.form() {
            PatternForm::Expression | PatternForm::Statement => {
                let mut bindings = self.preset.clone();
                if self.match_node(self.pattern.roots()[0], id, false, &mut bindings) {
                    vec![(id, bindings.into_iter().collect())]
                } else {
                    Vec::new()
                }
            }
            PatternForm::Statements => self.match_sequence(id),
        }
    }

    fn match_sequence(&self, block: NodeId) -> Vec<(NodeId, VariableAssignments)> {
        if self.tree.kind(block) != Kind::Block {
            return Vec::new();
        }
        let roots = self.pattern.roots();
        let statements = self.tree.children(block);
        let first_concrete = roots.iter().position(|r| {
            !matches!(
                self.pattern_tree().wildcard(*r, true),
                Some(Wildcard::Many(_))
            )
        });
        match first_concrete {
            None => {
                let mut bindings = self.preset.clone();
                if self.match_list(roots, statements, false, &mut bindings) {
                    vec![(block, bindings.into_iter().collect())]
                } else {
                    Vec::new()
                }
            }
            Some(first) => (0..statements.len())
                .filter_map(|start| {
                    let mut bindings = self.preset.clone();
                    // Leading multi-variables take the statements before the match.
                    let leading = roots[..first].iter().enumerate().all(|(i, r)| {
                        match self.pattern_tree().wildcard(*r, true) {
                            Some(Wildcard::Many(variable)) => {
                                let run = if i == 0 {
                                    &statements[..start]
                                } else {
                                    &statements[start..start]
                                };
                                self.bind_nodes(variable, run, &mut bindings)
                            }
                            _ => false,
                        }
                    });
                    (leading
                        && self.match_list(
                            &roots[first..],
                            &statements[start..],
                            false,
                            &mut bindings,
                        ))
                    .then(|| (statements[start], bindings.into_iter().collect()))
                })
                .collect(),
        }
    }

    #[inline]
    fn pattern_tree(&self) -> &SyntaxTree {
        self.pattern.tree()
    }

    fn match_node(&self, p: NodeId, t: NodeId, in_list: bool, bindings: &mut Bindings) -> bool {
        let pattern = self.pattern_tree();
        match pattern.wildcard(p, in_list) {
            Some(Wildcard::Any(variable)) | Some(Wildcard::Many(variable)) => {
                return self.bind_node(variable, t, bindings)
            }
            Some(Wildcard::AnyStatement(variable)) => {
                return self.tree.kind(t).is_statement() && self.bind_node(variable, t, bindings)
            }
            None => {}
        }
        let (pn, tn) = (pattern.node(p), self.tree.node(t));
        if pn.kind() != tn.kind() {
            return false;
        }
        match pattern.name_variable(p) {
            Some(variable) => {
                let Some(name) = tn.text() else {
                    return false;
                };
                if !self.bind_name(variable, name, bindings) {
                    return false;
                }
            }
            None => {
                if pn.text() != tn.text() {
                    return false;
                }
            }
        }
        if pn.kind().has_list_children() {
            self.match_list(pn.children(), tn.children(), true, bindings)
        } else {
            pn.children().len() == tn.children().len()
                && pn
                    .children()
                    .iter()
                    .zip(tn.children())
                    .all(|(pc, tc)| self.match_node(*pc, *tc, false, bindings))
        }
    }

    /// Matches pattern list elements against tree nodes. With `full` all tree nodes have to be
    /// matched, otherwise trailing tree nodes are ignored.
    fn match_list(
        &self,
        ps: &[NodeId],
        ts: &[NodeId],
        full: bool,
        bindings: &mut Bindings,
    ) -> bool {
        let Some((first, rest)) = ps.split_first() else {
            return !full || ts.is_empty();
        };
        if let Some(Wildcard::Many(variable)) = self.pattern_tree().wildcard(*first, true) {
            for count in 0..=ts.len() {
                let mut attempt = bindings.clone();
                if self.bind_nodes(variable, &ts[..count], &mut attempt)
                    && self.match_list(rest, &ts[count..], full, &mut attempt)
                {
                    *bindings = attempt;
                    return true;
                }
            }
            return false;
        }
        let Some((t, ts_rest)) = ts.split_first() else {
            return false;
        };
        let mut attempt = bindings.clone();
        if self.match_node(*first, *t, true, &mut attempt)
            && self.match_list(rest, ts_rest, full, &mut attempt)
        {
            *bindings = attempt;
            return true;
        }
        false
    }

    fn same(&self, a: NodeId, b: NodeId) -> bool {
        self.tree.same_structure(a, self.tree, b)
    }

    fn bind_node(&self, variable: &str, t: NodeId, bindings: &mut Bindings) -> bool {
        match bindings.get(variable) {
            Some(Binding::Node(bound)) => self.same(*bound, t),
            Some(Binding::Nodes(bound)) => bound.len() == 1 && self.same(bound[0], t),
            Some(Binding::Name(name)) => {
                self.tree.kind(t) == Kind::Identifier && self.tree.text(t) == Some(name.as_str())
            }
            None => {
                bindings.insert(variable.to_string(), Binding::Node(t));
                true
            }
        }
    }

    fn bind_nodes(&self, variable: &str, ts: &[NodeId], bindings: &mut Bindings) -> bool {
        match bindings.get(variable) {
            Some(Binding::Nodes(bound)) => {
                bound.len() == ts.len() && bound.iter().zip(ts).all(|(b, t)| self.same(*b, *t))
            }
            Some(Binding::Node(bound)) => ts.len() == 1 && self.same(*bound, ts[0]),
            Some(Binding::Name(_)) => false,
            None => {
                bindings.insert(variable.to_string(), Binding::Nodes(ts.to_vec()));
                true
            }
        }
    }

    fn bind_name(&self, variable: &str, name: &str, bindings: &mut Bindings) -> bool {
        match bindings.get(variable) {
            Some(Binding::Name(bound)) => bound == name,
            Some(Binding::Node(bound)) => {
                self.tree.kind(*bound) == Kind::Identifier && self.tree.text(*bound) == Some(name)
            }
            Some(Binding::Nodes(_)) => false,
            None => {
                bindings.insert(variable.to_string(), Binding::Name(name.to_string()));
                true
            }
        }
    }
}
