use std::collections::BTreeMap;

use crate::{NodeId, SyntaxTree};

/// What a pattern variable is bound to in one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// `$x` and `$x;` bind one subtree.
    Node(NodeId),
    /// `$x$` in a list binds a possibly empty run of list elements.
    Nodes(Vec<NodeId>),
    /// A variable in a name position, e.g. `$v` in `int $v = 0;`, binds the name.
    Name(String),
}

/// The variable bindings of one match, keyed by the variable as written in the pattern, e.g.
/// `$a` or `$args$`.
///
/// Assignments can also be given to [crate::BulkSearch::verify_with_assignments] to restrict
/// matches to those that agree with pre-bound variables. Pre-bound nodes refer to the searched
/// tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableAssignments {
    variables: BTreeMap<String, Binding>,
}

impl VariableAssignments {
    /// Creates assignments without any bound variable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a variable to a subtree.
    pub fn with_node(mut self, variable: &str, id: NodeId) -> Self {
        self.variables
            .insert(variable.to_string(), Binding::Node(id));
        self
    }

    /// Binds a multi-variable to a run of list elements.
    pub fn with_nodes(mut self, variable: &str, ids: Vec<NodeId>) -> Self {
        self.variables
            .insert(variable.to_string(), Binding::Nodes(ids));
        self
    }

    /// Binds a name variable to a name.
    pub fn with_name(mut self, variable: &str, name: &str) -> Self {
        self.variables
            .insert(variable.to_string(), Binding::Name(name.to_string()));
        self
    }

    /// The binding of a variable.
    pub fn get(&self, variable: &str) -> Option<&Binding> {
        self.variables.get(variable)
    }

    /// The subtree bound to a single variable.
    pub fn node(&self, variable: &str) -> Option<NodeId> {
        match self.variables.get(variable) {
            Some(Binding::Node(id)) => Some(*id),
            _ => None,
        }
    }

    /// The list elements bound to a multi-variable.
    pub fn nodes(&self, variable: &str) -> Option<&[NodeId]> {
        match self.variables.get(variable) {
            Some(Binding::Nodes(ids)) => Some(ids),
            _ => None,
        }
    }

    /// The name bound to a name variable.
    pub fn name(&self, variable: &str) -> Option<&str> {
        match self.variables.get(variable) {
            Some(Binding::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// Iterates the variables with their bindings in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.variables
            .iter()
            .map(|(variable, binding)| (variable.as_str(), binding))
    }

    /// The number of bound variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Check if no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl FromIterator<(String, Binding)> for VariableAssignments {
    fn from_iter<T: IntoIterator<Item = (String, Binding)>>(iter: T) -> Self {
        Self {
            variables: iter.into_iter().collect(),
        }
    }
}

/// The matches of a bulk pattern with the variable assignments of every match, see
/// [crate::BulkSearch::verify_with_assignments].
///
/// Matches of one label are sorted in source order like the positions of
/// [crate::Occurrences]. A position matched in several ways keeps the first assignments found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignments {
    matches: BTreeMap<String, Vec<(NodeId, VariableAssignments)>>,
}

impl Assignments {
    pub(crate) fn add(&mut self, label: &str, id: NodeId, assignments: VariableAssignments) {
        match self.matches.get_mut(label) {
            Some(matches) => matches.push((id, assignments)),
            None => {
                self.matches
                    .insert(label.to_string(), vec![(id, assignments)]);
            }
        }
    }

    pub(crate) fn finish(mut self, tree: &SyntaxTree) -> Self {
        for matches in self.matches.values_mut() {
            // Stable, so the first assignments of a position stay in front.
            matches.sort_by_key(|(id, _)| tree.source_order_key(*id));
            matches.dedup_by_key(|(id, _)| *id);
        }
        self
    }

    /// The matches of a label.
    pub fn get(&self, label: &str) -> Option<&[(NodeId, VariableAssignments)]> {
        self.matches.get(label).map(Vec::as_slice)
    }

    /// Iterates labels with their matches.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(NodeId, VariableAssignments)])> {
        self.matches
            .iter()
            .map(|(label, matches)| (label.as_str(), matches.as_slice()))
    }

    /// The number of labels that matched.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Check if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The number of matches over all labels.
    pub fn total(&self) -> usize {
        self.matches.values().map(Vec::len).sum()
    }
}
