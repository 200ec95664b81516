//! Module with the syntax tree arena.
//!
//! Trees are produced by [SyntaxTree::parse_source] and [SyntaxTree::parse_pattern]. Nodes live in
//! an arena and are addressed by [NodeId]; the search results refer to nodes by their ids.

use std::collections::BTreeMap;

use crate::{
    internal::parser,
    position::LineIndex,
    Kind, Position, Result, Span,
};

/// The id of a node in a [SyntaxTree].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    /// Get the id as usize.
    #[inline]
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of a syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) kind: Kind,
    pub(crate) text: Option<String>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) span: Span,
}

impl Node {
    /// The kind of the node.
    #[inline]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The name, label, operator or literal value of the node.
    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The children in source order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The parent node, `None` for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The source range of the node.
    #[inline]
    pub fn span(&self) -> Span {
        self.span
    }
}

/// A parsed syntax tree together with its source text.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    nodes: Vec<Node>,
    /// Distance of every node from its topmost ancestor.
    depths: Vec<u32>,
    root: NodeId,
    line_index: LineIndex,
}

impl SyntaxTree {
    /// Parses a source text.
    ///
    /// A text starting with a package, import or class declaration is parsed as compilation unit.
    /// Any other text is parsed as a list of statements below a synthetic [Kind::Block] root.
    pub fn parse_source(source: &str) -> Result<SyntaxTree> {
        parser::parse_source(source)
    }

    /// Parses a search pattern. See [ParsedPattern].
    pub fn parse_pattern(pattern: &str) -> Result<ParsedPattern> {
        parser::parse_pattern(pattern)
    }

    pub(crate) fn from_nodes(source: &str, mut nodes: Vec<Node>, root: NodeId) -> Self {
        for index in 0..nodes.len() {
            for child_index in 0..nodes[index].children.len() {
                let child = nodes[index].children[child_index];
                debug_assert!(nodes[child.as_usize()].parent.is_none());
                nodes[child.as_usize()].parent = Some(NodeId::new(index));
            }
        }
        // Children are created before their parents, so parents are visited first here.
        let mut depths = vec![0; nodes.len()];
        for index in (0..nodes.len()).rev() {
            for child in &nodes[index].children {
                depths[child.as_usize()] = depths[index] + 1;
            }
        }
        Self {
            source: source.to_string(),
            nodes,
            depths,
            root,
            line_index: LineIndex::new(source),
        }
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes. Parsed trees always have a root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.as_usize()]
    }

    /// The kind of a node.
    #[inline]
    pub fn kind(&self, id: NodeId) -> Kind {
        self.node(id).kind
    }

    /// The name, operator or literal value of a node.
    #[inline]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).text()
    }

    /// The children of a node.
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// The parent of a node.
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The source range of a node.
    #[inline]
    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    /// The whole source text.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The source text of a node.
    pub fn source_text(&self, id: NodeId) -> &str {
        &self.source[self.span(id).range()]
    }

    /// The line and column of a byte offset.
    pub fn position(&self, offset: usize) -> Position {
        self.line_index.position(&self.source, offset)
    }

    /// The ids of all nodes from `id` up to the root, `id` first.
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        path
    }

    /// The number of ancestors of a node.
    #[inline]
    pub fn depth(&self, id: NodeId) -> usize {
        self.depths[id.as_usize()] as usize
    }

    /// Iterates the subtree below `from` in pre-order, `from` first.
    pub fn preorder(&self, from: NodeId) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![from],
        }
    }

    /// Compares two subtrees, possibly of different trees, for equal kinds, texts and shape.
    pub fn same_structure(&self, a: NodeId, other: &SyntaxTree, b: NodeId) -> bool {
        let mut stack = vec![(a, b)];
        while let Some((a, b)) = stack.pop() {
            let (na, nb) = (self.node(a), other.node(b));
            if na.kind != nb.kind
                || na.text != nb.text
                || na.children.len() != nb.children.len()
            {
                return false;
            }
            stack.extend(na.children.iter().copied().zip(nb.children.iter().copied()));
        }
        true
    }

    /// Sorts node ids in source order, enclosing nodes before the nodes they contain.
    pub fn sort_in_source_order(&self, ids: &mut [NodeId]) {
        ids.sort_by_key(|id| self.source_order_key(*id));
    }

    pub(crate) fn source_order_key(&self, id: NodeId) -> (usize, std::cmp::Reverse<usize>, u32) {
        let span = self.span(id);
        (span.start, std::cmp::Reverse(span.end), self.depths[id.as_usize()])
    }
}

/// A pre-order iterator over a subtree.
#[derive(Debug)]
pub struct Preorder<'t> {
    tree: &'t SyntaxTree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

/// The syntactic form of a search pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternForm {
    /// A single expression, e.g. `$a.equals($b)`.
    Expression,
    /// A single statement, e.g. `return $val;`.
    Statement,
    /// A sequence of statements, matched as a run of statements inside a block.
    Statements,
}

/// A parsed search pattern.
///
/// Identifiers starting with `$` are pattern variables:
/// - `$x` matches any single subtree, `$x;` any single statement,
/// - `$x$` matches zero or more elements of a list (arguments, block statements),
/// - a variable in a name position (a declared variable name, a label) matches any name,
/// - `$x{Type}` additionally declares the expected type of the bound expression.
#[derive(Debug, Clone)]
pub struct ParsedPattern {
    pub(crate) tree: SyntaxTree,
    pub(crate) form: PatternForm,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) constraints: BTreeMap<String, String>,
}

impl ParsedPattern {
    /// The pattern source text.
    #[inline]
    pub fn text(&self) -> &str {
        self.tree.source()
    }

    /// The parsed pattern tree.
    #[inline]
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// The syntactic form.
    #[inline]
    pub fn form(&self) -> PatternForm {
        self.form
    }

    /// The top level pattern nodes: one for expressions and statements, the statement list for
    /// statement sequences.
    #[inline]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// The type constraints declared with `$x{Type}`, keyed by variable name.
    #[inline]
    pub fn constraints(&self) -> &BTreeMap<String, String> {
        &self.constraints
    }
}

/// A pattern variable standing for whole subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wildcard<'a> {
    /// `$x`, any single subtree.
    Any(&'a str),
    /// `$x;`, any single statement.
    AnyStatement(&'a str),
    /// `$x$` or `$x$;` as element of a list, zero or more elements.
    Many(&'a str),
}

impl SyntaxTree {
    /// Classifies a pattern node as wildcard. `in_list` tells whether the parent has list
    /// children; outside lists a multi-variable stands for exactly one subtree.
    pub(crate) fn wildcard(&self, id: NodeId, in_list: bool) -> Option<Wildcard<'_>> {
        let node = self.node(id);
        let variable = |id: NodeId| {
            let node = self.node(id);
            match (node.kind, node.text.as_deref()) {
                (Kind::Identifier, Some(name)) if is_variable(name) => Some(name),
                _ => None,
            }
        };
        match node.kind {
            Kind::Identifier => variable(id).map(|name| {
                if in_list && is_multi_variable(name) {
                    Wildcard::Many(name)
                } else {
                    Wildcard::Any(name)
                }
            }),
            Kind::ExpressionStatement if node.children.len() == 1 => {
                variable(node.children[0]).map(|name| {
                    if in_list && is_multi_variable(name) {
                        Wildcard::Many(name)
                    } else {
                        Wildcard::AnyStatement(name)
                    }
                })
            }
            _ => None,
        }
    }

    /// The variable in the name position of a pattern node, e.g. `$v` in `int $v = 0;`.
    pub(crate) fn name_variable(&self, id: NodeId) -> Option<&str> {
        let node = self.node(id);
        if node.kind == Kind::Identifier || !node.kind.has_name() {
            return None;
        }
        node.text.as_deref().filter(|name| is_variable(name))
    }

    /// Whether the children of a node form a list, see [Kind::has_list_children].
    #[inline]
    pub(crate) fn has_list_children(&self, id: NodeId) -> bool {
        self.kind(id).has_list_children()
    }
}

/// Check if a name denotes a pattern variable.
#[inline]
pub(crate) fn is_variable(name: &str) -> bool {
    name.len() > 1 && name.starts_with('$')
}

/// Check if a name denotes a multi-variable, i.e. one matching zero or more list elements.
#[inline]
pub(crate) fn is_multi_variable(name: &str) -> bool {
    name.len() > 2 && name.starts_with('$') && name.ends_with('$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parents_and_paths() {
        let tree = SyntaxTree::parse_source("a = b + c;").unwrap();
        let root = tree.root();
        assert_eq!(tree.kind(root), Kind::Block);
        assert_eq!(tree.parent(root), None);
        let binary = tree
            .preorder(root)
            .find(|id| tree.kind(*id) == Kind::Binary)
            .unwrap();
        assert_eq!(tree.source_text(binary), "b + c");
        let kinds: Vec<Kind> = tree.path(binary).iter().map(|id| tree.kind(*id)).collect();
        assert_eq!(
            kinds,
            vec![
                Kind::Binary,
                Kind::Assignment,
                Kind::ExpressionStatement,
                Kind::Block
            ]
        );
    }

    #[test]
    fn test_preorder() {
        let tree = SyntaxTree::parse_source("f(x, 1);").unwrap();
        let kinds: Vec<Kind> = tree.preorder(tree.root()).map(|id| tree.kind(id)).collect();
        assert_eq!(
            kinds,
            vec![
                Kind::Block,
                Kind::ExpressionStatement,
                Kind::MethodInvocation,
                Kind::Identifier,
                Kind::Arguments,
                Kind::Identifier,
                Kind::IntLiteral,
            ]
        );
    }

    #[test]
    fn test_same_structure() {
        let tree = SyntaxTree::parse_source("x = a.b(1); y = a.b(1); z = a.b(2);").unwrap();
        let calls: Vec<NodeId> = tree
            .preorder(tree.root())
            .filter(|id| tree.kind(*id) == Kind::MethodInvocation)
            .collect();
        assert_eq!(calls.len(), 3);
        assert!(tree.same_structure(calls[0], &tree, calls[1]));
        assert!(!tree.same_structure(calls[0], &tree, calls[2]));
    }

    #[test]
    fn test_same_structure_of_long_chains() {
        let sum = "a + ".repeat(20_000);
        let tree = SyntaxTree::parse_source(&format!("x = {0}a == {0}a;", sum)).unwrap();
        let equals = tree
            .preorder(tree.root())
            .find(|id| tree.text(*id) == Some("=="))
            .unwrap();
        let sides = tree.children(equals);
        assert!(tree.same_structure(sides[0], &tree, sides[1]));
        let other = SyntaxTree::parse_source(&format!("{}b;", sum)).unwrap();
        let statement = other.children(other.root())[0];
        assert!(!tree.same_structure(sides[0], &other, other.children(statement)[0]));
    }

    #[test]
    fn test_depths_and_source_order() {
        let tree = SyntaxTree::parse_source(&format!("x = {}a;", "a + ".repeat(3000))).unwrap();
        let mut binaries: Vec<NodeId> = tree
            .preorder(tree.root())
            .filter(|id| tree.kind(*id) == Kind::Binary)
            .collect();
        assert_eq!(binaries.len(), 3000);
        for id in tree.preorder(tree.root()).take(100) {
            assert_eq!(tree.depth(id), tree.path(id).len() - 1);
        }
        let expected = binaries.clone();
        binaries.reverse();
        tree.sort_in_source_order(&mut binaries);
        assert_eq!(binaries, expected);
        assert_eq!(tree.depth(expected[2999]), 3002);
    }

    #[test]
    fn test_wildcards() {
        let pattern = SyntaxTree::parse_pattern("{ $s; $rest$; f($a, $args$); int $v = 0; }").unwrap();
        let tree = pattern.tree();
        let found: Vec<(Kind, Option<Wildcard<'_>>)> = tree
            .preorder(tree.root())
            .map(|id| {
                let in_list = tree.parent(id).is_some_and(|p| tree.has_list_children(p));
                (tree.kind(id), tree.wildcard(id, in_list))
            })
            .filter(|(_, w)| w.is_some())
            .collect();
        assert_eq!(
            found,
            vec![
                (Kind::ExpressionStatement, Some(Wildcard::AnyStatement("$s"))),
                (Kind::Identifier, Some(Wildcard::Any("$s"))),
                (Kind::ExpressionStatement, Some(Wildcard::Many("$rest$"))),
                (Kind::Identifier, Some(Wildcard::Any("$rest$"))),
                (Kind::Identifier, Some(Wildcard::Any("$a"))),
                (Kind::Identifier, Some(Wildcard::Many("$args$"))),
            ]
        );
        let declaration = tree
            .preorder(tree.root())
            .find(|id| tree.kind(*id) == Kind::VariableDecl)
            .unwrap();
        assert_eq!(tree.name_variable(declaration), Some("$v"));
    }

    #[test]
    fn test_variable_names() {
        assert!(is_variable("$a"));
        assert!(is_variable("$a$"));
        assert!(!is_variable("$"));
        assert!(!is_variable("a$"));
        assert!(is_multi_variable("$a$"));
        assert!(!is_multi_variable("$a"));
        assert!(!is_multi_variable("$$"));
    }
}
