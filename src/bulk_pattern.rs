use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    encoding_context::{content_token, identifier},
    internal::CompiledNfa,
    EncodingContext, EncodingMode, NodeId, ParsedPattern, PatternForm, SyntaxTree,
};

/// Declarative constraints of a pattern that the structural matchers don't check.
///
/// They are meant for callers with type information, e.g. to filter candidate files by the
/// types they use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdditionalQueryConstraints {
    /// The types declared with `$x{Type}`.
    pub required_types: BTreeSet<String>,
}

impl AdditionalQueryConstraints {
    /// Check if there are no constraints.
    pub fn is_empty(&self) -> bool {
        self.required_types.is_empty()
    }
}

/// A compiled set of patterns, created by [crate::BulkSearch::create].
///
/// All projections are indexed by pattern number in the order the patterns were given.
/// A bulk pattern is immutable and can be shared between concurrent searches.
#[derive(Debug, Clone)]
pub struct BulkPattern {
    patterns: Vec<String>,
    identifiers: Vec<BTreeSet<String>>,
    required_content: Vec<Vec<Vec<String>>>,
    additional_constraints: Vec<AdditionalQueryConstraints>,
    parsed: Vec<ParsedPattern>,
    pub(crate) compiled: Option<CompiledNfa>,
}

impl BulkPattern {
    pub(crate) fn new(parsed: Vec<ParsedPattern>, compiled: Option<CompiledNfa>) -> Self {
        let patterns = parsed.iter().map(|p| p.text().to_string()).collect();
        let identifiers = parsed.iter().map(required_identifiers).collect();
        let required_content = parsed.iter().map(required_content).collect();
        let additional_constraints = parsed
            .iter()
            .map(|p| AdditionalQueryConstraints {
                required_types: p.constraints().values().cloned().collect(),
            })
            .collect();
        Self {
            patterns,
            identifiers,
            required_content,
            additional_constraints,
            parsed,
            compiled,
        }
    }

    /// The pattern source texts. They are the labels of the search results.
    #[inline]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Per pattern, the concrete names a tree has to contain for the pattern to match.
    #[inline]
    pub fn identifiers(&self) -> &[BTreeSet<String>] {
        &self.identifiers
    }

    /// Per pattern, the runs of content tokens between pattern variables. A matching tree
    /// contains every run as contiguous part of its pre-order content tokens.
    #[inline]
    pub fn required_content(&self) -> &[Vec<Vec<String>>] {
        &self.required_content
    }

    /// Per pattern, the declarative constraints.
    #[inline]
    pub fn additional_constraints(&self) -> &[AdditionalQueryConstraints] {
        &self.additional_constraints
    }

    /// The parsed patterns.
    #[inline]
    pub fn parsed_patterns(&self) -> &[ParsedPattern] {
        &self.parsed
    }

    /// The number of patterns.
    #[inline]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if there are no patterns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The indices of the patterns with the given label.
    pub(crate) fn indices_of<'a>(&'a self, label: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.patterns
            .iter()
            .enumerate()
            .filter(move |(_, text)| text.as_str() == label)
            .map(|(index, _)| index)
    }

    /// Pre-filters the patterns against an encoded tree.
    ///
    /// Returns the indices of the patterns that can match the tree: all required identifiers are
    /// present and, if the context was encoded in [EncodingMode::Duplicates], all content runs
    /// occur in its content. No pattern is filtered out wrongly.
    pub fn candidates(&self, context: &EncodingContext) -> Vec<usize> {
        (0..self.len())
            .filter(|index| {
                self.identifiers[*index]
                    .iter()
                    .all(|name| context.identifiers().contains(name))
            })
            .filter(|index| {
                context.mode() != EncodingMode::Duplicates
                    || self.required_content[*index]
                        .iter()
                        .all(|run| contains_run(context.content(), run))
            })
            .collect()
    }

    /// Renders the compiled automaton in graphviz dot format. Bulk patterns created by the copy
    /// finder strategy have no automaton.
    #[cfg(feature = "dot_writer")]
    pub fn render_dot<W: std::io::Write>(&self, label: &str, output: &mut W) -> crate::Result<()> {
        let compiled = self.compiled.as_ref().ok_or_else(|| {
            crate::StructscanError::new(crate::StructscanErrorKind::Unsupported(
                "the bulk pattern has no automaton".to_string(),
            ))
        })?;
        crate::internal::dot::nfa_render(compiled, &self.patterns, label, output);
        Ok(())
    }
}

fn contains_run(content: &[String], run: &[String]) -> bool {
    run.is_empty() || content.windows(run.len()).any(|window| window == run)
}

/// The top level nodes whose pre-order makes up the pattern. The synthetic block of a statement
/// sequence is no part of it.
fn pattern_nodes(pattern: &ParsedPattern) -> (&[NodeId], bool) {
    match pattern.form() {
        PatternForm::Expression | PatternForm::Statement => (pattern.roots(), false),
        PatternForm::Statements => (pattern.roots(), true),
    }
}

fn required_identifiers(pattern: &ParsedPattern) -> BTreeSet<String> {
    let tree = pattern.tree();
    let (roots, in_list) = pattern_nodes(pattern);
    let mut names = BTreeSet::new();
    let mut stack: Vec<(NodeId, bool)> = roots.iter().rev().map(|r| (*r, in_list)).collect();
    while let Some((id, in_list)) = stack.pop() {
        if tree.wildcard(id, in_list).is_some() {
            continue;
        }
        if let Some(name) = identifier(tree, id) {
            names.insert(name.to_string());
        }
        let list = tree.has_list_children(id);
        stack.extend(tree.children(id).iter().rev().map(|c| (*c, list)));
    }
    names
}

fn required_content(pattern: &ParsedPattern) -> Vec<Vec<String>> {
    let tree = pattern.tree();
    let (roots, in_list) = pattern_nodes(pattern);
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for root in roots {
        collect_content(tree, *root, in_list, &mut runs, &mut current);
    }
    flush(&mut runs, &mut current);
    runs
}

fn flush(runs: &mut Vec<Vec<String>>, current: &mut Vec<String>) {
    if !current.is_empty() {
        runs.push(std::mem::take(current));
    }
}

fn collect_content(
    tree: &SyntaxTree,
    id: NodeId,
    in_list: bool,
    runs: &mut Vec<Vec<String>>,
    current: &mut Vec<String>,
) {
    if tree.wildcard(id, in_list).is_some() {
        flush(runs, current);
        return;
    }
    if tree.name_variable(id).is_some() {
        flush(runs, current);
    } else {
        current.push(content_token(tree, id));
    }
    let list = tree.has_list_children(id);
    for child in tree.children(id) {
        collect_content(tree, *child, list, runs, current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(patterns: &[&str]) -> BulkPattern {
        BulkPattern::new(
            patterns
                .iter()
                .map(|p| SyntaxTree::parse_pattern(p).unwrap())
                .collect(),
            None,
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_projections() {
        let pattern = bulk(&["$l{java.util.List}.add($e)", "int $v = count; $v++;"]);
        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern.patterns()[0], "$l{java.util.List}.add($e)");
        assert_eq!(
            pattern.identifiers()[0].iter().collect::<Vec<_>>(),
            vec!["add"]
        );
        assert_eq!(
            pattern.identifiers()[1].iter().collect::<Vec<_>>(),
            vec!["count"]
        );
        assert_eq!(
            pattern.required_content()[0],
            vec![
                strings(&["MethodInvocation", "add"]),
                strings(&["Arguments"])
            ]
        );
        assert_eq!(
            pattern.required_content()[1],
            vec![
                strings(&["int", "count", "ExpressionStatement", "post++"]),
            ]
        );
        assert_eq!(
            pattern.additional_constraints()[0]
                .required_types
                .iter()
                .collect::<Vec<_>>(),
            vec!["java.util.List"]
        );
        assert!(pattern.additional_constraints()[1].is_empty());
    }

    #[test]
    fn test_candidates() {
        let pattern = bulk(&["a.add($e)", "b.remove($e)", "x = 1"]);
        let tree = SyntaxTree::parse_source("a.add(1); b.add(x = 2);").unwrap();
        let mut search = EncodingContext::new(EncodingMode::Search);
        let mut duplicates = EncodingContext::new(EncodingMode::Duplicates);
        for id in tree.preorder(tree.root()) {
            search.record(&tree, id);
            duplicates.record(&tree, id);
        }
        assert_eq!(pattern.candidates(&search), vec![0, 2]);
        assert_eq!(pattern.candidates(&duplicates), vec![0]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_constraints_serialization() {
        let constraints = AdditionalQueryConstraints {
            required_types: ["java.lang.String".to_string()].into_iter().collect(),
        };
        let serialized = serde_json::to_string(&constraints).unwrap();
        assert_eq!(serialized, r#"{"required_types":["java.lang.String"]}"#);
        let deserialized: AdditionalQueryConstraints = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, constraints);
    }
}
