use rustc_hash::FxHashSet;

use crate::{tree::is_variable, NodeId, SyntaxTree};

/// Selects what an encode pass records besides the symbol stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingMode {
    /// Record the stream and the identifiers of the tree.
    #[default]
    Search,
    /// Additionally record the content tokens of all nodes, used to detect duplicated code.
    Duplicates,
}

/// The per-tree output of [crate::BulkSearch::encode].
///
/// A context is filled by one encode pass. Encoding again into the same context replaces its
/// contents. After a cancelled encode pass the context is empty.
#[derive(Debug, Clone, Default)]
pub struct EncodingContext {
    mode: EncodingMode,
    encoded: Vec<u8>,
    identifiers: FxHashSet<String>,
    content: Vec<String>,
}

impl EncodingContext {
    /// Creates an empty context.
    pub fn new(mode: EncodingMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// The encoding mode.
    #[inline]
    pub fn mode(&self) -> EncodingMode {
        self.mode
    }

    /// The encoded symbol stream.
    #[inline]
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Takes the encoded symbol stream out of the context.
    pub fn into_encoded(self) -> Vec<u8> {
        self.encoded
    }

    /// The identifiers, member names and declared names of the encoded tree.
    #[inline]
    pub fn identifiers(&self) -> &FxHashSet<String> {
        &self.identifiers
    }

    /// The content tokens of the encoded tree in pre-order: the name, operator or literal value
    /// of each node, or its kind name for nodes without text. Empty in [EncodingMode::Search].
    #[inline]
    pub fn content(&self) -> &[String] {
        &self.content
    }

    pub(crate) fn clear(&mut self) {
        self.encoded.clear();
        self.identifiers.clear();
        self.content.clear();
    }

    pub(crate) fn buffer(&mut self) -> &mut Vec<u8> {
        &mut self.encoded
    }

    /// Records identifier and content of one node.
    pub(crate) fn record(&mut self, tree: &SyntaxTree, id: NodeId) {
        if let Some(name) = identifier(tree, id) {
            if !self.identifiers.contains(name) {
                self.identifiers.insert(name.to_string());
            }
        }
        if self.mode == EncodingMode::Duplicates {
            self.content.push(content_token(tree, id));
        }
    }
}

/// The identifier carried by a node, if any. Pattern variables are not identifiers.
pub(crate) fn identifier(tree: &SyntaxTree, id: NodeId) -> Option<&str> {
    if !tree.kind(id).carries_identifier() {
        return None;
    }
    tree.text(id).filter(|name| !is_variable(name))
}

/// The content token of a node: its name, operator or literal value, or the kind name for
/// nodes without text.
pub(crate) fn content_token(tree: &SyntaxTree, id: NodeId) -> String {
    match tree.text(id) {
        Some(text) => text.to_string(),
        None => tree.kind(id).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let tree = SyntaxTree::parse_source("a.b(1);").unwrap();
        let mut search = EncodingContext::new(EncodingMode::Search);
        let mut duplicates = EncodingContext::new(EncodingMode::Duplicates);
        for id in tree.preorder(tree.root()) {
            search.record(&tree, id);
            duplicates.record(&tree, id);
        }
        let mut identifiers: Vec<&str> = search.identifiers().iter().map(String::as_str).collect();
        identifiers.sort_unstable();
        assert_eq!(identifiers, vec!["a", "b"]);
        assert!(search.content().is_empty());
        assert_eq!(
            duplicates.content(),
            [
                "Block",
                "ExpressionStatement",
                "MethodInvocation",
                "b",
                "a",
                "Arguments",
                "1"
            ]
        );
        duplicates.clear();
        assert!(duplicates.content().is_empty());
        assert_eq!(duplicates.mode(), EncodingMode::Duplicates);
    }
}
