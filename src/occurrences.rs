use std::collections::BTreeMap;

use crate::{NodeId, SyntaxTree};

/// The positions where the patterns of a bulk pattern matched, keyed by pattern label.
///
/// The label of a pattern is its source text. Positions of one label are sorted in source order,
/// enclosing nodes before the nodes they contain, and contain no duplicates. Patterns without
/// any match have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occurrences {
    positions: BTreeMap<String, Vec<NodeId>>,
}

impl Occurrences {
    pub(crate) fn add(&mut self, label: &str, id: NodeId) {
        match self.positions.get_mut(label) {
            Some(positions) => positions.push(id),
            None => {
                self.positions.insert(label.to_string(), vec![id]);
            }
        }
    }

    /// Sorts and deduplicates the positions.
    pub(crate) fn finish(mut self, tree: &SyntaxTree) -> Self {
        for positions in self.positions.values_mut() {
            tree.sort_in_source_order(positions);
            positions.dedup();
        }
        self
    }

    /// The positions of a label.
    pub fn get(&self, label: &str) -> Option<&[NodeId]> {
        self.positions.get(label).map(Vec::as_slice)
    }

    /// Check if a label has matched.
    pub fn contains(&self, label: &str) -> bool {
        self.positions.contains_key(label)
    }

    /// The labels that matched, in lexicographic order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    /// Iterates labels with their positions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[NodeId])> {
        self.positions
            .iter()
            .map(|(label, positions)| (label.as_str(), positions.as_slice()))
    }

    /// The number of labels that matched.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The number of positions over all labels.
    pub fn total(&self) -> usize {
        self.positions.values().map(Vec::len).sum()
    }
}

/// Occurrence counts per pattern label, see [crate::BulkSearch::matches_with_frequencies].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frequencies {
    counts: BTreeMap<String, usize>,
}

impl Frequencies {
    pub(crate) fn increment(&mut self, label: &str) {
        match self.counts.get_mut(label) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(label.to_string(), 1);
            }
        }
    }

    /// The count of a label, `None` if it never matched.
    pub fn get(&self, label: &str) -> Option<usize> {
        self.counts.get(label).copied()
    }

    /// Iterates labels with their counts in lexicographic label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
    }

    /// The number of labels that matched.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_sorted_and_unique() {
        let tree = SyntaxTree::parse_source("a(b(c));").unwrap();
        let calls: Vec<NodeId> = tree
            .preorder(tree.root())
            .filter(|id| tree.kind(*id) == crate::Kind::MethodInvocation)
            .collect();
        let mut occurrences = Occurrences::default();
        occurrences.add("call", calls[1]);
        occurrences.add("call", calls[0]);
        occurrences.add("call", calls[1]);
        let occurrences = occurrences.finish(&tree);
        assert_eq!(occurrences.get("call"), Some(&calls[..]));
        assert_eq!(occurrences.total(), 2);
        assert_eq!(occurrences.labels().collect::<Vec<_>>(), vec!["call"]);
        assert!(!occurrences.contains("other"));
    }

    #[test]
    fn test_frequencies() {
        let mut frequencies = Frequencies::default();
        frequencies.increment("b");
        frequencies.increment("a");
        frequencies.increment("b");
        assert_eq!(frequencies.get("b"), Some(2));
        assert_eq!(frequencies.get("c"), None);
        assert_eq!(frequencies.iter().collect::<Vec<_>>(), vec![("a", 1), ("b", 2)]);
    }
}
