#![forbid(missing_docs)]
//! # `structscan`
//! The `structscan` crate searches syntax trees for many structural patterns at once.
//! It is designed for tools that check a large set of rules against many source files, e.g.
//! hints in an IDE or a linter, where running one matcher per rule and file would be too slow.
//!
//! Patterns are written in the source language itself with `$`-prefixed variables:
//! `$x` matches any subtree, `$x;` any statement and `$x$` any number of list elements.
//! All patterns of a set are compiled into one non-deterministic automaton that is run over a
//! tree in a single pass, independent of the number of patterns.
//! The automaton works on a lossy encoding of the tree. Its results are candidates that are
//! confirmed with an exact matcher, see [BulkSearch::verify].
//!
//! Trees can also be encoded into a compact byte stream once and scanned later without parsing
//! the source again, e.g. to pre-filter the files of a project.
//!
//! # Example
//! ```rust
//! use structscan::{BulkSearch, CancellationToken, SyntaxTree};
//!
//! const SOURCE: &str = r#"
//! class Sign {
//!     int sign(int x) {
//!         if (x < 0) return -1;
//!         return x == 0 ? 0 : 1;
//!     }
//! }
//! "#;
//!
//! fn main() {
//!     let search = BulkSearch::new();
//!     let cancel = CancellationToken::new();
//!     let pattern = search
//!         .create(["return $val$;", "$a == $a"], &cancel)
//!         .expect("Invalid pattern")
//!         .expect("Cancelled");
//!     let tree = SyntaxTree::parse_source(SOURCE).expect("Parse error");
//!     let candidates = search
//!         .match_tree(&tree, tree.root(), &pattern, &cancel)
//!         .expect("Search error")
//!         .expect("Cancelled");
//!     let occurrences = search
//!         .verify(&tree, &candidates, &pattern, &cancel)
//!         .expect("Cancelled");
//!     for (label, positions) in occurrences.iter() {
//!         for id in positions {
//!             let start = tree.position(tree.span(*id).start);
//!             println!("{}: {} '{}'", label, start, tree.source_text(*id));
//!         }
//!     }
//!     assert_eq!(occurrences.get("return $val$;").map(<[_]>::len), Some(2));
//!     assert!(!occurrences.contains("$a == $a"));
//! }
//! ```
//! The output of the example is:
//! ```text
//! return $val$;: 4:20 'return -1;'
//! return $val$;: 5:9 'return x == 0 ? 0 : 1;'
//! ```
//!

/// Module with the variable assignments of matches.
mod assignments;
pub use assignments::{Assignments, Binding, VariableAssignments};

/// Module with the compiled pattern set.
mod bulk_pattern;
pub use bulk_pattern::{AdditionalQueryConstraints, BulkPattern};

/// Module with the search entry point.
mod bulk_search;
pub use bulk_search::{BulkSearch, Strategy};

/// Module with the bulk search builder.
mod bulk_search_builder;
pub use bulk_search_builder::BulkSearchBuilder;

/// Module with the cancellation token.
mod cancel;
pub use cancel::CancellationToken;

/// Module with the per-tree output of an encode pass.
mod encoding_context;
pub use encoding_context::{EncodingContext, EncodingMode};

/// The module with the error types.
mod errors;
pub use errors::{Result, StructscanError, StructscanErrorKind};

/// Module with internal implementation details.
mod internal;

/// Module with the node kinds of the source language.
mod kind;
pub use kind::Kind;

/// Module with the search result types.
mod occurrences;
pub use occurrences::{Frequencies, Occurrences};

/// Module with the line and column position.
mod position;
pub use position::Position;

/// Module with the byte range type.
mod span;
pub use span::Span;

/// Module with the syntax tree arena.
mod tree;
pub use tree::{Node, NodeId, ParsedPattern, PatternForm, Preorder, SyntaxTree};
