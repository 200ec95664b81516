use std::{io::Read, ops::ControlFlow};

use log::debug;
use rustc_hash::FxHashSet;

use crate::{
    internal::{
        nfa_search::{encode_tree, scan_encoded, walk_tree},
        CompiledNfa, CopyFinder,
    },
    Assignments, BulkPattern, CancellationToken, EncodingContext, EncodingMode, Frequencies,
    Kind, NodeId, Occurrences, PatternForm, Result, StructscanError, StructscanErrorKind,
    SyntaxTree, VariableAssignments,
};

/// The matching strategy of a [BulkSearch].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// All patterns are merged into one automaton that is run over the tree in a single pass.
    /// The automaton works on a lossy encoding of the tree, so its results are candidates that
    /// have to be verified with [BulkSearch::verify]. Supports encoded streams.
    #[default]
    Nfa,
    /// Every pattern is matched exactly on its own. No verification is needed, encoded streams
    /// are not supported.
    CopyFinder,
}

/// The entry point to compile pattern sets and to search trees with them.
///
/// A bulk search holds only its configuration. Use the [crate::BulkSearchBuilder] to select a
/// strategy other than the default.
///
/// All operations that can take long poll the given [CancellationToken] once per visited node and
/// return `Ok(None)` if cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkSearch {
    pub(crate) strategy: Strategy,
    pub(crate) encoding_mode: EncodingMode,
}

impl BulkSearch {
    /// Creates a bulk search with the automaton strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// The matching strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The mode of the encoding contexts created by [BulkSearch::new_encoding_context].
    pub fn encoding_mode(&self) -> EncodingMode {
        self.encoding_mode
    }

    /// Creates an empty encoding context in the configured mode.
    pub fn new_encoding_context(&self) -> EncodingContext {
        EncodingContext::new(self.encoding_mode)
    }

    /// Whether the results of [BulkSearch::match_tree] are candidates that need to be checked
    /// with [BulkSearch::verify].
    pub fn requires_lightweight_verification(&self) -> bool {
        self.strategy == Strategy::Nfa
    }

    /// Parses the pattern texts and compiles them into one bulk pattern.
    ///
    /// Fails if any pattern can't be parsed, no partial pattern set is created.
    pub fn create<I, S>(
        &self,
        patterns: I,
        cancel: &CancellationToken,
    ) -> Result<Option<BulkPattern>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for text in patterns {
            if cancel.is_cancelled() {
                debug!("Pattern parsing cancelled after {} patterns", parsed.len());
                return Ok(None);
            }
            parsed.push(SyntaxTree::parse_pattern(text.as_ref())?);
        }
        let compiled = match self.strategy {
            Strategy::Nfa => match CompiledNfa::compile(&parsed, cancel) {
                Some(compiled) => Some(compiled),
                None => return Ok(None),
            },
            Strategy::CopyFinder => None,
        };
        debug!(
            "Created bulk pattern of {} patterns for {:?} strategy",
            parsed.len(),
            self.strategy
        );
        Ok(Some(BulkPattern::new(parsed, compiled)))
    }

    /// Searches the subtree below `root` and returns all positions where patterns matched.
    ///
    /// The subtree is walked once for the automaton strategy and once per pattern for the copy
    /// finder.
    pub fn match_tree(
        &self,
        tree: &SyntaxTree,
        root: NodeId,
        pattern: &BulkPattern,
        cancel: &CancellationToken,
    ) -> Result<Option<Occurrences>> {
        let mut occurrences = Occurrences::default();
        let completed = match self.strategy {
            Strategy::Nfa => walk_tree(
                compiled(pattern)?,
                tree,
                root,
                cancel,
                |id, results| {
                    for result in results {
                        occurrences.add(&pattern.patterns()[result.as_usize()], id);
                    }
                    ControlFlow::Continue(())
                },
            ),
            Strategy::CopyFinder => copy_find(tree, root, pattern, cancel, |label, id| {
                occurrences.add(label, id);
                true
            }),
        };
        if completed.is_none() {
            debug!("Tree search cancelled");
            return Ok(None);
        }
        let occurrences = occurrences.finish(tree);
        debug!(
            "Found {} positions of {} patterns",
            occurrences.total(),
            occurrences.len()
        );
        Ok(Some(occurrences))
    }

    /// Checks if any pattern matches in the subtree below `root`. Stops at the first match.
    ///
    /// Candidates of the automaton are confirmed with the exact matcher, so the answer needs no
    /// verification.
    pub fn matches(
        &self,
        tree: &SyntaxTree,
        root: NodeId,
        pattern: &BulkPattern,
        cancel: &CancellationToken,
    ) -> Result<Option<bool>> {
        let mut found = false;
        let completed = match self.strategy {
            Strategy::Nfa => walk_tree(
                compiled(pattern)?,
                tree,
                root,
                cancel,
                |id, results| {
                    let confirmed = results.iter().any(|result| {
                        let parsed = &pattern.parsed_patterns()[result.as_usize()];
                        !CopyFinder::new(parsed, tree).matches_at(id).is_empty()
                    });
                    if confirmed {
                        found = true;
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            ),
            Strategy::CopyFinder => copy_find(tree, root, pattern, cancel, |_, _| {
                found = true;
                false
            }),
        };
        Ok(completed.map(|()| found))
    }

    /// Encodes a whole tree into the context, replacing its previous contents.
    ///
    /// The context receives the symbol stream, the identifiers of the tree and, in
    /// [EncodingMode::Duplicates], its content tokens. A cancelled encode pass leaves the context
    /// empty.
    pub fn encode(
        &self,
        tree: &SyntaxTree,
        context: &mut EncodingContext,
        cancel: &CancellationToken,
    ) -> Result<Option<()>> {
        self.require_nfa("encode")?;
        context.clear();
        let mut encoded = std::mem::take(context.buffer());
        let completed = encode_tree(tree, &mut encoded, cancel, |id| context.record(tree, id));
        *context.buffer() = encoded;
        if completed.is_none() {
            debug!("Encoding cancelled");
            context.clear();
            return Ok(None);
        }
        debug!(
            "Encoded {} nodes into {} bytes, {} identifiers",
            tree.len(),
            context.encoded().len(),
            context.identifiers().len()
        );
        Ok(Some(()))
    }

    /// Checks if any pattern matches in an encoded tree. Stops at the first match.
    ///
    /// Without the tree the candidates can't be verified, so the answer is subject to the
    /// losses of the encoding.
    pub fn matches_encoded<R: Read>(
        &self,
        mut encoded: R,
        pattern: &BulkPattern,
        cancel: &CancellationToken,
    ) -> Result<Option<bool>> {
        self.require_nfa("matching encoded streams")?;
        let mut bytes = Vec::new();
        encoded.read_to_end(&mut bytes)?;
        let mut found = false;
        let completed = scan_encoded(compiled(pattern)?, &bytes, cancel, |_| {
            found = true;
            ControlFlow::Break(())
        })?;
        Ok(completed.map(|()| found))
    }

    /// Counts the occurrences of every pattern in an encoded tree.
    ///
    /// Each node counts at most once per label. The counts are subject to the losses of the
    /// encoding and serve as a pre-filter before a tree is searched.
    pub fn matches_with_frequencies<R: Read>(
        &self,
        mut encoded: R,
        pattern: &BulkPattern,
        cancel: &CancellationToken,
    ) -> Result<Option<Frequencies>> {
        self.require_nfa("frequencies of encoded streams")?;
        let mut bytes = Vec::new();
        encoded.read_to_end(&mut bytes)?;
        let mut frequencies = Frequencies::default();
        let completed = scan_encoded(compiled(pattern)?, &bytes, cancel, |results| {
            let labels: FxHashSet<&str> = results
                .iter()
                .map(|result| pattern.patterns()[result.as_usize()].as_str())
                .collect();
            for label in labels {
                frequencies.increment(label);
            }
            ControlFlow::Continue(())
        })?;
        if completed.is_none() {
            debug!("Frequency scan cancelled");
        }
        Ok(completed.map(|()| frequencies))
    }

    /// Re-checks the results of [BulkSearch::match_tree] with the exact matcher.
    ///
    /// Candidates the exact matcher rejects are dropped. Candidates of statement sequence patterns
    /// are blocks, they are replaced by the statements where the sequences start. Results of the
    /// copy finder strategy are exact already and returned unchanged.
    ///
    /// The token is polled once per candidate.
    pub fn verify(
        &self,
        tree: &SyntaxTree,
        occurrences: &Occurrences,
        pattern: &BulkPattern,
        cancel: &CancellationToken,
    ) -> Option<Occurrences> {
        if !self.requires_lightweight_verification() {
            return Some(occurrences.clone());
        }
        let mut verified = Occurrences::default();
        for (label, positions) in occurrences.iter() {
            for index in pattern.indices_of(label) {
                let finder = CopyFinder::new(&pattern.parsed_patterns()[index], tree);
                for id in positions {
                    if cancel.is_cancelled() {
                        debug!("Verification cancelled");
                        return None;
                    }
                    for position in finder.matches_at(*id) {
                        verified.add(label, position);
                    }
                }
            }
        }
        let verified = verified.finish(tree);
        debug!(
            "Verified {} of {} candidate positions",
            verified.total(),
            occurrences.total()
        );
        Some(verified)
    }

    /// Matches the given positions again with the exact matcher and returns the variable
    /// bindings of every match.
    ///
    /// Accepts the results of [BulkSearch::match_tree] and of [BulkSearch::verify] for both
    /// strategies. Positions are those [BulkSearch::verify] reports. Only matches that agree
    /// with `preset` are kept, so an empty preset keeps all of them.
    ///
    /// The token is polled once per position.
    pub fn verify_with_assignments(
        &self,
        tree: &SyntaxTree,
        occurrences: &Occurrences,
        pattern: &BulkPattern,
        preset: &VariableAssignments,
        cancel: &CancellationToken,
    ) -> Option<Assignments> {
        let mut assignments = Assignments::default();
        for (label, positions) in occurrences.iter() {
            for index in pattern.indices_of(label) {
                let parsed = &pattern.parsed_patterns()[index];
                let finder = CopyFinder::new(parsed, tree).with_preset(preset);
                for id in positions {
                    if cancel.is_cancelled() {
                        debug!("Assignment search cancelled");
                        return None;
                    }
                    for (position, variables) in finder.assignments_at(*id) {
                        assignments.add(label, position, variables);
                    }
                    if parsed.form() != PatternForm::Statements {
                        continue;
                    }
                    // Exact positions of sequences are statements, they are matched from their
                    // block.
                    if let Some(block) = tree.parent(*id).filter(|p| tree.kind(*p) == Kind::Block)
                    {
                        for (position, variables) in finder.assignments_at(block) {
                            if position == *id {
                                assignments.add(label, position, variables);
                            }
                        }
                    }
                }
            }
        }
        let assignments = assignments.finish(tree);
        debug!(
            "Found assignments for {} of {} positions",
            assignments.total(),
            occurrences.total()
        );
        Some(assignments)
    }

    fn require_nfa(&self, operation: &str) -> Result<()> {
        match self.strategy {
            Strategy::Nfa => Ok(()),
            Strategy::CopyFinder => Err(StructscanError::new(StructscanErrorKind::Unsupported(
                format!("{} is not supported by the copy finder strategy", operation),
            ))),
        }
    }
}

fn compiled(pattern: &BulkPattern) -> Result<&CompiledNfa> {
    pattern.compiled.as_ref().ok_or_else(|| {
        StructscanError::new(StructscanErrorKind::Unsupported(
            "the bulk pattern was created without an automaton".to_string(),
        ))
    })
}

/// Runs the exact matcher of every pattern. `found` returns false to stop the search.
fn copy_find<F>(
    tree: &SyntaxTree,
    root: NodeId,
    pattern: &BulkPattern,
    cancel: &CancellationToken,
    mut found: F,
) -> Option<()>
where
    F: FnMut(&str, NodeId) -> bool,
{
    for (parsed, label) in pattern.parsed_patterns().iter().zip(pattern.patterns()) {
        let mut stopped = false;
        CopyFinder::new(parsed, tree).search(root, cancel, |id| {
            stopped = !found(label, id);
            !stopped
        })?;
        if stopped {
            break;
        }
    }
    Some(())
}
