//! Running the search automaton over trees and encoded streams.
//!
//! Both sources produce the same balanced symbol stream, which drives a [Cursor]:
//! - entering a node advances all active states on the node's open symbol,
//! - leaving a node advances the states on [Input::Up] and joins the states that skip the whole
//!   subtree with a wildcard from the set that was active before the node was entered.
//!
//! The final states active after leaving a node are the candidate patterns at that node.

use std::ops::ControlFlow;

use log::trace;
use rustc_hash::FxHashSet;

use crate::{
    errors::StructscanErrorKind, CancellationToken, Kind, NodeId, Result, StructscanError,
    SyntaxTree,
};

use super::{
    codec::{self, Decoder, Symbol},
    input::{Input, Name},
    nfa_compiler::CompiledNfa,
    PatternID, StateSet,
};

/// The matching state of one pass over a symbol stream.
#[derive(Debug)]
pub(crate) struct Cursor<'p> {
    compiled: &'p CompiledNfa,
    active: StateSet,
    /// Kind of every entered node with the states active before it.
    stack: Vec<(Kind, StateSet)>,
}

impl<'p> Cursor<'p> {
    pub(crate) fn new(compiled: &'p CompiledNfa) -> Self {
        Self {
            compiled,
            active: compiled.nfa.starting_state(),
            stack: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn enter(&mut self, kind: Kind, name: Option<&str>) {
        let nfa = &self.compiled.nfa;
        let next = match (kind.has_name(), name) {
            (true, Some(name)) => {
                let mut next = nfa.transition(&self.active, &Input::Open(kind, Name::Any));
                if let Some(id) = self.compiled.names.get(name) {
                    let exact = nfa.transition(&self.active, &Input::Open(kind, Name::Known(id)));
                    next = nfa.join(&next, &exact);
                }
                next
            }
            _ => nfa.transition(&self.active, &Input::Open(kind, Name::Unnamed)),
        };
        let before = std::mem::replace(&mut self.active, next);
        self.stack.push((kind, before));
    }

    /// Leaves the innermost entered node and returns the patterns matching at it. Returns `None`
    /// if no node is entered.
    pub(crate) fn leave(&mut self) -> Option<FxHashSet<PatternID>> {
        let (kind, before) = self.stack.pop()?;
        let nfa = &self.compiled.nfa;
        let mut next = nfa.transition(&self.active, &Input::Up);
        next.union_with(&nfa.transition(&before, &Input::Any));
        if kind.is_statement() {
            next.union_with(&nfa.transition(&before, &Input::AnyStatement));
        }
        self.active = next;
        if !nfa.has_results(&self.active) {
            return Some(FxHashSet::default());
        }
        Some(nfa.results(&self.active))
    }
}

enum Frame {
    Enter(NodeId),
    Leave(NodeId),
}

/// Walks the subtree below `root` and calls `visit` for every node where patterns match.
///
/// Returns `None` if cancelled. The token is polled once per node.
pub(crate) fn walk_tree<F>(
    compiled: &CompiledNfa,
    tree: &SyntaxTree,
    root: NodeId,
    cancel: &CancellationToken,
    mut visit: F,
) -> Option<()>
where
    F: FnMut(NodeId, FxHashSet<PatternID>) -> ControlFlow<()>,
{
    let mut cursor = Cursor::new(compiled);
    let mut stack = vec![Frame::Enter(root)];
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(id) => {
                if cancel.is_cancelled() {
                    trace!("Tree walk cancelled at node {}", id);
                    return None;
                }
                cursor.enter(tree.kind(id), tree.text(id));
                stack.push(Frame::Leave(id));
                stack.extend(tree.children(id).iter().rev().map(|c| Frame::Enter(*c)));
            }
            Frame::Leave(id) => {
                if let Some(results) = cursor.leave() {
                    if !results.is_empty() && visit(id, results).is_break() {
                        return Some(());
                    }
                }
            }
        }
    }
    debug_assert_eq!(cursor.depth(), 0);
    Some(())
}

/// Scans an encoded stream and calls `visit` with the matching patterns of every node.
///
/// Returns `Ok(None)` if cancelled. The token is polled once per symbol.
pub(crate) fn scan_encoded<F>(
    compiled: &CompiledNfa,
    bytes: &[u8],
    cancel: &CancellationToken,
    mut visit: F,
) -> Result<Option<()>>
where
    F: FnMut(FxHashSet<PatternID>) -> ControlFlow<()>,
{
    let mut decoder = Decoder::new(bytes)?;
    let mut cursor = Cursor::new(compiled);
    while let Some(symbol) = decoder.next_symbol()? {
        if cancel.is_cancelled() {
            trace!("Stream scan cancelled");
            return Ok(None);
        }
        match symbol {
            Symbol::Open(kind, name) => cursor.enter(kind, name),
            Symbol::Up => {
                let results = cursor.leave().ok_or_else(|| {
                    StructscanError::new(StructscanErrorKind::EncodingError(
                        "up without open node".to_string(),
                    ))
                })?;
                if !results.is_empty() && visit(results).is_break() {
                    return Ok(Some(()));
                }
            }
        }
    }
    if cursor.depth() != 0 {
        return Err(StructscanError::new(StructscanErrorKind::EncodingError(
            format!("truncated stream, {} nodes not closed", cursor.depth()),
        )));
    }
    Ok(Some(()))
}

/// Writes the symbol stream of a whole tree. Returns `None` if cancelled.
///
/// `on_node` is called for every node in pre-order, e.g. to collect identifiers.
pub(crate) fn encode_tree<F>(
    tree: &SyntaxTree,
    out: &mut Vec<u8>,
    cancel: &CancellationToken,
    mut on_node: F,
) -> Option<()>
where
    F: FnMut(NodeId),
{
    codec::write_header(out);
    let mut stack = vec![Frame::Enter(tree.root())];
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(id) => {
                if cancel.is_cancelled() {
                    trace!("Encoding cancelled at node {}", id);
                    return None;
                }
                on_node(id);
                codec::write_open(out, tree.kind(id), tree.text(id));
                stack.push(Frame::Leave(id));
                stack.extend(tree.children(id).iter().rev().map(|c| Frame::Enter(*c)));
            }
            Frame::Leave(_) => codec::write_up(out),
        }
    }
    Some(())
}
