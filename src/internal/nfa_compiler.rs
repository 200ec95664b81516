//! Compilation of parsed patterns into one search automaton.
//!
//! Each pattern tree is compiled into the symbol path of its pre-order stream. Paths of different
//! patterns share states as long as their prefixes agree, so the automaton is a trie of pattern
//! prefixes. Variables replace whole subtrees:
//! - `$x` becomes one [Input::Any] transition, `$x;` one [Input::AnyStatement] transition,
//! - `$x$` in a list becomes an [Input::Any] self loop on the state between its neighbours.
//!
//! A state carrying a self loop must not be reachable by any other pattern, so the transition
//! into it is private. The closing transition of every pattern is private as well, which gives
//! each pattern its own final state.
//!
//! Statement sequence patterns are compiled as `{ $pre$; s1; ...; sn; $post$; }`, i.e. they match
//! blocks containing the sequence.

use log::debug;

use crate::{tree::Wildcard, CancellationToken, NodeId, ParsedPattern, PatternForm, SyntaxTree};

use super::{
    input::{Input, Name, NameTable},
    nfa::{Nfa, NfaBuilder},
    PatternID, StateID,
};

/// The compiled automaton of a bulk pattern together with the names it was compiled against.
#[derive(Debug, Clone)]
pub(crate) struct CompiledNfa {
    pub(crate) nfa: Nfa<Input, PatternID>,
    pub(crate) names: NameTable,
}

impl CompiledNfa {
    /// Compiles all patterns into one automaton. Returns `None` if cancelled.
    pub(crate) fn compile(
        patterns: &[ParsedPattern],
        cancel: &CancellationToken,
    ) -> Option<CompiledNfa> {
        let mut compiler = Compiler {
            builder: NfaBuilder::new(),
            names: NameTable::default(),
        };
        for (index, pattern) in patterns.iter().enumerate() {
            if cancel.is_cancelled() {
                debug!("Pattern compilation cancelled after {} patterns", index);
                return None;
            }
            compiler.compile_pattern(pattern, PatternID::new(index));
        }
        let nfa = compiler.builder.build();
        debug!(
            "Compiled {} patterns into {} states with {} names",
            patterns.len(),
            nfa.num_states(),
            compiler.names.len()
        );
        Some(CompiledNfa {
            nfa,
            names: compiler.names,
        })
    }
}

struct Compiler {
    builder: NfaBuilder<Input, PatternID>,
    names: NameTable,
}

/// One element of a list to compile.
#[derive(Debug, Clone, Copy)]
enum Element {
    Node(NodeId),
    Many,
}

impl Compiler {
    fn compile_pattern(&mut self, pattern: &ParsedPattern, id: PatternID) {
        let tree = pattern.tree();
        let start = self.builder.start_state();
        let end = match pattern.form() {
            PatternForm::Expression | PatternForm::Statement => {
                self.compile_node(tree, pattern.roots()[0], start, false, true)
            }
            PatternForm::Statements => {
                let root = tree.root();
                let mut elements = vec![Element::Many];
                elements.extend(self.list_elements(tree, tree.children(root)));
                elements.push(Element::Many);
                let open = self.open_input(tree, root);
                let inner = self.compile_list(tree, &elements, start, open);
                self.builder.private_transition(inner, Input::Up)
            }
        };
        self.builder.set_final(end, id);
    }

    fn list_elements(&self, tree: &SyntaxTree, children: &[NodeId]) -> Vec<Element> {
        children
            .iter()
            .map(|child| match tree.wildcard(*child, true) {
                Some(Wildcard::Many(_)) => Element::Many,
                _ => Element::Node(*child),
            })
            .collect()
    }

    fn open_input(&mut self, tree: &SyntaxTree, id: NodeId) -> Input {
        let kind = tree.kind(id);
        let name = if !kind.has_name() {
            Name::Unnamed
        } else if tree.name_variable(id).is_some() {
            Name::Any
        } else {
            match tree.text(id) {
                Some(text) => Name::Known(self.names.intern(text)),
                None => Name::Unnamed,
            }
        };
        Input::Open(kind, name)
    }

    fn transition(&mut self, from: StateID, input: Input, private: bool) -> StateID {
        if private {
            self.builder.private_transition(from, input)
        } else {
            self.builder.shared_transition(from, input)
        }
    }

    /// Compiles one pattern node starting in `from` and returns the state after it.
    /// If `private` is set, the returned state is reachable only through this path.
    fn compile_node(
        &mut self,
        tree: &SyntaxTree,
        id: NodeId,
        from: StateID,
        in_list: bool,
        private: bool,
    ) -> StateID {
        match tree.wildcard(id, in_list) {
            Some(Wildcard::AnyStatement(_)) => {
                return self.transition(from, Input::AnyStatement, private)
            }
            Some(Wildcard::Any(_)) | Some(Wildcard::Many(_)) => {
                return self.transition(from, Input::Any, private)
            }
            None => {}
        }
        let open = self.open_input(tree, id);
        let children = tree.children(id);
        let inner = if tree.has_list_children(id) {
            let elements = self.list_elements(tree, children);
            self.compile_list(tree, &elements, from, open)
        } else {
            let mut state = self.transition(from, open, false);
            for child in children {
                state = self.compile_node(tree, *child, state, false, false);
            }
            state
        };
        self.transition(inner, Input::Up, private)
    }

    /// Compiles the open symbol of a list node followed by its elements.
    fn compile_list(
        &mut self,
        tree: &SyntaxTree,
        elements: &[Element],
        from: StateID,
        open: Input,
    ) -> StateID {
        let loops_after = |index: usize| matches!(elements.get(index), Some(Element::Many));
        let mut state = self.transition(from, open, loops_after(0));
        for (index, element) in elements.iter().enumerate() {
            match element {
                Element::Many => self.builder.add_transition(state, Input::Any, state),
                Element::Node(child) => {
                    state = self.compile_node(tree, *child, state, true, loops_after(index + 1));
                }
            }
        }
        state
    }
}
