//! This module contains the generic NFA (Non-deterministic Finite Automaton) implementation.
//!
//! The automaton is never determinized. A state of the automaton during matching is the set of
//! all simultaneously active state ids, see [StateSet]. Every transition result contains the
//! starting state, so a search never gets stuck and a new match attempt starts at every input
//! position. This is what allows many overlapping pattern occurrences to be found in one pass.

use std::{fmt::Debug, hash::Hash};

use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{ids::StateIDBase, StateID, StateSet};

/// A key of the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Key<I> {
    pub(crate) state: StateID,
    pub(crate) input: I,
}

impl<I> Key<I> {
    #[inline]
    pub(crate) fn new(state: StateID, input: I) -> Self {
        Self { state, input }
    }
}

/// An immutable automaton over inputs `I` that reports results `R` in its final states.
///
/// After construction the automaton is only read, so it can be shared between concurrent
/// searches. Every search allocates its own state sets.
#[derive(Debug, Clone)]
pub(crate) struct Nfa<I, R> {
    start_state: StateID,
    num_states: usize,
    transitions: FxHashMap<Key<I>, Vec<StateID>>,
    final_states: FxHashMap<StateID, R>,
}

impl<I, R> Nfa<I, R>
where
    I: Clone + Eq + Hash + Debug,
    R: Clone + Eq + Hash,
{
    /// Returns a fresh state set containing exactly the start state.
    pub(crate) fn starting_state(&self) -> StateSet {
        StateSet::with_state(self.num_states, self.start_state)
    }

    #[inline]
    pub(crate) fn start_state(&self) -> StateID {
        self.start_state
    }

    #[inline]
    pub(crate) fn num_states(&self) -> usize {
        self.num_states
    }

    /// Advances all active states on the given input.
    ///
    /// The result is the union of the targets of all active states on `input` plus the start
    /// state.
    pub(crate) fn transition(&self, active: &StateSet, input: &I) -> StateSet {
        let mut next = self.starting_state();
        for state in active.iter() {
            // The key has to be owned for the lookup, inputs are small.
            if let Some(targets) = self.transitions.get(&Key::new(state, input.clone())) {
                for target in targets {
                    next.insert(*target);
                }
            }
        }
        trace!("{:?} --{:?}--> {:?}", active, input, next);
        next
    }

    /// Collects the results of all final states contained in the given set.
    pub(crate) fn results(&self, active: &StateSet) -> FxHashSet<R> {
        active
            .iter()
            .filter_map(|state| self.final_states.get(&state).cloned())
            .collect()
    }

    /// Returns true if any state of the set is final.
    pub(crate) fn has_results(&self, active: &StateSet) -> bool {
        active.iter().any(|state| self.final_states.contains_key(&state))
    }

    /// The union of two state sets of this automaton.
    pub(crate) fn join(&self, a: &StateSet, b: &StateSet) -> StateSet {
        debug_assert_eq!(a.width(), self.num_states);
        let mut joined = a.clone();
        joined.union_with(b);
        joined
    }

    /// Iterates all transitions. Used for diagnostics.
    #[allow(dead_code)]
    pub(crate) fn transitions(&self) -> impl Iterator<Item = (&Key<I>, &[StateID])> {
        self.transitions.iter().map(|(k, v)| (k, v.as_slice()))
    }

    #[allow(dead_code)]
    pub(crate) fn final_state(&self, state: StateID) -> Option<&R> {
        self.final_states.get(&state)
    }
}

/// Builds an [Nfa].
///
/// Transitions created with [NfaBuilder::shared_transition] are reused when the same key is
/// requested again, which merges common pattern prefixes into a trie. Transitions created with
/// [NfaBuilder::private_transition] always lead into a new state that no other pattern can
/// reach.
#[derive(Debug)]
pub(crate) struct NfaBuilder<I, R> {
    num_states: usize,
    transitions: FxHashMap<Key<I>, Vec<StateID>>,
    shared: FxHashMap<Key<I>, StateID>,
    final_states: FxHashMap<StateID, R>,
}

impl<I, R> NfaBuilder<I, R>
where
    I: Clone + Eq + Hash + Debug,
    R: Clone + Eq + Hash + Debug,
{
    /// Creates a builder with only the start state 0.
    pub(crate) fn new() -> Self {
        Self {
            num_states: 1,
            transitions: FxHashMap::default(),
            shared: FxHashMap::default(),
            final_states: FxHashMap::default(),
        }
    }

    #[inline]
    pub(crate) fn start_state(&self) -> StateID {
        StateID::new(0)
    }

    pub(crate) fn new_state(&mut self) -> StateID {
        let state = StateID::new(self.num_states as StateIDBase);
        self.num_states += 1;
        state
    }

    /// Adds a transition to an explicit target state.
    pub(crate) fn add_transition(&mut self, from: StateID, input: I, to: StateID) {
        let targets = self.transitions.entry(Key::new(from, input)).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    /// Returns the target of a shareable transition, creating it if needed.
    pub(crate) fn shared_transition(&mut self, from: StateID, input: I) -> StateID {
        let key = Key::new(from, input);
        if let Some(target) = self.shared.get(&key) {
            return *target;
        }
        let target = self.new_state();
        self.add_transition(from, key.input.clone(), target);
        self.shared.insert(key, target);
        target
    }

    /// Creates a transition into a new state only reachable through this transition.
    pub(crate) fn private_transition(&mut self, from: StateID, input: I) -> StateID {
        let target = self.new_state();
        self.add_transition(from, input, target);
        target
    }

    /// Marks a state as final with the given result.
    pub(crate) fn set_final(&mut self, state: StateID, result: R) {
        if let Some(previous) = self.final_states.insert(state, result.clone()) {
            assert_eq!(
                previous, result,
                "final state {} assigned to two different results",
                state
            );
        }
    }

    pub(crate) fn build(self) -> Nfa<I, R> {
        for targets in self.transitions.values() {
            debug_assert!(targets.iter().all(|t| t.as_usize() < self.num_states));
        }
        Nfa {
            start_state: self.start_state(),
            num_states: self.num_states,
            transitions: self.transitions,
            final_states: self.final_states,
        }
    }
}
