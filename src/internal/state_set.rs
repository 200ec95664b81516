//! A fixed-width bitset of automaton states.
//!
//! Every state set of one automaton has the same width, namely the number of states of that
//! automaton. Setting a bit beyond the width is a programming error.

use super::{ids::StateIDBase, StateID};

const BITS: usize = u64::BITS as usize;

/// A set of simultaneously active automaton states.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct StateSet {
    words: Vec<u64>,
    width: usize,
}

impl StateSet {
    /// Creates an empty set able to hold the states `0..width`.
    pub(crate) fn new(width: usize) -> Self {
        Self {
            words: vec![0; width.div_ceil(BITS)],
            width,
        }
    }

    /// Creates a set that contains exactly the given state.
    pub(crate) fn with_state(width: usize, state: StateID) -> Self {
        let mut set = Self::new(width);
        set.insert(state);
        set
    }

    #[inline]
    pub(crate) fn width(&self) -> usize {
        self.width
    }

    /// Inserts a state and returns true if it was not present before.
    #[inline]
    pub(crate) fn insert(&mut self, state: StateID) -> bool {
        let index = state.as_usize();
        assert!(
            index < self.width,
            "state {} out of range for a state set of width {}",
            index,
            self.width
        );
        let mask = 1u64 << (index % BITS);
        let word = &mut self.words[index / BITS];
        let was_set = *word & mask != 0;
        *word |= mask;
        !was_set
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, state: StateID) -> bool {
        let index = state.as_usize();
        index < self.width && self.words[index / BITS] & (1u64 << (index % BITS)) != 0
    }

    /// Adds all states of `other` to this set.
    pub(crate) fn union_with(&mut self, other: &StateSet) {
        debug_assert_eq!(self.width, other.width, "state sets of different automata");
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= *o;
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates the contained states in ascending order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = StateID> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            let mut bits = *word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let offset = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(StateID::new((i * BITS + offset) as StateIDBase))
            })
        })
    }
}

impl std::fmt::Debug for StateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter().map(|s| s.id())).finish()
    }
}
