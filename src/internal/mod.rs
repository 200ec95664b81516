/// Module with the binary symbol stream format of encoded trees.
pub(crate) mod codec;

/// Module with the exact single pattern matcher.
pub(crate) mod copy_finder;
pub(crate) use copy_finder::CopyFinder;

/// Module with conversion to graphviz dot format
#[cfg(feature = "dot_writer")]
pub(crate) mod dot;

/// Module for several ID types.
mod ids;
pub(crate) use ids::{NameID, PatternID, StateID};

/// Module with the input alphabet of the search automaton.
pub(crate) mod input;

/// The lexer module contains the token definitions of the source language.
mod lexer;

/// The nfa module contains the generic NFA implementation.
mod nfa;

/// Module that compiles parsed patterns into the search automaton.
pub(crate) mod nfa_compiler;
pub(crate) use nfa_compiler::CompiledNfa;

/// Module that runs the search automaton over trees and encoded streams.
pub(crate) mod nfa_search;

/// The parser module contains the parser for source files and patterns.
pub(crate) mod parser;

/// Module with the bitset of active automaton states.
mod state_set;
pub(crate) use state_set::StateSet;
