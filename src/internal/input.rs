//! The input alphabet of the search automaton.
//!
//! A tree is fed to the automaton as a balanced symbol stream: [Input::Open] when a node is
//! entered and [Input::Up] when it is left. Pattern variables are compiled into the wildcard
//! symbols [Input::Any] and [Input::AnyStatement], which the search fires when a whole subtree
//! has been left.

use rustc_hash::FxHashMap;

use crate::Kind;

use super::NameID;

/// The name part of an [Input::Open] symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Name {
    /// A node without name, a literal, or a named kind without name (e.g. `break;`).
    Unnamed,
    /// A concrete interned name.
    Known(NameID),
    /// A pattern variable in a name position, matches any name.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Input {
    Open(Kind, Name),
    Up,
    /// A complete subtree of any kind.
    Any,
    /// A complete subtree whose root is a statement.
    AnyStatement,
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::Open(kind, Name::Unnamed) => write!(f, "{}", kind),
            Input::Open(kind, Name::Known(id)) => write!(f, "{}({})", kind, id),
            Input::Open(kind, Name::Any) => write!(f, "{}(*)", kind),
            Input::Up => write!(f, "^"),
            Input::Any => write!(f, "$"),
            Input::AnyStatement => write!(f, "$;"),
        }
    }
}

/// Interns the concrete names used by the patterns of one automaton.
///
/// Names that don't occur in any pattern are never interned. A target node with such a name can
/// only be matched by a name variable.
#[derive(Debug, Clone, Default)]
pub(crate) struct NameTable {
    ids: FxHashMap<String, NameID>,
    names: Vec<String>,
}

impl NameTable {
    pub(crate) fn intern(&mut self, name: &str) -> NameID {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = NameID::new(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    #[inline]
    pub(crate) fn get(&self, name: &str) -> Option<NameID> {
        self.ids.get(name).copied()
    }

    #[allow(dead_code)]
    pub(crate) fn name(&self, id: NameID) -> &str {
        &self.names[id]
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable() {
        let mut table = NameTable::default();
        let a = table.intern("equals");
        let b = table.intern("x");
        assert_eq!(table.intern("equals"), a);
        assert_ne!(a, b);
        assert_eq!(table.get("x"), Some(b));
        assert_eq!(table.get("y"), None);
        assert_eq!(table.name(a), "equals");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Input::Open(Kind::Return, Name::Unnamed).to_string(), "Return");
        assert_eq!(
            Input::Open(Kind::VariableDecl, Name::Any).to_string(),
            "VariableDecl(*)"
        );
        assert_eq!(Input::Up.to_string(), "^");
    }
}
