macro_rules! impl_id {
    ($name:ident, $tp:ty) => {
        /// The ID type $name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub(crate) struct $name($tp);

        impl $name {
            /// Create a new id.
            #[inline]
            pub(crate) const fn new(index: $tp) -> Self {
                $name(index)
            }

            /// Get the id as usize.
            #[allow(dead_code)]
            #[inline]
            pub(crate) fn as_usize(&self) -> usize {
                self.0 as usize
            }

            /// Get the raw id.
            #[allow(dead_code)]
            #[inline]
            pub(crate) fn id(&self) -> $tp {
                self.0
            }
        }

        impl<T> std::ops::Index<$name> for [T] {
            type Output = T;

            #[inline]
            fn index(&self, index: $name) -> &Self::Output {
                &self[index.0 as usize]
            }
        }

        impl<T> std::ops::Index<$name> for Vec<T> {
            type Output = T;

            #[inline]
            fn index(&self, index: $name) -> &Self::Output {
                &self[index.0 as usize]
            }
        }

        impl<T> std::ops::IndexMut<$name> for Vec<T> {
            #[inline]
            fn index_mut(&mut self, index: $name) -> &mut T {
                &mut self[index.0 as usize]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$tp> for $name {
            fn from(index: $tp) -> Self {
                $name::new(index)
            }
        }
    };
}

/// The ID type for automaton states. The starting state of every automaton is 0.
pub(crate) type StateIDBase = u32;
impl_id!(StateID, StateIDBase);

/// The ID type for patterns. Actually the index of the pattern source text in the bulk pattern.
pub(crate) type PatternIDBase = usize;
impl_id!(PatternID, PatternIDBase);

/// The ID type for interned names (identifiers, member names, operators) used as part of the
/// automaton's input symbols.
pub(crate) type NameIDBase = u32;
impl_id!(NameID, NameIDBase);
