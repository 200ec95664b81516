use crate::{BulkSearch, EncodingMode, Strategy};

/// A builder for creating a bulk search.
#[derive(Debug, Clone, Default)]
pub struct BulkSearchBuilder {
    strategy: Strategy,
    encoding_mode: EncodingMode,
}

impl BulkSearchBuilder {
    /// Creates a new builder with the automaton strategy and the search encoding mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the exact copy finder strategy.
    pub fn use_copy_finder(mut self) -> Self {
        self.strategy = Strategy::CopyFinder;
        self
    }

    /// Selects the automaton strategy.
    pub fn use_nfa(mut self) -> Self {
        self.strategy = Strategy::Nfa;
        self
    }

    /// Sets the mode of the encoding contexts created by the bulk search.
    pub fn encoding_mode(mut self, encoding_mode: EncodingMode) -> Self {
        self.encoding_mode = encoding_mode;
        self
    }

    /// Builds the bulk search.
    pub fn build(self) -> BulkSearch {
        BulkSearch {
            strategy: self.strategy,
            encoding_mode: self.encoding_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_bulk_search_builder() {
        init();
        let search = BulkSearchBuilder::new().build();
        assert_eq!(search.strategy(), Strategy::Nfa);
        assert_eq!(search.encoding_mode(), EncodingMode::Search);

        let search = BulkSearchBuilder::new()
            .use_copy_finder()
            .encoding_mode(EncodingMode::Duplicates)
            .build();
        assert_eq!(search.strategy(), Strategy::CopyFinder);
        assert_eq!(
            search.new_encoding_context().mode(),
            EncodingMode::Duplicates
        );
        assert_eq!(
            BulkSearchBuilder::new()
                .use_copy_finder()
                .use_nfa()
                .build()
                .strategy(),
            Strategy::Nfa
        );
    }

    #[cfg(feature = "dot_writer")]
    #[test]
    fn test_render_automaton() {
        init();
        let cancel = crate::CancellationToken::new();
        let pattern = BulkSearchBuilder::new()
            .build()
            .create(
                ["return $val$;", "$a.equals($b)", "if ($c) $s;", "int $v = 0; $v++;"],
                &cancel,
            )
            .unwrap()
            .unwrap();
        let mut f = std::fs::File::create("target/BulkPatternNfa.dot").unwrap();
        pattern.render_dot("Bulk pattern", &mut f).unwrap();

        let pattern = BulkSearchBuilder::new()
            .use_copy_finder()
            .build()
            .create(["x"], &cancel)
            .unwrap()
            .unwrap();
        let mut rendered = Vec::new();
        assert!(pattern.render_dot("Copy finder", &mut rendered).is_err());
    }
}
