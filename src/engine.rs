//! Compilation front door and the shared filter store.
//!
//! Compilation (lex + parse) runs off the hot path, once per filter reload.
//! Evaluation runs once per visible item per tick against an immutable,
//! shared snapshot of the compiled filters.

use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::filter::{DisplayConfig, FilterConfig};
use crate::lexer::{Lexer, TokenizeError};
use crate::parser::{ParseError, Parser};
use crate::rule::{EvalContext, ItemSnapshot};

/// A whole-document compilation failure: either stage aborts the document,
/// nothing partial is ever published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Tokenize(TokenizeError),
    Parse(ParseError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Tokenize(e) => write!(f, "tokenize error: {}", e),
            CompileError::Parse(e) => write!(f, "parse error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<TokenizeError> for CompileError {
    fn from(e: TokenizeError) -> Self {
        CompileError::Tokenize(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

/// Compile filter source text into its filter configs.
pub fn compile(source: &str) -> Result<Vec<FilterConfig>, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    debug!(token_count = tokens.len(), "tokenized filter source");
    let filters = Parser::new(tokens).parse()?;
    debug!(filter_count = filters.len(), "compiled filter source");
    Ok(filters)
}

/// Evaluate an item against the filter list; the first matching filter wins.
pub fn evaluate<'a>(
    filters: &'a [FilterConfig],
    ctx: &dyn EvalContext,
    item: &ItemSnapshot,
) -> Option<&'a DisplayConfig> {
    filters
        .iter()
        .find(|filter| filter.test(ctx, item))
        .map(|filter| &filter.display)
}

/// Holder for the currently active compiled filters.
///
/// Reload compiles the whole document first and only then swaps the shared
/// reference, so concurrent readers observe either the fully-old or the
/// fully-new filter list, never a partially rebuilt one. Readers take a
/// `snapshot()` once per tick and evaluate against it lock-free.
#[derive(Default)]
pub struct FilterStore {
    active: RwLock<Arc<Vec<FilterConfig>>>,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current filter list. Cheap to clone, safe to keep for a tick.
    pub fn snapshot(&self) -> Arc<Vec<FilterConfig>> {
        self.active
            .read()
            .expect("filter store lock poisoned")
            .clone()
    }

    /// Swap in an already compiled filter list.
    pub fn publish(&self, filters: Vec<FilterConfig>) {
        let mut active = self.active.write().expect("filter store lock poisoned");
        *active = Arc::new(filters);
        info!(filter_count = active.len(), "published filter list");
    }

    /// Compile `source` and publish it on success. On failure the previously
    /// active list stays in place untouched.
    pub fn reload(&self, source: &str) -> Result<usize, CompileError> {
        let filters = compile(source)?;
        let count = filters.len();
        self.publish(filters);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Color;
    use crate::rule::Rule;
    use std::collections::HashMap;

    struct PriceMap(HashMap<i64, i64>);

    impl EvalContext for PriceMap {
        fn item_price(&self, id: i64) -> Option<i64> {
            self.0.get(&id).copied()
        }
    }

    fn ctx(prices: &[(i64, i64)]) -> PriceMap {
        PriceMap(prices.iter().copied().collect())
    }

    #[test]
    fn test_compile_end_to_end() {
        let source = r##"apply { if (value >= 1000) { } meta { color: "#FF0000" } };"##;
        let filters = compile(source).unwrap();
        assert_eq!(filters.len(), 1);

        let ctx = ctx(&[(11840, 1500), (526, 111)]);
        let rich = ItemSnapshot::new(11840, "Dragon boots", 1);
        let poor = ItemSnapshot::new(526, "Bones", 9);

        assert!(filters[0].test(&ctx, &rich));
        assert!(!filters[0].test(&ctx, &poor));
        assert_eq!(
            evaluate(&filters, &ctx, &rich).and_then(|d| d.color),
            Some(Color::rgb(0xff, 0, 0))
        );
        assert_eq!(evaluate(&filters, &ctx, &poor), None);
    }

    #[test]
    fn test_compile_surfaces_both_stages() {
        assert!(matches!(
            compile("apply { if (value > 1@) { } };"),
            Err(CompileError::Tokenize(_))
        ));
        assert!(matches!(
            compile("apply { if (value > ) { } };"),
            Err(CompileError::Parse(_))
        ));
    }

    #[test]
    fn test_first_match_wins() {
        let source = r##"
            apply { if (id == [995]) { text: "gold"; } };
            apply { if (true) { text: "anything"; } };
        "##;
        let filters = compile(source).unwrap();
        assert_eq!(filters.len(), 2);

        let ctx = ctx(&[]);
        let coins = ItemSnapshot::new(995, "Coins", 50);
        let other = ItemSnapshot::new(1, "Pot", 1);
        assert_eq!(
            evaluate(&filters, &ctx, &coins).and_then(|d| d.text.as_deref()),
            Some("gold")
        );
        assert_eq!(
            evaluate(&filters, &ctx, &other).and_then(|d| d.text.as_deref()),
            Some("anything")
        );
    }

    #[test]
    fn test_store_reload_publishes_atomically() {
        let store = FilterStore::new();
        assert!(store.snapshot().is_empty());

        let before = store.snapshot();
        let count = store.reload("apply { if (quantity > 5) { } };").unwrap();
        assert_eq!(count, 1);
        // the old snapshot is untouched, the new one is fully built
        assert!(before.is_empty());
        assert_eq!(store.snapshot().len(), 1);
        assert!(matches!(
            store.snapshot()[0].rule,
            Rule::ItemQuantity { .. }
        ));
    }

    #[test]
    fn test_store_keeps_old_list_on_failed_reload() {
        let store = FilterStore::new();
        store.reload("apply { };").unwrap();
        let err = store.reload("apply { if ( } };");
        assert!(err.is_err());
        assert_eq!(store.snapshot().len(), 1);
    }
}
