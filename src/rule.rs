//! The compiled rule tree and its evaluation.
//!
//! A `Rule` is a closed set of variants: boolean composites, comparator
//! rules, list-membership rules, and literal booleans. Trees are built once
//! by the parser (or deserialized from the persisted form), are immutable
//! afterwards, and are evaluated once per item per refresh tick.

use serde::{Deserialize, Serialize};

/// Read-only snapshot of a single ground item, taken from the game client
/// before evaluation. Evaluation never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
}

impl ItemSnapshot {
    pub fn new(id: i64, name: impl Into<String>, quantity: i64) -> Self {
        Self {
            id,
            name: name.into(),
            quantity,
        }
    }
}

/// Contextual lookups supplied by the host plugin. The engine borrows this
/// for the duration of a single `test` call and never caches it.
pub trait EvalContext {
    /// Unit price for an item id. `None` when the price source has no entry;
    /// a value rule treats that as a non-match, never an error.
    fn item_price(&self, id: i64) -> Option<i64>;
}

/// One of the five ordering/equality relations usable in a rule expression.
/// Serialized under the stable names used by the persisted format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "GT")]
    Gt,
    #[serde(rename = "LT")]
    Lt,
    #[serde(rename = "EQ")]
    Eq,
    #[serde(rename = "GT_EQ")]
    GtEq,
    #[serde(rename = "LT_EQ")]
    LtEq,
}

impl Comparator {
    /// The comparator and the fixed rhs fully determine the outcome; the
    /// enum is closed so the match is exhaustive and no arm can fall through
    /// to a silent match.
    pub fn compare(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparator::Gt => lhs > rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Eq => lhs == rhs,
            Comparator::GtEq => lhs >= rhs,
            Comparator::LtEq => lhs <= rhs,
        }
    }
}

/// A node in the compiled boolean decision tree. Each node exclusively owns
/// its children; the tree is acyclic and immutable after construction.
///
/// The serde tag doubles as the variant's stable discriminator in the
/// persisted format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "discriminator", rename_all = "snake_case")]
pub enum Rule {
    /// Conjunction, short-circuits left to right.
    And { left: Box<Rule>, right: Box<Rule> },
    /// Disjunction, short-circuits left to right.
    Or { left: Box<Rule>, right: Box<Rule> },
    /// Negation.
    Not { inner: Box<Rule> },
    /// Literal `true`/`false`.
    Const { value: bool },
    /// Ground value (unit price times stack quantity) vs a fixed rhs.
    ItemValue { cmp: Comparator, rhs: i64 },
    /// Stack quantity vs a fixed rhs.
    ItemQuantity { cmp: Comparator, rhs: i64 },
    /// Item id vs a fixed rhs.
    ItemId { cmp: Comparator, rhs: i64 },
    /// Item id is one of the listed ids.
    ItemIdIn { ids: Vec<i64> },
    /// Item name is one of the listed names.
    ItemNameIn { names: Vec<String> },
}

impl Rule {
    /// Evaluate the tree against one item. Pure and side-effect free:
    /// repeated calls with the same context and item always agree.
    pub fn test(&self, ctx: &dyn EvalContext, item: &ItemSnapshot) -> bool {
        match self {
            Rule::And { left, right } => left.test(ctx, item) && right.test(ctx, item),
            Rule::Or { left, right } => left.test(ctx, item) || right.test(ctx, item),
            Rule::Not { inner } => !inner.test(ctx, item),
            Rule::Const { value } => *value,
            Rule::ItemValue { cmp, rhs } => match ctx.item_price(item.id) {
                Some(price) => cmp.compare(price.saturating_mul(item.quantity), *rhs),
                None => false,
            },
            Rule::ItemQuantity { cmp, rhs } => cmp.compare(item.quantity, *rhs),
            Rule::ItemId { cmp, rhs } => cmp.compare(item.id, *rhs),
            Rule::ItemIdIn { ids } => ids.contains(&item.id),
            Rule::ItemNameIn { names } => names.iter().any(|n| n == &item.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestContext {
        prices: HashMap<i64, i64>,
    }

    impl TestContext {
        fn new(prices: &[(i64, i64)]) -> Self {
            Self {
                prices: prices.iter().copied().collect(),
            }
        }
    }

    impl EvalContext for TestContext {
        fn item_price(&self, id: i64) -> Option<i64> {
            self.prices.get(&id).copied()
        }
    }

    fn coins(quantity: i64) -> ItemSnapshot {
        ItemSnapshot::new(995, "Coins", quantity)
    }

    #[test]
    fn test_gteq_boundary() {
        let rule = Rule::ItemQuantity {
            cmp: Comparator::GtEq,
            rhs: 5,
        };
        let ctx = TestContext::new(&[]);
        for qty in [5, 6, 100] {
            assert!(rule.test(&ctx, &coins(qty)), "expected match for {qty}");
        }
        for qty in [4, 0, -1] {
            assert!(!rule.test(&ctx, &coins(qty)), "expected no match for {qty}");
        }
    }

    #[test]
    fn test_all_comparators() {
        assert!(Comparator::Gt.compare(6, 5));
        assert!(!Comparator::Gt.compare(5, 5));
        assert!(Comparator::Lt.compare(4, 5));
        assert!(!Comparator::Lt.compare(5, 5));
        assert!(Comparator::Eq.compare(5, 5));
        assert!(!Comparator::Eq.compare(4, 5));
        assert!(Comparator::GtEq.compare(5, 5));
        assert!(Comparator::LtEq.compare(5, 5));
        assert!(!Comparator::LtEq.compare(6, 5));
    }

    #[test]
    fn test_value_rule_uses_price_times_quantity() {
        let rule = Rule::ItemValue {
            cmp: Comparator::GtEq,
            rhs: 1000,
        };
        let ctx = TestContext::new(&[(995, 1)]);
        assert!(rule.test(&ctx, &coins(1000)));
        assert!(!rule.test(&ctx, &coins(999)));
    }

    #[test]
    fn test_value_rule_without_price_never_matches() {
        let rule = Rule::ItemValue {
            cmp: Comparator::GtEq,
            rhs: 0,
        };
        let ctx = TestContext::new(&[]);
        // extraction failure is a definite non-match, not an error
        assert!(!rule.test(&ctx, &coins(1)));
    }

    #[test]
    fn test_boolean_composites() {
        let ctx = TestContext::new(&[]);
        let item = coins(10);
        let t = || Box::new(Rule::Const { value: true });
        let f = || Box::new(Rule::Const { value: false });

        assert!(Rule::And { left: t(), right: t() }.test(&ctx, &item));
        assert!(!Rule::And { left: t(), right: f() }.test(&ctx, &item));
        assert!(Rule::Or { left: f(), right: t() }.test(&ctx, &item));
        assert!(!Rule::Or { left: f(), right: f() }.test(&ctx, &item));
        assert!(Rule::Not { inner: f() }.test(&ctx, &item));
    }

    #[test]
    fn test_list_membership() {
        let ctx = TestContext::new(&[]);
        let ids = Rule::ItemIdIn {
            ids: vec![995, 4151],
        };
        assert!(ids.test(&ctx, &coins(1)));
        assert!(!ids.test(&ctx, &ItemSnapshot::new(1, "Bones", 1)));

        let names = Rule::ItemNameIn {
            names: vec!["Coins".to_string()],
        };
        assert!(names.test(&ctx, &coins(1)));
        assert!(!names.test(&ctx, &ItemSnapshot::new(995, "coins", 1)));

        let empty = Rule::ItemIdIn { ids: vec![] };
        assert!(!empty.test(&ctx, &coins(1)));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let rule = Rule::And {
            left: Box::new(Rule::ItemIdIn { ids: vec![995] }),
            right: Box::new(Rule::ItemValue {
                cmp: Comparator::Gt,
                rhs: 50,
            }),
        };
        let ctx = TestContext::new(&[(995, 1)]);
        let item = coins(100);
        let first = rule.test(&ctx, &item);
        for _ in 0..10 {
            assert_eq!(rule.test(&ctx, &item), first);
        }
    }
}
