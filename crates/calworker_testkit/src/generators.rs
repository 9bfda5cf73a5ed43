//! Property-based test generators using proptest.

use calworker_protocol::Value;
use proptest::prelude::*;

/// Strategy for a sequence of counter operations: `true` increments,
/// `false` decrements. Decrements may outnumber increments.
pub fn counter_ops_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..64)
}

/// Strategy for balanced counter operations: every decrement follows a
/// matching increment.
pub fn balanced_counter_ops_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..32).prop_map(|order| {
        let mut ops = Vec::with_capacity(order.len() * 2);
        let mut open = 0usize;
        for increment in order {
            if increment || open == 0 {
                ops.push(true);
                open += 1;
            } else {
                ops.push(false);
                open -= 1;
            }
        }
        ops.extend(std::iter::repeat(false).take(open));
        ops
    })
}

/// Shape of a generated directory, with the accounts whose sync fails.
#[derive(Debug, Clone)]
pub struct DirectoryShape {
    /// Number of accounts.
    pub accounts: usize,
    /// Calendars per account.
    pub calendars: usize,
    /// One-based indices of failing accounts.
    pub failing: Vec<usize>,
}

impl DirectoryShape {
    /// Returns the ids of the failing accounts.
    pub fn failing_ids(&self) -> Vec<String> {
        self.failing.iter().map(|i| format!("a{i}")).collect()
    }
}

/// Strategy for directory shapes of up to six accounts.
pub fn directory_shape_strategy() -> impl Strategy<Value = DirectoryShape> {
    (1usize..=6, 0usize..=3).prop_flat_map(|(accounts, calendars)| {
        prop::collection::vec(any::<bool>(), accounts).prop_map(move |mask| DirectoryShape {
            accounts,
            calendars,
            failing: mask
                .iter()
                .enumerate()
                .filter(|(_, fails)| **fails)
                .map(|(i, _)| i + 1)
                .collect(),
        })
    })
}

/// Strategy for JSON scalars that survive a round trip unchanged.
pub fn json_scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 _-]{0,24}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for argument lists of up to five JSON scalars.
pub fn json_args_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(json_scalar_strategy(), 0..5)
}
