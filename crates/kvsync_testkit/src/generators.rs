//! Property-based test generators using proptest.
//!
//! Provides strategies for generating storage keys, JSON values and
//! interleavings of local and remote writes.

use proptest::prelude::*;
use serde_json::Value;

/// One step of a generated sync scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStep {
    /// The application sets the cell.
    Local(String),
    /// Another writer sets the key in the store.
    Remote(String),
    /// The runtime gets to run pending relays.
    Settle,
}

/// Strategy for generating valid storage keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_.-]{0,31}").expect("Invalid regex")
}

/// Strategy for generating short string payloads.
pub fn payload_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex")
}

/// Strategy for generating arbitrary JSON values of bounded depth.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Strategy for generating a sequence of sync steps.
pub fn sync_steps_strategy(max_len: usize) -> impl Strategy<Value = Vec<SyncStep>> {
    prop::collection::vec(
        prop_oneof![
            3 => payload_strategy().prop_map(SyncStep::Local),
            2 => payload_strategy().prop_map(SyncStep::Remote),
            2 => Just(SyncStep::Settle),
        ],
        0..max_len,
    )
}
