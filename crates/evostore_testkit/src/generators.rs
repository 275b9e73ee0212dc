//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entity data and well-formed
//! migration rule chains.

use evostore_core::{
    Association, EntityFilter, EntityId, EntityState, MigrationRule, RuleOperation, Value,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating property and type names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for generating dotted numeric versions such as `"3.12"`.
pub fn dotted_version_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(0u32..50, 1..4).prop_map(|parts| {
        parts
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    })
}

/// Strategy for generating scalar property values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        prop::num::f64::NORMAL.prop_map(Value::Float),
        "[ -~]{0,24}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ]
}

/// Strategy for generating property values, including nested lists and maps.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map(name_strategy(), inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for generating associations.
pub fn association_strategy() -> impl Strategy<Value = Association> {
    prop_oneof![
        prop::option::of(1u64..10_000).prop_map(|id| Association::One(id.map(EntityId::new))),
        prop::collection::vec(1u64..10_000, 0..4)
            .prop_map(|ids| Association::Many(ids.into_iter().map(EntityId::new).collect())),
    ]
}

/// Strategy for generating new entity states of `entity_type` at `version`.
pub fn entity_state_strategy(
    entity_type: &'static str,
    version: &'static str,
) -> impl Strategy<Value = EntityState> {
    (
        1u64..1_000_000,
        prop::collection::btree_map(name_strategy(), value_strategy(), 0..6),
        prop::collection::btree_map(name_strategy(), association_strategy(), 0..3),
    )
        .prop_map(move |(id, properties, associations)| {
            let state = properties
                .into_iter()
                .fold(EntityState::new(EntityId::new(id), entity_type, version), |s, (k, v)| {
                    s.with_property(k, v)
                });
            associations
                .into_iter()
                .fold(state, |s, (k, a)| s.with_association(k, a))
        })
}

/// Strategy for generating property maps.
pub fn properties_strategy() -> impl Strategy<Value = BTreeMap<String, Value>> {
    prop::collection::btree_map(name_strategy(), value_strategy(), 0..8)
}

/// Strategy for generating rule operations that never filter by type.
pub fn unfiltered_operation_strategy() -> impl Strategy<Value = RuleOperation> {
    prop_oneof![
        (name_strategy(), name_strategy()).prop_map(|(from, to)| RuleOperation::RenameProperty {
            entities: EntityFilter::any(),
            from,
            to,
        }),
        (name_strategy(), scalar_value_strategy()).prop_map(|(name, default)| {
            RuleOperation::AddProperty {
                entities: EntityFilter::any(),
                name,
                default,
            }
        }),
        name_strategy().prop_map(|name| RuleOperation::RemoveProperty {
            entities: EntityFilter::any(),
            name,
            placeholder: Value::Null,
        }),
    ]
}

/// Strategy for generating a linear chain of rules over versions
/// `"1"`, `"2"`, ... `"n"`, with one to three rules per edge.
///
/// Returns the rules in registration order and the number of versions.
pub fn linear_chain_strategy(
    max_edges: usize,
) -> impl Strategy<Value = (Vec<MigrationRule>, usize)> {
    prop::collection::vec(
        prop::collection::vec(unfiltered_operation_strategy(), 1..4),
        1..=max_edges.max(1),
    )
    .prop_map(|edges| {
        let versions = edges.len() + 1;
        let rules: Vec<MigrationRule> = edges
            .into_iter()
            .enumerate()
            .flat_map(|(i, ops)| {
                let from = (i + 1).to_string();
                let to = (i + 2).to_string();
                ops.into_iter()
                    .map(move |op| MigrationRule::new(from.clone(), to.clone(), op))
            })
            .collect();
        (rules, versions)
    })
}
