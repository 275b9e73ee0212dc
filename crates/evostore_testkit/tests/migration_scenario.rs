//! Integration tests for migrating stored data across application versions.

use evostore_core::{
    CoreError, EntityStatus, ErrorKind, MigrationBuilder, MigrationRuleSet, Value, Version,
};
use evostore_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

fn text(value: &str) -> Value {
    Value::from(value)
}

#[test]
fn test_v1_data_read_by_v1_1() {
    let (records, id) = scenarios::reference_v1_data();
    let store = TestStore::import(records, "1.1", Arc::new(reference_rules()));

    let state = store.load(id).unwrap();
    assert_eq!(state.entity_type(), "TestEntity1_1");
    assert_eq!(state.version().as_str(), "1.1");
    assert_eq!(state.property("newFoo"), Some(&text("Some value")));
    assert!(state.property("foo").is_none());
    assert_eq!(state.status(), EntityStatus::Loaded);
}

#[test]
fn test_v1_data_read_by_v2() {
    let (records, id) = scenarios::reference_v1_data();
    let store = TestStore::import(records, "2.0", Arc::new(reference_rules()));

    let state = store.load(id).unwrap();
    assert_eq!(state.entity_type(), "TestEntity2_0");
    assert_eq!(state.version().as_str(), "2.0");
    assert_eq!(state.property("bar"), Some(&text("Some value")));
    assert!(state.property("newFoo").is_none());
    assert!(state.property("foo").is_none());
}

#[test]
fn test_v1_1_data_read_by_v2() {
    let (records, id) = scenarios::reference_v1_data();
    let rules = Arc::new(reference_rules());

    // 1.1 rewrites the entity, so the stored version moves forward
    let v1_1 = TestStore::import(records, "1.1", Arc::clone(&rules));
    let mut unit = v1_1.unit_of_work();
    unit.get_mut(id)
        .unwrap()
        .set_property("newFoo", text("Changed"))
        .unwrap();
    unit.complete().unwrap();

    let exported = v1_1.export();
    assert_eq!(exported[0].version, "1.1");
    assert_eq!(exported[0].lock, 1);

    let v2 = TestStore::import(exported, "2.0", rules);
    let state = v2.load(id).unwrap();
    assert_eq!(state.entity_type(), "TestEntity2_0");
    assert_eq!(state.property("bar"), Some(&text("Some value")));
    assert!(state.property("newFoo").is_none());
}

#[test]
fn test_migrated_state_is_not_written_back() {
    let (records, id) = scenarios::reference_v1_data();
    let store = TestStore::import(records, "2.0", Arc::new(reference_rules()));

    store.load(id).unwrap();
    let mut unit = store.unit_of_work();
    unit.get(id).unwrap();
    assert_eq!(unit.pending(), 0);
    unit.complete().unwrap();

    let stored = store.export();
    assert_eq!(stored[0].version, "1.0");
    assert_eq!(stored[0].lock, 0);
}

#[test]
fn test_iteration_migrates_every_entity() {
    let v1 = TestStore::memory_with_rules("1.0", Arc::new(reference_rules()));
    let mut unit = v1.unit_of_work();
    for i in 0..5i64 {
        unit.new_entity("TestEntity1_0")
            .unwrap()
            .set_property("foo", i)
            .unwrap();
    }
    unit.new_entity("Unrelated").unwrap();
    unit.complete().unwrap();

    let v2 = v1.reopen("2.0", Arc::new(reference_rules()));
    let states: Vec<_> = v2.iter().unwrap().map(Result::unwrap).collect();
    assert_eq!(states.len(), 6);
    for state in &states {
        assert_eq!(state.version().as_str(), "2.0");
        if state.entity_type() == "Unrelated" {
            assert!(state.properties().is_empty());
        } else {
            assert_eq!(state.entity_type(), "TestEntity2_0");
            assert_eq!(state.property("bar"), Some(&text("Some value")));
        }
    }
}

#[test]
fn test_intermediate_version_uses_nearest_lower_target() {
    let (records, id) = scenarios::reference_v1_data();
    let store = TestStore::import(records, "1.5", Arc::new(reference_rules()));

    let state = store.load(id).unwrap();
    assert_eq!(state.entity_type(), "TestEntity1_1");
    assert_eq!(state.version().as_str(), "1.5");
    assert_eq!(state.property("newFoo"), Some(&text("Some value")));
}

#[test]
fn test_equivalent_version_spelling_migrates_fully() {
    let (records, id) = scenarios::reference_v1_data();
    let store = TestStore::import(records, "2", Arc::new(reference_rules()));

    let state = store.load(id).unwrap();
    assert_eq!(state.entity_type(), "TestEntity2_0");
    assert_eq!(state.version().as_str(), "2");
    assert_eq!(state.property("bar"), Some(&text("Some value")));
}

#[test]
fn test_newer_data_has_no_migration_path() {
    let (records, id) = scenarios::reference_v1_data();
    let v2 = TestStore::import(records, "2.0", Arc::new(reference_rules()));
    let mut unit = v2.unit_of_work();
    unit.get_mut(id)
        .unwrap()
        .set_property("bar", text("From 2.0"))
        .unwrap();
    unit.complete().unwrap();

    let v1 = v2.reopen("1.0", Arc::new(reference_rules()));
    let err = v1.load(id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(
        err,
        CoreError::NoMigrationPath { ref from, ref to }
            if from.as_str() == "2.0" && to.as_str() == "1.0"
    ));
}

#[test]
fn test_unknown_version_has_no_migration_path() {
    let (records, id) = scenarios::reference_v1_data();
    let store = TestStore::import(records, "2.0", Arc::new(MigrationRuleSet::new()));

    let err = store.load(id).unwrap_err();
    assert!(matches!(err, CoreError::NoMigrationPath { .. }));

    let mut unit = store.unit_of_work();
    assert!(matches!(
        unit.get(id),
        Err(CoreError::NoMigrationPath { .. })
    ));
}

#[test]
fn test_file_store_migrates_after_reopen() {
    let rules = Arc::new(reference_rules());
    let store = TestFileStore::open("1.0", Arc::clone(&rules));
    let mut unit = store.unit_of_work();
    let entity = unit.new_entity("TestEntity1_0").unwrap();
    entity.set_property("foo", text("Some value")).unwrap();
    let id = entity.id();
    unit.complete().unwrap();

    let store = store.reopen("2.0", Arc::clone(&rules));
    let state = store.load(id).unwrap();
    assert_eq!(state.entity_type(), "TestEntity2_0");
    assert_eq!(state.property("bar"), Some(&text("Some value")));

    let mut unit = store.unit_of_work();
    unit.get_mut(id)
        .unwrap()
        .set_property("bar", text("Rewritten"))
        .unwrap();
    unit.complete().unwrap();

    // rewritten at 2.0, so no rules are needed any more
    let store = store.reopen("2.0", Arc::new(MigrationRuleSet::new()));
    let state = store.load(id).unwrap();
    assert_eq!(state.lock(), 1);
    assert_eq!(state.property("bar"), Some(&text("Rewritten")));

    // identities continue after the highest stored key
    let mut unit = store.unit_of_work();
    let next = unit.new_entity("TestEntity2_0").unwrap().id();
    assert!(next > id);
}

#[test]
fn test_builder_stages_apply_in_order() {
    let mut rules = MigrationRuleSet::new();
    rules
        .register(
            MigrationBuilder::from_version("1")
                .to_version("2")
                .add_property("counter", 0i64)
                .to_version("3")
                .rename_property("counter", "total")
                .to_version("4")
                .rename_entity("Thing", "Item"),
        )
        .unwrap();

    let v1 = TestStore::memory("1");
    let ids = scenarios::populate(&v1.store, "Thing", 2);
    let v4 = v1.reopen("4", Arc::new(rules));

    for id in ids {
        let state = v4.load(id).unwrap();
        assert_eq!(state.entity_type(), "Item");
        assert_eq!(state.property("total"), Some(&Value::Integer(0)));
        assert!(state.property("counter").is_none());
        assert!(state.property("index").is_some());
    }
}

proptest! {
    #[test]
    fn test_chain_is_concatenation_of_edges((rules, versions) in linear_chain_strategy(6)) {
        let mut set = MigrationRuleSet::new();
        set.register(rules.clone()).unwrap();

        let from = Version::from("1");
        let to = Version::from(versions.to_string());
        let chain = set.get_rules(&from, &to).unwrap();

        let expected: Vec<_> = (1..versions)
            .flat_map(|v| {
                set.edge_rules(&Version::from(v.to_string()), &Version::from((v + 1).to_string()))
                    .to_vec()
            })
            .collect();
        prop_assert_eq!(&chain, &expected);
        prop_assert_eq!(chain, rules);
    }

    #[test]
    fn test_reverse_chain_is_missing((rules, versions) in linear_chain_strategy(4)) {
        let mut set = MigrationRuleSet::new();
        set.register(rules).unwrap();

        let from = Version::from(versions.to_string());
        let result = set.get_rules(&from, &Version::from("1"));
        let is_missing = matches!(result, Err(CoreError::NoMigrationPath { .. }));
        prop_assert!(is_missing, "expected no migration path, got {:?}", result);
    }
}
