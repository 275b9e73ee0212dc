//! Applying rule chains to entity state.

use crate::entity::EntityState;
use crate::migration::rule::{MigrationRule, RuleOperation};

impl RuleOperation {
    /// Applies the operation to `state`.
    ///
    /// Returns `true` if the state changed. A rule whose filter does not
    /// match the state's current type is skipped.
    pub fn apply(&self, state: &mut EntityState) -> bool {
        match self {
            RuleOperation::RenameEntity { from, to } => {
                if state.entity_type() != from {
                    return false;
                }
                state.set_entity_type(to.clone());
                true
            }
            RuleOperation::RenameProperty { entities, from, to } => {
                if !entities.matches(state.entity_type()) {
                    return false;
                }
                let properties = state.properties_mut();
                match properties.remove(from) {
                    Some(value) => {
                        properties.insert(to.clone(), value);
                        true
                    }
                    None => false,
                }
            }
            RuleOperation::AddProperty {
                entities,
                name,
                default,
            } => {
                if !entities.matches(state.entity_type()) {
                    return false;
                }
                let properties = state.properties_mut();
                if properties.contains_key(name) {
                    return false;
                }
                properties.insert(name.clone(), default.clone());
                true
            }
            RuleOperation::RemoveProperty { entities, name, .. } => {
                entities.matches(state.entity_type())
                    && state.properties_mut().remove(name).is_some()
            }
        }
    }
}

impl MigrationRule {
    /// Applies this rule's operation to `state`.
    pub fn apply(&self, state: &mut EntityState) -> bool {
        self.operation().apply(state)
    }
}

/// Applies `rules` to `state` in order.
///
/// Returns the number of rules that changed the state. The state's
/// version tag is left alone; callers set it once the whole chain has run.
pub fn apply_rules<'a, I>(rules: I, state: &mut EntityState) -> usize
where
    I: IntoIterator<Item = &'a MigrationRule>,
{
    rules
        .into_iter()
        .filter(|rule| rule.apply(state))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, Value};
    use crate::migration::rule::EntityFilter;

    fn state(entity_type: &str) -> EntityState {
        EntityState::new(EntityId::new(1), entity_type, "1.0")
    }

    fn rule(operation: RuleOperation) -> MigrationRule {
        MigrationRule::new("1.0", "2.0", operation)
    }

    #[test]
    fn rename_entity_then_property() {
        let mut s = state("A").with_property("foo", "X");
        let rules = vec![
            rule(RuleOperation::RenameEntity {
                from: "A".into(),
                to: "B".into(),
            }),
            rule(RuleOperation::RenameProperty {
                entities: EntityFilter::only(["B"]),
                from: "foo".into(),
                to: "newFoo".into(),
            }),
        ];

        assert_eq!(apply_rules(&rules, &mut s), 2);
        assert_eq!(s.entity_type(), "B");
        assert_eq!(s.property("newFoo"), Some(&Value::from("X")));
        assert!(s.property("foo").is_none());
    }

    #[test]
    fn add_uses_literal_default_and_remove_drops() {
        let mut s = state("B").with_property("newFoo", "X");
        let rules = vec![
            rule(RuleOperation::AddProperty {
                entities: EntityFilter::only(["B"]),
                name: "bar".into(),
                default: Value::from("Some value"),
            }),
            rule(RuleOperation::RemoveProperty {
                entities: EntityFilter::only(["B"]),
                name: "newFoo".into(),
                placeholder: Value::from("ignored"),
            }),
        ];

        apply_rules(&rules, &mut s);
        assert_eq!(s.property("bar"), Some(&Value::from("Some value")));
        assert!(s.property("newFoo").is_none());
    }

    #[test]
    fn add_never_overwrites() {
        let mut s = state("B").with_property("bar", 7i64);
        let changed = RuleOperation::AddProperty {
            entities: EntityFilter::any(),
            name: "bar".into(),
            default: Value::from("default"),
        }
        .apply(&mut s);

        assert!(!changed);
        assert_eq!(s.property("bar"), Some(&Value::Integer(7)));
    }

    #[test]
    fn filtered_rule_skips_other_types() {
        let mut s = state("Invoice").with_property("foo", "X");
        let changed = RuleOperation::RenameProperty {
            entities: EntityFilter::only(["Person"]),
            from: "foo".into(),
            to: "bar".into(),
        }
        .apply(&mut s);

        assert!(!changed);
        assert!(s.property("foo").is_some());
    }

    #[test]
    fn rename_of_missing_property_is_noop() {
        let mut s = state("A");
        let changed = RuleOperation::RenameProperty {
            entities: EntityFilter::any(),
            from: "foo".into(),
            to: "bar".into(),
        }
        .apply(&mut s);
        assert!(!changed);
        assert!(s.properties().is_empty());
    }

    #[test]
    fn rename_entity_of_other_type_is_noop() {
        let mut s = state("C");
        let changed = RuleOperation::RenameEntity {
            from: "A".into(),
            to: "B".into(),
        }
        .apply(&mut s);
        assert!(!changed);
        assert_eq!(s.entity_type(), "C");
    }

    #[test]
    fn applying_keeps_status() {
        let mut s = EntityState::loaded(
            EntityId::new(3),
            "A",
            "1.0",
            2,
            Default::default(),
            Default::default(),
        );
        RuleOperation::RenameEntity {
            from: "A".into(),
            to: "B".into(),
        }
        .apply(&mut s);
        assert!(!s.is_dirty());
    }
}
