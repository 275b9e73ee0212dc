//! Fluent rule declaration.

use crate::entity::Value;
use crate::migration::rule::{EntityFilter, MigrationRule, RuleOperation};
use crate::types::Version;

/// Declares migration rules stage by stage.
///
/// Each [`to_version`](Self::to_version) starts a stage whose source is the
/// previous stage's target. [`for_entities`](Self::for_entities) scopes the
/// property rules that follow it within the current stage only.
///
/// ```
/// use evostore_core::{MigrationBuilder, Value};
///
/// let rules = MigrationBuilder::from_version("1.0")
///     .to_version("1.1")
///     .rename_entity("TestEntity1_0", "TestEntity1_1")
///     .for_entities(["TestEntity1_1"])
///     .rename_property("foo", "newFoo")
///     .to_version("2.0")
///     .rename_entity("TestEntity1_1", "TestEntity2_0")
///     .for_entities(["TestEntity2_0"])
///     .add_property("bar", "Some value")
///     .remove_property("newFoo", Value::Null)
///     .build();
///
/// assert_eq!(rules.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct MigrationBuilder {
    rules: Vec<MigrationRule>,
    from: Version,
    to: Version,
    entities: EntityFilter,
}

/// The first stage of a [`MigrationBuilder`], waiting for its target version.
#[derive(Debug, Clone)]
#[must_use = "a source version does nothing until a target is declared"]
pub struct PendingStage {
    from: Version,
}

impl PendingStage {
    /// Declares the target version of the first stage.
    pub fn to_version(self, version: impl Into<Version>) -> MigrationBuilder {
        MigrationBuilder {
            rules: Vec::new(),
            from: self.from,
            to: version.into(),
            entities: EntityFilter::any(),
        }
    }
}

impl MigrationBuilder {
    /// Starts a declaration at `version`.
    pub fn from_version(version: impl Into<Version>) -> PendingStage {
        PendingStage {
            from: version.into(),
        }
    }

    /// Starts the next stage, migrating from the current target to `version`.
    #[must_use]
    pub fn to_version(mut self, version: impl Into<Version>) -> Self {
        self.from = std::mem::replace(&mut self.to, version.into());
        self.entities = EntityFilter::any();
        self
    }

    /// Restricts the following property rules of this stage to `types`.
    #[must_use]
    pub fn for_entities<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = EntityFilter::only(types);
        self
    }

    /// Renames an entity type.
    #[must_use]
    pub fn rename_entity(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.push(RuleOperation::RenameEntity {
            from: from.into(),
            to: to.into(),
        })
    }

    /// Renames a property.
    #[must_use]
    pub fn rename_property(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let entities = self.entities.clone();
        self.push(RuleOperation::RenameProperty {
            entities,
            from: from.into(),
            to: to.into(),
        })
    }

    /// Adds a property with a default value.
    #[must_use]
    pub fn add_property(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        let entities = self.entities.clone();
        self.push(RuleOperation::AddProperty {
            entities,
            name: name.into(),
            default: default.into(),
        })
    }

    /// Removes a property. The placeholder is never read.
    #[must_use]
    pub fn remove_property(self, name: impl Into<String>, placeholder: impl Into<Value>) -> Self {
        let entities = self.entities.clone();
        self.push(RuleOperation::RemoveProperty {
            entities,
            name: name.into(),
            placeholder: placeholder.into(),
        })
    }

    /// Returns the rules declared so far.
    #[must_use]
    pub fn rules(&self) -> &[MigrationRule] {
        &self.rules
    }

    /// Finishes the declaration.
    #[must_use]
    pub fn build(self) -> Vec<MigrationRule> {
        self.rules
    }

    fn push(mut self, operation: RuleOperation) -> Self {
        self.rules
            .push(MigrationRule::new(self.from.clone(), self.to.clone(), operation));
        self
    }
}

impl IntoIterator for MigrationBuilder {
    type Item = MigrationRule;
    type IntoIter = std::vec::IntoIter<MigrationRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}
