//! Migration rules.

use crate::entity::Value;
use crate::types::Version;

/// The entity types a property rule applies to.
///
/// An empty filter matches every type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter(Vec<String>);

impl EntityFilter {
    /// A filter matching every entity type.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// A filter matching only the listed types.
    pub fn only<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(types.into_iter().map(Into::into).collect())
    }

    /// Returns whether `entity_type` passes the filter.
    #[must_use]
    pub fn matches(&self, entity_type: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|t| t == entity_type)
    }

    /// Returns the listed types; empty means "all".
    #[must_use]
    pub fn types(&self) -> &[String] {
        &self.0
    }
}

/// A structural transformation applied to an entity state.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOperation {
    /// Change the entity type name.
    RenameEntity {
        /// Type name before the rule.
        from: String,
        /// Type name after the rule.
        to: String,
    },
    /// Move a property value to a new name.
    RenameProperty {
        /// Types the rule applies to.
        entities: EntityFilter,
        /// Property name before the rule.
        from: String,
        /// Property name after the rule.
        to: String,
    },
    /// Introduce a property with a default value.
    AddProperty {
        /// Types the rule applies to.
        entities: EntityFilter,
        /// Property name.
        name: String,
        /// Value inserted when the property is absent.
        default: Value,
    },
    /// Drop a property.
    RemoveProperty {
        /// Types the rule applies to.
        entities: EntityFilter,
        /// Property name.
        name: String,
        /// Value the property would have held; recorded for documentation
        /// and never read.
        placeholder: Value,
    },
}

/// A rule attached to one `from -> to` edge of the version graph.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRule {
    from_version: Version,
    to_version: Version,
    operation: RuleOperation,
}

impl MigrationRule {
    /// Creates a rule for the `from -> to` transition.
    pub fn new(
        from_version: impl Into<Version>,
        to_version: impl Into<Version>,
        operation: RuleOperation,
    ) -> Self {
        Self {
            from_version: from_version.into(),
            to_version: to_version.into(),
            operation,
        }
    }

    /// Returns the version the rule migrates from.
    #[must_use]
    pub fn from_version(&self) -> &Version {
        &self.from_version
    }

    /// Returns the version the rule migrates to.
    #[must_use]
    pub fn to_version(&self) -> &Version {
        &self.to_version
    }

    /// Returns the transformation.
    #[must_use]
    pub fn operation(&self) -> &RuleOperation {
        &self.operation
    }
}
