//! Schema migration.
//!
//! Entities persisted under an older schema version are brought up to the
//! application version by applying an ordered chain of structural rules.
//! Rules are attached to `from -> to` version edges; [`MigrationRuleSet`]
//! finds the chain between any two versions and [`apply_rules`] runs it
//! against an [`EntityState`](crate::EntityState).
//!
//! Rules only reshape data: renaming a type, moving, adding or dropping a
//! property. They never look at property values.

mod apply;
mod builder;
mod rule;
mod rules;

pub use apply::apply_rules;
pub use builder::{MigrationBuilder, PendingStage};
pub use rule::{EntityFilter, MigrationRule, RuleOperation};
pub use rules::MigrationRuleSet;
