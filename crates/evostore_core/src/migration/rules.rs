//! The version change graph and rule lookup.

use crate::error::{CoreError, CoreResult};
use crate::migration::rule::MigrationRule;
use crate::types::Version;
use crate::version::{DottedNumeric, VersionComparator};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Registered migration rules, indexed by version edge.
///
/// The graph maps every target version to the versions that have a direct
/// rule edge into it, in first-registration order. Registration rejects any
/// edge that would close a cycle, so every lookup terminates.
///
/// The set is built during setup and then shared read-only, typically
/// behind an `Arc`.
///
/// ```
/// use evostore_core::{MigrationBuilder, MigrationRuleSet, Version};
///
/// let mut rules = MigrationRuleSet::new();
/// rules
///     .register(
///         MigrationBuilder::from_version("1.0")
///             .to_version("1.1")
///             .rename_entity("TestEntity1_0", "TestEntity1_1")
///             .to_version("2.0")
///             .rename_entity("TestEntity1_1", "TestEntity2_0"),
///     )
///     .unwrap();
///
/// let chain = rules.get_rules(&Version::from("1.0"), &Version::from("2.0")).unwrap();
/// assert_eq!(chain.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MigrationRuleSet {
    version_changes: HashMap<Version, Vec<Version>>,
    rules: HashMap<(Version, Version), Vec<MigrationRule>>,
    comparator: Arc<dyn VersionComparator>,
    rule_count: usize,
}

impl Default for MigrationRuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRuleSet {
    /// Creates an empty rule set ordered by [`DottedNumeric`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparator(DottedNumeric)
    }

    /// Creates an empty rule set with a custom version ordering.
    ///
    /// The ordering is consulted only when a requested target has no rules
    /// of its own and the nearest lower target must stand in for it.
    pub fn with_comparator(comparator: impl VersionComparator + 'static) -> Self {
        Self {
            version_changes: HashMap::new(),
            rules: HashMap::new(),
            comparator: Arc::new(comparator),
            rule_count: 0,
        }
    }

    /// Registers a rule under its `(from, to)` edge.
    ///
    /// Rules on the same edge apply in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CyclicVersionGraph`] if the edge would close a
    /// cycle. The rule set is unchanged in that case.
    pub fn add_rule(&mut self, rule: MigrationRule) -> CoreResult<()> {
        let from = rule.from_version().clone();
        let to = rule.to_version().clone();

        if from == to {
            return Err(CoreError::CyclicVersionGraph {
                cycle: vec![from, to],
            });
        }
        // The new edge closes a cycle iff `to` already reaches `from`.
        if let Some(back_path) = self.predecessor_path(&from, &to) {
            let mut cycle: Vec<Version> = back_path.into_iter().rev().collect();
            cycle.push(to);
            return Err(CoreError::CyclicVersionGraph { cycle });
        }

        let preceding = self.version_changes.entry(to.clone()).or_default();
        if !preceding.contains(&from) {
            preceding.push(from.clone());
        }
        trace!(%from, %to, "registered migration rule");
        self.rules.entry((from, to)).or_default().push(rule);
        self.rule_count += 1;
        Ok(())
    }

    /// Registers every rule a builder (or any rule sequence) produced.
    ///
    /// Returns the number of rules added. Registration stops at the first
    /// rejected rule; rules before it stay registered.
    ///
    /// # Errors
    ///
    /// Propagates the first [`add_rule`](Self::add_rule) error.
    pub fn register<I>(&mut self, rules: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = MigrationRule>,
    {
        let mut added = 0;
        for rule in rules {
            self.add_rule(rule)?;
            added += 1;
        }
        Ok(added)
    }

    /// Returns the ordered rule chain that migrates `from` to `to`.
    ///
    /// If `to` has no rules of its own, the highest registered target at or
    /// below it stands in for it, so an application version without schema
    /// changes still resolves. A target the comparator deems
    /// [`equivalent`](VersionComparator::equivalent) to `to` counts as at. The returned rules are not filtered by entity type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoMigrationPath`] when no chain exists.
    pub fn get_rules(&self, from: &Version, to: &Version) -> CoreResult<Vec<MigrationRule>> {
        if from == to {
            return Ok(Vec::new());
        }

        let anchor = self
            .anchor_for(to)
            .ok_or_else(|| CoreError::no_migration_path(from, to))?;
        if anchor == from || self.comparator.equivalent(anchor, from) {
            return Ok(Vec::new());
        }

        let mut visited = HashSet::new();
        let chain = self
            .resolve_chain(from, anchor, &mut visited)
            .ok_or_else(|| CoreError::no_migration_path(from, to))?;

        debug!(%from, %to, %anchor, rules = chain.len(), "resolved migration chain");
        Ok(chain)
    }

    /// Returns the total number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rule_count
    }

    /// Returns whether no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    /// Returns every version that has incoming rules, in ascending order.
    #[must_use]
    pub fn target_versions(&self) -> Vec<&Version> {
        let mut targets: Vec<&Version> = self.version_changes.keys().collect();
        targets.sort_by(|a, b| self.comparator.compare(a, b));
        targets
    }

    /// Returns the rules registered directly on the `from -> to` edge.
    #[must_use]
    pub fn edge_rules(&self, from: &Version, to: &Version) -> &[MigrationRule] {
        self.rules
            .get(&(from.clone(), to.clone()))
            .map_or(&[], Vec::as_slice)
    }

    fn anchor_for<'a>(&'a self, to: &'a Version) -> Option<&'a Version> {
        if self.version_changes.contains_key(to) {
            return Some(to);
        }
        self.version_changes
            .keys()
            .filter(|v| {
                self.comparator.compare(v, to).is_lt() || self.comparator.equivalent(v, to)
            })
            .max_by(|a, b| self.comparator.compare(a, b))
    }

    fn resolve_chain(
        &self,
        from: &Version,
        target: &Version,
        visited: &mut HashSet<Version>,
    ) -> Option<Vec<MigrationRule>> {
        if !visited.insert(target.clone()) {
            return None;
        }
        let preceding = self.version_changes.get(target)?;

        for prev in preceding {
            let edge = self.edge_rules(prev, target);
            if prev == from {
                return Some(edge.to_vec());
            }
            if let Some(mut chain) = self.resolve_chain(from, prev, visited) {
                chain.extend_from_slice(edge);
                return Some(chain);
            }
        }
        None
    }

    /// Walks predecessor edges from `start` looking for `goal`.
    ///
    /// Returns the walked path `[start, .., goal]` when found.
    fn predecessor_path(&self, start: &Version, goal: &Version) -> Option<Vec<Version>> {
        let mut visited = HashSet::new();
        let mut path = vec![start.clone()];
        self.walk_predecessors(start, goal, &mut visited, &mut path)
            .then_some(path)
    }

    fn walk_predecessors(
        &self,
        current: &Version,
        goal: &Version,
        visited: &mut HashSet<Version>,
        path: &mut Vec<Version>,
    ) -> bool {
        if !visited.insert(current.clone()) {
            return false;
        }
        let Some(preceding) = self.version_changes.get(current) else {
            return false;
        };
        for prev in preceding {
            path.push(prev.clone());
            if prev == goal || self.walk_predecessors(prev, goal, visited, path) {
                return true;
            }
            path.pop();
        }
        false
    }
}
