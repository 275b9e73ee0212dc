//! Stress helpers for EvoStore.
//!
//! These helpers drive identity allocation and concurrent commits from
//! many threads and report what happened.

use evostore_core::{CoreError, EntityBackend, EntityId, EntityStore, PkAllocator, Value};
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Operations rejected by an optimistic-lock conflict.
    pub conflicts: usize,
    /// Operations that failed for any other reason.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Returns operations per second.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Conflicts: {}", self.conflicts);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second());
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 500,
            threads: 4,
        }
    }
}

/// Allocates keys from many threads at once.
///
/// Returns every issued key, in per-thread order, one vector per thread.
pub fn stress_pk_allocation(allocator: &PkAllocator, config: &StressConfig) -> Vec<Vec<u64>> {
    thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|_| {
                scope.spawn(move || {
                    (0..config.operations)
                        .map(|_| allocator.new_pk().expect("allocator is initialized"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("allocation thread panicked"))
            .collect()
    })
}

/// Returns whether every key across all threads is distinct.
pub fn all_distinct(issued: &[Vec<u64>]) -> bool {
    let mut seen = HashSet::new();
    issued.iter().flatten().all(|pk| seen.insert(*pk))
}

/// Creates entities from many threads, one unit of work per entity.
pub fn stress_concurrent_inserts<B: EntityBackend>(
    store: &EntityStore<B>,
    config: &StressConfig,
) -> (StressTestResult, Vec<EntityId>) {
    let start = Instant::now();
    let per_thread: Vec<Vec<Result<EntityId, CoreError>>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|t| {
                scope.spawn(move || {
                    (0..config.operations)
                        .map(|i| -> Result<EntityId, CoreError> {
                            let mut unit = store.unit_of_work();
                            let state = unit.new_entity("Stress")?;
                            state.set_property("thread", Value::from(t as i64))?;
                            state.set_property("op", Value::from(i as i64))?;
                            let id = state.id();
                            unit.complete()?;
                            Ok(id)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("insert thread panicked"))
            .collect()
    });

    let mut ids = Vec::new();
    let mut failed = 0;
    for outcome in per_thread.into_iter().flatten() {
        match outcome {
            Ok(id) => ids.push(id),
            Err(_) => failed += 1,
        }
    }

    let result = StressTestResult {
        total_ops: config.threads * config.operations,
        successful_ops: ids.len(),
        conflicts: 0,
        failed_ops: failed,
        duration: start.elapsed(),
    };
    (result, ids)
}

/// Increments an integer property of one entity from many threads.
///
/// Each attempt loads the entity in a fresh unit of work, bumps `property`
/// and completes. Attempts that lose the optimistic-lock race are counted
/// as conflicts and not retried, so the final value equals the number of
/// successful operations.
pub fn stress_contended_updates<B: EntityBackend>(
    store: &EntityStore<B>,
    id: EntityId,
    property: &str,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let outcomes: Vec<Result<(), CoreError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|_| {
                scope.spawn(move || {
                    (0..config.operations)
                        .map(|_| increment(store, id, property))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().expect("update thread panicked"))
            .collect()
    });

    let mut result = StressTestResult {
        total_ops: outcomes.len(),
        successful_ops: 0,
        conflicts: 0,
        failed_ops: 0,
        duration: start.elapsed(),
    };
    for outcome in outcomes {
        match outcome {
            Ok(()) => result.successful_ops += 1,
            Err(CoreError::Concurrency { .. }) => result.conflicts += 1,
            Err(_) => result.failed_ops += 1,
        }
    }
    result
}

fn increment<B: EntityBackend>(
    store: &EntityStore<B>,
    id: EntityId,
    property: &str,
) -> Result<(), CoreError> {
    let mut unit = store.unit_of_work();
    let state = unit.get_mut(id)?;
    let current = state
        .property(property)
        .and_then(Value::as_integer)
        .unwrap_or(0);
    state.set_property(property, current + 1)?;
    unit.complete()
}
