//! # EvoStore Testkit
//!
//! Test utilities for EvoStore.
//!
//! This crate provides:
//! - Store fixtures over in-memory and temporary file storage
//! - The reference `1.0 -> 1.1 -> 2.0` migration scenario
//! - Property-based test generators using proptest
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use evostore_testkit::prelude::*;
//!
//! with_memory_store("1.0", |store| {
//!     let mut unit = store.unit_of_work();
//!     unit.new_entity("Person").unwrap();
//!     unit.complete().unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
