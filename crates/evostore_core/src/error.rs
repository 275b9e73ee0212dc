//! Error types for EvoStore core.

use crate::entity::EntityId;
use crate::types::Version;
use evostore_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Broad class of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Setup is wrong: missing migration path, cyclic rules, uninitialized allocator.
    Configuration,
    /// I/O or connectivity failure.
    Storage,
    /// Optimistic-lock mismatch at commit time.
    Concurrency,
    /// Requested identity is absent.
    NotFound,
    /// Commit protocol misuse.
    Protocol,
}

/// Errors that can occur in EvoStore core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// No rule chain leads from the stored version to the requested one.
    #[error("no migration path from version {from} to {to}")]
    NoMigrationPath {
        /// Version the data is stored under.
        from: Version,
        /// Version that was requested.
        to: Version,
    },

    /// Registering a rule would close a cycle in the version graph.
    #[error("cyclic version graph: {}", format_cycle(.cycle))]
    CyclicVersionGraph {
        /// Versions forming the cycle, starting and ending at the same version.
        cycle: Vec<Version>,
    },

    /// A primary key was requested before the allocator was initialized.
    #[error("primary key requested before allocator was initialized")]
    PkNotInitialized,

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// Entity state could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The entity was changed by another writer since it was loaded.
    #[error("concurrent modification of entity {id}: expected lock {expected:?}, found {actual:?}")]
    Concurrency {
        /// The conflicting entity.
        id: EntityId,
        /// Lock counter the writer expected.
        expected: Option<u64>,
        /// Lock counter found in the store.
        actual: Option<u64>,
    },

    /// Entity not found.
    #[error("entity not found: {id}")]
    EntityNotFound {
        /// The identity that was not found.
        id: EntityId,
    },

    /// The commit protocol was misused.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },
}

fn format_cycle(cycle: &[Version]) -> String {
    cycle
        .iter()
        .map(Version::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl CoreError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a missing migration path error.
    pub fn no_migration_path(from: &Version, to: &Version) -> Self {
        Self::NoMigrationPath {
            from: from.clone(),
            to: to.clone(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an entity not found error.
    pub fn not_found(id: EntityId) -> Self {
        Self::EntityNotFound { id }
    }

    /// Returns the broad class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. }
            | Self::NoMigrationPath { .. }
            | Self::CyclicVersionGraph { .. }
            | Self::PkNotInitialized => ErrorKind::Configuration,
            Self::Storage(_) | Self::Codec { .. } => ErrorKind::Storage,
            Self::Concurrency { .. } => ErrorKind::Concurrency,
            Self::EntityNotFound { .. } => ErrorKind::NotFound,
            Self::Protocol { .. } => ErrorKind::Protocol,
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LockMismatch {
                pk,
                expected,
                actual,
            } => Self::Concurrency {
                id: EntityId::new(pk),
                expected,
                actual,
            },
            other => Self::Storage(other),
        }
    }
}
