//! The commit protocol shared by every backend.
//!
//! A backend stages a batch of entity changes with
//! [`EntityBackend::prepare_commit`](crate::EntityBackend::prepare_commit),
//! which never performs I/O. The returned [`StateCommitter`] accepts exactly
//! one terminal call: [`commit`](StateCommitter::commit) applies the whole
//! batch atomically, [`cancel`](StateCommitter::cancel) drops it.

use crate::entity::{EntityId, EntityState};
use crate::error::{CoreError, CoreResult};
use tracing::{debug, trace};

/// Single-use finalizer for a staged batch of entity changes.
pub trait StateCommitter {
    /// Applies every staged update and removal atomically.
    ///
    /// On failure nothing is observable in the backend and the committer
    /// is spent.
    ///
    /// # Errors
    ///
    /// Returns a storage or concurrency error if the batch could not be
    /// applied, or a protocol error if a terminal call was already made.
    fn commit(&mut self) -> CoreResult<()>;

    /// Discards the staged batch.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a terminal call was already made.
    fn cancel(&mut self) -> CoreResult<()>;
}

/// Phase of a [`CommitProtocol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    /// Changes are staged; a terminal call is still allowed.
    Staged,
    /// The batch was applied.
    Committed,
    /// The batch was discarded.
    Cancelled,
    /// A commit was attempted and failed.
    Failed,
}

/// Guard enforcing the single terminal call of a committer.
#[derive(Debug)]
pub struct CommitProtocol {
    phase: CommitPhase,
}

impl Default for CommitProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitProtocol {
    /// Creates a guard in the [`CommitPhase::Staged`] phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: CommitPhase::Staged,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> CommitPhase {
        self.phase
    }

    /// Returns whether a terminal call has been made.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase != CommitPhase::Staged
    }

    /// Runs `apply` as the terminal commit.
    ///
    /// The phase becomes `Committed` or `Failed` depending on the outcome;
    /// either way no further terminal call is accepted.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if already finished, otherwise whatever
    /// `apply` returns.
    pub fn commit_with<F>(&mut self, apply: F) -> CoreResult<()>
    where
        F: FnOnce() -> CoreResult<()>,
    {
        self.ensure_staged("commit")?;
        match apply() {
            Ok(()) => {
                self.phase = CommitPhase::Committed;
                Ok(())
            }
            Err(err) => {
                self.phase = CommitPhase::Failed;
                debug!(error = %err, "commit failed");
                Err(err)
            }
        }
    }

    /// Marks the batch as discarded.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if already finished.
    pub fn cancel(&mut self) -> CoreResult<()> {
        self.ensure_staged("cancel")?;
        self.phase = CommitPhase::Cancelled;
        trace!("staged changes cancelled");
        Ok(())
    }

    fn ensure_staged(&self, action: &str) -> CoreResult<()> {
        if self.phase != CommitPhase::Staged {
            return Err(CoreError::protocol(format!(
                "cannot {action}: committer already {:?}",
                self.phase
            )));
        }
        Ok(())
    }
}

/// The entity changes a committer will apply.
#[derive(Debug, Clone, Default)]
pub struct StagedChanges {
    /// New and updated entity states.
    pub updates: Vec<EntityState>,
    /// Identities to remove.
    pub removals: Vec<EntityId>,
}

impl StagedChanges {
    /// Creates a staged batch.
    #[must_use]
    pub fn new(updates: Vec<EntityState>, removals: Vec<EntityId>) -> Self {
        Self { updates, removals }
    }

    /// Returns the number of staged changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len() + self.removals.len()
    }

    /// Returns whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.removals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn commit_once() {
        let mut protocol = CommitProtocol::new();
        protocol.commit_with(|| Ok(())).unwrap();
        assert_eq!(protocol.phase(), CommitPhase::Committed);

        let err = protocol.commit_with(|| Ok(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(protocol.cancel().unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn cancel_once() {
        let mut protocol = CommitProtocol::new();
        protocol.cancel().unwrap();
        assert_eq!(protocol.phase(), CommitPhase::Cancelled);
        assert!(protocol.cancel().is_err());

        let mut ran = false;
        assert!(protocol
            .commit_with(|| {
                ran = true;
                Ok(())
            })
            .is_err());
        assert!(!ran);
    }

    #[test]
    fn failed_commit_is_terminal() {
        let mut protocol = CommitProtocol::new();
        let err = protocol
            .commit_with(|| Err(CoreError::PkNotInitialized))
            .unwrap_err();
        assert!(matches!(err, CoreError::PkNotInitialized));
        assert_eq!(protocol.phase(), CommitPhase::Failed);
        assert!(protocol.is_finished());
        assert!(protocol.cancel().is_err());
    }

    #[test]
    fn staged_changes_len() {
        let changes = StagedChanges::new(
            vec![EntityState::new(EntityId::new(1), "A", "1.0")],
            vec![EntityId::new(2), EntityId::new(3)],
        );
        assert_eq!(changes.len(), 3);
        assert!(!changes.is_empty());
        assert!(StagedChanges::default().is_empty());
    }
}
