//! # Scene Error Types

use thiserror::Error;

/// Non-fatal conditions raised while applying a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneWarning {
    /// Object ancestry could not produce a group key; the object went to the
    /// synthetic default bucket.
    #[error("object {object_id:?} has malformed ancestry ({reason}), bucketed into the default group")]
    OrphanAncestry {
        /// Object id.
        object_id: String,
        /// What was wrong with the ancestry.
        reason: &'static str,
    },
}

/// Errors reported by store consistency checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// An id is indexed under a group but has no entry.
    #[error("id {id:?} indexed under group {group:?} has no entry")]
    DanglingIndex {
        /// Object id.
        id: String,
        /// Group key.
        group: String,
    },

    /// An entry exists but no group bucket lists it.
    #[error("entry {id:?} is not indexed under any group")]
    UnindexedEntry {
        /// Object id.
        id: String,
    },

    /// An entry's recorded group differs from the bucket holding it.
    #[error("entry {id:?} records group {recorded:?} but is indexed under {indexed:?}")]
    GroupMismatch {
        /// Object id.
        id: String,
        /// Group stored on the entry.
        recorded: String,
        /// Group whose bucket contains the id.
        indexed: String,
    },
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;
