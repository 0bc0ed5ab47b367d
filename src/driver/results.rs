//! Write operation results.
//!
//! Immutable value records returned by the collection write operations.
//! `acknowledged` reflects that the server accepted and ran the command,
//! independent of whether any document changed.

use crate::document::Value;
use crate::wire::WriteErrorDetail;

/// Result of an `insert_one`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    /// Identifier of the inserted document (generated when absent)
    pub inserted_id: Value,
    /// Whether the server ran the command
    pub acknowledged: bool,
}

/// Result of an `insert_many`.
///
/// In unordered mode the server keeps going past failures; the documents
/// that failed are reported in `write_errors` with their position in the
/// original slice, and `inserted_ids` holds the identifiers of the
/// documents that were actually stored.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    /// Identifiers of the successfully inserted documents
    pub inserted_ids: Vec<Value>,
    /// Per-document failures, empty when every document was stored
    pub write_errors: Vec<WriteErrorDetail>,
    /// Whether the server ran the command
    pub acknowledged: bool,
}

impl InsertManyResult {
    /// Whether any document failed to insert.
    pub fn has_write_errors(&self) -> bool {
        !self.write_errors.is_empty()
    }
}

/// Result of an `update_one` or `update_many`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents matched by the filter
    pub matched_count: u64,
    /// Documents actually modified
    pub modified_count: u64,
    /// Whether the server ran the command
    pub acknowledged: bool,
}

/// Result of a `delete_one` or `delete_many`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    /// Documents removed
    pub deleted_count: u64,
    /// Whether the server ran the command
    pub acknowledged: bool,
}
