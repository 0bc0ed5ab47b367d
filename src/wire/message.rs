//! Wire command and reply messages.
//!
//! Commands are encoded as documents: the first field names the command,
//! and a `$db` field scopes it to a database. Replies are documents with an
//! `ok` field; failures carry `code` and `errmsg`, write results carry `n`
//! and friends, and find results carry a `cursor` subdocument.

use crate::document::{Document, Value};

use super::WireError;

/// All commands the driver can send.
#[derive(Debug, Clone)]
pub enum Command {
    /// Liveness check
    Ping,
    /// Insert documents into a collection
    Insert {
        /// Target collection
        collection: String,
        /// Documents to insert, ids already populated
        documents: Vec<Document>,
        /// Stop at the first failure instead of continuing
        ordered: bool,
    },
    /// Open a query cursor
    Find {
        /// Target collection
        collection: String,
        /// Filter document
        filter: Document,
        /// Optional projection
        projection: Option<Document>,
        /// Optional sort specification
        sort: Option<Document>,
        /// Optional result limit
        limit: Option<i64>,
        /// Optional number of documents to skip
        skip: Option<i64>,
        /// Optional per-batch document count
        batch_size: Option<i64>,
    },
    /// Fetch the next batch from an open cursor
    GetMore {
        /// Target collection
        collection: String,
        /// Server-side cursor id
        cursor_id: i64,
        /// Optional per-batch document count
        batch_size: Option<i64>,
    },
    /// Discard server-side cursors
    KillCursors {
        /// Target collection
        collection: String,
        /// Cursor ids to discard
        cursor_ids: Vec<i64>,
    },
    /// Update matching documents
    Update {
        /// Target collection
        collection: String,
        /// Filter selecting documents
        filter: Document,
        /// Operator document to apply
        update: Document,
        /// Update all matches instead of the first
        multi: bool,
    },
    /// Delete matching documents
    Delete {
        /// Target collection
        collection: String,
        /// Filter selecting documents
        filter: Document,
        /// Delete all matches instead of the first
        many: bool,
    },
    /// Count matching documents
    Count {
        /// Target collection
        collection: String,
        /// Filter selecting documents
        filter: Document,
    },
}

impl Command {
    /// Get the command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Insert { .. } => "insert",
            Command::Find { .. } => "find",
            Command::GetMore { .. } => "getMore",
            Command::KillCursors { .. } => "killCursors",
            Command::Update { .. } => "update",
            Command::Delete { .. } => "delete",
            Command::Count { .. } => "count",
        }
    }

    /// Build the command document, scoped to `db`.
    pub fn into_document(self, db: &str) -> Document {
        let mut body = Document::new();

        match self {
            Command::Ping => {
                body.insert("ping", 1);
            }
            Command::Insert {
                collection,
                documents,
                ordered,
            } => {
                body.insert("insert", collection);
                let docs: Vec<Value> = documents.into_iter().map(Value::Document).collect();
                body.insert("documents", docs);
                body.insert("ordered", ordered);
            }
            Command::Find {
                collection,
                filter,
                projection,
                sort,
                limit,
                skip,
                batch_size,
            } => {
                body.insert("find", collection);
                body.insert("filter", filter);
                if let Some(projection) = projection {
                    body.insert("projection", projection);
                }
                if let Some(sort) = sort {
                    body.insert("sort", sort);
                }
                if let Some(limit) = limit {
                    body.insert("limit", limit);
                }
                if let Some(skip) = skip {
                    body.insert("skip", skip);
                }
                if let Some(batch_size) = batch_size {
                    body.insert("batchSize", batch_size);
                }
            }
            Command::GetMore {
                collection,
                cursor_id,
                batch_size,
            } => {
                body.insert("getMore", cursor_id);
                body.insert("collection", collection);
                if let Some(batch_size) = batch_size {
                    body.insert("batchSize", batch_size);
                }
            }
            Command::KillCursors {
                collection,
                cursor_ids,
            } => {
                body.insert("killCursors", collection);
                let ids: Vec<Value> = cursor_ids.into_iter().map(Value::Int64).collect();
                body.insert("cursors", ids);
            }
            Command::Update {
                collection,
                filter,
                update,
                multi,
            } => {
                body.insert("update", collection);
                let mut spec = Document::new();
                spec.insert("q", filter);
                spec.insert("u", update);
                spec.insert("multi", multi);
                body.insert("updates", vec![Value::Document(spec)]);
            }
            Command::Delete {
                collection,
                filter,
                many,
            } => {
                body.insert("delete", collection);
                let mut spec = Document::new();
                spec.insert("q", filter);
                // limit 0 removes every match, 1 removes the first.
                spec.insert("limit", if many { 0 } else { 1 });
                body.insert("deletes", vec![Value::Document(spec)]);
            }
            Command::Count { collection, filter } => {
                body.insert("count", collection);
                body.insert("query", filter);
            }
        }

        body.insert("$db", db);
        body
    }
}

/// Per-document failure detail from a write reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteErrorDetail {
    /// Index of the failed document in the request
    pub index: usize,
    /// Server error code
    pub code: i32,
    /// Server error message
    pub message: String,
}

/// A decoded server reply.
#[derive(Debug, Clone)]
pub struct Reply {
    body: Document,
}

impl Reply {
    /// Wrap a reply document, verifying it carries an `ok` field.
    pub fn from_document(body: Document) -> Result<Self, WireError> {
        if body.get("ok").and_then(Value::as_f64).is_none() {
            return Err(WireError::InvalidReply(
                "reply missing numeric 'ok' field".to_string(),
            ));
        }
        Ok(Self { body })
    }

    /// Whether the server executed the command.
    pub fn is_ok(&self) -> bool {
        self.body.get("ok").and_then(Value::as_f64) == Some(1.0)
    }

    /// Server error code, 0 when absent.
    pub fn error_code(&self) -> i32 {
        self.body.get_i64("code").unwrap_or(0) as i32
    }

    /// Server error message, empty when absent.
    pub fn error_message(&self) -> &str {
        self.body.get_str("errmsg").unwrap_or("")
    }

    /// Affected-document count (`n`).
    pub fn n(&self) -> Option<i64> {
        self.body.get_i64("n")
    }

    /// Modified-document count (`nModified`).
    pub fn n_modified(&self) -> Option<i64> {
        self.body.get_i64("nModified")
    }

    /// Per-document write failures, empty when none were reported.
    pub fn write_errors(&self) -> Vec<WriteErrorDetail> {
        let Some(items) = self.body.get_array("writeErrors") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(Value::as_document)
            .map(|entry| WriteErrorDetail {
                index: entry.get_i64("index").unwrap_or(0) as usize,
                code: entry.get_i64("code").unwrap_or(0) as i32,
                message: entry.get_str("errmsg").unwrap_or("").to_string(),
            })
            .collect()
    }

    /// Extract the cursor id and batch from a find/getMore reply.
    pub fn into_cursor(mut self) -> Result<(i64, Vec<Document>), WireError> {
        let cursor = self
            .body
            .remove("cursor")
            .and_then(|v| match v {
                Value::Document(d) => Some(d),
                _ => None,
            })
            .ok_or_else(|| WireError::InvalidReply("reply missing 'cursor'".to_string()))?;

        let id = cursor
            .get_i64("id")
            .ok_or_else(|| WireError::InvalidReply("cursor missing 'id'".to_string()))?;

        let batch = cursor
            .get_array("firstBatch")
            .or_else(|| cursor.get_array("nextBatch"))
            .ok_or_else(|| WireError::InvalidReply("cursor missing batch".to_string()))?;

        let documents = batch
            .iter()
            .filter_map(Value::as_document)
            .cloned()
            .collect();

        Ok((id, documents))
    }

    /// The raw reply document.
    pub fn body(&self) -> &Document {
        &self.body
    }
}
