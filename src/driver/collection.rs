//! Collection operations.
//!
//! The CRUD surface. Every operation validates its arguments before any
//! network call, acquires exactly one pooled connection for its duration,
//! and surfaces server failures as typed errors. Find operations hand their
//! lease to the returned [`Cursor`].

use std::sync::Arc;

use crate::document::{Document, ObjectId, Value};
use crate::wire::Command;

use super::client::ClientConfig;
use super::cursor::Cursor;
use super::error::{DriverError, DriverResult};
use super::pool::ConnectionPool;
use super::results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};

/// Operators accepted in query documents.
const QUERY_OPERATORS: [&str; 6] = ["$gt", "$lt", "$gte", "$lte", "$ne", "$in"];

/// Operators accepted in update documents.
const UPDATE_OPERATORS: [&str; 4] = ["$set", "$unset", "$inc", "$push"];

/// Options for a find operation.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Fields to include or exclude
    pub projection: Option<Document>,
    /// Server-side sort specification
    pub sort: Option<Document>,
    /// Maximum number of documents to return
    pub limit: Option<i64>,
    /// Number of matching documents to skip
    pub skip: Option<i64>,
    /// Documents per server batch
    pub batch_size: Option<i64>,
}

impl FindOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the projection.
    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Set the sort specification.
    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the number of documents to skip.
    pub fn with_skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the per-batch document count.
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Handle to a named collection.
#[derive(Clone)]
pub struct Collection {
    db: String,
    name: String,
    config: Arc<ClientConfig>,
    pool: ConnectionPool,
}

impl Collection {
    pub(crate) fn new(
        db: String,
        name: String,
        config: Arc<ClientConfig>,
        pool: ConnectionPool,
    ) -> Self {
        Self {
            db,
            name,
            config,
            pool,
        }
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning database name.
    pub fn database_name(&self) -> &str {
        &self.db
    }

    /// Insert a single document.
    ///
    /// Generates an `_id` when the document has none. Fails with
    /// [`DriverError::Write`] when the server rejects the document.
    pub async fn insert_one(&self, mut document: Document) -> DriverResult<InsertOneResult> {
        let inserted_id = ensure_id(&mut document);

        let reply = self
            .run(Command::Insert {
                collection: self.name.clone(),
                documents: vec![document],
                ordered: true,
            })
            .await?;

        if !reply.is_ok() {
            return Err(DriverError::write(
                reply.error_code(),
                reply.error_message(),
            ));
        }
        if let Some(error) = reply.write_errors().into_iter().next() {
            return Err(DriverError::write(error.code, error.message));
        }

        Ok(InsertOneResult {
            inserted_id,
            acknowledged: true,
        })
    }

    /// Insert several documents.
    ///
    /// Ids are generated per document where absent. With `ordered` the
    /// server stops at the first failure, surfaced as
    /// [`DriverError::Write`]; unordered, it keeps going and the failures
    /// come back aggregated in [`InsertManyResult::write_errors`].
    pub async fn insert_many(
        &self,
        mut documents: Vec<Document>,
        ordered: bool,
    ) -> DriverResult<InsertManyResult> {
        if documents.is_empty() {
            return Err(DriverError::invalid_argument(
                "insert_many requires at least one document",
            ));
        }

        let ids: Vec<Value> = documents.iter_mut().map(ensure_id).collect();

        let reply = self
            .run(Command::Insert {
                collection: self.name.clone(),
                documents,
                ordered,
            })
            .await?;

        if !reply.is_ok() {
            return Err(DriverError::write(
                reply.error_code(),
                reply.error_message(),
            ));
        }

        let write_errors = reply.write_errors();
        if ordered {
            if let Some(error) = write_errors.into_iter().next() {
                return Err(DriverError::write(
                    error.code,
                    format!("document at index {}: {}", error.index, error.message),
                ));
            }
            return Ok(InsertManyResult {
                inserted_ids: ids,
                write_errors: Vec::new(),
                acknowledged: true,
            });
        }

        let failed: Vec<usize> = write_errors.iter().map(|e| e.index).collect();
        let inserted_ids = ids
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !failed.contains(index))
            .map(|(_, id)| id)
            .collect();

        Ok(InsertManyResult {
            inserted_ids,
            write_errors,
            acknowledged: true,
        })
    }

    /// Find the first document matching `filter`.
    ///
    /// No match is `Ok(None)`, not an error.
    pub async fn find_one(
        &self,
        filter: Document,
        projection: Option<Document>,
    ) -> DriverResult<Option<Document>> {
        let mut options = FindOptions::new().with_limit(1);
        options.projection = projection;

        let mut cursor = self.find(filter, options).await?;
        let document = cursor.next().await?;
        cursor.close().await;
        Ok(document)
    }

    /// Open a cursor over the documents matching `filter`.
    ///
    /// Lazy: nothing is fetched from the server until the cursor is first
    /// advanced. The cursor holds its connection lease until it is
    /// exhausted or closed.
    pub async fn find(&self, filter: Document, options: FindOptions) -> DriverResult<Cursor> {
        validate_filter(&filter)?;
        if let Some(projection) = &options.projection {
            validate_projection(projection)?;
        }
        if let Some(sort) = &options.sort {
            validate_sort(sort)?;
        }
        if options.limit.is_some_and(|limit| limit < 0) {
            return Err(DriverError::invalid_argument("limit must be non-negative"));
        }
        if options.skip.is_some_and(|skip| skip < 0) {
            return Err(DriverError::invalid_argument("skip must be non-negative"));
        }
        if options.batch_size.is_some_and(|batch| batch <= 0) {
            return Err(DriverError::invalid_argument("batch_size must be positive"));
        }

        let batch_size = options.batch_size;
        let command = Command::Find {
            collection: self.name.clone(),
            filter,
            projection: options.projection,
            sort: options.sort,
            limit: options.limit,
            skip: options.skip,
            batch_size,
        }
        .into_document(&self.db);

        let conn = self.pool.acquire(self.config.operation_timeout).await?;

        Ok(Cursor::new(
            conn,
            self.db.clone(),
            self.name.clone(),
            command,
            batch_size,
            self.config.operation_timeout,
        ))
    }

    /// Update the first document matching `filter`.
    pub async fn update_one(&self, filter: Document, update: Document) -> DriverResult<UpdateResult> {
        self.update(filter, update, false).await
    }

    /// Update every document matching `filter`.
    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> DriverResult<UpdateResult> {
        self.update(filter, update, true).await
    }

    async fn update(
        &self,
        filter: Document,
        update: Document,
        multi: bool,
    ) -> DriverResult<UpdateResult> {
        validate_filter(&filter)?;
        validate_update(&update)?;

        let reply = self
            .run(Command::Update {
                collection: self.name.clone(),
                filter,
                update,
                multi,
            })
            .await?;

        if !reply.is_ok() {
            return Err(DriverError::write(
                reply.error_code(),
                reply.error_message(),
            ));
        }

        Ok(UpdateResult {
            matched_count: reply.n().unwrap_or(0).max(0) as u64,
            modified_count: reply.n_modified().unwrap_or(0).max(0) as u64,
            acknowledged: true,
        })
    }

    /// Delete the first document matching `filter`.
    pub async fn delete_one(&self, filter: Document) -> DriverResult<DeleteResult> {
        self.delete(filter, false).await
    }

    /// Delete every document matching `filter`.
    pub async fn delete_many(&self, filter: Document) -> DriverResult<DeleteResult> {
        self.delete(filter, true).await
    }

    async fn delete(&self, filter: Document, many: bool) -> DriverResult<DeleteResult> {
        validate_filter(&filter)?;

        let reply = self
            .run(Command::Delete {
                collection: self.name.clone(),
                filter,
                many,
            })
            .await?;

        if !reply.is_ok() {
            return Err(DriverError::write(
                reply.error_code(),
                reply.error_message(),
            ));
        }

        Ok(DeleteResult {
            deleted_count: reply.n().unwrap_or(0).max(0) as u64,
            acknowledged: true,
        })
    }

    /// Count the documents matching `filter`.
    pub async fn count_documents(&self, filter: Document) -> DriverResult<u64> {
        validate_filter(&filter)?;

        let reply = self
            .run(Command::Count {
                collection: self.name.clone(),
                filter,
            })
            .await?;

        if !reply.is_ok() {
            return Err(DriverError::server(
                reply.error_code(),
                reply.error_message(),
            ));
        }

        Ok(reply.n().unwrap_or(0).max(0) as u64)
    }

    /// Acquire a connection and run one command on it.
    async fn run(&self, command: Command) -> DriverResult<crate::wire::Reply> {
        let timeout = self.config.operation_timeout;
        let mut conn = self.pool.acquire(timeout).await?;
        conn.roundtrip(command.into_document(&self.db), timeout).await
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("db", &self.db)
            .field("name", &self.name)
            .finish()
    }
}

/// Return the document's `_id`, generating one when absent.
fn ensure_id(document: &mut Document) -> Value {
    match document.get("_id") {
        Some(id) => id.clone(),
        None => {
            let id = Value::ObjectId(ObjectId::new());
            document.insert("_id", id.clone());
            id
        }
    }
}

/// Reject unknown query operators before anything hits the wire.
fn validate_filter(filter: &Document) -> DriverResult<()> {
    for (name, value) in filter.iter() {
        if name.starts_with('$') {
            return Err(DriverError::invalid_argument(format!(
                "unrecognized query operator: {}",
                name
            )));
        }

        if let Value::Document(spec) = value {
            if !spec.keys().any(|key| key.starts_with('$')) {
                // Plain nested document, matched literally.
                continue;
            }
            for (op, operand) in spec.iter() {
                if !QUERY_OPERATORS.contains(&op.as_str()) {
                    return Err(DriverError::invalid_argument(format!(
                        "unrecognized query operator: {}",
                        op
                    )));
                }
                if op == "$in" && !matches!(operand, Value::Array(_)) {
                    return Err(DriverError::invalid_argument("$in requires an array"));
                }
            }
        }
    }
    Ok(())
}

/// Reject anything that is not a known all-operator update document.
fn validate_update(update: &Document) -> DriverResult<()> {
    if update.is_empty() {
        return Err(DriverError::invalid_argument(
            "update document must not be empty",
        ));
    }
    for (op, operand) in update.iter() {
        if !op.starts_with('$') {
            return Err(DriverError::invalid_argument(
                "update must be an operator document ($set, $unset, $inc, $push)",
            ));
        }
        if !UPDATE_OPERATORS.contains(&op.as_str()) {
            return Err(DriverError::invalid_argument(format!(
                "unrecognized update operator: {}",
                op
            )));
        }
        match operand {
            Value::Document(fields) if !fields.is_empty() => {}
            _ => {
                return Err(DriverError::invalid_argument(format!(
                    "{} requires a non-empty document",
                    op
                )));
            }
        }
    }
    Ok(())
}

/// Inclusion and exclusion must not mix, `_id` excepted.
fn validate_projection(projection: &Document) -> DriverResult<()> {
    let mut mode: Option<bool> = None;
    for (name, value) in projection.iter() {
        let included = match value {
            Value::Int64(0) => false,
            Value::Int64(1) => true,
            Value::Boolean(flag) => *flag,
            _ => {
                return Err(DriverError::invalid_argument(format!(
                    "projection value for {} must be 0 or 1",
                    name
                )));
            }
        };

        if name == "_id" {
            continue;
        }
        match mode {
            None => mode = Some(included),
            Some(current) if current != included => {
                return Err(DriverError::invalid_argument(
                    "projection cannot mix inclusion and exclusion",
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Sort directions are 1 (ascending) or -1 (descending).
fn validate_sort(sort: &Document) -> DriverResult<()> {
    if sort.is_empty() {
        return Err(DriverError::invalid_argument(
            "sort document must not be empty",
        ));
    }
    for (name, value) in sort.iter() {
        match value {
            Value::Int64(1) | Value::Int64(-1) => {}
            _ => {
                return Err(DriverError::invalid_argument(format!(
                    "sort direction for {} must be 1 or -1",
                    name
                )));
            }
        }
    }
    Ok(())
}
