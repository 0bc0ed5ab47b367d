//! In-process mock DocStore server.
//!
//! Speaks the crate's own wire protocol over a local TCP listener, backed
//! by an in-memory store. Enough command coverage for the integration
//! suite: ping, insert, find (filter/sort/skip/limit/projection/batching),
//! getMore, killCursors, update, delete and count.

#![allow(dead_code)]

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder};

use docstore_driver::wire::{Frame, FrameCodec, OP_COMMAND};
use docstore_driver::{Document, Value};

/// Shared server state.
struct ServerState {
    /// namespace ("db.collection") to stored documents
    collections: Mutex<HashMap<String, Vec<Document>>>,
    /// open cursor id to remaining documents
    cursors: Mutex<HashMap<i64, Vec<Document>>>,
    /// command names in arrival order
    commands: Mutex<Vec<String>>,
    next_cursor_id: AtomicI64,
    current_connections: AtomicUsize,
    peak_connections: AtomicUsize,
}

/// A mock server listening on a random local port.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    /// Start the server.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(ServerState {
            collections: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            next_cursor_id: AtomicI64::new(1000),
            current_connections: AtomicUsize::new(0),
            peak_connections: AtomicUsize::new(0),
        });

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let current = state.current_connections.fetch_add(1, Ordering::SeqCst) + 1;
                    state.peak_connections.fetch_max(current, Ordering::SeqCst);
                    let _ = serve_connection(stream, &state).await;
                    state.current_connections.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    /// Client URI for this server.
    pub fn uri(&self) -> String {
        format!("docstore://{}", self.addr)
    }

    /// Highest number of simultaneously open connections observed.
    pub fn peak_connections(&self) -> usize {
        self.state.peak_connections.load(Ordering::SeqCst)
    }

    /// Currently open connections.
    pub fn current_connections(&self) -> usize {
        self.state.current_connections.load(Ordering::SeqCst)
    }

    /// Number of open server-side cursors.
    pub fn open_cursors(&self) -> usize {
        self.state.cursors.lock().len()
    }

    /// Command names received so far, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Frame loop for one client connection.
async fn serve_connection(mut stream: TcpStream, state: &ServerState) -> std::io::Result<()> {
    let mut codec = FrameCodec::new();
    let mut read_buf = BytesMut::with_capacity(8192);
    let mut write_buf = BytesMut::with_capacity(8192);

    loop {
        let frame = loop {
            match codec.decode(&mut read_buf) {
                Ok(Some(frame)) => break frame,
                Ok(None) => {}
                Err(_) => return Ok(()),
            }
            let n = stream.read_buf(&mut read_buf).await?;
            if n == 0 {
                return Ok(());
            }
        };

        if frame.opcode != OP_COMMAND {
            return Ok(());
        }

        let reply = handle_command(state, frame.body);
        write_buf.clear();
        if codec
            .encode(Frame::reply(frame.correlation_id, reply), &mut write_buf)
            .is_err()
        {
            return Ok(());
        }
        stream.write_all(&write_buf).await?;
    }
}

/// Dispatch one command document to its handler.
fn handle_command(state: &ServerState, body: Document) -> Document {
    let Some(name) = body.keys().next().cloned() else {
        return error_reply(59, "empty command");
    };
    state.commands.lock().push(name.clone());
    let db = body.get_str("$db").unwrap_or("test").to_string();

    match name.as_str() {
        "ping" => {
            let mut reply = Document::new();
            reply.insert("ok", 1);
            reply
        }
        "insert" => handle_insert(state, &db, &body),
        "find" => handle_find(state, &db, &body),
        "getMore" => handle_get_more(state, &body),
        "killCursors" => handle_kill_cursors(state, &body),
        "update" => handle_update(state, &db, &body),
        "delete" => handle_delete(state, &db, &body),
        "count" => handle_count(state, &db, &body),
        other => error_reply(59, &format!("no such command: {}", other)),
    }
}

fn error_reply(code: i64, message: &str) -> Document {
    let mut reply = Document::new();
    reply.insert("ok", 0);
    reply.insert("code", code);
    reply.insert("errmsg", message);
    reply
}

fn namespace(db: &str, collection: &str) -> String {
    format!("{}.{}", db, collection)
}

fn handle_insert(state: &ServerState, db: &str, body: &Document) -> Document {
    let collection = body.get_str("insert").unwrap_or_default().to_string();
    let ordered = body.get_bool("ordered").unwrap_or(true);
    let documents: Vec<Document> = body
        .get_array("documents")
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_document)
        .cloned()
        .collect();

    let ns = namespace(db, &collection);
    let mut collections = state.collections.lock();
    let stored = collections.entry(ns).or_default();

    let mut inserted = 0i64;
    let mut write_errors: Vec<Value> = Vec::new();

    for (index, document) in documents.into_iter().enumerate() {
        let id = document.get("_id");
        let duplicate = id
            .map(|id| stored.iter().any(|existing| existing.get("_id") == Some(id)))
            .unwrap_or(false);

        if duplicate {
            let mut detail = Document::new();
            detail.insert("index", index as i64);
            detail.insert("code", 11000);
            detail.insert("errmsg", "duplicate key");
            write_errors.push(Value::Document(detail));
            if ordered {
                break;
            }
            continue;
        }

        stored.push(document);
        inserted += 1;
    }

    let mut reply = Document::new();
    reply.insert("ok", 1);
    reply.insert("n", inserted);
    if !write_errors.is_empty() {
        reply.insert("writeErrors", write_errors);
    }
    reply
}

fn handle_find(state: &ServerState, db: &str, body: &Document) -> Document {
    let collection = body.get_str("find").unwrap_or_default();
    let empty = Document::new();
    let filter = body.get_document("filter").unwrap_or(&empty);

    let ns = namespace(db, collection);
    let mut results: Vec<Document> = {
        let collections = state.collections.lock();
        collections
            .get(&ns)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|document| matches(document, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    };

    if let Some(sort) = body.get_document("sort") {
        sort_documents(&mut results, sort);
    }
    if let Some(skip) = body.get_i64("skip") {
        results.drain(..results.len().min(skip.max(0) as usize));
    }
    if let Some(limit) = body.get_i64("limit") {
        results.truncate(limit.max(0) as usize);
    }
    if let Some(projection) = body.get_document("projection") {
        results = results
            .iter()
            .map(|document| project(document, projection))
            .collect();
    }

    let batch_size = body.get_i64("batchSize").map(|b| b.max(0) as usize);
    let (first_batch, remainder) = split_batch(results, batch_size);

    let cursor_id = if remainder.is_empty() {
        0
    } else {
        let id = state.next_cursor_id.fetch_add(1, Ordering::SeqCst);
        state.cursors.lock().insert(id, remainder);
        id
    };

    cursor_reply(cursor_id, "firstBatch", first_batch)
}

fn handle_get_more(state: &ServerState, body: &Document) -> Document {
    let id = body.get_i64("getMore").unwrap_or(0);
    let batch_size = body.get_i64("batchSize").map(|b| b.max(0) as usize);

    let mut cursors = state.cursors.lock();
    let Some(remaining) = cursors.remove(&id) else {
        return error_reply(43, "cursor not found");
    };

    let (batch, remainder) = split_batch(remaining, batch_size);
    let reply_id = if remainder.is_empty() {
        0
    } else {
        cursors.insert(id, remainder);
        id
    };

    cursor_reply(reply_id, "nextBatch", batch)
}

fn handle_kill_cursors(state: &ServerState, body: &Document) -> Document {
    let mut cursors = state.cursors.lock();
    for id in body.get_array("cursors").unwrap_or_default() {
        if let Some(id) = id.as_i64() {
            cursors.remove(&id);
        }
    }
    let mut reply = Document::new();
    reply.insert("ok", 1);
    reply
}

fn handle_update(state: &ServerState, db: &str, body: &Document) -> Document {
    let collection = body.get_str("update").unwrap_or_default();
    let Some(spec) = body
        .get_array("updates")
        .and_then(|updates| updates.first())
        .and_then(Value::as_document)
    else {
        return error_reply(9, "missing update spec");
    };

    let empty = Document::new();
    let filter = spec.get_document("q").unwrap_or(&empty);
    let update = spec.get_document("u").unwrap_or(&empty);
    let multi = spec.get_bool("multi").unwrap_or(false);

    let ns = namespace(db, collection);
    let mut collections = state.collections.lock();
    let stored = collections.entry(ns).or_default();

    let mut matched = 0i64;
    let mut modified = 0i64;
    for document in stored.iter_mut() {
        if !matches(document, filter) {
            continue;
        }
        matched += 1;
        if apply_update(document, update) {
            modified += 1;
        }
        if !multi {
            break;
        }
    }

    let mut reply = Document::new();
    reply.insert("ok", 1);
    reply.insert("n", matched);
    reply.insert("nModified", modified);
    reply
}

fn handle_delete(state: &ServerState, db: &str, body: &Document) -> Document {
    let collection = body.get_str("delete").unwrap_or_default();
    let Some(spec) = body
        .get_array("deletes")
        .and_then(|deletes| deletes.first())
        .and_then(Value::as_document)
    else {
        return error_reply(9, "missing delete spec");
    };

    let empty = Document::new();
    let filter = spec.get_document("q").unwrap_or(&empty);
    let limit = spec.get_i64("limit").unwrap_or(0);

    let ns = namespace(db, collection);
    let mut collections = state.collections.lock();
    let stored = collections.entry(ns).or_default();

    let mut deleted = 0i64;
    stored.retain(|document| {
        if limit == 1 && deleted == 1 {
            return true;
        }
        if matches(document, filter) {
            deleted += 1;
            false
        } else {
            true
        }
    });

    let mut reply = Document::new();
    reply.insert("ok", 1);
    reply.insert("n", deleted);
    reply
}

fn handle_count(state: &ServerState, db: &str, body: &Document) -> Document {
    let collection = body.get_str("count").unwrap_or_default();
    let empty = Document::new();
    let filter = body.get_document("query").unwrap_or(&empty);

    let ns = namespace(db, collection);
    let collections = state.collections.lock();
    let count = collections
        .get(&ns)
        .map(|stored| {
            stored
                .iter()
                .filter(|document| matches(document, filter))
                .count()
        })
        .unwrap_or(0);

    let mut reply = Document::new();
    reply.insert("ok", 1);
    reply.insert("n", count as i64);
    reply
}

fn cursor_reply(id: i64, batch_field: &str, batch: Vec<Document>) -> Document {
    let mut cursor = Document::new();
    cursor.insert("id", id);
    cursor.insert(
        batch_field,
        batch.into_iter().map(Value::Document).collect::<Vec<_>>(),
    );

    let mut reply = Document::new();
    reply.insert("ok", 1);
    reply.insert("cursor", cursor);
    reply
}

fn split_batch(
    mut documents: Vec<Document>,
    batch_size: Option<usize>,
) -> (Vec<Document>, Vec<Document>) {
    match batch_size {
        Some(size) if size < documents.len() => {
            let remainder = documents.split_off(size);
            (documents, remainder)
        }
        _ => (documents, Vec::new()),
    }
}

/// Resolve a dotted field path.
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut current = document;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            return current.get(part);
        }
        current = current.get_document(part)?;
    }
    None
}

/// Evaluate a filter against a document.
fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(path, condition)| {
        let actual = lookup(document, path);
        match condition {
            Value::Document(spec) if spec.keys().any(|key| key.starts_with('$')) => spec
                .iter()
                .all(|(op, operand)| apply_operator(actual, op, operand)),
            expected => actual == Some(expected),
        }
    })
}

fn apply_operator(actual: Option<&Value>, op: &str, operand: &Value) -> bool {
    match op {
        "$ne" => actual != Some(operand),
        "$in" => operand
            .as_array()
            .map(|candidates| candidates.iter().any(|candidate| actual == Some(candidate)))
            .unwrap_or(false),
        "$gt" => matches!(compare(actual, operand), Some(CmpOrdering::Greater)),
        "$gte" => matches!(
            compare(actual, operand),
            Some(CmpOrdering::Greater) | Some(CmpOrdering::Equal)
        ),
        "$lt" => matches!(compare(actual, operand), Some(CmpOrdering::Less)),
        "$lte" => matches!(
            compare(actual, operand),
            Some(CmpOrdering::Less) | Some(CmpOrdering::Equal)
        ),
        _ => false,
    }
}

/// Order two values of comparable type.
fn compare(actual: Option<&Value>, expected: &Value) -> Option<CmpOrdering> {
    let actual = actual?;
    match (actual, expected) {
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::Int64(_), Value::Double(_))
        | (Value::Double(_), Value::Int64(_))
        | (Value::Double(_), Value::Double(_)) => {
            actual.as_f64()?.partial_cmp(&expected.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (field, direction) in sort.iter() {
            let left = lookup(a, field);
            let right = lookup(b, field);
            let order = match (left, right) {
                (None, None) => CmpOrdering::Equal,
                (None, Some(_)) => CmpOrdering::Less,
                (Some(_), None) => CmpOrdering::Greater,
                (Some(x), Some(y)) => compare(Some(x), y).unwrap_or(CmpOrdering::Equal),
            };
            let order = if direction.as_i64() == Some(-1) {
                order.reverse()
            } else {
                order
            };
            if order != CmpOrdering::Equal {
                return order;
            }
        }
        CmpOrdering::Equal
    });
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Int64(n) => *n != 0,
        Value::Boolean(flag) => *flag,
        _ => false,
    }
}

/// Apply a projection to one document.
fn project(document: &Document, projection: &Document) -> Document {
    let inclusion = projection
        .iter()
        .any(|(name, value)| name != "_id" && truthy(value));

    let mut result = Document::new();
    if inclusion {
        let id_excluded = projection
            .get("_id")
            .map(|value| !truthy(value))
            .unwrap_or(false);
        if !id_excluded {
            if let Some(id) = document.get("_id") {
                result.insert("_id", id.clone());
            }
        }
        for (name, value) in document.iter() {
            if name != "_id" && projection.get(name).map(truthy).unwrap_or(false) {
                result.insert(name.clone(), value.clone());
            }
        }
    } else {
        for (name, value) in document.iter() {
            let excluded = projection.get(name).map(|flag| !truthy(flag)).unwrap_or(false);
            if !excluded {
                result.insert(name.clone(), value.clone());
            }
        }
    }
    result
}

/// Apply an operator update in place, reporting whether the document changed.
fn apply_update(document: &mut Document, update: &Document) -> bool {
    let mut changed = false;

    for (op, operand) in update.iter() {
        let Some(fields) = operand.as_document() else {
            continue;
        };
        match op.as_str() {
            "$set" => {
                for (name, value) in fields.iter() {
                    if document.get(name) != Some(value) {
                        document.insert(name.clone(), value.clone());
                        changed = true;
                    }
                }
            }
            "$unset" => {
                for (name, _) in fields.iter() {
                    if document.remove(name).is_some() {
                        changed = true;
                    }
                }
            }
            "$inc" => {
                for (name, delta) in fields.iter() {
                    let current = document.get(name);
                    let next = match (current, delta) {
                        (Some(Value::Int64(a)), Value::Int64(b)) => Value::Int64(a + b),
                        (Some(current), delta) => match (current.as_f64(), delta.as_f64()) {
                            (Some(a), Some(b)) => Value::Double(a + b),
                            _ => continue,
                        },
                        (None, delta) => delta.clone(),
                    };
                    document.insert(name.clone(), next);
                    changed = true;
                }
            }
            "$push" => {
                for (name, value) in fields.iter() {
                    let mut items = document
                        .get_array(name)
                        .map(<[Value]>::to_vec)
                        .unwrap_or_default();
                    items.push(value.clone());
                    document.insert(name.clone(), items);
                    changed = true;
                }
            }
            _ => {}
        }
    }

    changed
}
