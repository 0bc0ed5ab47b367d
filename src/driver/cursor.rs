//! Server-paginated cursor.
//!
//! A [`Cursor`] is the lazy, finite, non-restartable sequence produced by a
//! find operation. It owns the connection lease for its whole life:
//!
//! ```text
//! Unopened --next()--> Open --server id 0, buffer drained--> Exhausted
//!     \                  \
//!      \--close()---------+--close()--> Closed
//! ```
//!
//! Nothing is fetched until the first `next()`. Exhaustion and close both
//! release the lease back to the pool; close additionally tells the server
//! to discard the remote cursor, best effort.

use std::collections::VecDeque;
use std::time::Duration;

use crate::document::Document;
use crate::wire::Command;

use super::error::{DriverError, DriverResult};
use super::pool::PooledConnection;

/// Cursor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Created; the find command has not been sent
    Unopened,
    /// First batch received; more may remain server-side
    Open,
    /// Every document has been yielded
    Exhausted,
    /// Closed by the caller
    Closed,
}

/// Lazy iteration over a find result set.
pub struct Cursor {
    conn: Option<PooledConnection>,
    db: String,
    collection: String,
    /// The find command, held unsent until the first advance
    pending_find: Option<Document>,
    /// Server-side cursor id; 0 means the server has nothing more
    cursor_id: i64,
    /// Locally buffered batch
    buffer: VecDeque<Document>,
    batch_size: Option<i64>,
    timeout: Duration,
    state: CursorState,
}

impl Cursor {
    pub(crate) fn new(
        conn: PooledConnection,
        db: String,
        collection: String,
        find_command: Document,
        batch_size: Option<i64>,
        timeout: Duration,
    ) -> Self {
        Self {
            conn: Some(conn),
            db,
            collection,
            pending_find: Some(find_command),
            cursor_id: 0,
            buffer: VecDeque::new(),
            batch_size,
            timeout,
            state: CursorState::Unopened,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Advance to the next document.
    ///
    /// Returns `Ok(None)` at end of sequence. The first call sends the find
    /// command; later calls fetch batches from the server as the local
    /// buffer drains.
    pub async fn next(&mut self) -> DriverResult<Option<Document>> {
        loop {
            if let Some(document) = self.buffer.pop_front() {
                return Ok(Some(document));
            }

            match self.state {
                CursorState::Exhausted | CursorState::Closed => return Ok(None),
                CursorState::Unopened => self.open().await?,
                CursorState::Open => {
                    if self.cursor_id == 0 {
                        self.finish();
                        return Ok(None);
                    }
                    self.fetch_more().await?;
                }
            }
        }
    }

    /// Drain the remaining documents into a vector.
    pub async fn to_vec(mut self) -> DriverResult<Vec<Document>> {
        let mut documents = Vec::new();
        while let Some(document) = self.next().await? {
            documents.push(document);
        }
        Ok(documents)
    }

    /// Close the cursor.
    ///
    /// Valid from any state. Tells the server to discard the remote cursor
    /// when one is open; a failed notification is logged, never raised. The
    /// connection lease is released either way.
    pub async fn close(&mut self) {
        if matches!(self.state, CursorState::Exhausted | CursorState::Closed) {
            return;
        }

        if self.cursor_id != 0 {
            let command = Command::KillCursors {
                collection: self.collection.clone(),
                cursor_ids: vec![self.cursor_id],
            }
            .into_document(&self.db);

            if let Some(conn) = self.conn.as_mut() {
                if let Err(error) = conn.roundtrip(command, self.timeout).await {
                    tracing::warn!(
                        cursor_id = self.cursor_id,
                        %error,
                        "failed to discard server-side cursor"
                    );
                }
            }
        }

        self.state = CursorState::Closed;
        self.buffer.clear();
        self.conn = None;
    }

    /// Send the stored find command and buffer the first batch.
    async fn open(&mut self) -> DriverResult<()> {
        let command = match self.pending_find.take() {
            Some(command) => command,
            None => return Err(self.fail(DriverError::protocol("cursor already opened"))),
        };
        self.exchange(command).await?;
        self.state = CursorState::Open;
        Ok(())
    }

    /// Fetch the next batch for the stored cursor id.
    async fn fetch_more(&mut self) -> DriverResult<()> {
        let command = Command::GetMore {
            collection: self.collection.clone(),
            cursor_id: self.cursor_id,
            batch_size: self.batch_size,
        }
        .into_document(&self.db);
        self.exchange(command).await
    }

    /// Run one command on the held lease and absorb the cursor reply.
    async fn exchange(&mut self, command: Document) -> DriverResult<()> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(self.fail(DriverError::protocol("cursor has no connection"))),
        };

        let reply = match conn.roundtrip(command, self.timeout).await {
            Ok(reply) => reply,
            Err(error) => return Err(self.fail(error)),
        };

        if !reply.is_ok() {
            let error = DriverError::server(reply.error_code(), reply.error_message());
            return Err(self.fail(error));
        }

        let (cursor_id, batch) = match reply.into_cursor() {
            Ok(parsed) => parsed,
            Err(error) => return Err(self.fail(error.into())),
        };

        self.cursor_id = cursor_id;
        self.buffer.extend(batch);
        Ok(())
    }

    /// Terminal failure: release the lease and refuse further use.
    fn fail(&mut self, error: DriverError) -> DriverError {
        self.state = CursorState::Closed;
        self.buffer.clear();
        self.conn = None;
        error
    }

    /// Clean exhaustion: release the lease.
    fn finish(&mut self) {
        self.state = CursorState::Exhausted;
        self.conn = None;
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        // The lease returns to the pool as `conn` drops. A still-open
        // remote cursor is left to the server's idle timeout.
        if self.conn.is_some() && self.cursor_id != 0 {
            tracing::debug!(
                cursor_id = self.cursor_id,
                "cursor dropped without close; leaving remote cursor to server timeout"
            );
        }
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("state", &self.state)
            .field("cursor_id", &self.cursor_id)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
