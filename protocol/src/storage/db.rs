//! # LedgerDb: Persistent Storage Engine
//!
//! The persistence layer for the vault host, built on sled's embedded
//! key-value store. Contracts themselves never serialize anything; the host
//! persists their state between calls, and all on-disk data flows through
//! this module.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                 | Value               |
//! |------------|---------------------|---------------------|
//! | `state`    | snapshot name (UTF-8) | `bincode(T)`      |
//! | `events`   | `seq` (8B BE)       | `bincode(E)`        |
//! | `metadata` | key (UTF-8)         | value (bytes)       |
//!
//! Event sequence numbers are stored as big-endian u64 so that sled's
//! lexicographic ordering matches numeric ordering, which makes range scans
//! over the log come back in commit order.
//!
//! ## Atomicity
//!
//! [`LedgerDb::commit`] writes the events of one committed call, the
//! advanced sequence counter, and the snapshots staged in a [`SnapshotSet`]
//! in a single transaction over all three trees. A crash leaves either the
//! whole call on disk or none of it. The snapshots are authoritative; the
//! event log is an audit trail.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Batch, Db, Transactional, Tree};
use std::path::Path;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the next event sequence number.
const META_NEXT_EVENT_SEQ: &[u8] = b"next_event_seq";

fn encode<T: Serialize + ?Sized>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode_seq(bytes: &[u8]) -> DbResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| DbError::Serialization("invalid sequence bytes".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

// ---------------------------------------------------------------------------
// SnapshotSet
// ---------------------------------------------------------------------------

/// Snapshots staged for one [`LedgerDb::commit`].
///
/// Values are encoded as they are staged, so an encoding failure surfaces
/// before anything touches the store.
#[derive(Debug, Default)]
pub struct SnapshotSet {
    batch: Batch,
    len: usize,
}

impl SnapshotSet {
    /// Stage `value` under `name`, replacing what the store holds there.
    pub fn put<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> DbResult<()> {
        self.batch.insert(name.as_bytes(), encode(value)?);
        self.len += 1;
        Ok(())
    }

    /// Number of snapshots staged.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent store for contract snapshots and the committed event log.
///
/// Generic over what it stores: snapshots are any `Serialize` type keyed by
/// name, events are any `Serialize` type keyed by sequence number. This
/// keeps the storage layer ignorant of contract types.
///
/// # Thread Safety
///
/// sled trees support concurrent reads and serialized writes, so a
/// `LedgerDb` can be cloned and shared freely.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    /// The underlying sled database handle.
    db: Db,
    /// Named contract snapshots.
    state: Tree,
    /// Committed events indexed by sequence number.
    events: Tree,
    /// Arbitrary key-value metadata.
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is cleaned up when dropped.
    ///
    /// Ideal for unit tests: no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let state = db.open_tree("state")?;
        let events = db.open_tree("events")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            state,
            events,
            metadata,
        })
    }

    // -- Snapshot operations ------------------------------------------------

    /// Persist a named snapshot, replacing any previous one.
    pub fn put_snapshot<T: Serialize>(&self, name: &str, value: &T) -> DbResult<()> {
        let bytes = encode(value)?;
        self.state.insert(name.as_bytes(), bytes)?;
        Ok(())
    }

    /// Load a named snapshot.
    ///
    /// Returns `None` if nothing was ever stored under `name`.
    pub fn get_snapshot<T: DeserializeOwned>(&self, name: &str) -> DbResult<Option<T>> {
        match self.state.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns `true` if a snapshot exists under `name`.
    pub fn has_snapshot(&self, name: &str) -> DbResult<bool> {
        Ok(self.state.contains_key(name.as_bytes())?)
    }

    // -- Event log ----------------------------------------------------------

    /// Append events to the log in order.
    ///
    /// Returns the sequence number assigned to the first event (equal to
    /// the previous event count when the slice is empty).
    pub fn append_events<E: Serialize>(&self, events: &[E]) -> DbResult<u64> {
        self.commit(events, &SnapshotSet::default())
    }

    /// Append `events` and write `snapshots` in one transaction.
    ///
    /// Either everything lands or nothing does. Returns the sequence number
    /// assigned to the first event, as [`append_events`](Self::append_events)
    /// does.
    pub fn commit<E: Serialize>(&self, events: &[E], snapshots: &SnapshotSet) -> DbResult<u64> {
        let first = self.next_event_seq()?;
        if events.is_empty() && snapshots.is_empty() {
            return Ok(first);
        }

        let mut batch = Batch::default();
        let mut seq = first;
        for event in events {
            batch.insert(&seq.to_be_bytes()[..], encode(event)?);
            seq += 1;
        }

        (&self.events, &self.metadata, &self.state)
            .transaction(|(events, metadata, state)| {
                events.apply_batch(&batch)?;
                metadata.insert(META_NEXT_EVENT_SEQ, &seq.to_be_bytes()[..])?;
                state.apply_batch(&snapshots.batch)?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => DbError::Sled(e),
                TransactionError::Abort(()) => {
                    DbError::Serialization("commit aborted".to_string())
                }
            })?;

        Ok(first)
    }

    /// Read up to `limit` events starting at sequence `from`, in order.
    pub fn events<E: DeserializeOwned>(&self, from: u64, limit: usize) -> DbResult<Vec<(u64, E)>> {
        let mut out = Vec::new();
        for result in self.events.range(from.to_be_bytes()..).take(limit) {
            let (key, value) = result?;
            out.push((decode_seq(&key)?, decode(&value)?));
        }
        Ok(out)
    }

    /// Sequence number the next appended event will receive.
    pub fn next_event_seq(&self) -> DbResult<u64> {
        match self.metadata.get(META_NEXT_EVENT_SEQ)? {
            Some(bytes) => decode_seq(&bytes),
            None => Ok(0),
        }
    }

    /// Number of events stored in the log.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    // -- Utility operations -------------------------------------------------

    /// Force a flush of all pending writes to disk.
    ///
    /// sled buffers writes in memory. This call blocks until all data is
    /// durable on the underlying storage device.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
