//! Multi-Version Concurrency Control (MVCC) metadata for indexed rows.
//!
//! This crate centralizes the commit-id and transaction-id vocabulary, the
//! per-row version metadata, the snapshot visibility rule, and the writer
//! compare-exchange lock. The index itself has no independent view of the
//! base table: the host consults this oracle to decide which rows' (LHS,RHS)
//! pairs to feed the validator, and the validator answer is correct exactly
//! relative to what was fed.
//!
//! Commit-id generation, transaction status tracking, and commit/rollback
//! remain the host transaction manager's job.

use std::sync::atomic::{AtomicU64, Ordering};

/// Commit identifier defining the consistent view a transaction reads.
pub type Cid = u64;

/// Transaction identifier. Non-zero for live transactions.
pub type Tid = u64;

/// Sentinel commit id: "never ended" on `end_cid`, "not yet committed" on
/// `begin_cid`. A row with `begin_cid == MAX_CID` is invisible to every
/// snapshot.
pub const MAX_CID: Cid = Cid::MAX;

/// Sentinel transaction id meaning "no writer holds this row".
pub const TID_ZERO: Tid = 0;

/// Host-supplied transaction context.
///
/// The index never calls commit or rollback; the host feeds the validator
/// only the pairs it considers committed-for-validation.
pub trait TransactionContext {
    /// Unique non-zero id of the transaction.
    fn transaction_id(&self) -> Tid;

    /// The commit id this transaction reads at.
    fn snapshot_cid(&self) -> Cid;
}

/// Transaction metadata captured when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// The unique id assigned to this transaction.
    pub tid: Tid,
    /// The commit id visible to this transaction.
    pub cid: Cid,
}

impl TransactionContext for Snapshot {
    fn transaction_id(&self) -> Tid {
        self.tid
    }

    fn snapshot_cid(&self) -> Cid {
        self.cid
    }
}

/// Version metadata for a single row.
///
/// A row is visible to a snapshot `s` iff `begin_cid <= s < end_cid`.
/// `writer_tid` is the row-level writer slot: at most one transaction id
/// other than [`TID_ZERO`] occupies it at any time.
#[derive(Debug)]
pub struct VersionMeta {
    begin_cid: AtomicU64,
    end_cid: AtomicU64,
    writer_tid: AtomicU64,
}

impl VersionMeta {
    /// A fresh row: not yet committed, never ended, unlocked.
    pub fn new() -> Self {
        Self {
            begin_cid: AtomicU64::new(MAX_CID),
            end_cid: AtomicU64::new(MAX_CID),
            writer_tid: AtomicU64::new(TID_ZERO),
        }
    }
}

impl Default for VersionMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-row version metadata for one chunk of rows.
///
/// Readers may probe visibility concurrently with the host's commit writes;
/// all fields are atomics and the writer slot is a linearizable
/// compare-exchange.
#[derive(Debug, Default)]
pub struct VersionStore {
    rows: Vec<VersionMeta>,
}

impl VersionStore {
    /// Metadata for `row_count` rows, all initially invisible and unlocked.
    pub fn with_row_count(row_count: usize) -> Self {
        let mut rows = Vec::with_capacity(row_count);
        rows.resize_with(row_count, VersionMeta::new);
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get_begin_cid(&self, offset: usize) -> Cid {
        self.rows[offset].begin_cid.load(Ordering::SeqCst)
    }

    pub fn get_end_cid(&self, offset: usize) -> Cid {
        self.rows[offset].end_cid.load(Ordering::SeqCst)
    }

    pub fn get_writer_tid(&self, offset: usize) -> Tid {
        self.rows[offset].writer_tid.load(Ordering::SeqCst)
    }

    /// Host-only: stamp the creating commit id during commit processing.
    pub fn set_begin_cid(&self, offset: usize, cid: Cid) {
        self.rows[offset].begin_cid.store(cid, Ordering::SeqCst);
    }

    /// Host-only: stamp the ending commit id during commit processing.
    pub fn set_end_cid(&self, offset: usize, cid: Cid) {
        self.rows[offset].end_cid.store(cid, Ordering::SeqCst);
    }

    /// Snapshot visibility: `begin_cid <= snapshot_cid < end_cid`.
    pub fn is_visible(&self, offset: usize, snapshot_cid: Cid) -> bool {
        let begin = self.get_begin_cid(offset);
        let end = self.get_end_cid(offset);
        let visible = begin <= snapshot_cid && end > snapshot_cid;
        tracing::trace!(
            offset,
            begin_cid = begin,
            end_cid = end,
            snapshot_cid,
            visible,
            "visibility check"
        );
        visible
    }

    /// Atomically swing `writer_tid` from `expected` to `new_tid`.
    ///
    /// Returns `false` when another transaction holds the slot. Passing
    /// `expected = TID_ZERO` acquires the writer lock.
    pub fn compare_exchange_writer_tid(&self, offset: usize, expected: Tid, new_tid: Tid) -> bool {
        self.rows[offset]
            .writer_tid
            .compare_exchange(expected, new_tid, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Acquire the writer slot for `tid`; fails if any other writer holds it.
    pub fn try_lock(&self, offset: usize, tid: Tid) -> bool {
        self.compare_exchange_writer_tid(offset, TID_ZERO, tid)
    }

    /// Release the writer slot unconditionally.
    pub fn unlock(&self, offset: usize) {
        self.rows[offset].writer_tid.store(TID_ZERO, Ordering::SeqCst);
    }
}
