//! Table of outstanding requests awaiting a response.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use dapwire_protocol::Response;

use crate::error::{ClientError, ClientResult, SessionEnd};

/// Completion handle for one outstanding request.
pub(crate) type Completion = oneshot::Sender<ClientResult<Response>>;

/// Receiving side of a [`Completion`].
pub(crate) type CompletionReceiver = oneshot::Receiver<ClientResult<Response>>;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<u64, Completion>,
    ended: Option<SessionEnd>,
}

/// Outstanding requests keyed by their `seq`.
///
/// Shared between the callers issuing requests and the transport loop that
/// resolves them. Once [`PendingTable::close`] has run the table refuses new
/// entries, so nothing can be registered after teardown and wait forever.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    inner: Mutex<Inner>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a completion for `seq`.
    ///
    /// A `seq` that is already outstanding is refused and its existing entry
    /// left alone.
    pub(crate) fn register(&self, seq: u64) -> ClientResult<CompletionReceiver> {
        let mut inner = self.lock();
        if let Some(ref end) = inner.ended {
            return Err(ClientError::SessionEnded(end.clone()));
        }
        match inner.entries.entry(seq) {
            Entry::Occupied(_) => Err(ClientError::SeqInUse(seq)),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Removes and returns the completion for `seq`, if any.
    pub(crate) fn take(&self, seq: u64) -> Option<Completion> {
        self.lock().entries.remove(&seq)
    }

    /// Drops the entry for `seq`. Returns true if one was present.
    pub(crate) fn evict(&self, seq: u64) -> bool {
        self.take(seq).is_some()
    }

    /// Marks the session as ended and fails every outstanding request.
    ///
    /// Returns how many requests were failed. Only the first call records
    /// the reason.
    pub(crate) fn close(&self, end: SessionEnd) -> usize {
        let (reason, drained): (SessionEnd, Vec<Completion>) = {
            let mut inner = self.lock();
            let reason = inner.ended.get_or_insert(end).clone();
            (reason, inner.entries.drain().map(|(_, tx)| tx).collect())
        };

        let count = drained.len();
        for tx in drained {
            // The caller may have given up already.
            let _ = tx.send(Err(ClientError::SessionEnded(reason.clone())));
        }
        count
    }

    /// Returns why the session ended, if it has.
    pub(crate) fn ended(&self) -> Option<SessionEnd> {
        self.lock().ended.clone()
    }

    /// Number of outstanding requests.
    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
