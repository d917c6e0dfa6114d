//! Atomic holder for the current record set.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::records::RecordSet;

/// Single-cell store for the published [`RecordSet`].
///
/// A query handler loads the current set once and uses that reference for
/// every lookup it performs, so one query always sees a consistent
/// generation. Publishing never blocks readers; readers never block the
/// refresh loop.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<ArcSwap<RecordSet>>,
}

impl RecordStore {
    /// Create a store holding the given initial set.
    pub fn new(initial: RecordSet) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Atomically replace the published record set.
    pub fn publish(&self, rs: RecordSet) {
        self.inner.store(Arc::new(rs));
    }

    /// The currently published record set.
    pub fn current(&self) -> Arc<RecordSet> {
        self.inner.load_full()
    }
}
