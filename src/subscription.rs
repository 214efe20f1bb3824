// Live subscriptions to a task query

use crate::query::TaskQuery;
use crate::task::Snapshot;
use tokio::sync::watch;

/// A live view of one query's result set
///
/// The first call to [`Subscription::next`] yields the current snapshot right away;
/// later calls wait for the store to publish a new one. Snapshots published while
/// the consumer is busy are coalesced, so `next` always returns the latest state.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    query: TaskQuery,
    rx: watch::Receiver<Snapshot>,
    primed: bool,
}

impl Subscription {
    pub(crate) fn new(query: TaskQuery, rx: watch::Receiver<Snapshot>) -> Self {
        Self {
            query,
            rx,
            primed: false,
        }
    }

    /// Which query this subscription follows
    pub fn query(&self) -> TaskQuery {
        self.query
    }

    /// Latest published snapshot, without waiting
    pub fn current(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot
    ///
    /// Returns `None` once every handle to the store has been dropped.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }

        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Whether a snapshot newer than the last one returned by `next` is waiting
    pub fn has_changed(&self) -> bool {
        !self.primed || self.rx.has_changed().unwrap_or(false)
    }
}
