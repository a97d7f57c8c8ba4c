//! Pending invocation table.
//!
//! Each invocation owns two correlation ids. The success id holds the
//! one-shot sender; the failure id points back at it. Settling either id
//! removes both, so a later frame carrying the other id is inert.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tokio::sync::oneshot;

use crate::codec::SafeValue;
use crate::identifiers::CorrelationId;

// ============================================================================
// Types
// ============================================================================

/// Raw outcome delivered to a waiting caller: `Ok(result)` or `Err(error)`.
pub(crate) type Settlement = Result<SafeValue, SafeValue>;

/// One side of a pending invocation.
enum Resolver {
    /// Resolves the caller.
    Success {
        error_id: CorrelationId,
        tx: oneshot::Sender<Settlement>,
    },
    /// Rejects the caller through its success entry.
    Failure { result_id: CorrelationId },
}

// ============================================================================
// PendingTable
// ============================================================================

/// Correlation ids awaiting an inbound frame.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: FxHashMap<CorrelationId, Resolver>,
}

impl PendingTable {
    /// Allocates a fresh id pair with random ids.
    pub(crate) fn register(
        &mut self,
    ) -> (CorrelationId, CorrelationId, oneshot::Receiver<Settlement>) {
        self.register_with(CorrelationId::random)
    }

    /// Allocates a fresh id pair drawing from `draw`.
    ///
    /// Ids already pending are redrawn, and the two ids always differ.
    pub(crate) fn register_with(
        &mut self,
        mut draw: impl FnMut() -> CorrelationId,
    ) -> (CorrelationId, CorrelationId, oneshot::Receiver<Settlement>) {
        let result_id = self.fresh_id(&mut draw, None);
        let error_id = self.fresh_id(&mut draw, Some(result_id));
        let (tx, rx) = oneshot::channel();

        self.entries
            .insert(result_id, Resolver::Success { error_id, tx });
        self.entries
            .insert(error_id, Resolver::Failure { result_id });

        (result_id, error_id, rx)
    }

    fn fresh_id(
        &self,
        draw: &mut impl FnMut() -> CorrelationId,
        avoid: Option<CorrelationId>,
    ) -> CorrelationId {
        loop {
            let id = draw();
            if Some(id) != avoid && !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    /// Settles the invocation owning `id` with `payload`.
    ///
    /// Returns `false` if no invocation owns `id`.
    pub(crate) fn settle(&mut self, id: CorrelationId, payload: SafeValue) -> bool {
        let Some(resolver) = self.entries.remove(&id) else {
            return false;
        };

        match resolver {
            Resolver::Success { error_id, tx } => {
                self.entries.remove(&error_id);
                let _ = tx.send(Ok(payload));
            }
            Resolver::Failure { result_id } => {
                if let Some(Resolver::Success { tx, .. }) = self.entries.remove(&result_id) {
                    let _ = tx.send(Err(payload));
                }
            }
        }
        true
    }

    /// Removes an invocation without settling it.
    ///
    /// Entries are only removed while they still belong to this exact pair.
    pub(crate) fn discard(&mut self, result_id: CorrelationId, error_id: CorrelationId) -> bool {
        let owns_result = matches!(
            self.entries.get(&result_id),
            Some(Resolver::Success { error_id: e, .. }) if *e == error_id
        );
        let owns_error = matches!(
            self.entries.get(&error_id),
            Some(Resolver::Failure { result_id: r }) if *r == result_id
        );

        if owns_result {
            self.entries.remove(&result_id);
        }
        if owns_error {
            self.entries.remove(&error_id);
        }
        owns_result || owns_error
    }

    /// Drops every invocation; waiting callers observe a closed channel.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.len();
        self.entries.clear();
        count
    }

    /// Number of outstanding invocations.
    pub(crate) fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|r| matches!(r, Resolver::Success { .. }))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: CorrelationId) -> bool {
        self.entries.contains_key(&id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn sequence(ids: &[u32]) -> impl FnMut() -> CorrelationId + '_ {
        let mut iter = ids.iter().copied();
        move || CorrelationId::new(iter.next().expect("id sequence exhausted"))
    }

    #[test]
    fn test_register_allocates_two_ids() {
        let mut table = PendingTable::default();
        let (result_id, error_id, _rx) = table.register();
        assert_ne!(result_id, error_id);
        assert!(table.contains(result_id));
        assert!(table.contains(error_id));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_colliding_ids_are_redrawn() {
        let mut table = PendingTable::default();
        let (r1, e1, _rx1) = table.register_with(sequence(&[1, 2]));
        assert_eq!((r1.as_u32(), e1.as_u32()), (1, 2));

        // 1 and 2 are taken, 3 is then drawn again for the error id.
        let (r2, e2, _rx2) = table.register_with(sequence(&[1, 2, 3, 3, 4]));
        assert_eq!((r2.as_u32(), e2.as_u32()), (3, 4));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_success_settles_once() {
        let mut table = PendingTable::default();
        let (result_id, error_id, mut rx) = table.register();

        assert!(table.settle(result_id, json!(42)));
        assert_eq!(rx.try_recv().expect("settled"), Ok(json!(42)));

        assert!(!table.settle(result_id, json!(43)));
        assert!(!table.settle(error_id, json!("late")));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_failure_rejects_and_removes_partner() {
        let mut table = PendingTable::default();
        let (result_id, error_id, mut rx) = table.register();

        assert!(table.settle(error_id, json!("boom")));
        assert_eq!(rx.try_recv().expect("settled"), Err(json!("boom")));
        assert!(!table.contains(result_id));
    }

    #[test]
    fn test_settle_with_dropped_receiver_still_consumes() {
        let mut table = PendingTable::default();
        let (result_id, _error_id, rx) = table.register();
        drop(rx);

        assert!(table.settle(result_id, json!(null)));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_discard_only_touches_own_pair() {
        let mut table = PendingTable::default();
        let (r1, e1, _rx1) = table.register_with(sequence(&[1, 2]));
        let (_r2, _e2, _rx2) = table.register_with(sequence(&[3, 4]));

        assert!(!table.discard(r1, CorrelationId::new(4)));
        assert_eq!(table.len(), 2);

        assert!(table.discard(r1, e1));
        assert!(!table.discard(r1, e1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_clear_closes_receivers() {
        let mut table = PendingTable::default();
        let (_r, _e, mut rx) = table.register();

        assert_eq!(table.clear(), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }
}
