//! Consensus Rounds
//!
//! A round is one in-flight replication request:
//! - Carries the replicate message it was created for
//! - Tells its originator the outcome exactly once
//! - Optionally fenced to the leader term it was proposed in
//!
//! Round states are `Pending -> Notified`. The transition is a single
//! compare-and-set and the callback is `FnOnce`, taken out of its slot on
//! that transition, so a second notification cannot reach it. A round
//! dropped while still pending delivers an `Aborted` outcome instead.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use super::facade::{Consensus, ConsensusShared};
use super::errors::{ConsensusError, ConsensusResult};
use super::message::ReplicateMsgPtr;
use super::op_id::{OpId, Term};

/// Completion callback for a round.
///
/// Runs on whichever thread finishes replication. It must not block and must
/// not assume any lock held by the submitter.
///
/// A round dropped while pending runs its callback from `Drop`, on the thread
/// releasing the last handle and inside whatever critical section that thread
/// holds. That includes `PendingRounds::push` rejecting a round the caller
/// passed by value, so the callback must not take locks the engine may hold
/// around that call.
pub type ReplicatedCallback = Box<dyn FnOnce(ConsensusResult<()>) + Send + 'static>;

const PENDING: u8 = 0;
const NOTIFIED: u8 = 1;

/// Round lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Replication has not concluded
    Pending,
    /// Terminal: the outcome has been delivered
    Notified,
}

/// One tracked unit of proposed replication work.
pub struct ConsensusRound {
    /// Non-owning; never keeps the consensus alive.
    consensus: Weak<ConsensusShared>,
    replicate_msg: ReplicateMsgPtr,
    replicated_cb: Mutex<Option<ReplicatedCallback>>,
    has_callback: bool,
    state: AtomicU8,
    bound_term: OnceLock<Term>,
}

impl ConsensusRound {
    /// Create a round that reports its outcome to `replicated_cb`.
    pub fn new(
        consensus: &Consensus,
        replicate_msg: ReplicateMsgPtr,
        replicated_cb: ReplicatedCallback,
    ) -> Self {
        Self::from_parts(consensus.downgrade(), replicate_msg, Some(replicated_cb))
    }

    /// Create a fire-and-forget round. `ReplicateMsgPtr` cannot be null, so
    /// the round always carries a payload.
    pub fn without_callback(consensus: &Consensus, replicate_msg: ReplicateMsgPtr) -> Self {
        Self::from_parts(consensus.downgrade(), replicate_msg, None)
    }

    pub(crate) fn from_parts(
        consensus: Weak<ConsensusShared>,
        replicate_msg: ReplicateMsgPtr,
        replicated_cb: Option<ReplicatedCallback>,
    ) -> Self {
        if let Some(shared) = consensus.upgrade() {
            shared.metrics().increment_rounds_created();
        }
        Self {
            consensus,
            replicate_msg,
            has_callback: replicated_cb.is_some(),
            replicated_cb: Mutex::new(replicated_cb),
            state: AtomicU8::new(PENDING),
            bound_term: OnceLock::new(),
        }
    }

    /// The message this round replicates.
    pub fn replicate_msg(&self) -> &ReplicateMsgPtr {
        &self.replicate_msg
    }

    /// Log position of the message, once assigned.
    pub fn id(&self) -> Option<OpId> {
        self.replicate_msg.id()
    }

    pub fn has_callback(&self) -> bool {
        self.has_callback
    }

    pub fn state(&self) -> RoundState {
        match self.state.load(Ordering::Acquire) {
            PENDING => RoundState::Pending,
            _ => RoundState::Notified,
        }
    }

    pub fn is_notified(&self) -> bool {
        self.state() == RoundState::Notified
    }

    /// The leader term this round is fenced to, if any.
    pub fn bound_term(&self) -> Option<Term> {
        self.bound_term.get().copied()
    }

    /// Fence this round to `term`.
    ///
    /// The fence is immutable once set. Binding again to the same term is a
    /// no-op; binding to another term or after notification is rejected.
    ///
    /// Serialized with `notify_replication_finished` through the callback
    /// slot lock, so a successful bind always precedes notification.
    pub fn bind_to_term(&self, term: Term) -> ConsensusResult<()> {
        let _slot = self.lock_callback_slot();
        if self.is_notified() {
            return Err(ConsensusError::illegal_state(format!(
                "cannot bind round {} to term {} after replication finished",
                self.describe_id(),
                term
            )));
        }

        let bound = *self.bound_term.get_or_init(|| term);
        if bound != term {
            return Err(ConsensusError::illegal_state(format!(
                "round {} is already bound to term {}, cannot rebind to term {}",
                self.describe_id(),
                bound,
                term
            )));
        }
        Ok(())
    }

    /// Check the term fence against the term the engine currently holds.
    ///
    /// Call immediately before letting the round reach commit, with a
    /// freshly read `current_term`, never the term at proposal time.
    ///
    /// Only reads the fence. Counting and logging aborts is up to the caller
    /// acting on the result.
    pub fn check_bound_term(&self, current_term: Term) -> ConsensusResult<()> {
        match self.bound_term.get() {
            Some(&bound) if bound != current_term => Err(ConsensusError::aborted(format!(
                "Operation submitted in term {} cannot be replicated in term {}",
                bound, current_term
            ))),
            _ => Ok(()),
        }
    }

    /// Deliver the terminal outcome of this round.
    ///
    /// Without a callback this only marks the round notified. Calls after the
    /// first are ignored and counted in `double_notifications`.
    pub fn notify_replication_finished(&self, status: ConsensusResult<()>) {
        let callback = {
            let mut slot = self.lock_callback_slot();
            if self
                .state
                .compare_exchange(PENDING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                drop(slot);
                if let Some(shared) = self.consensus.upgrade() {
                    shared.metrics().increment_double_notifications();
                }
                return;
            }
            slot.take()
        };

        if let Some(shared) = self.consensus.upgrade() {
            shared.metrics().increment_rounds_notified();
        }
        if let Some(callback) = callback {
            callback(status);
        }
    }

    /// Handle to the consensus that created this round.
    ///
    /// Fails cleanly if that consensus has already been dropped.
    pub fn consensus(&self) -> ConsensusResult<Consensus> {
        self.consensus
            .upgrade()
            .map(Consensus::from_shared)
            .ok_or_else(|| {
                ConsensusError::consensus_dropped(format!(
                    "consensus owning round {} no longer exists",
                    self.describe_id()
                ))
            })
    }

    // Never held while a callback runs.
    fn lock_callback_slot(&self) -> MutexGuard<'_, Option<ReplicatedCallback>> {
        self.replicated_cb
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn describe_id(&self) -> String {
        self.id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unassigned".to_string())
    }
}

impl Drop for ConsensusRound {
    fn drop(&mut self) {
        if *self.state.get_mut() != PENDING {
            return;
        }
        *self.state.get_mut() = NOTIFIED;
        let callback = self
            .replicated_cb
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(callback) = callback {
            callback(Err(ConsensusError::aborted(
                "round dropped before replication finished",
            )));
        }
    }
}

impl fmt::Debug for ConsensusRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsensusRound")
            .field("id", &self.id())
            .field("op_type", &self.replicate_msg.op_type())
            .field("state", &self.state())
            .field("bound_term", &self.bound_term())
            .field("has_callback", &self.has_callback)
            .finish()
    }
}

/// Convenience for code that holds rounds behind `Arc`.
pub type ConsensusRoundPtr = Arc<ConsensusRound>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsensusConfig;
    use crate::consensus::errors::ConsensusErrorKind;
    use crate::consensus::message::{OperationType, ReplicateMessage};
    use std::sync::atomic::AtomicUsize;

    fn consensus() -> Consensus {
        Consensus::new(ConsensusConfig::new("tablet-round")).unwrap()
    }

    fn msg(term: Term, index: u64) -> ReplicateMsgPtr {
        ReplicateMessage::new(OperationType::Write, b"row".to_vec())
            .with_id(OpId::new(term, index))
            .into_ptr()
    }

    type Seen = Arc<Mutex<Vec<ConsensusResult<()>>>>;

    fn counting_callback() -> (ReplicatedCallback, Arc<AtomicUsize>, Seen) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (c, s) = (Arc::clone(&calls), Arc::clone(&seen));
        let cb: ReplicatedCallback = Box::new(move |status| {
            c.fetch_add(1, Ordering::SeqCst);
            s.lock().unwrap().push(status);
        });
        (cb, calls, seen)
    }

    #[test]
    fn test_notify_without_callback_is_noop() {
        let consensus = consensus();
        let round = ConsensusRound::without_callback(&consensus, msg(1, 1));
        assert!(!round.has_callback());

        round.notify_replication_finished(Err(ConsensusError::network_error("peer down")));
        assert!(round.is_notified());
    }

    #[test]
    fn test_notify_invokes_callback_once_with_status() {
        let consensus = consensus();
        let (cb, calls, seen) = counting_callback();
        let round = ConsensusRound::new(&consensus, msg(1, 1), cb);

        round.notify_replication_finished(Ok(()));
        round.notify_replication_finished(Err(ConsensusError::aborted("late")));

        let expected: Vec<ConsensusResult<()>> = vec![Ok(())];
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), expected);
        assert_eq!(consensus.metrics().snapshot().double_notifications, 1);
        assert_eq!(consensus.metrics().snapshot().rounds_notified, 1);
    }

    #[test]
    fn test_concurrent_notify_fires_once() {
        let consensus = consensus();
        let (cb, calls, _) = counting_callback();
        let round = Arc::new(ConsensusRound::new(&consensus, msg(1, 1), cb));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let round = Arc::clone(&round);
                std::thread::spawn(move || round.notify_replication_finished(Ok(())))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unbound_round_passes_any_term() {
        let consensus = consensus();
        let round = ConsensusRound::without_callback(&consensus, msg(3, 7));
        assert_eq!(round.bound_term(), None);
        for term in [0, 1, 3, u64::MAX] {
            assert!(round.check_bound_term(term).is_ok());
        }
    }

    #[test]
    fn test_bound_round_fences_other_terms() {
        let consensus = consensus();
        let round = ConsensusRound::without_callback(&consensus, msg(5, 1));
        round.bind_to_term(5).unwrap();

        assert!(round.check_bound_term(5).is_ok());
        let err = round.check_bound_term(6).unwrap_err();
        assert_eq!(err.kind, ConsensusErrorKind::Aborted);
        assert_eq!(
            err.message,
            "Operation submitted in term 5 cannot be replicated in term 6"
        );
    }

    #[test]
    fn test_check_bound_term_only_reads_the_fence() {
        let consensus = consensus();
        let round = ConsensusRound::without_callback(&consensus, msg(5, 1));
        round.bind_to_term(5).unwrap();

        for current in [6, 7, 8] {
            assert!(round.check_bound_term(current).is_err());
        }
        assert_eq!(consensus.metrics().snapshot().term_fence_aborts, 0);
        assert!(!round.is_notified());
        assert_eq!(round.bound_term(), Some(5));
    }

    #[test]
    fn test_direct_construction_counts_created_rounds() {
        let consensus = consensus();
        let (cb, _, _) = counting_callback();
        let round = ConsensusRound::new(&consensus, msg(1, 1), cb);
        let bare = ConsensusRound::without_callback(&consensus, msg(1, 2));
        round.notify_replication_finished(Ok(()));
        bare.notify_replication_finished(Ok(()));

        let snapshot = consensus.metrics().snapshot();
        assert_eq!(snapshot.rounds_created, 2);
        assert_eq!(snapshot.rounds_notified, 2);
    }

    #[test]
    fn test_successful_bind_precedes_concurrent_notify() {
        let consensus = consensus();
        for index in 1..=200 {
            let round = Arc::new(ConsensusRound::without_callback(&consensus, msg(3, index)));

            let binder = {
                let round = Arc::clone(&round);
                std::thread::spawn(move || round.bind_to_term(3).is_ok())
            };
            let notifier = {
                let round = Arc::clone(&round);
                std::thread::spawn(move || {
                    round.notify_replication_finished(Ok(()));
                    round.bound_term()
                })
            };

            let bound = binder.join().unwrap();
            let term_seen_after_notify = notifier.join().unwrap();
            if bound {
                assert_eq!(term_seen_after_notify, Some(3));
            } else {
                assert_eq!(round.bound_term(), None);
            }
        }
    }

    #[test]
    fn test_bound_term_is_immutable() {
        let consensus = consensus();
        let round = ConsensusRound::without_callback(&consensus, msg(2, 1));
        round.bind_to_term(2).unwrap();
        round.bind_to_term(2).unwrap();

        let err = round.bind_to_term(3).unwrap_err();
        assert_eq!(err.kind, ConsensusErrorKind::IllegalState);
        assert_eq!(round.bound_term(), Some(2));
    }

    #[test]
    fn test_cannot_bind_after_notification() {
        let consensus = consensus();
        let round = ConsensusRound::without_callback(&consensus, msg(2, 1));
        round.notify_replication_finished(Ok(()));
        assert!(round.bind_to_term(2).is_err());
        assert_eq!(round.bound_term(), None);
    }

    #[test]
    fn test_drop_while_pending_aborts_once() {
        let consensus = consensus();
        let (cb, calls, seen) = counting_callback();
        drop(ConsensusRound::new(&consensus, msg(1, 1), cb));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen.lock().unwrap()[0].as_ref().unwrap_err().is_aborted());
    }

    #[test]
    fn test_drop_after_notification_does_not_refire() {
        let consensus = consensus();
        let (cb, calls, _) = counting_callback();
        let round = ConsensusRound::new(&consensus, msg(1, 1), cb);
        round.notify_replication_finished(Ok(()));
        drop(round);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_back_reference_does_not_keep_consensus_alive() {
        let consensus = consensus();
        let round = ConsensusRound::without_callback(&consensus, msg(1, 1));
        assert!(round.consensus().is_ok());

        drop(consensus);
        let err = round.consensus().unwrap_err();
        assert_eq!(err.kind, ConsensusErrorKind::ConsensusDropped);

        // Still usable without its consensus
        round.bind_to_term(1).unwrap();
        assert!(round.check_bound_term(2).is_err());
        round.notify_replication_finished(Ok(()));
    }

    #[test]
    fn test_debug_omits_callback() {
        let consensus = consensus();
        let round = ConsensusRound::without_callback(&consensus, msg(4, 2));
        let debug = format!("{:?}", round);
        assert!(debug.contains("Pending"));
        assert!(debug.contains("has_callback: false"));
    }
}
