//! Pending round tracking
//!
//! The engine-side set of rounds waiting for commit, ordered by OpId. Every
//! round that enters leaves through exactly one notification: committed,
//! fenced off by a term change, or aborted in bulk on term loss or shutdown.

use std::collections::BTreeMap;

use super::errors::{ConsensusError, ConsensusResult};
use super::op_id::{OpId, Term};
use super::round::ConsensusRoundPtr;
use crate::observability::{log_event_with_fields, Event};

/// Result of advancing the commit index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Rounds notified with success
    pub committed: usize,
    /// Rounds rejected by their term fence
    pub aborted: usize,
}

/// Rounds awaiting their commit, keyed by log position.
#[derive(Debug, Default)]
pub struct PendingRounds {
    rounds: BTreeMap<OpId, ConsensusRoundPtr>,
    last_op_id: OpId,
}

impl PendingRounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `round`.
    ///
    /// Its message must carry an OpId after every OpId tracked so far. A
    /// rejected round is dropped here, so if this was its last handle its
    /// callback runs on this thread with `Aborted` before `push` returns.
    pub fn push(&mut self, round: ConsensusRoundPtr) -> ConsensusResult<()> {
        let op_id = round.id().ok_or_else(|| {
            ConsensusError::illegal_state("pending round has no OpId assigned")
        })?;
        if op_id <= self.last_op_id {
            return Err(ConsensusError::illegal_state(format!(
                "pending round {} does not follow {}",
                op_id, self.last_op_id
            )));
        }
        if round.is_notified() {
            return Err(ConsensusError::illegal_state(format!(
                "round {} already finished",
                op_id
            )));
        }
        self.rounds.insert(op_id, round);
        self.last_op_id = op_id;
        Ok(())
    }

    /// Finish every round at or before `committed`.
    ///
    /// Each round is checked against `current_term` first; a fenced round is
    /// notified with its `Aborted` error instead of success. Fenced rounds are
    /// counted in `term_fence_aborts` and logged once per call.
    pub fn commit_up_to(&mut self, committed: OpId, current_term: Term) -> CommitOutcome {
        let mut outcome = CommitOutcome::default();
        while let Some(entry) = self.rounds.first_entry() {
            if *entry.key() > committed {
                break;
            }
            let round = entry.remove();
            match round.check_bound_term(current_term) {
                Ok(()) => {
                    round.notify_replication_finished(Ok(()));
                    outcome.committed += 1;
                }
                Err(err) => {
                    if let Ok(consensus) = round.consensus() {
                        consensus.metrics().increment_term_fence_aborts();
                    }
                    round.notify_replication_finished(Err(err));
                    outcome.aborted += 1;
                }
            }
        }

        if outcome.aborted > 0 {
            let aborted = outcome.aborted.to_string();
            let committed = committed.to_string();
            let current_term = current_term.to_string();
            log_event_with_fields(
                Event::TermFenceAbort,
                &[
                    ("aborted", aborted.as_str()),
                    ("committed", committed.as_str()),
                    ("current_term", current_term.as_str()),
                ],
            );
        }
        outcome
    }

    /// Finish every pending round with `error`. Returns how many were aborted.
    pub fn abort_all(&mut self, error: ConsensusError) -> usize {
        let rounds = std::mem::take(&mut self.rounds);
        let count = rounds.len();
        for round in rounds.into_values() {
            round.notify_replication_finished(Err(error.clone()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// OpId of the most recently pushed round.
    pub fn last_op_id(&self) -> OpId {
        self.last_op_id
    }
}
