//! Bootstrap descriptor
//!
//! The two watermarks a replica resumes from after restart:
//! - `last_id`: last log entry seen, possibly uncommitted
//! - `last_committed_id`: last entry known committed
//!
//! Invariant: `last_committed_id <= last_id`. A fresh replica has both at
//! `OpId::MINIMUM`. The descriptor is never mutated; each recovery attempt
//! builds a new one, usually through `BootstrapTracker` while the log is
//! replayed.

use serde::{Deserialize, Serialize};

use super::errors::{ConsensusError, ConsensusResult};
use super::op_id::OpId;
use crate::observability::{log_event_with_fields, Event};

/// Recovery descriptor handed to the consensus implementation at startup.
///
/// Deserialization goes through `new`, so a persisted descriptor with the
/// watermarks inverted is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawBootstrapInfo")]
pub struct ConsensusBootstrapInfo {
    last_id: OpId,
    last_committed_id: OpId,
}

/// Wire shape of `ConsensusBootstrapInfo`, before validation
#[derive(Deserialize)]
struct RawBootstrapInfo {
    #[serde(default)]
    last_id: OpId,
    #[serde(default)]
    last_committed_id: OpId,
}

impl TryFrom<RawBootstrapInfo> for ConsensusBootstrapInfo {
    type Error = ConsensusError;

    fn try_from(raw: RawBootstrapInfo) -> ConsensusResult<Self> {
        Self::new(raw.last_id, raw.last_committed_id)
    }
}

impl ConsensusBootstrapInfo {
    /// Build a descriptor from recovered watermarks.
    ///
    /// Fails if the committed watermark is ahead of the last seen entry.
    pub fn new(last_id: OpId, last_committed_id: OpId) -> ConsensusResult<Self> {
        if last_committed_id > last_id {
            return Err(ConsensusError::invalid_bootstrap(format!(
                "last committed id {} is ahead of last id {}",
                last_committed_id, last_id
            )));
        }
        Ok(Self {
            last_id,
            last_committed_id,
        })
    }

    /// Seed for term/index tracking.
    pub fn last_id(&self) -> OpId {
        self.last_id
    }

    /// Seed for commit index tracking. Nothing at or before it is uncommitted.
    pub fn last_committed_id(&self) -> OpId {
        self.last_committed_id
    }

    /// True for a replica with no log history.
    pub fn is_empty(&self) -> bool {
        self.last_id.is_minimum()
    }

    /// True if `op_id` is already in the recovered log and must not be
    /// accepted as a new proposal.
    pub fn is_known(&self, op_id: OpId) -> bool {
        op_id <= self.last_id
    }
}

/// Running watermarks collected while replaying a persisted log.
#[derive(Debug, Default)]
pub struct BootstrapTracker {
    last_id: OpId,
    last_committed_id: OpId,
    replicates_seen: u64,
}

impl BootstrapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a replayed log entry.
    ///
    /// Entries must arrive in strictly increasing OpId order; an entry that
    /// overwrites an older suffix carries a higher term, so it still sorts
    /// after everything replayed before it.
    pub fn observe_replicate(&mut self, op_id: OpId) -> ConsensusResult<()> {
        if op_id.is_minimum() {
            return Err(self.reject(ConsensusError::invalid_bootstrap(
                "replayed entry carries the minimum OpId",
            )));
        }
        if op_id <= self.last_id {
            return Err(self.reject(ConsensusError::invalid_bootstrap(format!(
                "replayed entry {} does not follow {}",
                op_id, self.last_id
            ))));
        }
        self.last_id = op_id;
        self.replicates_seen += 1;
        Ok(())
    }

    /// Record a commit marker found during replay.
    ///
    /// The marker must not point past the last replayed entry. Older markers
    /// than the current watermark are ignored.
    pub fn observe_committed(&mut self, op_id: OpId) -> ConsensusResult<()> {
        if op_id > self.last_id {
            return Err(self.reject(ConsensusError::invalid_bootstrap(format!(
                "commit marker {} is ahead of last replayed entry {}",
                op_id, self.last_id
            ))));
        }
        self.last_committed_id = self.last_committed_id.max(op_id);
        Ok(())
    }

    pub fn last_id(&self) -> OpId {
        self.last_id
    }

    pub fn last_committed_id(&self) -> OpId {
        self.last_committed_id
    }

    /// Number of entries replayed so far.
    pub fn replicates_seen(&self) -> u64 {
        self.replicates_seen
    }

    /// Produce the descriptor.
    pub fn finish(self) -> ConsensusBootstrapInfo {
        let last_id = self.last_id.to_string();
        let last_committed_id = self.last_committed_id.to_string();
        let replayed = self.replicates_seen.to_string();
        log_event_with_fields(
            Event::BootstrapComplete,
            &[
                ("last_id", last_id.as_str()),
                ("last_committed_id", last_committed_id.as_str()),
                ("replayed", replayed.as_str()),
            ],
        );

        // observe_* keep last_committed_id <= last_id
        ConsensusBootstrapInfo {
            last_id: self.last_id,
            last_committed_id: self.last_committed_id,
        }
    }

    fn reject(&self, err: ConsensusError) -> ConsensusError {
        log_event_with_fields(Event::BootstrapRejected, &[("message", err.message.as_str())]);
        err
    }
}
