//! Replicate messages
//!
//! Built by upstream collaborators (query layer, log reader) and handed to
//! the core read-only. The payload is never interpreted here.

use std::sync::Arc;

use super::op_id::OpId;

/// Shared handle to a replicate message.
///
/// Held at once by the round, the log and the applying state machine.
/// `Arc` cannot be null, so every round always carries a payload.
pub type ReplicateMsgPtr = Arc<ReplicateMessage>;

/// Kind of operation carried by a replicate message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Leader's first entry of a new term
    NoOp,
    /// Data write
    Write,
    /// Peer membership change
    ChangeConfig,
    /// Transaction status update
    UpdateTransaction,
}

/// One operation to replicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateMessage {
    op_type: OperationType,
    id: Option<OpId>,
    payload: Vec<u8>,
}

impl ReplicateMessage {
    /// Create a message without a log position.
    pub fn new(op_type: OperationType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            op_type,
            id: None,
            payload: payload.into(),
        }
    }

    /// Create an empty no-op message.
    pub fn no_op() -> Self {
        Self::new(OperationType::NoOp, Vec::new())
    }

    /// Return the same message stamped with a log position.
    pub fn with_id(self, id: OpId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    /// Wrap in a shared handle.
    pub fn into_ptr(self) -> ReplicateMsgPtr {
        Arc::new(self)
    }

    pub fn op_type(&self) -> OperationType {
        self.op_type
    }

    /// Log position, once assigned by the proposer.
    pub fn id(&self) -> Option<OpId> {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
