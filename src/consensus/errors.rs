//! Consensus Error Types
//!
//! The status vocabulary shared by rounds, hooks and bootstrap:
//! - Term fence mismatches surface as `Aborted`
//! - Hook failures are propagated verbatim
//! - Transport and storage collaborators translate their failures
//!   into `NetworkError` / `IoError` before notifying a round

use std::fmt;

/// Consensus error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusError {
    /// Error kind
    pub kind: ConsensusErrorKind,
    /// Error message
    pub message: String,
}

/// Consensus error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsensusErrorKind {
    /// Operation was not committed (term fence mismatch, explicit abort)
    Aborted,

    /// A fault injection hook returned failure
    HookFailed,

    /// Operation is not valid in the current state
    IllegalState,

    /// Bootstrap watermarks violate `last_committed_id <= last_id`
    InvalidBootstrap,

    /// The owning consensus instance no longer exists
    ConsensusDropped,

    /// Replica is shutting down
    ShutdownInProgress,

    /// Configuration error
    ConfigurationError,

    /// Transport failure reported by the RPC layer
    NetworkError,

    /// Storage failure reported by the log
    IoError,
}

impl ConsensusErrorKind {
    /// Stable name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aborted => "ABORTED",
            Self::HookFailed => "HOOK_FAILED",
            Self::IllegalState => "ILLEGAL_STATE",
            Self::InvalidBootstrap => "INVALID_BOOTSTRAP",
            Self::ConsensusDropped => "CONSENSUS_DROPPED",
            Self::ShutdownInProgress => "SHUTDOWN_IN_PROGRESS",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::IoError => "IO_ERROR",
        }
    }
}

impl ConsensusError {
    /// Create a new consensus error.
    pub fn new(kind: ConsensusErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an aborted error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::Aborted, message)
    }

    /// Create a hook failure error.
    pub fn hook_failed(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::HookFailed, message)
    }

    /// Create an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::IllegalState, message)
    }

    /// Create an invalid bootstrap error.
    pub fn invalid_bootstrap(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::InvalidBootstrap, message)
    }

    /// Create a consensus dropped error.
    pub fn consensus_dropped(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::ConsensusDropped, message)
    }

    /// Create a shutdown error.
    pub fn shutdown_in_progress(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::ShutdownInProgress, message)
    }

    /// Create a configuration error.
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::ConfigurationError, message)
    }

    /// Create a network error.
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::NetworkError, message)
    }

    /// Create an I/O error.
    pub fn io_error(message: impl Into<String>) -> Self {
        Self::new(ConsensusErrorKind::IoError, message)
    }

    /// Check if this is an `Aborted` outcome.
    pub fn is_aborted(&self) -> bool {
        self.kind == ConsensusErrorKind::Aborted
    }

    /// Check if this error is fatal for the replica rather than for one round.
    ///
    /// Term aborts, hook failures and transport errors end a single round;
    /// the system keeps running.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ConsensusErrorKind::InvalidBootstrap
                | ConsensusErrorKind::ConfigurationError
                | ConsensusErrorKind::IoError
        )
    }
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ConsensusError {}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
