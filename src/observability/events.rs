//! Observable consensus events
//!
//! Events are explicit and typed; each maps to one stable log name.

use std::fmt;

use super::logger::Severity;

/// Observable events in the consensus core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Consensus facade constructed
    ConsensusCreated,

    // Rounds
    /// Term fence rejected rounds while advancing the commit index
    TermFenceAbort,

    // Fault hooks
    /// Fault hooks installed
    HooksInstalled,
    /// Fault hooks removed
    HooksCleared,
    /// Installation refused by configuration
    HooksRejected,
    /// A hook returned failure
    HookFailed,

    // Bootstrap
    /// Recovery watermarks computed
    BootstrapComplete,
    /// Recovery trace rejected
    BootstrapRejected,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConsensusCreated => "CONSENSUS_CREATED",
            Event::TermFenceAbort => "TERM_FENCE_ABORT",
            Event::HooksInstalled => "FAULT_HOOKS_INSTALLED",
            Event::HooksCleared => "FAULT_HOOKS_CLEARED",
            Event::HooksRejected => "FAULT_HOOKS_REJECTED",
            Event::HookFailed => "FAULT_HOOK_FAILED",
            Event::BootstrapComplete => "BOOTSTRAP_COMPLETE",
            Event::BootstrapRejected => "BOOTSTRAP_REJECTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::TermFenceAbort | Event::HookFailed | Event::HooksRejected => Severity::Warn,
            Event::BootstrapRejected => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
