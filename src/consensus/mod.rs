//! Consensus Replication Nucleus
//!
//! Turns "replicate this operation" into a tracked, term-fenced round with
//! an exactly-once completion, describes where a replica resumes after
//! restart, and lets tests inject failures at ten lifecycle points.
//!
//! Invariants:
//! - A round's callback fires at most once, and exactly once if the round
//!   is notified or dropped
//! - A round's bound term never changes once set
//! - A round fenced to term T is never committed under any other term
//! - `last_committed_id <= last_id` for every bootstrap descriptor
//! - With no hooks installed, every lifecycle point succeeds
//!
//! Leader election, log matching, persistence and transport are external
//! collaborators; they drive rounds and hooks through this API.

mod bootstrap;
mod errors;
mod facade;
mod hooks;
mod message;
mod op_id;
mod pending;
mod round;

pub use bootstrap::{BootstrapTracker, ConsensusBootstrapInfo};
pub use errors::{ConsensusError, ConsensusErrorKind, ConsensusResult};
pub use facade::Consensus;
pub use hooks::{FailAt, FaultHooks, HookPoint, LifecycleAction};
pub use message::{OperationType, ReplicateMessage, ReplicateMsgPtr};
pub use op_id::{OpId, Term};
pub use pending::{CommitOutcome, PendingRounds};
pub use round::{ConsensusRound, ConsensusRoundPtr, ReplicatedCallback, RoundState};
