//! Consensus facade
//!
//! Factory for rounds and owner of the installed fault hooks. The real
//! engine (election, log matching, transport) lives outside this crate and
//! calls `execute_hook` around each of its lifecycle actions.
//!
//! Contract for the engine:
//! - Run `PRE_X` before attempting action X, `POST_X` after it completes
//! - A hook failure is a real failure at that point: stop, do not proceed

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::oneshot;

use super::errors::{ConsensusError, ConsensusResult};
use super::hooks::{FaultHooks, HookPoint, LifecycleAction};
use super::message::ReplicateMsgPtr;
use super::round::{ConsensusRound, ConsensusRoundPtr, ReplicatedCallback};
use crate::config::ConsensusConfig;
use crate::observability::{log_event_with_fields, ConsensusMetrics, Event};

/// State shared by every handle to one consensus instance.
///
/// Rounds point here weakly.
pub(crate) struct ConsensusShared {
    config: ConsensusConfig,
    // Checked before touching the lock, so the hook-absent path is one load.
    hooks_installed: AtomicBool,
    fault_hooks: RwLock<Option<Arc<dyn FaultHooks>>>,
    metrics: ConsensusMetrics,
}

impl ConsensusShared {
    pub(crate) fn metrics(&self) -> &ConsensusMetrics {
        &self.metrics
    }
}

/// Handle to a consensus instance. Cloning shares the same instance.
#[derive(Clone)]
pub struct Consensus {
    shared: Arc<ConsensusShared>,
}

impl Consensus {
    /// Create a consensus instance with no fault hooks installed.
    pub fn new(config: ConsensusConfig) -> ConsensusResult<Self> {
        config.validate()?;

        let peer_id = config.peer_id.to_string();
        log_event_with_fields(
            Event::ConsensusCreated,
            &[
                ("tablet_id", config.tablet_id.as_str()),
                ("peer_id", peer_id.as_str()),
            ],
        );

        Ok(Self {
            shared: Arc::new(ConsensusShared {
                config,
                hooks_installed: AtomicBool::new(false),
                fault_hooks: RwLock::new(None),
                metrics: ConsensusMetrics::new(),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<ConsensusShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<ConsensusShared> {
        Arc::downgrade(&self.shared)
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> &ConsensusMetrics {
        &self.shared.metrics
    }

    /// Allocate a round for `replicate_msg`.
    ///
    /// No term is bound; call `bind_to_term` before submitting if the round
    /// must be fenced.
    pub fn new_round(
        &self,
        replicate_msg: ReplicateMsgPtr,
        replicated_cb: Option<ReplicatedCallback>,
    ) -> ConsensusRoundPtr {
        Arc::new(ConsensusRound::from_parts(
            self.downgrade(),
            replicate_msg,
            replicated_cb,
        ))
    }

    /// Allocate a round whose outcome arrives on a oneshot receiver.
    pub fn new_round_with_receiver(
        &self,
        replicate_msg: ReplicateMsgPtr,
    ) -> (ConsensusRoundPtr, oneshot::Receiver<ConsensusResult<()>>) {
        let (tx, rx) = oneshot::channel();
        let callback: ReplicatedCallback = Box::new(move |status| {
            // Receiver may have given up waiting
            let _ = tx.send(status);
        });
        (self.new_round(replicate_msg, Some(callback)), rx)
    }

    /// Install (`Some`) or clear (`None`) the fault hooks. Last write wins.
    ///
    /// Installing requires `fault_injection_enabled` in the configuration.
    pub fn set_fault_hooks(&self, hooks: Option<Arc<dyn FaultHooks>>) -> ConsensusResult<()> {
        let tablet_id = self.shared.config.tablet_id.as_str();

        let Some(hooks) = hooks else {
            let mut slot = self.write_hooks();
            *slot = None;
            self.shared.hooks_installed.store(false, Ordering::Release);
            log_event_with_fields(Event::HooksCleared, &[("tablet_id", tablet_id)]);
            return Ok(());
        };

        if !self.shared.config.fault_injection_enabled {
            log_event_with_fields(Event::HooksRejected, &[("tablet_id", tablet_id)]);
            return Err(ConsensusError::configuration_error(format!(
                "fault injection is disabled for tablet {}",
                tablet_id
            )));
        }

        let mut slot = self.write_hooks();
        *slot = Some(hooks);
        self.shared.hooks_installed.store(true, Ordering::Release);
        log_event_with_fields(Event::HooksInstalled, &[("tablet_id", tablet_id)]);
        Ok(())
    }

    /// The currently installed fault hooks, if any.
    pub fn fault_hooks(&self) -> Option<Arc<dyn FaultHooks>> {
        if !self.shared.hooks_installed.load(Ordering::Acquire) {
            return None;
        }
        self.shared
            .fault_hooks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Run the hook for `point`, or succeed immediately if none is installed.
    ///
    /// A failure is returned verbatim; the caller must treat it as a real
    /// failure at that lifecycle point.
    pub fn execute_hook(&self, point: HookPoint) -> ConsensusResult<()> {
        let Some(hooks) = self.fault_hooks() else {
            return Ok(());
        };

        self.shared.metrics.increment_hooks_executed();
        hooks.dispatch(point).map_err(|err| {
            self.shared.metrics.increment_hook_failures();
            log_event_with_fields(
                Event::HookFailed,
                &[
                    ("tablet_id", self.shared.config.tablet_id.as_str()),
                    ("point", point.as_str()),
                    ("message", err.message.as_str()),
                ],
            );
            err
        })
    }

    /// Run `action` bracketed by its PRE and POST hooks.
    ///
    /// A PRE failure skips the action; an action failure skips POST.
    pub fn run_bracketed<T, F>(&self, action: LifecycleAction, f: F) -> ConsensusResult<T>
    where
        F: FnOnce() -> ConsensusResult<T>,
    {
        self.execute_hook(action.pre())?;
        let value = f()?;
        self.execute_hook(action.post())?;
        Ok(value)
    }

    fn write_hooks(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<dyn FaultHooks>>> {
        self.shared
            .fault_hooks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Consensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consensus")
            .field("tablet_id", &self.shared.config.tablet_id)
            .field("peer_id", &self.shared.config.peer_id)
            .field(
                "hooks_installed",
                &self.shared.hooks_installed.load(Ordering::Acquire),
            )
            .finish()
    }
}
