//! Lifecycle Fault Hooks
//!
//! A consensus implementation brackets five actions with a PRE and a POST
//! point. Tests install a `FaultHooks` implementation to fail at any of the
//! ten points and exercise the failure path deterministically.
//!
//! The point set is closed: dispatch is an exhaustive match, so an unknown
//! point cannot be expressed.

use std::fmt;
use std::sync::Mutex;

use super::errors::{ConsensusError, ConsensusResult};

/// One of the ten named points in the consensus lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    PreStart,
    PostStart,
    PreConfigChange,
    PostConfigChange,
    PreReplicate,
    PostReplicate,
    PreUpdate,
    PostUpdate,
    PreShutdown,
    PostShutdown,
}

impl HookPoint {
    /// Every point, in lifecycle order.
    pub const ALL: [HookPoint; 10] = [
        HookPoint::PreStart,
        HookPoint::PostStart,
        HookPoint::PreConfigChange,
        HookPoint::PostConfigChange,
        HookPoint::PreReplicate,
        HookPoint::PostReplicate,
        HookPoint::PreUpdate,
        HookPoint::PostUpdate,
        HookPoint::PreShutdown,
        HookPoint::PostShutdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::PreStart => "PRE_START",
            HookPoint::PostStart => "POST_START",
            HookPoint::PreConfigChange => "PRE_CONFIG_CHANGE",
            HookPoint::PostConfigChange => "POST_CONFIG_CHANGE",
            HookPoint::PreReplicate => "PRE_REPLICATE",
            HookPoint::PostReplicate => "POST_REPLICATE",
            HookPoint::PreUpdate => "PRE_UPDATE",
            HookPoint::PostUpdate => "POST_UPDATE",
            HookPoint::PreShutdown => "PRE_SHUTDOWN",
            HookPoint::PostShutdown => "POST_SHUTDOWN",
        }
    }

    /// True for the point run before the action.
    pub fn is_pre(&self) -> bool {
        *self == self.action().pre()
    }

    /// The action this point brackets.
    pub fn action(&self) -> LifecycleAction {
        match self {
            HookPoint::PreStart | HookPoint::PostStart => LifecycleAction::Start,
            HookPoint::PreConfigChange | HookPoint::PostConfigChange => {
                LifecycleAction::ConfigChange
            }
            HookPoint::PreReplicate | HookPoint::PostReplicate => LifecycleAction::Replicate,
            HookPoint::PreUpdate | HookPoint::PostUpdate => LifecycleAction::Update,
            HookPoint::PreShutdown | HookPoint::PostShutdown => LifecycleAction::Shutdown,
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consensus lifecycle action bracketed by a PRE and a POST hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    Start,
    ConfigChange,
    Replicate,
    Update,
    Shutdown,
}

impl LifecycleAction {
    pub fn pre(&self) -> HookPoint {
        match self {
            LifecycleAction::Start => HookPoint::PreStart,
            LifecycleAction::ConfigChange => HookPoint::PreConfigChange,
            LifecycleAction::Replicate => HookPoint::PreReplicate,
            LifecycleAction::Update => HookPoint::PreUpdate,
            LifecycleAction::Shutdown => HookPoint::PreShutdown,
        }
    }

    pub fn post(&self) -> HookPoint {
        match self {
            LifecycleAction::Start => HookPoint::PostStart,
            LifecycleAction::ConfigChange => HookPoint::PostConfigChange,
            LifecycleAction::Replicate => HookPoint::PostReplicate,
            LifecycleAction::Update => HookPoint::PostUpdate,
            LifecycleAction::Shutdown => HookPoint::PostShutdown,
        }
    }
}

/// Fault injection capability.
///
/// Every method defaults to success, so a test overrides only the points it
/// cares about. A returned error must be treated by the engine exactly as a
/// real failure at that point.
pub trait FaultHooks: Send + Sync {
    fn pre_start(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn post_start(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn pre_config_change(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn post_config_change(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn pre_replicate(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn post_replicate(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn pre_update(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn post_update(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn pre_shutdown(&self) -> ConsensusResult<()> {
        Ok(())
    }

    fn post_shutdown(&self) -> ConsensusResult<()> {
        Ok(())
    }

    /// Route `point` to its method.
    fn dispatch(&self, point: HookPoint) -> ConsensusResult<()> {
        match point {
            HookPoint::PreStart => self.pre_start(),
            HookPoint::PostStart => self.post_start(),
            HookPoint::PreConfigChange => self.pre_config_change(),
            HookPoint::PostConfigChange => self.post_config_change(),
            HookPoint::PreReplicate => self.pre_replicate(),
            HookPoint::PostReplicate => self.post_replicate(),
            HookPoint::PreUpdate => self.pre_update(),
            HookPoint::PostUpdate => self.post_update(),
            HookPoint::PreShutdown => self.pre_shutdown(),
            HookPoint::PostShutdown => self.post_shutdown(),
        }
    }
}

/// Hooks that fail at exactly one point and record every point reached.
#[derive(Debug)]
pub struct FailAt {
    point: HookPoint,
    observed: Mutex<Vec<HookPoint>>,
}

impl FailAt {
    pub fn new(point: HookPoint) -> Self {
        Self {
            point,
            observed: Mutex::new(Vec::new()),
        }
    }

    /// The point this double fails at.
    pub fn point(&self) -> HookPoint {
        self.point
    }

    /// Points dispatched so far, in order.
    pub fn observed(&self) -> Vec<HookPoint> {
        self.observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn visit(&self, point: HookPoint) -> ConsensusResult<()> {
        self.observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(point);
        if point == self.point {
            return Err(ConsensusError::hook_failed(format!(
                "injected failure at {}",
                point
            )));
        }
        Ok(())
    }
}

impl FaultHooks for FailAt {
    fn pre_start(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PreStart)
    }

    fn post_start(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PostStart)
    }

    fn pre_config_change(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PreConfigChange)
    }

    fn post_config_change(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PostConfigChange)
    }

    fn pre_replicate(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PreReplicate)
    }

    fn post_replicate(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PostReplicate)
    }

    fn pre_update(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PreUpdate)
    }

    fn post_update(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PostUpdate)
    }

    fn pre_shutdown(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PreShutdown)
    }

    fn post_shutdown(&self) -> ConsensusResult<()> {
        self.visit(HookPoint::PostShutdown)
    }
}
