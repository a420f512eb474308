//! Fault Hook Dispatch Tests
//!
//! Hooks intercept the ten lifecycle points of a consensus implementation.
//! A small engine below follows the bracketing contract so failures can be
//! injected without touching its code paths.

use std::sync::Arc;

use aeroconsensus::config::ConsensusConfig;
use aeroconsensus::consensus::{
    Consensus, ConsensusErrorKind, ConsensusResult, FailAt, FaultHooks, HookPoint,
    LifecycleAction, OpId, OperationType, PendingRounds, ReplicateMessage, ReplicateMsgPtr,
    Term,
};

fn test_consensus() -> Consensus {
    Consensus::new(ConsensusConfig::new("tablet-hooks").with_fault_injection()).unwrap()
}

/// Minimal leader loop that brackets each action with its hooks.
struct TestEngine {
    consensus: Consensus,
    term: Term,
    next_index: u64,
    log: Vec<OpId>,
    pending: PendingRounds,
    running: bool,
}

impl TestEngine {
    fn new(consensus: Consensus) -> Self {
        Self {
            consensus,
            term: 1,
            next_index: 1,
            log: Vec::new(),
            pending: PendingRounds::new(),
            running: false,
        }
    }

    fn start(&mut self) -> ConsensusResult<()> {
        let consensus = self.consensus.clone();
        consensus.run_bracketed(LifecycleAction::Start, || {
            self.running = true;
            Ok(())
        })
    }

    fn replicate(&mut self, payload: &[u8]) -> ConsensusResult<OpId> {
        self.consensus.execute_hook(HookPoint::PreReplicate)?;

        let op_id = OpId::new(self.term, self.next_index);
        let msg: ReplicateMsgPtr = ReplicateMessage::new(OperationType::Write, payload.to_vec())
            .with_id(op_id)
            .into_ptr();
        let round = self.consensus.new_round(msg, None);
        round.bind_to_term(self.term)?;
        self.pending.push(round)?;
        self.log.push(op_id);
        self.next_index += 1;

        self.consensus.execute_hook(HookPoint::PostReplicate)?;
        Ok(op_id)
    }
}

/// Records every point reached, failing nowhere.
#[derive(Default)]
struct Recording {
    seen: std::sync::Mutex<Vec<HookPoint>>,
}

impl FaultHooks for Recording {
    fn dispatch(&self, point: HookPoint) -> ConsensusResult<()> {
        self.seen.lock().unwrap().push(point);
        Ok(())
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Without hooks every point succeeds and nothing is counted.
#[test]
fn test_no_hooks_every_point_succeeds() {
    let consensus = test_consensus();
    for point in HookPoint::ALL {
        assert!(consensus.execute_hook(point).is_ok());
    }
    assert_eq!(consensus.metrics().snapshot().hooks_executed, 0);
}

/// Ten independent doubles: each fails only at its own point.
#[test]
fn test_each_point_dispatches_to_its_own_hook() {
    for target in HookPoint::ALL {
        let consensus = test_consensus();
        consensus
            .set_fault_hooks(Some(Arc::new(FailAt::new(target))))
            .unwrap();

        for point in HookPoint::ALL {
            let result = consensus.execute_hook(point);
            if point == target {
                let err = result.unwrap_err();
                assert_eq!(err.kind, ConsensusErrorKind::HookFailed);
                assert!(err.message.contains(target.as_str()));
            } else {
                assert!(result.is_ok(), "{point} should pass when {target} fails");
            }
        }
    }
}

/// Each dispatch reaches exactly one hook.
#[test]
fn test_dispatch_reaches_exactly_one_hook() {
    let consensus = test_consensus();
    let recording = Arc::new(Recording::default());
    consensus.set_fault_hooks(Some(recording.clone())).unwrap();

    for point in HookPoint::ALL {
        consensus.execute_hook(point).unwrap();
    }
    assert_eq!(*recording.seen.lock().unwrap(), HookPoint::ALL.to_vec());
}

/// Production configuration cannot install hooks.
#[test]
fn test_production_config_refuses_hooks() {
    let consensus = Consensus::new(ConsensusConfig::new("tablet-prod")).unwrap();
    let result = consensus.set_fault_hooks(Some(Arc::new(FailAt::new(HookPoint::PreStart))));
    assert_eq!(result.unwrap_err().kind, ConsensusErrorKind::ConfigurationError);
    assert!(consensus.fault_hooks().is_none());
}

// =============================================================================
// End-to-end: leader crashes right before sending entries
// =============================================================================

/// PRE_REPLICATE failure aborts the attempt and POST_REPLICATE never runs.
#[test]
fn test_pre_replicate_failure_aborts_replicate() {
    let consensus = test_consensus();
    let hooks = Arc::new(FailAt::new(HookPoint::PreReplicate));
    consensus.set_fault_hooks(Some(hooks.clone())).unwrap();

    let mut engine = TestEngine::new(consensus);
    engine.start().unwrap();

    let err = engine.replicate(b"row-1").unwrap_err();
    assert_eq!(err.kind, ConsensusErrorKind::HookFailed);

    assert!(engine.log.is_empty());
    assert!(engine.pending.is_empty());
    assert_eq!(
        hooks.observed(),
        vec![HookPoint::PreStart, HookPoint::PostStart, HookPoint::PreReplicate]
    );
}

/// Clearing the hooks lets the same engine replicate normally.
#[test]
fn test_replicate_after_hooks_cleared() {
    let consensus = test_consensus();
    consensus
        .set_fault_hooks(Some(Arc::new(FailAt::new(HookPoint::PreReplicate))))
        .unwrap();

    let mut engine = TestEngine::new(consensus.clone());
    engine.start().unwrap();
    assert!(engine.replicate(b"row-1").is_err());

    consensus.set_fault_hooks(None).unwrap();
    let op_id = engine.replicate(b"row-1").unwrap();
    assert_eq!(op_id, OpId::new(1, 1));
    assert_eq!(engine.pending.len(), 1);

    let outcome = engine.pending.commit_up_to(op_id, engine.term);
    assert_eq!(outcome.committed, 1);
}

/// PRE_START failure leaves the engine stopped.
#[test]
fn test_pre_start_failure_leaves_engine_stopped() {
    let consensus = test_consensus();
    consensus
        .set_fault_hooks(Some(Arc::new(FailAt::new(HookPoint::PreStart))))
        .unwrap();

    let mut engine = TestEngine::new(consensus);
    assert!(engine.start().is_err());
    assert!(!engine.running);
}

/// POST_START failure is reported even though the action ran.
#[test]
fn test_post_start_failure_propagates() {
    let consensus = test_consensus();
    consensus
        .set_fault_hooks(Some(Arc::new(FailAt::new(HookPoint::PostStart))))
        .unwrap();

    let mut engine = TestEngine::new(consensus.clone());
    let err = engine.start().unwrap_err();
    assert_eq!(err.kind, ConsensusErrorKind::HookFailed);
    assert_eq!(consensus.metrics().snapshot().hook_failures, 1);
}

/// Installation from one thread is seen by dispatch on another.
#[test]
fn test_hooks_visible_across_threads() {
    let consensus = test_consensus();
    consensus
        .set_fault_hooks(Some(Arc::new(FailAt::new(HookPoint::PreShutdown))))
        .unwrap();

    let worker = consensus.clone();
    let result = std::thread::spawn(move || worker.execute_hook(HookPoint::PreShutdown))
        .join()
        .unwrap();
    assert!(result.is_err());
}
