//! FSM unit tests

use releaser::deploy::fsm::{ReleaseEvent, ReleaseFsm, ReleaseStage};

#[test]
fn test_fsm_initial_state() {
    let fsm = ReleaseFsm::new();
    assert_eq!(fsm.stage(), ReleaseStage::Start);
    assert!(fsm.error().is_none());
    assert!(fsm.failed_at().is_none());
}

#[test]
fn test_fsm_success_flow() {
    let mut fsm = ReleaseFsm::new();

    let expected = [
        ReleaseStage::PreviousReleaseKnown,
        ReleaseStage::PreviousRevisionKnown,
        ReleaseStage::PathCreated,
        ReleaseStage::RepoInitialized,
        ReleaseStage::RemoteAdded,
        ReleaseStage::Fetched,
        ReleaseStage::CheckedOut,
        ReleaseStage::RevisionRecorded,
        ReleaseStage::Completed,
    ];
    for stage in expected {
        assert_eq!(fsm.process(ReleaseEvent::Advance).unwrap(), stage);
    }
    assert!(fsm.stage().is_terminal());
}

#[test]
fn test_fsm_failure_from_any_stage() {
    for advances in 0..9 {
        let mut fsm = ReleaseFsm::new();
        for _ in 0..advances {
            fsm.process(ReleaseEvent::Advance).unwrap();
        }
        let before = fsm.stage();

        fsm.process(ReleaseEvent::Fail("boom".to_string())).unwrap();
        assert_eq!(fsm.stage(), ReleaseStage::Failed);
        assert_eq!(fsm.failed_at(), Some(before));
        assert_eq!(fsm.error(), Some("boom"));
    }
}

#[test]
fn test_fsm_terminal_stages_are_final() {
    let mut failed = ReleaseFsm::new();
    failed.process(ReleaseEvent::Fail("boom".to_string())).unwrap();
    assert!(failed.process(ReleaseEvent::Advance).is_err());
    assert!(failed.process(ReleaseEvent::Fail("again".to_string())).is_err());
    assert_eq!(failed.error(), Some("boom"));

    let mut completed = ReleaseFsm::new();
    while !completed.stage().is_terminal() {
        completed.process(ReleaseEvent::Advance).unwrap();
    }
    assert!(completed.process(ReleaseEvent::Advance).is_err());
    assert!(completed.process(ReleaseEvent::Fail("late".to_string())).is_err());
    assert_eq!(completed.stage(), ReleaseStage::Completed);
}
