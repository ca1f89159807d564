//! Release pipeline tests

use std::sync::Arc;

use tokio::sync::broadcast::error::TryRecvError;

use releaser::deploy::events::PipelineEvent;
use releaser::deploy::fsm::ReleaseStage;
use releaser::deploy::pipeline::ReleasePipeline;
use releaser::errors::ReleaseError;
use releaser::history::RemoteReleaseHistory;

use crate::common::{at, config, FixedHistory, MockExecutor, HEAD};

const RELEASE_PATH: &str = "/srv/app/releases/2024.03.01_10.00.00";

#[tokio::test]
async fn test_first_deployment_end_to_end() {
    let executor = Arc::new(MockExecutor::new().with_head());
    let pipeline = ReleasePipeline::new(config(), executor.clone(), FixedHistory::empty())
        .with_clock(|| at(2024, 3, 1, 10, 0, 0));
    let mut events = pipeline.events().subscribe();

    let state = pipeline.update().await.unwrap();

    assert!(state.previous_release().is_none());
    assert!(state.previous_revision().is_none());
    assert_eq!(state.release_dirname().unwrap().as_str(), "2024.03.01_10.00.00");
    assert_eq!(state.release_path(), Some(RELEASE_PATH));
    assert_eq!(state.current_revision().unwrap().as_str(), HEAD);

    assert_eq!(
        executor.commands(),
        vec![
            format!("mkdir -p {}", RELEASE_PATH),
            format!("cd {} && git init", RELEASE_PATH),
            format!(
                "cd {} && git remote add deploy git@example.com:org/app.git",
                RELEASE_PATH
            ),
            format!("cd {} && git fetch deploy main", RELEASE_PATH),
            format!("cd {} && git checkout main", RELEASE_PATH),
            format!("cd {} && git rev-parse main", RELEASE_PATH),
            format!("echo {} > {}/REVISION", HEAD, RELEASE_PATH),
        ]
    );

    assert_eq!(events.try_recv().unwrap(), PipelineEvent::Updated);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_previous_release_and_revision_discovered() {
    let executor = Arc::new(
        MockExecutor::new()
            .respond("readlink", "/srv/app/releases/2024.03.01_09.00.00\n")
            .respond("cat /srv/app/releases/2024.03.01_09.00.00/REVISION", "abc123\n")
            .with_head(),
    );
    let history = RemoteReleaseHistory::new(executor.clone(), "/srv/app");
    let pipeline = ReleasePipeline::new(config(), executor.clone(), history)
        .with_clock(|| at(2024, 3, 1, 10, 0, 0));

    let state = pipeline.update().await.unwrap();

    assert_eq!(
        state.previous_release().unwrap().as_str(),
        "2024.03.01_09.00.00"
    );
    assert_eq!(state.previous_revision().unwrap().as_str(), "abc123");
    assert_eq!(state.current_revision().unwrap().as_str(), HEAD);

    let commands = executor.commands();
    assert_eq!(
        commands[0],
        "if [ -h /srv/app/current ]; then readlink /srv/app/current; fi"
    );
    assert_eq!(
        commands[1],
        "if [ -f /srv/app/releases/2024.03.01_09.00.00/REVISION ]; then cat /srv/app/releases/2024.03.01_09.00.00/REVISION 2>/dev/null; fi;"
    );
    assert_eq!(commands[2], format!("mkdir -p {}", RELEASE_PATH));
}

#[tokio::test]
async fn test_previous_release_with_legacy_name() {
    let executor = Arc::new(
        MockExecutor::new()
            .respond("readlink", "/srv/app/releases/20240301090000\n")
            .respond("cat /srv/app/releases/20240301090000/REVISION", "abc123\n")
            .with_head(),
    );
    let history = RemoteReleaseHistory::new(executor.clone(), "/srv/app");
    let pipeline = ReleasePipeline::new(config(), executor.clone(), history)
        .with_clock(|| at(2024, 3, 1, 10, 0, 0));
    let mut events = pipeline.events().subscribe();

    let run = pipeline.run().await;

    assert_eq!(run.stage(), ReleaseStage::Completed);
    assert!(run.error().is_none());
    assert_eq!(run.state.previous_release().unwrap().as_str(), "20240301090000");
    assert_eq!(run.state.previous_revision().unwrap().as_str(), "abc123");
    assert_eq!(run.state.release_dirname().unwrap().as_str(), "2024.03.01_10.00.00");
    assert_eq!(run.state.current_revision().unwrap().as_str(), HEAD);

    let commands = executor.commands();
    assert_eq!(commands.len(), 9);
    assert_eq!(commands[2], format!("mkdir -p {}", RELEASE_PATH));
    assert_eq!(events.try_recv().unwrap(), PipelineEvent::Updated);
}

#[tokio::test]
async fn test_previous_state_kept_when_new_release_fails() {
    let executor = Arc::new(MockExecutor::new().fail_on("git fetch"));
    let history = FixedHistory::with("2024.03.01_09.00.00", Some("abc123"));
    let pipeline = ReleasePipeline::new(config(), executor, history)
        .with_clock(|| at(2024, 3, 1, 10, 0, 0));

    let run = pipeline.run().await;

    assert_eq!(run.stage(), ReleaseStage::Failed);
    assert_eq!(
        run.state.previous_release().unwrap().as_str(),
        "2024.03.01_09.00.00"
    );
    assert_eq!(run.state.previous_revision().unwrap().as_str(), "abc123");
    assert!(run.state.current_revision().is_none());
}

#[tokio::test]
async fn test_previous_release_without_revision_file() {
    let executor = Arc::new(
        MockExecutor::new()
            .respond("readlink", "/srv/app/releases/2024.03.01_09.00.00\n")
            .with_head(),
    );
    let history = RemoteReleaseHistory::new(executor.clone(), "/srv/app");
    let pipeline = ReleasePipeline::new(config(), executor, history);

    let state = pipeline.update().await.unwrap();

    assert!(state.previous_release().is_some());
    assert!(state.previous_revision().is_none());
    assert!(state.current_revision().is_some());
}

#[tokio::test]
async fn test_no_revision_lookup_without_previous_release() {
    let executor = Arc::new(MockExecutor::new().with_head());
    let history = RemoteReleaseHistory::new(executor.clone(), "/srv/app");
    let pipeline = ReleasePipeline::new(config(), executor.clone(), history);

    pipeline.update().await.unwrap();

    let commands = executor.commands();
    assert!(commands[0].contains("readlink"));
    assert!(commands[1].starts_with("mkdir -p "));
    assert!(!commands.iter().any(|c| c.contains("cat ")));
}

#[tokio::test]
async fn test_any_failing_step_suppresses_updated() {
    let steps = [
        ("mkdir -p", ReleaseStage::PreviousRevisionKnown, 1),
        ("git init", ReleaseStage::PathCreated, 2),
        ("git remote add", ReleaseStage::RepoInitialized, 3),
        ("git fetch", ReleaseStage::RemoteAdded, 4),
        ("git checkout", ReleaseStage::Fetched, 5),
        ("git rev-parse", ReleaseStage::CheckedOut, 6),
        ("REVISION", ReleaseStage::CheckedOut, 7),
    ];

    for (pattern, failed_at, command_count) in steps {
        let executor = Arc::new(MockExecutor::new().with_head().fail_on(pattern));
        let pipeline = ReleasePipeline::new(config(), executor.clone(), FixedHistory::empty());
        let mut events = pipeline.events().subscribe();

        let run = pipeline.run().await;

        assert_eq!(run.stage(), ReleaseStage::Failed, "step {}", pattern);
        assert_eq!(run.failed_at(), Some(failed_at), "step {}", pattern);
        assert!(
            matches!(run.error(), Some(ReleaseError::CommandFailed { .. })),
            "step {}",
            pattern
        );
        assert!(run.state.current_revision().is_none(), "step {}", pattern);
        // nothing runs after the failing command
        assert_eq!(executor.commands().len(), command_count, "step {}", pattern);
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty), "step {}", pattern);
    }
}

#[tokio::test]
async fn test_history_failure_is_fatal() {
    let executor = Arc::new(MockExecutor::new().fail_on("readlink"));
    let history = RemoteReleaseHistory::new(executor.clone(), "/srv/app");
    let pipeline = ReleasePipeline::new(config(), executor.clone(), history);

    let run = pipeline.run().await;

    assert_eq!(run.failed_at(), Some(ReleaseStage::Start));
    assert!(run.state.release_dirname().is_none());
    assert_eq!(executor.commands().len(), 1);
}

#[tokio::test]
async fn test_hosts_disagreeing_on_revision() {
    let executor = Arc::new(
        MockExecutor::with_hosts(&["web1", "web2"])
            .respond_per_host("git rev-parse", &["abc123\n", "def456\n"]),
    );
    let pipeline = ReleasePipeline::new(config(), executor.clone(), FixedHistory::empty());
    let mut events = pipeline.events().subscribe();

    let err = pipeline.update().await.unwrap_err();

    assert!(matches!(err, ReleaseError::HostsOutOfSync(_)));
    assert!(!executor.commands().iter().any(|c| c.contains("REVISION")));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_empty_rev_parse_output_is_not_recorded() {
    let executor = Arc::new(MockExecutor::new().respond("git rev-parse", "\n"));
    let pipeline = ReleasePipeline::new(config(), executor.clone(), FixedHistory::empty());

    let err = pipeline.update().await.unwrap_err();

    assert!(matches!(err, ReleaseError::IncompleteRelease(_)));
    assert!(!executor.commands().iter().any(|c| c.contains("REVISION")));
}

#[tokio::test]
async fn test_release_names_increase_with_time() {
    let first = ReleasePipeline::new(
        config(),
        Arc::new(MockExecutor::new().with_head()),
        FixedHistory::empty(),
    )
    .with_clock(|| at(2024, 3, 1, 9, 59, 59))
    .update()
    .await
    .unwrap();

    let second = ReleasePipeline::new(
        config(),
        Arc::new(MockExecutor::new().with_head()),
        FixedHistory::with("2024.03.01_09.59.59", Some(HEAD)),
    )
    .with_clock(|| at(2024, 3, 1, 10, 0, 0))
    .update()
    .await
    .unwrap();

    let earlier = first.release_dirname().unwrap();
    let later = second.release_dirname().unwrap();
    assert!(later.as_str() > earlier.as_str());
    assert_eq!(second.previous_release(), Some(earlier));
    assert_eq!(second.previous_revision().unwrap().as_str(), HEAD);
}

#[tokio::test]
async fn test_custom_remote_name_and_branch() {
    let mut config = config();
    config.remote_name = "origin".to_string();
    config.branch = "release/2024-03".to_string();
    let executor = Arc::new(MockExecutor::new().with_head());
    let pipeline = ReleasePipeline::new(config, executor.clone(), FixedHistory::empty())
        .with_clock(|| at(2024, 3, 1, 10, 0, 0));

    pipeline.update().await.unwrap();

    let commands = executor.commands();
    assert_eq!(
        commands[3],
        format!("cd {} && git fetch origin release/2024-03", RELEASE_PATH)
    );
    assert_eq!(
        commands[5],
        format!("cd {} && git rev-parse release/2024-03", RELEASE_PATH)
    );
}
