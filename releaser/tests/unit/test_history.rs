//! Remote release history tests

use std::sync::Arc;

use releaser::errors::ReleaseError;
use releaser::history::{ReleaseHistory, RemoteReleaseHistory};
use releaser::release::ReleaseName;

use crate::common::MockExecutor;

fn release(name: &str) -> ReleaseName {
    ReleaseName::parse(name).unwrap()
}

#[tokio::test]
async fn test_no_current_link() {
    let history = RemoteReleaseHistory::new(MockExecutor::new(), "/srv/app");
    assert_eq!(history.current_release_name().await.unwrap(), None);
}

#[tokio::test]
async fn test_current_link_absolute_and_relative() {
    for target in [
        "/srv/app/releases/2024.03.01_09.00.00\n",
        "releases/2024.03.01_09.00.00\n",
    ] {
        let executor = MockExecutor::new().respond("readlink", target);
        let history = RemoteReleaseHistory::new(executor, "/srv/app");
        assert_eq!(
            history.current_release_name().await.unwrap(),
            Some(release("2024.03.01_09.00.00"))
        );
    }
}

#[tokio::test]
async fn test_current_link_out_of_sync() {
    let executor = MockExecutor::with_hosts(&["web1", "web2"]).respond_per_host(
        "readlink",
        &[
            "/srv/app/releases/2024.03.01_09.00.00",
            "/srv/app/releases/2024.02.28_17.30.00",
        ],
    );
    let history = RemoteReleaseHistory::new(executor, "/srv/app");
    assert!(matches!(
        history.current_release_name().await,
        Err(ReleaseError::HostsOutOfSync(_))
    ));
}

#[tokio::test]
async fn test_current_link_to_foreign_directory() {
    let executor = Arc::new(
        MockExecutor::new()
            .respond("readlink", "/srv/app/releases/20240301090000\n")
            .respond("20240301090000/REVISION", "abc123\n"),
    );
    let history = RemoteReleaseHistory::new(executor.clone(), "/srv/app");

    let current = history.current_release_name().await.unwrap().unwrap();
    assert_eq!(current.as_str(), "20240301090000");

    let revision = history.revision_of(&current).await.unwrap();
    assert_eq!(revision.unwrap().as_str(), "abc123");
    assert_eq!(
        executor.commands()[1],
        "if [ -f /srv/app/releases/20240301090000/REVISION ]; then cat /srv/app/releases/20240301090000/REVISION 2>/dev/null; fi;"
    );
}

#[tokio::test]
async fn test_current_link_to_root_is_rejected() {
    let executor = MockExecutor::new().respond("readlink", "/\n");
    let history = RemoteReleaseHistory::new(executor, "/srv/app");
    assert!(matches!(
        history.current_release_name().await,
        Err(ReleaseError::InvalidReleaseName(_))
    ));
}

#[tokio::test]
async fn test_revision_found_and_missing() {
    let executor = MockExecutor::new().respond("2024.03.01_09.00.00/REVISION", "abc123\n");
    let history = RemoteReleaseHistory::new(executor, "/srv/app");

    let found = history
        .revision_of(&release("2024.03.01_09.00.00"))
        .await
        .unwrap();
    assert_eq!(found.unwrap().as_str(), "abc123");

    let missing = history
        .revision_of(&release("2024.02.28_17.30.00"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_deploy_root_with_spaces_is_quoted() {
    let executor = Arc::new(MockExecutor::new());
    let history = RemoteReleaseHistory::new(executor.clone(), "/srv/my app");
    history.current_release_name().await.unwrap();

    assert_eq!(
        executor.commands(),
        vec!["if [ -h '/srv/my app/current' ]; then readlink '/srv/my app/current'; fi".to_string()]
    );
}
