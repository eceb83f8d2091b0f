use std::fs;

use regauth_core::{
    CredentialBackend, CredentialEntry, FileCredentialStore, LogoutOutcome, ScopeKey,
    SessionManager, StoreError, SystemContext,
};
use tempfile::TempDir;

fn scope(raw: &str) -> ScopeKey {
    ScopeKey::parse(raw).unwrap()
}

fn seeded_store(dir: &TempDir, scopes: &[&str]) -> FileCredentialStore {
    let mut store = FileCredentialStore::new(dir.path().join("auth.json"));
    for raw in scopes {
        store
            .put(CredentialEntry::new_basic(scope(raw), "user", "secret"))
            .unwrap();
    }
    store
}

fn logout(
    manager: &mut SessionManager<FileCredentialStore>,
    targets: &[&str],
    accept_repositories: bool,
) -> (regauth_core::LogoutReport, String) {
    let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
    let mut out = Vec::new();
    let report = manager.logout(&targets, accept_repositories, &mut out).unwrap();
    (report, String::from_utf8(out).unwrap())
}

#[test]
fn test_logout_removes_and_persists() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, &["quay.io", "ghcr.io"]);
    let mut manager = SessionManager::new(store, SystemContext::default());

    let (report, output) = logout(&mut manager, &["quay.io"], true);
    assert!(report.is_success());
    assert_eq!(output, "Removed login credentials for quay.io\n");

    let reopened = FileCredentialStore::new(dir.path().join("auth.json"));
    assert_eq!(reopened.keys().unwrap(), vec![scope("ghcr.io")]);

    let (report, output) = logout(&mut manager, &["quay.io"], true);
    assert!(report.is_success());
    assert_eq!(output, "Not logged into quay.io\n");
}

#[test]
fn test_repository_target_rejected_without_acceptance() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir, &["quay.io/myrepo", "ghcr.io"]);
    let mut manager = SessionManager::new(store, SystemContext::default());

    let (report, _) = logout(&mut manager, &["quay.io/myrepo", "ghcr.io"], false);
    assert!(!report.is_success());
    assert!(matches!(
        report.results[0].outcome,
        LogoutOutcome::Failed(StoreError::ScopeNotSupported { .. })
    ));
    assert!(matches!(report.results[1].outcome, LogoutOutcome::Removed));
    assert_eq!(manager.store().keys().unwrap(), vec![scope("quay.io/myrepo")]);
}

#[test]
fn test_corrupt_store_fails_every_target() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("auth.json");
    fs::write(&path, "not json at all").unwrap();
    let mut manager = SessionManager::new(FileCredentialStore::new(&path), SystemContext::default());

    let (report, output) = logout(&mut manager, &["quay.io", "ghcr.io"], true);
    assert_eq!(report.failures().count(), 2);
    assert_eq!(output.lines().count(), 2);
    assert!(output.lines().all(|line| line.starts_with("Failed to log out of")));
}

#[test]
fn test_docker_login_hint() {
    let dir = TempDir::new().unwrap();
    let docker_path = dir.path().join("config.json");
    fs::write(
        &docker_path,
        r#"{"auths": {"https://index.docker.io/v1/": {"auth": "ZG9ja2VyOnBhc3M="}}}"#,
    )
    .unwrap();

    let store = seeded_store(&dir, &[]);
    let mut manager = SessionManager::new(store, SystemContext::default())
        .with_docker_config(FileCredentialStore::new(&docker_path));

    let (report, output) = logout(&mut manager, &["docker.io"], true);
    assert!(report.is_success());
    assert!(matches!(
        report.results[0].outcome,
        LogoutOutcome::NotLoggedIn { via_docker: true }
    ));
    assert!(output.contains("Please use docker logout instead."));
    // The Docker config is never modified.
    assert!(fs::read_to_string(&docker_path).unwrap().contains("index.docker.io"));
}
