mod common;

use common::ScriptedRunner;
use foreman::config::WorkflowConfig;
use foreman::deploy;
use foreman::git::GitRef;
use foreman::release::{self, ReleaseOutcome};
use tempfile::TempDir;

#[test]
fn deploy_refuses_a_branch_other_than_its_own() {
    let work = TempDir::new().unwrap();
    let config = WorkflowConfig::default();
    let runner = ScriptedRunner::new();
    let world = deploy::find(&config.deploy, "deploy-world").unwrap();

    let err = deploy::run(world, work.path(), &GitRef::branch("master"), &runner).unwrap_err();

    assert_eq!(err.code.as_str(), "deploy.branch_not_allowed");
    assert!(runner.calls().is_empty());
}

#[test]
fn unknown_target_lists_the_configured_ones() {
    let config = WorkflowConfig::default();
    let err = deploy::find(&config.deploy, "deploy-staging").unwrap_err();

    assert_eq!(err.code.as_str(), "deploy.target_not_found");
    assert_eq!(err.details["available"][0], "deploy-dev");
}

#[test]
fn tag_refs_use_the_sanitized_tag_as_version() {
    let git_ref = GitRef {
        branch: None,
        tag: Some("release/2024 spring".to_string()),
    };
    assert_eq!(release::version_token(&git_ref).unwrap(), "release-2024-spring");
}

#[test]
fn non_release_ref_packages_nothing() {
    let work = TempDir::new().unwrap();
    let config = WorkflowConfig::default();
    let runner = ScriptedRunner::new();

    let outcome = release::run(
        &config.package,
        work.path(),
        &GitRef::branch("renovate/django-5.x"),
        &runner,
    )
    .unwrap();

    assert!(matches!(outcome, ReleaseOutcome::Skipped { .. }));
    assert!(runner.calls().is_empty());
    assert!(!work.path().join("dist").exists());
}
