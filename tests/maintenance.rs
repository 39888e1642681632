mod common;

use std::fs;
use std::path::Path;

use chrono::Duration;
use common::{git, git_available, FakeHost, ScriptedRunner};
use foreman::config::{DependencyJobConfig, MaintenanceConfig, WorkflowConfig};
use foreman::maintenance::{
    dependencies, locales, JobLock, MaintenanceContext, MaintenanceOutcome, PublishOutcome,
    PullRequestOutcome,
};
use foreman::runner::{CommandRunner, ProcessRunner};
use tempfile::TempDir;

fn context<'a>(
    root: &'a Path,
    config: &'a MaintenanceConfig,
    runner: &'a dyn CommandRunner,
    host: &'a FakeHost,
    locks: &Path,
) -> MaintenanceContext<'a> {
    MaintenanceContext {
        root,
        config,
        runner,
        host,
        lock_dir: locks.to_path_buf(),
    }
}

#[test]
fn nothing_staged_means_no_commit_and_no_pull_request() {
    let work = TempDir::new().unwrap();
    let locks = TempDir::new().unwrap();
    fs::write(work.path().join("requirements.txt"), "django==4.2.7\n").unwrap();

    let config = WorkflowConfig::default().maintenance;
    let runner = ScriptedRunner::new();
    let host = FakeHost::default();
    let ctx = context(work.path(), &config, &runner, &host, locks.path());

    let outcome = locales::run(&ctx, &config.locales).unwrap();

    assert!(matches!(outcome, MaintenanceOutcome::NoChanges { .. }));
    assert!(runner.ran("tx pull --all --force --workers 4"));
    assert!(!runner.ran("commit"));
    assert!(!runner.ran("push"));
    assert_eq!(host.lookups(), 0);
    assert_eq!(host.created(), 0);
    assert!(!locks.path().join("locales.lock").exists());
}

#[test]
fn held_lock_refuses_before_touching_the_tree() {
    let work = TempDir::new().unwrap();
    let locks = TempDir::new().unwrap();
    let config = WorkflowConfig::default().maintenance;
    let runner = ScriptedRunner::new();
    let host = FakeHost::default();
    let ctx = context(work.path(), &config, &runner, &host, locks.path());

    let _held = JobLock::acquire(locks.path(), "dependencies", Duration::minutes(30)).unwrap();
    let err = dependencies::run(&ctx, &config.dependencies).unwrap_err();

    assert_eq!(err.code.as_str(), "lock.held");
    assert!(runner.calls().is_empty());
}

#[test]
fn failing_regeneration_aborts_without_publishing() {
    let work = TempDir::new().unwrap();
    let locks = TempDir::new().unwrap();
    let config = WorkflowConfig::default().maintenance;
    let runner = ScriptedRunner::new().fail("tx pull", "Error: 401 Unauthorized");
    let host = FakeHost::default();
    let ctx = context(work.path(), &config, &runner, &host, locks.path());

    let err = locales::run(&ctx, &config.locales).unwrap_err();

    assert_eq!(err.code.as_str(), "maintain.command_failed");
    assert!(!runner.ran("push"));
    assert_eq!(host.created(), 0);
}

/// Bare remote with `master` holding a pinned requirements file, plus a clone.
fn remote_and_clone(root: &Path, requirements: &str) -> std::path::PathBuf {
    let remote = root.join("remote.git");
    let work = root.join("work");
    fs::create_dir_all(&remote).unwrap();
    fs::create_dir_all(&work).unwrap();

    git(&remote, &["init", "--bare", "--quiet"]);
    git(&work, &["init", "--quiet"]);
    fs::write(work.join("requirements.txt"), requirements).unwrap();
    git(&work, &["add", "requirements.txt"]);
    git(&work, &["commit", "--quiet", "-m", "Initial"]);
    git(&work, &["remote", "add", "origin", &remote.to_string_lossy()]);
    git(&work, &["push", "--quiet", "origin", "HEAD:refs/heads/master"]);
    work
}

fn dependency_job(compile: &str) -> DependencyJobConfig {
    let mut job = WorkflowConfig::default().maintenance.dependencies;
    job.compile = compile.to_string();
    job.marker_patch = None;
    job.extra_paths = Vec::new();
    job
}

#[test]
fn repeated_dependency_runs_publish_once_and_reuse_the_pull_request() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let locks = TempDir::new().unwrap();
    let work = remote_and_clone(tmp.path(), "django==4.2.7\n");

    let config = WorkflowConfig::default().maintenance;
    let job = dependency_job("echo 'django==4.2.8  # via -r requirements.in' > requirements.txt");
    let runner = ProcessRunner::default();
    let host = FakeHost::default();
    let ctx = context(&work, &config, &runner, &host, locks.path());

    let first = dependencies::run(&ctx, &job).unwrap();
    let first_commit = match &first {
        MaintenanceOutcome::Published {
            commit,
            publish,
            pull_request,
            ..
        } => {
            assert!(matches!(publish, PublishOutcome::Pushed { previous: None, .. }));
            assert!(matches!(pull_request, PullRequestOutcome::Opened { .. }));
            commit.clone()
        }
        other => panic!("unexpected outcome: {:?}", other),
    };

    let second = dependencies::run(&ctx, &job).unwrap();
    match &second {
        MaintenanceOutcome::Published {
            publish,
            pull_request,
            ..
        } => {
            assert_eq!(
                publish,
                &PublishOutcome::Unchanged {
                    tip: first_commit.clone()
                }
            );
            assert!(matches!(pull_request, PullRequestOutcome::Reused { .. }));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(host.created(), 1);
    let tip = git(&work, &["ls-remote", "--heads", "origin", "refs/heads/update-dependencies"]);
    assert!(tip.starts_with(&first_commit));

    let published = git(&work, &["show", "origin/update-dependencies:requirements.txt"]);
    assert_eq!(published, "django==4.2.8");
}

#[test]
fn regeneration_matching_base_is_a_no_op() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let locks = TempDir::new().unwrap();
    let work = remote_and_clone(tmp.path(), "django==4.2.7\n");

    let config = WorkflowConfig::default().maintenance;
    let job = dependency_job("echo django==4.2.7 > requirements.txt");
    let runner = ProcessRunner::default();
    let host = FakeHost::default();
    let ctx = context(&work, &config, &runner, &host, locks.path());

    let outcome = dependencies::run(&ctx, &job).unwrap();

    assert!(matches!(outcome, MaintenanceOutcome::NoChanges { .. }));
    assert_eq!(host.lookups(), 0);
    let tip = git(&work, &["ls-remote", "--heads", "origin", "refs/heads/update-dependencies"]);
    assert!(tip.is_empty());
}
