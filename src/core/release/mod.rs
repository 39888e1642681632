//! Branch-gated packaging and upload of the release archive.

mod archive;
mod upload;
mod version;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::PackageConfig;
use crate::error::{Error, Result};
use crate::git::GitRef;
use crate::paths;
use crate::runner::{CommandRunner, CommandSpec};
use crate::utils::artifact;
use crate::utils::io;
use crate::utils::shell;
use crate::utils::template::{self, TemplateVars};

pub use archive::{inspect, ArtifactInfo};
pub use upload::{destination, scp_spec, UploadReport};
pub use version::{is_release_ref, sanitize, version_token};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The ref is not on the allow-list; nothing was built.
    Skipped { reason: String },
    Released {
        version: String,
        artifact: ArtifactInfo,
        #[serde(skip_serializing_if = "Option::is_none")]
        upload: Option<UploadReport>,
        /// Built by an earlier attempt and uploaded without rebuilding.
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        reused: bool,
    },
}

/// Build, verify and upload when the ref is allowed to release.
pub fn run(
    config: &PackageConfig,
    root: &Path,
    git_ref: &GitRef,
    runner: &dyn CommandRunner,
) -> Result<ReleaseOutcome> {
    if !is_release_ref(git_ref, &config.branches) {
        let reason = format!(
            "'{}' is not a release ref ({})",
            git_ref.name().unwrap_or("<none>"),
            config.branches.join(", ")
        );
        log_status!("release", "Skipping: {}", reason);
        return Ok(ReleaseOutcome::Skipped { reason });
    }

    let script = config
        .script
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::config_missing_key("package.script", None))?;

    let token = version_token(git_ref)?;
    let prefix = format!("{}-{}", config.name, token);
    let output_dir = paths::resolve_in(root, &config.output_dir);
    io::ensure_dir(&output_dir, "create package output directory")?;

    let existing = artifact::files_with_prefix(&output_dir, &prefix)?;
    let (produced, reused) = match existing.as_slice() {
        [] => (build(script, root, &output_dir, &prefix, &token, runner)?, false),
        [previous] => {
            log_status!("release", "Reusing {} from an earlier attempt", previous.display());
            (previous.clone(), true)
        }
        several => {
            let names: Vec<String> = several
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            return Err(Error::release_artifact_invalid(
                names.join(", "),
                "Several artifacts exist for this version",
            )
            .with_hint(format!("Remove all but one of: {}", names.join(", "))));
        }
    };

    let info = inspect(&produced, config.verify_archive || reused).map_err(|e| {
        if reused {
            e.with_hint(format!(
                "Remove {} so the next run rebuilds it; release artifacts are never overwritten",
                produced.display()
            ))
        } else {
            e
        }
    })?;
    log_status!("release", "{} sha256={}", info.path, info.sha256);

    let upload = match &config.upload {
        Some(target) => Some(upload::upload(target, &produced, runner)?),
        None => None,
    };

    Ok(ReleaseOutcome::Released {
        version: token,
        artifact: info,
        upload,
        reused,
    })
}

/// Run the build script with `{{output}}` and `{{version}}` filled in and
/// return the single file it produced.
fn build(
    script: &str,
    root: &Path,
    output_dir: &Path,
    prefix: &str,
    token: &str,
    runner: &dyn CommandRunner,
) -> Result<PathBuf> {
    let output = output_dir.join(prefix);
    let output_str = output.to_string_lossy().to_string();
    let mut command = template::render(
        script,
        &[
            (TemplateVars::OUTPUT, &shell::quote_arg(&output_str)),
            (TemplateVars::VERSION, token),
        ],
    );
    if !template::is_present(script, TemplateVars::OUTPUT) {
        command = format!("{} {}", command, shell::quote_arg(&output_str));
    }

    let spec = CommandSpec::shell(&command).in_dir(root);
    log_status!("release", "$ {}", command);
    let out = runner.run(&spec);
    if !out.success {
        return Err(Error::release_build_failed(out.failure_details(&spec)));
    }

    artifact::resolve_single(output_dir, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::runner::CommandOutput;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes a zip to the path embedded in the build command.
    struct Builder {
        upload_ok: bool,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl Builder {
        fn new(upload_ok: bool) -> Self {
            Self {
                upload_ok,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for Builder {
        fn run(&self, spec: &CommandSpec) -> CommandOutput {
            self.calls.lock().unwrap().push(spec.clone());
            if spec.program == "scp" {
                return CommandOutput {
                    success: self.upload_ok,
                    exit_code: if self.upload_ok { 0 } else { 255 },
                    stderr: "Permission denied (publickey)".to_string(),
                    ..Default::default()
                };
            }
            let line = spec.display();
            let target = line
                .split_whitespace()
                .last()
                .unwrap()
                .trim_matches('\'')
                .to_string();
            let file = File::create(format!("{}.pyz", target)).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("__main__.py", zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(b"pass\n").unwrap();
            zip.finish().unwrap();
            CommandOutput {
                success: true,
                ..Default::default()
            }
        }
    }

    fn package() -> PackageConfig {
        WorkflowConfig::default().package
    }

    #[test]
    fn feature_branch_is_skipped_without_running_anything() {
        let dir = TempDir::new().unwrap();
        let runner = Builder::new(true);
        let outcome = run(&package(), dir.path(), &GitRef::branch("feature/x"), &runner).unwrap();

        assert!(matches!(outcome, ReleaseOutcome::Skipped { .. }));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn master_builds_verifies_and_uploads() {
        let dir = TempDir::new().unwrap();
        let runner = Builder::new(true);
        let outcome = run(&package(), dir.path(), &GitRef::branch("master"), &runner).unwrap();

        match outcome {
            ReleaseOutcome::Released {
                version,
                artifact,
                upload,
                reused,
            } => {
                assert!(!reused);
                assert_eq!(version, "master");
                assert!(artifact.path.ends_with("karrot-backend-master.pyz"));
                assert_eq!(artifact.entries, Some(1));
                assert_eq!(
                    upload.unwrap().destination,
                    "releases@karrot.world:/var/www/releases/karrot-backend/"
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].program, "scp");
    }

    #[test]
    fn upload_failure_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let runner = Builder::new(false);
        let err = run(&package(), dir.path(), &GitRef::branch("production"), &runner).unwrap_err();

        assert_eq!(err.code.as_str(), "release.upload_failed");
        let scp_calls = runner
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program == "scp")
            .count();
        assert_eq!(scp_calls, 1);
    }

    #[test]
    fn invalid_leftover_artifact_blocks_rebuild() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/karrot-backend-master.pyz"), "old").unwrap();
        let runner = Builder::new(true);

        let err = run(&package(), dir.path(), &GitRef::branch("master"), &runner).unwrap_err();
        assert_eq!(err.code.as_str(), "release.artifact_invalid");
        assert!(err.hints.iter().any(|h| h.message.contains("karrot-backend-master.pyz")));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn restart_after_upload_failure_reuses_the_built_artifact() {
        let dir = TempDir::new().unwrap();
        let failing = Builder::new(false);
        let err = run(&package(), dir.path(), &GitRef::branch("master"), &failing).unwrap_err();
        assert_eq!(err.code.as_str(), "release.upload_failed");
        let built = fs::read(dir.path().join("dist/karrot-backend-master.pyz")).unwrap();

        let runner = Builder::new(true);
        let outcome = run(&package(), dir.path(), &GitRef::branch("master"), &runner).unwrap();
        match outcome {
            ReleaseOutcome::Released { reused, upload, .. } => {
                assert!(reused);
                assert!(upload.is_some());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "scp");
        assert_eq!(
            fs::read(dir.path().join("dist/karrot-backend-master.pyz")).unwrap(),
            built
        );
    }

    #[test]
    fn tag_name_is_sanitized_into_artifact_name() {
        let dir = TempDir::new().unwrap();
        let mut cfg = package();
        cfg.branches.push("release/*".to_string());
        cfg.upload = None;
        let runner = Builder::new(true);

        let outcome = run(&cfg, dir.path(), &GitRef::branch("release/2024 spring"), &runner).unwrap();
        match outcome {
            ReleaseOutcome::Released { version, upload, .. } => {
                assert_eq!(version, "release-2024-spring");
                assert!(upload.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
