//! Weekly dependency-lock refresh.

use std::sync::LazyLock;

use regex::Regex;

use super::{run_job, JobDefinition, MaintenanceContext, MaintenanceOutcome};
use crate::config::{DependencyJobConfig, MarkerPatch};
use crate::error::Result;
use crate::paths;
use crate::utils::io;

pub const JOB_NAME: &str = "dependencies";

/// Requirement name, optional extras, then a version operator.
static REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)(\[[^\]]*\])?\s*(==|>=|<=|~=|!=|<|>)").unwrap()
});

pub fn run(ctx: &MaintenanceContext, job: &DependencyJobConfig) -> Result<MaintenanceOutcome> {
    let mut paths = vec![job.lock_file.clone()];
    paths.extend(job.extra_paths.iter().cloned());

    let definition = JobDefinition {
        name: JOB_NAME,
        branch: &job.branch,
        paths,
        commit_message: &job.commit_message,
        pull_request: &job.pull_request,
    };

    run_job(ctx, &definition, |ctx| {
        ctx.run_command(JOB_NAME, &job.compile)?;
        for command in &job.extra_commands {
            ctx.run_command(JOB_NAME, command)?;
        }
        rewrite_lock_file(ctx, job)
    })
}

fn rewrite_lock_file(ctx: &MaintenanceContext, job: &DependencyJobConfig) -> Result<Vec<String>> {
    let path = paths::resolve_in(ctx.root, &job.lock_file);
    let original = io::read_file(&path, "read dependency lock file")?;

    let mut text = strip_annotations(&original);
    let mut notes = Vec::new();
    if let Some(patch) = &job.marker_patch {
        let (patched, changed) = apply_marker_patch(&text, patch);
        if changed {
            notes.push(format!("Added marker to {}", patch.package));
        }
        text = patched;
    }

    if text != original {
        io::write_file(&path, &text, "write dependency lock file")?;
    }
    Ok(notes)
}

/// Drop `# via` annotations, indented comment lines and inline `# via`
/// suffixes left by the lock compiler.
pub fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_start();
        let indented = trimmed.len() != line.len();
        if trimmed.starts_with('#') && (indented || is_via_comment(trimmed)) {
            continue;
        }
        let kept = match line.find("# via") {
            Some(idx) if idx > 0 => line[..idx].trim_end(),
            _ => line,
        };
        out.push_str(kept);
        out.push('\n');
    }
    if !text.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }
    out
}

fn is_via_comment(comment: &str) -> bool {
    comment.trim_start_matches('#').trim_start().starts_with("via ")
}

/// PEP 503 name normalization.
fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .split(|c| c == '-' || c == '_' || c == '.')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Append the environment marker to the pin for `patch.package`. Lines that
/// already carry a marker are left alone.
pub fn apply_marker_patch(text: &str, patch: &MarkerPatch) -> (String, bool) {
    let wanted = normalize_name(&patch.package);

    let mut changed = false;
    let mut lines = Vec::new();
    for line in text.lines() {
        let matches = REQUIREMENT
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|name| normalize_name(name.as_str()) == wanted)
            .unwrap_or(false);

        if matches && !line.contains(';') {
            let (pin, continuation) = match line.trim_end().strip_suffix('\\') {
                Some(pin) => (pin.trim_end(), " \\"),
                None => (line.trim_end(), ""),
            };
            lines.push(format!("{} ; {}{}", pin, patch.marker, continuation));
            changed = true;
        } else {
            lines.push(line.to_string());
        }
    }

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    (out, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch() -> MarkerPatch {
        MarkerPatch {
            package: "backports.zoneinfo".to_string(),
            marker: "python_version < \"3.9\"".to_string(),
        }
    }

    #[test]
    fn marker_added_to_matching_pin() {
        let text = "asgiref==3.7.2\nbackports-zoneinfo==0.2.1\ndjango==4.2.7\n";
        let (out, changed) = apply_marker_patch(text, &patch());

        assert!(changed);
        assert_eq!(
            out,
            "asgiref==3.7.2\nbackports-zoneinfo==0.2.1 ; python_version < \"3.9\"\ndjango==4.2.7\n"
        );
    }

    #[test]
    fn marker_patch_is_idempotent() {
        let text = "backports.zoneinfo==0.2.1\n";
        let (once, _) = apply_marker_patch(text, &patch());
        let (twice, changed) = apply_marker_patch(&once, &patch());

        assert!(!changed);
        assert_eq!(once, twice);
    }

    #[test]
    fn similar_names_are_not_patched() {
        let text = "backports-zoneinfo-extra==1.0\nzoneinfo==1.0\n";
        let (out, changed) = apply_marker_patch(text, &patch());
        assert!(!changed);
        assert_eq!(out, text);
    }

    #[test]
    fn hash_continuation_is_preserved() {
        let text = "backports.zoneinfo==0.2.1 \\\n    --hash=sha256:abc\n";
        let (out, _) = apply_marker_patch(text, &patch());
        assert!(out.starts_with("backports.zoneinfo==0.2.1 ; python_version < \"3.9\" \\\n"));
    }

    #[test]
    fn annotations_are_stripped() {
        let text = "#\n# This file is autogenerated by pip-compile\n#\ndjango==4.2.7\n    # via -r requirements.in\nsqlparse==0.4.4  # via django\n# via celery\n";
        assert_eq!(
            strip_annotations(text),
            "#\n# This file is autogenerated by pip-compile\n#\ndjango==4.2.7\nsqlparse==0.4.4\n"
        );
    }

    #[test]
    fn names_normalize_per_pep503() {
        assert_eq!(normalize_name("Backports.ZoneInfo"), "backports-zoneinfo");
        assert_eq!(normalize_name("backports__zoneinfo"), "backports-zoneinfo");
    }
}
