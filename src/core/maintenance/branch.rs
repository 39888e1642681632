//! Bot branch reset and compare-and-swap publication.

use serde::Serialize;

use crate::config::AuthorConfig;
use crate::error::{Error, Result};
use crate::git::Git;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// The remote branch already holds an identical tree.
    Unchanged { tip: String },
    Pushed {
        commit: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous: Option<String>,
    },
}

/// Recreate `branch` from `<remote>/<base>`, discarding any local copy.
pub fn reset(git: &Git, remote: &str, base: &str, branch: &str) -> Result<()> {
    let upstream = format!("{}/{}", remote, base);
    git.run(&["fetch", remote, base])?;
    git.run(&["checkout", "--force", "--detach", &upstream])?;
    // Absent locally is fine.
    let _ = git.output(&["branch", "-D", branch]);
    git.run(&["checkout", "-b", branch])?;
    Ok(())
}

/// Stage the paths that exist in the working tree.
pub fn stage(git: &Git, paths: &[String]) -> Result<Vec<String>> {
    let mut staged = Vec::new();
    for path in paths {
        if git.dir().join(path).exists() {
            git.run(&["add", "--all", "--", path])?;
            staged.push(path.clone());
        }
    }
    Ok(staged)
}

pub fn commit(git: &Git, author: &AuthorConfig, message: &str) -> Result<String> {
    let name = format!("user.name={}", author.name);
    let email = format!("user.email={}", author.email);
    git.run(&["-c", &name, "-c", &email, "commit", "--no-verify", "-m", message])?;
    git.head()
}

/// Push HEAD to `branch` only if the remote still points at `expected_tip`
/// (absent when the branch did not exist). Identical trees are not pushed.
pub fn publish(
    git: &Git,
    remote: &str,
    branch: &str,
    expected_tip: Option<&str>,
) -> Result<PublishOutcome> {
    let commit = git.head()?;

    if let Some(tip) = expected_tip {
        let _ = git.output(&["fetch", remote, branch]);
        let remote_tree = git.tree_of(tip);
        if remote_tree.is_some() && remote_tree == git.tree_of("HEAD") {
            log_status!("maintain", "{} already up to date at {}", branch, tip);
            return Ok(PublishOutcome::Unchanged {
                tip: tip.to_string(),
            });
        }
    }

    let lease = format!(
        "--force-with-lease=refs/heads/{}:{}",
        branch,
        expected_tip.unwrap_or_default()
    );
    let refspec = format!("HEAD:refs/heads/{}", branch);
    let out = git.output(&["push", &lease, remote, &refspec]);

    if !out.success {
        let stderr = out.error_text();
        if stderr.contains("stale info") || stderr.contains("rejected") {
            return Err(Error::git_publish_rejected(branch, stderr));
        }
        return Err(Error::git_command_failed(format!("git push failed: {}", stderr)));
    }

    log_status!("maintain", "Pushed {} to {}/{}", commit, remote, branch);
    Ok(PublishOutcome::Pushed {
        commit,
        previous: expected_tip.map(String::from),
    })
}
