use serde::Serialize;

use super::Git;

pub const BRANCH_ENV: &str = "CIRCLE_BRANCH";
pub const TAG_ENV: &str = "CIRCLE_TAG";

/// The ref a pipeline run builds: a branch, a tag, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl GitRef {
    pub fn branch(name: &str) -> Self {
        Self {
            branch: Some(name.to_string()),
            tag: None,
        }
    }

    pub fn tag(name: &str) -> Self {
        Self {
            branch: None,
            tag: Some(name.to_string()),
        }
    }

    /// Command-line values first, then the CI environment, then the
    /// working tree.
    pub fn resolve(branch: Option<String>, tag: Option<String>, git: &Git) -> Self {
        let env = |key: &str| std::env::var(key).ok();
        Self {
            branch: first_present([branch, env(BRANCH_ENV)]).or_else(|| git.current_branch()),
            tag: first_present([tag, env(TAG_ENV)]).or_else(|| git.exact_tag()),
        }
    }

    /// Name used for release naming: the tag when present, else the branch.
    pub fn name(&self) -> Option<&str> {
        self.tag.as_deref().or(self.branch.as_deref())
    }

    pub fn is_branch(&self, name: &str) -> bool {
        self.branch.as_deref() == Some(name)
    }
}

fn first_present<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
