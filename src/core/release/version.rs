use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::git::GitRef;

static DISALLOWED_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9.\-]+").unwrap());

/// Replace every run of characters outside `[A-Za-z0-9.-]` with one `-`.
pub fn sanitize(raw: &str) -> String {
    DISALLOWED_RUN.replace_all(raw, "-").into_owned()
}

/// Filename-safe token for the ref: the tag if present, else the branch.
pub fn version_token(git_ref: &GitRef) -> Result<String> {
    let name = git_ref
        .name()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| {
            Error::validation_missing_argument(vec!["branch".to_string(), "tag".to_string()])
                .with_hint("Pass --branch or --tag, or run inside a checked-out branch")
        })?;
    Ok(sanitize(name))
}

/// Whether the branch or tag matches any allow-list pattern.
pub fn is_release_ref(git_ref: &GitRef, allow: &[String]) -> bool {
    let names = [git_ref.branch.as_deref(), git_ref.tag.as_deref()];
    names
        .into_iter()
        .flatten()
        .any(|name| allow.iter().any(|pattern| glob_match::glob_match(pattern, name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slashes_and_spaces_become_hyphens() {
        assert_eq!(sanitize("feature/new login"), "feature-new-login");
    }

    #[test]
    fn runs_collapse_to_one_hyphen() {
        assert_eq!(sanitize("fix//@@weird__name"), "fix-weird-name");
        assert_eq!(sanitize("a-/-b"), "a---b");
    }

    #[test]
    fn allowed_characters_are_kept() {
        assert_eq!(sanitize("v9.1.0-rc.1"), "v9.1.0-rc.1");
    }

    #[test]
    fn output_stays_in_allowed_class() {
        let token = sanitize("ümlaut/ß:*?\"<>|tag");
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-'));
        assert!(!token.contains("--"));
    }

    #[test]
    fn tag_wins_over_branch() {
        let r = GitRef {
            branch: Some("master".to_string()),
            tag: Some("v2024.03".to_string()),
        };
        assert_eq!(version_token(&r).unwrap(), "v2024.03");
    }

    #[test]
    fn empty_ref_is_an_error() {
        let err = version_token(&GitRef::default()).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.missing_argument");
        assert!(version_token(&GitRef::branch("  ")).is_err());
    }

    #[test]
    fn allow_list_matches_branch_or_tag() {
        let allow = vec!["master".to_string(), "production".to_string(), "v*".to_string()];
        assert!(is_release_ref(&GitRef::branch("master"), &allow));
        assert!(is_release_ref(&GitRef::tag("v1.2.0"), &allow));
        assert!(!is_release_ref(&GitRef::branch("feature/x"), &allow));
        assert!(!is_release_ref(&GitRef::default(), &allow));
    }
}
