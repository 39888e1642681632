//! Pull request lookup and creation.

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{MaintenanceConfig, PullRequestTemplate};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    #[serde(rename(deserialize = "html_url"))]
    pub html_url: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PullRequestOutcome {
    Opened { pull_request: PullRequest },
    Reused { pull_request: PullRequest },
}

impl PullRequestOutcome {
    pub fn pull_request(&self) -> &PullRequest {
        match self {
            PullRequestOutcome::Opened { pull_request }
            | PullRequestOutcome::Reused { pull_request } => pull_request,
        }
    }
}

pub trait PullRequestHost: Send + Sync {
    /// Open pull request from `head` into `base`, if one exists.
    fn find_open(&self, head: &str, base: &str) -> Result<Option<PullRequest>>;

    fn create(&self, head: &str, base: &str, template: &PullRequestTemplate) -> Result<PullRequest>;
}

/// Reuse the open pull request for `head`, otherwise open one.
pub fn ensure(
    host: &dyn PullRequestHost,
    head: &str,
    base: &str,
    template: &PullRequestTemplate,
) -> Result<PullRequestOutcome> {
    if let Some(pull_request) = host.find_open(head, base)? {
        log_status!("maintain", "Reusing pull request #{}", pull_request.number);
        return Ok(PullRequestOutcome::Reused { pull_request });
    }

    match host.create(head, base, template) {
        Ok(pull_request) => {
            log_status!("maintain", "Opened pull request #{}", pull_request.number);
            Ok(PullRequestOutcome::Opened { pull_request })
        }
        // Another run opened it between lookup and create.
        Err(err) => match host.find_open(head, base)? {
            Some(pull_request) => Ok(PullRequestOutcome::Reused { pull_request }),
            None => Err(err),
        },
    }
}

/// GitHub REST client for one repository.
pub struct GitHubClient {
    client: Client,
    api_url: String,
    repository: String,
    token: Option<String>,
    token_env: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, repository: &str, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
            token,
            token_env: String::new(),
        }
    }

    /// Client configured from the maintenance section. The token is read
    /// from the environment variable it names; a missing token only fails
    /// once a request is made.
    pub fn from_config(config: &MaintenanceConfig) -> Self {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        let mut client = Self::new(&config.api_url, &config.repository, token);
        client.token_env = config.token_env.clone();
        client
    }

    fn owner(&self) -> &str {
        self.repository.split('/').next().unwrap_or_default()
    }

    fn pulls_url(&self) -> String {
        format!("{}/repos/{}/pulls", self.api_url, self.repository)
    }

    fn request(&self, builder: reqwest::blocking::RequestBuilder) -> Result<Response> {
        let token = self.token.as_deref().ok_or_else(|| {
            Error::config_missing_key(self.token_env.clone(), None).with_hint(format!(
                "Export {} with a token allowed to open pull requests",
                self.token_env
            ))
        })?;
        builder
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "foreman")
            .send()
            .map_err(|e| Error::pull_request_failed(format!("HTTP request failed: {}", e), None))
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(response: Response, context: &str) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| Error::pull_request_failed(format!("Failed to read response: {}", e), None))?;
    if !status.is_success() {
        return Err(Error::pull_request_failed(
            format!("GitHub API error: HTTP {}", status.as_u16()),
            Some(format!("{}: {}", context, body)),
        ));
    }
    serde_json::from_str(&body).map_err(|e| Error::internal_json(e.to_string(), Some(context.to_string())))
}

impl PullRequestHost for GitHubClient {
    fn find_open(&self, head: &str, base: &str) -> Result<Option<PullRequest>> {
        let head_ref = format!("{}:{}", self.owner(), head);
        let response = self.request(
            self.client
                .get(self.pulls_url())
                .query(&[("state", "open"), ("head", head_ref.as_str()), ("base", base)]),
        )?;
        let pulls: Vec<PullRequest> = parse_json(response, "list pull requests")?;
        Ok(pulls.into_iter().next())
    }

    fn create(&self, head: &str, base: &str, template: &PullRequestTemplate) -> Result<PullRequest> {
        let response = self.request(self.client.post(self.pulls_url()).json(&json!({
            "title": template.title,
            "body": template.body,
            "head": head,
            "base": base,
        })))?;
        parse_json(response, "create pull request")
    }
}
