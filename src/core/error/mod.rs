use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod codes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidYaml,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    DeployTargetNotFound,

    ProvisionFailed,
    CacheEntryInvalid,

    VerifyMigrationDrift,
    VerifyMessageDrift,
    VerifyTestsFailed,

    ReleaseBuildFailed,
    ReleaseArtifactInvalid,
    ReleaseUploadFailed,

    DeployBranchNotAllowed,
    DeployFailed,
    MessagesPushFailed,

    GitCommandFailed,
    GitPublishRejected,
    PullRequestFailed,

    MaintenanceCommandFailed,
    LockHeld,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidYaml => "config.invalid_yaml",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::DeployTargetNotFound => "deploy.target_not_found",

            ErrorCode::ProvisionFailed => "provision.failed",
            ErrorCode::CacheEntryInvalid => "cache.entry_invalid",

            ErrorCode::VerifyMigrationDrift => "verify.migration_drift",
            ErrorCode::VerifyMessageDrift => "verify.message_drift",
            ErrorCode::VerifyTestsFailed => "verify.tests_failed",

            ErrorCode::ReleaseBuildFailed => "release.build_failed",
            ErrorCode::ReleaseArtifactInvalid => "release.artifact_invalid",
            ErrorCode::ReleaseUploadFailed => "release.upload_failed",

            ErrorCode::DeployBranchNotAllowed => "deploy.branch_not_allowed",
            ErrorCode::DeployFailed => "deploy.failed",
            ErrorCode::MessagesPushFailed => "messages.push_failed",

            ErrorCode::GitCommandFailed => "git.command_failed",
            ErrorCode::GitPublishRejected => "git.publish_rejected",
            ErrorCode::PullRequestFailed => "pull_request.failed",

            ErrorCode::MaintenanceCommandFailed => "maintain.command_failed",
            ErrorCode::LockHeld => "lock.held",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidYamlDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Captured result of an external command that failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftDetails {
    pub check: String,
    pub command: String,
    pub changes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHeldDetails {
    pub job: String,
    pub holder_id: String,
    pub expires_at: String,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn deploy_target_not_found(id: impl Into<String>, available: Vec<String>) -> Self {
        Self::not_found(
            ErrorCode::DeployTargetNotFound,
            "Deploy target not found",
            id,
            available,
        )
        .with_hint("Run 'foreman config show' to see configured deploy targets")
    }

    fn not_found(
        code: ErrorCode,
        message: &str,
        id: impl Into<String>,
        available: Vec<String>,
    ) -> Self {
        Self::new(
            code,
            message,
            to_details(NotFoundDetails {
                id: id.into(),
                available,
            }),
        )
    }

    pub fn provision_failed(details: CommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::ProvisionFailed,
            format!("Environment provisioning failed: {}", details.command),
            to_details(details),
        )
        .with_hint("Nothing was written to the cache; fix the dependency error and re-run")
    }

    pub fn cache_entry_invalid(key: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CacheEntryInvalid,
            "Cache entry is invalid",
            serde_json::json!({ "key": key.into(), "problem": problem.into() }),
        )
    }

    pub fn verify_migration_drift(command: impl Into<String>, changes: Vec<String>) -> Self {
        Self::new(
            ErrorCode::VerifyMigrationDrift,
            "Model changes without a migration",
            to_details(DriftDetails {
                check: "migration_drift".to_string(),
                command: command.into(),
                changes,
            }),
        )
        .with_hint("Generate the missing migration and commit it")
    }

    pub fn verify_message_drift(command: impl Into<String>, changes: Vec<String>) -> Self {
        Self::new(
            ErrorCode::VerifyMessageDrift,
            "Message catalog is out of date",
            to_details(DriftDetails {
                check: "message_drift".to_string(),
                command: command.into(),
                changes,
            }),
        )
        .with_hint("Re-run message extraction locally and commit the updated catalog")
    }

    pub fn verify_tests_failed(details: CommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::VerifyTestsFailed,
            "Test suite failed",
            to_details(details),
        )
    }

    pub fn release_build_failed(details: CommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::ReleaseBuildFailed,
            "Packaging script failed",
            to_details(details),
        )
    }

    pub fn release_artifact_invalid(path: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ReleaseArtifactInvalid,
            "Build artifact is invalid",
            serde_json::json!({ "path": path.into(), "problem": problem.into() }),
        )
    }

    pub fn release_upload_failed(details: CommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::ReleaseUploadFailed,
            "Artifact upload failed",
            to_details(details),
        )
    }

    pub fn deploy_branch_not_allowed(
        target: impl Into<String>,
        expected: impl Into<String>,
        actual: Option<String>,
    ) -> Self {
        Self::new(
            ErrorCode::DeployBranchNotAllowed,
            "Deploy target is not enabled for this ref",
            serde_json::json!({
                "target": target.into(),
                "expectedBranch": expected.into(),
                "actualBranch": actual,
            }),
        )
    }

    pub fn deploy_failed(target: impl Into<String>, details: CommandFailedDetails) -> Self {
        let target = target.into();
        Self::new(
            ErrorCode::DeployFailed,
            format!("Deploy to '{}' failed", target),
            serde_json::json!({ "target": target, "command": to_details(details) }),
        )
    }

    pub fn messages_push_failed(details: CommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::MessagesPushFailed,
            "Pushing source messages to the translation service failed",
            to_details(details),
        )
    }

    pub fn git_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn git_publish_rejected(branch: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitPublishRejected,
            "Remote branch moved during publish",
            serde_json::json!({ "branch": branch.into(), "stderr": stderr.into() }),
        )
        .with_hint("Another run updated the branch first; re-run the job")
    }

    pub fn pull_request_failed(message: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::PullRequestFailed,
            message,
            serde_json::json!({ "context": context }),
        )
    }

    pub fn maintenance_command_failed(job: impl Into<String>, details: CommandFailedDetails) -> Self {
        let job = job.into();
        Self::new(
            ErrorCode::MaintenanceCommandFailed,
            format!("Scheduled job '{}' failed before publishing", job),
            serde_json::json!({ "job": job, "command": to_details(details) }),
        )
        .with_hint("The bot branch and pull request were left untouched")
    }

    pub fn lock_held(details: LockHeldDetails) -> Self {
        Self::new(
            ErrorCode::LockHeld,
            format!("Job '{}' is already running", details.job),
            to_details(details),
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            to_details(ConfigMissingKeyDetails {
                key: key.into(),
                path,
            }),
        )
    }

    pub fn config_invalid_yaml(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidYaml,
            "Invalid YAML in configuration",
            to_details(ConfigInvalidYamlDetails {
                path: path.into(),
                error: err.to_string(),
            }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            to_details(ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem: problem.into(),
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalJsonErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::internal_unexpected(message)
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}
