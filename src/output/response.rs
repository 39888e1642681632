//! CLI response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use foreman::error::Hint;
use foreman::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
                retryable: err.retryable,
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) {
    use std::io::{self, Write};

    let payload = match response.to_json() {
        Ok(payload) => payload,
        Err(err) => {
            eprintln!("[foreman] {}", err);
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        // SIGPIPE from a closed reader is not an error
        if e.kind() != io::ErrorKind::BrokenPipe {
            eprintln!("[foreman] write stdout: {}", e);
        }
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) {
    match result {
        Ok(data) => print_response(&CliResponse::success(data)),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

/// Serialize a command result; errors pick their exit code from the error code.
pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

pub fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidYaml
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::DeployTargetNotFound => 4,

        ErrorCode::LockHeld => 10,

        ErrorCode::ProvisionFailed
        | ErrorCode::CacheEntryInvalid
        | ErrorCode::ReleaseBuildFailed
        | ErrorCode::ReleaseArtifactInvalid
        | ErrorCode::ReleaseUploadFailed
        | ErrorCode::DeployBranchNotAllowed
        | ErrorCode::DeployFailed
        | ErrorCode::MessagesPushFailed
        | ErrorCode::GitCommandFailed
        | ErrorCode::GitPublishRejected
        | ErrorCode::PullRequestFailed
        | ErrorCode::MaintenanceCommandFailed => 20,

        ErrorCode::VerifyMigrationDrift
        | ErrorCode::VerifyMessageDrift
        | ErrorCode::VerifyTestsFailed => 30,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_exit_30() {
        assert_eq!(exit_code_for_error(ErrorCode::VerifyMigrationDrift), 30);
        assert_eq!(exit_code_for_error(ErrorCode::VerifyTestsFailed), 30);
    }

    #[test]
    fn every_code_has_nonzero_exit() {
        for code in foreman::error::codes::all_codes() {
            assert!(exit_code_for_error(*code) > 0, "{}", code.as_str());
        }
    }

    #[test]
    fn error_envelope_omits_empty_hints() {
        let err = Error::lock_held(foreman::error::LockHeldDetails {
            job: "locales".to_string(),
            holder_id: "abc".to_string(),
            expires_at: "2026-10-18T03:00:00+00:00".to_string(),
        });
        let value = serde_json::to_value(CliResponse::<()>::from_error(&err)).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "lock.held");
        assert!(value["error"].get("hints").is_none());
        assert!(value.get("data").is_none());
    }
}
