use super::ErrorCode;

pub fn all_codes() -> &'static [ErrorCode] {
    &[
        ErrorCode::ConfigMissingKey,
        ErrorCode::ConfigInvalidYaml,
        ErrorCode::ConfigInvalidValue,
        ErrorCode::ValidationMissingArgument,
        ErrorCode::ValidationInvalidArgument,
        ErrorCode::DeployTargetNotFound,
        ErrorCode::ProvisionFailed,
        ErrorCode::CacheEntryInvalid,
        ErrorCode::VerifyMigrationDrift,
        ErrorCode::VerifyMessageDrift,
        ErrorCode::VerifyTestsFailed,
        ErrorCode::ReleaseBuildFailed,
        ErrorCode::ReleaseArtifactInvalid,
        ErrorCode::ReleaseUploadFailed,
        ErrorCode::DeployBranchNotAllowed,
        ErrorCode::DeployFailed,
        ErrorCode::MessagesPushFailed,
        ErrorCode::GitCommandFailed,
        ErrorCode::GitPublishRejected,
        ErrorCode::PullRequestFailed,
        ErrorCode::MaintenanceCommandFailed,
        ErrorCode::LockHeld,
        ErrorCode::InternalIoError,
        ErrorCode::InternalJsonError,
        ErrorCode::InternalUnexpected,
    ]
}

pub fn parse_code(code: &str) -> Option<ErrorCode> {
    all_codes()
        .iter()
        .copied()
        .find(|candidate| candidate.as_str() == code)
}
