use std::path::Path;

use serde::Serialize;

use crate::config::UploadConfig;
use crate::error::{Error, Result};
use crate::runner::{CommandRunner, CommandSpec};

const CONNECT_TIMEOUT_SECS: u32 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub destination: String,
    pub command: String,
}

pub fn destination(upload: &UploadConfig) -> String {
    format!("{}@{}:{}", upload.user, upload.host, upload.path)
}

/// Non-interactive `scp` invocation for one file.
pub fn scp_spec(upload: &UploadConfig, artifact: &Path) -> CommandSpec {
    let mut args = vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", CONNECT_TIMEOUT_SECS),
        "-P".to_string(),
        upload.port.to_string(),
    ];
    if let Some(identity) = &upload.identity_file {
        args.push("-i".to_string());
        args.push(shellexpand::tilde(identity).to_string());
    }
    args.push(artifact.to_string_lossy().to_string());
    args.push(destination(upload));
    CommandSpec::new("scp", args)
}

/// Upload once; a failure is returned as-is.
pub fn upload(upload: &UploadConfig, artifact: &Path, runner: &dyn CommandRunner) -> Result<UploadReport> {
    let spec = scp_spec(upload, artifact);
    log_status!("release", "Uploading {} to {}", artifact.display(), destination(upload));
    let out = runner.run(&spec);
    if !out.success {
        return Err(Error::release_upload_failed(out.failure_details(&spec)));
    }
    Ok(UploadReport {
        destination: destination(upload),
        command: spec.display(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> UploadConfig {
        UploadConfig {
            host: "karrot.world".to_string(),
            user: "releases".to_string(),
            port: 2222,
            path: "/var/www/releases/".to_string(),
            identity_file: Some("/keys/deploy".to_string()),
        }
    }

    #[test]
    fn scp_is_batch_mode_with_port_and_identity() {
        let spec = scp_spec(&config(), Path::new("dist/karrot-backend-master.pyz"));
        assert_eq!(spec.program, "scp");
        assert_eq!(
            spec.display(),
            "scp -o BatchMode=yes -o ConnectTimeout=10 -P 2222 -i /keys/deploy \
             dist/karrot-backend-master.pyz releases@karrot.world:/var/www/releases/"
        );
    }

    #[test]
    fn identity_is_optional() {
        let mut cfg = config();
        cfg.identity_file = None;
        let spec = scp_spec(&cfg, Path::new("a.pyz"));
        assert!(!spec.args.contains(&"-i".to_string()));
    }
}
