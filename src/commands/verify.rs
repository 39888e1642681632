use clap::Args;

use foreman::verify::{self, VerifyReport};

use super::{CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct VerifyArgs {
    /// Override the test worker count
    #[arg(long)]
    pub workers: Option<u32>,
}

pub fn run(args: VerifyArgs, global: &GlobalArgs) -> CmdResult<VerifyReport> {
    let mut ws = Workspace::load(global)?;
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(foreman::Error::validation_invalid_argument(
                "workers",
                "Worker count must be at least 1",
                Some("0".to_string()),
                None,
            ));
        }
        ws.config.verify.workers = workers;
    }
    let report = verify::run(&ws.config.verify, ws.root(), ws.runner.as_ref())?;
    Ok((report, 0))
}
