use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{cache, config, deploy, maintain, package, plan, provision, run, schedule, verify};
use commands::GlobalArgs;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "foreman")]
#[command(version = VERSION)]
#[command(about = "Pipeline orchestrator for build, verification, release and scheduled maintenance")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for the current ref
    Run(run::RunArgs),
    /// Show the job graph for the current ref without running it
    Plan(plan::PlanArgs),
    /// Restore the environment cache and sync dependencies
    Provision(provision::ProvisionArgs),
    /// Run drift checks and the test suite
    Verify(verify::VerifyArgs),
    /// Build and upload the release archive
    Package(package::PackageArgs),
    /// Deploy to a configured target
    Deploy(deploy::DeployArgs),
    /// Inspect the environment cache
    Cache(cache::CacheArgs),
    /// Run a maintenance job now
    Maintain(maintain::MaintainArgs),
    /// Scheduled maintenance jobs
    Schedule(schedule::ScheduleArgs),
    /// Show or validate the workflow configuration
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command, &cli.global);
    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
