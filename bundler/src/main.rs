//! Git bundler CLI entrypoint.
//!
//! This binary archives a git repository with its LFS objects and submodules
//! into a single compressed file, restores such archives, and checks their
//! integrity. Artifact and repository paths are printed on stdout; logs and
//! errors go to stderr.

use clap::Parser;
use git_bundler::archiver::{ArchiveOutcome, Archiver};
use git_bundler::cli::{ArchiveArgs, Cli, Command, UnpackArgs, VerifyArgs};
use git_bundler::command::SystemCommandExecutor;
use git_bundler::deps::ensure_tools;
use git_bundler::error::Result;
use git_bundler::unpacker::Unpacker;
use git_bundler::verifier::{VerificationReport, Verifier};
use git_bundler::workspace::sweep_stale_workspaces;
use std::io::Write;
use std::time::Duration;

/// Workspaces older than this are left over from interrupted runs.
const STALE_WORKSPACE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a command that ran to completion.
#[derive(Debug, PartialEq, Eq)]
enum RunStatus {
    /// Everything succeeded.
    Success,
    /// The command ran but an integrity check failed.
    VerificationFailed,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Initialises `env_logger` at the level chosen on the command line.
///
/// `RUST_LOG` still overrides the level for individual modules.
fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<RunStatus> {
    let swept = sweep_stale_workspaces(STALE_WORKSPACE_AGE);
    if swept > 0 {
        log::debug!("removed {swept} stale workspaces");
    }

    let executor = SystemCommandExecutor::with_timeout(cli.command_timeout());
    let require_lfs = matches!(cli.command, Command::Archive(_));
    ensure_tools(&executor, require_lfs)?;

    match &cli.command {
        Command::Archive(args) => run_archive(&executor, args, stdout, stderr),
        Command::Unpack(args) => run_unpack(&executor, args, stdout),
        Command::Verify(args) => Ok(run_verify(&executor, args, stdout, stderr)),
    }
}

fn run_archive(
    executor: &SystemCommandExecutor,
    args: &ArchiveArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<RunStatus> {
    let ArchiveOutcome {
        archive_path,
        warnings,
        verification,
        ..
    } = Archiver::new(executor).archive(&args.to_request())?;

    if !warnings.is_empty() {
        log::warn!("archive completed with {} warnings", warnings.len());
    }
    write_line(stdout, &archive_path);

    Ok(verification.map_or(RunStatus::Success, |report| {
        report_verification(&report, stderr)
    }))
}

fn run_unpack(
    executor: &SystemCommandExecutor,
    args: &UnpackArgs,
    stdout: &mut dyn Write,
) -> Result<RunStatus> {
    let outcome = Unpacker::new(executor).unpack(&args.archive, &args.destination())?;
    if !outcome.warnings.is_empty() {
        log::warn!("restore completed with {} warnings", outcome.warnings.len());
    }
    write_line(stdout, &outcome.repository);
    Ok(RunStatus::Success)
}

fn run_verify(
    executor: &SystemCommandExecutor,
    args: &VerifyArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> RunStatus {
    let report = Verifier::new(executor).verify(&args.archive);
    let status = report_verification(&report, stderr);
    if status == RunStatus::Success {
        write_line(stdout, format!("{}: OK", args.archive));
    }
    status
}

/// Prints every integrity failure of `report` and maps it to a status.
fn report_verification(report: &VerificationReport, stderr: &mut dyn Write) -> RunStatus {
    if report.is_ok() {
        return RunStatus::Success;
    }
    write_stderr_line(stderr, "verification failed:");
    for failure in &report.failures {
        write_stderr_line(stderr, format!("  {failure}"));
    }
    RunStatus::VerificationFailed
}

fn exit_code_for_run_result(result: Result<RunStatus>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(RunStatus::Success) => 0,
        Ok(RunStatus::VerificationFailed) => 1,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

fn write_line(stdout: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stdout, "{message}").is_err() {
        // A closed stdout leaves nothing useful to report.
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
