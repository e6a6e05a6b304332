//! k3s installer CLI entrypoint.
//!
//! This binary installs or upgrades k3s as a systemd service. Progress is
//! reported on stderr; a failed run prints one `[ERROR]` line and exits 1.

use clap::Parser;
use k3s_installer::cli::Cli;
use k3s_installer::command::SystemCommandExecutor;
use k3s_installer::config::InstallConfig;
use k3s_installer::environment::ambient_environment;
use k3s_installer::error::Result;
use k3s_installer::lifecycle::Lifecycle;
use k3s_installer::output::{Progress, error_line, write_stderr_line};
use k3s_installer::service::SystemdManager;
use k3s_installer::tempdir::install_interrupt_cleanup;
use k3s_installer::transport::detect_transport;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let config = InstallConfig::from_cli(cli, std::env::consts::ARCH)?;

    // Dry-run mode: show what would be done without side effects
    if cli.dry_run {
        for line in config.describe() {
            write_stderr_line(stderr, line);
        }
        return Ok(());
    }

    install_interrupt_cleanup()?;

    let executor = SystemCommandExecutor;
    let transport = detect_transport(SystemCommandExecutor);
    let services = SystemdManager::new(SystemCommandExecutor);
    let mut progress = Progress::new(stderr, cli.quiet);
    log::debug!("downloading with {}", transport.name());

    Lifecycle::new(&executor, transport.as_ref(), &services).run(
        &config,
        &ambient_environment(),
        &mut progress,
    )?;
    Ok(())
}

fn exit_code_for_run_result<T>(result: Result<T>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            write_stderr_line(stderr, error_line(err));
            1
        }
    }
}
