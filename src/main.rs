use clap::Parser;
use std::process::ExitCode;

use dcvim::bootstrap::{self, DefaultAttachService, StartOptions};
use dcvim::doctor::run_doctor;
use dcvim::errors::exit_code_for_bootstrap_error;

mod cli;

use cli::{Cli, Cmd};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Cmd::Start {
            nvim,
            shell,
            no_clipboard,
            dry_run_config,
            workspace,
        } => {
            if *dry_run_config {
                return match bootstrap::dry_run_config(workspace, cli.verbose) {
                    Ok(()) => ExitCode::from(0),
                    Err(e) => {
                        eprintln!("dcvim: error: {e}");
                        ExitCode::from(exit_code_for_bootstrap_error(&e))
                    }
                };
            }
            let opts = StartOptions {
                workspace: workspace.clone(),
                nvim: *nvim,
                shell: shell.clone(),
                no_clipboard: *no_clipboard,
                verbose: cli.verbose,
            };
            bootstrap::start(&opts, &DefaultAttachService)
        }
        Cmd::Stop { workspace } => bootstrap::stop(workspace, cli.verbose),
        Cmd::Down { workspace } => bootstrap::down(workspace, cli.verbose),
        Cmd::Doctor => {
            run_doctor(cli.verbose);
            return ExitCode::from(0);
        }
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("dcvim: error: {e}");
            ExitCode::from(exit_code_for_bootstrap_error(&e))
        }
    }
}
