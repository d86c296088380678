use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "dcvim",
    version,
    about = "Start a devcontainer for the current project and run Vim/Neovim inside it."
)]
pub struct Cli {
    /// Print detailed execution info
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Bring up the devcontainer, forward its ports and attach the editor
    Start {
        /// Use Neovim instead of Vim (falls back to Vim where no build exists)
        #[arg(long)]
        nvim: bool,

        /// Launch the editor through this shell instead of `sh`
        #[arg(long)]
        shell: Option<String>,

        /// Skip the host clipboard bridge
        #[arg(long = "no-clipboard")]
        no_clipboard: bool,

        /// Print the parsed session configuration and exit without starting
        /// anything
        #[arg(long = "dry-run-config")]
        dry_run_config: bool,

        /// Workspace folder containing .devcontainer
        #[arg(default_value = ".")]
        workspace: String,
    },

    /// Stop the running container for a workspace
    Stop {
        /// Workspace folder containing .devcontainer
        #[arg(default_value = ".")]
        workspace: String,
    },

    /// Stop and remove the container for a workspace
    Down {
        /// Workspace folder containing .devcontainer
        #[arg(default_value = ".")]
        workspace: String,
    },

    /// Run diagnostics to check environment and configuration
    Doctor,
}
