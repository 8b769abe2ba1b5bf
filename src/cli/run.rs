use clap::Parser;

/// Arguments for run command
#[derive(Parser, Debug, Default)]
#[command(after_help = "EXAMPLES:\n  \
                  Update without asking:\n    appcontainer run --yes\n\n\
                  Keep the installed version when the server allows it:\n    appcontainer run --skip-update\n\n\
                  Pass parameters to the application:\n    appcontainer run -- --safe-mode")]
pub struct RunArgs {
    /// Install available updates without asking
    #[arg(long, short = 'y', conflicts_with = "skip_update")]
    pub yes: bool,

    /// Start the installed version when skipping the update is allowed
    #[arg(long)]
    pub skip_update: bool,

    /// Do not render progress
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Parameters passed to the application
    #[arg(last = true)]
    pub params: Vec<String>,
}
