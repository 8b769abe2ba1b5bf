use clap::Parser;

/// Arguments for check command
#[derive(Parser, Debug, Default)]
pub struct CheckArgs {
    /// Print the update plan as JSON
    #[arg(long)]
    pub json: bool,
}
