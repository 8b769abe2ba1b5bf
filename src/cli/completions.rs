use clap::Parser;

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    appcontainer completions --shell bash > ~/.bash_completion.d/appcontainer\n\n\
                  Generate zsh completions:\n    appcontainer completions --shell zsh > ~/.zfunc/_appcontainer\n\n\
                  Generate fish completions:\n    appcontainer completions --shell fish > ~/.config/fish/completions/appcontainer.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long, short = 's')]
    pub shell: String,
}
