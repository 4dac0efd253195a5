use clap::Parser;
use clap_complete::Shell;

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    bundlegate completions bash > ~/.bash_completion.d/bundlegate\n\n\
                  Generate zsh completions:\n    bundlegate completions zsh > ~/.zfunc/_bundlegate\n\n\
                  Generate fish completions:\n    bundlegate completions fish > ~/.config/fish/completions/bundlegate.fish\n\n\
                  Generate PowerShell completions:\n    bundlegate completions powershell")]
pub struct CompletionsArgs {
    /// Shell type
    #[arg(value_enum, ignore_case = true)]
    pub shell: Shell,
}
