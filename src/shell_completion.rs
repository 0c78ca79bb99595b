use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::Shell;

/// Generate a shell completion script
#[derive(Args, Debug)]
pub struct ShellCompletionArgs {
    /// Shell to generate the script for
    #[arg(short, long, default_value = "zsh")]
    pub shell: Shell,
}

pub fn run(args: &ShellCompletionArgs) -> Result<u8> {
    let mut command = crate::Cli::command();
    clap_complete::generate(args.shell, &mut command, "onyo", &mut std::io::stdout());
    Ok(0)
}
