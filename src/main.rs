use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use onyo_core::OnyoError;
use onyo_git::GitError;

mod cat;
mod config_cmd;
mod edit;
mod fsck;
mod get;
mod history;
mod init;
mod mkdir;
mod mv;
mod new;
mod rm;
mod rmdir;
mod set;
mod shell_completion;
mod show;
mod tree;
mod tsv_to_yaml;
mod ui;
mod unset;

/// Text-based inventory manager backed by git
///
/// Every inventory item ("asset") is a YAML file whose place in the
/// directory tree encodes where (or to whom) it is assigned. Every command
/// that changes the inventory produces exactly one commit, and the
/// repository never ends up half-written.
#[derive(Parser)]
#[command(name = "onyo")]
#[command(version, about)]
#[command(after_help = "See 'onyo <command> --help' for more information on a specific command.")]
struct Cli {
    /// Run as if onyo was started in PATH
    #[arg(short = 'C', global = true, value_name = "PATH")]
    directory: Option<PathBuf>,

    /// Silence non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Answer yes to every question
    #[arg(short, long, global = true)]
    yes: bool,

    /// Append a paragraph to the commit message (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Append, value_name = "TEXT")]
    message: Vec<String>,

    /// Do not auto-compose the commit subject and operations summary
    #[arg(long, global = true)]
    no_auto_message: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a directory as an onyo repository
    Init(init::InitArgs),
    /// Create new assets
    New(new::NewArgs),
    /// Open assets in an editor and commit the changes
    Edit(edit::EditArgs),
    /// Move assets or directories, or rename a directory
    Mv(mv::MvArgs),
    /// Create inventory directories
    Mkdir(mkdir::MkdirArgs),
    /// Delete assets or directories
    Rm(rm::RmArgs),
    /// Remove empty directories (or downgrade empty asset directories)
    Rmdir(rmdir::RmdirArgs),
    /// Set keys in asset documents
    Set(set::SetArgs),
    /// Remove keys from asset documents
    Unset(unset::UnsetArgs),
    /// Query assets and print matching rows
    Get(get::GetArgs),
    /// Print the inventory as a tree
    Tree(tree::TreeArgs),
    /// Print assets as normalised YAML
    Show(show::ShowArgs),
    /// Convert a TSV table to YAML documents
    TsvToYaml(tsv_to_yaml::TsvToYamlArgs),
    /// Print the raw contents of asset files
    Cat(cat::CatArgs),
    /// Read or write onyo configuration (git-config passthrough)
    Config(config_cmd::ConfigArgs),
    /// Check the repository for inconsistencies
    Fsck(fsck::FsckArgs),
    /// Show the history of an asset or directory
    History(history::HistoryArgs),
    /// Generate a shell completion script
    ShellCompletion(shell_completion::ShellCompletionArgs),
}

/// Everything a command handler needs besides its own arguments.
pub struct Context {
    /// Directory the command operates from (`-C` or the cwd).
    pub base: PathBuf,
    pub ui: ui::Ui,
    /// User commit-message paragraphs (`-m`, repeatable).
    pub message: Vec<String>,
    /// Whether to auto-compose subject and summary.
    pub auto_message: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base = cli.directory.clone().unwrap_or_else(|| PathBuf::from("."));
    let ctx = Context {
        base,
        ui: ui::Ui::new(cli.quiet, cli.yes),
        message: cli.message.clone(),
        auto_message: !cli.no_auto_message,
    };

    match run(cli.command, &ctx) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            ctx.ui.error(&format!("{err:#}"));
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(command: Commands, ctx: &Context) -> Result<u8> {
    match command {
        Commands::Init(args) => init::run(&args, ctx),
        Commands::New(args) => new::run(&args, ctx),
        Commands::Edit(args) => edit::run(&args, ctx),
        Commands::Mv(args) => mv::run(&args, ctx),
        Commands::Mkdir(args) => mkdir::run(&args, ctx),
        Commands::Rm(args) => rm::run(&args, ctx),
        Commands::Rmdir(args) => rmdir::run(&args, ctx),
        Commands::Set(args) => set::run(&args, ctx),
        Commands::Unset(args) => unset::run(&args, ctx),
        Commands::Get(args) => get::run(&args, ctx),
        Commands::Tree(args) => tree::run(&args, ctx),
        Commands::Show(args) => show::run(&args, ctx),
        Commands::TsvToYaml(args) => tsv_to_yaml::run(&args, ctx),
        Commands::Cat(args) => cat::run(&args, ctx),
        Commands::Config(args) => config_cmd::run(&args, ctx),
        Commands::Fsck(args) => fsck::run(&args, ctx),
        Commands::History(args) => history::run(&args, ctx),
        Commands::ShellCompletion(args) => shell_completion::run(&args),
    }
}

/// Typed domain errors exit 1; subprocess and I/O failures exit 2.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(onyo) = err.downcast_ref::<OnyoError>() {
        return match onyo {
            OnyoError::PluginFailure(_) | OnyoError::Io(_) => 2,
            _ => 1,
        };
    }
    if err.downcast_ref::<GitError>().is_some() || err.downcast_ref::<std::io::Error>().is_some() {
        return 2;
    }
    1
}
