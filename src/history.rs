use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context as _, Result};
use clap::Args;

use onyo_core::OnyoError;

use crate::ui::open_inventory;
use crate::Context;

/// Show the history of an asset or directory
///
/// Execs the configured viewer (`onyo.history.interactive`, default
/// `tig --follow`; with `-I` `onyo.history.non-interactive`, default
/// `git --no-pager log --follow`) and exits with its code.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Asset or directory to show the history of
    pub path: PathBuf,

    /// Use the non-interactive history viewer
    #[arg(short = 'I', long)]
    pub non_interactive: bool,
}

pub fn run(args: &HistoryArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let rel = inv.relative_path(&ctx.base.join(&args.path))?;
    let view = inv.view()?;
    if !view.is_asset(&rel) && !view.is_dir(&rel) {
        return Err(OnyoError::NoSuchAsset { path: rel }.into());
    }

    let command_line = inv
        .config()
        .history_command(inv.git(), !args.non_interactive)?;
    let mut parts = command_line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("configured history command is empty"))?;

    let status = Command::new(program)
        .args(parts)
        .arg(&rel)
        .current_dir(inv.root())
        .status()
        .with_context(|| format!("failed to run history viewer '{command_line}'"))?;

    match status.code() {
        Some(code) => Ok(u8::try_from(code).unwrap_or(1)),
        None => bail!("history viewer '{command_line}' was terminated by a signal"),
    }
}
