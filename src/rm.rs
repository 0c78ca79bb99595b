use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use onyo_core::{OnyoError, Transaction};

use crate::ui::{commit_flow, open_inventory};
use crate::Context;

/// Delete assets or directories
///
/// Populated directories (including asset directories with contents)
/// require `--recursive`.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Assets or directories to delete
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Delete directory contents too
    #[arg(short, long)]
    pub recursive: bool,
}

pub fn run(args: &RmArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let mut tx = Transaction::new(&inv)?;
    let view = inv.view()?;

    for path in &args.paths {
        let rel = inv.relative_path(&ctx.base.join(path))?;
        if view.is_asset(&rel) {
            tx.remove_asset(&rel, args.recursive)?;
        } else if view.is_dir(&rel) {
            tx.remove_directory(&rel, args.recursive)?;
        } else {
            return Err(OnyoError::NoSuchAsset { path: rel }.into());
        }
    }
    commit_flow(ctx, tx, "rm", "items deleted")
}
