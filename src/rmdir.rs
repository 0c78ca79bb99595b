use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use onyo_core::{OnyoError, Transaction};

use crate::ui::{commit_flow, open_inventory};
use crate::Context;

/// Remove empty directories
///
/// A plain empty directory is deleted. An asset directory whose directory
/// aspect is empty is converted back to an asset file; its document is
/// untouched.
#[derive(Args, Debug)]
pub struct RmdirArgs {
    /// Directories to remove
    #[arg(required = true)]
    pub directories: Vec<PathBuf>,
}

pub fn run(args: &RmdirArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let mut tx = Transaction::new(&inv)?;
    let view = inv.view()?;

    for dir in &args.directories {
        let rel = inv.relative_path(&ctx.base.join(dir))?;
        if view.is_asset_dir(&rel) {
            tx.convert_from_asset_dir(&rel)?;
        } else if view.is_dir(&rel) {
            tx.remove_directory(&rel, false)?;
        } else {
            return Err(OnyoError::NoSuchDirectory { path: rel }.into());
        }
    }
    commit_flow(ctx, tx, "rmdir", "directories removed")
}
