use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use onyo_core::Transaction;

use crate::ui::{commit_flow, open_inventory};
use crate::Context;

/// Create inventory directories
///
/// Each new directory (and any missing ancestors) is tracked with an
/// anchor file and the batch is committed as one change. Directories that
/// already exist are skipped silently. Naming an existing asset file
/// upgrades it to an asset directory.
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Directories to create
    #[arg(required = true)]
    pub directories: Vec<PathBuf>,
}

pub fn run(args: &MkdirArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let mut tx = Transaction::new(&inv)?;
    let view = inv.view()?;
    for dir in &args.directories {
        let rel = inv.relative_path(&ctx.base.join(dir))?;
        if view.is_asset(&rel) {
            tx.convert_to_asset_dir(&rel)?;
        } else {
            tx.add_directory(&rel)?;
        }
    }
    commit_flow(ctx, tx, "mkdir", "directories created")
}
