use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use onyo_core::Transaction;

use crate::ui::{commit_flow, open_inventory};
use crate::Context;

/// Move assets or directories, or rename a directory
///
/// With an existing directory as destination, all sources move into it.
/// With a non-existing destination and a single directory source, the
/// directory is moved (and possibly renamed) to that path. Assets cannot
/// be renamed this way; their names derive from content (see `onyo set`).
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Source paths followed by the destination
    #[arg(required = true, num_args = 2..)]
    pub paths: Vec<PathBuf>,
}

pub fn run(args: &MvArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let (dest, sources) = args.paths.split_last().expect("clap enforces two paths");
    let dest = inv.relative_path(&ctx.base.join(dest))?;

    let mut tx = Transaction::new(&inv)?;
    let view = inv.view()?;
    let dest_is_dir = view.is_dir(&dest) && !view.is_asset_dir(&dest);

    if !dest_is_dir && sources.len() > 1 {
        bail!(
            "'{}' is not an inventory directory; cannot move multiple sources into it",
            dest.display()
        );
    }

    for source in sources {
        let src = inv.relative_path(&ctx.base.join(source))?;
        if dest_is_dir {
            if view.is_asset(&src) {
                tx.move_asset(&src, &dest)?;
            } else {
                tx.move_directory(&src, &dest.join(src.file_name().unwrap_or_default()))?;
            }
        } else if view.is_asset(&src) && !view.is_asset_dir(&src) {
            if src.file_name() == dest.file_name() {
                let parent = dest.parent().map(PathBuf::from).unwrap_or_default();
                tx.move_asset(&src, &parent)?;
            } else {
                bail!(
                    "cannot rename asset '{}'; asset names derive from content (use 'onyo set')",
                    src.display()
                );
            }
        } else {
            tx.move_directory(&src, &dest)?;
        }
    }
    commit_flow(ctx, tx, "mv", "items moved")
}
