use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use onyo_core::{Inventory, OnyoError};

use crate::Context;

/// Initialize a directory as an onyo repository
///
/// Creates the `.onyo/` control directory (config, templates, validation),
/// initialises git if needed, and commits the skeleton. Running it on a
/// directory that already is an onyo repository is a no-op.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: the working directory)
    pub directory: Option<PathBuf>,
}

pub fn run(args: &InitArgs, ctx: &Context) -> Result<u8> {
    let target = match &args.directory {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => ctx.base.join(dir),
        None => ctx.base.clone(),
    };

    match Inventory::init(&target) {
        Ok(inv) => {
            ctx.ui.print(&format!(
                "Initialized empty onyo repository in {}",
                inv.root().join(".onyo").display()
            ));
            Ok(0)
        }
        Err(OnyoError::AlreadyARepository { .. }) => {
            // Not an error: the repository is already what init would make.
            Inventory::open(&target)?;
            ctx.ui.print(&format!(
                "'{}' already is an onyo repository.",
                target.display()
            ));
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}
