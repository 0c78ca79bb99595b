use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use onyo_core::OnyoError;

use crate::ui::open_inventory;
use crate::Context;

/// Print the raw contents of asset files
///
/// Bytes are passed through untouched (for asset directories, the body
/// file is printed).
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Assets to print
    #[arg(required = true)]
    pub assets: Vec<PathBuf>,
}

pub fn run(args: &CatArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let view = inv.view()?;

    let mut stdout = std::io::stdout().lock();
    for asset in &args.assets {
        let rel = inv.relative_path(&ctx.base.join(asset))?;
        if !view.is_asset(&rel) {
            return Err(OnyoError::NoSuchAsset { path: rel }.into());
        }
        let file = inv.document_file(&rel)?;
        let bytes = inv.git().read_file(&file)?;
        stdout.write_all(&bytes)?;
    }
    Ok(0)
}
