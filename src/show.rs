use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use onyo_core::OnyoError;

use crate::ui::open_inventory;
use crate::Context;

/// Print assets as normalised YAML
///
/// Each asset is rendered through the round-trip store (comments and key
/// order intact) with a comment line naming its path.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Assets to show
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Display asset paths relative to this directory
    #[arg(short, long, value_name = "PATH")]
    pub base_path: Option<PathBuf>,
}

pub fn run(args: &ShowArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let view = inv.view()?;

    let base = match &args.base_path {
        Some(base) => Some(inv.relative_path(&ctx.base.join(base))?),
        None => None,
    };

    for path in &args.paths {
        let rel = inv.relative_path(&ctx.base.join(path))?;
        if !view.is_asset(&rel) {
            return Err(OnyoError::NoSuchAsset { path: rel }.into());
        }
        let doc = inv.load_document(&rel)?;
        let shown = match &base {
            Some(base) => rel.strip_prefix(base).unwrap_or(&rel).to_path_buf(),
            None => rel.clone(),
        };
        println!("# {}", shown.display());
        print!("{}", doc.dump());
    }
    Ok(0)
}
