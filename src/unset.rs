use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args};

use onyo_core::Transaction;

use crate::ui::{commit_flow, open_inventory};
use crate::Context;

/// Remove keys from asset documents
///
/// Unsetting a key that is not present is a no-op. Name-bound keys cannot
/// be unset; the asset name depends on them.
#[derive(Args, Debug)]
pub struct UnsetArgs {
    /// Keys to remove (repeatable, dotted for nested keys)
    #[arg(short, long, required = true, action = ArgAction::Append, value_name = "KEY")]
    pub keys: Vec<String>,

    /// Assets to modify (repeatable)
    #[arg(short, long, required = true, action = ArgAction::Append, value_name = "ASSET")]
    pub asset: Vec<PathBuf>,
}

pub fn run(args: &UnsetArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let mut tx = Transaction::new(&inv)?;

    for asset in &args.asset {
        let rel = inv.relative_path(&ctx.base.join(asset))?;
        let mut doc = tx.asset_doc(&rel)?;
        for key in &args.keys {
            doc.unset(key);
        }
        tx.modify_asset(&rel, doc, false)?;
    }
    commit_flow(ctx, tx, "unset", "assets updated")
}
