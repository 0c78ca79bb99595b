use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Args};

use onyo_core::{OnyoError, Transaction};

use crate::ui::{commit_flow, open_inventory};
use crate::Context;

/// Set keys in asset documents
///
/// Dotted keys address nested mappings and create intermediate levels as
/// needed. Name-bound keys (those in the name template) can only change
/// with `--rename`, which also moves the asset file to its new name.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// KEY=VALUE pairs to set (repeatable)
    #[arg(short, long, required = true, action = ArgAction::Append, value_name = "KEY=VALUE")]
    pub keys: Vec<String>,

    /// Assets to modify (repeatable)
    #[arg(short, long, required = true, action = ArgAction::Append, value_name = "ASSET")]
    pub asset: Vec<PathBuf>,

    /// Allow changing name-bound keys, renaming the asset to match
    #[arg(long)]
    pub rename: bool,
}

pub fn run(args: &SetArgs, ctx: &Context) -> Result<u8> {
    let pairs: Vec<(&str, &str)> = args
        .keys
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .ok_or_else(|| anyhow::anyhow!("keys take the form KEY=VALUE, got '{raw}'"))
        })
        .collect::<Result<_>>()?;
    if pairs.iter().any(|(k, _)| k.is_empty()) {
        bail!("keys must not be empty");
    }

    let inv = open_inventory(ctx)?;
    let mut tx = Transaction::new(&inv)?;

    for asset in &args.asset {
        let rel = inv.relative_path(&ctx.base.join(asset))?;
        let mut doc = tx.asset_doc(&rel)?;
        for (key, value) in &pairs {
            doc.set_scalar(key, value, true, false)
                .map_err(|e| OnyoError::InvalidOperation {
                    reason: format!("{}: {e}", rel.display()),
                })?;
        }
        tx.modify_asset(&rel, doc, args.rename)?;
    }
    commit_flow(ctx, tx, "set", "assets updated")
}
