use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Args};

use onyo_core::store::Document;
use onyo_core::{tsv, OnyoError, Transaction};

use crate::edit::edit_document;
use crate::ui::{commit_flow, open_inventory};
use crate::Context;

/// Create new assets
///
/// The asset name is generated from the name template (default
/// `{type}_{make}_{model}.{serial}`) using the given keys; a missing
/// serial gets a generated `faux...` placeholder. Content starts from a
/// template (or a cloned asset), with `--keys` applied on top.
#[derive(Args, Debug)]
pub struct NewArgs {
    /// KEY=VALUE pairs for the new asset(s) (repeatable)
    #[arg(short, long, action = ArgAction::Append, value_name = "KEY=VALUE")]
    pub keys: Vec<String>,

    /// Directory to create the asset(s) in
    #[arg(short, long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Template to seed the asset content from
    #[arg(short, long, value_name = "NAME", conflicts_with = "clone")]
    pub template: Option<String>,

    /// Existing asset to clone the content of
    #[arg(short, long, value_name = "ASSET")]
    pub clone: Option<PathBuf>,

    /// Open the new asset(s) in an editor before committing
    #[arg(short, long)]
    pub edit: bool,

    /// Create one asset per row of a TSV file
    #[arg(long, value_name = "FILE")]
    pub tsv: Option<PathBuf>,
}

pub fn run(args: &NewArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;

    let pairs: Vec<(String, String)> = args
        .keys
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .ok_or_else(|| anyhow::anyhow!("keys take the form KEY=VALUE, got '{raw}'"))
        })
        .collect::<Result<_>>()?;

    let base_dir = match &args.directory {
        Some(dir) => inv.relative_path(&ctx.base.join(dir))?,
        None => inv.relative_path(&ctx.base)?,
    };

    let mut tx = Transaction::new(&inv)?;

    if let Some(tsv_file) = &args.tsv {
        let text = std::fs::read_to_string(ctx.base.join(tsv_file))?;
        let records = tsv::parse(&text)?;
        if records.is_empty() {
            bail!("TSV file '{}' has no rows", tsv_file.display());
        }
        for record in records {
            let mut doc = match &record.template {
                Some(name) => inv.template(name)?,
                None => seed_document(&inv, args, ctx)?,
            };
            apply_pairs(&mut doc, &pairs)?;
            apply_pairs(&mut doc, &record.keys)?;
            let dir = match &record.directory {
                Some(dir) => inv.relative_path(&ctx.base.join(dir))?,
                None => base_dir.clone(),
            };
            tx.add_asset(&dir, doc, false)?;
        }
    } else {
        if pairs.is_empty() && !args.edit {
            bail!("nothing to create; pass --keys, --edit, or --tsv");
        }
        let mut doc = seed_document(&inv, args, ctx)?;
        apply_pairs(&mut doc, &pairs)?;
        if args.edit {
            doc = edit_document(&inv, ctx, doc)?;
        }
        tx.add_asset(&base_dir, doc, false)?;
    }

    commit_flow(ctx, tx, "new", "new assets created")
}

/// The starting content: a cloned asset, an explicit template, or the
/// configured default template.
fn seed_document(inv: &onyo_core::Inventory, args: &NewArgs, ctx: &Context) -> Result<Document> {
    if let Some(clone) = &args.clone {
        let rel = inv.relative_path(&ctx.base.join(clone))?;
        return Ok(inv.load_document(&rel)?);
    }
    let name = match &args.template {
        Some(name) => name.clone(),
        None => inv.config().new_template(inv.git())?,
    };
    Ok(inv.template(&name)?)
}

fn apply_pairs(doc: &mut Document, pairs: &[(String, String)]) -> Result<()> {
    for (key, value) in pairs {
        doc.set_scalar(key, value, true, false)
            .map_err(|e| OnyoError::InvalidOperation {
                reason: e.to_string(),
            })?;
    }
    Ok(())
}
