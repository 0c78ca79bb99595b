use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context as _, Result};
use clap::Args;

use onyo_core::store::Document;
use onyo_core::{Inventory, OnyoError, Transaction};

use crate::ui::{commit_flow, open_inventory};
use crate::Context;

/// Open assets in an editor and commit the changes
///
/// The editor comes from `onyo.core.editor`, `core.editor`, `$EDITOR`, or
/// `nano`, in that order. Invalid YAML reopens the editor (or aborts).
/// Name-bound keys cannot be edited here; use `onyo set --rename`.
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Assets to edit
    #[arg(required = true)]
    pub assets: Vec<PathBuf>,
}

pub fn run(args: &EditArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let mut tx = Transaction::new(&inv)?;

    for asset in &args.assets {
        let rel = inv.relative_path(&ctx.base.join(asset))?;
        let doc = tx.asset_doc(&rel)?;
        let edited = edit_document(&inv, ctx, doc)?;
        tx.modify_asset(&rel, edited, false)?;
    }
    commit_flow(ctx, tx, "edit", "assets updated")
}

/// Round a document through the user's editor until it parses (or the
/// user gives up).
pub fn edit_document(inv: &Inventory, ctx: &Context, doc: Document) -> Result<Document> {
    let editor = inv
        .config()
        .editor(inv.git(), std::env::var("EDITOR").ok())?;

    let file = tempfile::Builder::new()
        .prefix("onyo_")
        .suffix(".yaml")
        .tempfile()?;
    std::fs::write(file.path(), doc.dump())?;

    loop {
        spawn_editor(&editor, file.path())?;
        let text = std::fs::read_to_string(file.path())?;
        match Document::parse(&text) {
            Ok(edited) => return Ok(edited),
            Err(e) => {
                ctx.ui.error(&format!("invalid YAML: {e}"));
                if !ctx.ui.confirm("Edit again?")? {
                    return Err(OnyoError::UserAbort.into());
                }
            }
        }
    }
}

fn spawn_editor(editor: &str, file: &std::path::Path) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("configured editor is empty"))?;
    let status = Command::new(program)
        .args(parts)
        .arg(file)
        .status()
        .with_context(|| format!("failed to run editor '{editor}'"))?;
    if !status.success() {
        bail!("editor '{editor}' exited with {status}");
    }
    Ok(())
}
