use anyhow::Result;
use clap::Args;

use crate::ui::open_inventory;
use crate::Context;

/// Check the repository for inconsistencies
///
/// Verifies the `.onyo/` structure, a clean working tree, anchors in
/// every inventory directory, asset YAML validity, global name
/// uniqueness, and name/content agreement of the bound keys.
#[derive(Args, Debug)]
pub struct FsckArgs {}

pub fn run(_args: &FsckArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let problems = inv.fsck()?;

    if problems.is_empty() {
        ctx.ui.print("OK");
        return Ok(0);
    }
    for problem in &problems {
        ctx.ui.error(problem);
    }
    Ok(1)
}
