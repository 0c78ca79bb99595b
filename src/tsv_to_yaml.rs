use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use onyo_core::store::Document;
use onyo_core::tsv;

use crate::Context;

/// Convert a TSV table to YAML documents
///
/// Prints one document per row. The `directory` and `template` columns
/// are `onyo new --tsv` instructions, not content, and are skipped.
#[derive(Args, Debug)]
pub struct TsvToYamlArgs {
    /// TSV file to convert
    pub file: PathBuf,
}

pub fn run(args: &TsvToYamlArgs, ctx: &Context) -> Result<u8> {
    let text = std::fs::read_to_string(ctx.base.join(&args.file))?;
    for record in tsv::parse(&text)? {
        let mut doc = Document::new();
        for (key, value) in &record.keys {
            doc.set_scalar(key, value, true, false)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        print!("{}", doc.dump());
    }
    Ok(0)
}
