use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args};

use onyo_core::query::{self, ItemType, MatchExpr, Query, SortOrder};

use crate::ui::open_inventory;
use crate::Context;

/// Query assets and print matching rows
///
/// Matching follows the grep convention: exit 0 when rows were found, 1
/// when none matched, 2 on errors. Broken documents are reported on
/// stderr without aborting the query.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Keys to output (dotted for nested); default: name keys plus path
    #[arg(short, long, action = ArgAction::Append, value_name = "KEY")]
    pub keys: Vec<String>,

    /// KEY=REGEX filters, all of which must match
    ///
    /// The regex is unanchored. The literals `[unset]`, `[dict]`, and
    /// `[list]` match absence and composite values.
    #[arg(short = 'M', long = "match", action = ArgAction::Append, value_name = "KEY=REGEX")]
    pub matches: Vec<String>,

    /// Restrict the query to these paths (repeatable)
    #[arg(short, long, action = ArgAction::Append, value_name = "PATH")]
    pub include: Vec<PathBuf>,

    /// Exclude these subtrees (repeatable; wins over --include)
    #[arg(short, long, action = ArgAction::Append, value_name = "PATH")]
    pub exclude: Vec<PathBuf>,

    /// Descend at most this many levels under each include root (0: no limit)
    #[arg(short, long, default_value_t = 0)]
    pub depth: usize,

    /// Sort ascending by KEY (repeatable)
    #[arg(short = 's', long = "sort-ascending", action = ArgAction::Append, value_name = "KEY")]
    pub sort_ascending: Vec<String>,

    /// Sort descending by KEY (repeatable)
    #[arg(short = 'S', long = "sort-descending", action = ArgAction::Append, value_name = "KEY")]
    pub sort_descending: Vec<String>,

    /// Machine-readable output: tab-separated, no header
    #[arg(short = 'H', long)]
    pub machine_readable: bool,

    /// Item types to list
    #[arg(short, long, action = ArgAction::Append, value_parser = ["assets", "directories"])]
    pub types: Vec<String>,
}

pub fn run(args: &GetArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;

    let mut keys = args.keys.clone();
    if keys.is_empty() {
        keys = inv
            .name_template()?
            .fields()
            .to_vec();
        keys.push("path".to_owned());
    }

    let mut sort: Vec<(String, SortOrder)> = args
        .sort_ascending
        .iter()
        .map(|k| (k.clone(), SortOrder::Ascending))
        .collect();
    sort.extend(
        args.sort_descending
            .iter()
            .map(|k| (k.clone(), SortOrder::Descending)),
    );

    let types = if args.types.is_empty() {
        vec![ItemType::Assets]
    } else {
        args.types
            .iter()
            .map(|t| {
                if t == "directories" {
                    ItemType::Directories
                } else {
                    ItemType::Assets
                }
            })
            .collect()
    };

    let query = Query {
        include: args
            .include
            .iter()
            .map(|p| inv.relative_path(&ctx.base.join(p)))
            .collect::<Result<_, _>>()?,
        exclude: args
            .exclude
            .iter()
            .map(|p| inv.relative_path(&ctx.base.join(p)))
            .collect::<Result<_, _>>()?,
        depth: args.depth,
        matches: args
            .matches
            .iter()
            .map(|m| MatchExpr::parse(m))
            .collect::<Result<_, _>>()?,
        keys: keys.clone(),
        sort,
        types,
    };

    let out = query::run(&inv, &query)?;
    for error in &out.errors {
        ctx.ui.error(error);
    }

    if !args.machine_readable && !out.rows.is_empty() {
        println!("{}", keys.join("\t"));
    }
    for row in &out.rows {
        println!("{}", row.values.join("\t"));
    }

    if !out.errors.is_empty() {
        Ok(2)
    } else if out.rows.is_empty() {
        Ok(1)
    } else {
        Ok(0)
    }
}
