use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use onyo_core::{OnyoError, View};

use crate::ui::{display_path, open_inventory};
use crate::Context;

/// Print the inventory as a tree
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Directories to print (default: the repository root)
    pub directories: Vec<PathBuf>,

    /// List directories only
    #[arg(short, long)]
    pub dirs_only: bool,
}

pub fn run(args: &TreeArgs, ctx: &Context) -> Result<u8> {
    let inv = open_inventory(ctx)?;
    let view = inv.view()?;

    let roots: Vec<PathBuf> = if args.directories.is_empty() {
        vec![PathBuf::new()]
    } else {
        args.directories
            .iter()
            .map(|d| inv.relative_path(&ctx.base.join(d)))
            .collect::<Result<_, _>>()?
    };

    for root in &roots {
        if !view.is_dir(root) {
            return Err(OnyoError::NoSuchDirectory { path: root.clone() }.into());
        }
        println!("{}", display_path(root));
        render(&view, root, "", args.dirs_only);
    }
    Ok(0)
}

fn render(view: &View, dir: &Path, prefix: &str, dirs_only: bool) {
    let children: Vec<PathBuf> = view
        .children(dir)
        .into_iter()
        .filter(|c| !dirs_only || view.is_dir(c))
        .collect();

    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let connector = if last { "└── " } else { "├── " };
        let name = child
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{prefix}{connector}{name}");

        if view.is_dir(child) {
            let extension = if last { "    " } else { "│   " };
            render(view, child, &format!("{prefix}{extension}"), dirs_only);
        }
    }
}
