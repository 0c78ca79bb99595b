//! Terminal interaction: printing, prompting, and the shared commit flow.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;

use onyo_core::{CommitOptions, Inventory, OnyoError, Transaction};

use crate::Context;

/// Output/prompt policy for one invocation.
#[derive(Clone, Copy, Debug)]
pub struct Ui {
    quiet: bool,
    yes: bool,
}

impl Ui {
    pub const fn new(quiet: bool, yes: bool) -> Self {
        Self { quiet, yes }
    }

    /// Print to stdout unless `--quiet`.
    pub fn print(&self, text: &str) {
        if !self.quiet {
            println!("{text}");
        }
    }

    /// Print to stderr (never silenced).
    pub fn error(&self, text: &str) {
        eprintln!("onyo: {text}");
    }

    /// Ask a yes/no question. `--yes` answers yes without prompting.
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        loop {
            print!("{prompt} (y/n) ");
            std::io::stdout().flush()?;
            let mut answer = String::new();
            if std::io::stdin().lock().read_line(&mut answer)? == 0 {
                return Ok(false);
            }
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => {}
            }
        }
    }
}

/// Open the inventory the command operates on.
pub fn open_inventory(ctx: &Context) -> Result<Inventory> {
    Ok(Inventory::open(&ctx.base)?)
}

/// Shared tail of every mutating command: show the diff, ask, commit.
///
/// Returns the exit code: 0 on commit or clean no-op; `UserAbort` if the
/// user declines.
pub fn commit_flow(ctx: &Context, tx: Transaction<'_>, verb: &str, noun: &str) -> Result<u8> {
    if tx.is_empty() {
        ctx.ui.print(&format!("No {noun}."));
        return Ok(0);
    }

    ctx.ui.print(&tx.render_diff());
    if !ctx.ui.confirm("Save changes? No discards all changes.")? {
        return Err(OnyoError::UserAbort.into());
    }

    let opts = CommitOptions {
        verb: Some(verb.to_owned()),
        paragraphs: ctx.message.clone(),
        auto_message: ctx.auto_message,
    };
    tx.commit(&opts)?;
    Ok(0)
}

/// Render a repo-relative path for humans (the root shows as `.`).
pub fn display_path(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".to_owned()
    } else {
        path.display().to_string()
    }
}
