use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use onyo_core::consts::ONYO_CONFIG;

use crate::ui::open_inventory;
use crate::Context;

/// git-config options that would redirect the write away from the tracked
/// onyo config (or hijack the output).
const FORBIDDEN_FLAGS: &[&str] = &[
    "--system",
    "--global",
    "--local",
    "--worktree",
    "--file",
    "--blob",
    "--help",
    "-h",
];

/// Read or write onyo configuration (git-config passthrough)
///
/// Arguments are handed to `git config --file .onyo/config` unchanged;
/// the exit code is git's. A resulting change to the config file is
/// committed.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Arguments passed through to git-config
    #[arg(required = true, allow_hyphen_values = true, trailing_var_arg = true)]
    pub git_config_args: Vec<String>,
}

pub fn run(args: &ConfigArgs, ctx: &Context) -> Result<u8> {
    for arg in &args.git_config_args {
        if FORBIDDEN_FLAGS.contains(&arg.as_str()) {
            bail!(
                "the following options cannot be used with onyo config:\n{}\nNothing was set.",
                FORBIDDEN_FLAGS.join("\n")
            );
        }
    }

    let inv = open_inventory(ctx)?;
    let config_file = inv.config().onyo_file().to_owned();
    let code = inv
        .git()
        .config_file_passthrough(&config_file, &args.git_config_args)?;

    // A write shows up as a modified tracked file; commit it.
    let rel = PathBuf::from(ONYO_CONFIG);
    let changed = inv
        .git()
        .status_lines()?
        .iter()
        .any(|line| line.contains(ONYO_CONFIG));
    if changed {
        inv.git().stage(&[rel.clone()])?;
        inv.git()
            .commit_paths(&format!("config [1]: {ONYO_CONFIG}"), &[rel])?;
        inv.invalidate();
    }

    Ok(u8::try_from(code).unwrap_or(1))
}
