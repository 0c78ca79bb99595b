//! Git plumbing for onyo.
//!
//! This crate defines [`GitRepo`] — the single interface through which the
//! rest of the workspace reads and writes repository history. No other crate
//! spawns `git` directly; everything is funnelled through this adapter so
//! failures surface as one typed [`GitError`].

pub mod error;
pub mod repo;

pub use error::GitError;
pub use repo::{ConfigScope, GitRepo};
