//! The onyo inventory engine.
//!
//! A filesystem tree is the index, git is the append-only history, and
//! every asset is one YAML document whose location encodes its assignment.
//! This crate houses the whole engine: the round-trip YAML [`store`], the
//! asset [`name`] model, the cached repository [`view`], the closed
//! operation set ([`ops`]) and the [`tx`] transaction engine that
//! materialises batches into single commits, the read-only [`query`]
//! engine, and the layered [`config`].
//!
//! The command-line binary is a thin shell over these modules; everything
//! that talks to git goes through the `onyo-git` adapter.

pub mod config;
pub mod consts;
pub mod diff;
pub mod error;
pub mod name;
pub mod ops;
pub mod query;
pub mod store;
pub mod tsv;
pub mod tx;
pub mod view;

pub use error::{OnyoError, Result};
pub use ops::{Operation, OperationKind, Section};
pub use store::{Document, Node, Scalar, Value};
pub use tx::{CommitOptions, Transaction};
pub use view::{Inventory, View};
