//! argtree compiles a declarative description of a command-line interface
//! into a validated command tree and runs argument vectors against it.
//!
//! A tree is made of *groups* (which only route to children) and *commands*
//! (which own positional arguments and a handler). Options belong to either;
//! options marked `global` on a group are visible in the whole subtree below
//! it. Every group may name a default command, which runs when no child is
//! selected explicitly. A command literally named `_` is hidden: it can only
//! be reached as a default.
//!
//! Declarations arrive as [`Descriptor`]s, either built in Rust, read from
//! JSON with [`descriptor::from_json`], or parsed from the small text format
//! in [`dsl`]. Parsers, validators and handlers are referenced by name and
//! resolved through a [`CandidateLookup`], usually a [`Registry`].
//!
//! ```
//! use argtree::{Dispatcher, Registry, Value};
//!
//! let mut registry = Registry::with_prelude();
//! registry.handler("show_status", |invocation| {
//!     assert_eq!(invocation.option("verbose"), Some(&Value::Bool(true)));
//!     assert_eq!(invocation.option("depth"), Some(&Value::Int(3)));
//!     Ok(())
//! });
//!
//! let tree = argtree::compile(
//!     r#"
//!     group app {
//!         global flag -v, --verbose
//!         default status
//!         cmd status => show_status {
//!             option --depth: i32 = "1"
//!         }
//!     }
//!     "#,
//!     &registry,
//! )?;
//!
//! let code = Dispatcher::new(&tree).dispatch(["-v", "--depth", "3"]);
//! assert_eq!(code, 0);
//! # Ok::<(), argtree::Error>(())
//! ```
//!
//! Declaration errors are collected, not reported one at a time: a failed
//! build returns [`Diagnostics`] listing everything that is wrong.

pub mod binding;
pub mod build;
pub mod descriptor;
pub mod dispatch;
pub mod dsl;
pub mod error;
pub mod help;
pub mod lookup;
pub mod model;
mod rt;
pub mod ty;
pub mod validate;
pub mod value;

pub use crate::{
    build::{build, build_with, BuildOptions},
    descriptor::{ArgumentMark, Descriptor, OptionMark, ScopeKey, ValidatorRef},
    dispatch::{DispatchConfig, Dispatcher, Invocation},
    error::{DeclError, Diagnostics, Error as DispatchError, ErrorKind},
    lookup::{CandidateLookup, Registry},
    model::{CommandTree, ScopeId},
    ty::Ty,
    value::Value,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure to turn declaration text into a command tree.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(#[from] dsl::Error),
    #[error("{0}")]
    Build(#[from] Diagnostics),
}

/// Parses `text` with the [`dsl`] front-end and builds it.
pub fn compile<L: CandidateLookup + ?Sized>(text: &str, lookup: &L) -> Result<CommandTree> {
    compile_with(text, lookup, &BuildOptions::default())
}

pub fn compile_with<L: CandidateLookup + ?Sized>(
    text: &str,
    lookup: &L,
    options: &BuildOptions,
) -> Result<CommandTree> {
    let descriptors = dsl::parse(text)?;
    tracing::debug!(descriptors = descriptors.len(), "parsed declarations");
    let tree = build_with(&descriptors, lookup, options)?;
    Ok(tree)
}
