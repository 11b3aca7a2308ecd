//! Tooling
//!
//! The `facetview` command line and its output rendering.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};
pub use format::{ItemRow, NavTree};
