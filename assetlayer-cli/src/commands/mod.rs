//! CLI subcommands.

pub mod common;
pub mod index;
pub mod load;
