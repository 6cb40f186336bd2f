//! Subcommands.

pub mod map;
pub mod mappings;
pub mod token;
