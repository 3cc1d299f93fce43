//! Lyra terminal front end
//!
//! Argument parsing, configuration loading and the interactive command
//! language of the `lyra` binary.

pub mod args;
pub mod config;
pub mod repl;
