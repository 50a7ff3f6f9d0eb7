//! Library side of the `renal` command-line tool.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod types;
