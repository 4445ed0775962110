//! Library side of the `varscreen` binary: argument definitions, stage
//! drivers and logging setup.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod types;
