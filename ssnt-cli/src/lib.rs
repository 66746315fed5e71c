//! ssnt-cli: command-line front end for ssnt-core.
//!
//! Every subcommand reads JSON, runs one ssnt-core operation and writes JSON
//! to a file or stdout.

pub mod cli;
pub mod decode;
pub mod edit_distance;
pub mod io;
pub mod upsample;
