//! Command-line interface for boardweave.
//!
//! Inspects and feeds a RocksDB-backed board registry: importing messages,
//! listing boards, printing thread forests and pending orphans.

pub mod args;
pub mod commands;
pub mod utils;

use crate::Result;
use std::process;

pub use args::Command;
pub use commands::*;
pub use utils::*;

/// Main entry point for the CLI application
pub fn run() -> Result<()> {
    // Parse command line arguments
    let command = match args::parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            args::print_usage();
            process::exit(1);
        }
    };

    // Execute command
    match command {
        Command::Import { data_dir, file } => commands::import(&data_dir, &file),
        Command::Boards { data_dir } => commands::boards(&data_dir),
        Command::Threads { data_dir, board } => commands::threads(&data_dir, &board),
        Command::Orphans {
            data_dir,
            board,
            uri,
        } => commands::orphans(&data_dir, &board, &uri),
        Command::Rebuild { data_dir, board } => commands::rebuild(&data_dir, &board),
    }
}
