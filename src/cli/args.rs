//! Command-line argument parsing for boardweave.

use crate::error::{BoardError, Result};
use std::env;
use std::path::PathBuf;
use std::process;

/// Command-line interface commands
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Import {
        data_dir: PathBuf,
        file: PathBuf,
    },
    Boards {
        data_dir: PathBuf,
    },
    Threads {
        data_dir: PathBuf,
        board: String,
    },
    Orphans {
        data_dir: PathBuf,
        board: String,
        uri: String,
    },
    Rebuild {
        data_dir: PathBuf,
        board: String,
    },
}

/// Parse the process arguments into a Command
pub fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    parse_from(&args[1..])
}

/// Parse arguments (without the program name) into a Command
pub fn parse_from(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        return Err(BoardError::config("No command given"));
    };

    let require = |count: usize, usage: &str| -> Result<()> {
        if args.len() < count + 1 {
            return Err(BoardError::config(format!(
                "{} requires {} (usage: boardweave {})",
                command, usage, usage
            )));
        }
        Ok(())
    };

    match command.as_str() {
        "import" => {
            require(2, "import <data_dir> <messages.jsonl>")?;
            Ok(Command::Import {
                data_dir: PathBuf::from(&args[1]),
                file: PathBuf::from(&args[2]),
            })
        }

        "boards" => {
            require(1, "boards <data_dir>")?;
            Ok(Command::Boards {
                data_dir: PathBuf::from(&args[1]),
            })
        }

        "threads" => {
            require(2, "threads <data_dir> <board>")?;
            Ok(Command::Threads {
                data_dir: PathBuf::from(&args[1]),
                board: args[2].clone(),
            })
        }

        "orphans" => {
            require(3, "orphans <data_dir> <board> <uri>")?;
            Ok(Command::Orphans {
                data_dir: PathBuf::from(&args[1]),
                board: args[2].clone(),
                uri: args[3].clone(),
            })
        }

        "rebuild" => {
            require(2, "rebuild <data_dir> <board>")?;
            Ok(Command::Rebuild {
                data_dir: PathBuf::from(&args[1]),
                board: args[2].clone(),
            })
        }

        other => Err(BoardError::config(format!("Unknown command '{}'", other))),
    }
}

/// Print usage information
pub fn print_usage() {
    println!("boardweave - board-scoped thread reconstruction");
    println!("===============================================");
    println!();
    println!("Usage: boardweave <command> [args...]");
    println!();
    println!("Commands:");
    println!("  import <data_dir> <messages.jsonl>   Insert JSON-lines messages");
    println!("  boards <data_dir>                    List boards with message counts");
    println!("  threads <data_dir> <board>           Print the thread forest of a board");
    println!("  orphans <data_dir> <board> <uri>     List orphans waiting for a message");
    println!("  rebuild <data_dir> <board>           Recompute all links of a board");
    println!();
    println!("Environment:");
    println!("  BOARDWEAVE_MAX_BOARDS         Maximum boards per message (default 16)");
    println!("  BOARDWEAVE_MAX_ATTACHMENTS    Maximum attachments per message (default 256)");
    println!("  RUST_LOG                      Log filter (default boardweave=info)");
}
