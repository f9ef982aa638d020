//! Command implementations for the boardweave CLI.

use crate::board::{AcceptAll, IdentityId, Message};
use crate::cli::utils::{
    existing_board, format_message_line, open_registry, parse_uri, render_tree,
};
use crate::error::{BoardError, Result};
use crate::storage::RocksDbConfig;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Counters reported by the import command
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub refused_parents: usize,
    pub orphans: usize,
    pub invalid: usize,
}

/// Execute import command
pub fn import(data_dir: &Path, file: &Path) -> Result<()> {
    let registry = open_registry(data_dir, &RocksDbConfig::bulk_import())?;
    let reader = BufReader::new(File::open(file)?);
    let mut summary = ImportSummary::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<Message>(&line)
            .map_err(|e| BoardError::serialization(format!("Invalid JSON: {}", e)))
            .and_then(|m| m.verify().map(|_| m))
        {
            Ok(message) => message,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping invalid message");
                summary.invalid += 1;
                continue;
            }
        };

        match registry.insert(message) {
            Ok(report) => {
                summary.inserted += 1;
                if report.is_orphan_somewhere() {
                    summary.orphans += 1;
                }
            }
            Err(e) if e.is_duplicate() => summary.duplicates += 1,
            Err(e) if e.is_cycle() => {
                warn!(line = line_no + 1, error = %e, "Parent link refused");
                summary.inserted += 1;
                summary.refused_parents += 1;
            }
            Err(BoardError::Precondition(msg)) => {
                warn!(line = line_no + 1, reason = %msg, "Message rejected");
                summary.invalid += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        refused_parents = summary.refused_parents,
        orphans = summary.orphans,
        invalid = summary.invalid,
        "Import finished"
    );
    println!(
        "Imported {} messages ({} duplicates, {} refused parents, {} orphans on arrival, {} invalid)",
        summary.inserted,
        summary.duplicates,
        summary.refused_parents,
        summary.orphans,
        summary.invalid
    );
    Ok(())
}

/// Execute boards command
pub fn boards(data_dir: &Path) -> Result<()> {
    let registry = open_registry(data_dir, &RocksDbConfig::default())?;
    let boards = registry.boards();

    if boards.is_empty() {
        println!("No boards found.");
        return Ok(());
    }

    println!("{:<40} {:>9} {:>8} {:>8}  NNTP", "Board", "Messages", "Threads", "Orphans");
    for board in boards {
        println!(
            "{:<40} {:>9} {:>8} {:>8}  {}",
            board.name(),
            board.message_count(),
            board.thread_count(),
            board.absolute_orphans().len(),
            if board.name().is_nntp_name() {
                board.posting_status()
            } else {
                '-'
            }
        );
    }
    Ok(())
}

/// Execute threads command
pub fn threads(data_dir: &Path, board_name: &str) -> Result<()> {
    let registry = open_registry(data_dir, &RocksDbConfig::default())?;
    let board = existing_board(&registry, board_name)?;

    // The CLI is not tied to an identity: show every author.
    let viewer = IdentityId::new("local")?;
    let view = board.view_threads(&viewer, &AcceptAll);

    for root in &view {
        print!("{}", render_tree(&board, root));
    }

    let orphans = board.absolute_orphans();
    if !orphans.is_empty() {
        println!();
        println!("Absolute orphans ({}):", orphans.len());
        for orphan in orphans {
            println!("  {}", format_message_line(&orphan));
        }
    }
    Ok(())
}

/// Execute orphans command
pub fn orphans(data_dir: &Path, board_name: &str, uri: &str) -> Result<()> {
    let registry = open_registry(data_dir, &RocksDbConfig::default())?;
    let board = existing_board(&registry, board_name)?;
    let uri = parse_uri(uri)?;

    let orphans = board.find_orphans_of(&uri);
    if orphans.is_empty() {
        println!("No orphans waiting for {}.", uri.short());
        return Ok(());
    }
    for orphan in orphans {
        println!("{}", format_message_line(&orphan));
    }
    Ok(())
}

/// Execute rebuild command
pub fn rebuild(data_dir: &Path, board_name: &str) -> Result<()> {
    let registry = open_registry(data_dir, &RocksDbConfig::default())?;
    let board = existing_board(&registry, board_name)?;
    let report = board.rebuild()?;
    println!(
        "Rebuilt {}: {} messages, {} absolute orphans, {} refused parents",
        board.name(),
        report.members,
        report.absolute_orphans,
        report.refused_parents
    );
    Ok(())
}
