//! Utility functions for CLI operations.

use crate::board::{Board, BoardName, BoardRegistry, Message, MessageUri, RocksStore};
use crate::config::EngineConfig;
use crate::error::{BoardError, Result};
use crate::storage::RocksDbConfig;
use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

/// Open the RocksDB-backed registry under `data_dir`
pub fn open_registry(data_dir: &Path, db_config: &RocksDbConfig) -> Result<BoardRegistry> {
    let config = EngineConfig::from_env()?;
    let store = RocksStore::open_with_config(data_dir, db_config)?;
    BoardRegistry::open(Arc::new(store), config)
}

/// Look up an existing board by name
pub fn existing_board(registry: &BoardRegistry, name: &str) -> Result<Arc<Board>> {
    let name = BoardName::new(name)?;
    registry
        .board(&name)
        .ok_or_else(|| BoardError::precondition(format!("No board named '{}'", name)))
}

/// Parse a message URI given as hex
pub fn parse_uri(hex: &str) -> Result<MessageUri> {
    MessageUri::from_hex(hex.trim())
}

/// Format a millisecond Unix timestamp for display
pub fn format_timestamp(timestamp_millis: u64) -> String {
    let datetime = UNIX_EPOCH + Duration::from_millis(timestamp_millis);

    // Basic timestamp formatting for CLI display
    format!("{:?}", datetime)
}

/// One display line for a message
pub fn format_message_line(message: &Message) -> String {
    let title = if message.title().is_empty() {
        "(untitled)"
    } else {
        message.title()
    };
    format!(
        "{} {} by {} at {}",
        message.uri().short(),
        title,
        message.author(),
        format_timestamp(message.created_at())
    )
}

/// Render the resolved tree below `root` with two spaces per level
pub fn render_tree(board: &Board, root: &Message) -> String {
    let mut out = String::new();
    let mut stack = vec![(Arc::new(root.clone()), 0usize)];
    let mut seen = std::collections::HashSet::new();

    while let Some((message, depth)) = stack.pop() {
        if !seen.insert(message.uri()) {
            continue;
        }
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), format_message_line(&message));
        // Reverse so the oldest child is printed first.
        for child in board.children_of(&message.uri()).into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{IdentityId, MessageDraft};

    #[test]
    fn test_render_tree_indents_children() {
        let board = Board::create("test").unwrap();
        let draft = || {
            MessageDraft::new(IdentityId::new("alice").unwrap())
                .board(BoardName::new("test").unwrap())
        };
        let root = draft().title("root").created_at(1).build().unwrap();
        let first = draft().title("first").created_at(2).reply_to(&root).build().unwrap();
        let second = draft().title("second").created_at(3).reply_to(&root).build().unwrap();
        let nested = draft().title("nested").created_at(4).reply_to(&first).build().unwrap();

        for message in [&root, &first, &second, &nested] {
            board.insert(message.clone()).unwrap();
        }

        let rendered = render_tree(&board, &root);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("root"));
        assert!(lines[1].starts_with("  ") && lines[1].contains("first"));
        assert!(lines[2].starts_with("    ") && lines[2].contains("nested"));
        assert!(lines[3].starts_with("  ") && lines[3].contains("second"));
    }

    #[test]
    fn test_parse_uri() {
        let uri = MessageUri::from_bytes([3u8; 64]);
        assert_eq!(parse_uri(&format!(" {} ", uri.to_hex())).unwrap(), uri);
        assert!(parse_uri("nothex").is_err());
    }
}
