//! Message persistence.
//!
//! The engine talks to storage only through [`MessageStore`]. Two
//! implementations are provided:
//!
//! - [`MemoryStore`]: maps behind a lock; the default for embedded use and
//!   tests.
//! - [`RocksStore`]: RocksDB with one write batch per commit.
//!
//! ## RocksDB Layout
//!
//! - `messages`: `{uri}` -> serialized Message
//! - `ids`: `{message_id}` -> uri
//! - `links`: `{board}:{uri}` -> serialized ThreadLinks (also records membership)
//! - `boards`: `{board}` -> ()

use crate::board::links::ThreadLinks;
use crate::board::locks::{acquire_read, acquire_write};
use crate::board::message::{Message, MessageId, MessageUri};
use crate::board::name::BoardName;
use crate::error::{BoardError, Result};
use crate::storage::{composite_key, key_prefix, RocksDbConfig, RocksDbHandle};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

/// A link record: a board member and its resolved links.
pub type LinkRecord = (MessageUri, ThreadLinks);

/// Everything one insertion changes on one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardCommit {
    pub board: BoardName,
    /// The inserted message first, then every re-linked member.
    pub links: Vec<LinkRecord>,
}

/// Storage collaborator for boards.
pub trait MessageStore: Send + Sync + fmt::Debug {
    /// Records that a board exists.
    fn put_board(&self, board: &BoardName) -> Result<()>;

    /// All known boards, in name order.
    fn list_boards(&self) -> Result<Vec<BoardName>>;

    fn load_message(&self, uri: &MessageUri) -> Result<Option<Message>>;

    /// Looks up a stored message by its ID.
    fn find_by_identity(&self, id: &MessageId) -> Result<Option<MessageUri>>;

    /// Link records of every member of `board`.
    fn load_board_links(&self, board: &BoardName) -> Result<Vec<LinkRecord>>;

    /// Durably and atomically records `message`, its board memberships and
    /// every changed link. Either everything is written or nothing is.
    fn commit(&self, message: &Message, commits: &[BoardCommit]) -> Result<()>;

    /// Replaces every link record of `board` at once.
    fn replace_board_links(&self, board: &BoardName, links: &[LinkRecord]) -> Result<()>;
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    boards: BTreeSet<BoardName>,
    messages: HashMap<MessageUri, Message>,
    ids: HashMap<MessageId, MessageUri>,
    links: HashMap<BoardName, BTreeMap<MessageUri, ThreadLinks>>,
}

/// Volatile store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages.
    pub fn message_count(&self) -> usize {
        acquire_read(&self.state).messages.len()
    }
}

impl MessageStore for MemoryStore {
    fn put_board(&self, board: &BoardName) -> Result<()> {
        acquire_write(&self.state).boards.insert(board.clone());
        Ok(())
    }

    fn list_boards(&self) -> Result<Vec<BoardName>> {
        Ok(acquire_read(&self.state).boards.iter().cloned().collect())
    }

    fn load_message(&self, uri: &MessageUri) -> Result<Option<Message>> {
        Ok(acquire_read(&self.state).messages.get(uri).cloned())
    }

    fn find_by_identity(&self, id: &MessageId) -> Result<Option<MessageUri>> {
        Ok(acquire_read(&self.state).ids.get(id).copied())
    }

    fn load_board_links(&self, board: &BoardName) -> Result<Vec<LinkRecord>> {
        Ok(acquire_read(&self.state)
            .links
            .get(board)
            .map(|links| links.iter().map(|(u, l)| (*u, *l)).collect())
            .unwrap_or_default())
    }

    fn commit(&self, message: &Message, commits: &[BoardCommit]) -> Result<()> {
        let mut state = acquire_write(&self.state);
        state
            .messages
            .entry(message.uri())
            .or_insert_with(|| message.clone());
        state.ids.insert(message.id().clone(), message.uri());
        for commit in commits {
            state.boards.insert(commit.board.clone());
            state
                .links
                .entry(commit.board.clone())
                .or_default()
                .extend(commit.links.iter().copied());
        }
        Ok(())
    }

    fn replace_board_links(&self, board: &BoardName, links: &[LinkRecord]) -> Result<()> {
        let mut state = acquire_write(&self.state);
        state
            .links
            .insert(board.clone(), links.iter().copied().collect());
        Ok(())
    }
}

// =============================================================================
// RocksDB store
// =============================================================================

/// Database subdirectory.
const DB_DIR: &str = "board_db";

/// Column family names.
const CF_MESSAGES: &str = "messages";
const CF_IDS: &str = "ids";
const CF_LINKS: &str = "links";
const CF_BOARDS: &str = "boards";

/// RocksDB-backed message store.
#[derive(Debug)]
pub struct RocksStore {
    db: RocksDbHandle,
}

impl RocksStore {
    /// Opens (or creates) a store under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(data_dir, &RocksDbConfig::default())
    }

    pub fn open_with_config(data_dir: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let db_path = data_dir.as_ref().join(DB_DIR);
        let db = RocksDbHandle::open(
            &db_path,
            config,
            &[CF_MESSAGES, CF_IDS, CF_LINKS, CF_BOARDS],
        )?;
        info!("Opened board RocksDB at {:?}", db_path);
        Ok(Self { db })
    }

    fn link_key(board: &BoardName, uri: &MessageUri) -> Vec<u8> {
        composite_key(board.as_str().as_bytes(), uri.as_bytes())
    }
}

impl MessageStore for RocksStore {
    fn put_board(&self, board: &BoardName) -> Result<()> {
        self.db.put(CF_BOARDS, board.as_str().as_bytes(), &())
    }

    fn list_boards(&self) -> Result<Vec<BoardName>> {
        self.db
            .keys(CF_BOARDS)?
            .into_iter()
            .map(|key| {
                String::from_utf8(key)
                    .map_err(|_| BoardError::storage("Stored board name is not UTF-8"))
                    .and_then(|name| BoardName::new(name))
            })
            .collect()
    }

    fn load_message(&self, uri: &MessageUri) -> Result<Option<Message>> {
        self.db.get(CF_MESSAGES, uri.as_bytes())
    }

    fn find_by_identity(&self, id: &MessageId) -> Result<Option<MessageUri>> {
        self.db.get(CF_IDS, id.as_str().as_bytes())
    }

    fn load_board_links(&self, board: &BoardName) -> Result<Vec<LinkRecord>> {
        let records = self
            .db
            .scan_prefix::<ThreadLinks>(CF_LINKS, &key_prefix(board.as_str().as_bytes()))?
            .into_iter()
            .map(|(suffix, links)| {
                <[u8; 64]>::try_from(suffix.as_slice())
                    .map(|bytes| (MessageUri::from_bytes(bytes), links))
                    .map_err(|_| BoardError::storage("Link key has a malformed URI"))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            board = %board,
            records = records.len(),
            "store_load_links: loaded board links"
        );
        Ok(records)
    }

    fn commit(&self, message: &Message, commits: &[BoardCommit]) -> Result<()> {
        let uri = message.uri();
        let mut batch = self.db.batch();
        batch.put(CF_MESSAGES, uri.as_bytes(), message)?;
        batch.put(CF_IDS, message.id().as_str().as_bytes(), &uri)?;
        for commit in commits {
            batch.put(CF_BOARDS, commit.board.as_str().as_bytes(), &())?;
            for (member, links) in &commit.links {
                batch.put(CF_LINKS, &Self::link_key(&commit.board, member), links)?;
            }
        }
        debug!(
            uri = %uri,
            boards = commits.len(),
            ops = batch.len(),
            "store_commit: writing batch"
        );
        batch.commit()
    }

    fn replace_board_links(&self, board: &BoardName, links: &[LinkRecord]) -> Result<()> {
        let stale = self
            .db
            .keys_with_prefix(CF_LINKS, &key_prefix(board.as_str().as_bytes()))?;

        let mut batch = self.db.batch();
        for key in &stale {
            batch.delete(CF_LINKS, key)?;
        }
        for (uri, record) in links {
            batch.put(CF_LINKS, &Self::link_key(board, uri), record)?;
        }
        debug!(
            board = %board,
            removed = stale.len(),
            written = links.len(),
            "store_replace_links: writing batch"
        );
        batch.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::links::ParentLink;
    use crate::board::message::{IdentityId, MessageDraft};
    use tempfile::TempDir;

    fn board(name: &str) -> BoardName {
        BoardName::new(name).unwrap()
    }

    fn message(boards: &[&str]) -> Message {
        MessageDraft::new(IdentityId::new("alice").unwrap())
            .boards(boards.iter().map(|b| board(b)))
            .body("stored")
            .build()
            .unwrap()
    }

    fn exercise_store(store: &dyn MessageStore) {
        let msg = message(&["a", "ab"]);
        let other = MessageUri::from_bytes([9u8; 64]);
        let links = ThreadLinks {
            parent: Some(ParentLink::provisional(other)),
            thread: Some(other),
            parent_refused: false,
        };

        store
            .commit(
                &msg,
                &[
                    BoardCommit {
                        board: board("a"),
                        links: vec![(msg.uri(), ThreadLinks::default())],
                    },
                    BoardCommit {
                        board: board("ab"),
                        links: vec![(msg.uri(), links)],
                    },
                ],
            )
            .unwrap();

        assert_eq!(store.list_boards().unwrap(), vec![board("a"), board("ab")]);
        assert_eq!(store.load_message(&msg.uri()).unwrap().unwrap().uri(), msg.uri());
        assert_eq!(store.find_by_identity(msg.id()).unwrap(), Some(msg.uri()));

        // "a" is a prefix of "ab": keys must not bleed across boards.
        assert_eq!(
            store.load_board_links(&board("a")).unwrap(),
            vec![(msg.uri(), ThreadLinks::default())]
        );
        assert_eq!(
            store.load_board_links(&board("ab")).unwrap(),
            vec![(msg.uri(), links)]
        );

        store.replace_board_links(&board("ab"), &[]).unwrap();
        assert!(store.load_board_links(&board("ab")).unwrap().is_empty());
        assert_eq!(store.load_board_links(&board("a")).unwrap().len(), 1);

        store.put_board(&board("empty")).unwrap();
        assert_eq!(store.list_boards().unwrap().len(), 3);
        assert!(store.load_board_links(&board("empty")).unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        exercise_store(&store);
        assert_eq!(store.message_count(), 1);
    }

    #[test]
    fn test_rocks_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = RocksStore::open(temp_dir.path()).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn test_rocks_store_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let msg = message(&["persist"]);
        {
            let store = RocksStore::open(temp_dir.path()).unwrap();
            store
                .commit(
                    &msg,
                    &[BoardCommit {
                        board: board("persist"),
                        links: vec![(msg.uri(), ThreadLinks::default())],
                    }],
                )
                .unwrap();
        }

        let store = RocksStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.list_boards().unwrap(), vec![board("persist")]);
        let loaded = store.load_message(&msg.uri()).unwrap().unwrap();
        assert!(loaded.verify().is_ok());
    }
}
