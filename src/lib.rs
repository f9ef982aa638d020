//! # boardweave - Board-scoped thread reconstruction
//!
//! Independent, untrusted producers publish messages into named boards over a
//! network that guarantees neither delivery order nor completeness. A reply
//! can arrive before, after, or without its parent. This library rebuilds
//! correct per-board thread trees from such a stream and keeps them correct as
//! late ancestors arrive.
//!
//! ## Features
//!
//! - **Order independence**: the same messages yield the same trees in any
//!   insertion order
//! - **Orphan resolution**: replies whose ancestors are missing wait in the
//!   board and attach as soon as the ancestor shows up
//! - **Cross-posting**: one message threads independently on every board it
//!   names
//! - **Persistence**: in-memory or RocksDB storage, with atomic commits
//!
//! ## Example
//!
//! ```rust
//! use boardweave::board::{AcceptAll, BoardName, BoardRegistry, IdentityId, MessageDraft};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = BoardRegistry::in_memory();
//! let board = BoardName::new("en.test")?;
//! let alice = IdentityId::new("alice")?;
//!
//! let root = MessageDraft::new(alice.clone()).board(board.clone()).title("Hi").build()?;
//! let reply = MessageDraft::new(alice.clone()).board(board.clone()).reply_to(&root).build()?;
//!
//! // The reply arrives first and waits as an orphan.
//! registry.insert(reply.clone())?;
//! registry.insert(root.clone())?;
//!
//! let board = registry.board(&board).expect("created on insert");
//! let links = board.links_of(&reply.uri()).expect("member");
//! assert_eq!(links.thread, Some(root.uri()));
//! assert_eq!(board.view_threads(&alice, &AcceptAll).iter().count(), 1);
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod cli;
pub mod config;
pub mod dag;
pub mod error;
pub mod storage;

pub use error::{BoardError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
