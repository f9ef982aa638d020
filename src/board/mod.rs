//! Board-scoped thread reconstruction.
//!
//! Messages arrive in any order, possibly without their ancestors. Each board
//! keeps a [`ThreadIndex`] that attaches every message as far as the messages
//! seen so far allow, and re-attaches waiting ("orphan") messages once the
//! missing ancestor shows up.
//!
//! ## Hierarchy
//!
//! ```text
//! BoardRegistry
//!     └── Board (one RwLock<ThreadIndex> each)
//!             └── thread root (declares no parent)
//!                     └── reply (declares parent + thread root)
//!                             └── reply
//! ```
//!
//! ## Order Independence
//!
//! For a consistent set of messages, the final links of a board do not depend
//! on the insertion order. [`Board::rebuild`] relies on this to recompute a
//! board from its membership alone.

pub mod constants;
mod engine;
mod index;
mod links;
mod locks;
mod message;
mod name;
mod registry;
pub mod store;
mod view;

pub use engine::{check_preconditions, plan_attach, AttachPlan};
pub use index::{IndexEntry, ThreadIndex};
pub use links::{LinkKind, ParentLink, ThreadLinks};
pub use message::{
    Attachment, IdentityId, Message, MessageContent, MessageDraft, MessageId, MessageRef,
    MessageUri,
};
pub use name::{is_name_valid, BoardName};
pub use registry::{
    Board, BoardOutcome, BoardRegistry, InsertReport, RebuildReport, POSTING_ALLOWED,
};
pub use store::{BoardCommit, LinkRecord, MemoryStore, MessageStore, RocksStore};
pub use view::{AcceptAll, ThreadView, ThreadViewIter, TrustPolicy};
