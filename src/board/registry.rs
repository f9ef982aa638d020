//! Boards and the registry that routes cross-posted messages.
//!
//! ## Locking
//!
//! Each [`Board`] guards its [`ThreadIndex`] with its own `RwLock`. Inserting
//! a message takes the write lock of every board the message names, always in
//! ascending [`BoardName`] order, then plans, commits and applies while
//! holding all of them. Lookups and views take a single read lock.
//!
//! The store is called with board locks held, so a commit and its in-memory
//! application are observed together.
//!
//! A registry insertion that names an unknown board holds the registry's
//! write lock for the whole insertion, then publishes the new board only once
//! the commit has succeeded. The registry lock is always taken before any
//! board lock.

use crate::board::engine::{check_preconditions, plan_attach, AttachPlan};
use crate::board::index::ThreadIndex;
use crate::board::links::ThreadLinks;
use crate::board::locks::{acquire_read, acquire_write};
use crate::board::message::{IdentityId, Message, MessageId, MessageUri};
use crate::board::name::BoardName;
use crate::board::store::{BoardCommit, LinkRecord, MemoryStore, MessageStore};
use crate::board::view::{ThreadView, TrustPolicy};
use crate::config::EngineConfig;
use crate::dag::topological_order;
use crate::error::{BoardError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// NNTP posting status: posting allowed.
pub const POSTING_ALLOWED: char = 'y';

/// What inserting a message did on one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardOutcome {
    pub board: BoardName,
    /// Links resolved for the inserted message.
    pub links: ThreadLinks,
    /// Members re-linked because of the insertion.
    pub relinked: Vec<MessageUri>,
    /// Former absolute orphans among `relinked`.
    pub resolved_orphans: Vec<MessageUri>,
    /// Declared parent refused because it would close a cycle.
    pub refused_parent: Option<MessageUri>,
}

/// Result of a successful insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertReport {
    pub uri: MessageUri,
    /// One outcome per board, in board name order.
    pub boards: Vec<BoardOutcome>,
}

impl InsertReport {
    pub fn outcome(&self, board: &BoardName) -> Option<&BoardOutcome> {
        self.boards.iter().find(|o| &o.board == board)
    }

    /// True if the message is an absolute orphan on some board.
    pub fn is_orphan_somewhere(&self) -> bool {
        self.boards.iter().any(|o| o.links.is_unresolved())
    }
}

/// Result of [`Board::rebuild`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    pub members: usize,
    pub absolute_orphans: usize,
    pub refused_parents: usize,
}

/// A named collection of messages and its thread index.
pub struct Board {
    name: BoardName,
    index: RwLock<ThreadIndex>,
    store: Arc<dyn MessageStore>,
    config: EngineConfig,
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("name", &self.name)
            .field("messages", &self.message_count())
            .finish()
    }
}

impl Board {
    /// Creates an empty board backed by a private in-memory store.
    ///
    /// # Errors
    /// Returns `InvalidName` if the name fails validation.
    pub fn create(name: impl Into<String>) -> Result<Self> {
        let name = BoardName::new(name)?;
        Self::with_store(name, Arc::new(MemoryStore::new()), EngineConfig::default())
    }

    /// Creates an empty board on a shared store and records it there.
    pub fn with_store(
        name: BoardName,
        store: Arc<dyn MessageStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        store.put_board(&name)?;
        info!(board = %name, "Created board");
        Ok(Self::unrecorded(name, store, config))
    }

    /// An empty board the store does not know yet. The first commit that
    /// names it records it.
    fn unrecorded(name: BoardName, store: Arc<dyn MessageStore>, config: EngineConfig) -> Self {
        Self {
            name,
            index: RwLock::new(ThreadIndex::new()),
            store,
            config,
        }
    }

    /// Loads a board and its stored links without recomputing them.
    pub fn restore(
        name: BoardName,
        store: Arc<dyn MessageStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        let records = store.load_board_links(&name)?;
        let mut index = ThreadIndex::new();
        for (uri, links) in &records {
            let message = store.load_message(uri)?.ok_or_else(|| {
                BoardError::storage(format!("Board {} links unknown message {}", name, uri))
            })?;
            if !index.insert(Arc::new(message), *links) {
                warn!(board = %name, uri = %uri, "Skipping duplicate stored member");
            }
        }
        info!(
            board = %name,
            messages = index.len(),
            threads = index.thread_count(),
            "Restored board"
        );
        Ok(Self {
            name,
            index: RwLock::new(index),
            store,
            config,
        })
    }

    pub fn name(&self) -> &BoardName {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Inserts a message posted to this board.
    ///
    /// Only this board's index is updated; use
    /// [`BoardRegistry::insert`] to thread a cross-post on every board it
    /// names.
    ///
    /// # Errors
    /// - `Precondition` if the message does not name this board or breaks a
    ///   configured bound
    /// - `DuplicateMessage` if the message is already a member
    /// - `CycleDetected` if the declared parent was refused; the message is
    ///   inserted regardless
    /// - `Storage` if the commit failed; nothing changed
    pub fn insert(&self, message: Message) -> Result<InsertReport> {
        if !message.is_posted_to(&self.name) {
            return Err(BoardError::precondition(format!(
                "Message {} is not posted to board {}",
                message.uri(),
                self.name
            )));
        }
        insert_across(
            self.store.as_ref(),
            &self.config,
            &[self],
            Arc::new(message),
        )
    }

    /// Snapshot of this board's threads for `viewer`, newest first.
    pub fn view_threads<'p, P>(&self, viewer: &IdentityId, policy: &'p P) -> ThreadView<'p, P>
    where
        P: TrustPolicy + ?Sized,
    {
        let roots = acquire_read(&self.index).thread_roots();
        ThreadView::new(viewer.clone(), roots, policy)
    }

    /// Looks up a thread root of this board by URI.
    pub fn find_thread_root(&self, uri: &MessageUri) -> Option<Arc<Message>> {
        acquire_read(&self.index).find_thread_root(uri).cloned()
    }

    /// Absolute orphans waiting for `uri` as parent or thread root.
    pub fn find_orphans_of(&self, uri: &MessageUri) -> Vec<Arc<Message>> {
        acquire_read(&self.index).find_orphans_of(uri)
    }

    pub fn absolute_orphans(&self) -> Vec<Arc<Message>> {
        acquire_read(&self.index).absolute_orphans()
    }

    pub fn message_count(&self) -> usize {
        acquire_read(&self.index).len()
    }

    pub fn thread_count(&self) -> usize {
        acquire_read(&self.index).thread_count()
    }

    pub fn contains(&self, uri: &MessageUri) -> bool {
        acquire_read(&self.index).contains(uri)
    }

    pub fn get(&self, uri: &MessageUri) -> Option<Arc<Message>> {
        acquire_read(&self.index)
            .get(uri)
            .map(|e| Arc::clone(&e.message))
    }

    pub fn get_by_id(&self, id: &MessageId) -> Option<Arc<Message>> {
        let index = acquire_read(&self.index);
        index
            .uri_of(id)
            .and_then(|uri| index.get(&uri))
            .map(|e| Arc::clone(&e.message))
    }

    pub fn links_of(&self, uri: &MessageUri) -> Option<ThreadLinks> {
        acquire_read(&self.index).links_of(uri)
    }

    /// Resolved children of `uri`, oldest first.
    pub fn children_of(&self, uri: &MessageUri) -> Vec<Arc<Message>> {
        acquire_read(&self.index).children_of(uri)
    }

    /// Messages resolved into the thread of `root`, oldest first.
    pub fn thread_members(&self, root: &MessageUri) -> Vec<Arc<Message>> {
        acquire_read(&self.index).thread_members(root)
    }

    /// NNTP group posting status.
    pub fn posting_status(&self) -> char {
        POSTING_ALLOWED
    }

    /// Recomputes every link of this board from its membership.
    ///
    /// Members are replayed parents first (see [`topological_order`]). The
    /// new links replace the stored ones; if that write fails the current
    /// index is kept.
    pub fn rebuild(&self) -> Result<RebuildReport> {
        let mut index = acquire_write(&self.index);
        let members = index.members();
        let ordered = topological_order(&members.iter().map(Arc::as_ref).collect::<Vec<_>>());

        let by_uri: BTreeMap<MessageUri, &Arc<Message>> =
            members.iter().map(|m| (m.uri(), m)).collect();
        let mut rebuilt = ThreadIndex::new();
        let mut refused_parents = 0;

        for message in ordered {
            let Some(message) = by_uri.get(&message.uri()) else {
                continue;
            };
            let plan = plan_attach(&rebuilt, Arc::clone(message))?;
            if plan.refused_parent.is_some() {
                refused_parents += 1;
            }
            plan.apply(&mut rebuilt);
        }

        let records: Vec<LinkRecord> = members
            .iter()
            .filter_map(|m| rebuilt.links_of(&m.uri()).map(|links| (m.uri(), links)))
            .collect();
        self.store.replace_board_links(&self.name, &records)?;

        let report = RebuildReport {
            members: rebuilt.len(),
            absolute_orphans: rebuilt.absolute_orphans().len(),
            refused_parents,
        };
        *index = rebuilt;
        info!(
            board = %self.name,
            members = report.members,
            orphans = report.absolute_orphans,
            refused = report.refused_parents,
            "Rebuilt board"
        );
        Ok(report)
    }
}

/// Inserts `message` into every board of `boards` atomically.
///
/// Locks are taken in board name order. Nothing is written unless every
/// board accepts the message and the store commit succeeds.
fn insert_across(
    store: &dyn MessageStore,
    config: &EngineConfig,
    boards: &[&Board],
    message: Arc<Message>,
) -> Result<InsertReport> {
    check_preconditions(&message, config)?;

    let mut boards: Vec<&Board> = boards.to_vec();
    boards.sort_by(|a, b| a.name.cmp(&b.name));
    boards.dedup_by(|a, b| a.name == b.name);

    let mut guards: Vec<_> = boards.iter().map(|b| acquire_write(&b.index)).collect();

    let plans: Vec<AttachPlan> = guards
        .iter()
        .map(|index| plan_attach(index, Arc::clone(&message)))
        .collect::<Result<_>>()?;

    let commits: Vec<BoardCommit> = boards
        .iter()
        .zip(&plans)
        .map(|(board, plan)| BoardCommit {
            board: board.name.clone(),
            links: plan.link_records(),
        })
        .collect();

    if let Err(e) = store.commit(&message, &commits) {
        warn!(uri = %message.uri(), error = %e, "Commit failed, insertion discarded");
        return Err(e);
    }

    let mut outcomes = Vec::with_capacity(plans.len());
    for ((board, index), plan) in boards.iter().zip(guards.iter_mut()).zip(plans) {
        outcomes.push(BoardOutcome {
            board: board.name.clone(),
            links: plan.links,
            relinked: plan.relinks.keys().copied().collect(),
            resolved_orphans: plan.resolved_orphans(&**index),
            refused_parent: plan.refused_parent,
        });
        plan.apply(&mut **index);
    }
    drop(guards);

    debug!(
        uri = %message.uri(),
        boards = outcomes.len(),
        "Inserted message"
    );

    let refused: Vec<String> = outcomes
        .iter()
        .filter_map(|o| o.refused_parent.map(|p| format!("{} (parent {})", o.board, p)))
        .collect();
    if !refused.is_empty() {
        return Err(BoardError::cycle(format!(
            "Message {} inserted without its declared parent on: {}",
            message.uri(),
            refused.join(", ")
        )));
    }

    Ok(InsertReport {
        uri: message.uri(),
        boards: outcomes,
    })
}

/// All boards sharing one store and one configuration.
pub struct BoardRegistry {
    boards: RwLock<BTreeMap<BoardName, Arc<Board>>>,
    store: Arc<dyn MessageStore>,
    config: EngineConfig,
}

impl fmt::Debug for BoardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardRegistry")
            .field("boards", &acquire_read(&self.boards).len())
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

impl BoardRegistry {
    /// Creates an empty registry on `store`, ignoring anything already stored.
    pub fn new(store: Arc<dyn MessageStore>, config: EngineConfig) -> Self {
        Self {
            boards: RwLock::new(BTreeMap::new()),
            store,
            config,
        }
    }

    /// Creates an empty registry on a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), EngineConfig::default())
    }

    /// Restores every stored board.
    pub fn open(store: Arc<dyn MessageStore>, config: EngineConfig) -> Result<Self> {
        let mut boards = BTreeMap::new();
        for name in store.list_boards()? {
            let board = Board::restore(name.clone(), Arc::clone(&store), config)?;
            boards.insert(name, Arc::new(board));
        }
        info!(boards = boards.len(), "Opened board registry");
        Ok(Self {
            boards: RwLock::new(boards),
            store,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Returns the board called `name`, creating it if needed.
    pub fn create_board(&self, name: &BoardName) -> Result<Arc<Board>> {
        if let Some(board) = self.board(name) {
            return Ok(board);
        }
        let mut boards = acquire_write(&self.boards);
        if let Some(board) = boards.get(name) {
            return Ok(Arc::clone(board));
        }
        let board = Arc::new(Board::with_store(
            name.clone(),
            Arc::clone(&self.store),
            self.config,
        )?);
        boards.insert(name.clone(), Arc::clone(&board));
        Ok(board)
    }

    pub fn board(&self, name: &BoardName) -> Option<Arc<Board>> {
        acquire_read(&self.boards).get(name).cloned()
    }

    /// All boards in name order.
    pub fn boards(&self) -> Vec<Arc<Board>> {
        acquire_read(&self.boards).values().cloned().collect()
    }

    /// Inserts a message into every board it is posted to, creating boards
    /// as needed. Each board threads the message independently.
    ///
    /// Boards created for the message are registered only if it is stored;
    /// a failed insertion leaves no trace. Errors are those of
    /// [`Board::insert`].
    pub fn insert(&self, message: Message) -> Result<InsertReport> {
        check_preconditions(&message, &self.config)?;
        let message = Arc::new(message);

        let known: Option<Vec<Arc<Board>>> = {
            let boards = acquire_read(&self.boards);
            message
                .boards()
                .iter()
                .map(|name| boards.get(name).cloned())
                .collect()
        };
        if let Some(targets) = known {
            return self.insert_into(&targets, message);
        }

        // Hold the registry lock so no concurrent insertion builds a second
        // copy of a new board. Board locks are always taken after this one.
        let mut boards = acquire_write(&self.boards);
        let mut targets: BTreeMap<BoardName, Arc<Board>> = BTreeMap::new();
        let mut fresh = Vec::new();
        for name in message.boards() {
            if targets.contains_key(name) {
                continue;
            }
            let board = match boards.get(name) {
                Some(board) => Arc::clone(board),
                None => {
                    let board = Arc::new(Board::unrecorded(
                        name.clone(),
                        Arc::clone(&self.store),
                        self.config,
                    ));
                    fresh.push(Arc::clone(&board));
                    board
                }
            };
            targets.insert(name.clone(), board);
        }

        let targets: Vec<Arc<Board>> = targets.into_values().collect();
        let result = self.insert_into(&targets, message);
        let stored = match &result {
            Ok(_) => true,
            Err(e) => e.is_cycle(),
        };
        if stored {
            for board in fresh {
                info!(board = %board.name, "Created board");
                boards.insert(board.name.clone(), board);
            }
        } else if !fresh.is_empty() {
            debug!(boards = fresh.len(), "Discarding boards of failed insertion");
        }
        result
    }

    fn insert_into(&self, targets: &[Arc<Board>], message: Arc<Message>) -> Result<InsertReport> {
        let refs: Vec<&Board> = targets.iter().map(Arc::as_ref).collect();
        insert_across(self.store.as_ref(), &self.config, &refs, message)
    }

    /// Loads a stored message by its ID.
    pub fn find_by_identity(&self, id: &MessageId) -> Result<Option<Message>> {
        match self.store.find_by_identity(id)? {
            Some(uri) => self.store.load_message(&uri),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::links::{LinkKind, ParentLink};
    use crate::board::message::MessageDraft;
    use crate::board::view::AcceptAll;

    fn alice() -> IdentityId {
        IdentityId::new("alice").unwrap()
    }

    fn draft(board: &str, created_at: u64) -> MessageDraft {
        MessageDraft::new(alice())
            .board(BoardName::new(board).unwrap())
            .created_at(created_at)
    }

    #[test]
    fn test_create_validates_name() {
        assert!(Board::create("valid.name").is_ok());
        assert!(matches!(Board::create(""), Err(BoardError::InvalidName(_))));
        assert!(matches!(
            Board::create("no spaces"),
            Err(BoardError::InvalidName(_))
        ));
    }

    #[test]
    fn test_insert_requires_membership() {
        let board = Board::create("mine").unwrap();
        let foreign = draft("other", 1).build().unwrap();
        assert!(matches!(
            board.insert(foreign),
            Err(BoardError::Precondition(_))
        ));
        assert_eq!(board.message_count(), 0);
    }

    #[test]
    fn test_insert_and_query() {
        let board = Board::create("test").unwrap();
        let root = draft("test", 1).build().unwrap();
        let reply = draft("test", 2).reply_to(&root).build().unwrap();

        board.insert(root.clone()).unwrap();
        let report = board.insert(reply.clone()).unwrap();

        let outcome = report.outcome(board.name()).unwrap();
        assert_eq!(outcome.links.parent, Some(ParentLink::declared(root.uri())));
        assert_eq!(outcome.links.thread, Some(root.uri()));

        assert_eq!(board.message_count(), 2);
        assert_eq!(board.thread_count(), 1);
        assert_eq!(board.children_of(&root.uri()).len(), 1);
        assert_eq!(board.thread_members(&root.uri()).len(), 1);
        assert!(board.find_thread_root(&root.uri()).is_some());
        assert!(board.find_thread_root(&reply.uri()).is_none());
        assert!(board.get_by_id(reply.id()).is_some());
        assert_eq!(board.posting_status(), 'y');
    }

    #[test]
    fn test_view_threads_newest_first() {
        let board = Board::create("test").unwrap();
        let older = draft("test", 10).build().unwrap();
        let newer = draft("test", 20).build().unwrap();
        board.insert(older.clone()).unwrap();
        board.insert(newer.clone()).unwrap();

        let view = board.view_threads(&alice(), &AcceptAll);
        let uris: Vec<MessageUri> = view.iter().map(|m| m.uri()).collect();
        assert_eq!(uris, vec![newer.uri(), older.uri()]);
    }

    #[test]
    fn test_registry_cross_post() {
        let registry = BoardRegistry::in_memory();
        let a = BoardName::new("a").unwrap();
        let b = BoardName::new("b").unwrap();

        let root = MessageDraft::new(alice())
            .board(b.clone())
            .board(a.clone())
            .build()
            .unwrap();
        let report = registry.insert(root.clone()).unwrap();
        assert_eq!(report.boards.len(), 2);
        assert_eq!(report.boards[0].board, a, "outcomes are in name order");

        assert_eq!(registry.boards().len(), 2);
        assert!(registry.board(&a).unwrap().contains(&root.uri()));
        assert!(registry.board(&b).unwrap().contains(&root.uri()));

        let found = registry.find_by_identity(root.id()).unwrap().unwrap();
        assert_eq!(found.uri(), root.uri());
    }

    #[test]
    fn test_failed_insert_registers_no_board() {
        let registry = BoardRegistry::in_memory();
        let x = BoardName::new("x").unwrap();
        let y = BoardName::new("y").unwrap();

        let first = draft("x", 1).build().unwrap();
        registry.insert(first.clone()).unwrap();

        // Same ID, new content, cross-posted to a board nobody has used yet.
        let clash = MessageDraft::new(alice())
            .id(first.id().clone())
            .boards([x.clone(), y.clone()])
            .body("clash")
            .build()
            .unwrap();
        assert!(registry.insert(clash).unwrap_err().is_duplicate());

        assert!(registry.board(&y).is_none());
        assert_eq!(registry.boards().len(), 1);
        assert_eq!(registry.store().list_boards().unwrap(), vec![x]);

        let later = draft("y", 2).build().unwrap();
        registry.insert(later.clone()).unwrap();
        assert!(registry.board(&y).unwrap().contains(&later.uri()));
        assert_eq!(registry.store().list_boards().unwrap().len(), 2);
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let board = Board::create("test").unwrap();
        let root = draft("test", 1).build().unwrap();
        let middle = draft("test", 2).reply_to(&root).build().unwrap();
        let leaf = draft("test", 3).reply_to(&middle).build().unwrap();

        board.insert(leaf.clone()).unwrap();
        board.insert(root.clone()).unwrap();
        board.insert(middle.clone()).unwrap();
        let before: Vec<_> = [root.uri(), middle.uri(), leaf.uri()]
            .iter()
            .map(|u| board.links_of(u))
            .collect();

        let report = board.rebuild().unwrap();
        assert_eq!(report.members, 3);
        assert_eq!(report.absolute_orphans, 0);

        let after: Vec<_> = [root.uri(), middle.uri(), leaf.uri()]
            .iter()
            .map(|u| board.links_of(u))
            .collect();
        assert_eq!(before, after);
        assert_eq!(
            board.links_of(&leaf.uri()).unwrap().parent.map(|p| p.kind),
            Some(LinkKind::Declared)
        );
    }
}
