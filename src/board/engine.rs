//! Thread reconstruction engine.
//!
//! Attaching a message to a board happens in two phases:
//!
//! 1. [`plan_attach`] computes the complete new link state for the message
//!    and for every previously inserted message its arrival resolves. It reads
//!    the index but never mutates it.
//! 2. After the plan has been committed to storage, [`AttachPlan::apply`]
//!    writes it into the index.
//!
//! Splitting the phases gives all-or-nothing insertion: a failed commit leaves
//! the index exactly as it was.
//!
//! ## Attach rules
//!
//! For a reply `m`:
//! - its thread is the declared thread root if that root is a member;
//! - its parent is the declared parent if present (and not closing a cycle),
//!   otherwise the thread root as a provisional stand-in;
//! - with neither, `m` is an absolute orphan.
//!
//! Then, for any `m`:
//! - if `m` is a thread root, every reply waiting for that thread joins it and
//!   gets `m` as parent if it had none;
//! - every reply waiting for `m` as its declared parent is linked to it if it
//!   is an absolute orphan, or if it hangs provisionally in the same thread.

use crate::board::index::ThreadIndex;
use crate::board::links::{ParentLink, ThreadLinks};
use crate::board::message::{Message, MessageUri};
use crate::config::EngineConfig;
use crate::error::{BoardError, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// The full effect of attaching one message to one board.
#[derive(Debug, Clone)]
pub struct AttachPlan {
    pub message: Arc<Message>,
    /// Links resolved for the message itself.
    pub links: ThreadLinks,
    /// New links for previously inserted messages, keyed by URI.
    pub relinks: BTreeMap<MessageUri, ThreadLinks>,
    /// Declared parent that was refused because it would close a cycle.
    pub refused_parent: Option<MessageUri>,
}

impl AttachPlan {
    pub fn uri(&self) -> MessageUri {
        self.message.uri()
    }

    /// Every link record this plan writes: the message first, then re-links.
    pub fn link_records(&self) -> Vec<(MessageUri, ThreadLinks)> {
        std::iter::once((self.uri(), self.links))
            .chain(self.relinks.iter().map(|(uri, links)| (*uri, *links)))
            .collect()
    }

    /// Messages whose orphan status this plan resolves.
    pub fn resolved_orphans(&self, index: &ThreadIndex) -> Vec<MessageUri> {
        self.relinks
            .iter()
            .filter(|(uri, links)| index.is_absolute_orphan(uri) && !links.is_unresolved())
            .map(|(uri, _)| *uri)
            .collect()
    }

    /// Writes the plan into the index.
    ///
    /// The index must be the one the plan was computed from, unchanged since.
    pub(crate) fn apply(self, index: &mut ThreadIndex) {
        let uri = self.uri();
        if !index.insert(self.message, self.links) {
            warn!(uri = %uri, "attach_apply: message already present, plan dropped");
            return;
        }
        for (relinked, links) in self.relinks {
            if !index.set_links(&relinked, links) {
                warn!(uri = %relinked, "attach_apply: re-linked message vanished");
            }
        }
    }
}

/// Checks the deployment bounds and the self-reference rules.
pub fn check_preconditions(message: &Message, config: &EngineConfig) -> Result<()> {
    let boards = message.boards();
    if boards.is_empty() {
        return Err(BoardError::precondition("Message is not posted to any board"));
    }
    if boards.len() > config.max_boards_per_message {
        return Err(BoardError::precondition(format!(
            "Message is posted to {} boards, at most {} allowed",
            boards.len(),
            config.max_boards_per_message
        )));
    }
    if message.attachments().len() > config.max_attachments_per_message {
        return Err(BoardError::precondition(format!(
            "Message has {} attachments, at most {} allowed",
            message.attachments().len(),
            config.max_attachments_per_message
        )));
    }
    let uri = message.uri();
    if message.declared_parent_uri() == Some(uri) {
        return Err(BoardError::precondition("Message declares itself as parent"));
    }
    if message.declared_thread_uri() == Some(uri) {
        return Err(BoardError::precondition("Message declares itself as thread"));
    }
    Ok(())
}

/// Computes where `message` attaches in `index` and what its arrival resolves.
///
/// # Errors
/// Returns `DuplicateMessage` if the URI or ID is already a member.
/// A refused parent is not an error here; it is reported through
/// [`AttachPlan::refused_parent`].
pub fn plan_attach(index: &ThreadIndex, message: Arc<Message>) -> Result<AttachPlan> {
    let uri = message.uri();
    if index.contains(&uri) {
        return Err(BoardError::duplicate(format!("URI {} already present", uri)));
    }
    if index.contains_id(message.id()) {
        return Err(BoardError::duplicate(format!(
            "ID {} already present",
            message.id()
        )));
    }

    let mut staging = Staging::new(index, &message);
    let refused_parent = staging.resolve_own_links();

    if message.is_thread_root() {
        staging.adopt_unthreaded();
    }
    staging.adopt_waiting_children();

    let Staging { own, relinks, .. } = staging;

    debug!(
        uri = %uri,
        is_root = message.is_thread_root(),
        parent = ?own.parent,
        thread = ?own.thread,
        relinks = relinks.len(),
        refused = refused_parent.is_some(),
        "attach_plan: computed"
    );

    Ok(AttachPlan {
        message,
        links: own,
        relinks,
        refused_parent,
    })
}

/// Link state under construction, overlaid on the index.
struct Staging<'a> {
    index: &'a ThreadIndex,
    message: &'a Message,
    own: ThreadLinks,
    relinks: BTreeMap<MessageUri, ThreadLinks>,
}

impl<'a> Staging<'a> {
    fn new(index: &'a ThreadIndex, message: &'a Message) -> Self {
        Self {
            index,
            message,
            own: ThreadLinks::default(),
            relinks: BTreeMap::new(),
        }
    }

    fn uri(&self) -> MessageUri {
        self.message.uri()
    }

    fn links(&self, uri: &MessageUri) -> Option<ThreadLinks> {
        if *uri == self.uri() {
            return Some(self.own);
        }
        self.relinks
            .get(uri)
            .copied()
            .or_else(|| self.index.links_of(uri))
    }

    fn declared_parent_of(&self, uri: &MessageUri) -> Option<MessageUri> {
        if *uri == self.uri() {
            return self.message.declared_parent_uri();
        }
        self.index
            .get(uri)
            .and_then(|e| e.message.declared_parent_uri())
    }

    /// Resolved ancestors of `start`, including `start`, under staged links.
    fn chain(&self, start: MessageUri) -> Vec<MessageUri> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(start);
        while let Some(node) = current {
            if !seen.insert(node) {
                break;
            }
            chain.push(node);
            current = self.links(&node).and_then(|l| l.parent_uri());
        }
        chain
    }

    /// True if hanging the message under `candidate` would make it its own
    /// ancestor, now or once the waiting replies on the chain are re-linked.
    fn closes_cycle(&self, candidate: MessageUri) -> bool {
        let uri = self.uri();
        self.chain(candidate)
            .iter()
            .any(|node| *node == uri || self.declared_parent_of(node) == Some(uri))
    }

    /// Resolves the message's own links. Returns the refused parent, if any.
    fn resolve_own_links(&mut self) -> Option<MessageUri> {
        let parent_uri = self.message.declared_parent_uri()?;

        let thread_root = self
            .message
            .declared_thread_uri()
            .and_then(|t| self.index.find_thread_root(&t))
            .map(|root| root.uri());
        self.own.thread = thread_root;

        let mut refused = None;
        if self.index.contains(&parent_uri) {
            if self.closes_cycle(parent_uri) {
                warn!(
                    uri = %self.uri(),
                    parent = %parent_uri,
                    "attach_plan: refusing parent link that would close a cycle"
                );
                self.own.parent_refused = true;
                refused = Some(parent_uri);
            } else {
                self.own.parent = Some(ParentLink::declared(parent_uri));
            }
        }

        if self.own.parent.is_none() {
            self.own.parent = thread_root.map(ParentLink::provisional);
        }

        if self.own.is_unresolved() {
            debug!(
                uri = %self.uri(),
                declared_parent = %parent_uri,
                "attach_plan: registering absolute orphan"
            );
        }
        refused
    }

    /// The message is a thread root: replies waiting for it join the thread.
    fn adopt_unthreaded(&mut self) {
        let root = self.uri();
        let waiting: Vec<MessageUri> = self.index.waiting_for_thread(&root).collect();

        for member in waiting {
            let Some(mut links) = self.links(&member) else {
                continue;
            };
            links.thread = Some(root);
            if links.parent.is_none() {
                let declared = self.declared_parent_of(&member) == Some(root);
                links.parent = Some(if declared {
                    ParentLink::declared(root)
                } else {
                    ParentLink::provisional(root)
                });
            }
            debug!(uri = %member, thread = %root, "attach_plan: joining thread");
            self.relinks.insert(member, links);
        }
    }

    /// Replies waiting for the message as their declared parent hang under it.
    fn adopt_waiting_children(&mut self) {
        let uri = self.uri();
        let thread = if self.message.is_thread_root() {
            Some(uri)
        } else {
            self.own.thread
        };
        let waiting: Vec<MessageUri> = self.index.waiting_for_parent(&uri).collect();

        for child in waiting {
            let Some(mut links) = self.links(&child) else {
                continue;
            };
            let eligible = links.is_unresolved()
                || (links.parent.is_some_and(|p| p.is_provisional())
                    && links.thread.is_some()
                    && links.thread == thread);
            if !eligible {
                continue;
            }
            if self.chain(uri).contains(&child) {
                warn!(
                    uri = %child,
                    parent = %uri,
                    "attach_plan: skipping re-link that would close a cycle"
                );
                continue;
            }
            links.parent = Some(ParentLink::declared(uri));
            debug!(uri = %child, parent = %uri, "attach_plan: linking to declared parent");
            self.relinks.insert(child, links);
        }
    }
}
