//! Per-board thread index.
//!
//! The index is an arena keyed by message URI. Every relation between
//! messages (resolved parent, thread root, orphan registrations) is stored as
//! a URI lookup, so links never own the messages they point to.
//!
//! Secondary indexes are derived from each entry's message and links and are
//! kept in sync by routing every link change through [`ThreadIndex::set_links`].

use crate::board::links::{LinkKind, ThreadLinks};
use crate::board::message::{Message, MessageId, MessageUri};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// A board member and the links this board resolved for it.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub message: Arc<Message>,
    pub links: ThreadLinks,
}

/// Threading state of one board.
#[derive(Debug, Default)]
pub struct ThreadIndex {
    entries: HashMap<MessageUri, IndexEntry>,
    ids: HashMap<MessageId, MessageUri>,
    /// Thread roots, newest first.
    threads: BTreeSet<(Reverse<u64>, MessageUri)>,
    /// Resolved thread root -> members (excluding the root).
    thread_members: HashMap<MessageUri, BTreeSet<(u64, MessageUri)>>,
    /// Resolved parent -> children, oldest first.
    children: HashMap<MessageUri, BTreeSet<(u64, MessageUri)>>,
    /// Declared thread -> replies not yet attached to it.
    unthreaded: HashMap<MessageUri, BTreeSet<MessageUri>>,
    /// Declared parent -> replies not yet linked to it.
    awaiting_parent: HashMap<MessageUri, BTreeSet<MessageUri>>,
    absolute_orphans: BTreeSet<MessageUri>,
}

impl ThreadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of member messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, uri: &MessageUri) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn contains_id(&self, id: &MessageId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn get(&self, uri: &MessageUri) -> Option<&IndexEntry> {
        self.entries.get(uri)
    }

    pub fn uri_of(&self, id: &MessageId) -> Option<MessageUri> {
        self.ids.get(id).copied()
    }

    pub fn links_of(&self, uri: &MessageUri) -> Option<ThreadLinks> {
        self.entries.get(uri).map(|e| e.links)
    }

    /// Looks up a member that is a thread root.
    pub fn find_thread_root(&self, uri: &MessageUri) -> Option<&Arc<Message>> {
        self.entries
            .get(uri)
            .map(|e| &e.message)
            .filter(|m| m.is_thread_root())
    }

    /// Thread roots, date descending (ties by URI).
    pub fn thread_roots(&self) -> Vec<Arc<Message>> {
        self.threads
            .iter()
            .filter_map(|(_, uri)| self.entries.get(uri))
            .map(|e| Arc::clone(&e.message))
            .collect()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Messages resolved into the thread of `root`, date ascending.
    pub fn thread_members(&self, root: &MessageUri) -> Vec<Arc<Message>> {
        self.collect(self.thread_members.get(root).into_iter().flatten().map(|(_, uri)| uri))
    }

    /// Messages whose resolved parent is `uri`, date ascending.
    pub fn children_of(&self, uri: &MessageUri) -> Vec<Arc<Message>> {
        self.collect(self.children.get(uri).into_iter().flatten().map(|(_, uri)| uri))
    }

    pub fn is_absolute_orphan(&self, uri: &MessageUri) -> bool {
        self.absolute_orphans.contains(uri)
    }

    pub fn absolute_orphans(&self) -> Vec<Arc<Message>> {
        self.collect(self.absolute_orphans.iter())
    }

    /// Absolute orphans waiting for `uri` as their parent or thread root,
    /// date ascending.
    pub fn find_orphans_of(&self, uri: &MessageUri) -> Vec<Arc<Message>> {
        let mut found: Vec<Arc<Message>> = self
            .waiting_for_parent(uri)
            .chain(self.waiting_for_thread(uri))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|u| self.absolute_orphans.contains(u))
            .filter_map(|u| self.entries.get(&u))
            .map(|e| Arc::clone(&e.message))
            .collect();
        found.sort_by_key(|m| (m.created_at(), m.uri()));
        found
    }

    /// Replies registered as not yet attached to the thread `root`.
    pub(crate) fn waiting_for_thread(
        &self,
        root: &MessageUri,
    ) -> impl Iterator<Item = MessageUri> + '_ {
        self.unthreaded.get(root).into_iter().flatten().copied()
    }

    /// Replies registered as not yet linked to their declared parent `uri`.
    pub(crate) fn waiting_for_parent(
        &self,
        uri: &MessageUri,
    ) -> impl Iterator<Item = MessageUri> + '_ {
        self.awaiting_parent.get(uri).into_iter().flatten().copied()
    }

    /// Walks resolved parent links upward from `uri`, starting with `uri`.
    ///
    /// Stops at the first message without a resolved parent, or when a URI
    /// repeats.
    pub fn ancestors(&self, uri: &MessageUri) -> Vec<MessageUri> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(*uri);
        while let Some(node) = current {
            if !seen.insert(node) {
                break;
            }
            chain.push(node);
            current = self.links_of(&node).and_then(|l| l.parent_uri());
        }
        chain
    }

    /// All members in no particular order.
    pub fn members(&self) -> Vec<Arc<Message>> {
        self.entries.values().map(|e| Arc::clone(&e.message)).collect()
    }

    /// Adds a member with already resolved links.
    ///
    /// Returns false, changing nothing, if the URI or ID is already present.
    pub(crate) fn insert(&mut self, message: Arc<Message>, links: ThreadLinks) -> bool {
        let uri = message.uri();
        if self.entries.contains_key(&uri) || self.ids.contains_key(message.id()) {
            return false;
        }
        self.ids.insert(message.id().clone(), uri);
        let entry = IndexEntry { message, links };
        self.index_entry(uri, &entry);
        self.entries.insert(uri, entry);
        true
    }

    /// Replaces the links of a member, keeping secondary indexes in sync.
    ///
    /// Returns false if `uri` is not a member.
    pub(crate) fn set_links(&mut self, uri: &MessageUri, links: ThreadLinks) -> bool {
        let Some(entry) = self.entries.remove(uri) else {
            return false;
        };
        self.unindex_entry(*uri, &entry);
        let entry = IndexEntry {
            message: entry.message,
            links,
        };
        self.index_entry(*uri, &entry);
        self.entries.insert(*uri, entry);
        true
    }

    fn collect<'a>(&self, uris: impl Iterator<Item = &'a MessageUri>) -> Vec<Arc<Message>> {
        uris.filter_map(|u| self.entries.get(u))
            .map(|e| Arc::clone(&e.message))
            .collect()
    }

    fn index_entry(&mut self, uri: MessageUri, entry: &IndexEntry) {
        let message = &entry.message;
        let links = &entry.links;
        let created_at = message.created_at();

        if message.is_thread_root() {
            self.threads.insert((Reverse(created_at), uri));
            return;
        }

        if let Some(parent) = links.parent {
            self.children
                .entry(parent.uri)
                .or_default()
                .insert((created_at, uri));
        }

        match (links.thread, message.declared_thread_uri()) {
            (Some(root), _) => {
                self.thread_members
                    .entry(root)
                    .or_default()
                    .insert((created_at, uri));
            }
            (None, Some(declared)) => {
                self.unthreaded.entry(declared).or_default().insert(uri);
            }
            (None, None) => {}
        }

        let waiting = !links.parent_refused
            && !matches!(links.parent.map(|p| p.kind), Some(LinkKind::Declared));
        if let (true, Some(declared)) = (waiting, message.declared_parent_uri()) {
            self.awaiting_parent.entry(declared).or_default().insert(uri);
        }

        if links.is_unresolved() {
            self.absolute_orphans.insert(uri);
        }
    }

    fn unindex_entry(&mut self, uri: MessageUri, entry: &IndexEntry) {
        let message = &entry.message;
        let links = &entry.links;
        let created_at = message.created_at();

        if message.is_thread_root() {
            self.threads.remove(&(Reverse(created_at), uri));
            return;
        }

        if let Some(parent) = links.parent {
            remove_from(&mut self.children, &parent.uri, &(created_at, uri));
        }

        match (links.thread, message.declared_thread_uri()) {
            (Some(root), _) => remove_from(&mut self.thread_members, &root, &(created_at, uri)),
            (None, Some(declared)) => remove_from(&mut self.unthreaded, &declared, &uri),
            (None, None) => {}
        }

        if let Some(declared) = message.declared_parent_uri() {
            remove_from(&mut self.awaiting_parent, &declared, &uri);
        }

        self.absolute_orphans.remove(&uri);
    }
}

fn remove_from<K, V>(map: &mut HashMap<K, BTreeSet<V>>, key: &K, value: &V)
where
    K: std::hash::Hash + Eq,
    V: Ord,
{
    if let Some(set) = map.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            map.remove(key);
        }
    }
}
