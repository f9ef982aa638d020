//! Resolved per-board links.

use crate::board::message::MessageUri;
use serde::{Deserialize, Serialize};

/// How a resolved parent link was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// The parent is the message's declared parent.
    Declared,
    /// The parent is the thread root, standing in until the declared parent
    /// is observed.
    Provisional,
}

/// A resolved parent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentLink {
    pub uri: MessageUri,
    pub kind: LinkKind,
}

impl ParentLink {
    pub fn declared(uri: MessageUri) -> Self {
        Self {
            uri,
            kind: LinkKind::Declared,
        }
    }

    pub fn provisional(uri: MessageUri) -> Self {
        Self {
            uri,
            kind: LinkKind::Provisional,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.kind == LinkKind::Provisional
    }
}

/// The links a board resolved for one message.
///
/// Thread roots always carry empty links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadLinks {
    pub parent: Option<ParentLink>,
    pub thread: Option<MessageUri>,
    /// The declared parent was present but refused because linking to it
    /// would close a cycle. Such a message no longer waits for its parent.
    pub parent_refused: bool,
}

impl ThreadLinks {
    /// True if neither a parent nor a thread root is resolved.
    pub fn is_unresolved(&self) -> bool {
        self.parent.is_none() && self.thread.is_none()
    }

    pub fn parent_uri(&self) -> Option<MessageUri> {
        self.parent.map(|p| p.uri)
    }

    /// True if the resolved parent is the declared one.
    pub fn has_declared_parent(&self) -> bool {
        matches!(
            self.parent,
            Some(ParentLink {
                kind: LinkKind::Declared,
                ..
            })
        )
    }
}
