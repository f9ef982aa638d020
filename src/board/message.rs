//! Message model.
//!
//! A message is immutable once built: its content (including the declared
//! parent and thread references) is hashed into the message URI. The links a
//! board actually resolves for a message live in that board's
//! [`ThreadIndex`](crate::board::ThreadIndex), never in the message.
//!
//! Declared link rules:
//! - A message without a declared parent is a thread root and declares no
//!   thread.
//! - A reply declares both its parent and the root of the thread it belongs
//!   to. Either may be unknown to a board when the reply arrives.

use crate::board::constants::{
    MAX_ATTACHMENT_NAME_SIZE, MAX_BODY_SIZE, MAX_IDENTITY_SIZE, MAX_TITLE_SIZE,
};
use crate::board::name::BoardName;
use crate::dag::{current_timestamp_millis, ContentHash, DagNodeOps};
use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Content address of a message.
pub type MessageUri = ContentHash;

/// Identity of a message author.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityId(String);

impl IdentityId {
    /// Wraps an identity string.
    ///
    /// # Errors
    /// Returns a validation error if the identity is empty, too long, or
    /// contains `@` (which separates the nonce from the author in message IDs).
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(BoardError::validation("Identity cannot be empty"));
        }
        if id.len() > MAX_IDENTITY_SIZE {
            return Err(BoardError::validation(format!(
                "Identity exceeds maximum size of {} bytes",
                MAX_IDENTITY_SIZE
            )));
        }
        if id.contains('@') {
            return Err(BoardError::validation("Identity cannot contain '@'"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Globally unique message identifier: `{nonce}@{author}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generates a fresh ID for `author` using a random UUID v4 nonce.
    pub fn generate(author: &IdentityId) -> Self {
        Self(format!("{}@{}", Uuid::new_v4(), author))
    }

    /// Builds an ID from an explicit nonce, e.g. one decoded from the wire.
    pub fn from_parts(nonce: Uuid, author: &IdentityId) -> Self {
        Self(format!("{}@{}", nonce, author))
    }

    /// Parses an ID of the form `{uuid}@{author}`.
    pub fn parse(s: &str) -> Result<Self> {
        let (nonce, author) = s
            .split_once('@')
            .ok_or_else(|| BoardError::validation(format!("Message ID '{}' lacks '@'", s)))?;
        let nonce = Uuid::parse_str(nonce)
            .map_err(|e| BoardError::validation(format!("Invalid message ID nonce: {}", e)))?;
        let author = IdentityId::new(author)?;
        Ok(Self::from_parts(nonce, &author))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the author part of the ID.
    pub fn author(&self) -> &str {
        self.0.split_once('@').map(|(_, a)| a).unwrap_or_default()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A declared reference to another message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: MessageId,
    pub uri: MessageUri,
}

/// A file attached to a message. Opaque to threading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Where the file can be fetched from.
    pub uri: String,
    /// Size in bytes, if the publisher stated it.
    pub size: Option<u64>,
}

impl Attachment {
    pub fn new(uri: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            uri: uri.into(),
            size,
        }
    }
}

/// The hashed content of a message.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageContent {
    pub id: MessageId,
    pub author: IdentityId,
    /// Boards the message was cross-posted to.
    pub boards: Vec<BoardName>,
    /// Board replies should go to, if the author asked for one.
    pub reply_board: Option<BoardName>,
    pub parent: Option<MessageRef>,
    pub thread: Option<MessageRef>,
    pub title: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub created_at: u64,
}

impl fmt::Debug for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContent")
            .field("id", &self.id)
            .field("boards", &self.boards)
            .field("parent", &self.parent.as_ref().map(|p| p.uri))
            .field("thread", &self.thread.as_ref().map(|t| t.uri))
            .field("body_len", &self.body.len())
            .field("attachments", &self.attachments.len())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl MessageContent {
    /// Checks the content-level rules.
    ///
    /// Board and attachment counts are deployment bounds and are checked by
    /// the engine against its [`EngineConfig`](crate::config::EngineConfig).
    pub fn validate(&self) -> Result<()> {
        if self.title.len() > MAX_TITLE_SIZE {
            return Err(BoardError::validation(format!(
                "Title exceeds maximum size of {} bytes",
                MAX_TITLE_SIZE
            )));
        }
        if self.body.len() > MAX_BODY_SIZE {
            return Err(BoardError::validation(format!(
                "Body exceeds maximum size of {} bytes",
                MAX_BODY_SIZE
            )));
        }
        if let Some(attachment) = self
            .attachments
            .iter()
            .find(|a| a.uri.is_empty() || a.uri.len() > MAX_ATTACHMENT_NAME_SIZE)
        {
            return Err(BoardError::validation(format!(
                "Attachment URI must be 1..={} bytes, got {}",
                MAX_ATTACHMENT_NAME_SIZE,
                attachment.uri.len()
            )));
        }
        if self.id.author() != self.author.as_str() {
            return Err(BoardError::validation(format!(
                "Message ID {} does not belong to author {}",
                self.id, self.author
            )));
        }
        match (&self.parent, &self.thread) {
            (Some(_), None) => Err(BoardError::validation(
                "A reply must declare its thread root",
            )),
            (None, Some(_)) => Err(BoardError::validation(
                "A thread root cannot declare a thread",
            )),
            _ => Ok(()),
        }
    }

    /// Computes the content hash of this message content.
    pub fn content_hash(&self) -> Result<ContentHash> {
        ContentHash::compute(self)
    }
}

/// A complete message: content plus its URI.
#[derive(Clone, Serialize, Deserialize)]
pub struct Message {
    pub content: MessageContent,
    uri: MessageUri,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("uri", &self.uri)
            .field("id", &self.content.id)
            .field("parent", &self.declared_parent_uri())
            .field("thread", &self.declared_thread_uri())
            .finish()
    }
}

impl Message {
    /// Validates `content` and addresses it by its content hash.
    pub fn from_content(content: MessageContent) -> Result<Self> {
        content.validate()?;
        let uri = content.content_hash()?;
        Ok(Self { content, uri })
    }

    /// Wraps content under a locator assigned by the transport.
    ///
    /// The content rules are checked, the locator is not: use
    /// [`verify`](Self::verify) when the locator is meant to be a content hash.
    pub fn with_locator(content: MessageContent, uri: MessageUri) -> Result<Self> {
        content.validate()?;
        Ok(Self { content, uri })
    }

    /// Checks that the URI is the hash of the content.
    pub fn verify(&self) -> Result<()> {
        self.content.validate()?;
        let computed = self.content.content_hash()?;
        if computed != self.uri {
            return Err(BoardError::validation("Message content hash mismatch"));
        }
        Ok(())
    }

    pub fn uri(&self) -> MessageUri {
        self.uri
    }

    pub fn id(&self) -> &MessageId {
        &self.content.id
    }

    pub fn author(&self) -> &IdentityId {
        &self.content.author
    }

    pub fn boards(&self) -> &[BoardName] {
        &self.content.boards
    }

    pub fn reply_board(&self) -> Option<&BoardName> {
        self.content.reply_board.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn body(&self) -> &str {
        &self.content.body
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.content.attachments
    }

    pub fn created_at(&self) -> u64 {
        self.content.created_at
    }

    /// True if the message declares no parent.
    pub fn is_thread_root(&self) -> bool {
        self.content.parent.is_none()
    }

    pub fn declared_parent(&self) -> Option<&MessageRef> {
        self.content.parent.as_ref()
    }

    pub fn declared_thread(&self) -> Option<&MessageRef> {
        self.content.thread.as_ref()
    }

    pub fn declared_parent_uri(&self) -> Option<MessageUri> {
        self.content.parent.as_ref().map(|p| p.uri)
    }

    pub fn declared_thread_uri(&self) -> Option<MessageUri> {
        self.content.thread.as_ref().map(|t| t.uri)
    }

    /// True if the message was posted to `board`.
    pub fn is_posted_to(&self, board: &BoardName) -> bool {
        self.content.boards.contains(board)
    }

    /// Returns a reference other messages can declare.
    pub fn to_ref(&self) -> MessageRef {
        MessageRef {
            id: self.content.id.clone(),
            uri: self.uri,
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Message {}

impl DagNodeOps for Message {
    fn hash(&self) -> &ContentHash {
        &self.uri
    }

    fn parent_hashes(&self) -> Vec<ContentHash> {
        self.declared_parent_uri()
            .into_iter()
            .chain(self.declared_thread_uri())
            .collect()
    }

    fn created_at(&self) -> u64 {
        self.content.created_at
    }
}

/// Builder for messages.
///
/// ```
/// use boardweave::board::{BoardName, IdentityId, MessageDraft};
///
/// let board = BoardName::new("en.test").unwrap();
/// let alice = IdentityId::new("alice").unwrap();
///
/// let root = MessageDraft::new(alice.clone())
///     .board(board.clone())
///     .title("Hello")
///     .build()
///     .unwrap();
/// let reply = MessageDraft::new(alice)
///     .board(board)
///     .reply_to(&root)
///     .body("Hi!")
///     .build()
///     .unwrap();
///
/// assert_eq!(reply.declared_thread_uri(), Some(root.uri()));
/// ```
#[derive(Debug, Clone)]
pub struct MessageDraft {
    author: IdentityId,
    id: Option<MessageId>,
    boards: Vec<BoardName>,
    reply_board: Option<BoardName>,
    parent: Option<MessageRef>,
    thread: Option<MessageRef>,
    title: String,
    body: String,
    attachments: Vec<Attachment>,
    created_at: Option<u64>,
}

impl MessageDraft {
    pub fn new(author: IdentityId) -> Self {
        Self {
            author,
            id: None,
            boards: Vec::new(),
            reply_board: None,
            parent: None,
            thread: None,
            title: String::new(),
            body: String::new(),
            attachments: Vec::new(),
            created_at: None,
        }
    }

    /// Uses an explicit ID instead of generating one.
    pub fn id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn board(mut self, board: BoardName) -> Self {
        self.boards.push(board);
        self
    }

    pub fn boards(mut self, boards: impl IntoIterator<Item = BoardName>) -> Self {
        self.boards.extend(boards);
        self
    }

    pub fn reply_board(mut self, board: BoardName) -> Self {
        self.reply_board = Some(board);
        self
    }

    /// Declares `parent` as parent, inheriting its thread root.
    pub fn reply_to(mut self, parent: &Message) -> Self {
        self.thread = Some(
            parent
                .declared_thread()
                .cloned()
                .unwrap_or_else(|| parent.to_ref()),
        );
        self.parent = Some(parent.to_ref());
        self
    }

    pub fn parent(mut self, parent: MessageRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn thread(mut self, thread: MessageRef) -> Self {
        self.thread = Some(thread);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the content without hashing it.
    pub fn into_content(self) -> MessageContent {
        MessageContent {
            id: self
                .id
                .unwrap_or_else(|| MessageId::generate(&self.author)),
            author: self.author,
            boards: self.boards,
            reply_board: self.reply_board,
            parent: self.parent,
            thread: self.thread,
            title: self.title,
            body: self.body,
            attachments: self.attachments,
            created_at: self.created_at.unwrap_or_else(current_timestamp_millis),
        }
    }

    /// Validates the draft and builds a content-addressed message.
    pub fn build(self) -> Result<Message> {
        Message::from_content(self.into_content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> IdentityId {
        IdentityId::new("alice").unwrap()
    }

    fn board() -> BoardName {
        BoardName::new("test").unwrap()
    }

    #[test]
    fn test_message_id_format() {
        let id = MessageId::generate(&alice());
        assert_eq!(id.author(), "alice");

        let parsed = MessageId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);

        assert!(MessageId::parse("no-at-sign").is_err());
        assert!(MessageId::parse("not-a-uuid@alice").is_err());
    }

    #[test]
    fn test_identity_validation() {
        assert!(IdentityId::new("").is_err());
        assert!(IdentityId::new("a@b").is_err());
        assert!(IdentityId::new("x".repeat(MAX_IDENTITY_SIZE + 1)).is_err());
    }

    #[test]
    fn test_root_and_reply_links() {
        let root = MessageDraft::new(alice()).board(board()).build().unwrap();
        assert!(root.is_thread_root());
        assert_eq!(root.declared_thread_uri(), None);

        let reply = MessageDraft::new(alice())
            .board(board())
            .reply_to(&root)
            .build()
            .unwrap();
        assert!(!reply.is_thread_root());
        assert_eq!(reply.declared_parent_uri(), Some(root.uri()));
        assert_eq!(reply.declared_thread_uri(), Some(root.uri()));

        let nested = MessageDraft::new(alice())
            .board(board())
            .reply_to(&reply)
            .build()
            .unwrap();
        assert_eq!(nested.declared_parent_uri(), Some(reply.uri()));
        assert_eq!(nested.declared_thread_uri(), Some(root.uri()));
    }

    #[test]
    fn test_uri_is_content_hash() {
        let msg = MessageDraft::new(alice())
            .board(board())
            .body("hello")
            .build()
            .unwrap();
        assert!(msg.verify().is_ok());

        let mut tampered = msg.clone();
        tampered.content.body = "changed".to_string();
        assert!(tampered.verify().is_err());
    }

    #[test]
    fn test_distinct_messages_distinct_uris() {
        let a = MessageDraft::new(alice()).board(board()).build().unwrap();
        let b = MessageDraft::new(alice()).board(board()).build().unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.uri(), b.uri());
    }

    #[test]
    fn test_reply_requires_thread() {
        let root = MessageDraft::new(alice()).board(board()).build().unwrap();
        let result = MessageDraft::new(alice())
            .board(board())
            .parent(root.to_ref())
            .build();
        assert!(matches!(result, Err(BoardError::Validation(_))));

        let result = MessageDraft::new(alice())
            .board(board())
            .thread(root.to_ref())
            .build();
        assert!(matches!(result, Err(BoardError::Validation(_))));
    }

    #[test]
    fn test_size_limits() {
        let result = MessageDraft::new(alice())
            .board(board())
            .body("x".repeat(MAX_BODY_SIZE + 1))
            .build();
        assert!(result.is_err());

        let result = MessageDraft::new(alice())
            .board(board())
            .title("x".repeat(MAX_TITLE_SIZE + 1))
            .build();
        assert!(result.is_err());

        let result = MessageDraft::new(alice())
            .board(board())
            .attachment(Attachment::new("", None))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_foreign_id_rejected() {
        let bob = IdentityId::new("bob").unwrap();
        let result = MessageDraft::new(alice())
            .id(MessageId::generate(&bob))
            .board(board())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_with_locator_keeps_uri() {
        let content = MessageDraft::new(alice()).board(board()).into_content();
        let locator = ContentHash::from_bytes([7u8; 64]);
        let msg = Message::with_locator(content, locator).unwrap();
        assert_eq!(msg.uri(), locator);
        assert!(msg.verify().is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_uri() {
        let msg = MessageDraft::new(alice())
            .board(board())
            .body("json")
            .build()
            .unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.uri(), msg.uri());
        assert!(back.verify().is_ok());
    }

    #[test]
    fn test_dag_parents() {
        let root = MessageDraft::new(alice()).board(board()).build().unwrap();
        let reply = MessageDraft::new(alice())
            .board(board())
            .reply_to(&root)
            .build()
            .unwrap();
        assert!(root.parent_hashes().is_empty());
        assert_eq!(reply.parent_hashes(), vec![root.uri(), root.uri()]);
    }
}
