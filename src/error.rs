//! Error types for board and threading operations.

use thiserror::Error;

/// Result type alias for boardweave operations.
pub type Result<T> = std::result::Result<T, BoardError>;

/// Main error type for boardweave operations.
///
/// Missing parents or thread roots are never reported through this type:
/// they are the normal, transient state the orphan mechanism handles.
#[derive(Error, Debug)]
pub enum BoardError {
    /// Board name is empty or violates the naming policy
    #[error("Invalid board name: {0}")]
    InvalidName(String),

    /// A message with the same identity is already a member of the board
    #[error("Duplicate message: {0}")]
    DuplicateMessage(String),

    /// Honoring a declared parent link would make a message its own ancestor
    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    /// Caller violated a documented input bound
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Storage collaborator errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Message content validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BoardError {
    /// Creates a new invalid board name error.
    pub fn invalid_name<T: ToString>(msg: T) -> Self {
        Self::InvalidName(msg.to_string())
    }

    /// Creates a new duplicate message error.
    pub fn duplicate<T: ToString>(msg: T) -> Self {
        Self::DuplicateMessage(msg.to_string())
    }

    /// Creates a new cycle detected error.
    pub fn cycle<T: ToString>(msg: T) -> Self {
        Self::CycleDetected(msg.to_string())
    }

    /// Creates a new precondition error.
    pub fn precondition<T: ToString>(msg: T) -> Self {
        Self::Precondition(msg.to_string())
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Returns true if this error means the message was already known.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateMessage(_))
    }

    /// Returns true if this error reports a refused parent link.
    ///
    /// The message itself was still inserted when this is returned.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CycleDetected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoardError::invalid_name("empty");
        assert_eq!(err.to_string(), "Invalid board name: empty");

        let err = BoardError::storage("disk full");
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_error_classification() {
        assert!(BoardError::duplicate("x").is_duplicate());
        assert!(!BoardError::duplicate("x").is_cycle());
        assert!(BoardError::cycle("x").is_cycle());
        assert!(!BoardError::precondition("x").is_duplicate());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BoardError = io.into();
        assert!(matches!(err, BoardError::Io(_)));
    }
}
