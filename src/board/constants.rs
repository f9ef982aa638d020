//! Shared constants for message validation and limits.
//!
//! The per-message bounds are defaults; deployments override them through
//! [`EngineConfig`](crate::config::EngineConfig).

// =============================================================================
// Content Size Limits
// =============================================================================

/// Maximum board name size (256 bytes).
pub const MAX_BOARD_NAME_LENGTH: usize = 256;

/// Maximum message title size (256 bytes).
pub const MAX_TITLE_SIZE: usize = 256;

/// Maximum message body size (64KB).
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Maximum attachment file name size (256 bytes).
pub const MAX_ATTACHMENT_NAME_SIZE: usize = 256;

/// Maximum identity identifier size (128 bytes).
pub const MAX_IDENTITY_SIZE: usize = 128;

// =============================================================================
// Cross-Post Limits
// =============================================================================

/// Default maximum number of boards a single message may be cross-posted to.
pub const DEFAULT_MAX_BOARDS_PER_MESSAGE: usize = 16;

/// Default maximum number of attachments per message.
pub const DEFAULT_MAX_ATTACHMENTS_PER_MESSAGE: usize = 256;
