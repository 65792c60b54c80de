//! Centralized default constants for the Messy Notes client.
//!
//! **This module is the single source of truth** for shared default values.
//! The client, store, and CLI crates reference these constants instead of
//! defining their own magic numbers.

// =============================================================================
// NOTES
// =============================================================================

/// Title shown on a placeholder while its create request is in flight.
pub const PROCESSING_TITLE: &str = "Processing...";

/// Default title for a freshly recorded voice note.
pub const VOICE_NOTE_TITLE: &str = "New Voice Note";

/// Tag attached to voice notes at capture time.
pub const VOICE_TAG: &str = "Voice";

/// Tag attached to photo notes at capture time.
pub const IMAGE_TAG: &str = "Image";

/// Filter sentinel that selects every note.
pub const ALL_FILTER: &str = "All";

// =============================================================================
// CHAT
// =============================================================================

/// Number of most recent messages sent to the assistant.
pub const CHAT_WINDOW: usize = 5;

/// Reply substituted when the chat endpoint cannot be reached.
pub const CHAT_FALLBACK_ANSWER: &str = "something went wrong";

/// Opening assistant message of a new conversation.
pub const CHAT_GREETING: &str =
    "Need to find something or just reflect? Your notes are ready to chat";

// =============================================================================
// REMOTE API
// =============================================================================

/// Default notes/chat API base URL.
pub const API_URL: &str = "https://tptsuemqms.us-west-2.awsapprunner.com";

/// Request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retries for a retryable failure (attempts = retries + 1).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Backoff before the first retry; doubles on every further attempt.
pub const DEFAULT_RETRY_BASE_MS: u64 = 250;

/// Upper bound for a single backoff sleep.
pub const MAX_RETRY_DELAY_MS: u64 = 8_000;

// =============================================================================
// MEDIA
// =============================================================================

/// Default directory for captured media, relative to the working directory.
pub const MEDIA_DIR: &str = "media";

/// Subdirectory holding voice recordings.
pub const AUDIO_SUBDIR: &str = "audio";

/// Subdirectory holding photos.
pub const IMAGE_SUBDIR: &str = "images";

/// File extension of saved recordings.
pub const AUDIO_EXTENSION: &str = "m4a";

// =============================================================================
// EVENTS
// =============================================================================

/// Default note event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 64;
