//! Library root for the `kodekalender` progression engine
//!
//! Decides, for a player session, what content is visible, what actions
//! are legal, how puzzle and badge state advances, and how that state is
//! persisted across interchangeable storage backends.

// Core error handling
pub mod errors;

// Calendar clock & content
pub mod catalog;
pub mod catalog_loader;
pub mod game_clock;

// Session state & persistence
pub mod session_record;
pub mod session_store;
pub mod session_store_remote;
pub mod session_store_sled;

// Progression core
pub mod badge_notifier;
pub mod progression_engine;
pub mod unlock_resolver;

// Identity lookup
pub mod credential;

// Runtime configuration
pub mod runtime_config;

pub mod input_validator;


// Re-export the types callers touch on every operation
pub use catalog::{BadgeCondition, BadgeSpec, ContentCatalog, Mission, StoryArc};
pub use errors::{KalenderError, KalenderResult};
pub use progression_engine::{
    CodeSubmission,      // submit_code outcome
    DecryptionOutcome,   // attempt_decryption outcome
    ProgressionEngine,   // the facade itself
    SessionOverview,     // guardian dashboard projection
    VisibleContent,      // unlocked topics/files/modules
};
pub use session_record::{EarnedBadge, SessionRecord, SubmittedCode};
pub use session_store::{SessionPatch, SessionStore, StoreError};
