/// Resolution archive in the database
pub mod archive;
/// Message text for suggestions, polls, and announcements
pub mod content;
/// Chat platform abstraction
pub mod platform;
/// Exactly-once resolution and announcement
pub mod publisher;
/// In-memory lifecycle state
pub mod registry;
/// Retry with backoff for platform calls
pub mod retry;
/// Entry points used by the bot layer
pub mod service;
/// Staff review polls
pub mod staff_poll;
/// Suggestion data model
pub mod suggestion;
/// Upvote tally reads
pub mod tally;
/// Upvote threshold watcher
pub mod watcher;
