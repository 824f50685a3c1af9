//! Unified error types for the suggestion lifecycle.
//!
//! Lifecycle errors (`MessageGone`, `InvalidTransition`, `NotEligible`) are
//! ordinary variants here so that callers can match on them; the sweep loops
//! use [`Error::is_silent`] and [`Error::is_transient`] to decide whether a
//! failure is logged, retried, or reported.

use crate::core::suggestion::{Stage, SuggestionId};
use thiserror::Error;

/// Every failure the bot can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read, parsed, or validated
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// Archive database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// User-supplied suggestion text failed validation
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// No live suggestion with this id
    #[error("Suggestion {id} not found")]
    SuggestionNotFound {
        /// The id that was looked up
        id: SuggestionId,
    },

    /// No staff poll is attached to this message
    #[error("No staff poll for message {message_id}")]
    PollNotFound {
        /// Message id of the supposed poll
        message_id: u64,
    },

    /// The backing chat message was deleted
    #[error("Message {message_id} no longer exists")]
    MessageGone {
        /// Id of the deleted message
        message_id: u64,
    },

    /// A guarded stage change lost a race or was already applied
    #[error("Suggestion {id} is {actual:?}, expected {expected:?}")]
    InvalidTransition {
        /// Suggestion whose stage was checked
        id: SuggestionId,
        /// Stage the caller required
        expected: Stage,
        /// Stage the suggestion was actually in
        actual: Stage,
    },

    /// Voter is not part of the poll's staff snapshot
    #[error("User {voter} is not eligible to vote on this poll")]
    NotEligible {
        /// The rejected voter
        voter: u64,
    },

    /// Transient chat-platform failure
    #[error("Transport error: {message}")]
    Transport {
        /// Underlying error text
        message: String,
    },

    /// A transient failure persisted through every retry
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Name of the operation that was retried
        operation: &'static str,
        /// How many attempts were made
        attempts: u32,
        /// The final error observed
        last_error: Box<Error>,
    },

    /// Serenity/Poise framework failure
    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

impl Error {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether this error is an expected no-op that is logged for
    /// diagnostics only and never reported to an end user.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. } | Self::MessageGone { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
