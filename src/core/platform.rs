//! The narrow chat-platform interface the lifecycle core depends on.
//!
//! The bot layer implements this over serenity's HTTP client; tests use an
//! in-memory fake. Implementations must map "message deleted" responses to
//! [`Error::MessageGone`](crate::errors::Error::MessageGone) and any other
//! network or API failure to
//! [`Error::Transport`](crate::errors::Error::Transport) so the core can tell
//! withdrawals from retryable failures.

use crate::core::suggestion::{ChannelId, Marker, MessageRef, RoleId, UserId};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Raw per-marker reaction count as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionCount {
    /// Which marker
    pub marker: Marker,
    /// Total number of users who applied it, the bot included
    pub count: u32,
    /// Whether the bot itself is one of those users
    pub includes_bot: bool,
}

/// Operations the core needs from the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Posts `content` to `channel` and pre-applies `markers` as the bot.
    async fn post_message(
        &self,
        channel: ChannelId,
        content: &str,
        markers: &[Marker],
    ) -> Result<MessageRef>;

    /// Reads the reaction counts currently on `message`.
    async fn fetch_reaction_counts(&self, message: MessageRef) -> Result<Vec<ReactionCount>>;

    /// Users currently reacting to `message` with `marker`, the bot included.
    async fn fetch_reaction_users(
        &self,
        message: MessageRef,
        marker: Marker,
    ) -> Result<HashSet<UserId>>;

    /// Snapshot of the users currently holding `role`.
    async fn fetch_role_members(&self, role: RoleId) -> Result<HashSet<UserId>>;

    /// Sends a private notice to a single user.
    async fn notify_user(&self, user: UserId, content: &str) -> Result<()>;

    /// The bot's own user id, once known.
    fn bot_user_id(&self) -> Option<UserId>;

    /// Inline mention for a role.
    fn mention(&self, role: RoleId) -> String {
        format!("<@&{}>", role.0)
    }
}
