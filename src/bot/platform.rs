//! Serenity implementation of the core's chat platform interface.

use crate::core::platform::{ChatPlatform, ReactionCount};
use crate::core::suggestion::{ChannelId, Marker, MessageRef, RoleId, UserId};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Discord JSON error code for "Unknown Message"
const UNKNOWN_MESSAGE: isize = 10008;
/// Page size for guild member listing (Discord maximum)
const MEMBER_PAGE: u64 = 1000;
/// Page size for reaction user listing (Discord maximum)
const REACTION_PAGE: u8 = 100;

/// Talks to Discord over serenity's HTTP client.
pub struct SerenityPlatform {
    http: Arc<serenity::Http>,
    guild_id: serenity::GuildId,
    bot_user: serenity::UserId,
}

impl SerenityPlatform {
    /// Creates a platform bound to one guild, acting as `bot_user`.
    #[must_use]
    pub const fn new(
        http: Arc<serenity::Http>,
        guild_id: serenity::GuildId,
        bot_user: serenity::UserId,
    ) -> Self {
        Self {
            http,
            guild_id,
            bot_user,
        }
    }
}

/// Splits serenity failures into "the message is gone" and everything else,
/// which is treated as transient.
fn classify(err: serenity::Error, message_id: u64) -> Error {
    if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) = &err {
        if response.error.code == UNKNOWN_MESSAGE || response.status_code.as_u16() == 404 {
            return Error::MessageGone { message_id };
        }
    }
    transport(&err)
}

fn transport(err: &serenity::Error) -> Error {
    Error::Transport {
        message: err.to_string(),
    }
}

fn reaction(marker: Marker) -> serenity::ReactionType {
    serenity::ReactionType::Unicode(marker.emoji().to_string())
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn post_message(
        &self,
        channel: ChannelId,
        content: &str,
        markers: &[Marker],
    ) -> Result<MessageRef> {
        let channel_id = serenity::ChannelId::new(channel.0);
        let message = channel_id
            .send_message(&self.http, serenity::CreateMessage::new().content(content))
            .await
            .map_err(|e| transport(&e))?;

        // The message exists now; a failed seed reaction must not cause a
        // retry that would post it twice.
        for marker in markers {
            if let Err(e) = channel_id
                .create_reaction(&self.http, message.id, reaction(*marker))
                .await
            {
                warn!(
                    "Could not add {} to message {}: {}",
                    marker.emoji(),
                    message.id,
                    e
                );
            }
        }

        Ok(MessageRef::new(channel.0, message.id.get()))
    }

    async fn fetch_reaction_counts(&self, message: MessageRef) -> Result<Vec<ReactionCount>> {
        let fetched = self
            .http
            .get_message(
                serenity::ChannelId::new(message.channel_id.0),
                serenity::MessageId::new(message.message_id),
            )
            .await
            .map_err(|e| classify(e, message.message_id))?;

        Ok(fetched
            .reactions
            .iter()
            .filter_map(|r| match &r.reaction_type {
                serenity::ReactionType::Unicode(emoji) => {
                    Marker::from_emoji(emoji).map(|marker| ReactionCount {
                        marker,
                        count: u32::try_from(r.count).unwrap_or(u32::MAX),
                        includes_bot: r.me,
                    })
                }
                _ => None,
            })
            .collect())
    }

    async fn fetch_reaction_users(
        &self,
        message: MessageRef,
        marker: Marker,
    ) -> Result<HashSet<UserId>> {
        let channel_id = serenity::ChannelId::new(message.channel_id.0);
        let message_id = serenity::MessageId::new(message.message_id);
        let mut users = HashSet::new();
        let mut after: Option<serenity::UserId> = None;

        loop {
            let page = channel_id
                .reaction_users(
                    &self.http,
                    message_id,
                    reaction(marker),
                    Some(REACTION_PAGE),
                    after,
                )
                .await
                .map_err(|e| classify(e, message.message_id))?;
            let page_len = page.len();

            users.extend(page.iter().map(|u| UserId(u.id.get())));

            after = page.last().map(|u| u.id);
            if page_len < usize::from(REACTION_PAGE) {
                break;
            }
        }

        Ok(users)
    }

    async fn fetch_role_members(&self, role: RoleId) -> Result<HashSet<UserId>> {
        let role_id = serenity::RoleId::new(role.0);
        let mut members = HashSet::new();
        let mut after: Option<serenity::UserId> = None;

        loop {
            let page = self
                .guild_id
                .members(&self.http, Some(MEMBER_PAGE), after)
                .await
                .map_err(|e| transport(&e))?;
            let page_len = page.len();

            members.extend(
                page.iter()
                    .filter(|m| !m.user.bot && m.roles.contains(&role_id))
                    .map(|m| UserId(m.user.id.get())),
            );

            after = page.last().map(|m| m.user.id);
            if u64::try_from(page_len).unwrap_or(0) < MEMBER_PAGE {
                break;
            }
        }

        debug!("Role {} has {} members", role.0, members.len());
        Ok(members)
    }

    async fn notify_user(&self, user: UserId, content: &str) -> Result<()> {
        serenity::UserId::new(user.0)
            .direct_message(&self.http, serenity::CreateMessage::new().content(content))
            .await
            .map_err(|e| transport(&e))?;
        Ok(())
    }

    fn bot_user_id(&self) -> Option<UserId> {
        Some(UserId(self.bot_user.get()))
    }
}
