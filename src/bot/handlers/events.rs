//! Gateway event handler - feeds reactions and deletions into the service.

use crate::bot::BotData;
use crate::core::service::ReactionOutcome;
use crate::core::suggestion::{Marker, MessageRef, UserId};
use crate::errors::{Error, Result};
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

/// Handles the gateway events the lifecycle cares about. Everything else is
/// ignored.
pub async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    match event {
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            handle_reaction(add_reaction, data).await;
        }
        serenity::FullEvent::MessageDelete {
            deleted_message_id,
            ..
        } => {
            data.service
                .on_message_deleted(deleted_message_id.get())
                .await;
        }
        _ => {}
    }
    Ok(())
}

async fn handle_reaction(reaction: &serenity::Reaction, data: &BotData) {
    let serenity::ReactionType::Unicode(emoji) = &reaction.emoji else {
        return;
    };
    let Some(marker) = Marker::from_emoji(emoji) else {
        return;
    };
    let Some(user) = reaction.user_id else {
        return;
    };

    let message = MessageRef::new(reaction.channel_id.get(), reaction.message_id.get());
    match data
        .service
        .on_reaction_event(message, marker, UserId(user.get()))
        .await
    {
        Ok(ReactionOutcome::Ignored) => {}
        Ok(outcome) => debug!(
            "Reaction {} by {} on {}: {:?}",
            emoji, user, reaction.message_id, outcome
        ),
        // Already logged and the voter notified
        Err(Error::NotEligible { .. }) => {}
        Err(e) if e.is_silent() => debug!("Reaction on {} ignored: {}", reaction.message_id, e),
        Err(e) => warn!(
            "Failed to process reaction on message {}: {}",
            reaction.message_id, e
        ),
    }
}
