//! Suggestion commands - submit, review your own, and view settings.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        core::{archive, content, suggestion::UserId},
        errors::{Error, Result},
    };
    use poise::CreateReply;
    use tracing::info;

    /// Submit a suggestion to the community.
    ///
    /// The suggestion is posted in the suggestion channel; once it collects
    /// enough upvotes it goes to staff for a vote.
    #[poise::command(slash_command, guild_only)]
    pub async fn suggest(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Short title"]
        #[max_length = 100]
        title: String,
        #[description = "What you are suggesting"]
        #[max_length = 1000]
        body: String,
    ) -> Result<()> {
        let author = UserId(ctx.author().id.get());
        let reply = match ctx.data().service.on_submit(author, &title, &body).await {
            Ok(id) => {
                info!("{} submitted suggestion {} via /suggest", ctx.author().name, id);
                format!(
                    "Your suggestion was posted in <#{}>. Thanks!",
                    ctx.data().config.suggestions.channel_id
                )
            }
            Err(Error::InvalidInput { message }) => format!("Could not submit: {message}"),
            Err(e) => return Err(e),
        };

        ctx.send(CreateReply::default().content(reply).ephemeral(true))
            .await?;
        Ok(())
    }

    /// Show the status of everything you have suggested.
    #[poise::command(slash_command, rename = "mysuggestions")]
    pub async fn my_suggestions(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let author = UserId(ctx.author().id.get());
        let data = ctx.data();

        let live = data.service.suggestions_by_author(author).await;
        let archived = archive::get_archived_by_author(&data.database, &author.to_string()).await?;

        ctx.send(
            CreateReply::default()
                .content(content::my_suggestions(&live, &archived))
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }

    /// Show the current suggestion settings.
    #[poise::command(slash_command)]
    pub async fn settings(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.send(
            CreateReply::default()
                .content(ctx.data().config.summary())
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
