//! General Discord commands - ping and help.
//! These don't touch the suggestion lifecycle.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let threshold = ctx.data().config.suggestions.upvote_threshold;
        let hours = ctx.data().config.staff.poll_duration_hours;
        let help_text = format!(
            "**SuggestionBuddy Help**\n\
            Share ideas with the server and let staff decide on the popular ones.\n\n\
            **How it works**\n\
            1. Submit an idea with `/suggest`; it is posted in the suggestion channel.\n\
            2. Members react with 👍 or 👎. At {threshold} upvotes it goes to staff review; \
            downvotes are shown with the result but never block it.\n\
            3. Staff vote ✅ or ❌. The poll closes when every staff member has voted \
            or after {hours} hours, and the result is announced.\n\n\
            **Commands**\n\
            • `/suggest <title> <body>` - Submit a suggestion.\n\
            • `/mysuggestions` - See the status of your suggestions.\n\
            • `/settings` - Show channels, roles, and limits.\n\
            • `/ping` - Checks if the bot is responsive.\n\
            • `/help` - Shows this help message."
        );

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
