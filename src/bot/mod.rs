//! Bot layer - Discord-specific interface and handlers
//!
//! This module wires the suggestion lifecycle to Discord: slash commands, the
//! gateway event handler, the serenity implementation of the platform
//! interface, and the background sweep.

/// Discord command implementations (suggestion, general)
pub mod commands;
/// Gateway event handler and sweep scheduler
pub mod handlers;
/// Serenity-backed chat platform
pub mod platform;

use crate::config::AppConfig;
use crate::core::platform::ChatPlatform;
use crate::core::service::SuggestionService;
use crate::errors::{Error, Result};
use platform::SerenityPlatform;
use poise::CreateReply;
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands and event handlers.
pub struct BotData {
    /// The suggestion lifecycle
    pub service: Arc<SuggestionService>,
    /// Archive database connection
    pub database: DatabaseConnection,
    /// Loaded application configuration
    pub config: Arc<AppConfig>,
}

impl BotData {
    /// Creates a new `BotData` instance.
    #[must_use]
    pub const fn new(
        service: Arc<SuggestionService>,
        database: DatabaseConnection,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            service,
            database,
            config,
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().name, error);
            let reply = CreateReply::default()
                .content("Something went wrong while handling that command. Please try again later.")
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error message: {}", e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Error handling {} event: {}", event.snake_case_name(), error);
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Starts the bot and blocks until the gateway connection ends.
///
/// The suggestion service is built once the gateway reports ready, because
/// the platform needs the bot's own user id; the sweep scheduler starts at
/// the same time.
#[instrument(skip(token, config, database))]
pub async fn run_bot(
    token: String,
    config: Arc<AppConfig>,
    database: DatabaseConnection,
) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::suggest(),
                commands::my_suggestions(),
                commands::settings(),
                commands::ping(),
                commands::help(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);

                let platform: Arc<dyn ChatPlatform> = Arc::new(SerenityPlatform::new(
                    Arc::clone(&ctx.http),
                    serenity::GuildId::new(config.guild_id),
                    ready.user.id,
                ));
                let service = Arc::new(SuggestionService::new(
                    platform,
                    database.clone(),
                    config.lifecycle_settings(),
                ));
                handlers::spawn_scheduler(Arc::clone(&service), config.sweep_interval());

                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                Ok(BotData::new(service, database, config))
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
