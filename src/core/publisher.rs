//! Resolution publisher - closes a suggestion and announces the decision.
//!
//! `publish` may be called concurrently for the same suggestion (the last
//! staff vote and the timeout sweep can both fire). The guarded
//! `StaffReview -> Resolved` step in the registry lets exactly one caller
//! through; every other caller gets [`PublishOutcome::AlreadyResolved`] and
//! posts nothing.

use crate::core::archive;
use crate::core::content;
use crate::core::platform::ChatPlatform;
use crate::core::registry::SuggestionRegistry;
use crate::core::retry::RetryPolicy;
use crate::core::suggestion::{ChannelId, MessageRef, Outcome, RoleId, SuggestionId};
use crate::core::tally::TallyReader;
use crate::errors::{Error, Result};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where announcements go.
#[derive(Debug, Clone, Copy)]
pub struct AnnounceSettings {
    /// Announcement channel
    pub channel: ChannelId,
    /// Role mentioned in the announcement, if any
    pub role: Option<RoleId>,
}

/// Result of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// This call resolved the suggestion and posted the announcement
    Published {
        /// The decision
        outcome: Outcome,
        /// The announcement message
        announcement: MessageRef,
    },
    /// Another caller already resolved it; nothing was posted
    AlreadyResolved,
}

/// Resolves suggestions exactly once and announces them.
pub struct ResolutionPublisher {
    registry: Arc<SuggestionRegistry>,
    platform: Arc<dyn ChatPlatform>,
    tally: TallyReader,
    database: DatabaseConnection,
    settings: AnnounceSettings,
    retry: RetryPolicy,
}

impl ResolutionPublisher {
    /// Creates a publisher writing its archive to `database`.
    #[must_use]
    pub fn new(
        registry: Arc<SuggestionRegistry>,
        platform: Arc<dyn ChatPlatform>,
        database: DatabaseConnection,
        settings: AnnounceSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            tally: TallyReader::new(Arc::clone(&platform), retry),
            platform,
            database,
            settings,
            retry,
        }
    }

    /// Resolves `id` from its poll's tally and posts the announcement.
    ///
    /// The community tally is re-read from the public post for the record;
    /// if that read fails the last tally the watcher saw is used.
    ///
    /// If the announcement cannot be posted after retries the suggestion stays
    /// resolved and the error is returned; it is never announced twice.
    pub async fn publish(&self, id: SuggestionId) -> Result<PublishOutcome> {
        let (mut suggestion, poll) = match self.registry.resolve_from_poll(id).await {
            Ok(resolved) => resolved,
            Err(e @ Error::InvalidTransition { .. }) => {
                debug!("Publish for suggestion {} skipped: {}", id, e);
                return Ok(PublishOutcome::AlreadyResolved);
            }
            Err(e) => return Err(e),
        };

        match self.tally.community(suggestion.message).await {
            Ok(tally) => {
                suggestion.community = tally;
                self.registry.record_community(id, tally).await?;
            }
            Err(e) => debug!(
                "Using last known community tally for suggestion {}: {}",
                id, e
            ),
        }

        let outcome = poll.outcome();
        let platform = self.platform.as_ref();
        let mention = self.settings.role.map(|role| platform.mention(role));
        let text = content::announcement(&suggestion, &poll, outcome, mention.as_deref());
        let channel = self.settings.channel;

        let announcement = self
            .retry
            .run("post announcement", || platform.post_message(channel, &text, &[]))
            .await
            .inspect_err(|e| {
                error!(
                    "Suggestion {} resolved as {} but the announcement failed: {}",
                    id,
                    outcome.as_str(),
                    e
                );
            })?;
        self.registry.mark_announced(id, announcement).await?;

        info!(
            "Suggestion {} resolved: {} ({} yes / {} no)",
            id,
            outcome.as_str(),
            poll.yes_votes(),
            poll.no_votes()
        );

        suggestion.announcement = Some(announcement);
        if let Err(e) =
            archive::archive_resolution(&self.database, &suggestion, &poll, Utc::now()).await
        {
            error!("Failed to archive suggestion {}: {}", id, e);
        }

        Ok(PublishOutcome::Published {
            outcome,
            announcement,
        })
    }
}
