//! Suggestion service - the entry points the bot layer calls.
//!
//! Wires the registry, tally reader, watcher, poll manager, and publisher
//! together once at startup and routes platform events to them:
//! submissions, reaction events, message deletions, and scheduler ticks.

use crate::core::content;
use crate::core::platform::ChatPlatform;
use crate::core::publisher::{AnnounceSettings, ResolutionPublisher};
use crate::core::registry::{SuggestionRegistry, TrackedMessage};
use crate::core::retry::RetryPolicy;
use crate::core::staff_poll::{PollSettings, StaffPollManager, VoteOutcome};
use crate::core::suggestion::{
    ChannelId, Marker, MessageRef, Stage, Suggestion, SuggestionId, UserId, VoteChoice,
    validate_submission,
};
use crate::core::tally::TallyReader;
use crate::core::watcher::{CheckOutcome, ThresholdWatcher};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Read-only inputs to the lifecycle, derived from the app configuration.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleSettings {
    /// Channel public suggestions are posted in
    pub suggestion_channel: ChannelId,
    /// Distinct non-bot upvotes needed for staff review
    pub upvote_threshold: u32,
    /// Staff poll placement and duration
    pub poll: PollSettings,
    /// Announcement placement
    pub announce: AnnounceSettings,
    /// Retry policy for platform calls
    pub retry: RetryPolicy,
}

/// What a reaction event led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Not a tracked message, not a relevant marker, or the bot's own reaction
    Ignored,
    /// Community vote counted; threshold not reached (or suggestion no longer open)
    Tallied,
    /// Upvote pushed the suggestion into staff review
    Escalated,
    /// Staff vote counted
    VoteRecorded,
    /// Staff member had already voted
    DuplicateVote,
    /// Staff vote completed the poll and the result was published
    Resolved,
    /// Suggestion message turned out to be deleted
    Retired,
}

/// Counts of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Open suggestions whose tally was re-read
    pub checked: usize,
    /// Suggestions moved into staff review
    pub escalated: usize,
    /// Suggestions retired because their message was deleted
    pub retired: usize,
    /// Staff polls resolved by timeout
    pub resolved: usize,
    /// Per-suggestion failures (logged, never fatal to the sweep)
    pub failed: usize,
}

/// The suggestion lifecycle, constructed once per process.
pub struct SuggestionService {
    pub(crate) registry: Arc<SuggestionRegistry>,
    pub(crate) platform: Arc<dyn ChatPlatform>,
    pub(crate) watcher: Arc<ThresholdWatcher>,
    pub(crate) polls: Arc<StaffPollManager>,
    pub(crate) publisher: Arc<ResolutionPublisher>,
    settings: LifecycleSettings,
}

impl SuggestionService {
    /// Builds every component around a fresh, empty registry.
    #[must_use]
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        database: DatabaseConnection,
        settings: LifecycleSettings,
    ) -> Self {
        let registry = Arc::new(SuggestionRegistry::new());
        let publisher = Arc::new(ResolutionPublisher::new(
            Arc::clone(&registry),
            Arc::clone(&platform),
            database,
            settings.announce,
            settings.retry,
        ));
        let polls = Arc::new(StaffPollManager::new(
            Arc::clone(&registry),
            Arc::clone(&platform),
            Arc::clone(&publisher),
            settings.poll,
            settings.retry,
        ));
        let watcher = Arc::new(ThresholdWatcher::new(
            Arc::clone(&registry),
            TallyReader::new(Arc::clone(&platform), settings.retry),
            Arc::clone(&polls),
            settings.upvote_threshold,
        ));

        Self {
            registry,
            platform,
            watcher,
            polls,
            publisher,
            settings,
        }
    }

    /// Posts a new suggestion with the upvote and downvote markers pre-seeded
    /// and registers it as `Open`. Returns its id (the posted message id).
    #[instrument(skip(self, title, body))]
    pub async fn on_submit(&self, author: UserId, title: &str, body: &str) -> Result<SuggestionId> {
        self.submit_at(author, title, body, Utc::now()).await
    }

    pub(crate) async fn submit_at(
        &self,
        author: UserId,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<SuggestionId> {
        let (title, body) = validate_submission(title, body)?;
        let text = content::suggestion_post(author, &title, &body);
        let platform = self.platform.as_ref();
        let channel = self.settings.suggestion_channel;
        let markers = [Marker::Upvote, Marker::Downvote];

        let message = self
            .settings
            .retry
            .run("post suggestion", || {
                platform.post_message(channel, &text, &markers)
            })
            .await?;
        let suggestion = self
            .registry
            .create(message, author, title, body, now)
            .await?;

        info!(
            "Suggestion {} submitted by {}: {:?}",
            suggestion.id, author, suggestion.title
        );
        Ok(suggestion.id)
    }

    /// Routes a reaction to the watcher (upvote or downvote on a suggestion)
    /// or the poll manager (approve/reject on a staff poll).
    ///
    /// Only `NotEligible` and platform failures come back as errors; the voter
    /// is notified privately before `NotEligible` is returned.
    #[instrument(skip(self))]
    pub async fn on_reaction_event(
        &self,
        message: MessageRef,
        marker: Marker,
        user: UserId,
    ) -> Result<ReactionOutcome> {
        self.reaction_at(message, marker, user, Utc::now()).await
    }

    pub(crate) async fn reaction_at(
        &self,
        message: MessageRef,
        marker: Marker,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<ReactionOutcome> {
        if self.platform.bot_user_id() == Some(user) {
            return Ok(ReactionOutcome::Ignored);
        }

        match self.registry.lookup_message(message.message_id).await {
            Some(TrackedMessage::Suggestion(id))
                if matches!(marker, Marker::Upvote | Marker::Downvote) =>
            {
                match self.watcher.check(id, now).await? {
                    CheckOutcome::Escalated => Ok(ReactionOutcome::Escalated),
                    CheckOutcome::Retired => Ok(ReactionOutcome::Retired),
                    CheckOutcome::BelowThreshold(_)
                    | CheckOutcome::AlreadyClaimed
                    | CheckOutcome::Skipped => Ok(ReactionOutcome::Tallied),
                }
            }
            Some(TrackedMessage::StaffPoll(id)) => {
                let Some(choice) = marker.vote_choice() else {
                    return Ok(ReactionOutcome::Ignored);
                };
                self.staff_vote(id, message.message_id, user, choice).await
            }
            _ => Ok(ReactionOutcome::Ignored),
        }
    }

    async fn staff_vote(
        &self,
        id: SuggestionId,
        poll_message_id: u64,
        user: UserId,
        choice: VoteChoice,
    ) -> Result<ReactionOutcome> {
        match self.polls.record_vote(poll_message_id, user, choice).await {
            Ok(VoteOutcome::Recorded) => Ok(ReactionOutcome::VoteRecorded),
            Ok(VoteOutcome::Duplicate) => Ok(ReactionOutcome::DuplicateVote),
            Ok(VoteOutcome::Resolved(_)) => Ok(ReactionOutcome::Resolved),
            Err(e @ Error::NotEligible { .. }) => {
                warn!("Rejected staff vote on suggestion {}: {}", id, e);
                if let Err(notify_err) = self
                    .platform
                    .notify_user(user, content::not_eligible_notice())
                    .await
                {
                    warn!("Could not notify {} about ineligible vote: {}", user, notify_err);
                }
                Err(e)
            }
            Err(e @ Error::InvalidTransition { .. }) => {
                debug!("Vote on suggestion {} arrived after resolution: {}", id, e);
                Ok(ReactionOutcome::Ignored)
            }
            Err(e) => Err(e),
        }
    }

    /// Handles deletion of a tracked message: deleting a suggestion post, or
    /// its staff poll while the poll is open, withdraws the suggestion.
    /// Resolved suggestions are left alone.
    pub async fn on_message_deleted(&self, message_id: u64) -> Option<SuggestionId> {
        let id = match self.registry.lookup_message(message_id).await? {
            TrackedMessage::Suggestion(id) | TrackedMessage::StaffPoll(id) => id,
        };
        if self.registry.get(id).await?.stage == Stage::Resolved {
            debug!("Ignoring deletion of message {} of resolved suggestion {}", message_id, id);
            return None;
        }
        let retired = self.registry.retire(id).await?;
        info!(
            "Suggestion {} withdrawn after message {} was deleted",
            retired.id, message_id
        );
        Some(id)
    }

    /// Periodic sweep: re-checks open suggestions and resolves expired polls.
    pub async fn tick(&self) -> SweepReport {
        self.tick_at(Utc::now()).await
    }

    /// [`Self::tick`] at an explicit time.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> SweepReport {
        let watch = self.watcher.sweep(now).await;
        let (resolved, poll_failures) = self.polls.sweep_expired(now).await;

        let report = SweepReport {
            checked: watch.checked,
            escalated: watch.escalated,
            retired: watch.retired,
            resolved,
            failed: watch.failed + poll_failures,
        };
        debug!("Sweep finished: {:?}", report);
        report
    }

    /// Live suggestions submitted by `author`, oldest first.
    pub async fn suggestions_by_author(&self, author: UserId) -> Vec<Suggestion> {
        self.registry.by_author(author).await
    }

    /// Snapshot of one live suggestion.
    pub async fn suggestion(&self, id: SuggestionId) -> Option<Suggestion> {
        self.registry.get(id).await
    }
}
