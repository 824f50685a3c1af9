//! Threshold watcher - moves open suggestions into staff review.
//!
//! Checked on every upvote reaction event and again on each periodic sweep.
//! Escalation is claimed through the registry's guarded `Open -> StaffReview`
//! transition before the poll is posted, so seeing the same suggestion twice
//! can never post two polls.

use crate::core::registry::SuggestionRegistry;
use crate::core::staff_poll::StaffPollManager;
use crate::core::suggestion::{Stage, SuggestionId};
use crate::core::tally::TallyReader;
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Result of checking one suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Not open (or unknown); nothing to do
    Skipped,
    /// Still below threshold
    BelowThreshold(u32),
    /// Threshold met and this check opened the staff poll
    Escalated,
    /// Threshold met but another trigger already claimed it
    AlreadyClaimed,
    /// Backing message deleted; suggestion retired
    Retired,
}

/// Counts of what a sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    /// Open suggestions inspected
    pub checked: usize,
    /// Moved into staff review
    pub escalated: usize,
    /// Retired because their message was deleted
    pub retired: usize,
    /// Failed with an error (logged)
    pub failed: usize,
}

/// Escalates open suggestions whose upvote tally reaches the threshold.
pub struct ThresholdWatcher {
    registry: Arc<SuggestionRegistry>,
    tally: TallyReader,
    polls: Arc<StaffPollManager>,
    threshold: u32,
}

impl ThresholdWatcher {
    /// Creates a watcher with an upvote threshold of `threshold`.
    #[must_use]
    pub fn new(
        registry: Arc<SuggestionRegistry>,
        tally: TallyReader,
        polls: Arc<StaffPollManager>,
        threshold: u32,
    ) -> Self {
        Self {
            registry,
            tally,
            polls,
            threshold,
        }
    }

    /// Re-reads the tally of one suggestion and escalates it if due.
    ///
    /// A failure to open the poll after retries halts the suggestion and is
    /// returned to the caller.
    pub async fn check(&self, id: SuggestionId, now: DateTime<Utc>) -> Result<CheckOutcome> {
        let Some(suggestion) = self.registry.get(id).await else {
            return Ok(CheckOutcome::Skipped);
        };
        if suggestion.stage != Stage::Open || suggestion.halted {
            return Ok(CheckOutcome::Skipped);
        }

        let tally = match self.tally.community(suggestion.message).await {
            Ok(tally) => tally,
            Err(Error::MessageGone { .. }) => {
                info!("Suggestion {} was withdrawn (message deleted)", id);
                self.registry.retire(id).await;
                return Ok(CheckOutcome::Retired);
            }
            Err(e) => return Err(e),
        };

        self.registry.record_community(id, tally).await?;

        let count = tally.upvotes;
        if count < self.threshold {
            return Ok(CheckOutcome::BelowThreshold(count));
        }

        match self
            .registry
            .transition(id, Stage::Open, Stage::StaffReview)
            .await
        {
            Ok(_) => {}
            Err(e @ Error::InvalidTransition { .. }) => {
                debug!("Escalation of suggestion {} already claimed: {}", id, e);
                return Ok(CheckOutcome::AlreadyClaimed);
            }
            Err(e) => return Err(e),
        }

        info!(
            "Suggestion {} reached {} upvotes (threshold {}); opening staff review",
            id, count, self.threshold
        );

        if let Err(e) = self.polls.open(id, now).await {
            error!(
                "Could not open staff poll for suggestion {}; halting it: {}",
                id, e
            );
            match self.registry.halt(id).await {
                Ok(()) => {}
                Err(Error::SuggestionNotFound { .. }) => {
                    debug!("Suggestion {} was retired before it could be halted", id);
                }
                Err(halt_err) => error!("Could not halt suggestion {}: {}", id, halt_err),
            }
            return Err(e);
        }
        Ok(CheckOutcome::Escalated)
    }

    /// Checks every open suggestion. Each suggestion's network round trip runs
    /// concurrently, and one failure never stops the others.
    pub async fn sweep(&self, now: DateTime<Utc>) -> WatchReport {
        let ids = self.registry.ids_in_stage(Stage::Open).await;
        let results = join_all(ids.iter().map(|id| self.check(*id, now))).await;

        let mut report = WatchReport {
            checked: ids.len(),
            ..WatchReport::default()
        };
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(CheckOutcome::Escalated) => report.escalated += 1,
                Ok(CheckOutcome::Retired) => report.retired += 1,
                Ok(_) => {}
                Err(e) => {
                    error!("Threshold check failed for suggestion {}: {}", id, e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::suggestion::{CommunityTally, Marker};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_check_below_threshold_stays_open() -> Result<()> {
        let harness = TestHarness::new(&[10]).await?;
        let id = harness.submit().await?;
        harness.upvote(id, &[100]);

        assert_eq!(
            harness.watcher.check(id, test_now()).await?,
            CheckOutcome::BelowThreshold(1)
        );
        assert_eq!(harness.registry.get(id).await.unwrap().stage, Stage::Open);
        Ok(())
    }

    #[tokio::test]
    async fn test_downvotes_are_recorded_but_never_escalate() -> Result<()> {
        let harness = TestHarness::new(&[10]).await?;
        let id = harness.submit().await?;
        let message = harness.registry.get(id).await.unwrap().message;
        harness.upvote(id, &[100]);
        for user in [101, 102, 103] {
            harness.platform.react(message, Marker::Downvote, user);
        }

        assert_eq!(
            harness.watcher.check(id, test_now()).await?,
            CheckOutcome::BelowThreshold(1)
        );
        let suggestion = harness.registry.get(id).await.unwrap();
        assert_eq!(suggestion.stage, Stage::Open);
        assert_eq!(
            suggestion.community,
            CommunityTally {
                upvotes: 1,
                downvotes: 3,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_poll_failure_after_retire_returns_original_error() -> Result<()> {
        let (harness, held) = TestHarness::with_held_staff_post(&[10]).await?;
        let id = harness.submit().await?;
        harness.upvote(id, &[100, 101]);
        harness.platform.fail_next_posts(10);

        let watcher = Arc::clone(&harness.watcher);
        let task = tokio::spawn(async move { watcher.check(id, test_now()).await });

        // Withdrawn while its poll is being posted
        held.wait_posted().await;
        harness.registry.retire(id).await;
        held.release();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::RetriesExhausted { .. })));
        assert!(harness.registry.get(id).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_bot_seed_does_not_reach_threshold() -> Result<()> {
        // Threshold 2: one user upvote plus the bot's own seed must not escalate
        let harness = TestHarness::new(&[10]).await?;
        let id = harness.submit().await?;
        harness.upvote(id, &[100]);

        harness.watcher.check(id, test_now()).await?;
        assert!(harness.platform.posts_in(STAFF_CHANNEL).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_check_escalates_once() -> Result<()> {
        let harness = TestHarness::new(&[10, 11]).await?;
        let id = harness.submit().await?;
        harness.upvote(id, &[100, 101]);

        let (a, b) = tokio::join!(
            harness.watcher.check(id, test_now()),
            harness.watcher.check(id, test_now())
        );
        let outcomes = [a?, b?];
        assert!(outcomes.contains(&CheckOutcome::Escalated));
        assert_eq!(harness.platform.posts_in(STAFF_CHANNEL).len(), 1);

        let suggestion = harness.registry.get(id).await.unwrap();
        assert_eq!(suggestion.stage, Stage::StaffReview);
        assert!(suggestion.staff_poll.is_some());

        // Further upvotes after escalation change nothing
        harness.upvote(id, &[102]);
        assert_eq!(
            harness.watcher.check(id, test_now()).await?,
            CheckOutcome::Skipped
        );
        assert_eq!(harness.platform.posts_in(STAFF_CHANNEL).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_message_retires_suggestion() -> Result<()> {
        let harness = TestHarness::new(&[10]).await?;
        let id = harness.submit().await?;
        let message = harness.registry.get(id).await.unwrap().message;
        harness.platform.delete(message);

        assert_eq!(
            harness.watcher.check(id, test_now()).await?,
            CheckOutcome::Retired
        );
        assert!(harness.registry.get(id).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_poll_failure_halts_only_that_suggestion() -> Result<()> {
        let harness = TestHarness::new(&[10]).await?;
        let failing = harness.submit().await?;
        harness.upvote(failing, &[100, 101]);

        harness.platform.fail_next_posts(10);
        let report = harness.watcher.sweep(test_now()).await;
        assert_eq!(report.failed, 1);
        assert!(harness.registry.get(failing).await.unwrap().halted);
        harness.platform.fail_next_posts(0);

        let healthy = harness.submit().await?;
        harness.upvote(healthy, &[100, 101]);
        let report = harness.watcher.sweep(test_now()).await;
        assert_eq!(
            report,
            WatchReport {
                checked: 1,
                escalated: 1,
                retired: 0,
                failed: 0,
            }
        );
        Ok(())
    }
}
