//! Staff poll manager - the staff-review stage of a suggestion.
//!
//! Opening a poll snapshots the staff role's members once; later role changes
//! do not affect who may vote. A poll resolves on whichever comes first: every
//! eligible member has voted (checked right after each recorded vote), or the
//! deadline passes (checked by [`StaffPollManager::sweep_expired`]). Both paths
//! end in [`ResolutionPublisher::publish`], which is idempotent.

use crate::core::content;
use crate::core::platform::ChatPlatform;
use crate::core::publisher::{PublishOutcome, ResolutionPublisher};
use crate::core::registry::SuggestionRegistry;
use crate::core::retry::RetryPolicy;
use crate::core::suggestion::{
    ChannelId, Marker, MessageRef, Outcome, RoleId, SuggestionId, UserId, VoteChoice,
};
use crate::errors::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The staff-only review round for one suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffPoll {
    /// Suggestion under review (lookup only)
    pub suggestion_id: SuggestionId,
    /// Poll message in the staff channel
    pub message: MessageRef,
    /// Staff members allowed to vote, fixed when the poll opened
    pub eligible: HashSet<UserId>,
    /// One entry per voter; a voter's first choice is final
    pub votes: HashMap<UserId, VoteChoice>,
    /// When the poll was posted
    pub opened_at: DateTime<Utc>,
    /// When the timeout sweep may resolve it
    pub deadline: DateTime<Utc>,
}

/// Result of a single vote attempt that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    /// Vote counted
    Recorded,
    /// Voter had already voted; counters unchanged
    AlreadyVoted,
}

impl StaffPoll {
    /// A fresh poll with no votes, due `duration` after `opened_at`.
    #[must_use]
    pub fn new(
        suggestion_id: SuggestionId,
        message: MessageRef,
        eligible: HashSet<UserId>,
        opened_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            suggestion_id,
            message,
            eligible,
            votes: HashMap::new(),
            opened_at,
            deadline: opened_at + duration,
        }
    }

    /// Counts `voter`'s choice once. Ineligible voters are rejected.
    pub fn record_vote(&mut self, voter: UserId, choice: VoteChoice) -> Result<VoteStatus> {
        if !self.eligible.contains(&voter) {
            return Err(Error::NotEligible { voter: voter.0 });
        }
        if self.votes.contains_key(&voter) {
            return Ok(VoteStatus::AlreadyVoted);
        }
        self.votes.insert(voter, choice);
        Ok(VoteStatus::Recorded)
    }

    /// Number of yes votes
    #[must_use]
    pub fn yes_votes(&self) -> usize {
        self.votes.values().filter(|c| **c == VoteChoice::Yes).count()
    }

    /// Number of no votes
    #[must_use]
    pub fn no_votes(&self) -> usize {
        self.votes.values().filter(|c| **c == VoteChoice::No).count()
    }

    /// Every eligible member has voted. A poll with nobody eligible is never
    /// complete by participation and waits for its deadline.
    #[must_use]
    pub fn all_voted(&self) -> bool {
        !self.eligible.is_empty() && self.eligible.iter().all(|u| self.votes.contains_key(u))
    }

    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Decision from the current tally.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        Outcome::from_tally(self.yes_votes(), self.no_votes())
    }
}

/// Where and how long staff polls run.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Channel polls are posted in
    pub staff_channel: ChannelId,
    /// Role whose members may vote
    pub staff_role: RoleId,
    /// Time from opening to deadline
    pub duration: Duration,
}

/// What happened to a vote, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Counted; poll still waiting on other voters
    Recorded,
    /// Duplicate vote ignored
    Duplicate,
    /// Counted, and it completed the poll
    Resolved(PublishOutcome),
}

/// Opens polls, records staff votes, and resolves timed-out polls.
pub struct StaffPollManager {
    registry: Arc<SuggestionRegistry>,
    platform: Arc<dyn ChatPlatform>,
    publisher: Arc<ResolutionPublisher>,
    settings: PollSettings,
    retry: RetryPolicy,
}

impl StaffPollManager {
    /// Creates a manager sharing the registry and publisher.
    #[must_use]
    pub fn new(
        registry: Arc<SuggestionRegistry>,
        platform: Arc<dyn ChatPlatform>,
        publisher: Arc<ResolutionPublisher>,
        settings: PollSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            platform,
            publisher,
            settings,
            retry,
        }
    }

    /// Posts the poll for a suggestion that has just entered staff review and
    /// attaches it in the registry.
    ///
    /// The caller must already have won the `Open -> StaffReview` transition;
    /// that guarded step is what keeps this from running twice. Staff can
    /// react as soon as the message is visible, before it is attached, so the
    /// reactions already on it are counted once it is.
    pub async fn open(&self, id: SuggestionId, now: DateTime<Utc>) -> Result<StaffPoll> {
        let suggestion = self
            .registry
            .get(id)
            .await
            .ok_or(Error::SuggestionNotFound { id })?;

        let platform = self.platform.as_ref();
        let role = self.settings.staff_role;
        let eligible = self
            .retry
            .run("fetch staff role members", || platform.fetch_role_members(role))
            .await?;

        let text = content::staff_poll(
            &suggestion,
            &platform.mention(role),
            now + self.settings.duration,
        );
        let channel = self.settings.staff_channel;
        let markers = [Marker::Approve, Marker::Reject];
        let message = self
            .retry
            .run("post staff poll", || {
                platform.post_message(channel, &text, &markers)
            })
            .await?;

        let poll = StaffPoll::new(id, message, eligible, now, self.settings.duration);
        self.registry.attach_poll(poll.clone()).await?;

        if poll.eligible.is_empty() {
            warn!(
                "Staff poll for suggestion {} opened with no eligible staff; it will resolve at its deadline",
                id
            );
        }
        info!(
            "Opened staff poll {} for suggestion {} ({} eligible, deadline {})",
            message.message_id,
            id,
            poll.eligible.len(),
            poll.deadline
        );

        self.collect_early_votes(&poll).await;
        Ok(poll)
    }

    /// Records eligible staff reactions that landed on the poll before it was
    /// registered. Failures here are logged; later votes still arrive as
    /// reaction events and the deadline sweep still applies.
    async fn collect_early_votes(&self, poll: &StaffPoll) {
        let platform = self.platform.as_ref();
        let bot = platform.bot_user_id();
        let message = poll.message;

        for marker in [Marker::Approve, Marker::Reject] {
            let Some(choice) = marker.vote_choice() else {
                continue;
            };
            let reactors = match self
                .retry
                .run("fetch poll reactions", || {
                    platform.fetch_reaction_users(message, marker)
                })
                .await
            {
                Ok(reactors) => reactors,
                Err(e) => {
                    warn!(
                        "Could not read early {} reactions on poll {}: {}",
                        marker.emoji(),
                        message.message_id,
                        e
                    );
                    continue;
                }
            };

            let mut voters: Vec<UserId> = reactors
                .into_iter()
                .filter(|user| Some(*user) != bot && poll.eligible.contains(user))
                .collect();
            voters.sort();

            for voter in voters {
                match self.record_vote(message.message_id, voter, choice).await {
                    Ok(VoteOutcome::Resolved(_)) => return,
                    Ok(VoteOutcome::Recorded) => {
                        debug!("Counted early vote by {} on poll {}", voter, message.message_id);
                    }
                    Ok(VoteOutcome::Duplicate) => {}
                    Err(Error::InvalidTransition { .. } | Error::PollNotFound { .. }) => {
                        return;
                    }
                    Err(e) => {
                        warn!(
                            "Could not count early vote by {} on poll {}: {}",
                            voter, message.message_id, e
                        );
                    }
                }
            }
        }
    }

    /// Records a staff vote from the poll message's reactions.
    ///
    /// `NotEligible` is returned as an error; a repeat vote is reported as
    /// [`VoteOutcome::Duplicate`]. When the vote completes the poll it is
    /// resolved immediately without waiting for the deadline.
    pub async fn record_vote(
        &self,
        poll_message_id: u64,
        voter: UserId,
        choice: VoteChoice,
    ) -> Result<VoteOutcome> {
        let receipt = self
            .registry
            .record_vote(poll_message_id, voter, choice)
            .await?;

        match receipt.status {
            VoteStatus::AlreadyVoted => {
                debug!(
                    "Ignoring repeat vote by {} on suggestion {}",
                    voter, receipt.suggestion_id
                );
                Ok(VoteOutcome::Duplicate)
            }
            VoteStatus::Recorded if receipt.all_voted => {
                debug!(
                    "All staff voted on suggestion {}; resolving now",
                    receipt.suggestion_id
                );
                let outcome = self.publisher.publish(receipt.suggestion_id).await?;
                Ok(VoteOutcome::Resolved(outcome))
            }
            VoteStatus::Recorded => {
                debug!(
                    "Recorded {:?} from {} on suggestion {} ({} yes / {} no)",
                    choice, voter, receipt.suggestion_id, receipt.yes_votes, receipt.no_votes
                );
                Ok(VoteOutcome::Recorded)
            }
        }
    }

    /// Resolves every poll whose deadline has passed, with whatever votes it
    /// has. Each poll is published independently; one failure does not stop
    /// the others. Returns `(resolved, failed)` counts.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> (usize, usize) {
        let expired = self.registry.expired_polls(now).await;
        if expired.is_empty() {
            return (0, 0);
        }
        debug!("{} staff polls past deadline", expired.len());

        let results = join_all(expired.iter().map(|id| self.publisher.publish(*id))).await;

        let mut resolved = 0;
        let mut failed = 0;
        for (id, result) in expired.iter().zip(results) {
            match result {
                Ok(PublishOutcome::Published { .. }) => resolved += 1,
                Ok(PublishOutcome::AlreadyResolved) => {}
                Err(e) => {
                    error!("Failed to resolve expired poll for suggestion {}: {}", id, e);
                    failed += 1;
                }
            }
        }
        (resolved, failed)
    }
}
