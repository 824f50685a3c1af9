//! Suggestion registry - the single owner of suggestion and poll state.
//!
//! All state lives behind one `RwLock`, and every stage change is a guarded
//! compare-and-set: the caller names the stage it expects, and the write only
//! happens if the suggestion is still in that stage. Two triggers racing on the
//! same suggestion (a reaction event and a sweep, or a final vote and the
//! timeout sweep) therefore see exactly one success; the loser gets
//! `InvalidTransition` and does nothing. No lock is ever held across a
//! platform call.

use crate::core::staff_poll::{StaffPoll, VoteStatus};
use crate::core::suggestion::{
    CommunityTally, MessageRef, Outcome, Stage, Suggestion, SuggestionId, UserId, VoteChoice,
};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// What a platform message id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedMessage {
    /// The public post of a suggestion
    Suggestion(SuggestionId),
    /// The staff poll of a suggestion
    StaffPoll(SuggestionId),
}

/// Result of a vote that reached a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    /// Suggestion the poll belongs to
    pub suggestion_id: SuggestionId,
    /// Whether the vote counted
    pub status: VoteStatus,
    /// Whether every eligible member has now voted
    pub all_voted: bool,
    /// Yes votes after this call
    pub yes_votes: usize,
    /// No votes after this call
    pub no_votes: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    suggestions: HashMap<SuggestionId, Suggestion>,
    polls: HashMap<SuggestionId, StaffPoll>,
    poll_messages: HashMap<u64, SuggestionId>,
}

impl RegistryState {
    fn suggestion_mut(&mut self, id: SuggestionId) -> Result<&mut Suggestion> {
        self.suggestions
            .get_mut(&id)
            .ok_or(Error::SuggestionNotFound { id })
    }
}

/// In-memory store of every live suggestion and staff poll.
#[derive(Debug, Default)]
pub struct SuggestionRegistry {
    state: RwLock<RegistryState>,
}

impl SuggestionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly posted suggestion in the `Open` stage. Its id is
    /// the id of `message`.
    pub async fn create(
        &self,
        message: MessageRef,
        author_id: UserId,
        title: String,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Result<Suggestion> {
        let id = SuggestionId(message.message_id);
        let suggestion = Suggestion {
            id,
            message,
            author_id,
            title,
            body,
            stage: Stage::Open,
            created_at,
            staff_poll: None,
            outcome: None,
            announcement: None,
            halted: false,
            community: CommunityTally::default(),
        };

        let mut state = self.state.write().await;
        if state.suggestions.contains_key(&id) {
            return Err(Error::InvalidInput {
                message: format!("suggestion {id} is already registered"),
            });
        }
        state.suggestions.insert(id, suggestion.clone());
        Ok(suggestion)
    }

    /// Snapshot of a suggestion.
    pub async fn get(&self, id: SuggestionId) -> Option<Suggestion> {
        self.state.read().await.suggestions.get(&id).cloned()
    }

    /// Snapshot of a suggestion's staff poll.
    pub async fn poll(&self, id: SuggestionId) -> Option<StaffPoll> {
        self.state.read().await.polls.get(&id).cloned()
    }

    /// Classifies a platform message id.
    pub async fn lookup_message(&self, message_id: u64) -> Option<TrackedMessage> {
        let state = self.state.read().await;
        if let Some(id) = state.poll_messages.get(&message_id) {
            return Some(TrackedMessage::StaffPoll(*id));
        }
        let id = SuggestionId(message_id);
        state
            .suggestions
            .contains_key(&id)
            .then_some(TrackedMessage::Suggestion(id))
    }

    /// Ids of non-halted suggestions currently in `stage`.
    pub async fn ids_in_stage(&self, stage: Stage) -> Vec<SuggestionId> {
        let state = self.state.read().await;
        let mut ids: Vec<SuggestionId> = state
            .suggestions
            .values()
            .filter(|s| s.stage == stage && !s.halted)
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Every live suggestion by `author`, oldest first.
    pub async fn by_author(&self, author: UserId) -> Vec<Suggestion> {
        let state = self.state.read().await;
        let mut found: Vec<Suggestion> = state
            .suggestions
            .values()
            .filter(|s| s.author_id == author)
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.created_at, s.id));
        found
    }

    /// Number of live suggestions.
    pub async fn len(&self) -> usize {
        self.state.read().await.suggestions.len()
    }

    /// Whether the registry holds no suggestions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Guarded stage change `from -> to`.
    ///
    /// Fails with `InvalidTransition` unless the suggestion is currently in
    /// `from` and `from -> to` is a forward step. Resolution is not reachable
    /// here; it goes through [`Self::set_outcome`] so the outcome is written in
    /// the same step as the stage.
    pub async fn transition(
        &self,
        id: SuggestionId,
        from: Stage,
        to: Stage,
    ) -> Result<Suggestion> {
        let mut state = self.state.write().await;
        let suggestion = state.suggestion_mut(id)?;

        if suggestion.stage != from || !from.can_advance_to(to) || to == Stage::Resolved {
            debug!(
                "Rejected transition {:?} -> {:?} for suggestion {} (currently {:?})",
                from, to, id, suggestion.stage
            );
            return Err(Error::InvalidTransition {
                id,
                expected: from,
                actual: suggestion.stage,
            });
        }

        suggestion.stage = to;
        Ok(suggestion.clone())
    }

    /// Attaches the posted poll to a suggestion in staff review.
    pub async fn attach_poll(&self, poll: StaffPoll) -> Result<()> {
        let mut state = self.state.write().await;
        let id = poll.suggestion_id;
        let suggestion = state.suggestion_mut(id)?;

        if suggestion.stage != Stage::StaffReview || suggestion.staff_poll.is_some() {
            return Err(Error::InvalidTransition {
                id,
                expected: Stage::StaffReview,
                actual: suggestion.stage,
            });
        }

        suggestion.staff_poll = Some(poll.message);
        state.poll_messages.insert(poll.message.message_id, id);
        state.polls.insert(id, poll);
        Ok(())
    }

    /// Records a staff vote on the poll posted as `poll_message_id`.
    pub async fn record_vote(
        &self,
        poll_message_id: u64,
        voter: UserId,
        choice: VoteChoice,
    ) -> Result<VoteReceipt> {
        let mut state = self.state.write().await;
        let id = *state
            .poll_messages
            .get(&poll_message_id)
            .ok_or(Error::PollNotFound {
                message_id: poll_message_id,
            })?;

        let stage = state.suggestion_mut(id)?.stage;
        if stage != Stage::StaffReview {
            return Err(Error::InvalidTransition {
                id,
                expected: Stage::StaffReview,
                actual: stage,
            });
        }

        let poll = state.polls.get_mut(&id).ok_or(Error::PollNotFound {
            message_id: poll_message_id,
        })?;
        let status = poll.record_vote(voter, choice)?;

        Ok(VoteReceipt {
            suggestion_id: id,
            status,
            all_voted: poll.all_voted(),
            yes_votes: poll.yes_votes(),
            no_votes: poll.no_votes(),
        })
    }

    /// Guarded `StaffReview -> Resolved` with the given outcome.
    pub async fn set_outcome(&self, id: SuggestionId, outcome: Outcome) -> Result<Suggestion> {
        let mut state = self.state.write().await;
        Self::resolve_locked(&mut state, id, outcome)
    }

    /// Resolves a suggestion using its poll's tally as of this instant, so no
    /// vote can land between reading the tally and closing the poll.
    pub async fn resolve_from_poll(&self, id: SuggestionId) -> Result<(Suggestion, StaffPoll)> {
        let mut state = self.state.write().await;
        let poll = state
            .polls
            .get(&id)
            .cloned()
            .ok_or(Error::SuggestionNotFound { id })?;
        let suggestion = Self::resolve_locked(&mut state, id, poll.outcome())?;
        Ok((suggestion, poll))
    }

    fn resolve_locked(
        state: &mut RegistryState,
        id: SuggestionId,
        outcome: Outcome,
    ) -> Result<Suggestion> {
        let suggestion = state.suggestion_mut(id)?;
        if suggestion.stage != Stage::StaffReview || suggestion.staff_poll.is_none() {
            debug!(
                "Suggestion {} already {:?}; not resolving again",
                id, suggestion.stage
            );
            return Err(Error::InvalidTransition {
                id,
                expected: Stage::StaffReview,
                actual: suggestion.stage,
            });
        }
        suggestion.stage = Stage::Resolved;
        suggestion.outcome = Some(outcome);
        Ok(suggestion.clone())
    }

    /// Records where the announcement was posted.
    pub async fn mark_announced(&self, id: SuggestionId, announcement: MessageRef) -> Result<()> {
        let mut state = self.state.write().await;
        state.suggestion_mut(id)?.announcement = Some(announcement);
        Ok(())
    }

    /// Stores the latest community tally read from the public post.
    pub async fn record_community(&self, id: SuggestionId, tally: CommunityTally) -> Result<()> {
        let mut state = self.state.write().await;
        state.suggestion_mut(id)?.community = tally;
        Ok(())
    }

    /// Stops all further progression of a suggestion.
    pub async fn halt(&self, id: SuggestionId) -> Result<()> {
        let mut state = self.state.write().await;
        state.suggestion_mut(id)?.halted = true;
        Ok(())
    }

    /// Removes a withdrawn suggestion and its poll. Later sweeps skip it.
    pub async fn retire(&self, id: SuggestionId) -> Option<Suggestion> {
        let mut state = self.state.write().await;
        let removed = state.suggestions.remove(&id)?;
        if let Some(poll) = state.polls.remove(&id) {
            state.poll_messages.remove(&poll.message.message_id);
        }
        info!("Retired suggestion {} (was {:?})", id, removed.stage);
        Some(removed)
    }

    /// Suggestions in staff review whose poll deadline has passed at `now`.
    pub async fn expired_polls(&self, now: DateTime<Utc>) -> Vec<SuggestionId> {
        let state = self.state.read().await;
        let mut ids: Vec<SuggestionId> = state
            .polls
            .values()
            .filter(|poll| poll.is_expired(now))
            .filter(|poll| {
                state
                    .suggestions
                    .get(&poll.suggestion_id)
                    .is_some_and(|s| s.stage == Stage::StaffReview && !s.halted)
            })
            .map(|poll| poll.suggestion_id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
