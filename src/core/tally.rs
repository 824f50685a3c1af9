//! Reaction tally reader.
//!
//! Counts distinct non-bot users who applied a marker. The bot seeds its own
//! markers on every message it posts so voting is a single tap; that seeded
//! reaction is subtracted here and never reaches a threshold check. Only the
//! upvote count feeds escalation; downvotes are carried for display.

use crate::core::platform::{ChatPlatform, ReactionCount};
use crate::core::retry::RetryPolicy;
use crate::core::suggestion::{CommunityTally, Marker, MessageRef};
use crate::errors::Result;
use std::sync::Arc;
use tracing::trace;

/// Reads marker tallies through the platform.
pub struct TallyReader {
    platform: Arc<dyn ChatPlatform>,
    retry: RetryPolicy,
}

impl TallyReader {
    /// Creates a reader over `platform`.
    #[must_use]
    pub fn new(platform: Arc<dyn ChatPlatform>, retry: RetryPolicy) -> Self {
        Self { platform, retry }
    }

    /// Non-bot 👍 and 👎 counts on a suggestion post, from a single read.
    ///
    /// Fails with `MessageGone` if the message was deleted.
    pub async fn community(&self, message: MessageRef) -> Result<CommunityTally> {
        let platform = self.platform.as_ref();
        let counts = self
            .retry
            .run("fetch reaction counts", || {
                platform.fetch_reaction_counts(message)
            })
            .await?;

        let tally = CommunityTally {
            upvotes: count_for(&counts, Marker::Upvote),
            downvotes: count_for(&counts, Marker::Downvote),
        };
        trace!(
            "Message {} has {} up / {} down",
            message.message_id, tally.upvotes, tally.downvotes
        );
        Ok(tally)
    }
}

/// Sums the non-bot applications of `marker` in a raw reaction listing.
#[must_use]
pub fn count_for(counts: &[ReactionCount], marker: Marker) -> u32 {
    counts
        .iter()
        .filter(|c| c.marker == marker)
        .map(|c| c.count.saturating_sub(u32::from(c.includes_bot)))
        .sum()
}
