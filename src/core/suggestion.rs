//! Suggestion data model - identifiers, lifecycle stages, and vote markers.
//!
//! Identifiers are plain newtypes over the chat platform's snowflake ids so the
//! core never depends on serenity types. A suggestion's id is the id of the
//! message it was posted as.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum title length accepted on submission
pub const MAX_TITLE_LEN: usize = 100;
/// Maximum body length accepted on submission
pub const MAX_BODY_LEN: usize = 1000;

/// Identifier of a suggestion, equal to its backing message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuggestionId(pub u64);

/// Chat platform user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Chat platform channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

/// Chat platform role id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub u64);

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a message previously posted on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Channel the message lives in
    pub channel_id: ChannelId,
    /// Platform message id
    pub message_id: u64,
}

impl MessageRef {
    /// Builds a reference from raw ids.
    #[must_use]
    pub const fn new(channel_id: u64, message_id: u64) -> Self {
        Self {
            channel_id: ChannelId(channel_id),
            message_id,
        }
    }
}

/// Vote marker alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    /// Public support for a suggestion
    Upvote,
    /// Public disagreement; shown in results, never escalates
    Downvote,
    /// Staff approval
    Approve,
    /// Staff rejection
    Reject,
}

impl Marker {
    /// The emoji used to represent this marker on the platform.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Upvote => "👍",
            Self::Downvote => "👎",
            Self::Approve => "✅",
            Self::Reject => "❌",
        }
    }

    /// Maps a reaction emoji back to a marker, if it belongs to the alphabet.
    #[must_use]
    pub fn from_emoji(emoji: &str) -> Option<Self> {
        match emoji {
            "👍" => Some(Self::Upvote),
            "👎" => Some(Self::Downvote),
            "✅" => Some(Self::Approve),
            "❌" => Some(Self::Reject),
            _ => None,
        }
    }

    /// Staff choice expressed by this marker, if it is a poll marker.
    #[must_use]
    pub const fn vote_choice(self) -> Option<VoteChoice> {
        match self {
            Self::Approve => Some(VoteChoice::Yes),
            Self::Reject => Some(VoteChoice::No),
            Self::Upvote | Self::Downvote => None,
        }
    }
}

/// Community reaction counts on a suggestion post, bot seeds excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityTally {
    /// Distinct non-bot 👍 reactions
    pub upvotes: u32,
    /// Distinct non-bot 👎 reactions
    pub downvotes: u32,
}

/// A staff member's vote on a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
    /// In favour of the suggestion
    Yes,
    /// Against the suggestion
    No,
}

impl VoteChoice {
    /// Stable lowercase name used in the archive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

/// Lifecycle stage. Transitions only ever move forward:
/// `Open -> StaffReview -> Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Collecting public upvotes
    Open,
    /// Waiting on the staff poll
    StaffReview,
    /// Terminal; outcome decided
    Resolved,
}

impl Stage {
    /// Whether `self -> next` is a legal single-step transition.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::StaffReview) | (Self::StaffReview, Self::Resolved)
        )
    }

    /// Human-readable label for command replies.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "open for votes",
            Self::StaffReview => "in staff review",
            Self::Resolved => "resolved",
        }
    }
}

/// Final decision of a staff poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// More yes votes than no votes
    Approved,
    /// Ties and majorities against
    Rejected,
}

impl Outcome {
    /// Resolution policy: strictly more yes than no approves, ties reject.
    #[must_use]
    pub const fn from_tally(yes: usize, no: usize) -> Self {
        if yes > no {
            Self::Approved
        } else {
            Self::Rejected
        }
    }

    /// Stable name used in announcements and the archive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

/// One community-submitted idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Id, equal to `message.message_id`
    pub id: SuggestionId,
    /// Public message carrying the suggestion
    pub message: MessageRef,
    /// Submitter
    pub author_id: UserId,
    /// Short title (at most [`MAX_TITLE_LEN`] characters)
    pub title: String,
    /// Description (at most [`MAX_BODY_LEN`] characters)
    pub body: String,
    /// Current lifecycle stage
    pub stage: Stage,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Staff poll message, attached once the poll is posted
    pub staff_poll: Option<MessageRef>,
    /// Decision, set exactly when `stage` is `Resolved`
    pub outcome: Option<Outcome>,
    /// Announcement message, once posted
    pub announcement: Option<MessageRef>,
    /// Progression stopped after a permanent platform failure
    pub halted: bool,
    /// Last community tally read from the public post
    pub community: CommunityTally,
}

/// Trims and validates submission text against the length limits.
pub fn validate_submission(title: &str, body: &str) -> crate::errors::Result<(String, String)> {
    let title = title.trim();
    let body = body.trim();

    if title.is_empty() {
        return Err(crate::errors::Error::InvalidInput {
            message: "title must not be empty".to_string(),
        });
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(crate::errors::Error::InvalidInput {
            message: format!("title must be at most {MAX_TITLE_LEN} characters"),
        });
    }
    if body.chars().count() > MAX_BODY_LEN {
        return Err(crate::errors::Error::InvalidInput {
            message: format!("description must be at most {MAX_BODY_LEN} characters"),
        });
    }

    Ok((title.to_string(), body.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_stage_only_advances_forward() {
        assert!(Stage::Open.can_advance_to(Stage::StaffReview));
        assert!(Stage::StaffReview.can_advance_to(Stage::Resolved));

        assert!(!Stage::Open.can_advance_to(Stage::Resolved));
        assert!(!Stage::StaffReview.can_advance_to(Stage::Open));
        assert!(!Stage::Resolved.can_advance_to(Stage::Open));
        assert!(!Stage::Resolved.can_advance_to(Stage::StaffReview));
        assert!(!Stage::Resolved.can_advance_to(Stage::Resolved));
    }

    #[test]
    fn test_outcome_ties_reject() {
        assert_eq!(Outcome::from_tally(5, 5), Outcome::Rejected);
        assert_eq!(Outcome::from_tally(6, 5), Outcome::Approved);
        assert_eq!(Outcome::from_tally(0, 0), Outcome::Rejected);
        assert_eq!(Outcome::from_tally(1, 0), Outcome::Approved);
    }

    #[test]
    fn test_marker_emoji_mapping() {
        for marker in [
            Marker::Upvote,
            Marker::Downvote,
            Marker::Approve,
            Marker::Reject,
        ] {
            assert_eq!(Marker::from_emoji(marker.emoji()), Some(marker));
        }
        assert_eq!(Marker::from_emoji("🔥"), None);
        assert_eq!(Marker::Upvote.vote_choice(), None);
        assert_eq!(Marker::Downvote.vote_choice(), None);
        assert_eq!(Marker::Approve.vote_choice(), Some(VoteChoice::Yes));
        assert_eq!(Marker::Reject.vote_choice(), Some(VoteChoice::No));
    }

    #[test]
    fn test_validate_submission_limits() {
        let (title, body) = validate_submission("  Add a music channel ", " please ").unwrap();
        assert_eq!(title, "Add a music channel");
        assert_eq!(body, "please");

        assert!(matches!(
            validate_submission("   ", "body"),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            validate_submission(&"t".repeat(MAX_TITLE_LEN + 1), "body"),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            validate_submission("title", &"b".repeat(MAX_BODY_LEN + 1)),
            Err(Error::InvalidInput { .. })
        ));
        // Limits count characters, not bytes
        assert!(validate_submission(&"é".repeat(MAX_TITLE_LEN), "").is_ok());
    }
}
