//! Plain-text bodies for the messages the lifecycle posts.

use crate::core::staff_poll::StaffPoll;
use crate::core::suggestion::{CommunityTally, Marker, Outcome, Suggestion, UserId};
use crate::entities::archived_suggestion;
use chrono::{DateTime, Utc};

/// Public suggestion post.
#[must_use]
pub fn suggestion_post(author: UserId, title: &str, body: &str) -> String {
    format!(
        "💡 **New suggestion** from <@{author}>\n**{title}**\n{body}\n\nReact with {} to support it or {} if you disagree!",
        Marker::Upvote.emoji(),
        Marker::Downvote.emoji()
    )
}

/// Staff poll post. `deadline` is rendered as a relative Discord timestamp.
#[must_use]
pub fn staff_poll(suggestion: &Suggestion, staff_mention: &str, deadline: DateTime<Utc>) -> String {
    format!(
        "{staff_mention} 📝 Staff review, voting closes <t:{}:R>\n**{}**\n{}\n\nSubmitted by <@{}>. React {} to approve or {} to reject.",
        deadline.timestamp(),
        suggestion.title,
        suggestion.body,
        suggestion.author_id,
        Marker::Approve.emoji(),
        Marker::Reject.emoji()
    )
}

/// Final announcement of a resolved suggestion.
#[must_use]
pub fn announcement(
    suggestion: &Suggestion,
    poll: &StaffPoll,
    outcome: Outcome,
    role_mention: Option<&str>,
) -> String {
    let badge = match outcome {
        Outcome::Approved => Marker::Approve.emoji(),
        Outcome::Rejected => Marker::Reject.emoji(),
    };
    let mention = role_mention.map(|m| format!("{m} ")).unwrap_or_default();
    format!(
        "{mention}Suggestion result: **{} {badge}**\n**{}**\n{}\n\nStaff vote: {} yes / {} no. Community vote: {}.\nSubmitted by <@{}> in <#{}> (suggestion {}).",
        outcome.as_str(),
        suggestion.title,
        suggestion.body,
        poll.yes_votes(),
        poll.no_votes(),
        community(suggestion.community.upvotes, suggestion.community.downvotes),
        suggestion.author_id,
        suggestion.message.channel_id.0,
        suggestion.id
    )
}

fn community(upvotes: impl std::fmt::Display, downvotes: impl std::fmt::Display) -> String {
    format!(
        "{upvotes} {} / {downvotes} {}",
        Marker::Upvote.emoji(),
        Marker::Downvote.emoji()
    )
}

/// Private notice to someone who reacted on a staff poll without the role.
#[must_use]
pub const fn not_eligible_notice() -> &'static str {
    "Only staff members can vote on staff polls. Your reaction was not counted."
}

/// Reply for `/mysuggestions`: live suggestions with their stage, then
/// archived decisions. Live entries that are already archived are listed once.
#[must_use]
pub fn my_suggestions(live: &[Suggestion], archived: &[archived_suggestion::Model]) -> String {
    let mut lines = Vec::new();

    for suggestion in live {
        let id = suggestion.id.to_string();
        if archived.iter().any(|row| row.suggestion_id == id) {
            continue;
        }
        let status = match suggestion.outcome {
            Some(outcome) => outcome.as_str(),
            None if suggestion.halted => "on hold",
            None => suggestion.stage.label(),
        };
        let CommunityTally { upvotes, downvotes } = suggestion.community;
        lines.push(format!(
            "• **{}** - {status} ({})",
            suggestion.title,
            community(upvotes, downvotes)
        ));
    }
    for row in archived {
        lines.push(format!(
            "• **{}** - {} ({} yes / {} no, {})",
            row.title,
            row.outcome,
            row.yes_votes,
            row.no_votes,
            community(row.upvotes, row.downvotes)
        ));
    }

    if lines.is_empty() {
        "You have not submitted any suggestions yet.".to_string()
    } else {
        format!("**Your suggestions**\n{}", lines.join("\n"))
    }
}
