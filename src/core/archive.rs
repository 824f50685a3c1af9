//! Resolution archive - persists resolved suggestions, their community tally,
//! and their staff votes.
//!
//! The live registry is in-memory and forgets everything on restart; the
//! archive keeps the record of what was decided so `/mysuggestions` can still
//! show past outcomes. Writes happen once per resolution inside a database
//! transaction.

use crate::{
    core::{staff_poll::StaffPoll, suggestion::Suggestion},
    entities::{ArchivedSuggestion, StaffVote, archived_suggestion, staff_vote},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};

/// Writes a resolved suggestion and every counted staff vote.
///
/// Fails with `InvalidInput` if the suggestion has no outcome yet.
pub async fn archive_resolution(
    db: &DatabaseConnection,
    suggestion: &Suggestion,
    poll: &StaffPoll,
    resolved_at: DateTime<Utc>,
) -> Result<archived_suggestion::Model> {
    let outcome = suggestion.outcome.ok_or_else(|| Error::InvalidInput {
        message: format!("suggestion {} is not resolved", suggestion.id),
    })?;

    let txn = db.begin().await?;

    let row = archived_suggestion::ActiveModel {
        suggestion_id: Set(suggestion.id.to_string()),
        channel_id: Set(suggestion.message.channel_id.0.to_string()),
        author_id: Set(suggestion.author_id.to_string()),
        title: Set(suggestion.title.clone()),
        body: Set(suggestion.body.clone()),
        outcome: Set(outcome.as_str().to_string()),
        yes_votes: Set(count_to_i32(poll.yes_votes())),
        no_votes: Set(count_to_i32(poll.no_votes())),
        eligible_staff: Set(count_to_i32(poll.eligible.len())),
        upvotes: Set(i32::try_from(suggestion.community.upvotes).unwrap_or(i32::MAX)),
        downvotes: Set(i32::try_from(suggestion.community.downvotes).unwrap_or(i32::MAX)),
        staff_message_id: Set(poll.message.message_id.to_string()),
        announcement_message_id: Set(suggestion
            .announcement
            .map(|m| m.message_id.to_string())),
        created_at: Set(suggestion.created_at),
        staff_deadline: Set(poll.deadline),
        resolved_at: Set(resolved_at),
    }
    .insert(&txn)
    .await?;

    // Sorted so archived vote order is stable
    let mut votes: Vec<_> = poll.votes.iter().collect();
    votes.sort_by_key(|(user, _)| **user);
    for (user, choice) in votes {
        staff_vote::ActiveModel {
            suggestion_id: Set(row.suggestion_id.clone()),
            user_id: Set(user.to_string()),
            vote: Set(choice.as_str().to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    Ok(row)
}

/// Looks up a single archived suggestion.
pub async fn get_archived_by_id(
    db: &DatabaseConnection,
    suggestion_id: &str,
) -> Result<Option<archived_suggestion::Model>> {
    ArchivedSuggestion::find_by_id(suggestion_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Every archived suggestion by `author_id`, most recently resolved first.
pub async fn get_archived_by_author(
    db: &DatabaseConnection,
    author_id: &str,
) -> Result<Vec<archived_suggestion::Model>> {
    ArchivedSuggestion::find()
        .filter(archived_suggestion::Column::AuthorId.eq(author_id))
        .order_by_desc(archived_suggestion::Column::ResolvedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Staff votes recorded for an archived suggestion.
pub async fn get_staff_votes(
    db: &DatabaseConnection,
    suggestion_id: &str,
) -> Result<Vec<staff_vote::Model>> {
    StaffVote::find()
        .filter(staff_vote::Column::SuggestionId.eq(suggestion_id))
        .order_by_asc(staff_vote::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

fn count_to_i32(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
