//! Archived suggestion entity - one row per resolved suggestion.
//!
//! Rows are written once, when the resolution publisher closes a suggestion.
//! Discord snowflakes are stored as strings, the same way user ids are.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Archived suggestion database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "archived_suggestions")]
pub struct Model {
    /// Suggestion id (the public message id)
    #[sea_orm(primary_key, auto_increment = false)]
    pub suggestion_id: String,
    /// Channel the suggestion was posted in
    pub channel_id: String,
    /// Discord user ID of the submitter
    pub author_id: String,
    /// Suggestion title
    pub title: String,
    /// Suggestion description
    pub body: String,
    /// `"Approved"` or `"Rejected"`
    pub outcome: String,
    /// Final yes count from the staff poll
    pub yes_votes: i32,
    /// Final no count from the staff poll
    pub no_votes: i32,
    /// Size of the staff snapshot taken when the poll opened
    pub eligible_staff: i32,
    /// Community 👍 count at resolution, bot excluded
    pub upvotes: i32,
    /// Community 👎 count at resolution, bot excluded
    pub downvotes: i32,
    /// Staff poll message id
    pub staff_message_id: String,
    /// Announcement message id, if the announcement was posted
    pub announcement_message_id: Option<String>,
    /// When the suggestion was submitted
    pub created_at: DateTimeUtc,
    /// Deadline the staff poll had
    pub staff_deadline: DateTimeUtc,
    /// When it was resolved
    pub resolved_at: DateTimeUtc,
}

/// Defines relationships between archived suggestions and staff votes
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One archived suggestion has many staff votes
    #[sea_orm(has_many = "super::staff_vote::Entity")]
    StaffVotes,
}

impl Related<super::staff_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StaffVotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
