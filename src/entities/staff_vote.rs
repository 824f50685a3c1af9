//! Staff vote entity - one row per counted staff vote of an archived poll.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Staff vote database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "staff_votes")]
pub struct Model {
    /// Unique identifier for the vote row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Archived suggestion this vote belongs to
    pub suggestion_id: String,
    /// Discord user ID of the staff member
    pub user_id: String,
    /// `"yes"` or `"no"`
    pub vote: String,
}

/// Defines relationships between staff votes and archived suggestions
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each vote belongs to one archived suggestion
    #[sea_orm(
        belongs_to = "super::archived_suggestion::Entity",
        from = "Column::SuggestionId",
        to = "super::archived_suggestion::Column::SuggestionId"
    )]
    ArchivedSuggestion,
}

impl Related<super::archived_suggestion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ArchivedSuggestion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
