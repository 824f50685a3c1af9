//! Entity module - SeaORM entity definitions for the resolution archive.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod archived_suggestion;
pub mod staff_vote;

pub use archived_suggestion::Entity as ArchivedSuggestion;
pub use staff_vote::Entity as StaffVote;
