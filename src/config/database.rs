//! Database configuration module for the resolution archive.
//!
//! This module handles `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs without hand-written SQL.

use crate::entities::{ArchivedSuggestion, StaffVote};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/suggestion_buddy.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, or the
/// default local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Connects to the archive database at [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .and_then(|rest| rest.split('?').next())
        .and_then(|file| std::path::Path::new(file).parent())
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        std::fs::create_dir_all(path)?;
    }

    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates the archive tables if they do not exist yet.
///
/// `archived_suggestions` is created before `staff_votes` because of the
/// foreign key between them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut suggestions_table = schema.create_table_from_entity(ArchivedSuggestion);
    let mut votes_table = schema.create_table_from_entity(StaffVote);

    suggestions_table.if_not_exists();
    votes_table.if_not_exists();

    db.execute(builder.build(&suggestions_table)).await?;
    db.execute(builder.build(&votes_table)).await?;

    Ok(())
}
