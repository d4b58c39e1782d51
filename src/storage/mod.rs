//! SQLite persistence for users, feeds, follows and posts.
//!
//! [`Database`] wraps a `sqlx` pool; per-entity operations live in their own
//! files as `impl Database` blocks. Uniqueness violations surface as
//! [`DatabaseError::Conflict`] so callers can tell "already exists" apart from
//! real failures.

mod feeds;
mod follows;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{DatabaseError, Feed, FeedFollow, FeedListing, NewPost, Post, User};
