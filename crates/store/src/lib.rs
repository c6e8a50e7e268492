//! SQLite metadata store for a tome library.
//!
//! Holds books, their files, authors and tags, plus a full-text search
//! document per book. Every read and write goes through a [`Transaction`]
//! obtained from [`Database::begin`]; dropping a transaction without
//! committing it rolls everything back.
//!
//! # Consistency
//! - Files cascade from books; author and tag links cascade from both sides.
//! - Authors and tags are *not* cascaded away when their last link goes.
//!   Callers remove them explicitly ([`Transaction::cleanup_tags`],
//!   [`Transaction::delete_sole_authors`], [`Transaction::delete_orphaned_authors`])
//!   in the order the operation requires.
//! - The search index is maintained by the methods in [`search`]: appends are
//!   exact, removals always rebuild the whole document.

mod db;
pub mod error;
mod models;
pub mod search;
mod tx;

pub use crate::db::Database;
pub use crate::tx::Transaction;
