//! Database layer: local draft store and outbox queue

mod connection;
mod draft_store;
mod migrations;
mod outbox;

pub use connection::Database;
pub use draft_store::{DraftStore, LibSqlDraftStore};
pub use outbox::{LibSqlOutbox, OutboxQueue};
