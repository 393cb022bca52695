//! Persistence for polls, their items and votes.
//!
//! Handlers never hold a long-lived store. For each request they ask the
//! [`Backend`] for a handle scoped to the resolved [`Session`]; the handle is
//! dropped with the request.
use async_trait::async_trait;
use thiserror::Error;

use crate::{
    ids::{ItemId, PollId},
    models::{ItemTally, NewPoll, NewVote, Poll, PollChanges, PollItem, Vote},
    session::Session,
};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryBackend, MemoryStore};
pub use postgres::{PgBackend, PgStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A single-row read or write matched nothing.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Backend(String),
}

/// Table-level operations over `polls`, `poll_items` and `votes`.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// All polls, newest first.
    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError>;

    async fn get_poll(&self, id: PollId) -> Result<Poll, StoreError>;

    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, StoreError>;

    /// Applies only the present fields. An empty change set is a no-op that
    /// still reads back the row.
    async fn update_poll(&self, id: PollId, changes: PollChanges) -> Result<Poll, StoreError>;

    /// Not existence-checked: deleting a missing poll succeeds.
    async fn delete_poll(&self, id: PollId) -> Result<(), StoreError>;

    /// Items of a poll, oldest first.
    async fn list_items(&self, poll_id: PollId) -> Result<Vec<PollItem>, StoreError>;

    async fn get_item(&self, id: ItemId) -> Result<PollItem, StoreError>;

    /// Inserts all labels as items of `poll_id` in one statement, in order.
    async fn insert_items(
        &self,
        poll_id: PollId,
        labels: &[String],
    ) -> Result<Vec<PollItem>, StoreError>;

    /// Removes any vote `voter_id` holds on `poll_id`, then records the new
    /// one. At most one vote per (poll, voter) survives.
    async fn replace_vote(&self, vote: NewVote) -> Result<Vote, StoreError>;

    /// Per-item vote counts, ordered like [`PollStore::list_items`].
    async fn tally(&self, poll_id: PollId) -> Result<Vec<ItemTally>, StoreError>;
}

/// Request-scope factory. The returned handle runs every statement as the
/// identity in `session`.
pub trait Backend: Send + Sync {
    fn scoped(&self, session: &Session) -> Box<dyn PollStore>;
}
