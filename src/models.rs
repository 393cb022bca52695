// models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, PollId, UserId, VoteId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub description: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollItem {
    pub id: ItemId,
    pub poll_id: PollId,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: VoteId,
    pub poll_id: PollId,
    pub item_id: ItemId,
    pub voter_id: UserId,
}

/// Vote count for one option of a poll.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ItemTally {
    pub item_id: ItemId,
    pub label: String,
    pub votes: i64,
}

#[derive(Debug, Clone)]
pub struct NewPoll {
    pub question: String,
    pub description: Option<String>,
    pub created_by: UserId,
}

/// Partial update for a poll. `None` leaves the column untouched;
/// `description: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollChanges {
    pub question: Option<String>,
    pub description: Option<Option<String>>,
}

impl PollChanges {
    pub fn is_empty(&self) -> bool {
        self.question.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewVote {
    pub poll_id: PollId,
    pub item_id: ItemId,
    pub voter_id: UserId,
}
