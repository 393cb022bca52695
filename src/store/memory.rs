//! In-process tables for local runs and tests.
//!
//! Mirrors the Postgres schema: items and votes reference their poll and
//! are removed with it, and a vote's item must exist. Nothing is persisted.
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;

use super::{Backend, PollStore, StoreError};
use crate::{
    ids::{ItemId, PollId, VoteId},
    models::{ItemTally, NewPoll, NewVote, Poll, PollChanges, PollItem, Vote},
    session::Session,
};

const NO_ROWS: &str = "JSON object requested, multiple (or no) rows returned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Polls,
    PollItems,
    Votes,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Polls => "polls",
            Table::PollItems => "poll_items",
            Table::Votes => "votes",
        }
    }
}

#[derive(Default)]
struct Tables {
    polls: BTreeMap<PollId, Poll>,
    items: BTreeMap<ItemId, PollItem>,
    votes: BTreeMap<VoteId, Vote>,
    next_id: i64,
    failing: HashMap<Table, String>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_write(&self, table: Table) -> Result<(), StoreError> {
        match self.failing.get(&table) {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }

    fn foreign_key(&self, table: Table, column: &str) -> StoreError {
        StoreError::Backend(format!(
            "insert or update on table \"{}\" violates foreign key constraint \"{}_{}_fkey\"",
            table.name(),
            table.name(),
            column
        ))
    }
}

/// Shared in-memory store. Clones see the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write to `table` fail with `message`.
    pub fn fail_writes(&self, table: Table, message: impl Into<String>) {
        self.lock().failing.insert(table, message.into());
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Snapshot of all vote rows, in insertion order.
    pub fn votes(&self) -> Vec<Vote> {
        self.lock().votes.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Mutations are single map operations; a poisoned lock still guards
        // consistent tables.
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let tables = self.lock();
        let mut polls: Vec<Poll> = tables.polls.values().cloned().collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(polls)
    }

    async fn get_poll(&self, id: PollId) -> Result<Poll, StoreError> {
        self.lock()
            .polls
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(NO_ROWS.to_string()))
    }

    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        let mut tables = self.lock();
        tables.check_write(Table::Polls)?;
        let row = Poll {
            id: PollId::new(tables.next_id()),
            question: poll.question,
            description: poll.description,
            created_by: poll.created_by,
            created_at: Utc::now(),
        };
        tables.polls.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_poll(&self, id: PollId, changes: PollChanges) -> Result<Poll, StoreError> {
        let mut tables = self.lock();
        tables.check_write(Table::Polls)?;
        let row = tables
            .polls
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(NO_ROWS.to_string()))?;
        if let Some(question) = changes.question {
            row.question = question;
        }
        if let Some(description) = changes.description {
            row.description = description;
        }
        Ok(row.clone())
    }

    async fn delete_poll(&self, id: PollId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        tables.check_write(Table::Polls)?;
        if tables.polls.remove(&id).is_some() {
            tables.items.retain(|_, item| item.poll_id != id);
            tables.votes.retain(|_, vote| vote.poll_id != id);
        }
        Ok(())
    }

    async fn list_items(&self, poll_id: PollId) -> Result<Vec<PollItem>, StoreError> {
        let tables = self.lock();
        let mut items: Vec<PollItem> = tables
            .items
            .values()
            .filter(|item| item.poll_id == poll_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn get_item(&self, id: ItemId) -> Result<PollItem, StoreError> {
        self.lock()
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(NO_ROWS.to_string()))
    }

    async fn insert_items(
        &self,
        poll_id: PollId,
        labels: &[String],
    ) -> Result<Vec<PollItem>, StoreError> {
        let mut tables = self.lock();
        tables.check_write(Table::PollItems)?;
        if !tables.polls.contains_key(&poll_id) {
            return Err(tables.foreign_key(Table::PollItems, "poll_id"));
        }
        let created_at = Utc::now();
        let mut rows = Vec::with_capacity(labels.len());
        for label in labels {
            let row = PollItem {
                id: ItemId::new(tables.next_id()),
                poll_id,
                label: label.clone(),
                created_at,
            };
            tables.items.insert(row.id, row.clone());
            rows.push(row);
        }
        Ok(rows)
    }

    async fn replace_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        let mut tables = self.lock();
        tables.check_write(Table::Votes)?;
        if !tables.polls.contains_key(&vote.poll_id) {
            return Err(tables.foreign_key(Table::Votes, "poll_id"));
        }
        if !tables.items.contains_key(&vote.item_id) {
            return Err(tables.foreign_key(Table::Votes, "item_id"));
        }
        tables
            .votes
            .retain(|_, v| !(v.poll_id == vote.poll_id && v.voter_id == vote.voter_id));
        let row = Vote {
            id: VoteId::new(tables.next_id()),
            poll_id: vote.poll_id,
            item_id: vote.item_id,
            voter_id: vote.voter_id,
        };
        tables.votes.insert(row.id, row.clone());
        Ok(row)
    }

    async fn tally(&self, poll_id: PollId) -> Result<Vec<ItemTally>, StoreError> {
        let items = self.list_items(poll_id).await?;
        let tables = self.lock();
        Ok(items
            .into_iter()
            .map(|item| ItemTally {
                votes: tables.votes.values().filter(|v| v.item_id == item.id).count() as i64,
                item_id: item.id,
                label: item.label,
            })
            .collect())
    }
}

/// Every request shares the same [`MemoryStore`]; sessions are not checked
/// against any row policy.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    store: MemoryStore,
}

impl MemoryBackend {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

impl Backend for MemoryBackend {
    fn scoped(&self, _session: &Session) -> Box<dyn PollStore> {
        Box::new(self.store.clone())
    }
}
