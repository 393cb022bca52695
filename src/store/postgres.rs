// src/store/postgres.rs
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::{Backend, PollStore, StoreError};
use crate::{
    ids::{ItemId, PollId},
    models::{ItemTally, NewPoll, NewVote, Poll, PollChanges, PollItem, Vote},
    session::Session,
};

const POLL_COLUMNS: &str = "id, question, description, created_by, created_at";
const ITEM_COLUMNS: &str = "id, poll_id, label, created_at";
const VOTE_COLUMNS: &str = "id, poll_id, item_id, voter_id";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            sqlx::Error::Database(db) => StoreError::Backend(db.message().to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    switch_role: bool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            switch_role: false,
        }
    }

    /// When set, every transaction runs `SET LOCAL ROLE` to the session's
    /// role (`authenticated` or `anon`). Both roles must exist on the server.
    pub fn switch_role(mut self, switch_role: bool) -> Self {
        self.switch_role = switch_role;
        self
    }
}

impl Backend for PgBackend {
    fn scoped(&self, session: &Session) -> Box<dyn PollStore> {
        let scope = Scope::for_session(session, self.switch_role);
        Box::new(PgStore::new(self.pool.clone(), scope))
    }
}

/// Who a transaction runs as.
#[derive(Debug, Clone, PartialEq)]
struct Scope {
    claims: Value,
    role: Option<&'static str>,
}

impl Scope {
    fn for_session(session: &Session, switch_role: bool) -> Self {
        let (role, claims) = match session.user() {
            Some(user) => ("authenticated", json!({ "sub": user, "role": "authenticated" })),
            None => ("anon", json!({ "role": "anon" })),
        };
        Self {
            claims,
            role: switch_role.then_some(role),
        }
    }
}

/// Store handle bound to one caller. Each operation runs in its own
/// transaction with `request.jwt.claims` set for that caller. Row policies
/// read those claims; a pool logged in as the table owner bypasses them
/// unless the backend also switches role.
pub struct PgStore {
    pool: PgPool,
    scope: Scope,
}

impl PgStore {
    fn new(pool: PgPool, scope: Scope) -> Self {
        Self { pool, scope }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('request.jwt.claims', $1, true)")
            .bind(self.scope.claims.to_string())
            .execute(&mut *tx)
            .await?;
        if let Some(role) = self.scope.role {
            // Role names are fixed identifiers and cannot be bound.
            sqlx::query(&format!("SET LOCAL ROLE {role}"))
                .execute(&mut *tx)
                .await?;
        }
        Ok(tx)
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn list_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let mut tx = self.begin().await?;
        let polls = sqlx::query_as::<_, Poll>(&format!(
            "SELECT {POLL_COLUMNS} FROM polls ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(polls)
    }

    async fn get_poll(&self, id: PollId) -> Result<Poll, StoreError> {
        let mut tx = self.begin().await?;
        let poll = sqlx::query_as::<_, Poll>(&format!(
            "SELECT {POLL_COLUMNS} FROM polls WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(poll)
    }

    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        let mut tx = self.begin().await?;
        let row = sqlx::query_as::<_, Poll>(&format!(
            "INSERT INTO polls (question, description, created_by) VALUES ($1, $2, $3) \
             RETURNING {POLL_COLUMNS}"
        ))
        .bind(poll.question)
        .bind(poll.description)
        .bind(poll.created_by)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_poll(&self, id: PollId, changes: PollChanges) -> Result<Poll, StoreError> {
        let mut tx = self.begin().await?;

        let poll = if changes.is_empty() {
            sqlx::query_as::<_, Poll>(&format!(
                "SELECT {POLL_COLUMNS} FROM polls WHERE id = $1"
            ))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            let mut query = QueryBuilder::<Postgres>::new("UPDATE polls SET ");
            {
                let mut set = query.separated(", ");
                if let Some(question) = changes.question {
                    set.push("question = ").push_bind_unseparated(question);
                }
                if let Some(description) = changes.description {
                    set.push("description = ").push_bind_unseparated(description);
                }
            }
            query
                .push(" WHERE id = ")
                .push_bind(id)
                .push(format!(" RETURNING {POLL_COLUMNS}"));
            query.build_query_as::<Poll>().fetch_one(&mut *tx).await?
        };

        tx.commit().await?;
        Ok(poll)
    }

    async fn delete_poll(&self, id: PollId) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_items(&self, poll_id: PollId) -> Result<Vec<PollItem>, StoreError> {
        let mut tx = self.begin().await?;
        let items = sqlx::query_as::<_, PollItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM poll_items WHERE poll_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(poll_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(items)
    }

    async fn get_item(&self, id: ItemId) -> Result<PollItem, StoreError> {
        let mut tx = self.begin().await?;
        let item = sqlx::query_as::<_, PollItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM poll_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn insert_items(
        &self,
        poll_id: PollId,
        labels: &[String],
    ) -> Result<Vec<PollItem>, StoreError> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.begin().await?;
        let mut query = QueryBuilder::<Postgres>::new("INSERT INTO poll_items (poll_id, label) ");
        query.push_values(labels, |mut row, label| {
            row.push_bind(poll_id).push_bind(label.as_str());
        });
        query.push(format!(" RETURNING {ITEM_COLUMNS}"));
        let mut items = query.build_query_as::<PollItem>().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        // identity values follow VALUES order; RETURNING order does not have to
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn replace_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        let mut tx = self.begin().await?;

        // Any failed statement aborts the transaction, so a failed delete is
        // reported here rather than after an insert that could not run.
        sqlx::query("DELETE FROM votes WHERE poll_id = $1 AND voter_id = $2")
            .bind(vote.poll_id)
            .bind(vote.voter_id)
            .execute(&mut *tx)
            .await?;

        // A concurrent replace for the same voter lands on the unique key
        // instead of leaving two rows.
        let row = sqlx::query_as::<_, Vote>(&format!(
            "INSERT INTO votes (poll_id, item_id, voter_id) VALUES ($1, $2, $3) \
             ON CONFLICT (poll_id, voter_id) DO UPDATE SET item_id = EXCLUDED.item_id \
             RETURNING {VOTE_COLUMNS}"
        ))
        .bind(vote.poll_id)
        .bind(vote.item_id)
        .bind(vote.voter_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn tally(&self, poll_id: PollId) -> Result<Vec<ItemTally>, StoreError> {
        let mut tx = self.begin().await?;
        let tally = sqlx::query_as::<_, ItemTally>(
            r#"
            SELECT i.id AS item_id, i.label, COUNT(v.id) AS votes
            FROM poll_items i
            LEFT JOIN votes v ON v.item_id = i.id
            WHERE i.poll_id = $1
            GROUP BY i.id, i.label, i.created_at
            ORDER BY i.created_at ASC, i.id ASC
            "#,
        )
        .bind(poll_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(tally)
    }
}
