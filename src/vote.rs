// src/vote.rs
//! Vote submission. Each step below can end the request; they run in this
//! order so that an anonymous caller never has its body parsed and the
//! payload's item id is checked before the path's poll id.
use tracing::debug;

use crate::{
    error::ApiError,
    ids::{InvalidId, ItemId, PollId},
    models::{NewVote, Vote},
    poll::{json_body, store_failure},
    session::Session,
    store::PollStore,
};

pub async fn submit_vote(
    store: &dyn PollStore,
    session: &Session,
    raw_poll_id: &str,
    body: &[u8],
) -> Result<Vote, ApiError> {
    let voter_id = session.require_user()?;
    let payload = json_body(body)?;

    let item_id = payload
        .get("item_id")
        .map_or(Err(InvalidId), ItemId::from_json)
        .map_err(|_| ApiError::Unprocessable("'item_id' must be a number"))?;
    let poll_id = PollId::parse(raw_poll_id)
        .map_err(|_| ApiError::Unprocessable("'poll_id' must be a number"))?;

    let poll = store.get_poll(poll_id).await.map_err(|err| {
        debug!(%poll_id, %err, "vote for unknown poll");
        ApiError::PollNotFound
    })?;

    let item = store.get_item(item_id).await.map_err(|err| {
        debug!(%item_id, %err, "vote for unknown item");
        ApiError::InvalidItem
    })?;
    if item.poll_id != poll.id {
        debug!(%item_id, %poll_id, owner = %item.poll_id, "item belongs to another poll");
        return Err(ApiError::InvalidItem);
    }

    store
        .replace_vote(NewVote {
            poll_id: poll.id,
            item_id: item.id,
            voter_id,
        })
        .await
        .map_err(store_failure("submit_vote"))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use uuid::Uuid;

    use super::*;
    use crate::{
        ids::UserId,
        models::{NewPoll, Poll, PollItem},
        store::{memory::Table, MemoryStore},
    };

    struct Fixture {
        store: MemoryStore,
        session: Session,
        poll: Poll,
        items: Vec<PollItem>,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let user = UserId::new(Uuid::new_v4());
        let poll = store
            .insert_poll(NewPoll { question: "Lunch?".into(), description: None, created_by: user })
            .await
            .unwrap();
        let items = store
            .insert_items(poll.id, &["Pizza".to_string(), "Salad".to_string()])
            .await
            .unwrap();
        Fixture { store, session: Session::authenticated(user), poll, items }
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[tokio::test]
    async fn anonymous_is_rejected_before_body() {
        let f = fixture().await;
        let err = submit_vote(&f.store, &Session::anonymous(), "abc", b"{{{").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn malformed_body() {
        let f = fixture().await;
        let err = submit_vote(&f.store, &f.session, "1", b"").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidJson));
    }

    #[tokio::test]
    async fn item_id_is_checked_before_poll_id() {
        let f = fixture().await;
        for payload in [json!({}), json!({ "item_id": "abc" }), json!({ "item_id": 1.5 })] {
            let err = submit_vote(&f.store, &f.session, "abc", &body(payload)).await.unwrap_err();
            assert_eq!(err.to_string(), "'item_id' must be a number");
        }

        let err = submit_vote(&f.store, &f.session, "abc", &body(json!({ "item_id": 1 })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "'poll_id' must be a number");
    }

    #[tokio::test]
    async fn unknown_poll() {
        let f = fixture().await;
        let err = submit_vote(&f.store, &f.session, "999", &body(json!({ "item_id": f.items[0].id })))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PollNotFound));
    }

    #[tokio::test]
    async fn unknown_or_foreign_item() {
        let f = fixture().await;
        let other = f
            .store
            .insert_poll(NewPoll {
                question: "Other".into(),
                description: None,
                created_by: UserId::new(Uuid::new_v4()),
            })
            .await
            .unwrap();
        let foreign = f.store.insert_items(other.id, &["X".to_string()]).await.unwrap();
        let poll_id = f.poll.id.to_string();

        for item_id in [json!(9999), json!(foreign[0].id)] {
            let err = submit_vote(&f.store, &f.session, &poll_id, &body(json!({ "item_id": item_id })))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::InvalidItem));
        }
        assert!(f.store.votes().is_empty());
    }

    #[tokio::test]
    async fn string_and_number_ids_are_equivalent() {
        let f = fixture().await;
        let poll_id = f.poll.id.to_string();
        let vote = submit_vote(
            &f.store,
            &f.session,
            &poll_id,
            &body(json!({ "item_id": f.items[0].id.to_string() })),
        )
        .await
        .unwrap();
        assert_eq!(vote.item_id, f.items[0].id);
        assert_eq!(vote.poll_id, f.poll.id);
        assert_eq!(Some(&vote.voter_id), f.session.user());
    }

    #[tokio::test]
    async fn any_integral_number_reaches_the_item_lookup() {
        let f = fixture().await;
        let poll_id = f.poll.id.to_string();

        let as_float = json!({ "item_id": f.items[1].id.get() as f64 });
        let vote = submit_vote(&f.store, &f.session, &poll_id, &body(as_float)).await.unwrap();
        assert_eq!(vote.item_id, f.items[1].id);

        let err = submit_vote(&f.store, &f.session, &poll_id, &body(json!({ "item_id": -4 })))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidItem));
    }

    #[tokio::test]
    async fn revote_replaces_previous_choice() {
        let f = fixture().await;
        let poll_id = f.poll.id.to_string();
        for item in &f.items {
            submit_vote(&f.store, &f.session, &poll_id, &body(json!({ "item_id": item.id })))
                .await
                .unwrap();
        }

        let votes = f.store.votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].item_id, f.items[1].id);
    }

    #[tokio::test]
    async fn insert_failure_passes_store_message() {
        let f = fixture().await;
        f.store.fail_writes(Table::Votes, "new row violates row-level security policy");
        let err = submit_vote(
            &f.store,
            &f.session,
            &f.poll.id.to_string(),
            &body(json!({ "item_id": f.items[0].id })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Store(ref msg) if msg == "new row violates row-level security policy"));
    }
}
