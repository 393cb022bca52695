// src/poll.rs
//! Poll lifecycle: create, read, update and delete polls and their options.
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::{
    error::ApiError,
    ids::PollId,
    models::{ItemTally, NewPoll, Poll, PollChanges, PollItem},
    session::Session,
    store::{PollStore, StoreError},
};

#[derive(Debug, Serialize)]
pub struct CreatedPoll {
    pub poll: Poll,
    pub items: Vec<PollItem>,
}

#[derive(Debug, Serialize)]
pub struct PollResults {
    pub poll_id: PollId,
    pub total: i64,
    pub results: Vec<ItemTally>,
}

#[derive(Debug, Serialize)]
pub struct ShareLink {
    pub url: String,
    pub title: &'static str,
    pub text: &'static str,
}

/// Any JSON document is accepted here; field checks happen per operation.
pub(crate) fn json_body(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)
}

pub(crate) fn store_failure(op: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    move |err| {
        error!(op, %err, "store call failed");
        ApiError::from(err)
    }
}

fn poll_id(raw: &str) -> Result<PollId, ApiError> {
    PollId::parse(raw).map_err(|_| ApiError::InvalidPollId)
}

fn trimmed_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).map(str::trim)
}

/// `description` may be omitted, null or a string.
fn description(payload: &Value) -> Result<Option<Option<String>>, ApiError> {
    match payload.get("description") {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(text)) => Ok(Some(Some(text.clone()))),
        Some(_) => Err(ApiError::Unprocessable(
            "'description' must be a string or null",
        )),
    }
}

/// Non-string and blank entries are dropped, the rest trimmed.
fn option_labels(payload: &Value) -> Vec<String> {
    payload
        .get("options")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub async fn list_polls(store: &dyn PollStore) -> Result<Vec<Poll>, ApiError> {
    store.list_polls().await.map_err(store_failure("list_polls"))
}

/// Every lookup failure, including a missing row, is reported as 404.
pub async fn get_poll(store: &dyn PollStore, raw_id: &str) -> Result<Poll, ApiError> {
    let id = poll_id(raw_id)?;
    store
        .get_poll(id)
        .await
        .map_err(|err| ApiError::NotFound(err.to_string()))
}

/// The poll row is not rolled back if its items fail to insert; the caller
/// gets a 500 and the poll stays without options.
pub async fn create_poll(
    store: &dyn PollStore,
    session: &Session,
    body: &[u8],
) -> Result<CreatedPoll, ApiError> {
    let created_by = session.require_user()?;
    let payload = json_body(body)?;

    let question = trimmed_str(&payload, "question").unwrap_or_default();
    if question.is_empty() {
        return Err(ApiError::Unprocessable("'question' is required"));
    }
    let description = description(&payload)?.flatten();

    let poll = store
        .insert_poll(NewPoll {
            question: question.to_string(),
            description,
            created_by,
        })
        .await
        .map_err(store_failure("create_poll"))?;

    let labels = option_labels(&payload);
    let items = if labels.is_empty() {
        Vec::new()
    } else {
        store.insert_items(poll.id, &labels).await.map_err(|err| {
            warn!(poll_id = %poll.id, "poll persisted without its options");
            store_failure("create_poll_items")(err)
        })?
    };

    Ok(CreatedPoll { poll, items })
}

pub async fn update_poll(
    store: &dyn PollStore,
    raw_id: &str,
    body: &[u8],
) -> Result<Poll, ApiError> {
    let id = poll_id(raw_id)?;
    let payload = json_body(body)?;

    let changes = PollChanges {
        question: trimmed_str(&payload, "question").map(str::to_string),
        description: description(&payload)?,
    };

    store
        .update_poll(id, changes)
        .await
        .map_err(store_failure("update_poll"))
}

pub async fn delete_poll(store: &dyn PollStore, raw_id: &str) -> Result<(), ApiError> {
    let id = poll_id(raw_id)?;
    store.delete_poll(id).await.map_err(store_failure("delete_poll"))
}

pub async fn list_items(store: &dyn PollStore, raw_id: &str) -> Result<Vec<PollItem>, ApiError> {
    let id = poll_id(raw_id)?;
    store.list_items(id).await.map_err(store_failure("list_items"))
}

pub async fn create_item(
    store: &dyn PollStore,
    raw_id: &str,
    body: &[u8],
) -> Result<PollItem, ApiError> {
    let id = poll_id(raw_id)?;
    let payload = json_body(body)?;

    let label = trimmed_str(&payload, "label").unwrap_or_default();
    if label.is_empty() {
        return Err(ApiError::Unprocessable("'label' is required"));
    }

    store
        .insert_items(id, &[label.to_string()])
        .await
        .map_err(store_failure("create_item"))?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Store("insert returned no row".to_string()))
}

pub async fn results(store: &dyn PollStore, raw_id: &str) -> Result<PollResults, ApiError> {
    let id = poll_id(raw_id)?;
    let results = store.tally(id).await.map_err(store_failure("results"))?;
    Ok(PollResults {
        poll_id: id,
        total: results.iter().map(|tally| tally.votes).sum(),
        results,
    })
}

pub fn share_link(site_url: &str, raw_id: &str) -> Result<ShareLink, ApiError> {
    let id = poll_id(raw_id)?;
    Ok(ShareLink {
        url: format!("{site_url}/polls/{id}"),
        title: "Vote on this poll",
        text: "Join the poll:",
    })
}
