// handlers.rs
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{error::ApiError, poll, session::Session, vote, AppState};

type JsonResult = Result<Json<Value>, ApiError>;
type CreatedResult = Result<(StatusCode, Json<Value>), ApiError>;

/// List all polls, newest first
pub async fn list_polls(State(state): State<AppState>) -> JsonResult {
    let store = state.backend.scoped(&Session::anonymous());
    let polls = poll::list_polls(store.as_ref()).await?;
    Ok(Json(json!({ "polls": polls })))
}

/// Create a poll, optionally with its options
pub async fn create_poll(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> CreatedResult {
    let store = state.backend.scoped(&session);
    let created = poll::create_poll(store.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(json!(created))))
}

pub async fn get_poll(State(state): State<AppState>, Path(id): Path<String>) -> JsonResult {
    let store = state.backend.scoped(&Session::anonymous());
    let poll = poll::get_poll(store.as_ref(), &id).await?;
    Ok(Json(json!({ "poll": poll })))
}

pub async fn update_poll(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    body: Bytes,
) -> JsonResult {
    let store = state.backend.scoped(&session);
    let poll = poll::update_poll(store.as_ref(), &id, &body).await?;
    Ok(Json(json!({ "poll": poll })))
}

/// Always `{success: true}` once the delete statement ran, whether or not a
/// row matched
pub async fn delete_poll(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> JsonResult {
    let store = state.backend.scoped(&session);
    poll::delete_poll(store.as_ref(), &id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn list_items(State(state): State<AppState>, Path(id): Path<String>) -> JsonResult {
    let store = state.backend.scoped(&Session::anonymous());
    let items = poll::list_items(store.as_ref(), &id).await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn create_item(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    body: Bytes,
) -> CreatedResult {
    let store = state.backend.scoped(&session);
    let item = poll::create_item(store.as_ref(), &id, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "item": item }))))
}

/// Vote for an item, replacing the caller's previous vote on the poll
pub async fn cast_vote(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    body: Bytes,
) -> CreatedResult {
    let store = state.backend.scoped(&session);
    let vote = vote::submit_vote(store.as_ref(), &session, &id, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "vote": vote }))))
}

/// Vote counts per item
pub async fn results(State(state): State<AppState>, Path(id): Path<String>) -> JsonResult {
    let store = state.backend.scoped(&Session::anonymous());
    let results = poll::results(store.as_ref(), &id).await?;
    Ok(Json(json!(results)))
}

pub async fn share(State(state): State<AppState>, Path(id): Path<String>) -> JsonResult {
    let link = poll::share_link(&state.site_url, &id)?;
    Ok(Json(json!(link)))
}
