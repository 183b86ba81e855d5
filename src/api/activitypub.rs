//! ActivityPub endpoints
//!
//! - Actor and main-key documents
//! - Inbox and outbox (activity receiving)
//! - Followers/Following collections

use axum::body::Bytes;
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::AppState;
use crate::error::AppError;
use crate::federation::{ACTIVITY_JSON, OrderedCollection};

/// Routes:
/// - GET /u/:account_id - Actor document
/// - GET /u/:account_id/main-key - Public key document
/// - POST /u/:account_id/inbox - Activities from remote servers
/// - POST /u/:account_id/outbox - Activities from the account itself
/// - GET /u/:account_id/followers - Followers collection
/// - GET /u/:account_id/following - Following collection
pub fn activitypub_router() -> Router<AppState> {
    Router::new()
        .route("/u/:account_id", get(actor))
        .route("/u/:account_id/main-key", get(main_key))
        .route("/u/:account_id/inbox", post(inbox))
        .route("/u/:account_id/outbox", post(outbox))
        .route("/u/:account_id/followers", get(followers))
        .route("/u/:account_id/following", get(following))
}

/// JSON body served as `application/activity+json`.
fn activity_json<T: Serialize>(document: T) -> Response {
    ([(header::CONTENT_TYPE, ACTIVITY_JSON)], Json(document)).into_response()
}

/// GET /u/:account_id
async fn actor(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Response, AppError> {
    let document = state.processor.local_actor_document(&account_id).await?;
    Ok(activity_json(document))
}

/// GET /u/:account_id/main-key
async fn main_key(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Response, AppError> {
    let document = state.processor.main_key_document(&account_id).await?;
    Ok(activity_json(document))
}

/// POST /u/:account_id/inbox
///
/// Signatures on inbound requests are not checked.
async fn inbox(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    state.processor.receive_inbox(&account_id, &body).await?;
    Ok(StatusCode::OK)
}

/// POST /u/:account_id/outbox
async fn outbox(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    state.processor.receive_outbox(&account_id, &body).await?;
    Ok(StatusCode::OK)
}

/// GET /u/:account_id/followers
async fn followers(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Response, AppError> {
    let items = state.processor.list_followers(&account_id).await?;
    let id = state.processor.urls().followers_url(&account_id);
    Ok(activity_json(OrderedCollection::new(id, items)))
}

/// GET /u/:account_id/following
async fn following(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Response, AppError> {
    let items = state.processor.list_follows(&account_id).await?;
    let id = state.processor.urls().following_url(&account_id);
    Ok(activity_json(OrderedCollection::new(id, items)))
}
