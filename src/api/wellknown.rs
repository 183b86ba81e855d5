//! Well-known endpoints
//!
//! - /.well-known/webfinger
//! - /.well-known/nodeinfo
//! - /.well-known/host-meta

use axum::{
    Router,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json},
    routing::get,
};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;
use crate::federation::WebFingerResponse;

const NODEINFO_SCHEMA: &str = "http://nodeinfo.diaspora.software/ns/schema/2.1";

/// Routes:
/// - GET /.well-known/webfinger
/// - GET /.well-known/nodeinfo
/// - GET /.well-known/host-meta
/// - GET /nodeinfo/2.1
pub fn wellknown_router() -> Router<AppState> {
    Router::new()
        .route("/.well-known/webfinger", get(webfinger))
        .route("/.well-known/nodeinfo", get(nodeinfo_links))
        .route("/.well-known/host-meta", get(host_meta))
        .route("/nodeinfo/2.1", get(nodeinfo))
}

#[derive(Debug, Deserialize)]
struct WebFingerQuery {
    resource: String,
}

/// GET /.well-known/webfinger?resource=acct:user@domain
async fn webfinger(
    State(state): State<AppState>,
    Query(query): Query<WebFingerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let jrd: WebFingerResponse = state.processor.webfinger(&query.resource).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/jrd+json")],
        Json(jrd),
    ))
}

/// GET /.well-known/nodeinfo
async fn nodeinfo_links(State(state): State<AppState>) -> Json<serde_json::Value> {
    let base_url = state.processor.urls().prefix();
    Json(serde_json::json!({
        "links": [
            {
                "rel": NODEINFO_SCHEMA,
                "href": format!("{}/nodeinfo/2.1", base_url)
            }
        ]
    }))
}

/// GET /nodeinfo/2.1
async fn nodeinfo(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let users = state.db.count_accounts().await?;

    Ok(Json(serde_json::json!({
        "version": "2.1",
        "software": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "protocols": ["activitypub"],
        "services": {
            "inbound": [],
            "outbound": []
        },
        "openRegistrations": true,
        "usage": {
            "users": {
                "total": users
            }
        },
        "metadata": {}
    })))
}

/// GET /.well-known/host-meta
async fn host_meta(State(state): State<AppState>) -> impl IntoResponse {
    let base_url = state.processor.urls().prefix();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<XRD xmlns="http://docs.oasis-open.org/ns/xri/xrd-1.0">
  <Link rel="lrdd" template="{}/.well-known/webfinger?resource={{uri}}"/>
</XRD>"#,
        base_url
    );

    ([(header::CONTENT_TYPE, "application/xrd+xml")], xml)
}
