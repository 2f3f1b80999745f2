//! Ticket endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use super::body;
use crate::db::Ticket;
use crate::error::ApiError;
use crate::gateway::CurrentIdentity;
use crate::http::AppState;

pub const PRIORITY_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

#[derive(Debug, Deserialize)]
pub struct UpdateTicket {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriority {
    pub priority: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewArticle {
    pub body: String,
    #[serde(default)]
    pub internal: bool,
}

#[derive(Debug, Serialize)]
pub struct ArticleCreated {
    pub id: i64,
    pub ticket_id: i64,
}

async fn load(state: &AppState, id: i64) -> Result<Ticket, ApiError> {
    state
        .db
        .tickets()
        .find(id)
        .await?
        .ok_or(ApiError::ResourceHidden)
}

/// `GET /api/v1/tickets/:id`
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(load(&state, id).await?))
}

/// `PATCH /api/v1/tickets/:id`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateTicket>, JsonRejection>,
) -> Result<Json<Ticket>, ApiError> {
    let req = body(payload)?;
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::InvalidRequest("title must not be empty".into()));
    }
    load(&state, id).await?;
    Ok(Json(state.db.tickets().set_title(id, title).await?))
}

/// `DELETE /api/v1/tickets/:id`
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.db.tickets().delete(id).await? {
        return Err(ApiError::ResourceHidden);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/tickets/:id/articles`
///
/// Customer articles are never internal.
pub async fn add_article(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<i64>,
    payload: Result<Json<NewArticle>, JsonRejection>,
) -> Result<(StatusCode, Json<ArticleCreated>), ApiError> {
    let req = body(payload)?;
    if req.body.trim().is_empty() {
        return Err(ApiError::InvalidRequest("body must not be empty".into()));
    }
    let (author_kind, internal) = if identity.is_customer() {
        ("customer", false)
    } else {
        ("agent", req.internal)
    };
    load(&state, id).await?;
    let article_id = state
        .db
        .tickets()
        .add_article(id, author_kind, identity.principal_id(), &req.body, internal)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ArticleCreated {
            id: article_id,
            ticket_id: id,
        }),
    ))
}

/// `PATCH /api/v1/tickets/:id/priority`
pub async fn set_priority(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdatePriority>, JsonRejection>,
) -> Result<Json<Ticket>, ApiError> {
    let req = body(payload)?;
    if !PRIORITY_RANGE.contains(&req.priority) {
        return Err(ApiError::InvalidRequest(format!(
            "priority must be between {} and {}",
            PRIORITY_RANGE.start(),
            PRIORITY_RANGE.end()
        )));
    }
    load(&state, id).await?;
    Ok(Json(state.db.tickets().set_priority(id, req.priority).await?))
}
