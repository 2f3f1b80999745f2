//! Queue endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use super::body;
use super::tickets::PRIORITY_RANGE;
use crate::db::{Queue, Ticket};
use crate::error::ApiError;
use crate::gateway::CurrentIdentity;
use crate::http::AppState;
use crate::permissions::GrantSet;

#[derive(Debug, Serialize)]
pub struct QueueView {
    #[serde(flatten)]
    pub queue: Queue,
    /// The caller's effective permission kinds on this queue.
    pub permissions: GrantSet,
}

#[derive(Debug, Deserialize)]
pub struct NewTicket {
    pub title: String,
    #[serde(default)]
    pub priority: Option<i64>,
    /// Owning company; ignored for customers, who always file for their own.
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// `GET /api/v1/queues/:id`
pub async fn show(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<i64>,
) -> Result<Json<QueueView>, ApiError> {
    let queue = state
        .db
        .directory()
        .find_queue(id)
        .await?
        .ok_or(ApiError::ResourceHidden)?;
    let permissions = state
        .gateway
        .permissions()
        .agent_grants(identity.principal_id(), id)
        .await?;
    Ok(Json(QueueView { queue, permissions }))
}

/// `POST /api/v1/queues/:id/tickets`
pub async fn create_ticket(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<i64>,
    payload: Result<Json<NewTicket>, JsonRejection>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let req = body(payload)?;
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::InvalidRequest("title must not be empty".into()));
    }
    let priority = req.priority.unwrap_or(3);
    if !PRIORITY_RANGE.contains(&priority) {
        return Err(ApiError::InvalidRequest("priority out of range".into()));
    }

    let customer_id = match identity.customer_ref() {
        Some(customer) => customer.company_id.clone(),
        None => req.customer_id,
    };

    let ticket = state
        .db
        .tickets()
        .create(id, customer_id.as_deref(), title, priority)
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}
