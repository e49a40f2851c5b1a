//! Todo resource routes and the service status endpoint.
//!
//! Each handler performs exactly one store call and maps its outcome to a
//! status code. Nothing here retries.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::Environment,
    error::{AppError, JsonBody, ROUTE_NOT_FOUND, TITLE_REQUIRED, TODO_NOT_FOUND},
    model::{Todo, TodoPatch},
    store::TodoStore,
};

/// Shared handler state: the injected store and the deployment mode.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TodoStore>,
    pub environment: Environment,
}

impl AppState {
    pub fn new(store: Arc<dyn TodoStore>, environment: Environment) -> Self {
        Self { store, environment }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTodo {
    #[serde(default)]
    pub title: Option<String>,
}

/// Body of a successful delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedTodo {
    pub message: String,
    pub todo: Todo,
}

/// Informational payload for `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStatus {
    pub message: String,
    pub status: String,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
}

/// Routes mounted under `/api/todos`.
pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_todos).post(create_todo))
        .route("/{id}", put(update_todo).delete(delete_todo))
}

pub async fn api_status(State(state): State<AppState>) -> Json<ApiStatus> {
    Json(ApiStatus {
        message: "Todo API is running!".to_string(),
        status: "active".to_string(),
        environment: state.environment.to_string(),
        timestamp: Utc::now(),
    })
}

pub async fn route_not_found() -> AppError {
    AppError::not_found(ROUTE_NOT_FOUND)
}

async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, AppError> {
    let todos = state
        .store
        .list()
        .await
        .map_err(|e| AppError::from_store(e, "Error fetching todos"))?;
    debug!(count = todos.len(), "listed todos");
    Ok(Json(todos))
}

async fn create_todo(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateTodo>,
) -> Result<(StatusCode, Json<Todo>), AppError> {
    let title = input
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::bad_request(TITLE_REQUIRED))?;

    let todo = state
        .store
        .create(title)
        .await
        .map_err(|e| AppError::from_store(e, "Error creating todo"))?;
    info!(id = %todo.id, "todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

/// A path id that is not a UUID answers 404, not 500.
async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<TodoPatch>,
) -> Result<Json<Todo>, AppError> {
    let id = parse_id(&id)?;
    let todo = state
        .store
        .find_and_update(id, patch)
        .await
        .map_err(|e| AppError::from_store(e, "Error updating todo"))?;
    info!(%id, completed = todo.completed, "todo updated");
    Ok(Json(todo))
}

/// A path id that is not a UUID answers 404, not 500.
async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedTodo>, AppError> {
    let id = parse_id(&id)?;
    let todo = state
        .store
        .find_and_delete(id)
        .await
        .map_err(|e| AppError::from_store(e, "Error deleting todo"))?;
    info!(%id, "todo deleted");
    Ok(Json(DeletedTodo {
        message: "Todo deleted successfully".to_string(),
        todo,
    }))
}

/// A malformed id cannot name any record.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        debug!(id = raw, "rejecting malformed todo id");
        AppError::not_found(TODO_NOT_FOUND)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_title_is_optional() {
        let input: CreateTodo = serde_json::from_str("{}").unwrap();
        assert!(input.title.is_none());
        let input: CreateTodo = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(input.title.as_deref(), Some("x"));
    }

    #[test]
    fn malformed_id_is_not_found() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), TODO_NOT_FOUND);
        assert!(parse_id("00000000-0000-0000-0000-000000000000").is_ok());
    }
}
