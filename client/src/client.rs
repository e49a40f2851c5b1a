//! Stateless HTTP request builder and response parser for the todo API.
//!
//! # Design
//! `TodoClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{ApiStatus, CreateTodo, DeletedTodo, Todo, UpdateTodo};

const TODOS_PATH: &str = "/api/todos";

/// Synchronous, stateless client for the todo API.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_health(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/".to_string(), None)
    }

    pub fn build_list_todos(&self) -> HttpRequest {
        self.request(HttpMethod::Get, TODOS_PATH.to_string(), None)
    }

    pub fn build_create_todo(&self, input: &CreateTodo) -> Result<HttpRequest, ApiError> {
        let body = encode(input)?;
        Ok(self.request(HttpMethod::Post, TODOS_PATH.to_string(), Some(body)))
    }

    pub fn build_update_todo(&self, id: Uuid, input: &UpdateTodo) -> Result<HttpRequest, ApiError> {
        let body = encode(input)?;
        Ok(self.request(HttpMethod::Put, format!("{TODOS_PATH}/{id}"), Some(body)))
    }

    pub fn build_delete_todo(&self, id: Uuid) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("{TODOS_PATH}/{id}"), None)
    }

    pub fn parse_health(&self, response: HttpResponse) -> Result<ApiStatus, ApiError> {
        decode(response, 200)
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        decode(response, 200)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        decode(response, 201)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        decode(response, 200)
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<DeletedTodo, ApiError> {
        decode(response, 200)
    }

    fn request(&self, method: HttpMethod, path: String, body: Option<String>) -> HttpRequest {
        let headers = if body.is_some() {
            vec![("content-type".to_string(), "application/json".to_string())]
        } else {
            Vec::new()
        };
        let path = if path == "/" {
            format!("{}/", self.base_url)
        } else {
            format!("{}{path}", self.base_url)
        };
        HttpRequest {
            method,
            path,
            headers,
            body,
        }
    }
}

/// The `{"message": ...}` envelope the server uses for every error.
#[derive(Deserialize)]
struct ErrorEnvelope {
    message: String,
}

fn encode<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(response: HttpResponse, expected: u16) -> Result<T, ApiError> {
    check_status(&response, expected)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Map non-success status codes to the matching `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    let message = serde_json::from_str::<ErrorEnvelope>(&response.body)
        .map(|e| e.message)
        .unwrap_or_else(|_| response.body.clone());
    Err(match response.status {
        400 => ApiError::Validation(message),
        404 => ApiError::NotFound(message),
        status => ApiError::Http { status, message },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TODO_JSON: &str = r#"{"id":"00000000-0000-0000-0000-000000000001","title":"Test","completed":false,"createdAt":"2024-05-01T12:00:00.123Z"}"#;

    fn client() -> TodoClient {
        TodoClient::new("http://localhost:5000")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_list_todos_produces_correct_request() {
        let req = client().build_list_todos();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:5000/api/todos");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn build_health_targets_root() {
        let req = client().build_health();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:5000/");
    }

    #[test]
    fn build_create_todo_produces_correct_request() {
        let input = CreateTodo {
            title: "Buy milk".to_string(),
        };
        let req = client().build_create_todo(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:5000/api/todos");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "title": "Buy milk" }));
    }

    #[test]
    fn build_update_todo_omits_absent_fields() {
        let input = UpdateTodo {
            title: None,
            completed: Some(true),
        };
        let req = client().build_update_todo(Uuid::nil(), &input).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(
            req.path,
            "http://localhost:5000/api/todos/00000000-0000-0000-0000-000000000000"
        );
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "completed": true }));
    }

    #[test]
    fn build_delete_todo_produces_correct_request() {
        let req = client().build_delete_todo(Uuid::nil());
        assert_eq!(req.method, HttpMethod::Delete);
        assert!(req.body.is_none());
    }

    #[test]
    fn parse_list_todos_success() {
        let todos = client()
            .parse_list_todos(response(200, &format!("[{TODO_JSON}]")))
            .unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title, "Test");
        assert_eq!(todos[0].created_at.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn parse_create_todo_requires_201() {
        let todo = client().parse_create_todo(response(201, TODO_JSON)).unwrap();
        assert_eq!(todo.title, "Test");

        let err = client().parse_create_todo(response(200, TODO_JSON)).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 200, .. }));
    }

    #[test]
    fn parse_create_todo_validation_error() {
        let err = client()
            .parse_create_todo(response(400, r#"{"message":"Title is required"}"#))
            .unwrap_err();
        assert_eq!(err, ApiError::Validation("Title is required".to_string()));
    }

    #[test]
    fn parse_update_todo_not_found() {
        let err = client()
            .parse_update_todo(response(404, r#"{"message":"Todo not found"}"#))
            .unwrap_err();
        assert_eq!(err, ApiError::NotFound("Todo not found".to_string()));
    }

    #[test]
    fn parse_delete_todo_success() {
        let body = format!(r#"{{"message":"Todo deleted successfully","todo":{TODO_JSON}}}"#);
        let deleted = client().parse_delete_todo(response(200, &body)).unwrap();
        assert_eq!(deleted.message, "Todo deleted successfully");
        assert_eq!(deleted.todo.title, "Test");
    }

    #[test]
    fn server_error_keeps_message() {
        let err = client()
            .parse_list_todos(response(
                500,
                r#"{"message":"Error fetching todos","error":"storage unavailable"}"#,
            ))
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Http {
                status: 500,
                message: "Error fetching todos".to_string()
            }
        );
    }

    #[test]
    fn non_json_error_body_is_kept_verbatim() {
        let err = client()
            .parse_list_todos(response(502, "bad gateway"))
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Http {
                status: 502,
                message: "bad gateway".to_string()
            }
        );
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = TodoClient::new("http://localhost:5000/");
        let req = client.build_list_todos();
        assert_eq!(req.path, "http://localhost:5000/api/todos");
    }

    #[test]
    fn parse_list_todos_bad_json() {
        let err = client()
            .parse_list_todos(response(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
