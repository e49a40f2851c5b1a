//! HTTP error responses.
//!
//! # Design
//! Every failure leaves a handler as an `AppError`, which renders as
//! `{"message": ..., "error"?: ...}` with its status code. An error may also
//! carry a trace (its source chain, a panic payload or an extractor
//! rejection). The trace never goes into the body directly: it rides along
//! in a response extension, and `expose_error_detail` copies it into a
//! `stack` field only when the server runs in development mode.

use std::{any::Any, error::Error as StdError};

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

use crate::{config::Environment, store::StoreError};

pub const TITLE_REQUIRED: &str = "Title is required";
pub const TODO_NOT_FOUND: &str = "Todo not found";
pub const ROUTE_NOT_FOUND: &str = "Route not found";

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    message: String,
    error: Option<String>,
    trace: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: None,
            trace: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Underlying error text, always included in the body as `error`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Diagnostic detail, shown as `stack` in development only.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Map a store failure to its response.
    ///
    /// `context` is the generic message used when the storage itself failed,
    /// e.g. `"Error creating todo"`. These are handled at the route boundary,
    /// so they carry no trace and never get a `stack`.
    pub fn from_store(err: StoreError, context: &str) -> Self {
        match err {
            StoreError::Validation(e) => Self::bad_request(e.to_string()),
            StoreError::NotFound(_) => Self::not_found(TODO_NOT_FOUND),
            other => {
                error!(error = %other, "{context}");
                Self::internal(context).with_error(other.to_string())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn body<'a>(&'a self, stack: Option<&'a str>) -> ErrorBody<'a> {
        ErrorBody {
            message: &self.message,
            error: self.error.as_deref(),
            stack,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body(None))).into_response();
        if self.trace.is_some() {
            response.extensions_mut().insert(self);
        }
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let trace = source_chain(&rejection);
        Self::new(rejection.status(), rejection.body_text()).with_trace(trace)
    }
}

/// `{"message", "error"?}` plus `stack` for error responses, in development.
pub async fn expose_error_detail(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !environment.exposes_error_detail() {
        return response;
    }
    let Some(err) = response.extensions().get::<AppError>() else {
        return response;
    };
    let Ok(bytes) = serde_json::to_vec(&err.body(err.trace.as_deref())) else {
        return response;
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}

/// Turn a handler panic into a 500 instead of dropping the connection.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "handler panicked");
    AppError::internal("Internal server error")
        .with_trace(format!("panic: {detail}"))
        .into_response()
}

/// `Json` extractor whose rejections render as `AppError`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

fn source_chain(err: &dyn StdError) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    lines.join("\n")
}
