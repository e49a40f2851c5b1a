//! Synchronous API client core for the todo service.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network. The caller executes the HTTP round-trip, so the
//! crate stays deterministic and can sit behind any transport a frontend
//! already has.
//!
//! # Design
//! - `TodoClient` holds only `base_url`.
//! - Each operation is split into `build_*` and `parse_*`, so the I/O
//!   boundary is explicit.
//! - DTOs are defined independently from the server crate; the live
//!   end-to-end test catches schema drift.

pub mod client;
pub mod error;
pub mod http;
pub mod types;

pub use client::TodoClient;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use types::{ApiStatus, CreateTodo, DeletedTodo, Todo, UpdateTodo};
