//! REST API client module for the clinic dashboard backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! dashboard API. Requests carry a JWT bearer token; when the backend
//! answers 401 the client refreshes the token through
//! `auth/refreshToken` once, queues concurrent callers behind that single
//! refresh and replays every affected request with the new token.

pub mod client;
pub mod error;
pub mod hooks;
pub mod refresh;

pub use client::{ApiClient, ApiRequest, ApiResponse, Listing};
pub use error::ApiError;
pub use hooks::{Navigator, Notifier, TracingNavigator, TracingNotifier, AUTH_ROUTE};
