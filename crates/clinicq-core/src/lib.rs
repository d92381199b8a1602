//! Core library for clinicq.
//!
//! - [`api`]: authenticated HTTP client with transparent token refresh
//! - [`auth`]: credential storage and session state
//! - [`fetch`]: request facade with per-call status tracking
//! - [`loading`]: global loading indicator
//! - [`config`]: configuration file and environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod fetch;
pub mod loading;

pub use api::{ApiClient, ApiError};
pub use fetch::{Fetch, FetchResult, FetchState};
pub use loading::LoadingStore;
