//! Authentication state for the dashboard API.
//!
//! This module provides:
//! - `CredentialStore`: string key-value storage with memory, file and
//!   OS keychain backends
//! - `Session`: typed access to the access/refresh token pair and the
//!   `isAuth` flag kept in a credential store

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, FileStore, KeyringStore, MemoryStore};
pub use session::{
    CredentialPair, Session, ACCESS_TOKEN_KEY, IS_AUTH_KEY, REFRESH_TOKEN_KEY,
};
