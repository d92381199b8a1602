use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CredentialStore;

/// Store key holding the bearer access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Store key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Store key flagging that the user completed a login
pub const IS_AUTH_KEY: &str = "isAuth";

/// Access/refresh token pair as issued by the login and refresh endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: Some(refresh_token.into()),
        }
    }
}

// Tokens never end up in logs
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Typed access to the credentials kept in a [`CredentialStore`].
///
/// Clone is cheap and every clone sees the same store.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.store.get(ACCESS_TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.store.get(REFRESH_TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    /// The stored pair, if an access token is present
    pub fn credentials(&self) -> Result<Option<CredentialPair>> {
        let Some(access_token) = self.access_token()? else {
            return Ok(None);
        };
        Ok(Some(CredentialPair {
            access_token,
            refresh_token: self.refresh_token()?,
        }))
    }

    /// Whether a login completed and has not been revoked since
    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.store.get(IS_AUTH_KEY)?.as_deref() == Some("true"))
    }

    /// Persist a freshly issued pair after login
    pub fn establish(&self, pair: &CredentialPair) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        if let Some(ref refresh) = pair.refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, refresh)?;
        }
        self.store.set(IS_AUTH_KEY, "true")?;
        debug!("Session established");
        Ok(())
    }

    /// Update tokens in place after a successful refresh.
    /// The refresh token is only replaced when the server sent a new one.
    pub fn apply_refresh(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(refresh) = refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, refresh)?;
        }
        Ok(())
    }

    /// Remove every stored credential value
    pub fn clear(&self) -> Result<()> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        self.store.remove(IS_AUTH_KEY)?;
        debug!("Session cleared");
        Ok(())
    }
}
