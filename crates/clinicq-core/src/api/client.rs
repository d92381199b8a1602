//! API client for the clinic dashboard backend.
//!
//! `ApiClient` sends every request through the auth interceptor: the request
//! stage attaches the bearer token, the response stage recovers from an
//! expired access token with a single shared refresh and replays the request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{CredentialPair, Session};
use crate::config::ApiConfig;

use super::error::GENERIC_ERROR_MESSAGE;
use super::hooks::{Navigator, Notifier, TracingNavigator, TracingNotifier, AUTH_ROUTE, ERROR_TITLE};
use super::refresh::{RefreshCoordinator, Ticket};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Token refresh endpoint, relative to the base URL
const REFRESH_PATH: &str = "auth/refreshToken";

/// Login endpoint, relative to the base URL
const LOGIN_PATH: &str = "auth/login";

/// A request as issued by a caller. Kept around so it can be replayed after
/// a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, query: &[(&str, &str)]) -> Self {
        self.query
            .extend(query.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Whether this request already went through a token refresh
    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// A completed response with its body already read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: header::HeaderMap,
    pub body: String,
}

/// Paginated listing as returned by GET endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    #[serde(default)]
    pub total: Option<u64>,
    pub content: T,
}

impl ApiResponse {
    async fn read(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Decode the whole body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response body: {}", e)))
    }

    /// Decode a `{ total, content }` listing body
    pub fn listing<T: DeserializeOwned>(&self) -> Result<Listing<T>, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse listing: {}", e)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct TokenEnvelope {
    #[serde(default)]
    content: TokenContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenContent {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl TokenContent {
    fn into_pair(self) -> Option<CredentialPair> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        Some(CredentialPair {
            access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}

/// Authenticated client for the dashboard API.
/// Clone is cheap - clones share the connection pool, the cookie store and
/// the refresh gate.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
    refresh: RefreshCoordinator,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Create a client for `config.base_url` backed by `session`
    pub fn new(config: &ApiConfig, session: Session) -> Result<Self, ApiError> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            session,
            refresh: RefreshCoordinator::new(),
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(TracingNavigator),
        })
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_navigator(mut self, navigator: impl Navigator + 'static) -> Self {
        self.navigator = Arc::new(navigator);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether a token refresh is currently in flight
    pub async fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing().await
    }

    /// Absolute URL for a path relative to the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    // ===== Verbs =====

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::get(path).with_query(query)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::post(path, Self::encode(body)?)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::put(path, Self::encode(body)?)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(ApiRequest::delete(path)).await
    }

    fn encode<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, ApiError> {
        serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode request body: {}", e)))
    }

    /// Send a request through the auth interceptor.
    ///
    /// A first 401 is recovered with a token refresh and the request is
    /// replayed once. Anything else that is not a success is reported to the
    /// notifier and returned as an error.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut token = self.bearer_token().await?;

        loop {
            let response = self.send(&request, token.as_deref()).await?;

            if response.status.is_success() {
                return Ok(response);
            }

            if response.status == StatusCode::UNAUTHORIZED && !request.retried {
                request.retried = true;
                debug!(method = %request.method, path = %request.path, "Unauthorized, recovering session");
                token = Some(self.recover().await?);
                continue;
            }

            return Err(self.reject(&request, &response).await);
        }
    }

    // ===== Session =====

    /// Exchange username and password for a credential pair and store it
    pub async fn login(&self, username: &str, password: &str) -> Result<CredentialPair, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH, Self::encode(&LoginRequest { username, password })?);
        let response = self.send(&request, None).await?;

        if !response.status.is_success() {
            let message = Self::user_message(&response);
            self.notifier.error(ERROR_TITLE, &message);
            warn!(status = %response.status, "Login failed");
            return Err(match response.status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::LoginRejected(message),
                status => ApiError::from_status(status, &response.body),
            });
        }

        let envelope: TokenEnvelope = response.json()?;
        let pair = envelope
            .content
            .into_pair()
            .ok_or_else(|| ApiError::InvalidResponse("Login response carried no access token".to_string()))?;

        self.session.establish(&pair)?;
        self.refresh.set_default_token(Some(pair.access_token.clone())).await;
        info!(username, "Login successful");
        Ok(pair)
    }

    /// Forget the stored credentials and send the user to the auth route
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.session.clear()?;
        self.refresh.set_default_token(None).await;
        self.navigator.navigate(AUTH_ROUTE);
        info!("Logged out");
        Ok(())
    }

    // ===== Interceptor internals =====

    /// Request stage: stored access token, else the default installed by
    /// the last refresh. No token at all is not an error.
    async fn bearer_token(&self) -> Result<Option<String>, ApiError> {
        if let Some(token) = self.session.access_token()? {
            return Ok(Some(token));
        }
        Ok(self.refresh.default_token().await)
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("Access token is not a valid header value".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint(&request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(Self::auth_headers(token)?);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        debug!(method = %request.method, url = %url, status = %response.status(), "Response received");
        ApiResponse::read(response).await
    }

    /// Wait for a fresh access token, performing the refresh if no other
    /// request already is.
    async fn recover(&self) -> Result<String, ApiError> {
        match self.refresh.enter().await {
            Ticket::Leader => {
                // Detached so a dropped caller cannot leave the gate held
                let client = self.clone();
                match tokio::spawn(async move { client.run_refresh().await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(error = %e, "Refresh task failed, ending session");
                        self.abandon_refresh().await
                    }
                }
            }
            queued => queued.outcome().await.unwrap_or(Err(ApiError::RefreshAbandoned)),
        }
    }

    /// Perform the refresh, apply its side effects, then release the gate
    /// and everything queued behind it.
    async fn run_refresh(self) -> Result<String, ApiError> {
        let outcome = self.refresh_tokens().await;
        match outcome {
            Ok(_) => info!("Access token refreshed"),
            Err(ref e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.expire_session().await;
            }
        }

        let released = self.refresh.settle(&outcome).await;
        debug!(released, "Refresh settled");
        outcome
    }

    /// Settle a refresh that died before reaching an outcome. Treated like
    /// any other refresh failure.
    async fn abandon_refresh(&self) -> Result<String, ApiError> {
        let outcome = Err(ApiError::RefreshAbandoned);
        self.expire_session().await;
        self.refresh.settle(&outcome).await;
        outcome
    }

    async fn refresh_tokens(&self) -> Result<String, ApiError> {
        let request = RefreshRequest {
            access_token: self.session.access_token()?,
            refresh_token: self.session.refresh_token()?,
        };

        let response = self
            .client
            .post(self.endpoint(REFRESH_PATH))
            .json(&request)
            .send()
            .await?;
        let response = ApiResponse::read(response).await?;

        if !response.status.is_success() {
            debug!(status = %response.status, "Refresh endpoint rejected the session");
            return Err(ApiError::AuthExpiredTerminal);
        }

        let envelope: TokenEnvelope = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::RefreshProtocol(format!("Undecodable refresh response: {}", e)))?;
        let pair = envelope
            .content
            .into_pair()
            .ok_or_else(|| ApiError::RefreshProtocol("Refresh response carried no access token".to_string()))?;

        self.session
            .apply_refresh(&pair.access_token, pair.refresh_token.as_deref())?;
        Ok(pair.access_token)
    }

    /// Clear credentials and redirect to the auth route
    async fn expire_session(&self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        self.refresh.set_default_token(None).await;
        self.navigator.navigate(AUTH_ROUTE);
    }

    fn user_message(response: &ApiResponse) -> String {
        ApiError::server_message(&response.body).unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
    }

    /// Report a failed response and turn it into an error
    async fn reject(&self, request: &ApiRequest, response: &ApiResponse) -> ApiError {
        self.notifier.error(ERROR_TITLE, &Self::user_message(response));

        if response.status == StatusCode::UNAUTHORIZED {
            warn!(method = %request.method, path = %request.path, "Unauthorized after token refresh, ending session");
            self.expire_session().await;
            return ApiError::AuthExpiredTerminal;
        }

        warn!(method = %request.method, path = %request.path, status = %response.status, "Request failed");
        ApiError::from_status(response.status, &response.body)
    }
}
