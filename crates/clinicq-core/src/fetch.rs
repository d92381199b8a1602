//! Request facade with per-call-site status tracking.
//!
//! A `Fetch<T>` wraps the verb calls of one `ApiClient` and records the
//! outcome of the latest call in its own observable state. Failures never
//! propagate as panics or early returns out of the facade: they are captured
//! in `error` and handed back as the `Err` side of a [`FetchResult`].

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::api::{ApiClient, ApiError, ApiResponse};
use crate::loading::LoadingStore;

/// Value-or-error outcome of a facade call
pub type FetchResult<T> = Result<T, ApiError>;

/// Snapshot of a facade's status
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    /// Unwrapped payload of the last successful call
    pub data: Option<T>,
    /// Raw envelope of the last successful call
    pub response: Option<ApiResponse>,
    /// Error captured from the last call, reset when a new call starts
    pub error: Option<ApiError>,
    pub loading: bool,
    /// Item count reported by the last listing
    pub total: u64,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            response: None,
            error: None,
            loading: false,
            total: 0,
        }
    }
}

pub struct Fetch<T> {
    api: ApiClient,
    loading_store: LoadingStore,
    state: watch::Sender<FetchState<T>>,
}

impl<T> Fetch<T>
where
    T: DeserializeOwned + Clone,
{
    pub fn new(api: ApiClient, loading_store: LoadingStore) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            api,
            loading_store,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    pub fn response(&self) -> Option<ApiResponse> {
        self.state.borrow().response.clone()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn total(&self) -> u64 {
        self.state.borrow().total
    }

    /// GET a `{ total, content }` listing. `data` becomes `content` and
    /// `total` the reported count. With `with_loading` the global loading
    /// indicator runs for the duration of the call.
    pub async fn get(&self, path: &str, query: &[(&str, &str)], with_loading: bool) -> FetchResult<T> {
        let _indicator = with_loading.then(|| self.loading_store.begin());
        let _call = self.begin();
        let outcome = self.api.get(path, query).await;
        self.finish(path, outcome, |response| {
            let listing = response.listing::<T>()?;
            Ok((listing.content, Some(listing.total.unwrap_or(0))))
        })
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, payload: &B) -> FetchResult<T> {
        let _call = self.begin();
        let outcome = self.api.post(path, payload).await;
        self.finish(path, outcome, Self::whole_body)
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, payload: &B) -> FetchResult<T> {
        let _call = self.begin();
        let outcome = self.api.put(path, payload).await;
        self.finish(path, outcome, Self::whole_body)
    }

    pub async fn delete(&self, path: &str) -> FetchResult<T> {
        let _call = self.begin();
        let outcome = self.api.delete(path).await;
        self.finish(path, outcome, Self::whole_body)
    }

    fn whole_body(response: &ApiResponse) -> Result<(T, Option<u64>), ApiError> {
        Ok((response.json()?, None))
    }

    fn begin(&self) -> CallGuard<'_, T> {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
        CallGuard { state: &self.state }
    }

    /// Record the outcome. `unwrap` yields the payload and, for listings,
    /// the new total.
    fn finish(
        &self,
        path: &str,
        outcome: Result<ApiResponse, ApiError>,
        unwrap: impl FnOnce(&ApiResponse) -> Result<(T, Option<u64>), ApiError>,
    ) -> FetchResult<T> {
        let result = outcome.and_then(|response| {
            let (data, total) = unwrap(&response)?;
            Ok((response, data, total))
        });

        self.state.send_modify(|state| {
            state.loading = false;
            match &result {
                Ok((response, data, total)) => {
                    state.response = Some(response.clone());
                    state.data = Some(data.clone());
                    if let Some(total) = total {
                        state.total = *total;
                    }
                }
                Err(e) => {
                    debug!(path, error = %e, "Request failed, error captured");
                    state.error = Some(e.clone());
                }
            }
        });

        result.map(|(_, data, _)| data)
    }
}

/// Clears the facade's `loading` flag if a call is dropped before it settles
struct CallGuard<'a, T> {
    state: &'a watch::Sender<FetchState<T>>,
}

impl<T> Drop for CallGuard<'_, T> {
    fn drop(&mut self) {
        self.state
            .send_if_modified(|state| std::mem::replace(&mut state.loading, false));
    }
}
