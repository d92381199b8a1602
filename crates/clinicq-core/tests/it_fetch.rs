//! Integration tests for the request facade

mod common;

use clinicq_core::api::ApiError;
use clinicq_core::{Fetch, LoadingStore};
use mockito::{Matcher, Server};
use serde::Deserialize;
use serde_json::json;

use common::{expired_pair, harness};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Client {
    id: u32,
    name: String,
}

fn base_url(server: &Server) -> String {
    format!("{}/api/", server.url())
}

#[tokio::test]
async fn get_listing_fills_data_and_total() {
    //* Given
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/clients")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"total": 42, "content": [{"id": 1, "name": "Ann"}, {"id": 2, "name": "Bo"}]}"#)
        .expect(1)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let clients: Fetch<Vec<Client>> = Fetch::new(h.api.clone(), LoadingStore::new());

    //* When
    let result = clients.get("clients", &[("page", "1")], false).await;

    //* Then
    mock.assert_async().await;
    let list = result.expect("listing should load");
    assert_eq!(list.len(), 2);
    assert_eq!(clients.data(), Some(list));
    assert_eq!(clients.total(), 42);
    assert!(clients.error().is_none());
    assert!(!clients.is_loading());
    assert_eq!(clients.response().unwrap().status, 200);
}

#[tokio::test]
async fn get_with_loading_resets_indicator_on_failure() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/queues")
        .with_status(503)
        .with_body(r#"{"error": "Maintenance"}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let loading = LoadingStore::new();
    let queues: Fetch<Vec<serde_json::Value>> = Fetch::new(h.api.clone(), loading.clone());

    //* When
    let result = queues.get("queues", &[], true).await;

    //* Then
    assert!(matches!(result, Err(ApiError::ServerError(_))));
    assert!(!loading.is_loading());
    assert!(!queues.is_loading());
    assert!(matches!(queues.error(), Some(ApiError::ServerError(_))));
    assert!(queues.data().is_none());
    assert!(queues.response().is_none());
}

#[tokio::test]
async fn get_with_loading_signals_global_indicator() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/queues")
        .with_status(200)
        .with_body(r#"{"total": 0, "content": []}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let loading = LoadingStore::new();
    let mut indicator = loading.subscribe();
    let queues: Fetch<Vec<serde_json::Value>> = Fetch::new(h.api.clone(), loading.clone());

    //* When
    let result = queues.get("queues", &[], true).await;

    //* Then
    assert!(result.is_ok());
    // The indicator was touched (started, then stopped) and ends idle
    assert!(indicator.has_changed().unwrap());
    assert!(!*indicator.borrow_and_update());
    assert!(!loading.is_loading());
}

#[tokio::test]
async fn get_without_loading_leaves_indicator_alone() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/queues")
        .with_status(200)
        .with_body(r#"{"total": 0, "content": []}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let loading = LoadingStore::new();
    let indicator = loading.subscribe();
    let queues: Fetch<Vec<serde_json::Value>> = Fetch::new(h.api.clone(), loading.clone());

    //* When
    let result = queues.get("queues", &[], false).await;

    //* Then
    assert!(result.is_ok());
    assert!(!indicator.has_changed().unwrap());
}

#[tokio::test]
async fn post_returns_whole_body() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/clients")
        .match_body(Matcher::Json(json!({"name": "Cy"})))
        .with_status(201)
        .with_body(r#"{"id": 3, "name": "Cy"}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let create: Fetch<Client> = Fetch::new(h.api.clone(), LoadingStore::new());

    //* When
    let created = create.post("clients", &json!({"name": "Cy"})).await;

    //* Then
    let expected = Client {
        id: 3,
        name: "Cy".to_string(),
    };
    assert_eq!(created.unwrap(), expected);
    assert_eq!(create.data(), Some(expected));
    assert_eq!(create.total(), 0);
    assert!(create.error().is_none());
}

#[tokio::test]
async fn put_and_delete_return_whole_body() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/api/clients/3")
        .with_status(200)
        .with_body(r#"{"id": 3, "name": "Cyrus"}"#)
        .create_async()
        .await;
    server
        .mock("DELETE", "/api/clients/3")
        .with_status(200)
        .with_body(r#"{"id": 3, "name": "Cyrus"}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let client: Fetch<Client> = Fetch::new(h.api.clone(), LoadingStore::new());

    //* When
    let updated = client.put("clients/3", &json!({"name": "Cyrus"})).await;
    let deleted = client.delete("clients/3").await;

    //* Then
    assert_eq!(updated.unwrap().name, "Cyrus");
    assert_eq!(deleted.unwrap().id, 3);
    assert_eq!(client.response().unwrap().status, 200);
}

#[tokio::test]
async fn next_call_clears_previous_error() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/clients")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/api/clients")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_body(r#"{"total": 5, "content": []}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let clients: Fetch<Vec<Client>> = Fetch::new(h.api.clone(), LoadingStore::new());

    //* When
    let first = clients.get("clients", &[("page", "1")], false).await;
    let error_after_first = clients.error();
    let second = clients.get("clients", &[("page", "2")], false).await;

    //* Then
    assert!(first.is_err());
    assert!(error_after_first.is_some());
    assert!(second.is_ok());
    assert!(clients.error().is_none());
    assert_eq!(clients.total(), 5);
}

#[tokio::test]
async fn facades_do_not_share_state() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/notes")
        .with_status(200)
        .with_body(r#"{"total": 1, "content": ["first note"]}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let loading = LoadingStore::new();
    let notes: Fetch<Vec<String>> = Fetch::new(h.api.clone(), loading.clone());
    let other: Fetch<Vec<String>> = Fetch::new(h.api.clone(), loading);

    //* When
    let result = notes.get("notes", &[], false).await;

    //* Then
    assert!(result.is_ok());
    assert_eq!(notes.total(), 1);
    assert!(other.data().is_none());
    assert_eq!(other.total(), 0);
}

#[tokio::test]
async fn listing_without_content_is_captured_as_error() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/dashboard")
        .with_status(200)
        .with_body(r#"{"visits": 12}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let dashboard: Fetch<Vec<String>> = Fetch::new(h.api.clone(), LoadingStore::new());

    //* When
    let result = dashboard.get("dashboard", &[], false).await;

    //* Then
    assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    assert!(matches!(dashboard.error(), Some(ApiError::InvalidResponse(_))));
    assert!(dashboard.data().is_none());
}

#[tokio::test]
async fn subscribers_observe_final_state() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/clients")
        .with_status(200)
        .with_body(r#"{"total": 2, "content": []}"#)
        .create_async()
        .await;
    let h = harness(&base_url(&server), Some(expired_pair()));
    let clients: Fetch<Vec<Client>> = Fetch::new(h.api.clone(), LoadingStore::new());
    let mut rx = clients.subscribe();

    //* When
    let _ = clients.get("clients", &[], false).await;

    //* Then
    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert!(!state.loading);
    assert_eq!(state.total, 2);
    assert_eq!(state.data, Some(vec![]));
}
