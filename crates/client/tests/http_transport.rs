use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use serde_json::{Value, json};
use showsync_client::{CatalogClient, ClientConfig, HttpTransport, ShowInclude, Transport};
use tokio_util::sync::CancellationToken;

async fn series(Path((_key, id, _lang)): Path<(String, String, String)>) -> Result<Json<Value>, StatusCode> {
    if id != "80379" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "Data": {
            "Series": {
                "id": "80379",
                "SeriesName": "The Big Bang Theory",
                "Status": "Ended",
                "poster": "posters/80379-1.jpg"
            }
        }
    })))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Json(json!({}))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Serve a fake catalog on an ephemeral port and return its api base url.
async fn spawn_catalog() -> String {
    let app = Router::new()
        .route("/api/{key}/series/{id}/{lang}", get(series))
        .route("/api/slow", get(slow))
        .route("/api/broken", get(broken));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new("KEY");
    config.base_url = base_url.to_string();
    config.request_timeout_secs = 5;
    config
}

#[tokio::test]
async fn fetches_shows_over_http() {
    let base = spawn_catalog().await;
    let client = CatalogClient::with_http(config(&base)).unwrap();

    let outcome = client
        .shows_with_ids(&["80379", "1"], ShowInclude::default())
        .await
        .unwrap();

    let shows: Vec<_> = outcome.results().collect();
    assert_eq!(shows.len(), 1);
    assert_eq!(shows[0].name(), "The Big Bang Theory");
    assert_eq!(
        shows[0].poster_url(),
        Some("https://thetvdb.com/banners/posters/80379-1.jpg")
    );
    assert_eq!(outcome.errors["1"].code(), "not_found");
}

#[tokio::test]
async fn server_error_is_a_transport_error() {
    let base = spawn_catalog().await;
    let transport = HttpTransport::new(&config(&base)).unwrap();

    let err = transport
        .fetch(&format!("{base}/broken"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "transport");
}

#[tokio::test]
async fn cancellation_interrupts_a_slow_request() {
    let base = spawn_catalog().await;
    let transport = HttpTransport::new(&config(&base)).unwrap();
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = transport
        .fetch(&format!("{base}/slow"), &token)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "cancelled");
}
