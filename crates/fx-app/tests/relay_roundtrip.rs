//! Controller -> HTTP relay -> fake upstream, all on loopback.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fx_app::credentials::MemoryCredentialStore;
use fx_app::generator::backend::HttpRelay;
use fx_app::relay::{RelayState, router};
use fx_app::{AppError, ControllerState, FailureKind, Generator, GeneratorConfig};
use fx_core::GenerationRequest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

struct Upstream {
    base: String,
    polls_until_done: usize,
    omit_urls: bool,
    polls: AtomicUsize,
    cancels: AtomicUsize,
}

async fn create_prediction(
    State(upstream): State<Arc<Upstream>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if body["input"]["prompt"]
        .as_str()
        .unwrap_or_default()
        .is_empty()
    {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "prompt is required" })),
        );
    }
    let urls = if upstream.omit_urls {
        json!({})
    } else {
        json!({
            "get": format!("{}/predictions/p1", upstream.base),
            "cancel": format!("{}/predictions/p1/cancel", upstream.base),
        })
    };
    (
        StatusCode::CREATED,
        Json(json!({ "id": "p1", "status": "starting", "urls": urls })),
    )
}

async fn get_prediction(
    State(upstream): State<Arc<Upstream>>,
    Path(id): Path<String>,
) -> Json<Value> {
    let n = upstream.polls.fetch_add(1, Ordering::SeqCst) + 1;
    if n >= upstream.polls_until_done {
        Json(json!({ "id": id, "status": "succeeded", "output": ["https://x/img.webp"] }))
    } else {
        Json(json!({ "id": id, "status": "processing", "output": null }))
    }
}

async fn cancel_prediction(
    State(upstream): State<Arc<Upstream>>,
    Path(id): Path<String>,
) -> Json<Value> {
    upstream.cancels.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "id": id, "status": "canceled" }))
}

async fn spawn_upstream(polls_until_done: usize, omit_urls: bool) -> Arc<Upstream> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = Arc::new(Upstream {
        base: format!("http://{}/v1", listener.local_addr().unwrap()),
        polls_until_done,
        omit_urls,
        polls: AtomicUsize::new(0),
        cancels: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route(
            "/v1/models/black-forest-labs/flux-dev/predictions",
            post(create_prediction),
        )
        .route("/v1/predictions/{id}", get(get_prediction))
        .route("/v1/predictions/{id}/cancel", post(cancel_prediction))
        .with_state(upstream.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    upstream
}

async fn generator_for(upstream: &Upstream) -> Generator {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_url = format!("http://{}", listener.local_addr().unwrap());
    let app = router(RelayState::new(&upstream.base, Duration::from_secs(5)).unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let relay = Arc::new(HttpRelay::new(relay_url, Duration::from_secs(5)).unwrap());
    let credentials = Arc::new(MemoryCredentialStore::new(Some("r8_test".into())));
    let config = GeneratorConfig {
        model_endpoint: format!(
            "{}/models/black-forest-labs/flux-dev/predictions",
            upstream.base
        ),
        poll_interval: Duration::from_millis(20),
        job_timeout: Some(Duration::from_secs(10)),
    };
    Generator::new(relay, credentials, config)
}

#[tokio::test]
async fn test_job_runs_to_completion() {
    let upstream = spawn_upstream(3, false).await;
    let generator = generator_for(&upstream).await;

    let handle = generator
        .submit(GenerationRequest::new("a cat").with_strength(0.8))
        .await
        .unwrap();
    assert_eq!(handle.id, "p1");

    let settled = tokio::time::timeout(Duration::from_secs(5), generator.wait_until_settled())
        .await
        .unwrap();
    assert_eq!(
        settled,
        ControllerState::Succeeded {
            output: "https://x/img.webp".into()
        }
    );
    assert_eq!(upstream.polls.load(Ordering::SeqCst), 3);
    assert_eq!(generator.active_job(), None);
}

#[tokio::test]
async fn test_cancel_reaches_upstream() {
    let upstream = spawn_upstream(usize::MAX, false).await;
    let generator = generator_for(&upstream).await;

    generator
        .submit(GenerationRequest::new("a cat"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(generator.cancel().await.unwrap());
    assert_eq!(generator.state(), ControllerState::Canceled);
    assert_eq!(upstream.cancels.load(Ordering::SeqCst), 1);

    let polls = upstream.polls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(upstream.polls.load(Ordering::SeqCst) <= polls + 1);
    assert_eq!(generator.state(), ControllerState::Canceled);
}

#[tokio::test]
async fn test_missing_lifecycle_urls_fail_the_job() {
    let upstream = spawn_upstream(1, true).await;
    let generator = generator_for(&upstream).await;

    let err = generator
        .submit(GenerationRequest::new("a cat"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::MalformedResponse(_)));
    match generator.state() {
        ControllerState::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::MalformedResponse)
        }
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test]
async fn test_upstream_rejection_is_a_submission_error() {
    let upstream = spawn_upstream(1, false).await;
    let generator = generator_for(&upstream).await;

    // Source image only: passes local validation, upstream wants a prompt.
    let request = GenerationRequest::new("").with_source_image("data:image/png;base64,AAAA");
    let err = generator.submit(request).await.unwrap_err();

    assert!(matches!(err, AppError::Submission(_)));
    assert_eq!(err.http_status(), Some(422));
    match generator.state() {
        ControllerState::Failed(failure) => assert_eq!(failure.kind, FailureKind::Submission),
        other => panic!("unexpected state {other:?}"),
    }
}
