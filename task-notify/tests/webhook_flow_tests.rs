//! Cross-service tests: the task API delivering signed webhooks to a live
//! notification service over loopback HTTP.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::routing::post;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

use task_notify::api::{ApiServer, ApiServerConfig, ApiSurface};
use task_notify::config::{AppConfig, DEFAULT_NOTIFY_PORT, DEFAULT_TASK_API_PORT};
use task_notify::database::{DbPool, init_pool_with_size, run_migrations};
use task_notify::resilience::{BreakerConfig, CircuitBreaker, CircuitState};
use task_notify::services::ServiceContainer;
use task_notify::state_store::{SqliteStateStore, StateStore};
use task_notify::utils::{ManualClock, system_clock};
use task_notify::webhook::{
    DeliveryOutcome, HttpTransport, WEBHOOK_SERVICE, WebhookDispatcher, WebhookPayload,
};

const SECRET: &str = "flow-secret";

async fn setup_test_db() -> DbPool {
    let pool = init_pool_with_size("sqlite::memory:", 1)
        .await
        .expect("Failed to create test pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn config(port: u16, webhook_url: &str) -> AppConfig {
    let webhook_url = webhook_url.to_string();
    AppConfig::from_lookup(port, move |key| match key {
        "WEBHOOK_SECRET" => Some(SECRET.to_string()),
        "WEBHOOK_URL" => Some(webhook_url.clone()),
        "WEBHOOK_BACKOFF_SECS" => Some("0".to_string()),
        "WEBHOOK_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .expect("valid test configuration")
}

/// Serve `router` on an ephemeral loopback port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn request(method: &str, uri: &str, user_id: i64, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user_id.to_string());
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

mod end_to_end_tests {
    use super::*;

    #[tokio::test]
    async fn test_completed_task_lands_in_inbox() {
        let notify_config = config(DEFAULT_NOTIFY_PORT, "http://127.0.0.1:9/notify");
        let notify = ServiceContainer::new(setup_test_db().await, &notify_config);
        let notify_app = ApiServer::new(
            ApiServerConfig::from(&notify_config),
            notify.notification_state(),
            ApiSurface::Notifications,
        )
        .build_router();
        let base = serve(notify_app.clone()).await;

        let task_config = config(DEFAULT_TASK_API_PORT, &format!("{base}/notify"));
        let tasks = ServiceContainer::new(setup_test_db().await, &task_config);
        let task_app = ApiServer::new(
            ApiServerConfig::from(&task_config),
            tasks.task_api_state(),
            ApiSurface::Tasks,
        )
        .build_router();

        let (status, task) = send(
            &task_app,
            request("POST", "/api/tasks", 5, Some(json!({"title": "Write report"}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["status"], "pending");
        let task_id = task["id"].as_i64().unwrap();

        let (status, done) = send(
            &task_app,
            request("POST", &format!("/api/tasks/{task_id}/complete"), 5, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "done");

        // Delivery runs in the background after the response.
        let mut page = Value::Null;
        for _ in 0..100 {
            let (_, body) = send(&notify_app, request("GET", "/notifications", 5, None)).await;
            if body["total"] == 1 {
                page = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(page["total"], 1, "notification was never delivered");
        let item = &page["items"][0];
        assert_eq!(item["taskId"], task_id);
        assert_eq!(item["status"], "unread");
        assert_eq!(item["message"], "Task 'Write report' has been completed!");

        let id = item["id"].as_i64().unwrap();
        let (status, read) = send(
            &notify_app,
            request("PATCH", &format!("/notifications/{id}/read"), 5, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["status"], "read");
        assert!(read["readAt"].is_string());

        let (_, stats) = send(&task_app, request("GET", "/api/webhooks/stats", 5, None)).await;
        assert_eq!(stats["delivered"], 1);

        tasks.shutdown().await.unwrap();
        notify.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_other_users_cannot_complete_task() {
        let task_config = config(DEFAULT_TASK_API_PORT, "http://127.0.0.1:9/notify");
        let tasks = ServiceContainer::new(setup_test_db().await, &task_config);
        let task_app = ApiServer::new(
            ApiServerConfig::from(&task_config),
            tasks.task_api_state(),
            ApiSurface::Tasks,
        )
        .build_router();

        let (_, task) = send(
            &task_app,
            request("POST", "/api/tasks", 5, Some(json!({"title": "Private"}))),
        )
        .await;
        let task_id = task["id"].as_i64().unwrap();

        let (status, body) = send(
            &task_app,
            request("POST", &format!("/api/tasks/{task_id}/complete"), 6, None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (_, task) = send(
            &task_app,
            request("GET", &format!("/api/tasks/{task_id}"), 5, None),
        )
        .await;
        assert_eq!(task["status"], "pending");
    }
}

mod breaker_tests {
    use super::*;

    #[tokio::test]
    async fn test_breaker_state_is_shared_through_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("shared.db").display());

        let first_pool = init_pool_with_size(&url, 1).await.unwrap();
        run_migrations(&first_pool).await.unwrap();
        let second_pool = init_pool_with_size(&url, 1).await.unwrap();

        let clock = ManualClock::starting_now();
        let config = BreakerConfig {
            failure_threshold: 2,
            ..BreakerConfig::default()
        };
        let first_store: Arc<dyn StateStore> =
            Arc::new(SqliteStateStore::new(first_pool.clone(), clock.clone()));
        let second_store: Arc<dyn StateStore> =
            Arc::new(SqliteStateStore::new(second_pool.clone(), clock.clone()));
        let first = CircuitBreaker::new(first_store, clock.clone(), config.clone());
        let second = CircuitBreaker::new(second_store, clock.clone(), config);

        first.record_failure(WEBHOOK_SERVICE).await.unwrap();
        second.record_failure(WEBHOOK_SERVICE).await.unwrap();

        assert_eq!(
            first.status(WEBHOOK_SERVICE).await.unwrap().state,
            CircuitState::Open
        );
        let rejected = first.call(WEBHOOK_SERVICE, || async { Ok(()) }).await;
        assert!(matches!(
            rejected,
            Err(task_notify::Error::CircuitOpen { .. })
        ));

        second.reset(WEBHOOK_SERVICE).await.unwrap();
        assert_eq!(
            first.status(WEBHOOK_SERVICE).await.unwrap().state,
            CircuitState::Closed
        );

        first_pool.close().await;
        second_pool.close().await;
    }

    #[tokio::test]
    async fn test_failing_receiver_opens_circuit() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let failing = Router::new().route(
            "/notify",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
                }
            }),
        );
        let base = serve(failing).await;

        let pool = setup_test_db().await;
        let clock = system_clock();
        let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::new(pool, clock.clone()));
        let breaker = CircuitBreaker::new(
            store,
            clock,
            BreakerConfig {
                failure_threshold: 2,
                ..BreakerConfig::default()
            },
        );
        let transport = Arc::new(HttpTransport::new(
            config(DEFAULT_TASK_API_PORT, &format!("{base}/notify"))
                .webhook
                .transport,
        ));
        let dispatcher = Arc::new(
            WebhookDispatcher::new(transport, breaker, SECRET.to_string())
                .with_retry(task_notify::resilience::RetryPolicy::immediate(5)),
        );

        let payload = WebhookPayload::task_completed(1, 2, "Flaky", chrono::Utc::now());
        let outcome = dispatcher.enqueue(payload).await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::DroppedCircuitOpen { attempts: 2 });
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.stats().attempts, 2);
        assert_eq!(dispatcher.stats().dropped_circuit_open, 1);
    }
}
