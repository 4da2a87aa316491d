use super::*;
use axum::{
    body::{self, Body},
    http::Request,
};
use shared::domain::{TaskId, UserId};
use tower::ServiceExt;

async fn test_app() -> (Router, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let app = build_router(Arc::new(AppState {
        api: ApiContext {
            storage: storage.clone(),
        },
    }));
    (app, storage)
}

async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn json_request(method: &str, uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn create_returns_created_record_with_assigned_id() {
    let (app, _storage) = test_app().await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/todos",
            serde_json::json!({ "title": "Buy milk", "completed": false, "userId": 1 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let task: Task = read_json(response).await;
    assert_eq!(task.title, "Buy milk");
    assert!(!task.completed);
    assert_eq!(task.user_id, Some(UserId(1)));
    assert!(matches!(task.id, TaskId::Int(_)));
}

#[tokio::test]
async fn create_with_blank_title_is_a_validation_error() {
    let (app, _storage) = test_app().await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/todos",
            serde_json::json!({ "title": "  " }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn list_honours_mock_api_limit_parameter() {
    let (app, storage) = test_app().await;
    for n in 0..4 {
        storage
            .insert_task(&format!("task {n}"), false, None)
            .await
            .expect("insert");
    }

    let response = app
        .clone()
        .oneshot(Request::get("/todos?_limit=2").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let tasks: Vec<Task> = read_json(response).await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "task 0");

    let response = app
        .oneshot(Request::get("/todos").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let tasks: Vec<Task> = read_json(response).await;
    assert_eq!(tasks.len(), 4);
}

#[tokio::test]
async fn put_replaces_record_and_get_reads_it_back() {
    let (app, storage) = test_app().await;
    let stored = storage.insert_task("A", false, None).await.expect("insert");
    let uri = format!("/todos/{}", stored.id);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &uri,
            serde_json::json!({ "id": stored.id, "title": "A", "completed": true }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Task = read_json(response).await;
    assert!(updated.completed);

    let response = app
        .oneshot(Request::get(uri.as_str()).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let fetched: Task = read_json(response).await;
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn delete_removes_record_then_reports_not_found() {
    let (app, storage) = test_app().await;
    let stored = storage.insert_task("A", false, None).await.expect("insert");
    let uri = format!("/todos/{}", stored.id);

    let response = app
        .clone()
        .oneshot(Request::delete(uri.as_str()).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::delete(uri.as_str()).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::NotFound);
}
