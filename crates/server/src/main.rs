use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use server_api::{
    create_task, delete_task, get_task, list_tasks, update_task, ApiContext, UpdateTask,
};
use shared::{
    domain::{NewTask, Task},
    error::{ApiError, ErrorCode},
    protocol::ListQuery,
};
use storage::Storage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings()?;
    let storage = Storage::new(&settings.database_url)
        .await
        .map_err(|error| {
            error!(database_url = %settings.database_url, %error, "failed to open todo database");
            error
        })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "todo backend listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/todos", get(http_list_tasks).post(http_create_task))
        .route(
            "/todos/:id",
            get(http_get_task)
                .put(http_update_task)
                .delete(http_delete_task),
        )
        .with_state(state)
}

fn failure(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(message = %err.message, "request failed");
    }
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = list_tasks(&state.api, q.limit).await.map_err(failure)?;
    Ok(Json(tasks))
}

async fn http_create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = create_task(&state.api, req).await.map_err(failure)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn http_get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Task>> {
    let task = get_task(&state.api, id).await.map_err(failure)?;
    Ok(Json(task))
}

async fn http_update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTask>,
) -> ApiResult<Json<Task>> {
    let task = update_task(&state.api, id, req).await.map_err(failure)?;
    Ok(Json(task))
}

async fn http_delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    delete_task(&state.api, id).await.map_err(failure)?;
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
