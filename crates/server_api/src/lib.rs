use serde::{Deserialize, Serialize};
use shared::{
    domain::{normalize_title, NewTask, Task, TaskId, UserId},
    error::{ApiError, ErrorCode},
};
use storage::Storage;
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

/// Body of `PUT /todos/{id}`. The path id is authoritative; an id in the body
/// is accepted and ignored so clients can send the full record back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl From<Task> for UpdateTask {
    fn from(value: Task) -> Self {
        Self {
            id: Some(value.id),
            title: value.title,
            completed: value.completed,
            user_id: value.user_id,
        }
    }
}

pub async fn list_tasks(ctx: &ApiContext, limit: Option<u32>) -> Result<Vec<Task>, ApiError> {
    let tasks = ctx.storage.list_tasks(limit).await.map_err(internal)?;
    Ok(tasks.into_iter().map(Task::from).collect())
}

pub async fn get_task(ctx: &ApiContext, id: i64) -> Result<Task, ApiError> {
    ctx.storage
        .get_task(id)
        .await
        .map_err(internal)?
        .map(Task::from)
        .ok_or_else(|| not_found(id))
}

pub async fn create_task(ctx: &ApiContext, req: NewTask) -> Result<Task, ApiError> {
    let title = validated_title(&req.title)?;
    let stored = ctx
        .storage
        .insert_task(&title, req.completed, req.user_id)
        .await
        .map_err(internal)?;
    info!(task_id = stored.id, "todo created");
    Ok(stored.into())
}

pub async fn update_task(ctx: &ApiContext, id: i64, req: UpdateTask) -> Result<Task, ApiError> {
    let title = validated_title(&req.title)?;
    let stored = ctx
        .storage
        .update_task(id, &title, req.completed, req.user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(id))?;
    info!(task_id = id, completed = stored.completed, "todo updated");
    Ok(stored.into())
}

pub async fn delete_task(ctx: &ApiContext, id: i64) -> Result<(), ApiError> {
    if !ctx.storage.delete_task(id).await.map_err(internal)? {
        return Err(not_found(id));
    }
    info!(task_id = id, "todo deleted");
    Ok(())
}

fn validated_title(raw: &str) -> Result<String, ApiError> {
    normalize_title(raw)
        .ok_or_else(|| ApiError::new(ErrorCode::Validation, "title must not be empty"))
}

fn not_found(id: i64) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("todo {id} not found"))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
