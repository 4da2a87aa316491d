use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{fs, path::Path, str::FromStr};

use shared::domain::{Task, TaskId, UserId};

const TASK_COLUMNS: &str = "id, title, completed, user_id, created_at, updated_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTask {
    pub id: i64,
    pub title: String,
    pub completed: bool,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredTask {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            completed: row.try_get("completed")?,
            user_id: row.try_get::<Option<i64>, _>("user_id")?.map(UserId),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<StoredTask> for Task {
    fn from(value: StoredTask) -> Self {
        Self {
            id: TaskId::Int(value.id),
            title: value.title,
            completed: value.completed,
            user_id: value.user_id,
        }
    }
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Tasks in ascending id order, optionally capped at `limit` rows.
    pub async fn list_tasks(&self, limit: Option<u32>) -> Result<Vec<StoredTask>> {
        let rows = match limit {
            Some(limit) => {
                sqlx::query(&format!(
                    "SELECT {TASK_COLUMNS} FROM todos ORDER BY id ASC LIMIT ?"
                ))
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM todos ORDER BY id ASC"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(StoredTask::from_row).collect()
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<StoredTask>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM todos WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(StoredTask::from_row).transpose()
    }

    pub async fn insert_task(
        &self,
        title: &str,
        completed: bool,
        user_id: Option<UserId>,
    ) -> Result<StoredTask> {
        let row = sqlx::query(&format!(
            "INSERT INTO todos (title, completed, user_id) VALUES (?, ?, ?) RETURNING {TASK_COLUMNS}"
        ))
        .bind(title)
        .bind(completed)
        .bind(user_id.map(|u| u.0))
        .fetch_one(&self.pool)
        .await
        .context("failed to insert todo")?;
        StoredTask::from_row(&row)
    }

    /// Overwrites every mutable column; `None` when the id does not exist.
    pub async fn update_task(
        &self,
        id: i64,
        title: &str,
        completed: bool,
        user_id: Option<UserId>,
    ) -> Result<Option<StoredTask>> {
        let row = sqlx::query(&format!(
            "UPDATE todos
             SET title = ?, completed = ?, user_id = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(title)
        .bind(completed)
        .bind(user_id.map(|u| u.0))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update todo {id}"))?;
        row.as_ref().map(StoredTask::from_row).transpose()
    }

    pub async fn delete_task(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete todo {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_tasks(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM todos")
            .execute(&self.pool)
            .await
            .context("failed to clear todos")?;
        Ok(result.rows_affected())
    }
}

/// Creates the directory holding a file-backed database so the first
/// connection can create the file itself.
fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(parent) = sqlite_file_path(database_url).and_then(Path::parent) else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create directory '{}' for database '{database_url}'",
            parent.display()
        )
    })
}

/// File path of a `sqlite:` url; `None` for in-memory and non-sqlite urls.
fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
