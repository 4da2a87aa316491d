use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::domain::{normalize_title, NewTask, Task, TaskId, UserId};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{
    error::SyncError,
    state::{EntryId, FailureNotice, ListEvent, Operation, PlaceholderId, TaskEntry, TaskList},
    transport::TodoApi,
};

const EVENT_CAPACITY: usize = 256;

/// How mutations reach the list.
///
/// `Optimistic` applies the change locally first and rolls it back when the
/// server rejects it. `Synchronized` waits for the server and applies only the
/// confirmed record; it also shows the loaded list newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Optimistic,
    #[default]
    Synchronized,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Optimistic => "optimistic",
            Self::Synchronized => "synchronized",
        })
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "synchronized" | "sync" => Ok(Self::Synchronized),
            other => Err(format!(
                "unknown sync mode '{other}', expected 'optimistic' or 'synchronized'"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Sent as `_limit` on load.
    pub limit: Option<u32>,
    /// Owner stamped on created tasks.
    pub user_id: Option<UserId>,
}

pub struct TaskListSync {
    api: Arc<dyn TodoApi>,
    options: SyncOptions,
    list: RwLock<TaskList>,
    events: broadcast::Sender<ListEvent>,
}

impl TaskListSync {
    pub fn new(api: Arc<dyn TodoApi>, options: SyncOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            options,
            list: RwLock::new(TaskList::new()),
            events,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.options.mode
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> TaskList {
        self.list.read().await.clone()
    }

    /// Fetches the collection and replaces the local list with it.
    pub async fn load(&self) -> Result<usize, SyncError> {
        let mut tasks = match self.api.list(self.options.limit).await {
            Ok(tasks) => tasks,
            Err(err) => return Err(self.fail(Operation::Load, err.into()).await),
        };
        if self.options.mode == SyncMode::Synchronized {
            tasks.reverse();
        }

        let (count, dropped) = {
            let mut list = self.list.write().await;
            let dropped = list.replace_all(tasks);
            list.clear_notice();
            (list.len(), dropped)
        };
        if dropped > 0 {
            warn!(dropped, "server returned duplicate task ids; kept the first of each");
        }
        info!(count, mode = %self.options.mode, "task list loaded");
        self.emit(ListEvent::Loaded { count });
        Ok(count)
    }

    pub async fn create(&self, title: &str) -> Result<Task, SyncError> {
        let Some(title) = normalize_title(title) else {
            return Err(self.fail(Operation::Create, SyncError::EmptyTitle).await);
        };
        let request = NewTask::new(title, self.options.user_id);

        let (placeholder, generation) = {
            let mut list = self.list.write().await;
            let placeholder = match self.options.mode {
                SyncMode::Optimistic => {
                    let id = PlaceholderId::new();
                    list.prepend(TaskEntry::placeholder(id, &request));
                    Some(id)
                }
                SyncMode::Synchronized => None,
            };
            (placeholder, list.generation())
        };
        if let Some(id) = placeholder {
            self.emit(ListEvent::Inserted {
                id: EntryId::Placeholder(id),
            });
        }

        let outcome = self.api.create(&request).await;

        let mut list = self.list.write().await;
        let created = match outcome {
            Ok(task) => match list.get(&task.id) {
                None => Ok((task, false)),
                // a reload that landed after the server stored the record
                Some(listed)
                    if list.generation() != generation && listed.title == task.title =>
                {
                    Ok((task, true))
                }
                Some(_) => Err(SyncError::ConflictingId(task.id)),
            },
            Err(err) => Err(err.into()),
        };

        let (task, already_listed) = match created {
            Ok(created) => created,
            Err(err) => {
                if let Some(id) = placeholder {
                    list.remove(&EntryId::Placeholder(id));
                }
                drop(list);
                if placeholder.is_some() {
                    self.emit(ListEvent::RolledBack {
                        operation: Operation::Create,
                    });
                }
                return Err(self.fail(Operation::Create, err).await);
            }
        };

        let entry = TaskEntry::confirmed(task.clone());
        let key = EntryId::Remote(task.id.clone());
        let reconciled = if already_listed {
            if let Some(id) = placeholder {
                list.remove(&EntryId::Placeholder(id));
            }
            list.replace(&key, entry);
            placeholder
        } else {
            let reconciled = match placeholder {
                Some(id) => list
                    .replace(&EntryId::Placeholder(id), entry.clone())
                    .map(|_| id),
                None => None,
            };
            if reconciled.is_none() {
                list.prepend(entry);
            }
            reconciled
        };
        list.clear_notice();
        drop(list);

        info!(task_id = %task.id, "task created");
        match (reconciled, already_listed) {
            (Some(placeholder), _) => self.emit(ListEvent::Reconciled {
                placeholder,
                id: task.id.clone(),
            }),
            (None, true) => self.emit(ListEvent::Updated {
                id: task.id.clone(),
            }),
            (None, false) => self.emit(ListEvent::Inserted { id: key }),
        }
        Ok(task)
    }

    /// Flips `completed` on the task with `id` and submits the new record.
    pub async fn toggle(&self, id: &TaskId) -> Result<Task, SyncError> {
        let (original, generation) = match self.begin(id).await {
            Ok(Some(started)) => started,
            Ok(None) => {
                return Err(self
                    .fail(Operation::Toggle, SyncError::UnknownTask(id.clone()))
                    .await)
            }
            Err(err) => return Err(self.fail(Operation::Toggle, err).await),
        };
        let key = EntryId::Remote(id.clone());
        let desired = original.toggled();

        if self.options.mode == SyncMode::Optimistic {
            self.list
                .write()
                .await
                .replace(&key, TaskEntry::confirmed(desired.clone()));
            self.emit(ListEvent::Updated { id: id.clone() });
        }

        let outcome = self.api.update(&desired).await;

        let mut list = self.list.write().await;
        match outcome {
            Ok(mut confirmed) => {
                if &confirmed.id != id {
                    warn!(task_id = %id, returned = %confirmed.id, "server changed task id on update; keeping local id");
                    confirmed.id = id.clone();
                }
                list.replace(&key, TaskEntry::confirmed(confirmed.clone()));
                list.settle(id);
                list.clear_notice();
                drop(list);
                info!(task_id = %id, completed = confirmed.completed, "task toggled");
                self.emit(ListEvent::Updated { id: id.clone() });
                Ok(confirmed)
            }
            Err(err) => {
                // after a reload the row already shows the server's record
                let rolled_back = self.options.mode == SyncMode::Optimistic
                    && list.generation() == generation
                    && list.replace(&key, TaskEntry::confirmed(original)).is_some();
                list.settle(id);
                drop(list);
                if rolled_back {
                    self.emit(ListEvent::RolledBack {
                        operation: Operation::Toggle,
                    });
                }
                Err(self.fail(Operation::Toggle, err.into()).await)
            }
        }
    }

    /// Removes the task with `id`. Unknown ids are a no-op and return `None`.
    pub async fn delete(&self, id: &TaskId) -> Result<Option<Task>, SyncError> {
        let (original, generation) = match self.begin(id).await {
            Ok(Some(started)) => started,
            Ok(None) => {
                debug!(task_id = %id, "delete of unknown task ignored");
                return Ok(None);
            }
            Err(err) => return Err(self.fail(Operation::Delete, err).await),
        };
        let key = EntryId::Remote(id.clone());

        let removed_at = match self.options.mode {
            SyncMode::Optimistic => {
                let removed = self.list.write().await.remove(&key).map(|(index, _)| index);
                self.emit(ListEvent::Removed { id: id.clone() });
                removed
            }
            SyncMode::Synchronized => None,
        };

        let outcome = match self.api.delete(id).await {
            Err(err) if err.is_not_found() => {
                debug!(task_id = %id, "task already gone on the server");
                Ok(())
            }
            other => other,
        };

        let mut list = self.list.write().await;
        match outcome {
            Ok(()) => {
                // also drops a row a reload brought back meanwhile
                let removed = list.remove(&key).is_some();
                list.settle(id);
                list.clear_notice();
                drop(list);
                info!(task_id = %id, "task deleted");
                if removed {
                    self.emit(ListEvent::Removed { id: id.clone() });
                }
                Ok(Some(original))
            }
            Err(err) => {
                let restored = match removed_at {
                    Some(index)
                        if list.generation() == generation && list.get(id).is_none() =>
                    {
                        list.insert_at(index, TaskEntry::confirmed(original));
                        true
                    }
                    _ => false,
                };
                list.settle(id);
                drop(list);
                if restored {
                    self.emit(ListEvent::RolledBack {
                        operation: Operation::Delete,
                    });
                }
                Err(self.fail(Operation::Delete, err.into()).await)
            }
        }
    }

    /// Marks `id` as pending and returns its record with the current list
    /// generation, or `None` when the id is not in the list.
    async fn begin(&self, id: &TaskId) -> Result<Option<(Task, u64)>, SyncError> {
        let mut list = self.list.write().await;
        if list.is_pending(id) {
            return Err(SyncError::Busy(id.clone()));
        }
        let Some(task) = list.get(id).and_then(TaskEntry::to_task) else {
            return Ok(None);
        };
        list.mark_pending(id);
        Ok(Some((task, list.generation())))
    }

    async fn fail(&self, operation: Operation, err: SyncError) -> SyncError {
        warn!(%operation, error = %err, "task list operation failed");
        let notice = FailureNotice {
            operation,
            message: err.to_string(),
        };
        self.list.write().await.record_failure(notice.clone());
        self.emit(ListEvent::Failed(notice));
        err
    }

    fn emit(&self, event: ListEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
