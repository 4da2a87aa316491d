use std::{collections::HashSet, fmt};

use shared::domain::{NewTask, Task, TaskId, UserId};
use uuid::Uuid;

/// Local stand-in id for a task whose create request has not resolved yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderId(Uuid);

impl PlaceholderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlaceholderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending-{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryId {
    Remote(TaskId),
    Placeholder(PlaceholderId),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Placeholder(id) => write!(f, "{id}"),
        }
    }
}

/// One row of the local list. Rows are replaced wholesale, never edited in
/// place, so a request in flight never observes a half-applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub id: EntryId,
    pub title: String,
    pub completed: bool,
    pub user_id: Option<UserId>,
    in_flight: bool,
}

impl TaskEntry {
    pub fn confirmed(task: Task) -> Self {
        Self {
            id: EntryId::Remote(task.id),
            title: task.title,
            completed: task.completed,
            user_id: task.user_id,
            in_flight: false,
        }
    }

    pub(crate) fn placeholder(id: PlaceholderId, task: &NewTask) -> Self {
        Self {
            id: EntryId::Placeholder(id),
            title: task.title.clone(),
            completed: task.completed,
            user_id: task.user_id,
            in_flight: true,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match &self.id {
            EntryId::Remote(id) => Some(id),
            EntryId::Placeholder(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.id, EntryId::Placeholder(_))
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// The wire record, for confirmed rows only.
    pub fn to_task(&self) -> Option<Task> {
        self.task_id().map(|id| Task {
            id: id.clone(),
            title: self.title.clone(),
            completed: self.completed,
            user_id: self.user_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Create,
    Toggle,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Create => "create",
            Self::Toggle => "toggle",
            Self::Delete => "delete",
        })
    }
}

/// User-visible record of the last failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub operation: Operation,
    pub message: String,
}

impl fmt::Display for FailureNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}

/// Published after every change to the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    Loaded { count: usize },
    Inserted { id: EntryId },
    Reconciled { placeholder: PlaceholderId, id: TaskId },
    Updated { id: TaskId },
    Removed { id: TaskId },
    RolledBack { operation: Operation },
    Failed(FailureNotice),
}

/// The local list. Ids with a request in flight are tracked apart from the
/// rows so a reload cannot clear them.
#[derive(Debug, Clone, Default)]
pub struct TaskList {
    entries: Vec<TaskEntry>,
    pending: HashSet<TaskId>,
    loaded: bool,
    generation: u64,
    notice: Option<FailureNotice>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loaded list holding `tasks`, deduplicated like a server load.
    pub fn loaded(tasks: Vec<Task>) -> Self {
        let mut list = Self::new();
        list.replace_all(tasks);
        list
    }

    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }

    /// Confirmed records in list order; placeholders are skipped.
    pub fn tasks(&self) -> Vec<Task> {
        self.entries.iter().filter_map(TaskEntry::to_task).collect()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn notice(&self) -> Option<&FailureNotice> {
        self.notice.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskEntry> {
        self.entries.iter().find(|e| e.task_id() == Some(id))
    }

    pub fn position(&self, id: &EntryId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }

    /// True while a toggle or delete for `id` has not resolved, even if the
    /// row itself is currently absent.
    pub fn is_pending(&self, id: &TaskId) -> bool {
        self.pending.contains(id)
    }

    /// Bumped by every reload.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces every confirmed row. Placeholders stay at the top and rows
    /// whose id is pending stay marked in flight. Later duplicates of an id
    /// are dropped so ids stay unique; returns how many were dropped.
    pub(crate) fn replace_all(&mut self, tasks: Vec<Task>) -> usize {
        let total = tasks.len();
        let mut entries: Vec<TaskEntry> = self
            .entries
            .drain(..)
            .filter(TaskEntry::is_placeholder)
            .collect();
        let kept = entries.len();
        for task in tasks {
            if entries.iter().any(|e| e.task_id() == Some(&task.id)) {
                continue;
            }
            let entry = self.adopt(TaskEntry::confirmed(task));
            entries.push(entry);
        }
        let dropped = total - (entries.len() - kept);
        self.entries = entries;
        self.loaded = true;
        self.generation += 1;
        dropped
    }

    pub(crate) fn prepend(&mut self, entry: TaskEntry) {
        let entry = self.adopt(entry);
        self.entries.insert(0, entry);
    }

    /// Inserts at `index`, clamped to the current length.
    pub(crate) fn insert_at(&mut self, index: usize, entry: TaskEntry) {
        let index = index.min(self.entries.len());
        let entry = self.adopt(entry);
        self.entries.insert(index, entry);
    }

    /// Swaps the row keyed by `id` for `entry`, returning the old row.
    pub(crate) fn replace(&mut self, id: &EntryId, entry: TaskEntry) -> Option<TaskEntry> {
        let index = self.position(id)?;
        let entry = self.adopt(entry);
        Some(std::mem::replace(&mut self.entries[index], entry))
    }

    pub(crate) fn remove(&mut self, id: &EntryId) -> Option<(usize, TaskEntry)> {
        let index = self.position(id)?;
        Some((index, self.entries.remove(index)))
    }

    /// Marks `id` as having a request in flight.
    pub(crate) fn mark_pending(&mut self, id: &TaskId) {
        self.pending.insert(id.clone());
        if let Some(entry) = self.entries.iter_mut().find(|e| e.task_id() == Some(id)) {
            entry.in_flight = true;
        }
    }

    /// Ends the request for `id`; returns false when none was pending.
    pub(crate) fn settle(&mut self, id: &TaskId) -> bool {
        let was_pending = self.pending.remove(id);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.task_id() == Some(id)) {
            entry.in_flight = false;
        }
        was_pending
    }

    pub(crate) fn record_failure(&mut self, notice: FailureNotice) {
        self.notice = Some(notice);
    }

    pub(crate) fn clear_notice(&mut self) {
        self.notice = None;
    }

    fn adopt(&self, mut entry: TaskEntry) -> TaskEntry {
        if let Some(id) = entry.task_id() {
            if self.pending.contains(id) {
                entry.in_flight = true;
            }
        }
        entry
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
