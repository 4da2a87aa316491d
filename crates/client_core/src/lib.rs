//! Client side of the task tracker: a typed client for the remote todo
//! collection, the in-memory task list, and the synchronization core that
//! keeps the two consistent under load/create/toggle/delete.

pub mod error;
pub mod state;
pub mod sync;
pub mod transport;

pub use error::{NetworkError, SyncError};
pub use state::{
    EntryId, FailureNotice, ListEvent, Operation, PlaceholderId, TaskEntry, TaskList,
};
pub use sync::{SyncMode, SyncOptions, TaskListSync};
pub use transport::{HttpTodoApi, TodoApi, PUBLIC_MOCK_API};
