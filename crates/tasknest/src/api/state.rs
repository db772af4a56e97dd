//! Application state shared across handlers.

use std::sync::Arc;

use crate::tasks::{ListTasks, StoreTask};
use crate::user::UserRepository;
use crate::ws::ConnectionHub;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// User directory.
    pub users: UserRepository,
    /// Create-task action.
    pub store: StoreTask,
    /// List-tasks action (rollup read path).
    pub list: ListTasks,
    /// Hub for live sessions.
    pub hub: Arc<ConnectionHub>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        users: UserRepository,
        store: StoreTask,
        list: ListTasks,
        hub: Arc<ConnectionHub>,
    ) -> Self {
        Self {
            users,
            store,
            list,
            hub,
        }
    }
}
