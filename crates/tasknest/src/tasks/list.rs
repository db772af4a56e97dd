//! List-tasks action for the read path.

use tracing::instrument;

use super::error::TaskResult;
use super::models::Task;
use super::repository::TaskRepository;
use super::rollup;

/// Reads the full task list with rollup costs recomputed from scratch.
#[derive(Debug, Clone)]
pub struct ListTasks {
    tasks: TaskRepository,
}

impl ListTasks {
    /// Create a new list action.
    pub fn new(tasks: TaskRepository) -> Self {
        Self { tasks }
    }

    /// Fetch every task, with each task's reported cost replaced by its
    /// subtree total. No ordering guarantee.
    #[instrument(skip(self))]
    pub async fn run(&self) -> TaskResult<Vec<Task>> {
        let tasks = self.tasks.list().await?;
        Ok(rollup::recompute(tasks))
    }
}
