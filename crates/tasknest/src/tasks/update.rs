//! Update-task action.

use tracing::{info, instrument};

use super::error::{TaskError, TaskResult};
use super::models::Task;
use super::repository::TaskRepository;

/// Applies edits to an existing task.
///
/// Completing a task records who completed it; any other edit clears the
/// completion attribution. Ancestor totals are not adjusted here; the read
/// path recomputes rollups from scratch.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    tasks: TaskRepository,
}

impl UpdateTask {
    /// Create a new update action.
    pub fn new(tasks: TaskRepository) -> Self {
        Self { tasks }
    }

    /// Persist `task`'s title, completion state and cost.
    ///
    /// Fails with [`TaskError::NothingUpdated`] when no task with that id
    /// exists.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn run(&self, mut task: Task, acting_user: i64) -> TaskResult<()> {
        task.completed_by = task.completed.then_some(acting_user);

        let rows = self.tasks.update_fields(&task).await?;
        if rows == 0 {
            return Err(TaskError::NothingUpdated);
        }

        info!(task_id = %task.id, completed = task.completed, "updated task");
        Ok(())
    }
}
