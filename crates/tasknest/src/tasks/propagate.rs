//! Incremental rollup maintenance: push a new subtree cost up the
//! ancestor chain as a persisted additive delta.

use tracing::{debug, instrument};
use uuid::Uuid;

use super::error::{TaskError, TaskResult};
use super::repository::TaskRepository;

/// Applies additive cost deltas to every ancestor of a newly inserted task.
///
/// This is the persisted counterpart of [`super::rollup::recompute`]: the
/// full recompute over the table must always equal the accumulated deltas
/// applied through this path.
#[derive(Debug, Clone)]
pub struct CostPropagation {
    repo: TaskRepository,
}

impl CostPropagation {
    /// Create a new cost propagation over the given repository.
    pub fn new(repo: TaskRepository) -> Self {
        Self { repo }
    }

    /// Add `delta` to the persisted total of `parent_id` and every ancestor
    /// above it, up to and including the root.
    ///
    /// No-op when there is no parent or the delta is zero. Fails with
    /// [`TaskError::ParentNotFound`] when a chain member is missing, and
    /// with [`TaskError::AncestryLoop`] when the walk exceeds the task
    /// count, which can only happen when the parent links form a loop.
    #[instrument(skip(self))]
    pub async fn apply_delta(&self, parent_id: Option<Uuid>, delta: i64) -> TaskResult<()> {
        let Some(start) = parent_id else {
            return Ok(());
        };
        if delta == 0 {
            return Ok(());
        }

        let max_depth = self.repo.count().await?;

        let mut current = start;
        let mut depth: i64 = 0;
        loop {
            depth += 1;
            if depth > max_depth {
                return Err(TaskError::AncestryLoop(start));
            }

            let task = self
                .repo
                .find(current)
                .await?
                .ok_or(TaskError::ParentNotFound(current))?;

            debug!(task_id = %task.id, delta, "updating ancestor total");
            self.repo.add_total_cost(task.id, delta).await?;

            match task.parent_id {
                Some(parent) => current = parent,
                None => return Ok(()),
            }
        }
    }
}
