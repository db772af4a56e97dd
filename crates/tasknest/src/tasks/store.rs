//! Create-task action.

use tracing::{info, instrument};

use super::error::{TaskError, TaskResult};
use super::models::Task;
use super::propagate::CostPropagation;
use super::repository::TaskRepository;
use crate::user::UserRepository;

/// Stores a new task after validating its references, then pushes the new
/// cost up the ancestor chain.
#[derive(Debug, Clone)]
pub struct StoreTask {
    tasks: TaskRepository,
    users: UserRepository,
    propagation: CostPropagation,
}

impl StoreTask {
    /// Create a new store action.
    pub fn new(tasks: TaskRepository, users: UserRepository) -> Self {
        let propagation = CostPropagation::new(tasks.clone());
        Self {
            tasks,
            users,
            propagation,
        }
    }

    /// Validate and persist `task`.
    ///
    /// The creating user must exist, and the parent, when given, must
    /// reference an existing task. The task starts with its rollup total
    /// equal to its own cost; ancestors receive the cost as an additive
    /// delta. A propagation failure fails the whole action.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn run(&self, mut task: Task) -> TaskResult<()> {
        let user_known = self
            .users
            .exists(task.created_by)
            .await
            .map_err(|err| match err {
                crate::user::UserError::Database(e) => TaskError::Database(e),
                crate::user::UserError::NotFound(_) => TaskError::UserNotFound(task.created_by),
            })?;
        if !user_known {
            return Err(TaskError::UserNotFound(task.created_by));
        }

        if let Some(parent_id) = task.parent_id {
            if !self.tasks.exists(parent_id).await? {
                return Err(TaskError::ParentNotFound(parent_id));
            }
        }

        task.total_cost = task.cost;
        self.tasks.insert(&task).await?;

        self.propagation
            .apply_delta(task.parent_id, task.cost)
            .await?;

        info!(task_id = %task.id, created_by = task.created_by, "stored task");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::tasks::rollup;
    use uuid::Uuid;

    async fn setup() -> (StoreTask, TaskRepository, UserRepository) {
        let db = Database::in_memory().await.unwrap();
        let tasks = TaskRepository::new(db.pool().clone());
        let users = UserRepository::new(db.pool().clone());
        (StoreTask::new(tasks.clone(), users.clone()), tasks, users)
    }

    fn new_task(user_id: i64, parent_id: Option<Uuid>, cost: i64) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "plan the sprint".to_string(),
            created_by: user_id,
            completed: false,
            completed_by: None,
            parent_id,
            cost,
            total_cost: 0,
        }
    }

    #[tokio::test]
    async fn test_store_task() {
        let (store, tasks, users) = setup().await;
        let user = users.find_or_create("alice").await.unwrap();

        let task = new_task(user.id, None, 8);
        store.run(task.clone()).await.unwrap();

        let stored = tasks.find(task.id).await.unwrap().unwrap();
        assert_eq!(stored.title, task.title);
        assert_eq!(stored.total_cost, 8);
    }

    #[tokio::test]
    async fn test_store_without_user_fails() {
        let (store, tasks, _users) = setup().await;

        let task = new_task(42, None, 1);
        let err = store.run(task.clone()).await.unwrap_err();

        assert!(matches!(err, TaskError::UserNotFound(42)));
        assert!(tasks.find(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_with_missing_parent_fails() {
        let (store, _tasks, users) = setup().await;
        let user = users.find_or_create("alice").await.unwrap();

        let task = new_task(user.id, Some(Uuid::new_v4()), 1);
        let err = store.run(task).await.unwrap_err();

        assert!(matches!(err, TaskError::ParentNotFound(_)));
    }

    #[tokio::test]
    async fn test_store_updates_ancestor_totals() {
        let (store, tasks, users) = setup().await;
        let user = users.find_or_create("alice").await.unwrap();

        let root = new_task(user.id, None, 0);
        let mid = new_task(user.id, Some(root.id), 10);
        let leaf = new_task(user.id, Some(mid.id), 33);
        store.run(root.clone()).await.unwrap();
        store.run(mid.clone()).await.unwrap();
        store.run(leaf.clone()).await.unwrap();

        assert_eq!(tasks.find(root.id).await.unwrap().unwrap().total_cost, 43);
        assert_eq!(tasks.find(mid.id).await.unwrap().unwrap().total_cost, 43);
        assert_eq!(tasks.find(leaf.id).await.unwrap().unwrap().total_cost, 33);
    }

    /// The persisted incremental totals must agree with a from-scratch
    /// recompute over the full table.
    #[tokio::test]
    async fn test_incremental_totals_match_recompute() {
        let (store, tasks, users) = setup().await;
        let user = users.find_or_create("alice").await.unwrap();

        let root = new_task(user.id, None, 2);
        let a = new_task(user.id, Some(root.id), 10);
        let b = new_task(user.id, Some(root.id), 4);
        let a1 = new_task(user.id, Some(a.id), 7);
        for task in [&root, &a, &b, &a1] {
            store.run(task.clone()).await.unwrap();
        }

        let table = tasks.list().await.unwrap();
        let recomputed = rollup::recompute(table.clone());
        for task in &table {
            let expected = recomputed.iter().find(|t| t.id == task.id).unwrap();
            assert_eq!(task.total_cost, expected.cost, "task {}", task.id);
        }
    }
}
