//! Task repository for database operations.

use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use super::error::TaskResult;
use super::models::Task;

const TASK_COLUMNS: &str =
    "id, title, created_by, completed, completed_by, parent_id, cost, total_cost";

/// Repository for task database operations.
#[derive(Debug, Clone)]
pub struct TaskRepository {
    pool: SqlitePool,
}

impl TaskRepository {
    /// Create a new task repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new task row.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn insert(&self, task: &Task) -> TaskResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, title, created_by, completed, completed_by, parent_id, cost, total_cost)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(task.created_by)
        .bind(task.completed)
        .bind(task.completed_by)
        .bind(task.parent_id)
        .bind(task.cost)
        .bind(task.total_cost)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a task by ID.
    #[instrument(skip(self))]
    pub async fn find(&self, id: Uuid) -> TaskResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(task)
    }

    /// Check that a task exists.
    #[instrument(skip(self))]
    pub async fn exists(&self, id: Uuid) -> TaskResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// List the whole task table.
    #[instrument(skip(self))]
    pub async fn list(&self) -> TaskResult<Vec<Task>> {
        let tasks =
            sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks"))
                .fetch_all(&self.pool)
                .await?;

        Ok(tasks)
    }

    /// Count all tasks.
    #[instrument(skip(self))]
    pub async fn count(&self) -> TaskResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Apply an additive delta to a task's persisted rollup total.
    #[instrument(skip(self))]
    pub async fn add_total_cost(&self, id: Uuid, delta: i64) -> TaskResult<()> {
        sqlx::query("UPDATE tasks SET total_cost = total_cost + ? WHERE id = ?")
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Update a task's mutable fields. Returns the number of rows touched.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn update_fields(&self, task: &Task) -> TaskResult<u64> {
        let result = sqlx::query(
            "UPDATE tasks SET title = ?, completed = ?, completed_by = ?, cost = ? WHERE id = ?",
        )
        .bind(&task.title)
        .bind(task.completed)
        .bind(task.completed_by)
        .bind(task.cost)
        .bind(task.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::user::UserRepository;

    async fn setup() -> (TaskRepository, i64) {
        let db = Database::in_memory().await.unwrap();
        let users = UserRepository::new(db.pool().clone());
        let user = users.find_or_create("tester").await.unwrap();
        (TaskRepository::new(db.pool().clone()), user.id)
    }

    fn sample_task(user_id: i64) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "write the report".to_string(),
            created_by: user_id,
            completed: false,
            completed_by: None,
            parent_id: None,
            cost: 5,
            total_cost: 5,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (repo, user_id) = setup().await;
        let task = sample_task(user_id);

        repo.insert(&task).await.unwrap();
        let found = repo.find(task.id).await.unwrap().unwrap();
        assert_eq!(found, task);
        assert!(repo.exists(task.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_total_cost_is_additive() {
        let (repo, user_id) = setup().await;
        let task = sample_task(user_id);
        repo.insert(&task).await.unwrap();

        repo.add_total_cost(task.id, 10).await.unwrap();
        repo.add_total_cost(task.id, 7).await.unwrap();

        let found = repo.find(task.id).await.unwrap().unwrap();
        assert_eq!(found.total_cost, task.total_cost + 17);
    }

    #[tokio::test]
    async fn test_update_fields_reports_rows() {
        let (repo, user_id) = setup().await;
        let mut task = sample_task(user_id);
        repo.insert(&task).await.unwrap();

        task.title = "write the final report".to_string();
        task.completed = true;
        task.completed_by = Some(user_id);
        assert_eq!(repo.update_fields(&task).await.unwrap(), 1);

        let missing = Task {
            id: Uuid::new_v4(),
            ..task
        };
        assert_eq!(repo.update_fields(&missing).await.unwrap(), 0);
    }
}
