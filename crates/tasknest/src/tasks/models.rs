//! Task model types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single task in the forest.
///
/// `parent_id` is absent for root tasks. `cost` is the task's own cost;
/// `total_cost` is the persisted rollup (own cost plus all descendants)
/// maintained incrementally on the creation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub created_by: i64,
    pub completed: bool,
    pub completed_by: Option<i64>,
    pub parent_id: Option<Uuid>,
    pub cost: i64,
    pub total_cost: i64,
}

impl Task {
    /// Whether this task is a root of the forest.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
