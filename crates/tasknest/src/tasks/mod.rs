//! Task domain: the task forest, cost rollups, and the create/update/list
//! actions driven by both the REST layer and the live-sync hub.

mod error;
mod list;
mod models;
mod propagate;
mod repository;
pub mod rollup;
mod store;
mod update;

pub use error::{TaskError, TaskResult};
pub use list::ListTasks;
pub use models::Task;
pub use propagate::CostPropagation;
pub use repository::TaskRepository;
pub use store::StoreTask;
pub use update::UpdateTask;
