//! User domain: models and directory lookups.

mod models;
mod repository;

pub use models::User;
pub use repository::{UserError, UserRepository};
