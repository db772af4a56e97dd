//! Test utilities and common setup.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tasknest::api::{self, AppState};
use tasknest::db::Database;
use tasknest::tasks::{ListTasks, StoreTask, TaskRepository, UpdateTask};
use tasknest::user::UserRepository;
use tasknest::ws::ConnectionHub;

/// Build an application router over the given database.
pub fn build_app(db: &Database) -> Router {
    let users = UserRepository::new(db.pool().clone());
    let tasks = TaskRepository::new(db.pool().clone());
    let store = StoreTask::new(tasks.clone(), users.clone());
    let update = UpdateTask::new(tasks.clone());
    let list = ListTasks::new(tasks);

    let hub = Arc::new(ConnectionHub::new(store.clone(), update, users.clone()));
    let state = AppState::new(users, store, list, hub);
    api::create_router(state)
}

/// Create a test application backed by an in-memory database.
pub async fn test_app() -> Router {
    let db = Database::in_memory().await.unwrap();
    build_app(&db)
}

/// Serve a test application on an ephemeral port.
///
/// Returns the bound address and the database behind the app so tests can
/// seed users and inspect persisted state.
pub async fn spawn_test_server() -> (SocketAddr, Database) {
    let db = Database::in_memory().await.unwrap();
    let app = build_app(&db);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, db)
}
