// taskorg - Task organizer over a single-table SQLite store

pub mod app;
pub mod clock;
pub mod config;
pub mod flow;
pub mod lock;
pub mod model;
pub mod store;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use config::Config;
pub use model::{Completion, NewTask, Task, TaskId, TaskStatus, TaskSummary};
pub use store::{Store, StoreError};
