// Task store backed by a single SQLite table

use crate::model::{NewTask, Task, TaskId, TaskStatus, TaskSummary};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SCHEMA_VERSION: i64 = 1;

const CREATE_TASKS: &str = r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        deadline DATE,
        status TEXT NOT NULL DEFAULT 'still_working'
    );
"#;

const INSERT_TASK: &str = "INSERT INTO tasks (title, description, deadline, status) VALUES (?1, ?2, ?3, ?4)";
const SELECT_SUMMARIES: &str = "SELECT id, title, status FROM tasks ORDER BY id";
const SELECT_TASKS: &str = "SELECT id, title, description, deadline, status FROM tasks ORDER BY id";
const SELECT_TASK: &str = "SELECT id, title, description, deadline, status FROM tasks WHERE id = ?1";
const SELECT_DESCRIPTION: &str = "SELECT description FROM tasks WHERE id = ?1";
const UPDATE_STATUS: &str = "UPDATE tasks SET status = ?1 WHERE id = ?2";
const UPDATE_TITLE: &str = "UPDATE tasks SET title = ?1 WHERE id = ?2";
const DELETE_TASK: &str = "DELETE FROM tasks WHERE id = ?1";
const NORMALIZE_STATUS: &str =
    "UPDATE tasks SET status = 'still_working' WHERE status IS NULL OR status NOT IN ('still_working', 'completed')";

/// Failures surfaced by the task store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database could not be read or written
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A write was rejected because it breaks a table constraint
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The targeted task no longer exists
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("failed to prepare {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    fn from_write(err: rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            StoreError::Constraint(err.to_string())
        } else {
            StoreError::Storage(err)
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Durable storage for task records
pub struct Store {
    path: Option<PathBuf>,
    db: Connection,
}

impl Store {
    /// Open or create the task database at the given file path
    ///
    /// Missing parent directories are created. The schema is initialized (and
    /// migrated, for files written by older versions) before returning.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let db = Connection::open(path)?;
        let mut store = Self {
            path: Some(path.to_path_buf()),
            db,
        };
        store.initialize()?;

        info!(path = %path.display(), "Opened task store");
        Ok(store)
    }

    /// Open a throwaway store that lives only as long as the value
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        let mut store = Self { path: None, db };
        store.initialize()?;
        Ok(store)
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    /// File backing this store, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Ensure the tasks table exists with every expected column
    ///
    /// Safe to call any number of times. Existing rows are only touched to
    /// fill defaults for added columns and to reset a missing or unknown
    /// status to `still_working`.
    pub fn initialize(&mut self) -> Result<()> {
        debug!("Initializing task schema");

        let tx = self.db.transaction()?;
        tx.execute_batch(CREATE_TASKS)?;

        let columns = Self::table_columns(&tx)?;

        if !columns.contains("title") {
            if columns.contains("task") {
                info!("Renaming legacy `task` column to `title`");
                tx.execute_batch("ALTER TABLE tasks RENAME COLUMN task TO title")?;
            } else {
                info!("Adding missing `title` column");
                tx.execute_batch("ALTER TABLE tasks ADD COLUMN title TEXT NOT NULL DEFAULT ''")?;
            }
        }
        if !columns.contains("description") {
            info!("Adding missing `description` column");
            tx.execute_batch("ALTER TABLE tasks ADD COLUMN description TEXT")?;
        }
        if !columns.contains("deadline") {
            info!("Adding missing `deadline` column");
            tx.execute_batch("ALTER TABLE tasks ADD COLUMN deadline DATE")?;
        }
        if !columns.contains("status") {
            info!("Adding missing `status` column");
            tx.execute_batch("ALTER TABLE tasks ADD COLUMN status TEXT NOT NULL DEFAULT 'still_working'")?;
        }

        // Older files may carry a nullable status column or stray values
        let normalized = tx.execute(NORMALIZE_STATUS, [])?;
        if normalized > 0 {
            warn!(rows = normalized, "Reset unrecognised task status to still_working");
        }

        tx.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
        tx.commit()?;

        Ok(())
    }

    /// Schema version recorded in the database header
    pub fn schema_version(&self) -> Result<i64> {
        Ok(self.db.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn table_columns(db: &Connection) -> Result<HashSet<String>> {
        let mut stmt = db.prepare("PRAGMA table_info(tasks)")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(columns)
    }

    // ========================================================================
    // Task operations
    // ========================================================================

    /// Insert a new task; its status starts as `still_working`
    pub fn create(&mut self, new: NewTask) -> Result<Task> {
        if new.title.trim().is_empty() {
            return Err(StoreError::Constraint("task title cannot be empty".to_string()));
        }

        self.db
            .execute(
                INSERT_TASK,
                params![new.title, new.description, new.deadline, TaskStatus::StillWorking],
            )
            .map_err(StoreError::from_write)?;

        let id = TaskId(self.db.last_insert_rowid());
        debug!(%id, title = %new.title, "Created task");

        Ok(Task {
            id,
            title: new.title,
            description: new.description,
            deadline: new.deadline,
            status: TaskStatus::StillWorking,
        })
    }

    /// Every task as (id, title, status), in storage order
    pub fn list_all(&self) -> Result<Vec<TaskSummary>> {
        let mut stmt = self.db.prepare(SELECT_SUMMARIES)?;
        let tasks = stmt
            .query_map([], |row| {
                Ok(TaskSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    status: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Every task with all fields, in storage order
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self.db.prepare(SELECT_TASKS)?;
        let tasks = stmt
            .query_map([], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    pub fn get(&self, id: TaskId) -> Result<Task> {
        self.db
            .query_row(SELECT_TASK, [id], task_from_row)
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    pub fn description(&self, id: TaskId) -> Result<Option<String>> {
        self.db
            .query_row(SELECT_DESCRIPTION, [id], |row| row.get::<_, Option<String>>(0))
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    pub fn set_status(&mut self, id: TaskId, status: TaskStatus) -> Result<()> {
        let changed = self
            .db
            .execute(UPDATE_STATUS, params![status, id])
            .map_err(StoreError::from_write)?;
        Self::expect_one(changed, id)?;

        debug!(%id, %status, "Updated task status");
        Ok(())
    }

    /// Change only the title; status, description and deadline are kept
    pub fn rename(&mut self, id: TaskId, title: &str) -> Result<()> {
        let changed = self
            .db
            .execute(UPDATE_TITLE, params![title, id])
            .map_err(StoreError::from_write)?;
        Self::expect_one(changed, id)?;

        debug!(%id, title, "Renamed task");
        Ok(())
    }

    /// Remove a task permanently
    pub fn delete(&mut self, id: TaskId) -> Result<()> {
        let changed = self.db.execute(DELETE_TASK, [id])?;
        Self::expect_one(changed, id)?;

        debug!(%id, "Deleted task");
        Ok(())
    }

    fn expect_one(changed: usize, id: TaskId) -> Result<()> {
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        deadline: row.get(3)?,
        status: row.get(4)?,
    })
}
