// Application state and the key-driven actions that mutate it

use crate::flow::{AddFlow, EditFlow, FlowEvent};
use crate::model::{Completion, TaskId, TaskStatus, TaskSummary};
use crate::store::{self, Store, StoreError};
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, error, warn};

/// What the screen is currently showing on top of the list
#[derive(Debug, Clone)]
pub enum Mode {
    Browse,
    Adding(AddFlow),
    Editing { id: TaskId, flow: EditFlow },
    Detail(TaskDetail),
    ConfirmDelete { id: TaskId, title: String },
}

/// Data behind the details popup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDetail {
    pub task: TaskSummary,
    pub description: Option<String>,
}

/// One-line message under the list; errors never end the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// Everything the UI renders, owned by the controller
#[derive(Debug, Clone)]
pub struct AppState {
    /// Working set as last read from the store
    pub tasks: Vec<TaskSummary>,
    pub selected: Option<usize>,
    pub mode: Mode,
    pub notice: Option<Notice>,
    pub clock: String,
    pub should_quit: bool,
}

impl AppState {
    pub fn load(store: &Store) -> store::Result<Self> {
        let tasks = store.list_all()?;
        let selected = (!tasks.is_empty()).then_some(0);
        Ok(Self {
            tasks,
            selected,
            mode: Mode::Browse,
            notice: None,
            clock: String::new(),
            should_quit: false,
        })
    }

    /// Re-read the working set, keeping the cursor on the same task when it still exists
    pub fn reload(&mut self, store: &Store) -> store::Result<()> {
        let keep = self.selected_task().map(|t| t.id);
        self.reload_selecting(store, keep)
    }

    fn reload_selecting(&mut self, store: &Store, id: Option<TaskId>) -> store::Result<()> {
        let tasks = store.list_all()?;
        let previous = self.selected.unwrap_or(0);

        self.selected = id
            .and_then(|id| tasks.iter().position(|t| t.id == id))
            .or_else(|| (!tasks.is_empty()).then(|| previous.min(tasks.len() - 1)));
        self.tasks = tasks;

        debug!(count = self.tasks.len(), selected = ?self.selected, "Reloaded tasks");
        Ok(())
    }

    pub fn selected_task(&self) -> Option<&TaskSummary> {
        self.selected.and_then(|i| self.tasks.get(i))
    }

    pub fn completion(&self) -> Completion {
        Completion::of(&self.tasks)
    }

    pub fn select_next(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => (i + 1).min(self.tasks.len() - 1),
            None => 0,
        });
    }

    pub fn select_previous(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        self.selected = Some(self.selected.map_or(0, |i| i.saturating_sub(1)));
    }

    fn info(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice::Info(message.into()));
    }

    fn fail(&mut self, store: &Store, action: &str, err: StoreError) {
        if err.is_not_found() {
            warn!(action, error = %err, "Task vanished before the action ran");
            self.notice = Some(Notice::Error("That task no longer exists".to_string()));
            // The working set is stale; bring it back in line with the store
            if let Err(err) = self.reload(store) {
                error!(error = %err, "Failed to reload tasks");
            }
        } else {
            error!(action, error = %err, "Task action failed");
            self.notice = Some(Notice::Error(format!("Could not {}: {}", action, err)));
        }
    }
}

/// Route one key press to the handler for the current mode
pub fn handle_key(state: &mut AppState, store: &mut Store, key: KeyEvent, today: NaiveDate) {
    let mode = std::mem::replace(&mut state.mode, Mode::Browse);

    state.mode = match mode {
        Mode::Browse => {
            state.notice = None;
            browse(state, store, key, today)
        }
        Mode::Adding(mut flow) => match flow.handle_key(key) {
            FlowEvent::Pending => Mode::Adding(flow),
            FlowEvent::Cancelled => Mode::Browse,
            FlowEvent::Finished(new) => {
                match store.create(new) {
                    Ok(task) => {
                        state.info(format!("Added \"{}\"", task.title));
                        if let Err(err) = state.reload_selecting(store, Some(task.id)) {
                            state.fail(store, "reload tasks", err);
                        }
                    }
                    Err(err) => state.fail(store, "add task", err),
                }
                Mode::Browse
            }
        },
        Mode::Editing { id, mut flow } => match flow.handle_key(key) {
            FlowEvent::Pending => Mode::Editing { id, flow },
            FlowEvent::Cancelled => Mode::Browse,
            FlowEvent::Finished(title) => {
                let outcome = store.rename(id, &title).map(|_| format!("Renamed to \"{}\"", title));
                finish(state, store, "edit task", outcome);
                Mode::Browse
            }
        },
        Mode::Detail(_) => Mode::Browse,
        Mode::ConfirmDelete { id, title } => {
            if let KeyCode::Char('y') | KeyCode::Char('Y') = key.code {
                let outcome = store.delete(id).map(|_| format!("Deleted \"{}\"", title));
                finish(state, store, "delete task", outcome);
            }
            Mode::Browse
        }
    };
}

fn browse(state: &mut AppState, store: &mut Store, key: KeyEvent, today: NaiveDate) -> Mode {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => state.should_quit = true,
        KeyCode::Down | KeyCode::Char('j') => state.select_next(),
        KeyCode::Up | KeyCode::Char('k') => state.select_previous(),
        KeyCode::Char('a') => return Mode::Adding(AddFlow::new(today)),
        _ => {}
    }

    let Some(task) = state.selected_task().cloned() else {
        return Mode::Browse;
    };

    match key.code {
        KeyCode::Char('e') => Mode::Editing {
            id: task.id,
            flow: EditFlow::new(&task.title),
        },
        KeyCode::Char('d') => Mode::ConfirmDelete {
            id: task.id,
            title: task.title,
        },
        KeyCode::Char('c') => {
            mark(state, store, &task, TaskStatus::Completed);
            Mode::Browse
        }
        KeyCode::Char('w') => {
            mark(state, store, &task, TaskStatus::StillWorking);
            Mode::Browse
        }
        KeyCode::Enter => match store.description(task.id) {
            Ok(description) => Mode::Detail(TaskDetail { task, description }),
            Err(err) => {
                state.fail(store, "show task", err);
                Mode::Browse
            }
        },
        _ => Mode::Browse,
    }
}

fn mark(state: &mut AppState, store: &mut Store, task: &TaskSummary, status: TaskStatus) {
    let message = match status {
        TaskStatus::Completed => format!("Completed \"{}\"", task.title),
        TaskStatus::StillWorking => format!("Still working on \"{}\"", task.title),
    };
    let outcome = store.set_status(task.id, status).map(|_| message);
    finish(state, store, "update status", outcome);
}

fn finish(state: &mut AppState, store: &Store, action: &str, outcome: store::Result<String>) {
    match outcome {
        Ok(message) => {
            state.info(message);
            // The write is committed even if the list cannot be refreshed
            if let Err(err) = state.reload(store) {
                state.fail(store, "reload tasks", err);
            }
        }
        Err(err) => state.fail(store, action, err),
    }
}
