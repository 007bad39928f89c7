// Multi-step input collection for adding and editing tasks
//
// Flows only gather and validate input. They never touch the store; the
// caller receives a finished value and decides what to do with it.

use crate::model::NewTask;
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Outcome of feeding one key to a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent<T> {
    /// Still collecting input
    Pending,
    Cancelled,
    Finished(T),
}

// ============================================================================
// Text input
// ============================================================================

/// Single-line editing buffer with a char-indexed cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self { value, cursor }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Apply an editing key; returns false for keys the input does not use
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let at = self.byte_index(self.cursor);
                self.value.insert(at, c);
                self.cursor += 1;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                let at = self.byte_index(self.cursor);
                self.value.remove(at);
            }
            KeyCode::Delete if self.cursor < self.len() => {
                let at = self.byte_index(self.cursor);
                self.value.remove(at);
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.len(),
            _ => return false,
        }
        true
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }
}

// ============================================================================
// Date picker
// ============================================================================

/// Calendar cursor with an optional "no deadline" state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePicker {
    today: NaiveDate,
    cursor: NaiveDate,
    enabled: bool,
}

impl DatePicker {
    /// The cursor starts on `today`
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            cursor: today,
            enabled: true,
        }
    }

    pub fn cursor(&self) -> NaiveDate {
        self.cursor
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The chosen deadline, `None` when the user opted out
    pub fn selection(&self) -> Option<NaiveDate> {
        self.enabled.then_some(self.cursor)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let moved = match key.code {
            KeyCode::Left => self.cursor.checked_sub_days(Days::new(1)),
            KeyCode::Right => self.cursor.checked_add_days(Days::new(1)),
            KeyCode::Up => self.cursor.checked_sub_days(Days::new(7)),
            KeyCode::Down => self.cursor.checked_add_days(Days::new(7)),
            KeyCode::PageUp => self.cursor.checked_sub_months(Months::new(1)),
            KeyCode::PageDown => self.cursor.checked_add_months(Months::new(1)),
            KeyCode::Home => Some(self.today),
            KeyCode::Delete | KeyCode::Backspace => {
                self.enabled = !self.enabled;
                return true;
            }
            _ => return false,
        };

        if let Some(date) = moved {
            self.cursor = date;
            self.enabled = true;
        }
        true
    }

    /// Weeks of the cursor's month, Monday first; `None` pads outside days
    pub fn month_grid(&self) -> Vec<[Option<u32>; 7]> {
        let first = self.cursor.with_day(1).unwrap_or(self.cursor);
        let offset = first.weekday().num_days_from_monday() as usize;
        let days = days_in_month(first);

        let mut weeks = Vec::new();
        let mut week = [None; 7];
        let mut slot = offset;
        for day in 1..=days {
            week[slot] = Some(day);
            slot += 1;
            if slot == 7 {
                weeks.push(week);
                week = [None; 7];
                slot = 0;
            }
        }
        if slot > 0 {
            weeks.push(week);
        }
        weeks
    }
}

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn days_in_month(first: NaiveDate) -> u32 {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

// ============================================================================
// Add flow
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStep {
    Title,
    Description,
    Deadline,
}

impl AddStep {
    pub fn label(&self) -> &'static str {
        match self {
            AddStep::Title => "Enter task",
            AddStep::Description => "Enter description for the task",
            AddStep::Deadline => "Pick a deadline",
        }
    }
}

/// Title, then description, then deadline; each step validates before advancing
#[derive(Debug, Clone)]
pub struct AddFlow {
    step: AddStep,
    title: TextInput,
    description: TextInput,
    deadline: DatePicker,
    error: Option<String>,
}

impl AddFlow {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            step: AddStep::Title,
            title: TextInput::default(),
            description: TextInput::default(),
            deadline: DatePicker::new(today),
            error: None,
        }
    }

    pub fn step(&self) -> AddStep {
        self.step
    }

    pub fn title(&self) -> &TextInput {
        &self.title
    }

    pub fn description(&self) -> &TextInput {
        &self.description
    }

    pub fn deadline(&self) -> &DatePicker {
        &self.deadline
    }

    /// Validation message for the current step, if the last attempt failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FlowEvent<NewTask> {
        match key.code {
            KeyCode::Esc => return FlowEvent::Cancelled,
            KeyCode::BackTab => {
                self.error = None;
                self.step = match self.step {
                    AddStep::Title | AddStep::Description => AddStep::Title,
                    AddStep::Deadline => AddStep::Description,
                };
                return FlowEvent::Pending;
            }
            KeyCode::Enter | KeyCode::Tab => return self.advance(),
            _ => {}
        }

        let used = match self.step {
            AddStep::Title => self.title.handle_key(key),
            AddStep::Description => self.description.handle_key(key),
            AddStep::Deadline => self.deadline.handle_key(key),
        };
        if used {
            self.error = None;
        }
        FlowEvent::Pending
    }

    fn advance(&mut self) -> FlowEvent<NewTask> {
        match self.step {
            AddStep::Title => {
                if self.title.value().trim().is_empty() {
                    self.error = Some("Task title cannot be empty".to_string());
                    return FlowEvent::Pending;
                }
                self.error = None;
                self.step = AddStep::Description;
                FlowEvent::Pending
            }
            AddStep::Description => {
                self.step = AddStep::Deadline;
                FlowEvent::Pending
            }
            AddStep::Deadline => {
                let description = self.description.value().trim();
                FlowEvent::Finished(NewTask {
                    title: self.title.value().trim().to_string(),
                    description: (!description.is_empty()).then(|| description.to_string()),
                    deadline: self.deadline.selection(),
                })
            }
        }
    }
}

// ============================================================================
// Edit flow
// ============================================================================

/// Single prompt pre-filled with the current title
#[derive(Debug, Clone)]
pub struct EditFlow {
    input: TextInput,
    error: Option<String>,
}

impl EditFlow {
    pub fn new(current_title: &str) -> Self {
        Self {
            input: TextInput::with_value(current_title),
            error: None,
        }
    }

    pub fn input(&self) -> &TextInput {
        &self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FlowEvent<String> {
        match key.code {
            KeyCode::Esc => FlowEvent::Cancelled,
            KeyCode::Enter => {
                let title = self.input.value().trim();
                if title.is_empty() {
                    self.error = Some("Task title cannot be empty".to_string());
                    return FlowEvent::Pending;
                }
                FlowEvent::Finished(title.to_string())
            }
            _ => {
                if self.input.handle_key(key) {
                    self.error = None;
                }
                FlowEvent::Pending
            }
        }
    }
}
