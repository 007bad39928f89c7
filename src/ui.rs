// Rendering of the application state onto a ratatui frame

use crate::app::{AppState, Mode, Notice, TaskDetail};
use crate::flow::{AddFlow, AddStep, DatePicker, EditFlow, TextInput, WEEKDAYS};
use crate::model::TaskStatus;
use chrono::Datelike;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

const KEY_HINTS: [&str; 2] = [
    "a Add Task   e Edit Task   d Delete Task",
    "c Mark Completed   w Mark Still Working   Enter Details   q Quit",
];

pub fn render(frame: &mut Frame, state: &AppState) {
    let [header, list, hints, clock, completion, notice] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    frame.render_widget(
        Paragraph::new("Your Tasks")
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD)),
        header,
    );
    render_list(frame, state, list);
    frame.render_widget(
        Paragraph::new(KEY_HINTS.iter().map(|h| Line::from(*h)).collect::<Vec<_>>())
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Cyan)),
        hints,
    );
    frame.render_widget(Paragraph::new(state.clock.as_str()).alignment(Alignment::Center), clock);
    frame.render_widget(
        Paragraph::new(state.completion().to_string()).alignment(Alignment::Center),
        completion,
    );
    render_notice(frame, state.notice.as_ref(), notice);

    match &state.mode {
        Mode::Browse => {}
        Mode::Adding(flow) => render_add(frame, flow),
        Mode::Editing { flow, .. } => render_edit(frame, flow),
        Mode::Detail(detail) => render_detail(frame, detail),
        Mode::ConfirmDelete { title, .. } => render_confirm_delete(frame, title),
    }
}

fn status_style(status: TaskStatus) -> Style {
    match status {
        TaskStatus::Completed => Style::default().fg(Color::Black).bg(Color::Green),
        TaskStatus::StillWorking => Style::default().fg(Color::Black).bg(Color::Yellow),
    }
}

fn render_list(frame: &mut Frame, state: &AppState, area: Rect) {
    let items: Vec<ListItem> = state
        .tasks
        .iter()
        .map(|task| {
            let marker = if task.status.is_completed() { "[x] " } else { "[ ] " };
            ListItem::new(Line::from(vec![Span::raw(marker), Span::raw(task.title.as_str())]))
                .style(status_style(task.status))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED))
        .highlight_symbol("> ");

    let mut list_state = ListState::default().with_selected(state.selected);
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_notice(frame: &mut Frame, notice: Option<&Notice>, area: Rect) {
    let line = match notice {
        Some(Notice::Info(msg)) => Line::styled(msg.as_str(), Style::default().fg(Color::Cyan)),
        Some(Notice::Error(msg)) => Line::styled(msg.as_str(), Style::default().fg(Color::Red)),
        None => Line::default(),
    };
    frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

// ============================================================================
// Popups
// ============================================================================

fn popup(frame: &mut Frame, title: &str, width: u16, height: u16) -> Rect {
    let area = centered(frame.area(), width, height);
    frame.render_widget(Clear, area);
    let block = Block::default().title(format!(" {} ", title)).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    inner
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn input_line(input: &TextInput) -> Line<'static> {
    let chars: Vec<char> = input.value().chars().collect();
    let cursor = input.cursor().min(chars.len());
    let before: String = chars[..cursor].iter().collect();
    let at: String = chars.get(cursor).map(|c| c.to_string()).unwrap_or_else(|| " ".to_string());
    let after: String = chars.get(cursor + 1..).map(|rest| rest.iter().collect()).unwrap_or_default();

    Line::from(vec![
        Span::raw(before),
        Span::styled(at, Style::default().add_modifier(Modifier::REVERSED)),
        Span::raw(after),
    ])
}

fn error_line(error: Option<&str>) -> Line<'static> {
    match error {
        Some(msg) => Line::styled(msg.to_string(), Style::default().fg(Color::Red)),
        None => Line::default(),
    }
}

fn render_add(frame: &mut Frame, flow: &AddFlow) {
    let height = if flow.step() == AddStep::Deadline { 16 } else { 8 };
    let inner = popup(frame, "Add Task", 44, height);

    let mut lines = vec![Line::styled(
        format!("{}:", flow.step().label()),
        Style::default().add_modifier(Modifier::BOLD),
    )];

    match flow.step() {
        AddStep::Title => lines.push(input_line(flow.title())),
        AddStep::Description => lines.push(input_line(flow.description())),
        AddStep::Deadline => lines.extend(calendar_lines(flow.deadline())),
    }

    lines.push(error_line(flow.error()));
    lines.push(Line::styled(
        "Enter next   Shift+Tab back   Esc cancel",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(lines), inner);
}

fn calendar_lines(picker: &DatePicker) -> Vec<Line<'static>> {
    let cursor = picker.cursor();
    let mut lines = vec![
        Line::from(cursor.format("%B %Y").to_string()),
        Line::from(
            WEEKDAYS
                .iter()
                .map(|day| format!("{:>3}", &day.to_string()[..2]))
                .collect::<String>(),
        ),
    ];

    for week in picker.month_grid() {
        let spans: Vec<Span> = week
            .iter()
            .map(|slot| match slot {
                Some(day) => {
                    let mut style = Style::default();
                    if *day == cursor.day() {
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    if picker.today().year() == cursor.year()
                        && picker.today().month() == cursor.month()
                        && picker.today().day() == *day
                    {
                        style = style.add_modifier(Modifier::UNDERLINED);
                    }
                    Span::styled(format!("{:>3}", day), style)
                }
                None => Span::raw("   "),
            })
            .collect();
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(match picker.selection() {
        Some(date) => format!("Deadline: {}", date),
        None => "Deadline: none".to_string(),
    }));
    lines.push(Line::styled(
        "Arrows move   PgUp/PgDn month   Home today   Del none",
        Style::default().fg(Color::DarkGray),
    ));
    lines
}

fn render_edit(frame: &mut Frame, flow: &EditFlow) {
    let inner = popup(frame, "Edit Task", 44, 7);
    let lines = vec![
        Line::styled("Edit task:", Style::default().add_modifier(Modifier::BOLD)),
        input_line(flow.input()),
        error_line(flow.error()),
        Line::styled("Enter save   Esc cancel", Style::default().fg(Color::DarkGray)),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_detail(frame: &mut Frame, detail: &TaskDetail) {
    let inner = popup(frame, "Task Details", 50, 10);
    let lines = vec![
        Line::from(format!("Task: {}", detail.task.title)),
        Line::from(format!("Status: {}", detail.task.status)),
        Line::default(),
        Line::from(format!(
            "Description: {}",
            detail.description.as_deref().unwrap_or("(none)")
        )),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn render_confirm_delete(frame: &mut Frame, title: &str) {
    let inner = popup(frame, "Delete Task", 44, 4);
    frame.render_widget(
        Paragraph::new(format!("Delete \"{}\"? (y/n)", title)).wrap(Wrap { trim: true }),
        inner,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::handle_key;
    use crate::model::NewTask;
    use crate::store::Store;
    use chrono::NaiveDate;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{Terminal, backend::TestBackend};

    fn draw(state: &AppState) -> Terminal<TestBackend> {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|frame| render(frame, state)).unwrap();
        terminal
    }

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn find(terminal: &Terminal<TestBackend>, needle: &str) -> Option<(u16, u16)> {
        screen(terminal)
            .lines()
            .enumerate()
            .find_map(|(y, line)| {
                line.find(needle)
                    .map(|at| (line[..at].chars().count() as u16, y as u16))
            })
    }

    fn state_with(titles: &[(&str, TaskStatus)]) -> (AppState, Store) {
        let mut store = Store::open_in_memory().unwrap();
        for (title, status) in titles {
            let task = store.create(NewTask::new(*title)).unwrap();
            store.set_status(task.id, *status).unwrap();
        }
        let state = AppState::load(&store).unwrap();
        (state, store)
    }

    #[test]
    fn test_renders_heading_counter_and_clock() {
        let (mut state, _store) = state_with(&[("Buy milk", TaskStatus::Completed), ("Walk dog", TaskStatus::StillWorking)]);
        state.clock = "12:34:56".to_string();

        let text = screen(&draw(&state));
        assert!(text.contains("Your Tasks"));
        assert!(text.contains("[x] Buy milk"));
        assert!(text.contains("[ ] Walk dog"));
        assert!(text.contains("12:34:56"));
        assert!(text.contains("Complete tasks: 1/2"));
    }

    #[test]
    fn test_status_colours() {
        let (state, _store) = state_with(&[("Done one", TaskStatus::Completed), ("Open one", TaskStatus::StillWorking)]);
        let terminal = draw(&state);
        let buffer = terminal.backend().buffer();

        let (x, y) = find(&terminal, "Done one").unwrap();
        assert_eq!(buffer[(x, y)].bg, Color::Green);

        let (x, y) = find(&terminal, "Open one").unwrap();
        assert_eq!(buffer[(x, y)].bg, Color::Yellow);
    }

    #[test]
    fn test_renders_detail_popup() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .create(NewTask::new("Buy milk").description("2% milk, 1 gallon"))
            .unwrap();
        let mut state = AppState::load(&store).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        handle_key(&mut state, &mut store, KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), today);

        let text = screen(&draw(&state));
        assert!(text.contains("Task Details"));
        assert!(text.contains("Task: Buy milk"));
        assert!(text.contains("Description: 2% milk, 1 gallon"));
    }

    #[test]
    fn test_renders_calendar_step() {
        let (mut state, mut store) = state_with(&[]);
        let today = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        for code in [KeyCode::Char('a'), KeyCode::Char('x'), KeyCode::Enter, KeyCode::Enter] {
            handle_key(&mut state, &mut store, KeyEvent::new(code, KeyModifiers::NONE), today);
        }

        let text = screen(&draw(&state));
        assert!(text.contains("February 2024"));
        assert!(text.contains("Mo Tu We Th Fr Sa Su"));
        assert!(text.contains("Deadline: 2024-02-10"));
    }

    #[test]
    fn test_renders_error_notice() {
        let (mut state, _store) = state_with(&[]);
        state.notice = Some(Notice::Error("That task no longer exists".to_string()));

        let terminal = draw(&state);
        let (x, y) = find(&terminal, "That task no longer exists").unwrap();
        assert_eq!(terminal.backend().buffer()[(x, y)].fg, Color::Red);
    }

    #[test]
    fn test_small_terminal_does_not_panic() {
        let (mut state, mut store) = state_with(&[("Buy milk", TaskStatus::StillWorking)]);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        handle_key(&mut state, &mut store, KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE), today);

        let mut terminal = Terminal::new(TestBackend::new(20, 6)).unwrap();
        terminal.draw(|frame| render(frame, &state)).unwrap();
    }
}
