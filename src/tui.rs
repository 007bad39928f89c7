// Terminal setup and the interactive event loop

use crate::app::{self, AppState};
use crate::clock::{Clock, Ticker};
use crate::store::Store;
use crate::ui;
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use eyre::{Context, Result};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Restores the terminal however the loop exits
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Run the interactive task list until the user quits
pub fn run(store: &mut Store, clock: &Clock, tick: Duration) -> Result<()> {
    let mut state = AppState::load(store).context("Failed to load tasks")?;
    state.clock = clock.now();

    enable_raw_mode().context("Failed to enable raw mode")?;
    let _guard = TerminalGuard;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    info!(tasks = state.tasks.len(), "Starting interactive session");
    event_loop(&mut terminal, store, &mut state, clock, tick)?;
    terminal.show_cursor()?;

    Ok(())
}

fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    store: &mut Store,
    state: &mut AppState,
    clock: &Clock,
    tick: Duration,
) -> Result<()> {
    let mut ticker = Ticker::new(tick, Instant::now());

    loop {
        terminal.draw(|frame| ui::render(frame, state))?;

        let timeout = ticker.timeout(Instant::now()).unwrap_or(tick);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app::handle_key(state, store, key, Local::now().date_naive());
                }
            }
        }

        if ticker.poll(Instant::now()) {
            state.clock = clock.now();
        }

        if state.should_quit {
            ticker.cancel();
            debug!("Clock ticker cancelled");
            info!("Leaving interactive session");
            return Ok(());
        }
    }
}
