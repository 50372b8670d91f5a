//! Dashboard lifecycle: terminal setup, the event-driven render loop, and
//! cleanup.

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::UnboundedReceiver;

use super::display_mode::DisplayMode;
use super::renderer::render_frame;
use super::state::DashboardState;
use crate::progress::ProgressEvent;
use crate::sampler::CancelToken;

/// How often the loop polls for keyboard input between events.
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Controller for the live dashboard.
///
/// In Silent and Json modes every terminal operation is a no-op; the
/// controller still drains progress events so the orchestrator never
/// blocks on a full channel.
pub struct TuiController {
    mode: DisplayMode,
    state: DashboardState,
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    initialized: bool,
}

impl TuiController {
    pub fn new(mode: DisplayMode, server_label: String) -> Self {
        TuiController {
            mode,
            state: DashboardState::new(server_label),
            terminal: None,
            initialized: false,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn set_network_label(&mut self, label: String) {
        self.state.network_label = Some(label);
    }

    /// Enter the alternate screen and raw mode. No-op outside Tui mode.
    pub fn init(&mut self) -> io::Result<()> {
        if self.mode != DisplayMode::Tui {
            return Ok(());
        }

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        self.terminal = Some(Terminal::new(CrosstermBackend::new(stdout))?);
        self.initialized = true;
        Ok(())
    }

    /// Restore the terminal. Safe to call more than once.
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }

        if let Some(ref mut terminal) = self.terminal {
            execute!(
                terminal.backend_mut(),
                LeaveAlternateScreen,
                cursor::Show
            )?;
        }
        disable_raw_mode()?;

        self.initialized = false;
        self.terminal = None;
        Ok(())
    }

    fn render(&mut self) -> io::Result<()> {
        if let Some(ref mut terminal) = self.terminal {
            let state = self.state.clone();
            terminal.draw(|frame| render_frame(frame, &state))?;
        }
        Ok(())
    }

    /// Drive the dashboard until the event stream closes.
    ///
    /// Keyboard input is polled between events; `q` or Ctrl-C requests
    /// cooperative cancellation through the shared token rather than
    /// tearing the screen down mid-run.
    pub async fn run(
        &mut self,
        mut events: UnboundedReceiver<ProgressEvent>,
        cancel: &CancelToken,
    ) -> io::Result<()> {
        self.render()?;
        let mut poll = tokio::time::interval(INPUT_POLL_INTERVAL);

        loop {
            tokio::select! {
                received = events.recv() => {
                    match received {
                        Some(event) => {
                            self.state.update_from_event(&event);
                            self.render()?;
                        }
                        None => break,
                    }
                }
                _ = poll.tick() => {
                    if self.mode == DisplayMode::Tui
                        && quit_requested()?
                    {
                        cancel.cancel();
                    }
                }
            }
        }

        self.render()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn state(&self) -> &DashboardState {
        &self.state
    }
}

impl Drop for TuiController {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn quit_requested() -> io::Result<bool> {
    while event::poll(Duration::ZERO)? {
        if let Event::Key(key) = event::read()? {
            let ctrl_c = key.code == KeyCode::Char('c')
                && key.modifiers.contains(KeyModifiers::CONTROL);
            if key.code == KeyCode::Char('q') || ctrl_c {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
