//! Panel runtime - owns the terminal, runs the event loop.
//!
//! The status itself is owned by the host. It arrives either through the
//! optional `watch` channel or through the host-simulation keys (`1`-`4`,
//! `0` for an unknown value).

use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use gemlink_core::AuthStatus;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::status::{handle_key, render_status_panel};
use crate::terminal;

/// Spinner cadence.
pub const TICK_INTERVAL: Duration = Duration::from_millis(80);

/// Full-screen status panel runtime.
pub struct PanelRuntime<F> {
    status: Option<AuthStatus>,
    updates: Option<watch::Receiver<Option<AuthStatus>>>,
    recovery_action: F,
    recoveries: usize,
    tick: usize,
    last_tick: Instant,
    should_quit: bool,
}

impl<F: FnMut()> PanelRuntime<F> {
    pub fn new(status: Option<AuthStatus>, recovery_action: F) -> Self {
        Self {
            status,
            updates: None,
            recovery_action,
            recoveries: 0,
            tick: 0,
            last_tick: Instant::now(),
            should_quit: false,
        }
    }

    /// Follows status values published by the host.
    #[must_use]
    pub fn with_updates(mut self, updates: watch::Receiver<Option<AuthStatus>>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn status(&self) -> Option<AuthStatus> {
        self.status
    }

    /// Number of times the recovery action ran.
    pub fn recoveries(&self) -> usize {
        self.recoveries
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Runs until the user quits, restoring the terminal afterwards.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be set up or drawn.
    pub fn run(&mut self) -> Result<()> {
        terminal::install_panic_hook();
        let mut term = terminal::setup_terminal()?;
        let result = self.event_loop(&mut term);
        terminal::restore_terminal()?;
        result
    }

    fn event_loop(&mut self, term: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        while !self.should_quit {
            self.poll_updates();
            term.draw(|frame| self.render(frame))?;

            let timeout = TICK_INTERVAL.saturating_sub(self.last_tick.elapsed());
            if event::poll(timeout)?
                && let Event::Key(key) = event::read()?
            {
                self.handle_key(&key);
            }

            if self.last_tick.elapsed() >= TICK_INTERVAL {
                self.tick = self.tick.wrapping_add(1);
                self.last_tick = Instant::now();
            }
        }
        Ok(())
    }

    /// Applies the latest host-published status, if any.
    pub fn poll_updates(&mut self) {
        let Some(updates) = self.updates.as_mut() else {
            return;
        };
        match updates.has_changed() {
            Ok(true) => {
                self.status = *updates.borrow_and_update();
                debug!(status = ?self.status, "status updated by host");
            }
            Ok(false) => {}
            Err(_) => {
                // Host went away; keep its last value.
                self.status = *updates.borrow();
                self.updates = None;
            }
        }
    }

    /// Handles one key press.
    pub fn handle_key(&mut self, key: &KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('0') => self.status = None,
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                self.status = AuthStatus::all().get(index).copied();
            }
            _ => {
                if handle_key(self.status, key, &mut self.recovery_action) {
                    self.recoveries += 1;
                    info!("manual recovery requested");
                }
            }
        }
    }

    fn render(&self, frame: &mut Frame) {
        let [body, footer] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());

        render_status_panel(frame, body, self.status, self.tick);

        let hints = Line::from(vec![
            Span::styled("1-4", Style::default().fg(Color::Cyan)),
            Span::styled(" status  ", Style::default().fg(Color::DarkGray)),
            Span::styled("0", Style::default().fg(Color::Cyan)),
            Span::styled(" unknown  ", Style::default().fg(Color::DarkGray)),
            Span::styled("q", Style::default().fg(Color::Cyan)),
            Span::styled(" quit", Style::default().fg(Color::DarkGray)),
        ]);
        frame.render_widget(Paragraph::new(hints), footer);
    }
}
