//! Terminal driver for a local selection session.
//!
//! `filemover browse` runs one [`SelectionSession`] against the local
//! terminal. Keys are read on a blocking thread and decoded with
//! [`input_for_key`]; every view the session produces is drawn as a
//! paragraph.

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;

use crate::selection::{
    input_for_key, SelectionSession, SelectionState, SessionEvent, TransferSink,
};

/// How long the key reader waits before checking whether the session ended.
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Title shown on the view border.
const TITLE: &str = " filemover ";

/// Local terminal UI for a selection session.
pub struct BrowseApp {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl BrowseApp {
    /// Switch the terminal to raw mode on the alternate screen.
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    /// Draws one view.
    pub fn draw(&mut self, view: &str) -> io::Result<()> {
        self.terminal.draw(|frame| render_frame(frame, view))?;
        Ok(())
    }

    /// Run the session until it ends, drawing each view.
    ///
    /// Returns the final session state.
    pub async fn run<S: TransferSink>(
        mut self,
        session: SelectionSession<S>,
        input: mpsc::Sender<SessionEvent>,
    ) -> io::Result<SelectionState> {
        let (views_tx, mut views_rx) = mpsc::channel::<String>(16);
        let session_task = tokio::spawn(session.run(views_tx));
        let key_task = tokio::task::spawn_blocking(move || read_keys(input));

        while let Some(view) = views_rx.recv().await {
            self.draw(&view)?;
        }

        let state = session_task.await.map_err(io::Error::other)?;
        key_task.await.map_err(io::Error::other)??;
        self.restore()?;
        Ok(state)
    }

    /// Restores the terminal to its original state.
    pub fn restore(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for BrowseApp {
    fn drop(&mut self) {
        // Best effort cleanup
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Forward decoded key presses until the session stops listening.
fn read_keys(input: mpsc::Sender<SessionEvent>) -> io::Result<()> {
    while !input.is_closed() {
        if !event::poll(KEY_POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if let Some(event) = input_for_key(key) {
                if input.blocking_send(event.into()).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Renders a view inside a bordered block.
fn render_frame(frame: &mut Frame, view: &str) {
    let paragraph = Paragraph::new(view.to_string())
        .block(Block::default().borders(Borders::ALL).title(TITLE))
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, frame.area());
}
