//! Scoped acquisition of the alt-screen and raw mode, with a panic hook
//! that restores the terminal before a panic propagates. Guarantees the
//! guarantee from spec.md §7: "a scoped acquisition of the alt-screen
//! and raw-mode guarantees release on every exit path, including panic".

use std::io::{self, Stdout};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

pub struct TerminalGuard {
    pub terminal: Terminal<CrosstermBackend<Stdout>>,
}

fn restore_raw_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let previous_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_raw_terminal();
            previous_hook(info);
        }));

        Ok(Self { terminal })
    }

    /// Leave the alt-screen/raw-mode for the duration of `f` (e.g. an
    /// `$EDITOR` invocation that wants the normal screen), then restore
    /// and force a full redraw on the next frame.
    pub fn suspend<F: FnOnce() -> io::Result<()>>(&mut self, f: F) -> io::Result<()> {
        restore_raw_terminal();
        let result = f();
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        self.terminal.clear()?;
        result
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_raw_terminal();
    }
}
