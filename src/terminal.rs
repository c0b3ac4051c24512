use crossterm::{
    cursor::Show,
    event::{self, Event, KeyCode, KeyEventKind},
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, disable_raw_mode, enable_raw_mode},
};
use std::{
    io::{self, Stdout, Write},
    panic,
    sync::{
        atomic::{AtomicBool, Ordering},
        OnceLock,
    },
    time::Duration,
};

use crate::heatmap::Glyph;
use crate::types::{ChannelId, Command};

static RAW_MODE_ENABLED: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// What the session needs from the screen and keyboard.
pub trait StripTerminal {
    /// Usable cells per strip row.
    fn width(&self) -> usize;
    /// Draw one strip row; `None` cells stay blank.
    fn draw_row(&mut self, cells: &[Option<Glyph>]) -> io::Result<()>;
    /// Plain status line between strip rows.
    fn message(&mut self, text: &str) -> io::Result<()>;
    /// Non-blocking check for a pending key command.
    fn poll_command(&mut self) -> io::Result<Option<Command>>;
}

/// Console palette index -> terminal color.
pub fn console_color(index: u8) -> Color {
    match index {
        0 => Color::Black,
        1 => Color::DarkBlue,
        2 => Color::DarkGreen,
        3 => Color::DarkCyan,
        4 => Color::DarkRed,
        5 => Color::DarkMagenta,
        6 => Color::DarkYellow,
        7 => Color::Grey,
        8 => Color::DarkGrey,
        9 => Color::Blue,
        10 => Color::Green,
        11 => Color::Cyan,
        12 => Color::Red,
        13 => Color::Magenta,
        14 => Color::Yellow,
        _ => Color::White,
    }
}

pub fn command_for_key(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Esc => Some(Command::Quit),
        KeyCode::Enter => Some(Command::ToggleTextRecording),
        KeyCode::Char(' ') => Some(Command::ToggleRawRecording),
        KeyCode::Char('1') => Some(Command::ToggleChannel(ChannelId::Ch1)),
        KeyCode::Char('2') => Some(Command::ToggleChannel(ChannelId::Ch2)),
        _ => None,
    }
}

/// crossterm-backed console. Raw mode is on so single key presses arrive
/// without Enter, hence the explicit `\r\n` line ends.
///
/// Dropping it, or panicking while it is open, puts the terminal back:
/// raw mode off, colors reset, cursor shown.
pub struct ConsoleTerminal {
    out: Stdout,
}

impl ConsoleTerminal {
    pub fn open() -> io::Result<Self> {
        PANIC_HOOK_INSTALLED.get_or_init(|| {
            let previous = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                Self::restore();
                log::error!("panic: {info}");
                previous(info);
            }));
        });
        enable_raw_mode()?;
        RAW_MODE_ENABLED.store(true, Ordering::SeqCst);
        Ok(Self { out: io::stdout() })
    }

    fn restore() {
        if RAW_MODE_ENABLED.swap(false, Ordering::SeqCst) {
            let _ = disable_raw_mode();
        }
        let mut stdout = io::stdout();
        let _ = queue!(stdout, ResetColor, Show);
        let _ = stdout.flush();
    }
}

impl Drop for ConsoleTerminal {
    fn drop(&mut self) {
        Self::restore();
    }
}

impl StripTerminal for ConsoleTerminal {
    fn width(&self) -> usize {
        // one column short so the row never wraps
        let cols = terminal::size().map(|(c, _)| c).unwrap_or(80);
        (cols as usize).saturating_sub(1)
    }

    fn draw_row(&mut self, cells: &[Option<Glyph>]) -> io::Result<()> {
        for cell in cells {
            match cell {
                Some(g) => queue!(
                    self.out,
                    SetForegroundColor(console_color(g.fg)),
                    SetBackgroundColor(console_color(g.bg)),
                    Print(g.symbol())
                )?,
                None => queue!(self.out, ResetColor, Print(' '))?,
            }
        }
        queue!(self.out, ResetColor, Print("\r\n"))?;
        self.out.flush()
    }

    fn message(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, ResetColor, Print(text), Print("\r\n"))?;
        self.out.flush()
    }

    fn poll_command(&mut self) -> io::Result<Option<Command>> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(cmd) = command_for_key(key.code) {
                    return Ok(Some(cmd));
                }
            }
        }
        Ok(None)
    }
}
