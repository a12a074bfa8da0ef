//! Terminal host: crossterm output, keys from a channel, bell for tones.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::cursor::MoveTo;
use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{Clear, ClearType};

use shim_core::{HostPlatform, ShimResult};
use tracing::warn;

/// Columns kept for `read_char`; wider than any text mode.
const GRID_COLS: usize = 80;
const GRID_ROWS: usize = 24;

/// Extended-sequence marker sent ahead of a scan code.
const EXTENDED: u8 = 0x00;

/// A text-only host on the controlling terminal.
///
/// Printer bytes go to their own writer, never to stdout or the log stream.
/// Without one, printer output is dropped.
pub struct TerminalPlatform {
    key_rx: Receiver<u8>,
    closed: bool,
    grid: Vec<[u8; GRID_COLS]>,
    break_enabled: Arc<AtomicBool>,
    started: Instant,
    printer: Option<Box<dyn Write + Send>>,
}

impl TerminalPlatform {
    pub fn new(key_rx: Receiver<u8>, break_enabled: Arc<AtomicBool>) -> Self {
        Self {
            key_rx,
            closed: false,
            grid: vec![[b' '; GRID_COLS]; GRID_ROWS],
            break_enabled,
            started: Instant::now(),
            printer: None,
        }
    }

    pub fn with_printer(mut self, printer: impl Write + Send + 'static) -> Self {
        self.printer = Some(Box::new(printer));
        self
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

impl HostPlatform for TerminalPlatform {
    fn try_set_display_mode(&mut self, id: u8) -> ShimResult<bool> {
        // No pixel modes on a character terminal
        Ok(id == 0)
    }

    fn try_set_extended_sound(&mut self) -> ShimResult<bool> {
        Ok(false)
    }

    fn raw_key_poll(&mut self) -> Option<u8> {
        match self.key_rx.try_recv() {
            Ok(byte) => Some(byte),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    fn keyboard_closed(&self) -> bool {
        self.closed
    }

    fn emit_tone(&mut self, frequency: u16, duration_ms: f64, _volume: Option<u8>) {
        if frequency > 0 {
            let mut out = std::io::stdout();
            let _ = queue!(out, Print('\x07'));
            self.flush();
        }
        let duration = Duration::try_from_secs_f64(duration_ms / 1000.0).unwrap_or_default();
        std::thread::sleep(duration);
    }

    fn clear(&mut self, color: u8) {
        for row in self.grid.iter_mut() {
            row.fill(b' ');
        }
        let mut out = std::io::stdout();
        let _ = queue!(
            out,
            SetBackgroundColor(Color::AnsiValue(color)),
            Clear(ClearType::All),
            MoveTo(0, 0),
            ResetColor
        );
        self.flush();
    }

    fn draw_run(&mut self, _x: i32, _y: i32, _len: u32, _color: u8) {}

    fn put_text(&mut self, col: u8, row: u8, text: &[u8], fg: u8, bg: u8) {
        if let Some(cells) = self.grid.get_mut(row as usize) {
            for (cell, &b) in cells.iter_mut().skip(col as usize).zip(text) {
                *cell = b;
            }
        }
        let mut out = std::io::stdout();
        let _ = queue!(
            out,
            MoveTo(col as u16, row as u16),
            SetForegroundColor(Color::AnsiValue(fg)),
            SetBackgroundColor(Color::AnsiValue(bg)),
            Print(String::from_utf8_lossy(text)),
            ResetColor
        );
        self.flush();
    }

    fn read_char(&self, col: u8, row: u8) -> Option<u8> {
        self.grid.get(row as usize)?.get(col as usize).copied()
    }

    fn highlight(&mut self, col: u8, row: u8, len: u8) {
        let Some(cells) = self.grid.get(row as usize) else {
            return;
        };
        let start = (col as usize).min(GRID_COLS);
        let end = (start + len as usize).min(GRID_COLS);
        let mut out = std::io::stdout();
        let _ = queue!(
            out,
            MoveTo(col as u16, row as u16),
            SetAttribute(Attribute::Reverse),
            Print(String::from_utf8_lossy(&cells[start..end])),
            SetAttribute(Attribute::Reset)
        );
        self.flush();
    }

    fn print(&mut self, byte: u8) {
        let Some(printer) = self.printer.as_mut() else {
            return;
        };
        let mut written = printer.write_all(&[byte]);
        if written.is_ok() && byte == b'\n' {
            written = printer.flush();
        }
        if let Err(e) = written {
            warn!(error = %e, "printer write failed, detaching printer");
            self.printer = None;
        }
    }

    fn set_break_enabled(&mut self, enabled: bool) {
        self.break_enabled.store(enabled, Ordering::Relaxed);
    }

    fn now(&mut self) -> Duration {
        self.started.elapsed()
    }

    fn idle(&mut self) {
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Translate a crossterm key into raw keyboard units: one character, or the
/// extended marker followed by a PC scan code.
pub fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Vec<u8> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_uppercase() {
                return vec![upper as u8 - 64];
            }
        }
    }

    let scan = match code {
        KeyCode::Char(c) if c.is_ascii() => return vec![c as u8],
        KeyCode::Enter => return vec![13],
        KeyCode::Backspace => return vec![8],
        KeyCode::Tab => return vec![9],
        KeyCode::Esc => return vec![27],
        KeyCode::F(n @ 1..=10) => 58 + n,
        KeyCode::Home => 71,
        KeyCode::Up => 72,
        KeyCode::Left => 75,
        KeyCode::Right => 77,
        KeyCode::Down => 80,
        KeyCode::Delete => 83,
        _ => return Vec::new(),
    };
    vec![EXTENDED, scan]
}
