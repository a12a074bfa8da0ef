//! The guest-facing shim: one owner for the negotiated configuration, the
//! cursor and colors, the channel table and the drawing window.
//!
//! A guest creates one `Shim` with [`Shim::start`], calls capability methods
//! directly, and ends with [`Shim::finalize`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::FailureKind;
use crate::handles::{ChannelStatus, HandleTable, OpenMode};
use crate::keys::{KeyBuffer, KeyEvent};
use crate::numfmt;
use crate::platform::HostPlatform;
use crate::probe::{probe_with_profile, Configuration, SoundLevel};
use crate::profile::{HostProfile, MAX_VOLUME, PALETTE_SIZE};
use crate::raster::{Canvas, Window};
use crate::rng::Rng;
use crate::storage::HostStorage;
use crate::tone::{self, ToneRequest};

/// Printer line terminator.
const PRINTER_EOL: &[u8] = b"\r\n";

/// Default foreground and background color slots.
const DEFAULT_FG: u8 = 7;
const DEFAULT_BG: u8 = 0;

/// Logical text-cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub col: u8,
    pub row: u8,
}

/// Guest-selected color slots, indices into the configuration palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPair {
    pub fg: u8,
    pub bg: u8,
}

impl Default for ColorPair {
    fn default() -> Self {
        Self {
            fg: DEFAULT_FG,
            bg: DEFAULT_BG,
        }
    }
}

/// Portability shim bound to one host platform and one storage backend.
pub struct Shim<P: HostPlatform, S: HostStorage> {
    host: P,
    config: Configuration,
    colors: ColorPair,
    cursor: CursorPosition,
    handles: HandleTable<S>,
    canvas: Canvas,
    rng: Rng,
    keys: KeyBuffer,
    volume: u8,
    sound_on: bool,
    break_enabled: bool,
}

impl<P: HostPlatform, S: HostStorage> Shim<P, S> {
    /// Probe the host and build a shim for the negotiated configuration.
    pub fn start(mut host: P, storage: S, profile: &HostProfile) -> Self {
        let config = probe_with_profile(&mut host, profile);
        debug!(
            mode = config.mode_id,
            text_width = config.text_width,
            sound = ?config.sound,
            "shim started"
        );
        let rng = match profile.seed {
            Some(seed) => Rng::new(seed),
            None => Rng::from_entropy(),
        };
        Self {
            canvas: Canvas::new(&config),
            handles: HandleTable::new(storage, profile.devices.clone()),
            host,
            config,
            colors: ColorPair::default(),
            cursor: CursorPosition::default(),
            rng,
            keys: KeyBuffer::new(),
            volume: profile.volume,
            sound_on: true,
            break_enabled: true,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn host(&self) -> &P {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut P {
        &mut self.host
    }

    pub fn storage(&self) -> &S {
        self.handles.storage()
    }

    pub fn storage_mut(&mut self) -> &mut S {
        self.handles.storage_mut()
    }

    // ---- Screen ----

    /// Clear to the background color, home the cursor, reset the window.
    pub fn screen_init(&mut self) {
        let bg = self.physical(self.colors.bg);
        self.host.clear(bg);
        self.cursor = CursorPosition::default();
        self.canvas.reset_window();
    }

    pub fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    fn on_grid(&self, col: u8, row: u8) -> bool {
        col < self.config.text_width && row < self.config.text_height
    }

    /// Move the cursor. Out-of-range positions leave it where it is.
    pub fn locate(&mut self, col: u8, row: u8) -> bool {
        if !self.on_grid(col, row) {
            return false;
        }
        self.cursor = CursorPosition { col, row };
        true
    }

    /// Write text at the cursor and advance it.
    ///
    /// Text wraps to the next row; LF (or CR LF) starts a new row. Nothing is
    /// written past the end of the last row, and the cursor stays on its
    /// final cell.
    pub fn print_text(&mut self, text: &str) {
        let fg = self.physical(self.colors.fg);
        let bg = self.physical(self.colors.bg);
        let width = self.config.text_width;
        let last_row = self.config.text_height.saturating_sub(1);
        if width == 0 {
            return;
        }

        for (index, line) in text.split('\n').enumerate() {
            if index > 0 && !self.next_row() {
                return;
            }
            let mut bytes = line.trim_end_matches('\r').as_bytes();
            while !bytes.is_empty() {
                let room = width.saturating_sub(self.cursor.col) as usize;
                let (chunk, rest) = bytes.split_at(room.min(bytes.len()));
                self.host
                    .put_text(self.cursor.col, self.cursor.row, chunk, fg, bg);
                bytes = rest;
                if chunk.len() < room {
                    self.cursor.col += chunk.len() as u8;
                } else if !self.next_row() {
                    self.cursor.col = width.saturating_sub(1);
                    self.cursor.row = last_row;
                    return;
                }
            }
        }
    }

    /// Move to column 0 of the next row. False on the last row.
    fn next_row(&mut self) -> bool {
        if self.cursor.row + 1 >= self.config.text_height {
            return false;
        }
        self.cursor = CursorPosition {
            col: 0,
            row: self.cursor.row + 1,
        };
        true
    }

    /// Reverse-video `len` cells, clipped to the row.
    pub fn highlight_block(&mut self, col: u8, row: u8, len: u8) {
        if !self.on_grid(col, row) || len == 0 {
            return;
        }
        let len = len.min(self.config.text_width.saturating_sub(col));
        self.host.highlight(col, row, len);
    }

    /// Character at a cell; blank cells read as space, off-grid as 0.
    pub fn screen_char(&self, col: u8, row: u8) -> u8 {
        if !self.on_grid(col, row) {
            return 0;
        }
        self.host.read_char(col, row).unwrap_or(b' ')
    }

    /// Select color slots. Ignored if either slot is out of range.
    pub fn set_colors(&mut self, fg: u8, bg: u8) -> bool {
        let slots = PALETTE_SIZE as u8;
        if fg >= slots || bg >= slots {
            return false;
        }
        self.colors = ColorPair { fg, bg };
        true
    }

    pub fn colors(&self) -> ColorPair {
        self.colors
    }

    fn physical(&self, slot: u8) -> u8 {
        self.config.palette[slot as usize % PALETTE_SIZE]
    }

    // ---- Keyboard, sound, misc ----

    /// Oldest type-ahead key, or `KeyEvent::NONE`.
    pub fn poll_key(&mut self) -> KeyEvent {
        self.keys.poll(&mut self.host)
    }

    pub fn wait_key(&mut self) -> KeyEvent {
        self.keys.wait(&mut self.host)
    }

    pub fn beep(&mut self) {
        self.host.beep();
    }

    /// Tone at an abstract pitch. While the sound chip is switched off the
    /// duration still passes in silence.
    pub fn tone(&mut self, pitch: f64, duration: f64) {
        let mut request = ToneRequest::new(pitch, duration, self.config.sound);
        if !self.sound_on {
            request.frequency = 0;
        }
        tone::emit(&mut self.host, &request, self.config.sound, self.volume);
    }

    /// Switch the extended sound chip on or off. False, and no change, on
    /// hosts without one.
    pub fn set_sound_enabled(&mut self, on: bool) -> bool {
        if self.config.sound != SoundLevel::Extended {
            return false;
        }
        debug!(on, "[TONE] sound switch");
        self.sound_on = on;
        true
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_on
    }

    /// Set the tone volume, clamped to 0..=15. Ignored by non-extended hosts.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
    }

    pub fn wait_or_key(&mut self, duration: Duration) -> KeyEvent {
        tone::wait_or_key(&mut self.host, &mut self.keys, duration)
    }

    /// Next random number in [0, 1).
    pub fn random(&mut self) -> f64 {
        self.rng.next_f64()
    }

    pub fn randomize(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }

    /// Free memory reported by the host.
    pub fn reclaim_memory(&mut self) -> u64 {
        self.host.free_memory()
    }

    pub fn set_break_key(&mut self, enabled: bool) {
        self.break_enabled = enabled;
        self.host.set_break_enabled(enabled);
    }

    pub fn break_key_enabled(&self) -> bool {
        self.break_enabled
    }

    // ---- Formatting ----

    pub fn format_natural(&self, value: f64) -> String {
        numfmt::format_natural(value)
    }

    pub fn format_fixed(&self, value: f64, width: usize, decimals: usize) -> String {
        numfmt::format_fixed(value, width, decimals)
    }

    /// ASCII upper-casing; other characters are left alone.
    pub fn uppercase(&self, text: &str) -> String {
        text.to_ascii_uppercase()
    }

    // ---- Printer ----

    pub fn printer_line(&mut self, text: &str) {
        for &b in text.as_bytes().iter().chain(PRINTER_EOL) {
            self.host.print(b);
        }
    }

    pub fn printer_newline(&mut self) {
        for &b in PRINTER_EOL {
            self.host.print(b);
        }
    }

    // ---- Files ----

    pub fn file_open(&mut self, logical: u8, mode: OpenMode, name: &str) -> ChannelStatus {
        self.handles.open(logical, mode, name)
    }

    pub fn file_read_line(&mut self, logical: u8) -> (String, ChannelStatus) {
        self.handles.read_line(logical)
    }

    pub fn file_write_line(&mut self, logical: u8, text: &str) -> ChannelStatus {
        self.handles.write_line(logical, text)
    }

    pub fn file_close(&mut self, logical: u8) -> ChannelStatus {
        self.handles.close(logical)
    }

    /// True if the channel has reached end of data, or is not open.
    pub fn file_eof(&self, logical: u8) -> bool {
        self.handles.is_eof(logical).unwrap_or(true)
    }

    /// Logical number bound by the last successful open (useful after open 0).
    pub fn file_last_bound(&self) -> Option<u8> {
        self.handles.last_bound()
    }

    /// Why the last file call returned `Failed`.
    pub fn file_last_error(&self) -> Option<FailureKind> {
        self.handles.last_error()
    }

    // ---- Graphics ----

    /// Clear the screen for drawing. False in a text-only configuration.
    pub fn graphics_init(&mut self) -> bool {
        if !self.canvas.has_graphics() {
            return false;
        }
        self.screen_init();
        true
    }

    pub fn set_window(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> bool {
        match Window::new(x0, y0, x1, y1) {
            Some(window) => {
                self.canvas.set_window(window);
                true
            }
            None => false,
        }
    }

    pub fn window(&self) -> Window {
        self.canvas.window()
    }

    pub fn pixel_set(&mut self, x: f64, y: f64) {
        let fg = self.physical(self.colors.fg);
        self.canvas.pixel_set(&mut self.host, x, y, fg);
    }

    pub fn line_draw(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        let fg = self.physical(self.colors.fg);
        self.canvas.line_draw(&mut self.host, (x0, y0), (x1, y1), fg);
    }

    /// Rasterize text at a cell. Resets the window to normal afterwards.
    pub fn draw_text(&mut self, col: u8, row: u8, text: &str) {
        let fg = self.physical(self.colors.fg);
        let bg = self.physical(self.colors.bg);
        self.canvas
            .draw_text(&mut self.host, col, row, text.as_bytes(), fg, bg);
    }

    /// Close every channel and return the host to text mode.
    pub fn finalize(&mut self) {
        self.handles.close_all();
        self.canvas.reset_window();
        match self.host.try_set_display_mode(0) {
            Ok(true) => {}
            Ok(false) => warn!("host refused text mode on finalize"),
            Err(e) => warn!(error = %e, "could not restore text mode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessPlatform;
    use crate::probe::SoundLevel;
    use crate::storage::MemoryStorage;

    fn seeded_profile() -> HostProfile {
        HostProfile {
            seed: Some(1234),
            ..HostProfile::default()
        }
    }

    fn text_shim() -> Shim<HeadlessPlatform, MemoryStorage> {
        Shim::start(HeadlessPlatform::new(), MemoryStorage::new(), &seeded_profile())
    }

    fn graphics_shim() -> Shim<HeadlessPlatform, MemoryStorage> {
        let host = HeadlessPlatform::new().with_modes(&[1]);
        Shim::start(host, MemoryStorage::new(), &seeded_profile())
    }

    #[test]
    fn test_start_probes_once() {
        let shim = graphics_shim();
        assert_eq!(shim.config().mode_id, 1);
        assert_eq!(shim.host().attempts(), &[9, 2, 1]);
        assert_eq!(shim.colors(), ColorPair { fg: 7, bg: 0 });
    }

    #[test]
    fn test_zero_width_profile_falls_back_to_text() {
        let profile = HostProfile::from_json(
            r#"{ "displayModes": [{ "id": 4, "width": 320, "height": 200, "textWidth": 0 }] }"#,
        )
        .unwrap();
        let host = HeadlessPlatform::new().with_modes(&[4]);
        let mut shim = Shim::start(host, MemoryStorage::new(), &profile);
        assert_eq!(shim.config().mode_id, 0);
        assert_eq!(shim.config().text_width, 40);

        shim.print_text("HI");
        assert_eq!(shim.host().row_text(0), "HI");
    }

    #[test]
    fn test_locate_out_of_range_is_noop() {
        let mut shim = text_shim();
        assert!(shim.locate(5, 3));
        assert!(!shim.locate(40, 0));
        assert!(!shim.locate(0, 24));
        assert_eq!(shim.cursor(), CursorPosition { col: 5, row: 3 });
    }

    #[test]
    fn test_print_text_wraps() {
        let mut shim = text_shim();
        shim.locate(38, 0);
        shim.print_text("ABCD");
        assert_eq!(shim.host().row_text(0).trim_start(), "AB");
        assert_eq!(shim.host().row_text(1), "CD");
        assert_eq!(shim.cursor(), CursorPosition { col: 2, row: 1 });
        assert_eq!(shim.screen_char(39, 0), b'B');
    }

    #[test]
    fn test_print_text_newline() {
        let mut shim = text_shim();
        shim.print_text("ONE\nTWO");
        assert_eq!(shim.host().row_text(0), "ONE");
        assert_eq!(shim.host().row_text(1), "TWO");
        assert_eq!(shim.cursor(), CursorPosition { col: 3, row: 1 });
    }

    #[test]
    fn test_print_text_stops_at_last_row() {
        let mut shim = text_shim();
        shim.locate(38, 23);
        shim.print_text("XYZ");
        assert_eq!(shim.screen_char(38, 23), b'X');
        assert_eq!(shim.screen_char(39, 23), b'Y');
        assert_eq!(shim.cursor(), CursorPosition { col: 39, row: 23 });
    }

    #[test]
    fn test_screen_char() {
        let mut shim = text_shim();
        shim.print_text("Q");
        assert_eq!(shim.screen_char(0, 0), b'Q');
        assert_eq!(shim.screen_char(1, 0), b' ');
        assert_eq!(shim.screen_char(40, 0), 0);
    }

    #[test]
    fn test_highlight_clipped() {
        let mut shim = text_shim();
        shim.highlight_block(35, 2, 10);
        shim.highlight_block(50, 2, 10);
        assert_eq!(shim.host().highlights(), &[(35, 2, 5)]);
    }

    #[test]
    fn test_set_colors_range() {
        let mut shim = text_shim();
        assert!(shim.set_colors(3, 1));
        assert!(!shim.set_colors(8, 1));
        assert_eq!(shim.colors(), ColorPair { fg: 3, bg: 1 });
    }

    #[test]
    fn test_random_is_seeded() {
        let mut a = text_shim();
        let mut b = text_shim();
        let first = a.random();
        assert_eq!(first, b.random());
        assert!((0.0..1.0).contains(&first));
        a.randomize(99);
        b.randomize(99);
        assert_eq!(a.random(), b.random());
    }

    #[test]
    fn test_break_key_and_memory() {
        let mut shim = text_shim();
        shim.set_break_key(false);
        assert!(!shim.break_key_enabled());
        assert!(!shim.host().break_enabled());
        assert_eq!(shim.reclaim_memory(), 60_000);
    }

    #[test]
    fn test_printer_crlf() {
        let mut shim = text_shim();
        shim.printer_line("REPORT");
        shim.printer_newline();
        assert_eq!(shim.host().printer_string(), "REPORT\r\n\r\n");
    }

    #[test]
    fn test_uppercase_ascii_only() {
        let shim = text_shim();
        assert_eq!(shim.uppercase("abc-xyz é"), "ABC-XYZ é");
    }

    #[test]
    fn test_tone_silent_without_sound() {
        let host = HeadlessPlatform::new().with_extended_sound(None);
        let mut shim = Shim::start(host, MemoryStorage::new(), &seeded_profile());
        assert_eq!(shim.config().sound, SoundLevel::None);
        shim.tone(60.0, 100.0);
        assert_eq!(shim.host().tones()[0].frequency, 0);
        assert!((shim.host().tones()[0].duration_ms - 182.0).abs() < 1e-9);
    }

    #[test]
    fn test_tone_volume_from_profile() {
        let host = HeadlessPlatform::new().with_extended_sound(Some(true));
        let profile = HostProfile {
            volume: 4,
            ..seeded_profile()
        };
        let mut shim = Shim::start(host, MemoryStorage::new(), &profile);
        shim.tone(60.0, 10.0);
        assert_eq!(shim.host().tones()[0].volume, Some(4));
    }

    #[test]
    fn test_sound_switch_needs_extended_chip() {
        let mut shim = text_shim();
        assert!(!shim.set_sound_enabled(false));
        assert!(shim.sound_enabled());

        let host = HeadlessPlatform::new().with_extended_sound(Some(true));
        let mut shim = Shim::start(host, MemoryStorage::new(), &seeded_profile());
        assert!(shim.set_sound_enabled(false));
        shim.tone(60.0, 10.0);
        assert!(shim.set_sound_enabled(true));
        shim.set_volume(40);
        shim.tone(60.0, 10.0);

        let tones = shim.host().tones();
        assert_eq!(tones[0].frequency, 0);
        assert!((tones[0].duration_ms - 18.2).abs() < 1e-9);
        assert!(tones[1].frequency > 0);
        assert_eq!(tones[1].volume, Some(15));
    }

    #[test]
    fn test_type_ahead_overflow_beeps() {
        let typed: Vec<u8> = (b'A'..=b'P').collect(); // 16 keys
        let host = HeadlessPlatform::new().with_input(&typed);
        let mut shim = Shim::start(host, MemoryStorage::new(), &seeded_profile());

        assert_eq!(shim.poll_key().as_char(), Some('A'));
        assert_eq!(shim.host().tones().len(), 1);
        assert_eq!(shim.host().tones()[0].frequency, 800);
        let mut rest = Vec::new();
        while let Some(c) = shim.poll_key().as_char() {
            rest.push(c);
        }
        assert_eq!(rest.len(), 14);
        assert_eq!(rest.last(), Some(&'O'));
    }

    #[test]
    fn test_file_roundtrip_and_errors() {
        let mut shim = text_shim();
        assert_eq!(shim.file_open(3, OpenMode::Write, "notes"), ChannelStatus::Ok);
        assert_eq!(shim.file_write_line(3, "LINE"), ChannelStatus::Ok);
        assert_eq!(shim.file_close(3), ChannelStatus::Ok);
        assert_eq!(shim.storage().lines("NOTES").unwrap(), &["LINE".to_string()]);

        assert_eq!(shim.file_read_line(4).1, ChannelStatus::Failed);
        assert_eq!(shim.file_last_error(), Some(FailureKind::HandleNotFound));
        assert!(shim.file_eof(4));
    }

    #[test]
    fn test_graphics_init_text_only() {
        let mut shim = text_shim();
        assert!(!shim.graphics_init());
        shim.draw_text(0, 0, "A");
        assert_eq!(shim.host().pixel_count(), 0);
    }

    #[test]
    fn test_draw_text_uses_palette_and_resets_window() {
        let mut shim = graphics_shim();
        assert!(shim.graphics_init());
        assert!(shim.set_window(0.0, 0.0, 2.0, 2.0));
        shim.draw_text(0, 0, "_");
        assert_eq!(shim.window(), Window::NORMAL);
        // '_' is a full bottom row in the foreground color
        assert_eq!(shim.host().pixel(0, 7), Some(15));
        assert_eq!(shim.host().pixel(0, 0), Some(0));
    }

    #[test]
    fn test_pixel_and_line_use_foreground() {
        let mut shim = graphics_shim();
        shim.set_colors(2, 0);
        shim.pixel_set(0.5, 0.5);
        assert_eq!(shim.host().pixel(160, 100), Some(2));
        shim.line_draw(0.0, 0.0, 0.0, 0.05);
        assert_eq!(shim.host().pixel(0, 0), Some(2));
        assert!(!shim.set_window(1.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_off_screen_drawing_stays_on_device() {
        let mut shim = graphics_shim();
        shim.line_draw(0.0, 0.0, 1e10, 0.0);
        assert_eq!(shim.host().pixel_count(), 320);
        shim.draw_text(0, 200, "A");
        assert_eq!(shim.host().pixel_count(), 320);
        assert_eq!(shim.host().pixel(0, 1600), None);
    }

    #[test]
    fn test_finalize_closes_and_restores() {
        let mut shim = graphics_shim();
        shim.file_open(3, OpenMode::Write, "out");
        shim.finalize();
        assert!(!shim.handles.is_open(3));
        assert_eq!(shim.host().mode(), 0);
    }
}
