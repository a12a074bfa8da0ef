//! Headless platform for testing - scripted probes, queued keys, recorded output.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::HostPlatform;
use crate::error::{ShimError, ShimResult};

/// One recorded `emit_tone` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCall {
    pub frequency: u16,
    pub duration_ms: f64,
    pub volume: Option<u8>,
}

/// In-memory platform. Mode 0 (text) is always available; other modes only
/// when listed. Every `now()` advances the clock by one tick.
pub struct HeadlessPlatform {
    accepted_modes: Vec<u8>,
    faulting_modes: Vec<u8>,
    extended_sound: Option<bool>,
    mode: u8,
    attempts: Vec<u8>,
    input: VecDeque<u8>,
    tones: Vec<ToneCall>,
    pixels: HashMap<(i32, i32), u8>,
    cells: HashMap<(u8, u8), u8>,
    highlights: Vec<(u8, u8, u8)>,
    printer: Vec<u8>,
    break_enabled: bool,
    free_memory: u64,
    clock: Duration,
    tick: Duration,
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self {
            accepted_modes: Vec::new(),
            faulting_modes: Vec::new(),
            extended_sound: Some(false),
            mode: 0,
            attempts: Vec::new(),
            input: VecDeque::new(),
            tones: Vec::new(),
            pixels: HashMap::new(),
            cells: HashMap::new(),
            highlights: Vec::new(),
            printer: Vec::new(),
            break_enabled: true,
            free_memory: 60_000,
            clock: Duration::ZERO,
            tick: Duration::from_millis(1),
        }
    }
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modes for which `try_set_display_mode` reports success.
    pub fn with_modes(mut self, modes: &[u8]) -> Self {
        self.accepted_modes = modes.to_vec();
        self
    }

    /// Modes for which `try_set_display_mode` returns an error.
    pub fn with_faulting_modes(mut self, modes: &[u8]) -> Self {
        self.faulting_modes = modes.to_vec();
        self
    }

    /// Outcome of the extended sound probe; None makes the probe error out.
    pub fn with_extended_sound(mut self, outcome: Option<bool>) -> Self {
        self.extended_sound = outcome;
        self
    }

    /// Create with pre-queued raw keyboard input.
    pub fn with_input(mut self, input: &[u8]) -> Self {
        self.queue_input(input);
        self
    }

    /// Clock advance per `now()` call.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Queue raw keyboard units.
    pub fn queue_input(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    /// Current display mode.
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Display modes tried so far, in order.
    pub fn attempts(&self) -> &[u8] {
        &self.attempts
    }

    pub fn tones(&self) -> &[ToneCall] {
        &self.tones
    }

    /// Physical color of a device pixel, if ever drawn.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u8> {
        self.pixels.get(&(x, y)).copied()
    }

    /// Number of pixels ever drawn since the last clear.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Text of one grid row, blanks as spaces, trailing blanks trimmed.
    pub fn row_text(&self, row: u8) -> String {
        let line: String = (0..=u8::MAX)
            .map(|col| self.cells.get(&(col, row)).map_or(' ', |&b| b as char))
            .collect();
        line.trim_end().to_string()
    }

    pub fn highlights(&self) -> &[(u8, u8, u8)] {
        &self.highlights
    }

    /// Get printer output as string (lossy UTF-8 conversion).
    pub fn printer_string(&self) -> String {
        String::from_utf8_lossy(&self.printer).into_owned()
    }

    pub fn break_enabled(&self) -> bool {
        self.break_enabled
    }

    pub fn elapsed(&self) -> Duration {
        self.clock
    }
}

impl HostPlatform for HeadlessPlatform {
    fn try_set_display_mode(&mut self, id: u8) -> ShimResult<bool> {
        self.attempts.push(id);
        if self.faulting_modes.contains(&id) {
            return Err(ShimError::ProbeFailed(format!("mode {} faulted", id)));
        }
        if id == 0 || self.accepted_modes.contains(&id) {
            self.mode = id;
            return Ok(true);
        }
        Ok(false)
    }

    fn try_set_extended_sound(&mut self) -> ShimResult<bool> {
        self.extended_sound
            .ok_or_else(|| ShimError::ProbeFailed("sound chip did not answer".to_string()))
    }

    fn raw_key_poll(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn keyboard_closed(&self) -> bool {
        // For headless, an empty queue never refills
        self.input.is_empty()
    }

    fn emit_tone(&mut self, frequency: u16, duration_ms: f64, volume: Option<u8>) {
        self.tones.push(ToneCall {
            frequency,
            duration_ms,
            volume,
        });
        self.clock += Duration::try_from_secs_f64(duration_ms / 1000.0).unwrap_or_default();
    }

    fn clear(&mut self, _color: u8) {
        self.pixels.clear();
        self.cells.clear();
        self.highlights.clear();
    }

    fn draw_run(&mut self, x: i32, y: i32, len: u32, color: u8) {
        for dx in 0..len as i32 {
            self.pixels.insert((x + dx, y), color);
        }
    }

    fn put_text(&mut self, col: u8, row: u8, text: &[u8], _fg: u8, _bg: u8) {
        for (i, &ch) in text.iter().enumerate() {
            let Some(c) = col.checked_add(i as u8) else {
                break;
            };
            self.cells.insert((c, row), ch);
        }
    }

    fn read_char(&self, col: u8, row: u8) -> Option<u8> {
        self.cells.get(&(col, row)).copied()
    }

    fn highlight(&mut self, col: u8, row: u8, len: u8) {
        self.highlights.push((col, row, len));
    }

    fn print(&mut self, byte: u8) {
        self.printer.push(byte);
    }

    fn set_break_enabled(&mut self, enabled: bool) {
        self.break_enabled = enabled;
    }

    fn free_memory(&self) -> u64 {
        self.free_memory
    }

    fn now(&mut self) -> Duration {
        self.clock += self.tick;
        self.clock
    }
}
