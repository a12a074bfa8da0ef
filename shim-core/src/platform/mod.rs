//! Host platform abstraction.
//!
//! `HostPlatform` is the opaque layer the shim negotiates with: display mode
//! switching, raw keyboard, sound chip, pixel and text output, and a clock.
//! `HeadlessPlatform` implements it in memory for tests.

mod headless;

pub use headless::{HeadlessPlatform, ToneCall};

use std::time::Duration;

use crate::error::ShimResult;

/// Platform primitives consumed by the shim.
pub trait HostPlatform: Send {
    /// Attempt to switch to display mode `id`. `Ok(false)` and `Err` both mean
    /// the mode is unavailable.
    fn try_set_display_mode(&mut self, id: u8) -> ShimResult<bool>;

    /// Attempt to enable the extended (multi-voice, volume) sound chip.
    fn try_set_extended_sound(&mut self) -> ShimResult<bool>;

    /// Read one raw unit from the keyboard. Returns None if nothing is waiting.
    fn raw_key_poll(&mut self) -> Option<u8>;

    /// True once no further raw input can ever arrive.
    fn keyboard_closed(&self) -> bool {
        false
    }

    /// Sound `frequency` Hz (0 = silence) for `duration_ms`.
    fn emit_tone(&mut self, frequency: u16, duration_ms: f64, volume: Option<u8>);

    /// Short attention beep.
    fn beep(&mut self) {
        self.emit_tone(800, 250.0, None);
    }

    /// Clear the whole display to a physical color.
    fn clear(&mut self, color: u8);

    /// Draw a horizontal run of `len` pixels starting at device (x, y).
    fn draw_run(&mut self, x: i32, y: i32, len: u32, color: u8);

    /// Write text into the character grid.
    fn put_text(&mut self, col: u8, row: u8, text: &[u8], fg: u8, bg: u8);

    /// Character currently shown at a grid cell.
    fn read_char(&self, col: u8, row: u8) -> Option<u8>;

    /// Show `len` cells starting at (col, row) in reverse video.
    fn highlight(&mut self, col: u8, row: u8, len: u8);

    /// Write to printer (optional, can be no-op).
    fn print(&mut self, _byte: u8) {}

    /// Enable or disable the host's break key.
    fn set_break_enabled(&mut self, _enabled: bool) {}

    /// Bytes of memory available to the guest.
    fn free_memory(&self) -> u64 {
        0
    }

    /// Monotonic wall-clock time.
    fn now(&mut self) -> Duration;

    /// Called between polls in busy-wait loops.
    fn idle(&mut self) {}
}
