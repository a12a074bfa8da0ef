//! Pitch to frequency mapping and tone emission.

use std::time::Duration;

use tracing::trace;

use crate::keys::{KeyBuffer, KeyEvent};
use crate::platform::HostPlatform;
use crate::probe::SoundLevel;

/// Lowest frequency the sound hardware is asked to produce.
pub const MIN_FREQUENCY: u16 = 37;
/// Highest frequency the sound hardware is asked to produce.
pub const MAX_FREQUENCY: u16 = 32766;

/// exp(pitch * PITCH_SCALE + PITCH_OFFSET) Hz.
const PITCH_SCALE: f64 = 0.057762;
const PITCH_OFFSET: f64 = 2.10125;

/// Duration units to milliseconds.
pub const DURATION_SCALE: f64 = 1.82;

/// A resolved tone, ready for the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneRequest {
    pub pitch: f64,
    pub duration: f64,
    /// 0 for silence, otherwise within `MIN_FREQUENCY..=MAX_FREQUENCY`.
    pub frequency: u16,
}

impl ToneRequest {
    pub fn new(pitch: f64, duration: f64, sound: SoundLevel) -> Self {
        let frequency = match sound {
            SoundLevel::None => 0,
            SoundLevel::Basic | SoundLevel::Extended => pitch_to_frequency(pitch),
        };
        Self {
            pitch,
            duration,
            frequency,
        }
    }

    /// Duration handed to the host, in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        (self.duration * DURATION_SCALE).max(0.0)
    }
}

/// Frequency for an abstract pitch, clamped to the audible range.
pub fn pitch_to_frequency(pitch: f64) -> u16 {
    let raw = (pitch * PITCH_SCALE + PITCH_OFFSET).exp();
    if raw.is_nan() || raw <= 0.0 {
        return 0;
    }
    if raw >= MAX_FREQUENCY as f64 {
        return MAX_FREQUENCY;
    }
    if raw < MIN_FREQUENCY as f64 {
        return MIN_FREQUENCY;
    }
    raw.round() as u16
}

/// Sound a tone; silent hosts still spend the duration.
pub fn emit<P: HostPlatform>(host: &mut P, request: &ToneRequest, sound: SoundLevel, volume: u8) {
    let volume = (sound == SoundLevel::Extended).then_some(volume);
    trace!(
        frequency = request.frequency,
        duration_ms = request.duration_ms(),
        ?volume,
        "[TONE] emit"
    );
    host.emit_tone(request.frequency, request.duration_ms(), volume);
}

/// Poll for a key until one arrives or `duration` of wall-clock time passes.
/// Returns the key, or `KeyEvent::NONE` on timeout.
pub fn wait_or_key<P: HostPlatform>(
    host: &mut P,
    keys: &mut KeyBuffer,
    duration: Duration,
) -> KeyEvent {
    let deadline = host.now() + duration;
    loop {
        let key = keys.poll(host);
        if !key.is_none() {
            return key;
        }
        if host.now() >= deadline {
            return KeyEvent::NONE;
        }
        host.idle();
    }
}
