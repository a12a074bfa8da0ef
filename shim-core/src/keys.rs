//! Keyboard normalization.
//!
//! Hosts deliver keys in one of two raw encodings: a single character unit,
//! or a two-unit extended sequence (marker byte followed by a scan code) for
//! keys that have no character. Both are folded into one canonical signed
//! code space:
//!
//! | code      | meaning                                  |
//! |-----------|------------------------------------------|
//! | 0         | no key / suppressed                      |
//! | -1 ..= -4 | function keys F1..F4                     |
//! | 1 ..= 31  | control keys (Enter 13, Esc 27, cursor 28..31) |
//! | 32 ..= 95 | printable, letters upper-cased           |
//! | 127       | backspace / delete                       |

use std::collections::VecDeque;

use tracing::debug;

use crate::platform::HostPlatform;

/// Keystrokes held between guest reads.
pub const KEY_BUFFER_LEN: usize = 15;

/// Alert sounded for a key that arrives while the buffer is full.
pub const FULL_ALERT_FREQUENCY: u16 = 800;
pub const FULL_ALERT_MS: f64 = 10.0;

/// Raw units that announce an extended sequence.
pub const EXTENDED_MARKERS: [u8; 2] = [0x00, 0xE0];

/// Scan code -> canonical code for extended sequences.
const EXTENDED_KEYS: [(u8, i16); 10] = [
    (59, -1),   // F1
    (60, -2),   // F2
    (61, -3),   // F3
    (62, -4),   // F4
    (77, 28),   // right
    (75, 29),   // left
    (80, 30),   // down
    (72, 31),   // up
    (83, 127),  // delete
    (71, 11),   // home
];

/// One normalized keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: i16,
}

impl KeyEvent {
    pub const NONE: KeyEvent = KeyEvent { code: 0 };
    pub const ENTER: KeyEvent = KeyEvent { code: 13 };
    pub const ESCAPE: KeyEvent = KeyEvent { code: 27 };
    pub const RIGHT: KeyEvent = KeyEvent { code: 28 };
    pub const LEFT: KeyEvent = KeyEvent { code: 29 };
    pub const DOWN: KeyEvent = KeyEvent { code: 30 };
    pub const UP: KeyEvent = KeyEvent { code: 31 };
    pub const DELETE: KeyEvent = KeyEvent { code: 127 };

    pub fn is_none(&self) -> bool {
        self.code == 0
    }

    /// Function key number (1..=4) if this is one.
    pub fn function_key(&self) -> Option<u8> {
        (-4..=-1).contains(&self.code).then(|| (-self.code) as u8)
    }

    /// Printable character, if any.
    pub fn as_char(&self) -> Option<char> {
        (32..=95).contains(&self.code).then(|| self.code as u8 as char)
    }
}

/// Canonical code for a single-unit key.
pub fn translate_char(raw: u8) -> KeyEvent {
    let code = if raw.is_ascii_lowercase() { raw - 32 } else { raw };
    let code = match code {
        8 | 127 => 127,
        13 | 27 => code as i16,
        32..=95 => code as i16,
        _ => 0,
    };
    KeyEvent { code }
}

/// Canonical code for the scan code of an extended sequence.
pub fn translate_extended(scan: u8) -> KeyEvent {
    let code = EXTENDED_KEYS
        .iter()
        .find(|(s, _)| *s == scan)
        .map_or(0, |(_, code)| *code);
    KeyEvent { code }
}

/// Normalize one raw read. `next` supplies the second unit of an extended
/// sequence. Total: every input yields exactly one canonical code.
pub fn normalize(first: Option<u8>, next: impl FnOnce() -> Option<u8>) -> KeyEvent {
    match first {
        None => KeyEvent::NONE,
        Some(marker) if EXTENDED_MARKERS.contains(&marker) => {
            next().map_or(KeyEvent::NONE, translate_extended)
        }
        Some(raw) => translate_char(raw),
    }
}

/// Type-ahead buffer between the host keyboard and the guest.
///
/// Raw input is normalized on the way in, so suppressed keys never take a
/// slot. A key that arrives while all slots are taken is dropped and the
/// host sounds a short alert.
#[derive(Debug, Default)]
pub struct KeyBuffer {
    keys: VecDeque<KeyEvent>,
}

impl KeyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Move everything the host has waiting into the buffer.
    pub fn fill<P: HostPlatform>(&mut self, host: &mut P) {
        while let Some(first) = host.raw_key_poll() {
            let key = normalize(Some(first), || host.raw_key_poll());
            if key.is_none() {
                continue;
            }
            if self.keys.len() >= KEY_BUFFER_LEN {
                debug!(code = key.code, "[KEYS] buffer full, key dropped");
                host.emit_tone(FULL_ALERT_FREQUENCY, FULL_ALERT_MS, None);
            } else {
                self.keys.push_back(key);
            }
        }
    }

    /// Non-blocking read of the oldest key.
    pub fn poll<P: HostPlatform>(&mut self, host: &mut P) -> KeyEvent {
        self.fill(host);
        self.keys.pop_front().unwrap_or(KeyEvent::NONE)
    }

    /// Block until a key arrives. A closed keyboard yields `NONE` once the
    /// buffer is drained.
    pub fn wait<P: HostPlatform>(&mut self, host: &mut P) -> KeyEvent {
        loop {
            let key = self.poll(host);
            if !key.is_none() {
                return key;
            }
            if host.keyboard_closed() {
                return KeyEvent::NONE;
            }
            host.idle();
        }
    }
}
