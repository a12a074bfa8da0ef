//! Capability probing: negotiate one display mode and a sound level at startup.

use tracing::{debug, warn};

use crate::platform::HostPlatform;
use crate::profile::{DisplayCandidate, HostProfile, PALETTE_SIZE};

/// Text rows on every host.
pub const TEXT_HEIGHT: u8 = 24;

/// Text columns of the fallback configuration.
pub const MINIMAL_TEXT_WIDTH: u8 = 40;

/// Sound capability of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundLevel {
    /// The sound layer faulted during probing; tones are silent.
    None,
    /// Single voice, no volume control.
    Basic,
    /// Volume-capable sound chip.
    Extended,
}

/// Negotiated host configuration. Fixed for the lifetime of a shim.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub mode_id: u8,
    /// Zero in the text-only configuration.
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub text_width: u8,
    pub text_height: u8,
    pub sound: SoundLevel,
    /// Logical color slot -> physical color code.
    pub palette: [u8; PALETTE_SIZE],
}

impl Configuration {
    /// Configuration committed to a successful display candidate.
    pub fn from_candidate(candidate: &DisplayCandidate, sound: SoundLevel) -> Self {
        Self {
            mode_id: candidate.id,
            pixel_width: candidate.width,
            pixel_height: candidate.height,
            text_width: candidate.text_width,
            text_height: TEXT_HEIGHT,
            sound,
            palette: HostProfile::default().palette,
        }
    }

    /// Text-only fallback: mode 0, 40 columns, no pixel graphics.
    pub fn minimal(sound: SoundLevel) -> Self {
        Self {
            mode_id: 0,
            pixel_width: 0,
            pixel_height: 0,
            text_width: MINIMAL_TEXT_WIDTH,
            text_height: TEXT_HEIGHT,
            sound,
            palette: HostProfile::default().palette,
        }
    }

    pub fn has_graphics(&self) -> bool {
        self.pixel_width > 0 && self.pixel_height > 0
    }

    pub fn with_palette(mut self, palette: [u8; PALETTE_SIZE]) -> Self {
        self.palette = palette;
        self
    }
}

/// Try `candidates` in order and commit to the first the host accepts.
///
/// A candidate that errors is treated exactly like one that reports failure.
/// Candidates with unusable geometry are skipped without asking the host.
/// When nothing is accepted the host is put back into mode 0 and the minimal
/// configuration is returned. Sound is probed once, independently.
pub fn probe<P: HostPlatform>(host: &mut P, candidates: &[DisplayCandidate]) -> Configuration {
    let sound = probe_sound(host);

    for candidate in candidates {
        if !candidate.is_usable() {
            warn!(
                mode = candidate.id,
                width = candidate.width,
                height = candidate.height,
                text_width = candidate.text_width,
                "[PROBE] skipping candidate with unusable geometry"
            );
            continue;
        }
        match host.try_set_display_mode(candidate.id) {
            Ok(true) => {
                debug!(mode = candidate.id, "[PROBE] display mode accepted");
                return Configuration::from_candidate(candidate, sound);
            }
            Ok(false) => {
                debug!(mode = candidate.id, "[PROBE] display mode rejected");
            }
            Err(e) => {
                warn!(mode = candidate.id, error = %e, "[PROBE] display mode faulted");
            }
        }
    }

    // Best effort: the host may already be in text mode
    if let Err(e) = host.try_set_display_mode(0) {
        warn!(error = %e, "[PROBE] could not restore text mode");
    }
    debug!("[PROBE] falling back to minimal text configuration");
    Configuration::minimal(sound)
}

/// Probe using the candidates and palette of a host profile.
pub fn probe_with_profile<P: HostPlatform>(host: &mut P, profile: &HostProfile) -> Configuration {
    probe(host, &profile.display_modes).with_palette(profile.palette)
}

fn probe_sound<P: HostPlatform>(host: &mut P) -> SoundLevel {
    match host.try_set_extended_sound() {
        Ok(true) => SoundLevel::Extended,
        Ok(false) => SoundLevel::Basic,
        Err(e) => {
            warn!(error = %e, "[PROBE] sound probe faulted");
            SoundLevel::None
        }
    }
}
