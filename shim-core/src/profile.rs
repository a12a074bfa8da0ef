//! Host profiles: the data side of capability negotiation.
//!
//! A profile is a JSON document listing the display modes to try (in order of
//! preference), the device prefixes behind each channel zone, the physical
//! palette and the default tone volume. Every key is optional.
//!
//! ```json
//! {
//!   "displayModes": [{ "id": 9, "width": 640, "height": 350, "textWidth": 80 }],
//!   "devices": { "cassette": "CAS1:", "diskA": "A:", "diskB": "B:" },
//!   "palette": [0, 1, 2, 3, 4, 5, 6, 15],
//!   "volume": 15
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ShimResult;
use crate::font::GLYPH_SIZE;
use crate::probe::TEXT_HEIGHT;

/// Number of entries in the logical-to-physical color table.
pub const PALETTE_SIZE: usize = 8;

/// Loudest tone volume on the extended sound chip.
pub const MAX_VOLUME: u8 = 15;

/// One candidate display configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayCandidate {
    pub id: u8,
    pub width: u32,
    pub height: u32,
    pub text_width: u8,
}

impl DisplayCandidate {
    pub const fn new(id: u8, width: u32, height: u32, text_width: u8) -> Self {
        Self {
            id,
            width,
            height,
            text_width,
        }
    }

    /// Geometry a shim can drive: at least one text column, and for pixel
    /// modes room for every text cell as a full 8x8 glyph.
    pub fn is_usable(&self) -> bool {
        if self.text_width == 0 {
            return false;
        }
        match (self.width, self.height) {
            (0, 0) => true,
            (0, _) | (_, 0) => false,
            (width, height) => {
                width >= self.text_width as u32 * GLYPH_SIZE as u32
                    && height >= TEXT_HEIGHT as u32 * GLYPH_SIZE as u32
            }
        }
    }
}

/// Descending preference: EGA hi-res, CGA hi-res, CGA medium-res.
pub const DEFAULT_DISPLAY_MODES: [DisplayCandidate; 3] = [
    DisplayCandidate::new(9, 640, 350, 80),
    DisplayCandidate::new(2, 640, 200, 80),
    DisplayCandidate::new(1, 320, 200, 40),
];

/// Path prefixes for the physical zones behind logical channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevicePrefixes {
    pub cassette: String,
    pub disk_a: String,
    pub disk_b: String,
}

impl Default for DevicePrefixes {
    fn default() -> Self {
        Self {
            cassette: "CAS1:".to_string(),
            disk_a: "A:".to_string(),
            disk_b: "B:".to_string(),
        }
    }
}

/// Host profile schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostProfile {
    pub display_modes: Vec<DisplayCandidate>,
    pub devices: DevicePrefixes,
    pub palette: [u8; PALETTE_SIZE],
    pub volume: u8,
    pub seed: Option<u64>,
}

impl Default for HostProfile {
    fn default() -> Self {
        Self {
            display_modes: DEFAULT_DISPLAY_MODES.to_vec(),
            devices: DevicePrefixes::default(),
            palette: [0, 1, 2, 3, 4, 5, 6, 15],
            volume: MAX_VOLUME,
            seed: None,
        }
    }
}

impl HostProfile {
    /// Parse a profile from JSON text.
    pub fn from_json(text: &str) -> ShimResult<Self> {
        let mut profile: HostProfile = serde_json::from_str(text)?;
        profile.volume = profile.volume.min(MAX_VOLUME);
        Ok(profile)
    }
}

/// Load a profile from a JSON file.
pub fn load_profile_from_path(path: &std::path::Path) -> ShimResult<HostProfile> {
    let text = std::fs::read_to_string(path)?;
    HostProfile::from_json(&text)
}
