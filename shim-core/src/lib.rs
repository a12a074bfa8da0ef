//! Portability shim core
//!
//! This crate lets one guest program drive many host machines through a
//! fixed set of capabilities:
//! - Capability probing of display modes and sound level at startup
//! - Keyboard normalization into one canonical key code space
//! - An 8-slot logical channel table over host storage
//! - Numeric formatting, tones, and bitmap text on raster displays
//!
//! # Architecture
//!
//! The host is reached through two seams:
//! - `HostPlatform` trait: display, keyboard, sound, pixels, clock
//! - `HostStorage` trait: line-oriented files on device paths
//!
//! `Shim` owns the negotiated `Configuration` and all guest-visible state,
//! and exposes one method per capability.

pub mod error;
pub mod font;
pub mod handles;
pub mod keys;
pub mod numfmt;
pub mod platform;
pub mod probe;
pub mod profile;
pub mod raster;
pub mod rng;
pub mod shim;
pub mod storage;
pub mod tone;

pub use error::{FailureKind, ShimError, ShimResult};
pub use handles::{ChannelStatus, HandleTable, OpenMode};
pub use keys::{KeyBuffer, KeyEvent};
pub use platform::{HeadlessPlatform, HostPlatform};
pub use probe::{probe, Configuration, SoundLevel};
pub use profile::{load_profile_from_path, DisplayCandidate, HostProfile};
pub use raster::Window;
pub use shim::{ColorPair, CursorPosition, Shim};
pub use storage::{HostStorage, MemoryStorage, NativeStorage, StorageMode};
