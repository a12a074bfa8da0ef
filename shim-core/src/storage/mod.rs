//! Storage abstractions behind the channel table.
//!
//! - `HostStorage`: line-oriented open/read/write/close on device paths
//! - `MemoryStorage`: in-memory implementation
//! - `NativeStorage`: real files under a root directory

mod memory;
mod native;

pub use memory::MemoryStorage;
pub use native::NativeStorage;

use crate::error::ShimResult;

/// How a path is opened on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Read,
    /// Create or truncate.
    Write,
    /// Create or extend.
    Append,
}

/// Line-oriented storage primitives consumed by the channel table.
pub trait HostStorage: Send {
    /// Concrete open resource.
    type File: Send;

    fn open_path(&mut self, path: &str, mode: StorageMode) -> ShimResult<Self::File>;

    /// Read one line without its terminator. Returns None at end of data.
    fn read_line(&mut self, file: &mut Self::File) -> ShimResult<Option<String>>;

    /// True if no further line can be read from `file`.
    fn is_exhausted(&mut self, file: &mut Self::File) -> ShimResult<bool>;

    fn write_line(&mut self, file: &mut Self::File, text: &str) -> ShimResult<()>;

    fn close_path(&mut self, file: Self::File) -> ShimResult<()>;
}

/// Split a device path into its device prefix (with colon) and file name.
///
/// # Examples
/// ```
/// use shim_core::storage::split_device;
/// assert_eq!(split_device("cas1:data"), (Some("CAS1:".to_string()), "DATA".to_string()));
/// assert_eq!(split_device("hello.txt"), (None, "HELLO.TXT".to_string()));
/// ```
pub fn split_device(path: &str) -> (Option<String>, String) {
    let upper = path.trim().to_uppercase();
    match upper.find(':') {
        Some(pos) => (
            Some(upper[..=pos].to_string()),
            upper[pos + 1..].to_string(),
        ),
        None => (None, upper),
    }
}
