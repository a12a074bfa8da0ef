//! Host filesystem storage.
//!
//! Device prefixes become lower-case sub-directories of the root:
//! `CAS1:TAPE` lives at `<root>/cas1/TAPE`, a bare `NOTES` at `<root>/NOTES`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use super::{split_device, HostStorage, StorageMode};
use crate::error::{ShimError, ShimResult};

/// Files under a root directory.
pub struct NativeStorage {
    root: PathBuf,
}

/// Open native file.
pub enum NativeFile {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

impl NativeStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a device path.
    ///
    /// The device and the file name must each be one plain path component,
    /// so every result stays inside the root.
    pub fn host_path(&self, path: &str) -> ShimResult<PathBuf> {
        let (device, name) = split_device(path);
        if !is_plain_component(&name) {
            return Err(ShimError::NotFound(path.to_string()));
        }
        match device {
            Some(device) => {
                let dir = device.trim_end_matches(':').to_lowercase();
                if !is_plain_component(&dir) {
                    return Err(ShimError::NotFound(path.to_string()));
                }
                Ok(self.root.join(dir).join(name))
            }
            None => Ok(self.root.join(name)),
        }
    }
}

/// True for a single normal component: no separators, no `.` or `..`, no root.
fn is_plain_component(name: &str) -> bool {
    if name.is_empty() || name.contains(&['/', '\\'][..]) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Decode one stored byte per character; bytes past ASCII keep their code.
fn decode_line(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Inverse of `decode_line`. Characters past U+00FF are stored as `?`.
fn encode_line(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(c).unwrap_or(b'?'))
        .collect()
}

impl HostStorage for NativeStorage {
    type File = NativeFile;

    fn open_path(&mut self, path: &str, mode: StorageMode) -> ShimResult<NativeFile> {
        let host = self.host_path(path)?;
        match mode {
            StorageMode::Read => {
                let file = File::open(&host).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => {
                        ShimError::NotFound(host.display().to_string())
                    }
                    _ => ShimError::Io(e),
                })?;
                Ok(NativeFile::Reader(BufReader::new(file)))
            }
            StorageMode::Write | StorageMode::Append => {
                if let Some(parent) = host.parent() {
                    fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(mode == StorageMode::Append)
                    .truncate(mode == StorageMode::Write)
                    .open(&host)?;
                Ok(NativeFile::Writer(BufWriter::new(file)))
            }
        }
    }

    fn read_line(&mut self, file: &mut NativeFile) -> ShimResult<Option<String>> {
        let NativeFile::Reader(reader) = file else {
            return Ok(None);
        };
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        while matches!(line.last(), Some(b'\r' | b'\n')) {
            line.pop();
        }
        Ok(Some(decode_line(&line)))
    }

    fn is_exhausted(&mut self, file: &mut NativeFile) -> ShimResult<bool> {
        match file {
            NativeFile::Reader(reader) => Ok(reader.fill_buf()?.is_empty()),
            NativeFile::Writer(_) => Ok(false),
        }
    }

    fn write_line(&mut self, file: &mut NativeFile, text: &str) -> ShimResult<()> {
        match file {
            NativeFile::Writer(writer) => {
                writer.write_all(&encode_line(text))?;
                writer.write_all(b"\r\n")?;
                Ok(())
            }
            NativeFile::Reader(_) => Err(ShimError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "file is open for input",
            ))),
        }
    }

    fn close_path(&mut self, file: NativeFile) -> ShimResult<()> {
        if let NativeFile::Writer(mut writer) = file {
            writer.flush()?;
        }
        Ok(())
    }
}
