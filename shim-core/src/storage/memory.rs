//! In-memory storage implementation.

use std::collections::HashMap;

use super::{split_device, HostStorage, StorageMode};
use crate::error::{ShimError, ShimResult};

/// Simple in-memory line store keyed by canonical path.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    files: HashMap<String, Vec<String>>,
}

/// Open cursor into a `MemoryStorage` file.
#[derive(Debug)]
pub struct MemoryFile {
    path: String,
    mode: StorageMode,
    cursor: usize,
}

fn canonical(path: &str) -> String {
    match split_device(path) {
        (Some(device), name) => format!("{}{}", device, name),
        (None, name) => name,
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file from string content, one entry per line.
    pub fn add_file_str(&mut self, path: &str, content: &str) {
        self.files
            .insert(canonical(path), content.lines().map(str::to_string).collect());
    }

    /// Lines currently stored at `path`.
    pub fn lines(&self, path: &str) -> Option<&[String]> {
        self.files.get(&canonical(path)).map(Vec::as_slice)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&canonical(path))
    }
}

impl HostStorage for MemoryStorage {
    type File = MemoryFile;

    fn open_path(&mut self, path: &str, mode: StorageMode) -> ShimResult<MemoryFile> {
        let path = canonical(path);
        match mode {
            StorageMode::Read => {
                if !self.files.contains_key(&path) {
                    return Err(ShimError::NotFound(path));
                }
            }
            StorageMode::Write => {
                self.files.insert(path.clone(), Vec::new());
            }
            StorageMode::Append => {
                self.files.entry(path.clone()).or_default();
            }
        }
        Ok(MemoryFile {
            path,
            mode,
            cursor: 0,
        })
    }

    fn read_line(&mut self, file: &mut MemoryFile) -> ShimResult<Option<String>> {
        let lines = self
            .files
            .get(&file.path)
            .ok_or_else(|| ShimError::NotFound(file.path.clone()))?;
        let line = lines.get(file.cursor).cloned();
        if line.is_some() {
            file.cursor += 1;
        }
        Ok(line)
    }

    fn is_exhausted(&mut self, file: &mut MemoryFile) -> ShimResult<bool> {
        if file.mode != StorageMode::Read {
            return Ok(false);
        }
        Ok(self
            .files
            .get(&file.path)
            .map_or(true, |lines| file.cursor >= lines.len()))
    }

    fn write_line(&mut self, file: &mut MemoryFile, text: &str) -> ShimResult<()> {
        self.files
            .get_mut(&file.path)
            .ok_or_else(|| ShimError::NotFound(file.path.clone()))?
            .push(text.to_string());
        Ok(())
    }

    fn close_path(&mut self, _file: MemoryFile) -> ShimResult<()> {
        Ok(())
    }
}
