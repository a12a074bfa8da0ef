//! Logical channel table.
//!
//! Eight slots multiplex guest channel numbers onto host storage. The guest
//! addresses an open channel by its logical number (1..=8); opening with
//! logical 0 binds the lowest unbound number in the first free slot.
//!
//! The logical number also selects the physical side of the channel,
//! regardless of what the caller asks for:
//! - low bit: even = input, odd = output
//! - `(logical / 2) % 4`: zone 0 cassette, 1 current root, 2 disk A, 3 disk B

use tracing::{trace, warn};

use crate::error::{FailureKind, ShimError, ShimResult};
use crate::profile::DevicePrefixes;
use crate::storage::{HostStorage, StorageMode};

/// Number of handle slots.
pub const HANDLE_SLOTS: usize = 8;

/// Result code shared by every channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ChannelStatus {
    Ok = 0,
    EndOfData = 1,
    Failed = -1,
}

impl ChannelStatus {
    /// Numeric code seen by the guest.
    pub fn code(self) -> i8 {
        self as i8
    }
}

/// Mode requested by the caller. Recorded for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Physical zone behind a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Append-mostly tape device.
    Cassette,
    /// No prefix.
    CurrentRoot,
    DiskA,
    DiskB,
}

/// Direction and zone derived from a logical number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub direction: Direction,
    pub zone: Zone,
}

impl Channel {
    pub fn for_logical(logical: u8) -> Self {
        let direction = if logical & 1 == 0 {
            Direction::Input
        } else {
            Direction::Output
        };
        let zone = match (logical / 2) % 4 {
            0 => Zone::Cassette,
            1 => Zone::CurrentRoot,
            2 => Zone::DiskA,
            _ => Zone::DiskB,
        };
        Self { direction, zone }
    }

    /// Host storage mode for this channel.
    pub fn storage_mode(&self) -> StorageMode {
        match (self.direction, self.zone) {
            (Direction::Input, _) => StorageMode::Read,
            (Direction::Output, Zone::Cassette) => StorageMode::Append,
            (Direction::Output, _) => StorageMode::Write,
        }
    }

    /// Full device path for a guest file name.
    pub fn device_path(&self, devices: &DevicePrefixes, name: &str) -> String {
        let prefix = match self.zone {
            Zone::Cassette => devices.cassette.as_str(),
            Zone::CurrentRoot => "",
            Zone::DiskA => devices.disk_a.as_str(),
            Zone::DiskB => devices.disk_b.as_str(),
        };
        format!("{}{}", prefix, name)
    }
}

struct OpenHandle<F> {
    logical: u8,
    channel: Channel,
    path: String,
    file: F,
    eof: bool,
}

/// The channel table and the storage it multiplexes.
pub struct HandleTable<S: HostStorage> {
    storage: S,
    devices: DevicePrefixes,
    slots: [Option<OpenHandle<S::File>>; HANDLE_SLOTS],
    last_bound: Option<u8>,
    last_error: Option<FailureKind>,
}

impl<S: HostStorage> HandleTable<S> {
    pub fn new(storage: S, devices: DevicePrefixes) -> Self {
        Self {
            storage,
            devices,
            slots: Default::default(),
            last_bound: None,
            last_error: None,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Logical number bound by the most recent successful open.
    pub fn last_bound(&self) -> Option<u8> {
        self.last_bound
    }

    /// Kind of the most recent failure, cleared by the next successful call.
    pub fn last_error(&self) -> Option<FailureKind> {
        self.last_error
    }

    pub fn is_open(&self, logical: u8) -> bool {
        self.resolve(logical).is_ok()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// End-of-data flag of an open channel.
    pub fn is_eof(&self, logical: u8) -> Option<bool> {
        let slot = self.resolve(logical).ok()?;
        self.slots[slot].as_ref().map(|h| h.eof)
    }

    /// Slot index (0-based) of an already open logical number.
    pub fn resolve(&self, logical: u8) -> ShimResult<usize> {
        if logical == 0 {
            return Err(ShimError::HandleNotFound(logical));
        }
        self.slots
            .iter()
            .position(|s| matches!(s, Some(h) if h.logical == logical))
            .ok_or(ShimError::HandleNotFound(logical))
    }

    /// Slot and logical number to use for an open request.
    fn resolve_for_open(&self, logical: u8) -> ShimResult<(usize, u8)> {
        if logical != 0 {
            if let Ok(slot) = self.resolve(logical) {
                return Ok((slot, logical));
            }
            if logical as usize > HANDLE_SLOTS {
                return Err(ShimError::HandleNotFound(logical));
            }
        }
        let free = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ShimError::NoFreeHandle)?;
        if logical != 0 {
            return Ok((free, logical));
        }
        // Every occupied slot holds one distinct number, so one is left
        let bound = (1..=HANDLE_SLOTS as u8)
            .find(|&n| self.resolve(n).is_err())
            .ok_or(ShimError::NoFreeHandle)?;
        Ok((free, bound))
    }

    /// Open `name` on the channel selected by `logical`.
    ///
    /// `mode` is advisory; the logical number decides the direction.
    pub fn open(&mut self, logical: u8, mode: OpenMode, name: &str) -> ChannelStatus {
        let result = self.try_open(logical, mode, name);
        self.finish("open", logical, result.map(eof_status))
    }

    fn try_open(&mut self, logical: u8, mode: OpenMode, name: &str) -> ShimResult<bool> {
        let (slot, bound) = self.resolve_for_open(logical)?;

        if let Some(previous) = self.slots[slot].take() {
            trace!(logical = bound, path = %previous.path, "[CHAN] reopen closes previous");
            if let Err(e) = self.storage.close_path(previous.file) {
                warn!(logical = bound, error = %e, "[CHAN] close on reopen failed");
            }
        }

        let channel = Channel::for_logical(logical);
        let path = channel.device_path(&self.devices, name);
        trace!(logical = bound, ?mode, ?channel, path = %path, "[CHAN] open");

        let mut file = self.storage.open_path(&path, channel.storage_mode())?;
        let eof = match channel.direction {
            Direction::Input => self.storage.is_exhausted(&mut file)?,
            Direction::Output => false,
        };

        self.slots[slot] = Some(OpenHandle {
            logical: bound,
            channel,
            path,
            file,
            eof,
        });
        self.last_bound = Some(bound);
        Ok(eof)
    }

    /// Read the next line from an input channel.
    pub fn read_line(&mut self, logical: u8) -> (String, ChannelStatus) {
        let result = self.try_read_line(logical);
        let (line, result) = match result {
            Ok((line, eof)) => (line, Ok(eof_status(eof))),
            Err(e) => (String::new(), Err(e)),
        };
        (line, self.finish("read", logical, result))
    }

    fn try_read_line(&mut self, logical: u8) -> ShimResult<(String, bool)> {
        let slot = self.resolve(logical)?;
        let handle = self.slots[slot]
            .as_mut()
            .ok_or(ShimError::HandleNotFound(logical))?;
        if handle.channel.direction != Direction::Input {
            return Err(ShimError::WrongDirection(logical));
        }
        if handle.eof {
            return Ok((String::new(), true));
        }
        match self.storage.read_line(&mut handle.file)? {
            Some(line) => {
                handle.eof = self.storage.is_exhausted(&mut handle.file)?;
                Ok((line, false))
            }
            None => {
                handle.eof = true;
                Ok((String::new(), true))
            }
        }
    }

    /// Write one line to an output channel.
    pub fn write_line(&mut self, logical: u8, text: &str) -> ChannelStatus {
        let result = self.try_write_line(logical, text);
        self.finish("write", logical, result.map(eof_status))
    }

    fn try_write_line(&mut self, logical: u8, text: &str) -> ShimResult<bool> {
        let slot = self.resolve(logical)?;
        let handle = self.slots[slot]
            .as_mut()
            .ok_or(ShimError::HandleNotFound(logical))?;
        if handle.channel.direction != Direction::Output {
            return Err(ShimError::WrongDirection(logical));
        }
        self.storage.write_line(&mut handle.file, text)?;
        handle.eof = self.storage.is_exhausted(&mut handle.file)?;
        Ok(handle.eof)
    }

    /// Close a channel. The slot is released even if the host close fails.
    pub fn close(&mut self, logical: u8) -> ChannelStatus {
        let result = self.try_close(logical);
        self.finish("close", logical, result.map(|_| ChannelStatus::Ok))
    }

    fn try_close(&mut self, logical: u8) -> ShimResult<()> {
        let slot = self.resolve(logical)?;
        match self.slots[slot].take() {
            Some(handle) => self.storage.close_path(handle.file),
            None => Err(ShimError::HandleNotFound(logical)),
        }
    }

    /// Close every open channel.
    pub fn close_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(handle) = slot.take() {
                if let Err(e) = self.storage.close_path(handle.file) {
                    warn!(logical = handle.logical, error = %e, "[CHAN] close failed");
                }
            }
        }
    }

    fn finish(
        &mut self,
        op: &'static str,
        logical: u8,
        result: ShimResult<ChannelStatus>,
    ) -> ChannelStatus {
        match result {
            Ok(status) => {
                self.last_error = None;
                trace!(op, logical, ?status, "[CHAN] done");
                status
            }
            Err(e) => {
                warn!(op, logical, error = %e, "[CHAN] failed");
                self.last_error = Some(FailureKind::from(&e));
                ChannelStatus::Failed
            }
        }
    }
}

fn eof_status(eof: bool) -> ChannelStatus {
    if eof {
        ChannelStatus::EndOfData
    } else {
        ChannelStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn table() -> HandleTable<MemoryStorage> {
        let mut storage = MemoryStorage::new();
        storage.add_file_str("DATA", "ALPHA\nBETA");
        storage.add_file_str("EMPTY", "");
        HandleTable::new(storage, DevicePrefixes::default())
    }

    #[test]
    fn test_channel_mapping() {
        assert_eq!(
            Channel::for_logical(0),
            Channel {
                direction: Direction::Input,
                zone: Zone::Cassette
            }
        );
        assert_eq!(Channel::for_logical(1).storage_mode(), StorageMode::Append);
        assert_eq!(Channel::for_logical(3).zone, Zone::CurrentRoot);
        assert_eq!(Channel::for_logical(3).storage_mode(), StorageMode::Write);
        assert_eq!(Channel::for_logical(4).zone, Zone::DiskA);
        assert_eq!(Channel::for_logical(7).zone, Zone::DiskB);
        assert_eq!(Channel::for_logical(8).zone, Zone::Cassette);

        let devices = DevicePrefixes::default();
        assert_eq!(Channel::for_logical(5).device_path(&devices, "X"), "A:X");
        assert_eq!(Channel::for_logical(2).device_path(&devices, "X"), "X");
        assert_eq!(Channel::for_logical(1).device_path(&devices, "X"), "CAS1:X");
    }

    #[test]
    fn test_eight_opens_then_no_free_handle() {
        let mut table = table();
        for logical in 1..=8u8 {
            let name = format!("F{}", logical);
            table.storage_mut().add_file_str(&format!("CAS1:{}", name), "X");
            table.storage_mut().add_file_str(&format!("A:{}", name), "X");
            table.storage_mut().add_file_str(&format!("B:{}", name), "X");
            table.storage_mut().add_file_str(&name, "X");
            assert_eq!(table.open(logical, OpenMode::Read, &name), ChannelStatus::Ok);
        }
        assert_eq!(table.open_count(), HANDLE_SLOTS);

        assert_eq!(table.open(0, OpenMode::Read, "DATA"), ChannelStatus::Failed);
        assert_eq!(table.last_error(), Some(FailureKind::NoFreeHandle));

        assert_eq!(table.close(5), ChannelStatus::Ok);
        // The sentinel derives direction and zone from 0: cassette input
        table.storage_mut().add_file_str("CAS1:SIDE2", "X");
        assert_eq!(table.open(0, OpenMode::Write, "SIDE2"), ChannelStatus::Ok);
        assert_eq!(table.last_bound(), Some(5));
        assert_eq!(table.open_count(), HANDLE_SLOTS);
    }

    #[test]
    fn test_reopen_reuses_slot() {
        let mut table = table();
        assert_eq!(table.open(2, OpenMode::Read, "DATA"), ChannelStatus::Ok);
        assert_eq!(table.read_line(2).0, "ALPHA");
        assert_eq!(table.open(2, OpenMode::Read, "DATA"), ChannelStatus::Ok);
        assert_eq!(table.open_count(), 1);
        assert_eq!(table.read_line(2).0, "ALPHA");
    }

    #[test]
    fn test_read_closed_handle_fails() {
        let mut table = table();
        assert_eq!(table.read_line(2), (String::new(), ChannelStatus::Failed));
        assert_eq!(table.last_error(), Some(FailureKind::HandleNotFound));
        assert_eq!(table.close(3), ChannelStatus::Failed);
        assert_eq!(table.write_line(0, "X"), ChannelStatus::Failed);
    }

    #[test]
    fn test_end_of_data_is_sticky() {
        let mut table = table();
        table.open(2, OpenMode::Read, "DATA");
        assert_eq!(table.read_line(2), ("ALPHA".to_string(), ChannelStatus::Ok));
        assert_eq!(table.is_eof(2), Some(false));
        assert_eq!(table.read_line(2), ("BETA".to_string(), ChannelStatus::Ok));
        assert_eq!(table.is_eof(2), Some(true));
        assert_eq!(table.read_line(2), (String::new(), ChannelStatus::EndOfData));
        assert_eq!(table.read_line(2), (String::new(), ChannelStatus::EndOfData));
    }

    #[test]
    fn test_open_empty_input_sets_eof() {
        let mut table = table();
        assert_eq!(table.open(2, OpenMode::Read, "EMPTY"), ChannelStatus::EndOfData);
        assert_eq!(table.is_eof(2), Some(true));
    }

    #[test]
    fn test_open_missing_is_io_failure() {
        let mut table = table();
        assert_eq!(table.open(2, OpenMode::Read, "MISSING"), ChannelStatus::Failed);
        assert_eq!(table.last_error(), Some(FailureKind::Io));
        assert_eq!(table.open_count(), 0);
    }

    #[test]
    fn test_direction_from_parity() {
        let mut table = table();
        // Asked for read, but 3 is odd: output
        assert_eq!(table.open(3, OpenMode::Read, "NEW"), ChannelStatus::Ok);
        assert_eq!(table.write_line(3, "HELLO"), ChannelStatus::Ok);
        assert_eq!(table.read_line(3).1, ChannelStatus::Failed);
        table.close(3);
        assert_eq!(table.storage().lines("NEW").unwrap(), ["HELLO".to_string()]);

        // Asked for write, but 2 is even: input
        assert_eq!(table.open(2, OpenMode::Write, "NEW"), ChannelStatus::Ok);
        assert_eq!(table.write_line(2, "X"), ChannelStatus::Failed);
        assert_eq!(table.read_line(2), ("HELLO".to_string(), ChannelStatus::Ok));
    }

    #[test]
    fn test_cassette_output_appends() {
        let mut table = table();
        table.storage_mut().add_file_str("CAS1:TAPE", "OLD");
        table.open(1, OpenMode::Write, "TAPE");
        table.write_line(1, "NEW");
        table.close(1);
        assert_eq!(table.storage().lines("CAS1:TAPE").unwrap().len(), 2);
    }

    #[test]
    fn test_logical_never_bound_twice() {
        let mut table = table();
        table.storage_mut().add_file_str("CAS1:TWO", "X");
        assert_eq!(table.open(3, OpenMode::Write, "ONE"), ChannelStatus::Ok);
        assert_eq!(table.open(0, OpenMode::Read, "TWO"), ChannelStatus::Ok);
        // 3 is taken, so the sentinel binds 1
        assert_eq!(table.last_bound(), Some(1));
        table.open(3, OpenMode::Write, "THREE");
        assert_eq!(table.open_count(), 2);
        table.close_all();
        assert_eq!(table.open_count(), 0);
    }
}
