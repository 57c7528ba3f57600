//! Persisted device identity
//!
//! Record layout on the storage collaborator:
//!
//! ```text
//! +----------------+--------------------+---------------------+
//! | magic (8)      | length N (4, LE)   | device id (N bytes) |
//! | "iobeamid"     | 16 <= N <= 48      | UTF-8, no NUL       |
//! +----------------+--------------------+---------------------+
//! ```
//!
//! A missing file, a foreign magic tag, an out-of-range length and a short
//! read all look the same to the caller: no identity, register again.

use core::fmt;
use core::ops::Deref;

use crate::error::{ProtocolError, ProtocolResult};
use crate::io::{OpenMode, Storage, StorageError};

/// Longest device id the API hands out
pub const MAX_DEVICE_ID_LEN: usize = 48;

/// Shortest device id accepted from storage
pub const MIN_DEVICE_ID_LEN: usize = 16;

/// Tag at the start of every identity record
pub const RECORD_MAGIC: [u8; 8] = *b"iobeamid";

const HEADER_LEN: usize = RECORD_MAGIC.len() + 4;

/// Largest encoded record
pub const RECORD_MAX_LEN: usize = HEADER_LEN + MAX_DEVICE_ID_LEN;

/// Server-assigned device identifier, stored inline
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct DeviceId(heapless::String<MAX_DEVICE_ID_LEN>);

impl DeviceId {
    pub fn new(id: &str) -> ProtocolResult<Self> {
        if id.is_empty() {
            return Err(ProtocolError::ParseError("empty device id"));
        }
        let mut inner = heapless::String::new();
        inner
            .push_str(id)
            .map_err(|_| ProtocolError::IdTooLong(id.len()))?;
        Ok(Self(inner))
    }

    pub fn from_utf8(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() > MAX_DEVICE_ID_LEN {
            return Err(ProtocolError::IdTooLong(bytes.len()));
        }
        let id = core::str::from_utf8(bytes)
            .map_err(|_| ProtocolError::ParseError("device id is not utf-8"))?;
        Self::new(id)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for DeviceId {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceId").field(&self.as_str()).finish()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read the identity record from `name`, if a valid one exists
pub fn load<S: Storage>(storage: &mut S, name: &str) -> Option<DeviceId> {
    let mut file = match storage.open(name, OpenMode::Read) {
        Ok(file) => file,
        Err(e) => {
            debug!("no identity record in {}: {}", name, e);
            return None;
        }
    };
    let id = read_record(storage, &mut file);
    storage.close(file);

    match &id {
        Some(id) => debug!("loaded device id {}", id),
        None => warn!("identity record in {} is invalid, ignoring", name),
    }
    id
}

fn read_record<S: Storage>(storage: &mut S, file: &mut S::File) -> Option<DeviceId> {
    let mut header = [0u8; HEADER_LEN];
    if storage.read(file, 0, &mut header).ok()? != HEADER_LEN {
        return None;
    }
    if header[..RECORD_MAGIC.len()] != RECORD_MAGIC {
        return None;
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&header[RECORD_MAGIC.len()..]);
    let len = u32::from_le_bytes(len_bytes) as usize;
    if !(MIN_DEVICE_ID_LEN..=MAX_DEVICE_ID_LEN).contains(&len) {
        return None;
    }

    let mut payload = [0u8; MAX_DEVICE_ID_LEN];
    if storage.read(file, HEADER_LEN, &mut payload[..len]).ok()? != len {
        return None;
    }
    DeviceId::from_utf8(&payload[..len]).ok()
}

/// Encode the record for `id` into `out`, returning its length
pub fn encode(id: &DeviceId, out: &mut [u8; RECORD_MAX_LEN]) -> usize {
    let payload = id.as_bytes();
    out[..RECORD_MAGIC.len()].copy_from_slice(&RECORD_MAGIC);
    out[RECORD_MAGIC.len()..HEADER_LEN].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    out[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
    HEADER_LEN + payload.len()
}

/// Persist `id` to `name`, creating the record if it does not exist yet
pub fn save<S: Storage>(storage: &mut S, name: &str, id: &DeviceId) -> Result<(), StorageError> {
    let mut record = [0u8; RECORD_MAX_LEN];
    let len = encode(id, &mut record);

    let mut file = match storage.open(name, OpenMode::Write) {
        Ok(file) => file,
        Err(StorageError::NotFound) => {
            let created = storage.open(name, OpenMode::Create)?;
            storage.close(created);
            storage.open(name, OpenMode::Write)?
        }
        Err(e) => return Err(e),
    };

    let written = storage.write(&mut file, 0, &record[..len]);
    storage.close(file);
    match written? {
        n if n == len => {
            debug!("saved device id {} ({} bytes)", id, len);
            Ok(())
        }
        n => {
            warn!("short identity write: {} of {} bytes", n, len);
            Err(StorageError::Io)
        }
    }
}

/// Remove the record at `name`; a record that is already gone is fine
pub fn erase<S: Storage>(storage: &mut S, name: &str) -> Result<(), StorageError> {
    match storage.delete(name) {
        Ok(()) | Err(StorageError::NotFound) => Ok(()),
        Err(e) => Err(e),
    }
}
