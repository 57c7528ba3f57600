//! Test collaborators for iobeam-embedded
//!
//! This crate provides:
//! - A scripted transport that replays canned responses in chosen fragments
//!   and records every byte the client sends
//! - An in-memory storage with open/close accounting
//! - A manual clock that yields scripted readings
//! - Helpers to build and split HTTP responses
//!
//! Every collaborator is a cheap `Clone` over shared state, so a test can hand
//! one copy to a `Session` and keep another for assertions.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use iobeam_embedded::{
    ByteSink, ByteSource, Clock, Connector, OpenMode, ProtocolError, ProtocolResult, Socket,
    Storage, StorageError,
};
use parking_lot::Mutex;

/// Address every scripted lookup resolves to
pub const SCRIPTED_ADDR: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

// ============================================================================
// Response Helpers
// ============================================================================

/// Build a `Content-Length` delimited response with a JSON content type
pub fn http_response(status: u16, reason: &str, body: &str) -> Bytes {
    Bytes::from(format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    ))
}

/// Split `data` at the given offsets, dropping empty pieces
pub fn split_at(data: &[u8], points: &[usize]) -> Vec<Bytes> {
    let mut pieces = Vec::with_capacity(points.len() + 1);
    let mut start = 0;
    for &point in points {
        let point = point.min(data.len());
        if point > start {
            pieces.push(Bytes::copy_from_slice(&data[start..point]));
            start = point;
        }
    }
    if start < data.len() {
        pieces.push(Bytes::copy_from_slice(&data[start..]));
    }
    pieces
}

/// Split `data` into pieces of at most `size` bytes
pub fn chunked(data: &[u8], size: usize) -> Vec<Bytes> {
    data.chunks(size.max(1)).map(Bytes::copy_from_slice).collect()
}

// ============================================================================
// Scripted Transport
// ============================================================================

#[derive(Default)]
struct TransportState {
    responses: VecDeque<Vec<Bytes>>,
    requests: Vec<Vec<u8>>,
    resolves: usize,
    connects: usize,
    closes: usize,
    fail_resolve: bool,
    fail_connect: bool,
    fail_write: bool,
    write_limit: Option<usize>,
}

/// Connector whose sockets replay queued responses, one per connection
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<TransportState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next connection, delivered one fragment
    /// per read
    pub fn respond<I, B>(&self, fragments: I) -> &Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        self.state.lock().responses.push_back(fragments);
        self
    }

    /// Queue a complete response delivered in a single read
    pub fn respond_once(&self, response: impl Into<Bytes>) -> &Self {
        self.respond([response.into()])
    }

    pub fn fail_resolve(&self, fail: bool) {
        self.state.lock().fail_resolve = fail;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    pub fn fail_write(&self, fail: bool) {
        self.state.lock().fail_write = fail;
    }

    /// Cap the bytes a single socket write accepts
    pub fn limit_writes(&self, limit: usize) {
        self.state.lock().write_limit = Some(limit);
    }

    /// Raw bytes sent on each connection, in connection order
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.state.lock().requests.clone()
    }

    /// Request sent on connection `index`, as text
    pub fn request_text(&self, index: usize) -> Option<String> {
        let state = self.state.lock();
        state
            .requests
            .get(index)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Body of the request sent on connection `index`
    pub fn request_body(&self, index: usize) -> Option<String> {
        let text = self.request_text(index)?;
        let (_, body) = text.split_once("\r\n\r\n")?;
        Some(body.to_string())
    }

    pub fn resolves(&self) -> usize {
        self.state.lock().resolves
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    /// Connections opened and not yet closed
    pub fn open_sockets(&self) -> usize {
        let state = self.state.lock();
        state.connects - state.closes
    }

    /// Responses queued but never served
    pub fn pending_responses(&self) -> usize {
        self.state.lock().responses.len()
    }
}

impl Connector for ScriptedConnector {
    type Socket = ScriptedSocket;

    fn resolve(&mut self, _host: &str) -> ProtocolResult<Ipv4Addr> {
        let mut state = self.state.lock();
        state.resolves += 1;
        if state.fail_resolve {
            return Err(ProtocolError::Dns);
        }
        Ok(SCRIPTED_ADDR)
    }

    fn connect(&mut self, _addr: SocketAddrV4) -> ProtocolResult<ScriptedSocket> {
        let mut state = self.state.lock();
        if state.fail_connect {
            return Err(ProtocolError::Connect);
        }
        state.connects += 1;
        state.requests.push(Vec::new());
        let index = state.requests.len() - 1;
        let incoming = state.responses.pop_front().unwrap_or_default();
        Ok(ScriptedSocket {
            state: Arc::clone(&self.state),
            index,
            incoming: incoming.into(),
            closed: false,
        })
    }
}

/// One scripted connection
pub struct ScriptedSocket {
    state: Arc<Mutex<TransportState>>,
    index: usize,
    incoming: VecDeque<Bytes>,
    closed: bool,
}

impl ByteSink for ScriptedSocket {
    fn write(&mut self, data: &[u8]) -> ProtocolResult<usize> {
        let mut state = self.state.lock();
        if self.closed || state.fail_write {
            return Err(ProtocolError::SocketWrite);
        }
        let n = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        state.requests[self.index].extend_from_slice(&data[..n]);
        Ok(n)
    }
}

impl ByteSource for ScriptedSocket {
    fn read(&mut self, buf: &mut [u8]) -> ProtocolResult<usize> {
        if self.closed {
            return Err(ProtocolError::SocketRead);
        }
        let Some(fragment) = self.incoming.front_mut() else {
            return Ok(0);
        };
        let n = fragment.len().min(buf.len());
        buf[..n].copy_from_slice(&fragment[..n]);
        fragment.advance(n);
        if fragment.is_empty() {
            self.incoming.pop_front();
        }
        Ok(n)
    }
}

impl Socket for ScriptedSocket {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().closes += 1;
        }
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

#[derive(Default)]
struct StorageState {
    files: HashMap<String, Vec<u8>>,
    opens: usize,
    closes: usize,
    fail_writes: bool,
}

/// Named byte records held in memory
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<StorageState>>,
}

/// Handle returned by [`MemoryStorage::open`]
#[derive(Debug)]
pub struct MemoryFile {
    name: String,
    mode: OpenMode,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of record `name`
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(name).cloned()
    }

    /// Replace record `name`
    pub fn put(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.state.lock().files.insert(name.to_string(), data.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().files.contains_key(name)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Handles opened and not yet closed
    pub fn open_files(&self) -> usize {
        let state = self.state.lock();
        state.opens - state.closes
    }
}

impl Storage for MemoryStorage {
    type File = MemoryFile;

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<MemoryFile, StorageError> {
        let mut state = self.state.lock();
        match mode {
            OpenMode::Create => {
                state.files.entry(name.to_string()).or_default();
            }
            OpenMode::Read => {
                if !state.files.contains_key(name) {
                    return Err(StorageError::NotFound);
                }
            }
            // Write truncates, like a file opened for rewrite
            OpenMode::Write => match state.files.get_mut(name) {
                Some(record) => record.clear(),
                None => return Err(StorageError::NotFound),
            },
        }
        state.opens += 1;
        Ok(MemoryFile {
            name: name.to_string(),
            mode,
        })
    }

    fn read(
        &mut self,
        file: &mut MemoryFile,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        let state = self.state.lock();
        let data = state.files.get(&file.name).ok_or(StorageError::NotFound)?;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write(
        &mut self,
        file: &mut MemoryFile,
        offset: usize,
        data: &[u8],
    ) -> Result<usize, StorageError> {
        let mut state = self.state.lock();
        if state.fail_writes || file.mode == OpenMode::Read {
            return Err(StorageError::Io);
        }
        let record = state
            .files
            .get_mut(&file.name)
            .ok_or(StorageError::NotFound)?;
        let end = offset + data.len();
        if record.len() < end {
            record.resize(end, 0);
        }
        record[offset..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn close(&mut self, _file: MemoryFile) {
        self.state.lock().closes += 1;
    }

    fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        self.state
            .lock()
            .files
            .remove(name)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

// ============================================================================
// Manual Clock
// ============================================================================

#[derive(Default)]
struct ClockState {
    readings: VecDeque<u64>,
    current: u64,
}

/// Clock that returns scripted readings in order, then repeats the last one
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ClockState>>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        let clock = Self::default();
        clock.set(start);
        clock
    }

    /// Queue readings returned by the next `millis()` calls
    pub fn script(&self, readings: impl IntoIterator<Item = u64>) {
        self.state.lock().readings.extend(readings);
    }

    pub fn set(&self, millis: u64) {
        let mut state = self.state.lock();
        state.readings.clear();
        state.current = millis;
    }

    pub fn advance(&self, millis: u64) {
        self.state.lock().current += millis;
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        let mut state = self.state.lock();
        if let Some(next) = state.readings.pop_front() {
            state.current = next;
        }
        state.current
    }
}
