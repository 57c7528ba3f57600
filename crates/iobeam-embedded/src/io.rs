//! Collaborator traits
//!
//! The engine never touches hardware directly. Sockets, persistent storage
//! and the millisecond tick all come in through the traits below, so the
//! same session code runs on a CC3200-class board, an AVR with EEPROM, or a
//! host test harness.

use core::net::{Ipv4Addr, SocketAddrV4};
use core::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

use crate::error::{ProtocolError, ProtocolResult};

/// Something that accepts bytes and reports how many it took.
pub trait ByteSink {
    /// Write some prefix of `data`, returning the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> ProtocolResult<usize>;

    /// Write all of `data`, looping over short writes
    fn write_all(&mut self, mut data: &[u8]) -> ProtocolResult<()> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(ProtocolError::SocketWrite),
                n => data = &data[n.min(data.len())..],
            }
        }
        Ok(())
    }
}

/// Something that yields bytes into a caller-provided buffer.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    fn read(&mut self, buf: &mut [u8]) -> ProtocolResult<usize>;
}

/// A connected stream socket
pub trait Socket: ByteSink + ByteSource {
    /// Release the socket; further use is a caller bug
    fn close(&mut self);
}

/// Opens sockets to the API server
pub trait Connector {
    /// The socket type produced by [`connect`](Connector::connect)
    type Socket: Socket;

    /// Resolve a host name to an IPv4 address
    fn resolve(&mut self, host: &str) -> ProtocolResult<Ipv4Addr>;

    /// Open a stream connection
    fn connect(&mut self, addr: SocketAddrV4) -> ProtocolResult<Self::Socket>;
}

/// File open modes understood by [`Storage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Create,
}

/// Persistent storage failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,

    #[error("storage i/o failed")]
    Io,
}

/// Non-volatile byte storage (flash file system, EEPROM window, ...)
pub trait Storage {
    /// Handle to an open record
    type File;

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<Self::File, StorageError>;

    fn read(
        &mut self,
        file: &mut Self::File,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError>;

    fn write(
        &mut self,
        file: &mut Self::File,
        offset: usize,
        data: &[u8],
    ) -> Result<usize, StorageError>;

    fn close(&mut self, file: Self::File);

    fn delete(&mut self, name: &str) -> Result<(), StorageError>;
}

/// Monotonic milliseconds since device start
pub trait Clock {
    fn millis(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn millis(&self) -> u64 {
        (**self).millis()
    }
}

/// Millisecond counter driven from a periodic timer interrupt.
///
/// [`tick`](TickCounter::tick) is the only thing the interrupt handler may
/// call: one relaxed atomic increment, no I/O, no allocation. The counter is
/// 32 bits wide and wraps after ~49.7 days.
#[derive(Debug, Default)]
pub struct TickCounter {
    millis: AtomicU32,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            millis: AtomicU32::new(0),
        }
    }

    /// Advance by one millisecond
    #[inline]
    pub fn tick(&self) {
        self.millis.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero the counter
    pub fn reset(&self) {
        self.millis.store(0, Ordering::Relaxed);
    }
}

impl Clock for TickCounter {
    fn millis(&self) -> u64 {
        self.millis.load(Ordering::Relaxed) as u64
    }
}
