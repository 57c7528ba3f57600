//! # iobeam-embedded
//!
//! Telemetry client for the iobeam API, sized for microcontrollers.
//!
//! ## Features
//!
//! - **No heap**: one 256-byte scratch buffer per session
//! - **Fragment tolerant**: responses are reassembled across arbitrarily
//!   split socket reads
//! - **Pluggable**: sockets, storage and the millisecond clock are traits
//!
//! ## Flow
//!
//! ```text
//! register_device()     POST /v1/devices   -> 201, device id persisted
//! start_time_keeping()  GET  /v1/devices/timestamp -> 200, clock offset
//! send(key, value)      POST /v1/imports   -> 200
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use iobeam_embedded::{Session, SessionConfig};
//!
//! let config = SessionConfig::new(42, TOKEN);
//! let mut session = Session::new(config, wifi, flash, &TICKS, None)?;
//! session.register_device()?;
//! session.start_time_keeping()?;
//! session.send("temperature", 21.5)?;
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod log;

pub mod buffer;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod io;
pub mod json;
mod scan;
pub mod session;
pub mod time;
pub mod value;

pub use buffer::{ScratchBuf, SCRATCH_LEN};
pub use config::SessionConfig;
pub use error::{Error, ProtocolError, ProtocolResult, Result};
pub use identity::{DeviceId, MAX_DEVICE_ID_LEN, MIN_DEVICE_ID_LEN, RECORD_MAGIC};
pub use io::{ByteSink, ByteSource, Clock, Connector, OpenMode, Socket, Storage, StorageError, TickCounter};
pub use session::{CallState, Session};
pub use time::Timeval;
pub use value::Value;

/// Default API host
pub const API_DEFAULT_SERVER: &str = "api.iobeam.com";

/// Default API port (plain HTTP)
pub const API_DEFAULT_PORT: u16 = 80;

/// Measurement import resource
pub const RESOURCE_IMPORTS: &str = "/v1/imports";

/// Device registration resource
pub const RESOURCE_DEVICES: &str = "/v1/devices";

/// Server time resource, seconds + microseconds form
pub const RESOURCE_TIME: &str = "/v1/devices/timestamp?timefmt=TIMEVAL";

/// Default storage record name for the device identity
pub const DEVICE_FILE: &str = "iobeam-device-id";
