//! Session protocol
//!
//! A [`Session`] owns the device identity, the clock offset and the
//! collaborators. Every public call runs one full cycle before returning:
//!
//! ```text
//! Idle -> Connecting -> Sending -> AwaitingResponse -> Parsed -> Idle
//! ```
//!
//! The socket is closed and the state is back at `Idle` when a call returns,
//! whether it succeeded or not. Nothing is retried internally.

use core::fmt;
use core::net::{Ipv4Addr, SocketAddrV4};

use crate::buffer::{ScratchBuf, SCRATCH_LEN};
use crate::config::SessionConfig;
use crate::error::{Error, ProtocolError, ProtocolResult, Result};
use crate::http::{
    formatted_len, Method, RequestWriter, ResponseAssembler, CONNECTION_CLOSE, CONTENT_TYPE_JSON,
    HEADER_AUTHORIZATION, HEADER_CONNECTION, HEADER_CONTENT_LENGTH, HEADER_CONTENT_TYPE,
    HEADER_HOST, STATUS_CREATED, STATUS_OK,
};
use crate::identity::{self, DeviceId};
use crate::io::{Clock, Connector, Socket, Storage};
use crate::json::{self, ImportPayload, RegisterPayload};
use crate::time::{self, Timeval};
use crate::value::Value;
use crate::{RESOURCE_DEVICES, RESOURCE_IMPORTS, RESOURCE_TIME};

/// Where the call in flight is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Idle,
    Connecting,
    Sending,
    AwaitingResponse,
    Parsed,
}

/// One logical iobeam client
pub struct Session<'a, C: Connector, S: Storage, K: Clock> {
    config: SessionConfig<'a>,
    device_id: Option<DeviceId>,
    offset: Option<Timeval>,
    /// Resolved API address, kept until `finish`
    api_addr: Option<Ipv4Addr>,
    socket: Option<C::Socket>,
    state: CallState,
    scratch: ScratchBuf<SCRATCH_LEN>,
    connector: C,
    storage: S,
    clock: K,
}

impl<'a, C: Connector, S: Storage, K: Clock> Session<'a, C, S, K> {
    /// Validate the config and pick up a device identity.
    ///
    /// A pre-provisioned `device_id` is used as is; otherwise the identity
    /// record is loaded from storage, and a missing or invalid record leaves
    /// the session unregistered.
    pub fn new(
        config: SessionConfig<'a>,
        connector: C,
        mut storage: S,
        clock: K,
        device_id: Option<&str>,
    ) -> Result<Self> {
        if config.project_id == 0 {
            return Err(Error::InvalidProjectId);
        }
        if config.project_token.is_empty() {
            return Err(Error::MissingToken);
        }

        let device_id = match device_id {
            Some(id) => Some(DeviceId::new(id).map_err(|_| Error::InvalidDeviceId)?),
            None => identity::load(&mut storage, config.device_file),
        };
        debug!(
            "session for project {} at {}:{}, device {}",
            config.project_id,
            config.host,
            config.port,
            device_id.as_deref().unwrap_or("<unregistered>")
        );

        Ok(Self {
            config,
            device_id,
            offset: None,
            api_addr: None,
            socket: None,
            state: CallState::Idle,
            scratch: ScratchBuf::new(),
            connector,
            storage,
            clock,
        })
    }

    pub fn config(&self) -> &SessionConfig<'a> {
        &self.config
    }

    pub fn is_registered(&self) -> bool {
        self.device_id.is_some()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Offset from the last successful [`start_time_keeping`](Self::start_time_keeping)
    pub fn clock_offset(&self) -> Option<Timeval> {
        self.offset
    }

    pub fn call_state(&self) -> CallState {
        self.state
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Best estimate of server time. Before a clock sync this is just the
    /// local elapsed time.
    pub fn now(&self) -> Timeval {
        self.offset
            .unwrap_or_default()
            .add_millis(self.clock.millis())
    }

    /// Obtain a device id from the server and persist it.
    ///
    /// Returns immediately if the session already has an id.
    pub fn register_device(&mut self) -> Result<()> {
        if let Some(id) = &self.device_id {
            debug!("already registered as {}", id);
            return Ok(());
        }

        let result = self.try_register();
        self.close();
        match result {
            Ok(id) => {
                info!("registered device {}", id);
                self.device_id = Some(id);
                Ok(())
            }
            Err(e) => {
                warn!("device registration failed: {}", e);
                Err(Error::Registration(e))
            }
        }
    }

    fn try_register(&mut self) -> ProtocolResult<DeviceId> {
        self.connect()?;
        let payload = RegisterPayload {
            project_id: self.config.project_id,
        };
        let id = self.transact(
            Method::Post,
            RESOURCE_DEVICES,
            Some(format_args!("{}", payload)),
            STATUS_CREATED,
            parse_device_id,
        )?;
        identity::save(&mut self.storage, self.config.device_file, &id)?;
        Ok(id)
    }

    /// Run one round trip to the time resource and set the clock offset.
    ///
    /// On failure the previous offset, if any, is kept.
    pub fn start_time_keeping(&mut self) -> Result<()> {
        let result = self.try_sync();
        self.close();
        match result {
            Ok(offset) => {
                info!("clock offset {}.{:03}s", offset.sec, offset.msec);
                self.offset = Some(offset);
                Ok(())
            }
            Err(e) => {
                warn!("time sync failed: {}", e);
                Err(Error::TimeSync(e))
            }
        }
    }

    fn try_sync(&mut self) -> ProtocolResult<Timeval> {
        self.connect()?;
        let t0 = self.clock.millis();
        let server = self.transact(Method::Get, RESOURCE_TIME, None, STATUS_OK, |body| {
            if body.is_empty() {
                return Err(ProtocolError::ParseError("empty time response"));
            }
            time::parse_server_time(body)
        })?;
        let t1 = self.clock.millis();
        debug!(
            "server time {}.{:03}s, t0={} t1={}",
            server.sec, server.msec, t0, t1
        );
        Ok(time::estimate_offset(t0, t1, server))
    }

    /// Upload one data point stamped with [`now`](Self::now)
    pub fn send(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let time = self.now();
        self.send_with_time(key, value, time)
    }

    /// Upload one data point with an explicit timestamp
    pub fn send_with_time(
        &mut self,
        key: &str,
        value: impl Into<Value>,
        time: Timeval,
    ) -> Result<()> {
        let value = value.into();
        let result = self.try_send(key, value, time);
        self.close();
        match result {
            Ok(()) => {
                debug!("sent {}={} at {}", key, value, time);
                Ok(())
            }
            Err(e) => {
                warn!("send of {} failed: {}", key, e);
                Err(Error::Send(e))
            }
        }
    }

    fn try_send(&mut self, key: &str, value: Value, time: Timeval) -> ProtocolResult<()> {
        let device_id = self
            .device_id
            .clone()
            .ok_or(ProtocolError::NotRegistered)?;
        value.validate()?;

        self.connect()?;
        let payload = ImportPayload {
            device_id: &device_id,
            project_id: self.config.project_id,
            key,
            time,
            value,
        };
        self.transact(
            Method::Post,
            RESOURCE_IMPORTS,
            Some(format_args!("{}", payload)),
            STATUS_OK,
            |_| Ok(()),
        )
    }

    /// Delete the persisted identity and forget the in-memory one
    pub fn reset_identity(&mut self) -> Result<()> {
        identity::erase(&mut self.storage, self.config.device_file).map_err(Error::Storage)?;
        self.device_id = None;
        info!("device identity reset");
        Ok(())
    }

    /// Tear the session down and hand the collaborators back.
    ///
    /// Credentials, identity, offset and the cached address go with it.
    pub fn finish(mut self) -> (C, S, K) {
        self.close();
        debug!("session for project {} finished", self.config.project_id);
        let Session {
            connector,
            storage,
            clock,
            ..
        } = self;
        (connector, storage, clock)
    }

    fn connect(&mut self) -> ProtocolResult<()> {
        self.state = CallState::Connecting;
        let ip = match self.api_addr {
            Some(ip) => ip,
            None => {
                let ip = self.connector.resolve(self.config.host)?;
                debug!("resolved {} to {}", self.config.host, ip);
                self.api_addr = Some(ip);
                ip
            }
        };
        let socket = self
            .connector
            .connect(SocketAddrV4::new(ip, self.config.port))?;
        self.socket = Some(socket);
        Ok(())
    }

    /// Send one request on the open socket and hand the body to `parse`
    fn transact<T>(
        &mut self,
        method: Method,
        resource: &str,
        body: Option<fmt::Arguments<'_>>,
        expected: u16,
        parse: impl FnOnce(&[u8]) -> ProtocolResult<T>,
    ) -> ProtocolResult<T> {
        self.state = CallState::Sending;
        let socket = self.socket.as_mut().ok_or(ProtocolError::NotConnected)?;

        // The body goes out as one line, so it has to fit the scratch buffer
        // before anything is written
        let body_len = body.map_or(0, formatted_len);
        if body_len > self.scratch.capacity() {
            return Err(ProtocolError::BufferTooSmall {
                needed: body_len,
                have: self.scratch.capacity(),
            });
        }

        let mut writer = RequestWriter::new(&mut *socket, &mut self.scratch);
        writer.start(method, resource)?;
        writer.header(HEADER_HOST, self.config.host)?;
        writer.header(HEADER_CONNECTION, CONNECTION_CLOSE)?;
        writer.header(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON)?;
        if body.is_some() {
            writer.header_fmt(HEADER_CONTENT_LENGTH, format_args!("{}", body_len))?;
        }
        writer.header_fmt(
            HEADER_AUTHORIZATION,
            format_args!("Bearer {}", self.config.project_token),
        )?;
        writer.end_headers()?;
        if let Some(body) = body {
            writer.body_fmt(body, body_len)?;
        }
        trace!("{} {}: {} bytes sent", method, resource, writer.bytes_sent());

        self.state = CallState::AwaitingResponse;
        let mut assembler = ResponseAssembler::new(expected);
        let response = assembler.assemble(socket, &mut self.scratch)?;
        self.state = CallState::Parsed;
        debug!(
            "{} {} -> {} ({} body bytes)",
            method,
            resource,
            response.status,
            response.body.len()
        );
        trace!(
            "< {}",
            core::str::from_utf8(response.body).unwrap_or("<binary>")
        );
        parse(response.body)
    }

    fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            socket.close();
        }
        self.scratch.clear();
        self.state = CallState::Idle;
    }
}

impl<C: Connector, S: Storage, K: Clock> fmt::Debug for Session<'_, C, S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("project_id", &self.config.project_id)
            .field("host", &self.config.host)
            .field("device_id", &self.device_id)
            .field("offset", &self.offset)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Device id from a registration body: the string after `"device_id":`
fn parse_device_id(body: &[u8]) -> ProtocolResult<DeviceId> {
    let raw = json::str_field(body, "device_id")
        .ok_or(ProtocolError::ParseError("missing device_id"))?;
    DeviceId::from_utf8(raw)
}
