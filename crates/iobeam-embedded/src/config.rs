//! Session configuration

use crate::{API_DEFAULT_PORT, API_DEFAULT_SERVER, DEVICE_FILE};

/// Credentials and endpoint for one [`Session`](crate::Session).
///
/// Strings are borrowed; the caller keeps them alive for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig<'a> {
    pub project_id: u32,
    pub project_token: &'a str,
    pub host: &'a str,
    pub port: u16,
    pub device_file: &'a str,
}

impl<'a> SessionConfig<'a> {
    /// Config for the public API endpoint
    pub fn new(project_id: u32, project_token: &'a str) -> Self {
        Self {
            project_id,
            project_token,
            host: API_DEFAULT_SERVER,
            port: API_DEFAULT_PORT,
            device_file: DEVICE_FILE,
        }
    }

    /// Set the API host name
    pub fn with_host(mut self, host: &'a str) -> Self {
        self.host = host;
        self
    }

    /// Set the API port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the storage record name for the device identity
    pub fn with_device_file(mut self, name: &'a str) -> Self {
        self.device_file = name;
        self
    }
}
