//! TCP transport over `std::net`

use iobeam_embedded::{ByteSink, ByteSource, Connector, ProtocolError, ProtocolResult, Socket};
use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

/// Opens blocking TCP connections with timeouts
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            io_timeout,
        }
    }
}

impl Connector for TcpConnector {
    type Socket = TcpSocket;

    fn resolve(&mut self, host: &str) -> ProtocolResult<Ipv4Addr> {
        let addrs = (host, 0).to_socket_addrs().map_err(|e| {
            warn!("DNS lookup for {} failed: {}", host, e);
            ProtocolError::Dns
        })?;
        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| {
                warn!("No IPv4 address for {}", host);
                ProtocolError::Dns
            })
    }

    fn connect(&mut self, addr: SocketAddrV4) -> ProtocolResult<TcpSocket> {
        let stream = TcpStream::connect_timeout(&SocketAddr::V4(addr), self.connect_timeout)
            .map_err(|e| {
                warn!("Connect to {} failed: {}", addr, e);
                ProtocolError::Connect
            })?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.io_timeout)))
            .and_then(|_| stream.set_nodelay(true))
            .map_err(|e| {
                warn!("Socket setup for {} failed: {}", addr, e);
                ProtocolError::Connect
            })?;
        debug!("Connected to {}", addr);
        Ok(TcpSocket {
            stream: Some(stream),
        })
    }
}

/// One open connection; closing drops the stream
#[derive(Debug)]
pub struct TcpSocket {
    stream: Option<TcpStream>,
}

impl ByteSink for TcpSocket {
    fn write(&mut self, data: &[u8]) -> ProtocolResult<usize> {
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        loop {
            match stream.write(data) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Socket write failed: {}", e);
                    return Err(ProtocolError::SocketWrite);
                }
            }
        }
    }
}

impl ByteSource for TcpSocket {
    fn read(&mut self, buf: &mut [u8]) -> ProtocolResult<usize> {
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        loop {
            match stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Socket read failed: {}", e);
                    return Err(ProtocolError::SocketRead);
                }
            }
        }
    }
}

impl Socket for TcpSocket {
    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::HostClock;
    use crate::storage::DirStorage;
    use iobeam_embedded::{Session, SessionConfig};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned response per accepted connection, returning the
    /// requests seen
    fn serve(responses: Vec<&'static str>) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                seen.push(read_request(&mut stream));
                stream.write_all(response.as_bytes()).unwrap();
            }
            seen
        });
        (port, handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|l| l.strip_prefix("Content-Length: "))
                    .map_or(0, |v| v.trim().parse::<usize>().unwrap());
                if data.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8(data).unwrap()
    }

    #[test]
    fn test_resolve_literal_address() {
        let mut connector = TcpConnector::new(Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(
            connector.resolve("127.0.0.1").unwrap(),
            Ipv4Addr::new(127, 0, 0, 1)
        );
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut connector = TcpConnector::new(Duration::from_secs(1), Duration::from_secs(1));
        let err = connector
            .connect(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
            .unwrap_err();
        assert_eq!(err, ProtocolError::Connect);
    }

    #[test]
    fn test_session_over_tcp() {
        let (port, server) = serve(vec![
            "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: 40\r\n\r\n{\"device_id\":\"d6a2f0c4e1b94f7aa3c2aa11\"}",
            "HTTP/1.1 200 OK\r\nContent-Length: 34\r\n\r\n{\"sec\":1450000000,\"usec\":250000}  ",
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}",
        ]);
        let state = tempfile::tempdir().unwrap();

        let config = SessionConfig::new(42, "secret")
            .with_host("127.0.0.1")
            .with_port(port);
        let mut session = Session::new(
            config,
            TcpConnector::new(Duration::from_secs(2), Duration::from_secs(2)),
            DirStorage::new(state.path()),
            HostClock::new(),
            None,
        )
        .unwrap();

        session.register_device().unwrap();
        assert_eq!(session.device_id(), Some("d6a2f0c4e1b94f7aa3c2aa11"));
        session.start_time_keeping().unwrap();
        assert!(session.clock_offset().unwrap().sec >= 1_449_999_000);
        session.send("temperature", 21.5).unwrap();

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("POST /v1/devices HTTP/1.1\r\n"));
        assert!(requests[0].ends_with("{\"project_id\":42}"));
        assert!(requests[1].starts_with("GET /v1/devices/timestamp?timefmt=TIMEVAL HTTP/1.1\r\n"));
        assert!(requests[2].contains("\"name\":\"temperature\""));
        assert!(requests[2].contains("Authorization: Bearer secret\r\n"));
        assert!(state.path().join("iobeam-device-id").exists());
    }
}
