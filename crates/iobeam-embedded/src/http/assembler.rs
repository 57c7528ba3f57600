//! Streaming response assembly
//!
//! Reads an HTTP response from a [`ByteSource`] into one bounded
//! [`ScratchBuf`], whatever the fragmentation of the underlying reads:
//!
//! ```text
//! AwaitingStatusLine ──> AwaitingHeaders ──(blank line)──> AwaitingBody ──> Done
//!         │                     │                               │
//!         └─────────────────────┴───────────────> Failed <──────┘
//! ```
//!
//! Lines are split on CRLF starting at an internal cursor. When no delimiter
//! is left in the buffer, the unconsumed tail (a partial line) is moved to
//! the front and the next read is appended after it, so a CRLF split across
//! two reads is still found. The body gets the same carry-over treatment and
//! ends up at the front of the buffer, where [`Response::body`] aliases it.

use super::line::{parse_content_length, parse_status_code};
use crate::buffer::ScratchBuf;
use crate::error::{ProtocolError, ProtocolResult};
use crate::io::ByteSource;
use crate::scan::find_crlf;

/// Assembler progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    AwaitingStatusLine,
    AwaitingHeaders,
    AwaitingBody,
    Done,
    Failed,
}

/// A fully assembled response. `body` borrows the scratch buffer and is
/// valid until the buffer is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'a> {
    pub status: u16,
    /// `None` when no content-length header was seen
    pub content_length: Option<usize>,
    pub body: &'a [u8],
}

/// Single-use response reader expecting one status code
#[derive(Debug)]
pub struct ResponseAssembler {
    expected_status: u16,
    state: AssemblerState,
    status: Option<u16>,
    content_length: Option<usize>,
    header_bytes: usize,
    reads: usize,
}

impl ResponseAssembler {
    pub fn new(expected_status: u16) -> Self {
        Self {
            expected_status,
            state: AssemblerState::AwaitingStatusLine,
            status: None,
            content_length: None,
            header_bytes: 0,
            reads: 0,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Status code seen on the status line, even if it was not the expected one
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Number of underlying reads issued so far
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Drive the state machine to `Done` or `Failed`.
    ///
    /// A status other than the expected one stops parsing immediately with
    /// [`ProtocolError::UnexpectedStatus`]; headers and body are not read.
    pub fn assemble<'b, R, const N: usize>(
        &mut self,
        source: &mut R,
        buf: &'b mut ScratchBuf<N>,
    ) -> ProtocolResult<Response<'b>>
    where
        R: ByteSource + ?Sized,
    {
        match self.run(source, buf) {
            Ok(status) => {
                self.state = AssemblerState::Done;
                Ok(Response {
                    status,
                    content_length: self.content_length,
                    body: buf.as_slice(),
                })
            }
            Err(e) => {
                debug!("response assembly failed in {:?}: {}", self.state, e);
                self.state = AssemblerState::Failed;
                Err(e)
            }
        }
    }

    fn run<R, const N: usize>(
        &mut self,
        source: &mut R,
        buf: &mut ScratchBuf<N>,
    ) -> ProtocolResult<u16>
    where
        R: ByteSource + ?Sized,
    {
        buf.clear();
        self.state = AssemblerState::AwaitingStatusLine;
        self.fill_headers(source, buf)?;

        let mut cursor = 0;
        while self.state != AssemblerState::AwaitingBody {
            let Some(end) = find_crlf(&buf.as_slice()[cursor..]) else {
                // Partial line: carry it to the front and append the next read
                buf.shift_to_front(cursor);
                cursor = 0;
                if buf.is_full() {
                    return Err(ProtocolError::BufferTooSmall {
                        needed: N + 1,
                        have: N,
                    });
                }
                self.fill_headers(source, buf)?;
                continue;
            };

            let line = &buf.as_slice()[cursor..cursor + end];
            cursor += end + 2;
            self.header_bytes += end + 2;
            self.on_line(line)?;
        }

        let status = self.status.ok_or(ProtocolError::MalformedStatusLine)?;
        let body_len = self.content_length.unwrap_or(0);
        if body_len > N {
            return Err(ProtocolError::BufferTooSmall {
                needed: body_len,
                have: N,
            });
        }

        // Whatever followed the blank line is the start of the body
        buf.shift_to_front(cursor);
        while buf.len() < body_len {
            self.reads += 1;
            match buf.fill_from(source)? {
                0 => {
                    return Err(ProtocolError::Truncated {
                        expected: body_len,
                        received: buf.len(),
                    })
                }
                n => trace!("body read {} bytes ({}/{})", n, buf.len(), body_len),
            }
        }
        if buf.len() > body_len {
            trace!("ignoring {} bytes past content-length", buf.len() - body_len);
        }
        buf.truncate(body_len);

        debug!(
            "response {}: {} header bytes, {} body bytes, {} reads",
            status, self.header_bytes, body_len, self.reads
        );
        Ok(status)
    }

    fn fill_headers<R, const N: usize>(
        &mut self,
        source: &mut R,
        buf: &mut ScratchBuf<N>,
    ) -> ProtocolResult<()>
    where
        R: ByteSource + ?Sized,
    {
        self.reads += 1;
        match buf.fill_from(source)? {
            0 => Err(ProtocolError::ConnectionClosed),
            _ => Ok(()),
        }
    }

    fn on_line(&mut self, line: &[u8]) -> ProtocolResult<()> {
        match self.state {
            AssemblerState::AwaitingStatusLine => {
                trace!("< {}", core::str::from_utf8(line).unwrap_or("<binary>"));
                let code = parse_status_code(line).ok_or(ProtocolError::MalformedStatusLine)?;
                self.status = Some(code);
                if code != self.expected_status {
                    return Err(ProtocolError::UnexpectedStatus(code));
                }
                self.state = AssemblerState::AwaitingHeaders;
            }
            AssemblerState::AwaitingHeaders if line.is_empty() => {
                self.state = AssemblerState::AwaitingBody;
            }
            AssemblerState::AwaitingHeaders => {
                trace!("< {}", core::str::from_utf8(line).unwrap_or("<binary>"));
                if self.content_length.is_none() {
                    self.content_length = parse_content_length(line);
                }
            }
            AssemblerState::AwaitingBody | AssemblerState::Done | AssemblerState::Failed => {}
        }
        Ok(())
    }
}
