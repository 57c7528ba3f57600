//! Minimal HTTP/1.1 client engine
//!
//! Only what the iobeam API needs: one request per connection
//! (`Connection: close`), `Content-Length` delimited bodies, no chunked
//! transfer, no redirects.
//!
//! - [`request`] formats request and header lines into a caller buffer
//! - [`line`] pulls the status code and content length out of single lines
//! - [`assembler`] reads a response off a socket in bounded chunks

pub mod assembler;
pub mod line;
pub mod request;

pub use assembler::{AssemblerState, Response, ResponseAssembler};
pub use line::{parse_content_length, parse_status_code};
pub use request::{
    end_headers, formatted_len, header_line, header_line_fmt, request_line, Method, RequestWriter,
};

/// Protocol token written on every request line
pub const PROTOCOL: &str = "HTTP/1.1";

/// Line terminator
pub const CRLF: &str = "\r\n";

pub const HEADER_HOST: &str = "Host";
pub const HEADER_CONNECTION: &str = "Connection";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_AUTHORIZATION: &str = "Authorization";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONNECTION_CLOSE: &str = "close";

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
