//! Timing utilities
//!
//! The device only has a millisecond tick since boot. One round trip to the
//! time resource turns that into an approximate global clock:
//!
//! ```text
//! relative = t0 + (t1 - t0) / 2          local time the server stamp applies to
//! offset   = server - relative            with a one-second borrow on the millis
//! now      = offset + local_millis()
//! ```

use core::fmt;

use crate::error::{ProtocolError, ProtocolResult};
use crate::json;

/// Seconds plus milliseconds, like `struct timeval` but with millisecond
/// resolution. [`Timeval::new`] and the arithmetic here keep `msec` below
/// 1000; a value built field by field is normalized when it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Timeval {
    pub sec: u64,
    pub msec: u32,
}

impl Timeval {
    /// Whole seconds in `msec` are carried into `sec`
    pub const fn new(sec: u64, msec: u32) -> Self {
        Self {
            sec: sec.saturating_add((msec / 1000) as u64),
            msec: msec % 1000,
        }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self {
            sec: millis / 1000,
            msec: (millis % 1000) as u32,
        }
    }

    /// Milliseconds since the epoch, the value written as `"time"` in imports
    pub const fn as_millis(&self) -> u64 {
        self.sec
            .saturating_mul(1000)
            .saturating_add(self.msec as u64)
    }

    /// Advance by a local elapsed-time reading, carrying whole seconds
    pub fn add_millis(self, millis: u64) -> Self {
        let msec = self.msec as u64 + millis % 1000;
        let sec = self
            .sec
            .saturating_add(millis / 1000)
            .saturating_add(msec / 1000);
        Self {
            sec,
            msec: (msec % 1000) as u32,
        }
    }
}

/// Wire form: milliseconds since the epoch
impl fmt::Display for Timeval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_millis())
    }
}

/// Estimate the offset that maps local elapsed time onto server time.
///
/// `t0` is the local tick just before the request went out, `t1` the tick
/// after the response arrived, `server` the time the server reported.
/// Latency is assumed symmetric, so the server stamp is taken to apply to the
/// midpoint of the round trip.
pub fn estimate_offset(t0: u64, t1: u64, server: Timeval) -> Timeval {
    let server = Timeval::new(server.sec, server.msec);
    let relative = t0 + t1.saturating_sub(t0) / 2;
    let rel_sec = relative / 1000;
    let rel_msec = (relative % 1000) as u32;

    let mut sec = server.sec.saturating_sub(rel_sec);
    let msec = if rel_msec > server.msec {
        sec = sec.saturating_sub(1);
        1000 + server.msec - rel_msec
    } else {
        server.msec - rel_msec
    };
    Timeval { sec, msec }
}

/// Pull the server time out of a time-resource body.
///
/// Accepts the TIMEVAL form `{"sec":S,"usec":U}` (microseconds are truncated
/// to milliseconds) and falls back to `{"server_timestamp":MS}`.
pub fn parse_server_time(body: &[u8]) -> ProtocolResult<Timeval> {
    if let Some(sec) = json::uint_field::<u64>(body, "sec") {
        let usec = json::uint_field::<u32>(body, "usec")
            .ok_or(ProtocolError::ParseError("missing usec"))?;
        if usec >= 1_000_000 {
            return Err(ProtocolError::ParseError("usec out of range"));
        }
        return Ok(Timeval::new(sec, usec / 1000));
    }

    json::uint_field::<u64>(body, "server_timestamp")
        .map(Timeval::from_millis)
        .ok_or(ProtocolError::ParseError("missing server time"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_with_borrow() {
        // relative = 1100ms (1s, 100ms); server 500000s + 50ms
        let offset = estimate_offset(1000, 1200, Timeval::new(500_000, 50));
        assert_eq!(offset, Timeval::new(499_998, 950));
    }

    #[test]
    fn test_offset_without_borrow() {
        // relative = 2040ms (2s, 40ms); server 1000s + 500ms
        let offset = estimate_offset(2000, 2080, Timeval::new(1000, 500));
        assert_eq!(offset, Timeval::new(998, 460));
    }

    #[test]
    fn test_offset_is_deterministic() {
        let a = estimate_offset(123, 456, Timeval::new(77, 7));
        let b = estimate_offset(123, 456, Timeval::new(77, 7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_add_millis_carries() {
        let t = Timeval::new(499_998, 950).add_millis(1_100);
        assert_eq!(t, Timeval::new(500_000, 50));
        let t = Timeval::new(10, 999).add_millis(1);
        assert_eq!(t, Timeval::new(11, 0));
        let t = Timeval { sec: 1, msec: 2500 }.add_millis(600);
        assert_eq!(t, Timeval::new(4, 100));
    }

    #[test]
    fn test_new_carries_whole_seconds() {
        let t = Timeval::new(1, 1500);
        assert_eq!(t, Timeval { sec: 2, msec: 500 });
        assert_eq!(t.as_millis(), 2500);
    }

    #[test]
    fn test_display_agrees_with_millis() {
        let mut buf = crate::buffer::ScratchBuf::<32>::new();
        core::fmt::Write::write_fmt(&mut buf, format_args!("{}", Timeval::new(1, 1500))).unwrap();
        assert_eq!(buf.as_slice(), b"2500");

        let mut buf = crate::buffer::ScratchBuf::<32>::new();
        let raw = Timeval { sec: 1, msec: 1500 };
        core::fmt::Write::write_fmt(&mut buf, format_args!("{}", raw)).unwrap();
        assert_eq!(buf.as_slice(), b"2500");
    }

    #[test]
    fn test_offset_normalizes_server_time() {
        let raw = Timeval { sec: 499_999, msec: 1050 };
        assert_eq!(estimate_offset(1000, 1200, raw), Timeval::new(499_998, 950));
    }

    #[test]
    fn test_display_wire_form() {
        let mut buf = crate::buffer::ScratchBuf::<32>::new();
        core::fmt::Write::write_fmt(&mut buf, format_args!("{}", Timeval::new(1_450_000_000, 7)))
            .unwrap();
        assert_eq!(buf.as_slice(), b"1450000000007");
        assert_eq!(Timeval::new(1_450_000_000, 7).as_millis(), 1_450_000_000_007);
    }

    #[test]
    fn test_parse_timeval_body() {
        let t = parse_server_time(br#"{"sec":1450000000,"usec":123456}"#).unwrap();
        assert_eq!(t, Timeval::new(1_450_000_000, 123));
    }

    #[test]
    fn test_parse_timeval_key_order() {
        let t = parse_server_time(br#"{"usec":50000,"sec":500000}"#).unwrap();
        assert_eq!(t, Timeval::new(500_000, 50));
    }

    #[test]
    fn test_parse_millisecond_body() {
        let t = parse_server_time(br#"{"server_timestamp":1450000000123}"#).unwrap();
        assert_eq!(t, Timeval::new(1_450_000_000, 123));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_server_time(b"{}").is_err());
        assert!(parse_server_time(br#"{"sec":1}"#).is_err());
        assert!(parse_server_time(br#"{"sec":1,"usec":1000000}"#).is_err());
        assert!(parse_server_time(br#"{"sec":-1,"usec":0}"#).is_err());
    }
}
