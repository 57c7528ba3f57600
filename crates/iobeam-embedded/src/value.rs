//! Measurement values
//!
//! Floats are written with four decimals, truncated toward zero rather than
//! rounded, so a device without a full float formatter produces the same
//! digits as the host.

use core::fmt;

use crate::error::{ProtocolError, ProtocolResult};

/// Magnitudes at or above 2^64 have no fixed-point representation here
const FLOAT_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// Fixed-point scale for float output
const DECIMAL_SCALE: u128 = 10_000;

/// A single data point value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    /// Reject values with no JSON number form
    pub fn validate(&self) -> ProtocolResult<()> {
        match *self {
            Value::Int(_) => Ok(()),
            Value::Float(f) if f.is_finite() && f > -FLOAT_LIMIT && f < FLOAT_LIMIT => Ok(()),
            Value::Float(_) => Err(ProtocolError::InvalidValue),
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => {
                let magnitude = if v < 0.0 { -v } else { v };
                // Scaling first keeps 2.3 from coming out as 2.2999
                let scaled = (magnitude * DECIMAL_SCALE as f64) as u128;
                let whole = scaled / DECIMAL_SCALE;
                let frac = scaled % DECIMAL_SCALE;
                let sign = if v < 0.0 && scaled > 0 { "-" } else { "" };
                write!(f, "{}{}.{:04}", sign, whole, frac)
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ScratchBuf;
    use core::fmt::Write;

    fn render(value: Value) -> ScratchBuf<64> {
        let mut buf = ScratchBuf::new();
        write!(buf, "{}", value).unwrap();
        buf
    }

    #[test]
    fn test_int_format() {
        assert_eq!(render(Value::from(42)).as_slice(), b"42");
        assert_eq!(render(Value::from(-7i64)).as_slice(), b"-7");
        assert_eq!(render(Value::from(u32::MAX)).as_slice(), b"4294967295");
    }

    #[test]
    fn test_float_truncates_to_four_places() {
        assert_eq!(render(Value::from(12.34567)).as_slice(), b"12.3456");
        assert_eq!(render(Value::from(-3.125)).as_slice(), b"-3.1250");
        assert_eq!(render(Value::from(2.3)).as_slice(), b"2.3000");
        assert_eq!(render(Value::from(0.05)).as_slice(), b"0.0500");
    }

    #[test]
    fn test_float_negative_zero() {
        assert_eq!(render(Value::from(-0.0)).as_slice(), b"0.0000");
        assert_eq!(render(Value::from(-0.00001)).as_slice(), b"0.0000");
    }

    #[test]
    fn test_validate() {
        assert!(Value::from(1.5).validate().is_ok());
        assert!(Value::from(i64::MIN).validate().is_ok());
        assert_eq!(Value::from(f64::NAN).validate(), Err(ProtocolError::InvalidValue));
        assert_eq!(Value::from(f64::INFINITY).validate(), Err(ProtocolError::InvalidValue));
        assert_eq!(Value::from(1e30).validate(), Err(ProtocolError::InvalidValue));
    }
}
