//! Re-encoding of caller values as the node's declared variant type.
//!
//! OPC UA nodes are strongly typed on the server side: writing a `Double`
//! into an `Int32` node is rejected with `BadTypeMismatch`. Every write is
//! therefore coerced to the type the server currently reports.

use crate::error::CoercionError;
use crate::value::{InputValue, UaValue, VariantType};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};

/// Coerce `input` into a value of type `target`.
pub fn coerce(input: &InputValue, target: VariantType) -> Result<UaValue, CoercionError> {
    coerce_at(input, target, Utc::now())
}

/// Same as [`coerce`], resolving time-of-day strings against `now`.
pub fn coerce_at(
    input: &InputValue,
    target: VariantType,
    now: DateTime<Utc>,
) -> Result<UaValue, CoercionError> {
    match target {
        VariantType::Empty => Err(CoercionError::UnsupportedTarget(target)),
        VariantType::Boolean => to_bool(input).map(UaValue::Boolean),
        t if t.is_integer() => narrow(to_integer(input, t)?, input, t),
        VariantType::Float => {
            let v = to_float(input, target)?;
            if v.abs() > f64::from(f32::MAX) {
                return Err(out_of_range(input, target));
            }
            Ok(UaValue::Float(v as f32))
        }
        VariantType::Double => to_float(input, target).map(UaValue::Double),
        VariantType::String => Ok(UaValue::String(match input {
            InputValue::Text(s) => s.clone(),
            other => other.to_string(),
        })),
        VariantType::ByteString => match input {
            InputValue::Text(s) => Ok(UaValue::ByteString(s.as_bytes().to_vec())),
            InputValue::Integer(n) => u8::try_from(*n)
                .map(|b| UaValue::ByteString(vec![b]))
                .map_err(|_| out_of_range(input, target)),
            _ => Err(incompatible(input, target)),
        },
        VariantType::DateTime => to_datetime(input, now).map(UaValue::DateTime),
        _ => Err(CoercionError::UnsupportedTarget(target)),
    }
}

fn incompatible(input: &InputValue, target: VariantType) -> CoercionError {
    CoercionError::Incompatible {
        value: input.to_string(),
        target,
    }
}

fn out_of_range(input: &InputValue, target: VariantType) -> CoercionError {
    CoercionError::OutOfRange {
        value: input.to_string(),
        target,
    }
}

fn to_bool(input: &InputValue) -> Result<bool, CoercionError> {
    match input {
        InputValue::Bool(b) => Ok(*b),
        InputValue::Integer(0) => Ok(false),
        InputValue::Integer(1) => Ok(true),
        InputValue::Float(f) if *f == 0.0 => Ok(false),
        InputValue::Float(f) if *f == 1.0 => Ok(true),
        InputValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "enable" | "1" => Ok(true),
            "false" | "off" | "no" | "disable" | "0" => Ok(false),
            _ => Err(incompatible(input, VariantType::Boolean)),
        },
        _ => Err(incompatible(input, VariantType::Boolean)),
    }
}

fn to_integer(input: &InputValue, target: VariantType) -> Result<i128, CoercionError> {
    let from_float = |f: f64| {
        if f.is_finite() && f.fract() == 0.0 {
            // Saturates; anything past u64 fails the range check below.
            Ok(f as i128)
        } else {
            Err(incompatible(input, target))
        }
    };
    match input {
        InputValue::Bool(b) => Ok(i128::from(*b)),
        InputValue::Integer(n) => Ok(i128::from(*n)),
        InputValue::Float(f) => from_float(*f),
        InputValue::Text(s) => {
            let s = s.trim();
            match s.parse::<i128>() {
                Ok(n) => Ok(n),
                Err(_) => s
                    .parse::<f64>()
                    .map_err(|_| incompatible(input, target))
                    .and_then(from_float),
            }
        }
    }
}

fn narrow(n: i128, input: &InputValue, target: VariantType) -> Result<UaValue, CoercionError> {
    let value = match target {
        VariantType::SByte => i8::try_from(n).map(UaValue::SByte).ok(),
        VariantType::Byte => u8::try_from(n).map(UaValue::Byte).ok(),
        VariantType::Int16 => i16::try_from(n).map(UaValue::Int16).ok(),
        VariantType::UInt16 => u16::try_from(n).map(UaValue::UInt16).ok(),
        VariantType::Int32 => i32::try_from(n).map(UaValue::Int32).ok(),
        VariantType::UInt32 => u32::try_from(n).map(UaValue::UInt32).ok(),
        VariantType::Int64 => i64::try_from(n).map(UaValue::Int64).ok(),
        VariantType::UInt64 => u64::try_from(n).map(UaValue::UInt64).ok(),
        _ => return Err(CoercionError::UnsupportedTarget(target)),
    };
    value.ok_or_else(|| out_of_range(input, target))
}

fn to_float(input: &InputValue, target: VariantType) -> Result<f64, CoercionError> {
    let value = match input {
        InputValue::Bool(b) => f64::from(u8::from(*b)),
        InputValue::Integer(n) => *n as f64,
        InputValue::Float(f) => *f,
        InputValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| incompatible(input, target))?,
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(incompatible(input, target))
    }
}

fn to_datetime(input: &InputValue, now: DateTime<Utc>) -> Result<DateTime<Utc>, CoercionError> {
    let target = VariantType::DateTime;
    match input {
        InputValue::Integer(secs) => {
            DateTime::from_timestamp(*secs, 0).ok_or_else(|| out_of_range(input, target))
        }
        InputValue::Float(secs) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            DateTime::from_timestamp(whole as i64, nanos).ok_or_else(|| out_of_range(input, target))
        }
        InputValue::Text(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Ok(ts.with_timezone(&Utc));
            }
            let time = NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| incompatible(input, target))?;
            Ok(Utc.from_utc_datetime(&now.date_naive().and_time(time)))
        }
        _ => Err(incompatible(input, target)),
    }
}
