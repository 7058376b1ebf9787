// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Canonical primitive encoding.
//!
//! Big-endian fixed-width integers, IEEE-754 floats, `u32` counts and
//! `u32`-length-prefixed UTF-8 strings.
//!
//! ```text
//! array := tag(u8) | count(u32) | element[count]
//! string := len(u32) | utf8[len]
//! ```

use super::{DecodeError, EncodeError};
use crate::buffer::TypedBuffer;
use crate::config::CodecLimits;
use crate::instance::Value;
use crate::types::DataType;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Upper bound on speculative preallocation from an untrusted count.
pub(crate) const PREALLOC_LIMIT: usize = 4096;

pub(crate) fn write_count<W: Write>(w: &mut W, count: usize) -> Result<(), EncodeError> {
    let n = u32::try_from(count).map_err(|_| EncodeError::CountTooLarge(count))?;
    w.write_u32::<BigEndian>(n)?;
    Ok(())
}

pub(crate) fn read_count<R: Read>(r: &mut R, limit: usize) -> Result<usize, DecodeError> {
    let n = r.read_u32::<BigEndian>()?;
    if n as usize > limit {
        return Err(DecodeError::CountOutOfRange {
            count: u64::from(n),
            limit,
        });
    }
    Ok(n as usize)
}

pub(crate) fn write_string<W: Write>(w: &mut W, s: &str) -> Result<(), EncodeError> {
    write_count(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub(crate) fn read_string<R: Read>(r: &mut R, limit: usize) -> Result<String, DecodeError> {
    let len = read_count(r, limit)?;
    let mut bytes = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    r.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(DecodeError::Eof);
    }
    String::from_utf8(bytes).map_err(|_| DecodeError::Utf8)
}

fn skip_bytes<R: Read>(r: &mut R, len: u64) -> Result<(), DecodeError> {
    let copied = io::copy(&mut r.by_ref().take(len), &mut io::sink())?;
    if copied != len {
        return Err(DecodeError::Eof);
    }
    Ok(())
}

/// Write one atomic value of `data_type`.
pub(crate) fn write_atomic<W: Write>(
    w: &mut W,
    data_type: DataType,
    value: &Value,
    field: &str,
) -> Result<(), EncodeError> {
    match (data_type, value) {
        (DataType::Char, Value::Char(v)) => w.write_i8(*v)?,
        (DataType::UChar, Value::UChar(v)) => w.write_u8(*v)?,
        (DataType::Short, Value::Short(v)) => w.write_i16::<BigEndian>(*v)?,
        (DataType::UShort, Value::UShort(v)) => w.write_u16::<BigEndian>(*v)?,
        (DataType::Int, Value::Int(v)) => w.write_i32::<BigEndian>(*v)?,
        (DataType::UInt, Value::UInt(v)) => w.write_u32::<BigEndian>(*v)?,
        (DataType::Long, Value::Long(v)) | (DataType::LongLong, Value::LongLong(v)) => {
            w.write_i64::<BigEndian>(*v)?
        }
        (DataType::ULong, Value::ULong(v)) | (DataType::ULongLong, Value::ULongLong(v)) => {
            w.write_u64::<BigEndian>(*v)?
        }
        (DataType::Float, Value::Float(v)) => w.write_f32::<BigEndian>(*v)?,
        (DataType::Double, Value::Double(v)) => w.write_f64::<BigEndian>(*v)?,
        (DataType::String, Value::Str(s)) => write_string(w, s)?,
        (DataType::Unknown | DataType::Compound, _) => {
            return Err(EncodeError::UnsupportedType(data_type.name().to_string()))
        }
        (expected, found) => {
            return Err(EncodeError::ValueMismatch {
                field: field.to_string(),
                expected: expected.name().to_string(),
                found: found.kind_name(),
            })
        }
    }
    Ok(())
}

/// Read one atomic value of `data_type`.
pub(crate) fn read_atomic<R: Read>(
    r: &mut R,
    data_type: DataType,
    limits: &CodecLimits,
) -> Result<Value, DecodeError> {
    let v = match data_type {
        DataType::Char => Value::Char(r.read_i8()?),
        DataType::UChar => Value::UChar(r.read_u8()?),
        DataType::Short => Value::Short(r.read_i16::<BigEndian>()?),
        DataType::UShort => Value::UShort(r.read_u16::<BigEndian>()?),
        DataType::Int => Value::Int(r.read_i32::<BigEndian>()?),
        DataType::UInt => Value::UInt(r.read_u32::<BigEndian>()?),
        DataType::Long => Value::Long(r.read_i64::<BigEndian>()?),
        DataType::ULong => Value::ULong(r.read_u64::<BigEndian>()?),
        DataType::LongLong => Value::LongLong(r.read_i64::<BigEndian>()?),
        DataType::ULongLong => Value::ULongLong(r.read_u64::<BigEndian>()?),
        DataType::Float => Value::Float(r.read_f32::<BigEndian>()?),
        DataType::Double => Value::Double(r.read_f64::<BigEndian>()?),
        DataType::String => Value::Str(read_string(r, limits.max_string_length)?),
        DataType::Unknown | DataType::Compound => {
            return Err(DecodeError::UnknownType(data_type.name().to_string()))
        }
    };
    Ok(v)
}

/// Consume one atomic value without materializing it.
pub(crate) fn skip_atomic<R: Read>(
    r: &mut R,
    data_type: DataType,
    limits: &CodecLimits,
) -> Result<(), DecodeError> {
    match data_type.wire_size() {
        Some(n) => skip_bytes(r, n as u64),
        None if data_type == DataType::String => {
            let len = read_count(r, limits.max_string_length)?;
            skip_bytes(r, len as u64)
        }
        None => Err(DecodeError::UnknownType(data_type.name().to_string())),
    }
}

/// Encode a primitive array.
pub fn write_array<W: Write>(w: &mut W, buffer: &TypedBuffer) -> Result<(), EncodeError> {
    w.write_u8(buffer.data_type().tag())?;
    write_count(w, buffer.len())?;
    match buffer {
        TypedBuffer::Char(v) => v.iter().try_for_each(|x| w.write_i8(*x))?,
        TypedBuffer::UChar(v) => w.write_all(v)?,
        TypedBuffer::Short(v) => v.iter().try_for_each(|x| w.write_i16::<BigEndian>(*x))?,
        TypedBuffer::UShort(v) => v.iter().try_for_each(|x| w.write_u16::<BigEndian>(*x))?,
        TypedBuffer::Int(v) => v.iter().try_for_each(|x| w.write_i32::<BigEndian>(*x))?,
        TypedBuffer::UInt(v) => v.iter().try_for_each(|x| w.write_u32::<BigEndian>(*x))?,
        TypedBuffer::Long(v) | TypedBuffer::LongLong(v) => {
            v.iter().try_for_each(|x| w.write_i64::<BigEndian>(*x))?
        }
        TypedBuffer::ULong(v) | TypedBuffer::ULongLong(v) => {
            v.iter().try_for_each(|x| w.write_u64::<BigEndian>(*x))?
        }
        TypedBuffer::Float(v) => v.iter().try_for_each(|x| w.write_f32::<BigEndian>(*x))?,
        TypedBuffer::Double(v) => v.iter().try_for_each(|x| w.write_f64::<BigEndian>(*x))?,
        TypedBuffer::String(v) => {
            for s in v {
                write_string(w, s)?;
            }
        }
    }
    Ok(())
}

macro_rules! read_vec {
    ($count:expr, $read:expr) => {{
        let mut v = Vec::with_capacity($count.min(PREALLOC_LIMIT));
        for _ in 0..$count {
            v.push($read?);
        }
        v
    }};
}

/// Decode a primitive array.
pub fn read_array<R: Read>(r: &mut R, limits: &CodecLimits) -> Result<TypedBuffer, DecodeError> {
    let tag = r.read_u8()?;
    let data_type = DataType::from_tag(tag)
        .filter(|dt| dt.is_atomic())
        .ok_or(DecodeError::InvalidTag(tag))?;
    let count = read_count(r, limits.max_element_count)?;

    let buffer = match data_type {
        DataType::Char => TypedBuffer::Char(read_vec!(count, r.read_i8())),
        DataType::UChar => TypedBuffer::UChar(read_vec!(count, r.read_u8())),
        DataType::Short => TypedBuffer::Short(read_vec!(count, r.read_i16::<BigEndian>())),
        DataType::UShort => TypedBuffer::UShort(read_vec!(count, r.read_u16::<BigEndian>())),
        DataType::Int => TypedBuffer::Int(read_vec!(count, r.read_i32::<BigEndian>())),
        DataType::UInt => TypedBuffer::UInt(read_vec!(count, r.read_u32::<BigEndian>())),
        DataType::Long => TypedBuffer::Long(read_vec!(count, r.read_i64::<BigEndian>())),
        DataType::ULong => TypedBuffer::ULong(read_vec!(count, r.read_u64::<BigEndian>())),
        DataType::LongLong => TypedBuffer::LongLong(read_vec!(count, r.read_i64::<BigEndian>())),
        DataType::ULongLong => {
            TypedBuffer::ULongLong(read_vec!(count, r.read_u64::<BigEndian>()))
        }
        DataType::Float => TypedBuffer::Float(read_vec!(count, r.read_f32::<BigEndian>())),
        DataType::Double => TypedBuffer::Double(read_vec!(count, r.read_f64::<BigEndian>())),
        DataType::String => {
            TypedBuffer::String(read_vec!(count, read_string(r, limits.max_string_length)))
        }
        DataType::Unknown | DataType::Compound => return Err(DecodeError::InvalidTag(tag)),
    };
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_atomic_is_big_endian() {
        let mut out = Vec::new();
        write_atomic(&mut out, DataType::Int, &Value::Int(0x0102_0304), "n").unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_string_prefix() {
        let mut out = Vec::new();
        write_string(&mut out, "Ip").unwrap();
        assert_eq!(out, vec![0, 0, 0, 2, b'I', b'p']);
        let back = read_string(&mut Cursor::new(out), 16).unwrap();
        assert_eq!(back, "Ip");
    }

    #[test]
    fn test_truncated_string_is_eof() {
        let bytes = vec![0, 0, 0, 5, b'a'];
        assert!(matches!(
            read_string(&mut Cursor::new(bytes), 16),
            Err(DecodeError::Eof)
        ));
    }

    #[test]
    fn test_count_ceiling() {
        let bytes = 1000u32.to_be_bytes().to_vec();
        assert!(matches!(
            read_count(&mut Cursor::new(bytes), 10),
            Err(DecodeError::CountOutOfRange { count: 1000, limit: 10 })
        ));
    }

    #[test]
    fn test_value_mismatch() {
        let mut out = Vec::new();
        let err = write_atomic(&mut out, DataType::Float, &Value::Int(1), "f").unwrap_err();
        assert!(matches!(err, EncodeError::ValueMismatch { found: "int", .. }));
    }

    #[test]
    fn test_long_and_long_long_are_distinct() {
        let mut out = Vec::new();
        let err = write_atomic(&mut out, DataType::Long, &Value::LongLong(5), "v").unwrap_err();
        assert!(matches!(err, EncodeError::ValueMismatch { found: "long long", .. }));
        write_atomic(&mut out, DataType::ULong, &Value::ULong(5), "v").unwrap();
        assert_eq!(out, vec![0, 0, 0, 0, 0, 0, 0, 5]);
    }

    #[test]
    fn test_array_roundtrip_with_empty() {
        let limits = CodecLimits::default();
        for buf in [
            TypedBuffer::Double(vec![1.5, -2.0]),
            TypedBuffer::UShort(vec![]),
            TypedBuffer::String(vec!["a".into(), String::new()]),
        ] {
            let mut out = Vec::new();
            write_array(&mut out, &buf).unwrap();
            assert_eq!(read_array(&mut Cursor::new(out), &limits).unwrap(), buf);
        }
    }

    #[test]
    fn test_array_rejects_compound_tag() {
        let bytes = vec![DataType::Compound.tag(), 0, 0, 0, 0];
        assert!(matches!(
            read_array(&mut Cursor::new(bytes), &CodecLimits::default()),
            Err(DecodeError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_skip_atomic_string() {
        let mut bytes = Vec::new();
        write_string(&mut bytes, "skip").unwrap();
        bytes.push(7);
        let mut cursor = Cursor::new(bytes);
        skip_atomic(&mut cursor, DataType::String, &CodecLimits::default()).unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 7);
    }
}
