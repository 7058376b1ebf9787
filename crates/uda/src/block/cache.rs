// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flat cache encoding of a Data Block.
//!
//! # Envelope
//!
//! ```text
//! +------------------------------------------------------------+
//! |                   Header (28 bytes)                         |
//! |  Magic (8) | Version (4) | Flags (4) | BodyLen (8) | CRC (4) |
//! +------------------------------------------------------------+
//! |                   Body (BodyLen bytes)                      |
//! +------------------------------------------------------------+
//! ```
//!
//! # Body
//!
//! ```text
//! order i32 | dtype u8 | element_count u32 | label | units | description
//! data?  | error_high? | error_low? | error_model?      (u8 presence flag each)
//! rank u32 | dim[rank]
//! opaque := 0 none | 1 xml(str) | 2 type(str) len(u32) instance-stream | 3 path(str) format(str)
//!
//! dim := length u32 | dtype u8 | label | units
//!      | 0 | 1 array | 2 ndomains u32 (start f64, increment f64, count u32)[ndomains]
//!      | error_high? | error_low? | error_model?
//! ```
//!
//! Arrays use [`write_array`]; the structure payload is the Wire Codec
//! instance stream, so it carries its own type table.

use super::{
    DataBlock, DataBlockError, Dim, DimValues, Domain, ErrorModel, ErrorModelKind, OpaquePayload,
};
use crate::buffer::TypedBuffer;
use crate::codec::{
    read_array, read_count, read_string, write_array, write_count, write_string, DecodeError,
    EncodeError, WireCodec,
};
use crate::config::{CodecLimits, BLOCK_MAGIC, BLOCK_VERSION, MAX_RANK};
use crate::types::{DataType, TypeRegistry};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Cache (de)serialization failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a cached data block")]
    BadMagic,

    #[error("unsupported cache version {0}")]
    UnsupportedVersion(u32),

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum { stored: u32, computed: u32 },

    #[error("body length {declared} does not match {actual} available bytes")]
    Length { declared: u64, actual: usize },

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid block: {0}")]
    Block(#[from] DataBlockError),
}

/// Envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub version: u32,
    /// Reserved.
    pub flags: u32,
    pub body_len: u64,
    pub crc: u32,
}

impl EnvelopeHeader {
    pub const SIZE: usize = 28;

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&BLOCK_MAGIC)?;
        w.write_u32::<BigEndian>(self.version)?;
        w.write_u32::<BigEndian>(self.flags)?;
        w.write_u64::<BigEndian>(self.body_len)?;
        w.write_u32::<BigEndian>(self.crc)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, CacheError> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if magic != BLOCK_MAGIC {
            return Err(CacheError::BadMagic);
        }
        let version = r.read_u32::<BigEndian>()?;
        if version != BLOCK_VERSION {
            return Err(CacheError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            flags: r.read_u32::<BigEndian>()?,
            body_len: r.read_u64::<BigEndian>()?,
            crc: r.read_u32::<BigEndian>()?,
        })
    }
}

const VALUES_UNSET: u8 = 0;
const VALUES_EXPLICIT: u8 = 1;
const VALUES_ANALYTIC: u8 = 2;

const OPAQUE_NONE: u8 = 0;
const OPAQUE_XML: u8 = 1;
const OPAQUE_STRUCTURES: u8 = 2;
const OPAQUE_FILE: u8 = 3;

/// Serialize `block` into a flat buffer. `registry` must know the type of a
/// structures payload.
pub fn serialize_block(block: &DataBlock, registry: &TypeRegistry) -> Result<Vec<u8>, CacheError> {
    block.validate()?;
    let mut body = Vec::new();
    write_body(&mut body, block, registry)?;

    let header = EnvelopeHeader {
        version: BLOCK_VERSION,
        flags: 0,
        body_len: body.len() as u64,
        crc: crc32fast::hash(&body),
    };
    let mut out = Vec::with_capacity(EnvelopeHeader::SIZE + body.len());
    header.write(&mut out)?;
    out.extend_from_slice(&body);
    log::debug!(
        "[block] serialized rank {} block ({} body bytes)",
        block.rank(),
        body.len()
    );
    Ok(out)
}

/// Rebuild a block from [`serialize_block`] output. The checksum is verified
/// before any field is interpreted.
pub fn deserialize_block(
    bytes: &[u8],
    registry: &TypeRegistry,
    limits: &CodecLimits,
) -> Result<DataBlock, CacheError> {
    let mut cursor = bytes;
    let header = EnvelopeHeader::read(&mut cursor)?;
    if header.body_len != cursor.len() as u64 {
        return Err(CacheError::Length {
            declared: header.body_len,
            actual: cursor.len(),
        });
    }
    let computed = crc32fast::hash(cursor);
    if computed != header.crc {
        return Err(CacheError::Checksum {
            stored: header.crc,
            computed,
        });
    }
    let block = read_body(&mut cursor, registry, limits)?;
    block.validate()?;
    Ok(block)
}

/// Write a serialized block to `path`.
pub fn write_block_file<P: AsRef<Path>>(
    path: P,
    block: &DataBlock,
    registry: &TypeRegistry,
) -> Result<(), CacheError> {
    let bytes = serialize_block(block, registry)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a block written by [`write_block_file`].
pub fn read_block_file<P: AsRef<Path>>(
    path: P,
    registry: &TypeRegistry,
    limits: &CodecLimits,
) -> Result<DataBlock, CacheError> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
    deserialize_block(&bytes, registry, limits)
}

fn write_body<W: Write>(
    w: &mut W,
    block: &DataBlock,
    registry: &TypeRegistry,
) -> Result<(), CacheError> {
    w.write_i32::<BigEndian>(block.order)?;
    w.write_u8(block.data_type.tag())?;
    write_count(w, block.element_count)?;
    write_string(w, &block.label)?;
    write_string(w, &block.units)?;
    write_string(w, &block.description)?;
    write_optional_array(w, block.data.as_ref())?;
    write_optional_array(w, block.error_high.as_ref())?;
    write_optional_array(w, block.error_low.as_ref())?;
    write_error_model(w, block.error_model.as_ref())?;

    write_count(w, block.dims.len())?;
    for dim in &block.dims {
        write_dim(w, dim)?;
    }

    match &block.opaque {
        OpaquePayload::None => w.write_u8(OPAQUE_NONE)?,
        OpaquePayload::Xml(text) => {
            w.write_u8(OPAQUE_XML)?;
            write_string(w, text)?;
        }
        OpaquePayload::Structures(instance) => {
            let type_id = registry
                .find_by_name(instance.type_name())
                .ok_or_else(|| EncodeError::UnknownTypeName(instance.type_name().to_string()))?;
            let stream = WireCodec::new(registry).encode_to_vec(instance, type_id)?;
            w.write_u8(OPAQUE_STRUCTURES)?;
            write_string(w, instance.type_name())?;
            write_count(w, stream.len())?;
            w.write_all(&stream)?;
        }
        OpaquePayload::ExternalFile { path, format } => {
            w.write_u8(OPAQUE_FILE)?;
            write_string(w, &path.to_string_lossy())?;
            write_string(w, format)?;
        }
    }
    Ok(())
}

fn write_optional_array<W: Write>(w: &mut W, buffer: Option<&TypedBuffer>) -> Result<(), EncodeError> {
    match buffer {
        Some(buf) => {
            w.write_u8(1)?;
            write_array(w, buf)
        }
        None => Ok(w.write_u8(0)?),
    }
}

fn write_error_model<W: Write>(w: &mut W, model: Option<&ErrorModel>) -> Result<(), EncodeError> {
    let Some(model) = model else {
        return Ok(w.write_u8(0)?);
    };
    w.write_u8(1)?;
    w.write_i32::<BigEndian>(model.kind.id())?;
    write_array(w, &TypedBuffer::Double(model.params.clone()))
}

fn write_dim<W: Write>(w: &mut W, dim: &Dim) -> Result<(), EncodeError> {
    write_count(w, dim.length)?;
    w.write_u8(dim.data_type.tag())?;
    write_string(w, &dim.label)?;
    write_string(w, &dim.units)?;
    match &dim.values {
        DimValues::Uninitialized => w.write_u8(VALUES_UNSET)?,
        DimValues::Explicit(buf) => {
            w.write_u8(VALUES_EXPLICIT)?;
            write_array(w, buf)?;
        }
        DimValues::Analytic(domains) => {
            w.write_u8(VALUES_ANALYTIC)?;
            write_count(w, domains.len())?;
            for d in domains {
                w.write_f64::<BigEndian>(d.start)?;
                w.write_f64::<BigEndian>(d.increment)?;
                write_count(w, d.count)?;
            }
        }
    }
    write_optional_array(w, dim.error_high.as_ref())?;
    write_optional_array(w, dim.error_low.as_ref())?;
    write_error_model(w, dim.error_model.as_ref())
}

fn read_flag<R: Read>(r: &mut R) -> Result<bool, DecodeError> {
    match r.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DecodeError::InvalidTag(other)),
    }
}

fn read_data_type<R: Read>(r: &mut R) -> Result<DataType, DecodeError> {
    let tag = r.read_u8()?;
    DataType::from_tag(tag).ok_or(DecodeError::InvalidTag(tag))
}

fn read_optional_array<R: Read>(
    r: &mut R,
    limits: &CodecLimits,
) -> Result<Option<TypedBuffer>, DecodeError> {
    if read_flag(r)? {
        Ok(Some(read_array(r, limits)?))
    } else {
        Ok(None)
    }
}

fn read_error_model<R: Read>(
    r: &mut R,
    limits: &CodecLimits,
) -> Result<Option<ErrorModel>, DecodeError> {
    if !read_flag(r)? {
        return Ok(None);
    }
    let id = r.read_i32::<BigEndian>()?;
    let kind = ErrorModelKind::from_id(id)
        .ok_or_else(|| DecodeError::UnknownType(format!("error model {id}")))?;
    let params = match read_array(r, limits)? {
        TypedBuffer::Double(v) => v,
        other => {
            return Err(DecodeError::TypeMismatch {
                expected: DataType::Double.name().to_string(),
                found: other.data_type().name().to_string(),
            })
        }
    };
    Ok(Some(ErrorModel::new(kind, params)))
}

fn read_dim<R: Read>(r: &mut R, limits: &CodecLimits) -> Result<Dim, DecodeError> {
    let length = read_count(r, limits.max_element_count)?;
    let data_type = read_data_type(r)?;
    let label = read_string(r, limits.max_string_length)?;
    let units = read_string(r, limits.max_string_length)?;
    let values = match r.read_u8()? {
        VALUES_UNSET => DimValues::Uninitialized,
        VALUES_EXPLICIT => DimValues::Explicit(read_array(r, limits)?),
        VALUES_ANALYTIC => {
            let n = read_count(r, limits.max_element_count)?;
            let mut domains = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                let start = r.read_f64::<BigEndian>()?;
                let increment = r.read_f64::<BigEndian>()?;
                let count = read_count(r, limits.max_element_count)?;
                domains.push(Domain::new(start, increment, count));
            }
            DimValues::Analytic(domains)
        }
        other => return Err(DecodeError::InvalidTag(other)),
    };
    Ok(Dim {
        length,
        data_type,
        values,
        error_high: read_optional_array(r, limits)?,
        error_low: read_optional_array(r, limits)?,
        label,
        units,
        error_model: read_error_model(r, limits)?,
    })
}

fn read_body<R: Read>(
    r: &mut R,
    registry: &TypeRegistry,
    limits: &CodecLimits,
) -> Result<DataBlock, CacheError> {
    let mut block = DataBlock::new_empty();
    block.order = r.read_i32::<BigEndian>()?;
    block.data_type = read_data_type(r)?;
    block.element_count = read_count(r, limits.max_element_count)?;
    block.label = read_string(r, limits.max_string_length)?;
    block.units = read_string(r, limits.max_string_length)?;
    block.description = read_string(r, limits.max_string_length)?;
    block.data = read_optional_array(r, limits)?;
    block.error_high = read_optional_array(r, limits)?;
    block.error_low = read_optional_array(r, limits)?;
    block.error_model = read_error_model(r, limits)?;

    let rank = read_count(r, MAX_RANK)?;
    for _ in 0..rank {
        block.dims.push(read_dim(r, limits)?);
    }
    let order = i64::from(block.order);
    if order < -1 || order >= rank as i64 {
        return Err(DataBlockError::InvalidOrder {
            order,
            rank,
        }
        .into());
    }

    block.opaque = match r.read_u8()? {
        OPAQUE_NONE => OpaquePayload::None,
        OPAQUE_XML => OpaquePayload::Xml(read_string(r, limits.max_string_length)?),
        OPAQUE_STRUCTURES => {
            let type_name = read_string(r, limits.max_string_length)?;
            let type_id = registry
                .find_by_name(&type_name)
                .ok_or(DecodeError::UnknownType(type_name))?;
            let len = read_count(r, u32::MAX as usize)?;
            let mut stream = r.by_ref().take(len as u64);
            let decoded = WireCodec::new(registry)
                .with_limits(*limits)
                .decode(&mut stream, type_id)?;
            if stream.limit() != 0 {
                return Err(CacheError::Length {
                    declared: len as u64,
                    actual: len - stream.limit() as usize,
                });
            }
            for advisory in &decoded.advisories {
                log::debug!("[block] cached structures payload: {advisory:?}");
            }
            OpaquePayload::Structures(decoded.instance)
        }
        OPAQUE_FILE => OpaquePayload::ExternalFile {
            path: read_string(r, limits.max_string_length)?.into(),
            format: read_string(r, limits.max_string_length)?,
        },
        other => return Err(DecodeError::InvalidTag(other).into()),
    };
    Ok(block)
}
