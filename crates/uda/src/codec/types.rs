// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Self-describing type table.
//!
//! Carries the declaration (never the memory layout) of each compound type,
//! so a receiver can recompute layout with its own rules and skip fields it
//! does not know.
//!
//! ```text
//! table := count(u32) | type[count]
//! type  := name(str) | nfields(u32) | field[nfields]
//! field := name(str) | type_name(str) | flags(u8) | rank(u8) | dim(u32)[rank] | [description(str)]
//! flags := bit0 pointer, bit1 description present
//! ```

use super::wire::{read_count, read_string, write_count, write_string};
use super::{DecodeError, EncodeError};
use crate::config::{CodecLimits, MAX_FIELDS_PER_TYPE, MAX_RANK, MAX_TYPE_TABLE};
use crate::types::{FieldSpec, TypeDefinition, TypeDescriptor};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::sync::Arc;

const FLAG_POINTER: u8 = 0x01;
const FLAG_DESCRIPTION: u8 = 0x02;

/// Write the declarations of `types`.
pub fn write_type_table<W: Write>(
    w: &mut W,
    types: &[Arc<TypeDescriptor>],
) -> Result<(), EncodeError> {
    write_count(w, types.len())?;
    for desc in types {
        write_string(w, &desc.name)?;
        write_count(w, desc.fields.len())?;
        for field in &desc.fields {
            write_string(w, &field.name)?;
            write_string(w, &field.type_name)?;
            let mut flags = 0u8;
            if field.is_pointer {
                flags |= FLAG_POINTER;
            }
            if field.description.is_some() {
                flags |= FLAG_DESCRIPTION;
            }
            w.write_u8(flags)?;
            let rank = u8::try_from(field.shape.len())
                .map_err(|_| EncodeError::CountTooLarge(field.shape.len()))?;
            w.write_u8(rank)?;
            for &dim in &field.shape {
                write_count(w, dim)?;
            }
            if let Some(description) = &field.description {
                write_string(w, description)?;
            }
        }
    }
    Ok(())
}

/// Read a type table back into unresolved definitions.
pub fn read_type_table<R: Read>(
    r: &mut R,
    limits: &CodecLimits,
) -> Result<Vec<TypeDefinition>, DecodeError> {
    let count = read_count(r, MAX_TYPE_TABLE)?;
    let mut types = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_string(r, limits.max_string_length)?;
        let nfields = read_count(r, MAX_FIELDS_PER_TYPE)?;
        let mut fields = Vec::with_capacity(nfields);
        for _ in 0..nfields {
            let field_name = read_string(r, limits.max_string_length)?;
            let type_name = read_string(r, limits.max_string_length)?;
            let flags = r.read_u8()?;
            let rank = usize::from(r.read_u8()?);
            if rank > MAX_RANK {
                return Err(DecodeError::CountOutOfRange {
                    count: rank as u64,
                    limit: MAX_RANK,
                });
            }
            let mut shape = Vec::with_capacity(rank);
            for _ in 0..rank {
                shape.push(r.read_u32::<BigEndian>()? as usize);
            }
            let description = if flags & FLAG_DESCRIPTION != 0 {
                Some(read_string(r, limits.max_string_length)?)
            } else {
                None
            };
            fields.push(FieldSpec {
                name: field_name,
                type_name,
                pointer: flags & FLAG_POINTER != 0,
                shape,
                description,
            });
        }
        types.push(TypeDefinition { name, fields });
    }
    Ok(types)
}
