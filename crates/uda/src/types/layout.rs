// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pure struct layout computation.
//!
//! Offsets depend only on the declared field list and the pointer width,
//! never on the host compiler's struct layout.
//!
//! ```text
//! offset[0] = 0
//! offset[i] = end[i-1] + pad[i]        pad[i] = (align[i] - end[i-1] % align[i]) % align[i]
//! size      = end[n-1] rounded up to max(align)
//! ```

use crate::types::FieldDescriptor;

/// Size/count/alignment of one member, the layout inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub size: usize,
    pub count: usize,
    pub alignment: usize,
}

/// Placement of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub offset: usize,
    pub padding: usize,
}

/// Result of laying out a member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub placements: Vec<Placement>,
    pub byte_size: usize,
    pub alignment: usize,
}

/// Padding needed to bring `offset` to a multiple of `alignment`.
pub fn padding_for(offset: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return 0;
    }
    (alignment - offset % alignment) % alignment
}

/// Lay out members in declaration order.
pub fn compute(members: &[Member]) -> StructLayout {
    let mut placements = Vec::with_capacity(members.len());
    let mut end = 0usize;
    let mut max_align = 1usize;

    for m in members {
        let padding = padding_for(end, m.alignment);
        let offset = end + padding;
        end = offset + m.size * m.count;
        max_align = max_align.max(m.alignment);
        placements.push(Placement { offset, padding });
    }

    StructLayout {
        placements,
        byte_size: end + padding_for(end, max_align),
        alignment: max_align,
    }
}

/// Recompute the layout of already-resolved fields.
pub fn recompute(fields: &[FieldDescriptor]) -> StructLayout {
    let members: Vec<Member> = fields
        .iter()
        .map(|f| Member {
            size: f.element_size,
            count: f.element_count,
            alignment: f.alignment,
        })
        .collect();
    compute(&members)
}
