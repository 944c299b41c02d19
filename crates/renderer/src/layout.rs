//! std140 layout of the per-program parameter block.
//!
//! Every non-sampler uniform of a program lives in one uniform block, in
//! declaration order. Booleans are stored as floats; the generated GLSL
//! compares them against 0.5. Samplers become texture/sampler pairs in the
//! second bind group, also in declaration order.
use catalog::GlslType;
use engine::{SlotValue, UniformTable};

/// Member name used when a program declares no numeric uniforms; uniform
/// blocks may not be empty.
pub(crate) const PADDING_MEMBER: &str = "shaderlab_padding";

#[derive(Debug, Clone, PartialEq)]
pub struct BlockMember {
    pub name: String,
    pub ty: GlslType,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramLayout {
    members: Vec<BlockMember>,
    samplers: Vec<String>,
    size: u32,
}

impl ProgramLayout {
    pub fn from_table(table: &UniformTable) -> Self {
        let mut layout = Self::default();
        let mut cursor = 0u32;
        for slot in table.slots() {
            if slot.ty.is_sampler() {
                layout.samplers.push(slot.name.clone());
                continue;
            }
            let (size, align) = std140_size_align(slot.ty);
            let offset = round_up(cursor, align);
            layout.members.push(BlockMember {
                name: slot.name.clone(),
                ty: slot.ty,
                offset,
            });
            cursor = offset + size;
        }
        layout.size = round_up(cursor.max(4), 16);
        layout
    }

    pub fn members(&self) -> &[BlockMember] {
        &self.members
    }

    pub fn samplers(&self) -> &[String] {
        &self.samplers
    }

    /// Block size in bytes, a non-zero multiple of 16.
    pub fn size(&self) -> u32 {
        self.size.max(16)
    }

    /// Serializes the table's current values into a block-sized buffer.
    /// Members whose slot vanished or holds an unexpected shape stay zeroed.
    pub fn pack(&self, table: &UniformTable) -> Vec<u8> {
        let mut bytes = vec![0u8; self.size() as usize];
        for member in &self.members {
            let Some(slot) = table.get(&member.name) else {
                continue;
            };
            let start = member.offset as usize;
            match &slot.value {
                SlotValue::Int(value) => {
                    bytes[start..start + 4].copy_from_slice(bytemuck::bytes_of(value));
                }
                value => {
                    let Some(floats) = value.as_floats() else {
                        continue;
                    };
                    let raw: &[u8] = bytemuck::cast_slice(&floats);
                    let (size, _) = std140_size_align(member.ty);
                    let len = raw.len().min(size as usize);
                    bytes[start..start + len].copy_from_slice(&raw[..len]);
                }
            }
        }
        bytes
    }
}

/// GLSL type used for a member inside the block.
pub(crate) fn block_type(ty: GlslType) -> &'static str {
    match ty {
        GlslType::Bool => "float",
        other => other.as_str(),
    }
}

fn std140_size_align(ty: GlslType) -> (u32, u32) {
    match ty {
        GlslType::Float | GlslType::Int | GlslType::Bool => (4, 4),
        GlslType::Vec2 => (8, 8),
        GlslType::Vec3 => (12, 16),
        GlslType::Vec4 => (16, 16),
        GlslType::Sampler2D => (0, 1),
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}
