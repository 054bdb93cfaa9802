pub mod chunks;
pub mod instruction;
pub mod mesh;
pub mod node;

use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use binrw::{binrw, BinRead};

use crate::error::{DecodeError, Result};
use crate::model::{assemble, Model};

use self::chunks::ChunkSet;
use self::node::NodeTreeReader;

pub const MT5_SIGNATURE: [u8; 4] = *b"HRCM";
pub const MT5_HEADER_SIZE: u64 = 12;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct Mt5Header {
    pub signature: [u8; 4],
    /// base-relative start of the auxiliary chunks, 0 when there are none
    pub chunks_offset: u32,
    /// base-relative offset of the root node record, 0 for an empty model
    pub first_node_offset: u32,
}

impl Default for Mt5Header {
    fn default() -> Self {
        Self {
            signature: MT5_SIGNATURE,
            chunks_offset: 0,
            first_node_offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mt5ReadOptions {
    /// position of the model's first byte inside the buffer handed to the reader
    pub base_offset: u64,
}

/// A decoded MT5 file: the assembled model plus the raw auxiliary chunks.
#[derive(Debug, Clone)]
pub struct Mt5 {
    pub header: Mt5Header,
    pub model: Model,
    pub chunks: ChunkSet,
}

/// Absolute position of base-relative `offset`, rejected when it falls outside `data`.
pub(crate) fn resolve_offset(data: &[u8], base: u64, offset: u32, what: &'static str) -> Result<u64> {
    let absolute = base + offset as u64;
    if absolute >= data.len() as u64 {
        return Err(DecodeError::OutOfBounds {
            what,
            offset: absolute,
            len: data.len(),
        });
    }
    Ok(absolute)
}

fn check_signature(data: &[u8], base: u64) -> Result<()> {
    let found: [u8; 4] = usize::try_from(base)
        .ok()
        .and_then(|start| data.get(start..start.checked_add(4)?))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(DecodeError::Truncated {
            what: "file header",
            offset: base,
        })?;
    if found != MT5_SIGNATURE {
        return Err(DecodeError::BadSignature {
            offset: base,
            expected: MT5_SIGNATURE,
            found,
        });
    }
    Ok(())
}

impl Mt5 {
    pub fn read(data: &[u8], options: &Mt5ReadOptions) -> Result<Self> {
        let base = options.base_offset;
        check_signature(data, base)?;

        let mut cursor = Cursor::new(data);
        cursor.set_position(base);
        let header = Mt5Header::read_le(&mut cursor)
            .map_err(|e| DecodeError::from_binrw(e, "file header", base))?;

        let nodes = if header.first_node_offset == 0 {
            vec![]
        } else {
            NodeTreeReader::new(data, base).read_tree(header.first_node_offset)?
        };

        let chunks = if header.chunks_offset == 0 {
            ChunkSet::default()
        } else {
            chunks::read_chunks(data, base + header.chunks_offset as u64)?
        };
        chunks.check_texture_count()?;

        let model = assemble::assemble(nodes, chunks.textures());
        log::debug!(
            "decoded MT5: {} nodes, {} vertices, {} triangles, {} textures",
            model.node_count(),
            model.vertex_buffer.vertex_count(),
            model.triangle_count(),
            model.textures.len()
        );

        Ok(Self {
            header,
            model,
            chunks,
        })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read(data, &Mt5ReadOptions::default())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read MT5 file {}", path.display()))?;
        let mt5 = Self::from_bytes(&data)
            .with_context(|| format!("failed to decode MT5 file {}", path.display()))?;
        Ok(mt5)
    }

    pub fn into_model(self) -> Model {
        self.model
    }
}

/// Decode the model stored at the start of `data`.
pub fn decode_model(data: &[u8]) -> Result<Model> {
    Mt5::from_bytes(data).map(Mt5::into_model)
}
