use std::io::Cursor;

use binrw::{binrw, BinRead};
use cgmath::{Matrix4, SquareMatrix, Vector2, Vector4};

use super::instruction::{strip_to_triangles, Instruction, StripInstruction, StripState};
use super::resolve_offset;
use crate::error::{DecodeError, Result};
use crate::math::{self, Mt5Vector3};
use crate::model::{MeshSurface, NodeMesh};

pub const MESH_HEADER_SIZE: u64 = 32;
pub const VERTEX_RECORD_SIZE: u64 = 24;

#[binrw]
#[derive(Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct MeshHeader {
    pub mesh_type: u32,
    pub vertices_offset: u32,
    pub vertex_count: i32,
    pub instructions_offset: u32,
    pub center: Mt5Vector3,
    pub radius: f32,
}

#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[brw(little)]
pub struct VertexRecord {
    pub position: Mt5Vector3,
    pub normal: Mt5Vector3,
}

/// Decodes the mesh attached to one node.
pub(crate) struct MeshReader<'a> {
    data: &'a [u8],
    base: u64,
}

impl<'a> MeshReader<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self { data, base }
    }

    /// Read the mesh whose header sits at base-relative `mesh_offset`.
    ///
    /// `local` is the owning node's own transform; `parent` is the parent node's mesh,
    /// if any, whose local vertices get appended after this mesh's vertices.
    pub fn read(
        &self,
        mesh_offset: u32,
        local: &Matrix4<f32>,
        parent: Option<&NodeMesh>,
    ) -> Result<(MeshHeader, NodeMesh)> {
        let header_offset = resolve_offset(self.data, self.base, mesh_offset, "mesh header")?;
        let mut cursor = Cursor::new(self.data);
        cursor.set_position(header_offset);
        let header = MeshHeader::read_le(&mut cursor)
            .map_err(|e| DecodeError::from_binrw(e, "mesh header", header_offset))?;

        if header.vertex_count < 0 {
            return Err(DecodeError::Malformed {
                what: "mesh header",
                offset: header_offset,
                message: format!("negative vertex count {}", header.vertex_count),
            });
        }

        let mut mesh = NodeMesh {
            mesh_type: header.mesh_type,
            vertex_count: header.vertex_count as u32,
            ..Default::default()
        };

        self.read_vertices(&mut cursor, &header, &mut mesh)?;
        if let Some(parent) = parent {
            inherit_parent_vertices(&mut mesh, parent, local, header_offset)?;
        }
        if header.instructions_offset != 0 {
            self.read_instructions(&mut cursor, header.instructions_offset, &mut mesh)?;
        }

        log::debug!(
            "mesh at 0x{:X}: {} vertices (+{} inherited), {} instructions, {} surfaces",
            header_offset,
            mesh.vertex_count,
            mesh.inherited_count,
            mesh.instructions.len(),
            mesh.surfaces.len()
        );

        Ok((header, mesh))
    }

    fn read_vertices(
        &self,
        cursor: &mut Cursor<&[u8]>,
        header: &MeshHeader,
        mesh: &mut NodeMesh,
    ) -> Result<()> {
        if header.vertex_count == 0 {
            return Ok(());
        }
        let start = resolve_offset(self.data, self.base, header.vertices_offset, "vertex array")?;
        let end = start + header.vertex_count as u64 * VERTEX_RECORD_SIZE;
        if end > self.data.len() as u64 {
            return Err(DecodeError::Truncated {
                what: "vertex array",
                offset: start,
            });
        }

        cursor.set_position(start);
        for _ in 0..header.vertex_count {
            let offset = cursor.position();
            let record = VertexRecord::read_le(cursor)
                .map_err(|e| DecodeError::from_binrw(e, "vertex record", offset))?;
            mesh.vertices.positions.push(record.position.0);
            mesh.vertices.normals.push(record.normal.0);
        }
        Ok(())
    }

    fn read_instructions(
        &self,
        cursor: &mut Cursor<&[u8]>,
        instructions_offset: u32,
        mesh: &mut NodeMesh,
    ) -> Result<()> {
        let start = resolve_offset(
            self.data,
            self.base,
            instructions_offset,
            "instruction stream",
        )?;
        let len = self.data.len() as u64;
        cursor.set_position(start);

        let mut state = StripState::default();
        loop {
            let offset = cursor.position();
            if offset + 2 > len {
                break;
            }
            let instruction = Instruction::read_le(cursor)
                .map_err(|e| DecodeError::from_binrw(e, "instruction", offset))?;
            log::trace!("instruction 0x{:04X} at 0x{:X}", instruction.opcode(), offset);

            state = state.apply(&instruction);
            if let Instruction::Strip(strip) = &instruction {
                append_strip(mesh, &state, strip, offset)?;
            }
            if let Instruction::Unrecognized { opcode } = instruction {
                log::warn!(
                    "unrecognized opcode 0x{:04X} at 0x{:X}, stopping mesh stream",
                    opcode,
                    offset
                );
            }

            let stop = instruction.terminates();
            mesh.instructions.push(instruction);
            if stop {
                break;
            }
        }
        Ok(())
    }
}

/// Append the parent's own vertices, moved into this node's local frame.
fn inherit_parent_vertices(
    mesh: &mut NodeMesh,
    parent: &NodeMesh,
    local: &Matrix4<f32>,
    offset: u64,
) -> Result<()> {
    let count = parent.vertex_count as usize;
    if count == 0 {
        return Ok(());
    }
    let inverse = local.invert().ok_or_else(|| DecodeError::Malformed {
        what: "mesh header",
        offset,
        message: "node transform cannot be inverted for parent vertex inheritance".to_string(),
    })?;

    let positions = parent.vertices.positions.iter().take(count);
    let normals = parent.vertices.normals.iter().take(count);
    for (position, normal) in positions.zip(normals) {
        mesh.vertices
            .positions
            .push(math::transform_position(&inverse, *position));
        mesh.vertices
            .normals
            .push(math::transform_normal(&inverse, *normal));
    }
    mesh.inherited_count = count as u32;
    Ok(())
}

/// Map a strip index onto the combined vertex space. `-1` is the first inherited vertex.
pub fn combined_index(index: i32, vertex_count: u32) -> i64 {
    if index < 0 {
        vertex_count as i64 - index as i64 - 1
    } else {
        index as i64
    }
}

fn append_strip(
    mesh: &mut NodeMesh,
    state: &StripState,
    strip: &StripInstruction,
    offset: u64,
) -> Result<()> {
    let layout = strip.layout;
    let combined_len = mesh.vertices.positions.len() as i64;
    let uv_size = state.uv_size as f32;

    let mut positions = vec![];
    let mut texcoords = vec![];
    let mut colors = vec![];

    for s in &strip.strips {
        let mut strip_positions = vec![];
        let mut strip_texcoords = vec![];
        let mut strip_colors = vec![];

        for vertex in &s.vertices {
            let index = combined_index(vertex.index, mesh.vertex_count);
            if index < 0 || index >= combined_len {
                return Err(DecodeError::Malformed {
                    what: "strip instruction",
                    offset,
                    message: format!(
                        "index {} outside the {} available vertices",
                        vertex.index, combined_len
                    ),
                });
            }
            strip_positions.push(index as u32);

            if let Some([u, v]) = vertex.uv {
                strip_texcoords.push(mesh.vertices.texcoords.len() as u32);
                mesh.vertices
                    .texcoords
                    .push(Vector2::new(u as f32 / uv_size, v as f32 / uv_size));
            }
            if let Some([b, g, r, a]) = vertex.color {
                strip_colors.push(mesh.vertices.colors.len() as u32);
                mesh.vertices.colors.push(Vector4::new(
                    r as f32 / 255.0,
                    g as f32 / 255.0,
                    b as f32 / 255.0,
                    a as f32 / 255.0,
                ));
            }
        }

        let corners: Vec<usize> = (0..strip_positions.len()).collect();
        for triangle in strip_to_triangles(&corners, s.reversed) {
            for corner in triangle {
                positions.push(strip_positions[corner]);
                if layout.uv {
                    texcoords.push(strip_texcoords[corner]);
                }
                if layout.color {
                    colors.push(strip_colors[corner]);
                }
            }
        }
    }

    if positions.is_empty() {
        return Ok(());
    }

    let reuse_last = matches!(
        mesh.surfaces.last(),
        Some(last) if last.state == *state
            && last.has_texcoord() == layout.uv
            && last.has_color() == layout.color
    );
    if !reuse_last {
        mesh.surfaces.push(MeshSurface::new(state.clone()));
    }
    let Some(surface) = mesh.surfaces.last_mut() else {
        return Ok(());
    };
    surface.normal_indices.extend_from_slice(&positions);
    surface.position_indices.extend(positions);
    surface.texcoord_indices.extend(texcoords);
    surface.color_indices.extend(colors);
    Ok(())
}
