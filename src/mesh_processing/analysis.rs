use serde::{Deserialize, Serialize};

use crate::model::Model;

/// Summary statistics for an assembled model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshStats {
    pub node_count: u32,
    pub mesh_count: u32,
    pub surface_count: u32,
    pub instruction_count: u32,
    pub vertex_count: u32,
    pub texcoord_count: u32,
    pub color_count: u32,
    pub triangle_count: u32,
    pub texture_count: u32,
    pub inherited_vertex_count: u32,
    pub has_texcoords: bool,
    pub has_vertex_colors: bool,
    /// Warnings about potential issues (e.g. texture references past the texture list).
    pub warnings: Vec<String>,
}

pub fn analyze_model(model: &Model) -> MeshStats {
    let mut stats = MeshStats {
        node_count: model.node_count() as u32,
        vertex_count: model.vertex_buffer.vertex_count(),
        texcoord_count: model.vertex_buffer.texcoords.len() as u32,
        color_count: model.vertex_buffer.colors.len() as u32,
        texture_count: model.textures.len() as u32,
        ..Default::default()
    };

    let mut max_texture: Option<u16> = None;
    for mesh in model.meshes() {
        stats.mesh_count += 1;
        stats.instruction_count += mesh.instructions.len() as u32;
        stats.inherited_vertex_count += mesh.inherited_count;
        for surface in &mesh.surfaces {
            stats.surface_count += 1;
            stats.triangle_count += surface.triangle_count() as u32;
            stats.has_texcoords |= surface.has_texcoord();
            stats.has_vertex_colors |= surface.has_color();
            if !surface.is_consistent() {
                stats.warnings.push(format!(
                    "Surface with {} position indices has mismatched attribute lists",
                    surface.index_count()
                ));
            }
            max_texture = max_texture.max(Some(surface.state.texture));
        }
    }

    if let Some(texture) = max_texture {
        if stats.texture_count > 0 && texture as u32 >= stats.texture_count {
            stats.warnings.push(format!(
                "Surface references texture {} but the model lists {}",
                texture, stats.texture_count
            ));
        }
    }

    if stats.mesh_count > 0 && stats.triangle_count == 0 {
        stats
            .warnings
            .push("Model has meshes but no triangles".to_string());
    }

    stats
}
