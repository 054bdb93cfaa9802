use std::mem;

use super::{Model, ModelNode, NodeId, Texture, VertexBuffer};
use crate::math;

fn rebase(indices: &mut [u32], base: u32) {
    for index in indices.iter_mut() {
        *index += base;
    }
}

/// Flatten every node's vertices into one shared buffer and move surface indices from
/// node-local space into buffer space.
///
/// `nodes` must be in traversal order with the root first, as the node tree reader
/// produces them. Each mesh contributes its local vertices followed by its inherited ones.
pub fn assemble(nodes: Vec<ModelNode>, textures: Vec<Texture>) -> Model {
    let mut model = Model {
        root: (!nodes.is_empty()).then_some(NodeId(0)),
        nodes,
        vertex_buffer: VertexBuffer::default(),
        textures,
    };

    let mut buffer = VertexBuffer::default();
    for id in model.traverse() {
        let world = model.transform_matrix(id);
        let Some(node) = model.nodes.get_mut(id.0) else {
            continue;
        };
        let joint = node.bone_id();
        let node_index = id.0 as u32;
        let Some(mesh) = node.mesh.as_mut() else {
            continue;
        };

        let vertices = mem::take(&mut mesh.vertices);
        let vertex_base = buffer.positions.len() as u32;
        let texcoord_base = buffer.texcoords.len() as u32;
        let color_base = buffer.colors.len() as u32;
        mesh.vertex_buffer_offset = vertex_base;

        for (position, normal) in vertices.positions.iter().zip(vertices.normals.iter()) {
            buffer.positions.push(*position);
            buffer.normals.push(*normal);
            buffer
                .t_positions
                .push(math::transform_position(&world, *position));
            buffer.t_normals.push(math::transform_normal(&world, *normal));
            buffer.weights.push(1.0);
            buffer.joints.push(joint);
            buffer.nodes.push(node_index);
        }
        buffer.texcoords.extend(vertices.texcoords);
        buffer.colors.extend(vertices.colors);

        for surface in mesh.surfaces.iter_mut() {
            rebase(&mut surface.position_indices, vertex_base);
            rebase(&mut surface.normal_indices, vertex_base);
            rebase(&mut surface.texcoord_indices, texcoord_base);
            rebase(&mut surface.color_indices, color_base);
            surface.weight_indices = surface.position_indices.clone();
            surface.joint_indices = surface.position_indices.clone();
            surface.node_indices = surface.position_indices.clone();
        }

        log::trace!(
            "node {} vertices placed at {} ({} entries)",
            id.0,
            vertex_base,
            buffer.positions.len() as u32 - vertex_base
        );
    }

    model.vertex_buffer = buffer;
    model
}
