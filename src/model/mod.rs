pub mod assemble;
pub mod bone;

use std::io;

use binrw::binrw;
use cgmath::{Matrix4, SquareMatrix, Vector2, Vector3, Vector4};
use ptree::{item::StringItem, TreeBuilder};

use crate::math;
use crate::mt5::instruction::{Instruction, StripState};

pub use bone::BoneId;

/// Stable index of a node inside [`Model::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 8-byte texture identifier used by `NAME` and `TEXN` chunks.
#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[brw(little)]
pub struct TextureId(pub [u8; 8]);

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// A texture slot of the model. `data` holds the embedded image payload of a `TEXN`
/// chunk; textures only referenced by name carry `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub id: TextureId,
    pub data: Option<Vec<u8>>,
}

/// Each vertex attribute lives in its own array, since a vertex can share position and
/// normal with another one while differing in texture coordinate.
#[derive(Debug, Clone, Default)]
pub struct VertexBuffer {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub texcoords: Vec<Vector2<f32>>,
    pub colors: Vec<Vector4<f32>>,
    pub weights: Vec<f32>,
    pub joints: Vec<BoneId>,
    pub nodes: Vec<u32>,

    /// positions moved into model space by their node's effective transform
    pub t_positions: Vec<Vector3<f32>>,
    /// normals moved into model space by their node's effective transform
    pub t_normals: Vec<Vector3<f32>>,
}

impl VertexBuffer {
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn position_data(&self, matrix: Option<&Matrix4<f32>>) -> Vec<u8> {
        let data: Vec<[f32; 3]> = self
            .positions
            .iter()
            .map(|p| match matrix {
                Some(m) => math::transform_position(m, *p),
                None => *p,
            })
            .map(|p| [p.x, p.y, p.z])
            .collect();
        bytemuck::cast_slice(&data).to_vec()
    }

    pub fn normal_data(&self, matrix: Option<&Matrix4<f32>>) -> Vec<u8> {
        let data: Vec<[f32; 3]> = self
            .normals
            .iter()
            .map(|n| match matrix {
                Some(m) => math::transform_normal(m, *n),
                None => *n,
            })
            .map(|n| [n.x, n.y, n.z])
            .collect();
        bytemuck::cast_slice(&data).to_vec()
    }

    pub fn texcoord_data(&self) -> Vec<u8> {
        let data: Vec<[f32; 2]> = self.texcoords.iter().map(|t| [t.x, t.y]).collect();
        bytemuck::cast_slice(&data).to_vec()
    }

    pub fn color_data(&self) -> Vec<u8> {
        let data: Vec<[f32; 4]> = self.colors.iter().map(|c| [c.x, c.y, c.z, c.w]).collect();
        bytemuck::cast_slice(&data).to_vec()
    }

    pub fn weight_data(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.weights).to_vec()
    }

    pub fn joint_data(&self) -> Vec<u8> {
        self.joints.iter().map(|j| *j as u8).collect()
    }
}

/// A run of triangles sharing one render-state snapshot.
///
/// Index lists are parallel: every non-empty list has the same length, three entries per
/// triangle. An empty list means the surface does not use that attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSurface {
    pub state: StripState,
    pub position_indices: Vec<u32>,
    pub normal_indices: Vec<u32>,
    pub texcoord_indices: Vec<u32>,
    pub color_indices: Vec<u32>,
    pub weight_indices: Vec<u32>,
    pub joint_indices: Vec<u32>,
    pub node_indices: Vec<u32>,
}

impl MeshSurface {
    pub fn new(state: StripState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    pub fn index_count(&self) -> usize {
        self.position_indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.position_indices.len() / 3
    }

    pub fn has_position(&self) -> bool {
        !self.position_indices.is_empty()
    }

    pub fn has_normal(&self) -> bool {
        !self.normal_indices.is_empty()
    }

    pub fn has_texcoord(&self) -> bool {
        !self.texcoord_indices.is_empty()
    }

    pub fn has_color(&self) -> bool {
        !self.color_indices.is_empty()
    }

    pub fn has_weight(&self) -> bool {
        !self.weight_indices.is_empty()
    }

    pub fn has_joint(&self) -> bool {
        !self.joint_indices.is_empty()
    }

    pub fn has_node(&self) -> bool {
        !self.node_indices.is_empty()
    }

    /// Position indices of triangle `t`.
    pub fn triangle(&self, t: usize) -> [u32; 3] {
        let i = t * 3;
        [
            self.position_indices[i],
            self.position_indices[i + 1],
            self.position_indices[i + 2],
        ]
    }

    pub fn index_lists(&self) -> [&Vec<u32>; 7] {
        [
            &self.position_indices,
            &self.normal_indices,
            &self.texcoord_indices,
            &self.color_indices,
            &self.weight_indices,
            &self.joint_indices,
            &self.node_indices,
        ]
    }

    pub fn index_lists_mut(&mut self) -> [&mut Vec<u32>; 7] {
        [
            &mut self.position_indices,
            &mut self.normal_indices,
            &mut self.texcoord_indices,
            &mut self.color_indices,
            &mut self.weight_indices,
            &mut self.joint_indices,
            &mut self.node_indices,
        ]
    }

    /// True when every non-empty index list has the same length and forms whole triangles.
    pub fn is_consistent(&self) -> bool {
        let len = self.position_indices.len();
        len % 3 == 0
            && self
                .index_lists()
                .iter()
                .all(|list| list.is_empty() || list.len() == len)
    }

    /// Drop every triangle whose entry in `keep` is false. Returns the number removed.
    pub fn retain_triangles(&mut self, keep: &[bool]) -> usize {
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }
        for list in self.index_lists_mut() {
            if list.is_empty() {
                continue;
            }
            let mut kept = Vec::with_capacity(list.len());
            for (t, tri) in list.chunks(3).enumerate() {
                if keep.get(t).copied().unwrap_or(false) {
                    kept.extend_from_slice(tri);
                }
            }
            *list = kept;
        }
        removed
    }
}

/// Per-node vertex data as decoded, in the node's local frame. Local vertices come first,
/// followed by the inherited parent vertices.
#[derive(Debug, Clone, Default)]
pub struct MeshVertices {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub texcoords: Vec<Vector2<f32>>,
    pub colors: Vec<Vector4<f32>>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeMesh {
    pub mesh_type: u32,
    /// vertices stored in the node's own vertex array
    pub vertex_count: u32,
    /// vertices copied from the parent mesh
    pub inherited_count: u32,
    /// first entry of this mesh inside [`VertexBuffer::positions`], set on assembly
    pub vertex_buffer_offset: u32,
    /// decoded vertex data; moved into the model's vertex buffer on assembly
    pub vertices: MeshVertices,
    pub surfaces: Vec<MeshSurface>,
    pub instructions: Vec<Instruction>,
}

impl NodeMesh {
    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.triangle_count()).sum()
    }

    /// The instruction stream re-encoded in decode order.
    pub fn instruction_bytes(&self) -> binrw::BinResult<Vec<u8>> {
        use binrw::BinWrite;

        let mut cursor = io::Cursor::new(Vec::new());
        for instruction in &self.instructions {
            instruction.write_le(&mut cursor)?;
        }
        Ok(cursor.into_inner())
    }
}

#[derive(Debug, Clone)]
pub struct ModelNode {
    pub index: NodeId,
    /// absolute offset of the node record in the source buffer
    pub offset: u64,

    pub id: u32,
    pub position: Vector3<f32>,
    /// euler angles in degrees
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub center: Vector3<f32>,
    pub radius: f32,
    pub name: String,

    pub parent: Option<NodeId>,
    pub child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,

    pub mesh: Option<NodeMesh>,
}

impl ModelNode {
    pub fn transform_matrix_self(&self) -> Matrix4<f32> {
        math::local_transform(self.position, self.rotation, self.scale)
    }

    pub fn bone_id(&self) -> BoneId {
        BoneId::from_u8((self.id & 0xFF) as u8)
    }
}

/// Decoded scene graph plus the shared vertex buffer. Nodes are stored in an arena in
/// traversal order: a node, its children depth-first, then its siblings.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub nodes: Vec<ModelNode>,
    pub root: Option<NodeId>,
    pub vertex_buffer: VertexBuffer,
    pub textures: Vec<Texture>,
}

impl Model {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&ModelNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ModelNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn root_node(&self) -> Option<&ModelNode> {
        self.root.and_then(|id| self.node(id))
    }

    /// Direct children of `id`, following the sibling chain from its first child.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut current = self.node(id).and_then(|n| n.child);
        while let Some(child) = current {
            out.push(child);
            current = self.node(child).and_then(|n| n.next_sibling);
        }
        out
    }

    /// All nodes reachable from the root: each node, then its children depth-first,
    /// then its siblings.
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            order.push(id);
            if let Some(sibling) = node.next_sibling {
                stack.push(sibling);
            }
            if let Some(child) = node.child {
                stack.push(child);
            }
        }
        order
    }

    /// Effective transform of `id`: every ancestor's local transform applied root-to-leaf.
    pub fn transform_matrix(&self, id: NodeId) -> Matrix4<f32> {
        let mut matrix = Matrix4::identity();
        let mut current = self.node(id);
        while let Some(node) = current {
            matrix = node.transform_matrix_self() * matrix;
            current = node.parent.and_then(|p| self.node(p));
        }
        matrix
    }

    pub fn meshes(&self) -> impl Iterator<Item = &NodeMesh> {
        self.nodes.iter().filter_map(|n| n.mesh.as_ref())
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &MeshSurface> {
        self.meshes().flat_map(|m| m.surfaces.iter())
    }

    pub fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut MeshSurface> {
        self.nodes
            .iter_mut()
            .filter_map(|n| n.mesh.as_mut())
            .flat_map(|m| m.surfaces.iter_mut())
    }

    pub fn triangle_count(&self) -> usize {
        self.surfaces().map(|s| s.triangle_count()).sum()
    }

    pub fn tree_item(&self) -> StringItem {
        let mut tree = TreeBuilder::new(format!("model ({} nodes)", self.node_count()));
        let mut current = self.root;
        while let Some(id) = current {
            self.add_node_to_tree(id, &mut tree);
            current = self.node(id).and_then(|n| n.next_sibling);
        }
        tree.build()
    }

    pub fn write_tree<W: io::Write>(&self, writer: W) -> io::Result<()> {
        ptree::write_tree(&self.tree_item(), writer)
    }

    fn add_node_to_tree(&self, id: NodeId, tree: &mut TreeBuilder) {
        let Some(node) = self.node(id) else {
            return;
        };
        let mut label = format!("[{}] id=0x{:08X}", id.0, node.id);
        if !node.name.is_empty() {
            label.push_str(&format!(" '{}'", node.name));
        }
        if let Some(mesh) = &node.mesh {
            label.push_str(&format!(
                " mesh(vertices={}, surfaces={})",
                mesh.vertex_count,
                mesh.surfaces.len()
            ));
        }

        let children = self.children(id);
        if children.is_empty() {
            tree.add_empty_child(label);
        } else {
            tree.begin_child(label);
            for child in children {
                self.add_node_to_tree(child, tree);
            }
            tree.end_child();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Zero};

    fn node(index: usize, parent: Option<usize>) -> ModelNode {
        ModelNode {
            index: NodeId(index),
            offset: 0,
            id: index as u32,
            position: Vector3::zero(),
            rotation: Vector3::zero(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            center: Vector3::zero(),
            radius: 0.0,
            name: String::new(),
            parent: parent.map(NodeId),
            child: None,
            next_sibling: None,
            mesh: None,
        }
    }

    /// root -> (a -> c), b
    fn small_model() -> Model {
        let mut nodes = vec![node(0, None), node(1, Some(0)), node(2, Some(1)), node(3, Some(0))];
        nodes[0].child = Some(NodeId(1));
        nodes[1].child = Some(NodeId(2));
        nodes[1].next_sibling = Some(NodeId(3));
        nodes[1].position = Vector3::new(1.0, 0.0, 0.0);
        nodes[2].position = Vector3::new(0.0, 2.0, 0.0);
        Model {
            nodes,
            root: Some(NodeId(0)),
            ..Default::default()
        }
    }

    #[test]
    fn children_follow_sibling_chain() {
        let model = small_model();
        assert_eq!(model.children(NodeId(0)), vec![NodeId(1), NodeId(3)]);
        assert_eq!(model.children(NodeId(2)), vec![]);
    }

    #[test]
    fn traverse_is_depth_first_preorder() {
        let model = small_model();
        assert_eq!(
            model.traverse(),
            vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)]
        );
    }

    #[test]
    fn effective_transform_composes_ancestors() {
        let model = small_model();
        let m = model.transform_matrix(NodeId(2));
        let p = math::transform_position(&m, Vector3::zero());
        assert!((p - Vector3::new(1.0, 2.0, 0.0)).magnitude() < 0.0001);
    }

    #[test]
    fn retain_triangles_filters_every_used_list() {
        let mut surface = MeshSurface::default();
        surface.position_indices = vec![0, 1, 2, 2, 1, 3];
        surface.normal_indices = vec![0, 1, 2, 2, 1, 3];
        surface.texcoord_indices = vec![10, 11, 12, 13, 14, 15];
        assert_eq!(surface.retain_triangles(&[false, true]), 1);
        assert_eq!(surface.position_indices, vec![2, 1, 3]);
        assert_eq!(surface.texcoord_indices, vec![13, 14, 15]);
        assert!(surface.color_indices.is_empty());
        assert!(surface.is_consistent());
    }

    #[test]
    fn tree_dump_lists_every_node() {
        let model = small_model();
        let mut out = Vec::new();
        model.write_tree(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for i in 0..4 {
            assert!(text.contains(&format!("[{}]", i)), "{}", text);
        }
    }

    #[test]
    fn texture_id_displays_as_hex() {
        let id = TextureId([0xDE, 0xAD, 0xBE, 0xEF, 0, 1, 2, 3]);
        assert_eq!(id.to_string(), "DEADBEEF00010203");
    }
}
