use std::collections::HashSet;
use std::io::Cursor;

use binrw::{binrw, BinRead, NullString};
use cgmath::{Vector3, Zero};

use super::mesh::MeshReader;
use super::resolve_offset;
use crate::error::{DecodeError, Result};
use crate::math::{Mt5Rotation, Mt5Vector3};
use crate::model::{ModelNode, NodeId};

pub const NODE_RECORD_SIZE: u64 = 64;

/// On-disk node record. Every offset is relative to the model base; zero means absent.
#[binrw]
#[derive(Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct NodeRecord {
    pub id: u32,
    pub mesh_offset: u32,
    pub rotation: Mt5Rotation,
    pub scale: Mt5Vector3,
    pub position: Mt5Vector3,
    pub child_offset: u32,
    pub sibling_offset: u32,
    /// not trusted; the parent comes from traversal
    pub parent_offset: u32,
    pub name_offset: u32,
    pub reserved: u32,
}

struct Pending {
    offset: u32,
    parent: Option<NodeId>,
    previous_sibling: Option<NodeId>,
}

/// Rebuilds the node arena from offset-linked records.
pub(crate) struct NodeTreeReader<'a> {
    data: &'a [u8],
    base: u64,
    cursor: Cursor<&'a [u8]>,
    nodes: Vec<ModelNode>,
    visited: HashSet<u64>,
}

impl<'a> NodeTreeReader<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self {
            data,
            base,
            cursor: Cursor::new(data),
            nodes: vec![],
            visited: HashSet::new(),
        }
    }

    /// Read the tree whose first node is at base-relative `first_offset`. Nodes come out
    /// in traversal order: a node, its children depth-first, then its siblings.
    pub fn read_tree(mut self, first_offset: u32) -> Result<Vec<ModelNode>> {
        let mut stack = vec![Pending {
            offset: first_offset,
            parent: None,
            previous_sibling: None,
        }];

        while let Some(pending) = stack.pop() {
            let (index, record) = self.read_node(&pending)?;

            if record.sibling_offset != 0 {
                stack.push(Pending {
                    offset: record.sibling_offset,
                    parent: pending.parent,
                    previous_sibling: Some(index),
                });
            }
            if record.child_offset != 0 {
                stack.push(Pending {
                    offset: record.child_offset,
                    parent: Some(index),
                    previous_sibling: None,
                });
            }
        }

        Ok(self.nodes)
    }

    fn read_node(&mut self, pending: &Pending) -> Result<(NodeId, NodeRecord)> {
        let offset = resolve_offset(self.data, self.base, pending.offset, "node record")?;
        if !self.visited.insert(offset) {
            return Err(DecodeError::OffsetCycle {
                what: "node",
                offset,
            });
        }

        self.cursor.set_position(offset);
        let record = NodeRecord::read_le(&mut self.cursor)
            .map_err(|e| DecodeError::from_binrw(e, "node record", offset))?;
        let name = self.read_name(record.name_offset)?;

        let index = NodeId(self.nodes.len());
        let mut node = ModelNode {
            index,
            offset,
            id: record.id,
            position: record.position.0,
            rotation: record.rotation.to_degrees(),
            scale: record.scale.0,
            center: Vector3::zero(),
            radius: 0.0,
            name,
            parent: pending.parent,
            child: None,
            next_sibling: None,
            mesh: None,
        };

        if record.mesh_offset != 0 {
            let parent_mesh = pending
                .parent
                .and_then(|p| self.nodes.get(p.0))
                .and_then(|p| p.mesh.as_ref());
            let (header, mesh) = MeshReader::new(self.data, self.base).read(
                record.mesh_offset,
                &node.transform_matrix_self(),
                parent_mesh,
            )?;
            node.center = header.center.0;
            node.radius = header.radius;
            node.mesh = Some(mesh);
        }

        log::debug!(
            "node {} at 0x{:X}: id=0x{:08X} name={:?} mesh={}",
            index.0,
            offset,
            node.id,
            node.name,
            node.mesh.is_some()
        );

        self.nodes.push(node);

        match pending.previous_sibling {
            Some(previous) => self.nodes[previous.0].next_sibling = Some(index),
            None => {
                if let Some(parent) = pending.parent {
                    self.nodes[parent.0].child = Some(index);
                }
            }
        }

        Ok((index, record))
    }

    fn read_name(&mut self, name_offset: u32) -> Result<String> {
        if name_offset == 0 {
            return Ok(String::new());
        }
        let offset = resolve_offset(self.data, self.base, name_offset, "node name")?;
        self.cursor.set_position(offset);
        let name = NullString::read_le(&mut self.cursor)
            .map_err(|e| DecodeError::from_binrw(e, "node name", offset))?;
        Ok(String::from_utf8_lossy(&name.0).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinWrite;
    use cgmath::Vector3;

    fn record(id: u32, child: u32, sibling: u32) -> NodeRecord {
        NodeRecord {
            id,
            scale: Mt5Vector3(Vector3::new(1.0, 1.0, 1.0)),
            child_offset: child,
            sibling_offset: sibling,
            ..Default::default()
        }
    }

    fn encode(records: &[NodeRecord]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        for r in records {
            r.write_le(&mut cursor).unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn links_children_and_siblings() {
        // 0 -> child 1 -> sibling 2; 1 -> child 3
        let data = encode(&[
            record(10, 64, 0),
            record(11, 192, 128),
            record(12, 0, 0),
            record(13, 0, 0),
        ]);
        let nodes = NodeTreeReader::new(&data, 0).read_tree(0).unwrap();

        let ids: Vec<u32> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![10, 11, 13, 12]);
        assert_eq!(nodes[0].child, Some(NodeId(1)));
        assert_eq!(nodes[1].child, Some(NodeId(2)));
        assert_eq!(nodes[1].next_sibling, Some(NodeId(3)));
        assert_eq!(nodes[3].parent, Some(NodeId(0)));
        assert_eq!(nodes[2].parent, Some(NodeId(1)));
        assert_eq!(nodes[0].parent, None);
    }

    #[test]
    fn reads_names_and_rotation() {
        let mut root = record(1, 0, 0);
        root.name_offset = 64;
        root.rotation = Mt5Rotation {
            x: 0,
            y: 0x4000,
            z: 0,
        };
        let mut data = encode(&[root]);
        data.extend_from_slice(b"body\0");

        let nodes = NodeTreeReader::new(&data, 0).read_tree(0).unwrap();
        assert_eq!(nodes[0].name, "body");
        assert!((nodes[0].rotation.y - 90.0).abs() < 0.001);
    }

    #[test]
    fn self_referencing_sibling_is_a_cycle() {
        let data = encode(&[record(1, 64, 0), record(2, 0, 64)]);
        match NodeTreeReader::new(&data, 0).read_tree(0) {
            Err(DecodeError::OffsetCycle { offset, .. }) => assert_eq!(offset, 64),
            other => panic!("expected cycle, got {:?}", other.map(|n| n.len())),
        }
    }

    #[test]
    fn child_offset_past_the_end_is_out_of_bounds() {
        let data = encode(&[record(1, 0x1000, 0)]);
        assert!(matches!(
            NodeTreeReader::new(&data, 0).read_tree(0),
            Err(DecodeError::OutOfBounds { offset: 0x1000, .. })
        ));
    }

    #[test]
    fn honours_base_offset() {
        let mut data = vec![0xEE; 16];
        data.extend(encode(&[record(1, 64, 0), record(2, 0, 0)]));
        let nodes = NodeTreeReader::new(&data, 16).read_tree(0).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].offset, 80);
    }
}
