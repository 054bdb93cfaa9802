// Common test utilities: a reference encoder that builds synthetic MT5 buffers
#![allow(dead_code)]

pub const SIGNATURE: &[u8; 4] = b"HRCM";
pub const HEADER_SIZE: usize = 12;
pub const NODE_SIZE: usize = 64;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Default)]
pub struct MeshSpec {
    /// position xyz, normal xyz
    pub vertices: Vec<[f32; 6]>,
    pub instructions: Vec<u8>,
    pub center: [f32; 3],
    pub radius: f32,
}

impl MeshSpec {
    pub fn new(vertices: Vec<[f32; 6]>, instructions: Vec<u8>) -> Self {
        Self {
            vertices,
            instructions,
            ..Default::default()
        }
    }

    /// Vertices at the given positions, all with a +Z normal.
    pub fn flat(points: &[[f32; 3]], instructions: Vec<u8>) -> Self {
        let vertices = points
            .iter()
            .map(|p| [p[0], p[1], p[2], 0.0, 0.0, 1.0])
            .collect();
        Self::new(vertices, instructions)
    }
}

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub id: u32,
    pub position: [f32; 3],
    /// fixed point, 0x10000 per turn
    pub rotation: [i32; 3],
    pub scale: [f32; 3],
    pub name: Option<String>,
    pub mesh: Option<MeshSpec>,
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            position: [0.0; 3],
            rotation: [0; 3],
            scale: [1.0; 3],
            name: None,
            mesh: None,
            children: vec![],
        }
    }

    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn rotated(mut self, rotation: [i32; 3]) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scaled(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale;
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_mesh(mut self, mesh: MeshSpec) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|c| c.count()).sum::<usize>()
    }
}

struct Flat<'a> {
    spec: &'a NodeSpec,
    child: Option<usize>,
    sibling: Option<usize>,
}

/// Pre-order: a node, its children, then its siblings. Matches decoder arena order.
fn flatten<'a>(siblings: &'a [NodeSpec], out: &mut Vec<Flat<'a>>) -> Option<usize> {
    let mut first = None;
    let mut previous: Option<usize> = None;
    for spec in siblings {
        let index = out.len();
        out.push(Flat {
            spec,
            child: None,
            sibling: None,
        });
        let child = flatten(&spec.children, out);
        out[index].child = child;
        if let Some(p) = previous {
            out[p].sibling = Some(index);
        }
        first.get_or_insert(index);
        previous = Some(index);
    }
    first
}

/// All nodes of `roots` in decoder arena order.
pub fn preorder(roots: &[NodeSpec]) -> Vec<&NodeSpec> {
    let mut flat = vec![];
    flatten(roots, &mut flat);
    flat.into_iter().map(|f| f.spec).collect()
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[derive(Debug, Clone, Default)]
pub struct Mt5Builder {
    /// the root followed by its siblings
    pub roots: Vec<NodeSpec>,
    pub chunks: Vec<Vec<u8>>,
    /// junk bytes placed before the model; decode with this as base offset
    pub padding: usize,
}

impl Mt5Builder {
    pub fn new(root: NodeSpec) -> Self {
        Self {
            roots: vec![root],
            ..Default::default()
        }
    }

    pub fn with_sibling(mut self, node: NodeSpec) -> Self {
        self.roots.push(node);
        self
    }

    pub fn with_chunk(mut self, chunk: Vec<u8>) -> Self {
        self.chunks.push(chunk);
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn node_offset(index: usize) -> u32 {
        (HEADER_SIZE + index * NODE_SIZE) as u32
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut flat = vec![];
        flatten(&self.roots, &mut flat);

        let data_start = HEADER_SIZE + flat.len() * NODE_SIZE;
        let mut records = vec![];
        let mut tail: Vec<u8> = vec![];

        for f in &flat {
            let spec = f.spec;
            let name_offset = match &spec.name {
                Some(name) => {
                    let offset = data_start + tail.len();
                    tail.extend_from_slice(name.as_bytes());
                    tail.push(0);
                    offset as u32
                }
                None => 0,
            };

            let mesh_offset = match &spec.mesh {
                Some(mesh) => {
                    let vertices_offset = data_start + tail.len();
                    for v in &mesh.vertices {
                        for c in v {
                            put_f32(&mut tail, *c);
                        }
                    }
                    let instructions_offset = if mesh.instructions.is_empty() {
                        0
                    } else {
                        let offset = data_start + tail.len();
                        tail.extend_from_slice(&mesh.instructions);
                        offset
                    };
                    let header_offset = data_start + tail.len();
                    put_u32(&mut tail, 0);
                    put_u32(&mut tail, vertices_offset as u32);
                    put_u32(&mut tail, mesh.vertices.len() as u32);
                    put_u32(&mut tail, instructions_offset as u32);
                    for c in mesh.center {
                        put_f32(&mut tail, c);
                    }
                    put_f32(&mut tail, mesh.radius);
                    header_offset as u32
                }
                None => 0,
            };

            put_u32(&mut records, spec.id);
            put_u32(&mut records, mesh_offset);
            for r in spec.rotation {
                records.extend_from_slice(&r.to_le_bytes());
            }
            for s in spec.scale {
                put_f32(&mut records, s);
            }
            for p in spec.position {
                put_f32(&mut records, p);
            }
            put_u32(&mut records, f.child.map_or(0, Self::node_offset));
            put_u32(&mut records, f.sibling.map_or(0, Self::node_offset));
            put_u32(&mut records, 0);
            put_u32(&mut records, name_offset);
            put_u32(&mut records, 0);
        }

        let chunks_offset = if self.chunks.is_empty() {
            0
        } else {
            (data_start + tail.len()) as u32
        };
        for chunk in &self.chunks {
            tail.extend_from_slice(chunk);
        }

        let mut out = vec![0xCD; self.padding];
        out.extend_from_slice(SIGNATURE);
        put_u32(&mut out, chunks_offset);
        put_u32(&mut out, if flat.is_empty() { 0 } else { HEADER_SIZE as u32 });
        out.extend(records);
        out.extend(tail);
        out
    }
}

pub fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    put_u32(&mut out, body.len() as u32 + 8);
    out.extend_from_slice(body);
    out
}

pub fn texd(count: u32) -> Vec<u8> {
    chunk(b"TEXD", &count.to_le_bytes())
}

pub fn texn(id: [u8; 8], payload: &[u8]) -> Vec<u8> {
    let mut body = id.to_vec();
    body.extend_from_slice(payload);
    chunk(b"TEXN", &body)
}

pub fn name_chunk(ids: &[[u8; 8]]) -> Vec<u8> {
    chunk(b"NAME", &ids.concat())
}

// Instruction encoders

pub fn end() -> Vec<u8> {
    0x8000u16.to_le_bytes().to_vec()
}

pub fn skip() -> Vec<u8> {
    0xFFFFu16.to_le_bytes().to_vec()
}

pub fn texture(index: u16) -> Vec<u8> {
    [0x0009u16.to_le_bytes(), index.to_le_bytes()].concat()
}

pub fn uv_size(value: u16) -> Vec<u8> {
    [0x000Bu16.to_le_bytes(), value.to_le_bytes()].concat()
}

pub fn unknown1(opcode: u16, value: u16) -> Vec<u8> {
    [opcode.to_le_bytes(), value.to_le_bytes()].concat()
}

pub fn sized(opcode: u16, data: &[u8]) -> Vec<u8> {
    let mut out = opcode.to_le_bytes().to_vec();
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// Strip instruction. Layout follows the opcode: bit 3 selects 32-bit indices, the low
/// three bits select uv (1), color (2) or both (3, 4). UVs are `(index * 64, index * 32)`
/// and colors are opaque blue-channel ramps.
pub fn strip(opcode: u16, strips: &[(&[i32], bool)]) -> Vec<u8> {
    let long = opcode & 0x08 != 0;
    let (uv, color) = match opcode & 0x07 {
        1 => (true, false),
        2 => (false, true),
        3 | 4 => (true, true),
        _ => (false, false),
    };

    let mut payload = (strips.len() as u16).to_le_bytes().to_vec();
    for (indices, reversed) in strips {
        let length = indices.len() as i16;
        let length = if *reversed { -length } else { length };
        payload.extend_from_slice(&length.to_le_bytes());
        for &index in indices.iter() {
            if long {
                payload.extend_from_slice(&index.to_le_bytes());
            } else {
                payload.extend_from_slice(&(index as i16).to_le_bytes());
            }
            if uv {
                payload.extend_from_slice(&((index * 64) as i16).to_le_bytes());
                payload.extend_from_slice(&((index * 32) as i16).to_le_bytes());
            }
            if color {
                payload.extend_from_slice(&[index as u8, 0, 0, 255]);
            }
        }
    }

    let mut out = opcode.to_le_bytes().to_vec();
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend(payload);
    out
}

pub fn stream(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}
