use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};

pub const OPCODE_ZERO: u16 = 0x0000;
pub const OPCODE_SKIP: u16 = 0xFFFF;
pub const OPCODE_TEXTURE: u16 = 0x0009;
pub const OPCODE_UV_SIZE: u16 = 0x000B;
pub const OPCODE_END: u16 = 0x8000;

/// UV divisor in effect until a UV size instruction says otherwise.
pub const DEFAULT_UV_SIZE: u16 = 1024;

/// Opcode families. Numeric variants inside one family share payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeClass {
    Skip,
    Attributes,
    Unknown1,
    Texture,
    UvSize,
    Unknown2,
    Strip,
    End,
    Unrecognized,
}

impl OpcodeClass {
    pub fn of(opcode: u16) -> Self {
        match opcode {
            OPCODE_ZERO | OPCODE_SKIP => OpcodeClass::Skip,
            0x0002..=0x0007 => OpcodeClass::Attributes,
            0x0008 | 0x000A => OpcodeClass::Unknown1,
            OPCODE_TEXTURE => OpcodeClass::Texture,
            OPCODE_UV_SIZE => OpcodeClass::UvSize,
            0x000E | 0x000F => OpcodeClass::Unknown2,
            0x0010..=0x0014 | 0x0018..=0x001C => OpcodeClass::Strip,
            OPCODE_END => OpcodeClass::End,
            _ => OpcodeClass::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    Short,
    Long,
}

impl IndexWidth {
    pub fn byte_len(self) -> usize {
        match self {
            IndexWidth::Short => 2,
            IndexWidth::Long => 4,
        }
    }
}

/// Per-vertex packing of a strip opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripLayout {
    pub index_width: IndexWidth,
    pub uv: bool,
    pub color: bool,
}

impl StripLayout {
    pub fn from_opcode(opcode: u16) -> Self {
        let index_width = if opcode & 0x08 != 0 {
            IndexWidth::Long
        } else {
            IndexWidth::Short
        };
        let (uv, color) = match opcode & 0x07 {
            1 => (true, false),
            2 => (false, true),
            3 | 4 => (true, true),
            _ => (false, false),
        };
        Self {
            index_width,
            uv,
            color,
        }
    }

    pub fn vertex_byte_len(&self) -> usize {
        self.index_width.byte_len() + if self.uv { 4 } else { 0 } + if self.color { 4 } else { 0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StripVertex {
    /// index into the node's combined vertex space; negative values address inherited vertices
    pub index: i32,
    pub uv: Option<[i16; 2]>,
    /// stored as B, G, R, A
    pub color: Option<[u8; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strip {
    pub reversed: bool,
    pub vertices: Vec<StripVertex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StripInstruction {
    pub opcode: u16,
    /// payload size as written in the stream, kept for write-back
    pub declared_size: u16,
    pub layout: StripLayout,
    pub strips: Vec<Strip>,
}

impl StripInstruction {
    /// Bytes following the size field: strip count plus every strip.
    pub fn payload_len(&self) -> usize {
        let vertex_len = self.layout.vertex_byte_len();
        2 + self
            .strips
            .iter()
            .map(|s| 2 + s.vertices.len() * vertex_len)
            .sum::<usize>()
    }

    fn read_body<R: Read + Seek>(reader: &mut R, endian: Endian, opcode: u16) -> BinResult<Self> {
        let layout = StripLayout::from_opcode(opcode);
        let declared_size = u16::read_options(reader, endian, ())?;
        let strip_count = u16::read_options(reader, endian, ())?;

        let mut strips = vec![];
        for _ in 0..strip_count {
            let length = i16::read_options(reader, endian, ())?;
            let mut vertices = vec![];
            for _ in 0..length.unsigned_abs() {
                let index = match layout.index_width {
                    IndexWidth::Short => i16::read_options(reader, endian, ())? as i32,
                    IndexWidth::Long => i32::read_options(reader, endian, ())?,
                };
                let uv = if layout.uv {
                    Some(<[i16; 2]>::read_options(reader, endian, ())?)
                } else {
                    None
                };
                let color = if layout.color {
                    Some(<[u8; 4]>::read_options(reader, endian, ())?)
                } else {
                    None
                };
                vertices.push(StripVertex { index, uv, color });
            }
            strips.push(Strip {
                reversed: length < 0,
                vertices,
            });
        }

        let strip = Self {
            opcode,
            declared_size,
            layout,
            strips,
        };
        if strip.payload_len() != declared_size as usize {
            log::debug!(
                "strip 0x{:04X} declares {} payload bytes, decoded {}",
                opcode,
                declared_size,
                strip.payload_len()
            );
        }
        Ok(strip)
    }

    fn write_body<W: Write + Seek>(&self, writer: &mut W, endian: Endian) -> BinResult<()> {
        self.declared_size.write_options(writer, endian, ())?;
        let strip_count = u16::try_from(self.strips.len()).map_err(|_| binrw::Error::AssertFail {
            pos: writer.stream_position().unwrap_or_default(),
            message: format!("{} strips do not fit the strip count field", self.strips.len()),
        })?;
        strip_count.write_options(writer, endian, ())?;
        for strip in &self.strips {
            strip_length(strip)
                .ok_or_else(|| binrw::Error::AssertFail {
                    pos: writer.stream_position().unwrap_or_default(),
                    message: format!(
                        "strip of {} vertices does not fit the length field",
                        strip.vertices.len()
                    ),
                })?
                .write_options(writer, endian, ())?;
            for vertex in &strip.vertices {
                match self.layout.index_width {
                    IndexWidth::Short => (vertex.index as i16).write_options(writer, endian, ())?,
                    IndexWidth::Long => vertex.index.write_options(writer, endian, ())?,
                }
                if self.layout.uv {
                    vertex.uv.unwrap_or_default().write_options(writer, endian, ())?;
                }
                if self.layout.color {
                    vertex.color.unwrap_or_default().write_options(writer, endian, ())?;
                }
            }
        }
        Ok(())
    }
}

/// Signed length field of a strip; `-32768` only exists for reversed strips.
fn strip_length(strip: &Strip) -> Option<i16> {
    let len = i32::try_from(strip.vertices.len()).ok()?;
    i16::try_from(if strip.reversed { -len } else { len }).ok()
}

/// One decoded unit of a node's geometry stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Skip { opcode: u16 },
    Attributes { opcode: u16, data: Vec<u8> },
    Texture { index: u16 },
    Unknown1 { opcode: u16, value: u16 },
    UvSize { value: u16 },
    Unknown2 { opcode: u16, data: Vec<u8> },
    Strip(StripInstruction),
    End,
    /// Opcode outside the catalogue. Decoding of the stream stops here.
    Unrecognized { opcode: u16 },
}

impl Instruction {
    pub fn opcode(&self) -> u16 {
        match self {
            Instruction::Skip { opcode }
            | Instruction::Attributes { opcode, .. }
            | Instruction::Unknown1 { opcode, .. }
            | Instruction::Unknown2 { opcode, .. }
            | Instruction::Unrecognized { opcode } => *opcode,
            Instruction::Texture { .. } => OPCODE_TEXTURE,
            Instruction::UvSize { .. } => OPCODE_UV_SIZE,
            Instruction::Strip(strip) => strip.opcode,
            Instruction::End => OPCODE_END,
        }
    }

    pub fn class(&self) -> OpcodeClass {
        OpcodeClass::of(self.opcode())
    }

    /// Encoded size in bytes, opcode included.
    pub fn byte_len(&self) -> usize {
        match self {
            Instruction::Skip { .. } | Instruction::End | Instruction::Unrecognized { .. } => 2,
            Instruction::Attributes { data, .. } | Instruction::Unknown2 { data, .. } => {
                4 + data.len()
            }
            Instruction::Texture { .. }
            | Instruction::Unknown1 { .. }
            | Instruction::UvSize { .. } => 4,
            Instruction::Strip(strip) => 4 + strip.payload_len(),
        }
    }

    /// True for instructions after which the stream is not read any further.
    pub fn terminates(&self) -> bool {
        matches!(self, Instruction::End | Instruction::Unrecognized { .. })
    }
}

fn read_sized_bytes<R: Read + Seek>(reader: &mut R, endian: Endian) -> BinResult<Vec<u8>> {
    let size = u16::read_options(reader, endian, ())?;
    let mut data = vec![0u8; size as usize];
    reader.read_exact(&mut data)?;
    Ok(data)
}

fn write_sized_bytes<W: Write + Seek>(writer: &mut W, endian: Endian, data: &[u8]) -> BinResult<()> {
    (data.len() as u16).write_options(writer, endian, ())?;
    writer.write_all(data)?;
    Ok(())
}

impl BinRead for Instruction {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let opcode = u16::read_options(reader, endian, ())?;
        let instruction = match OpcodeClass::of(opcode) {
            OpcodeClass::Skip => Instruction::Skip { opcode },
            OpcodeClass::Attributes => Instruction::Attributes {
                opcode,
                data: read_sized_bytes(reader, endian)?,
            },
            OpcodeClass::Unknown1 => Instruction::Unknown1 {
                opcode,
                value: u16::read_options(reader, endian, ())?,
            },
            OpcodeClass::Texture => Instruction::Texture {
                index: u16::read_options(reader, endian, ())?,
            },
            OpcodeClass::UvSize => Instruction::UvSize {
                value: u16::read_options(reader, endian, ())?,
            },
            OpcodeClass::Unknown2 => Instruction::Unknown2 {
                opcode,
                data: read_sized_bytes(reader, endian)?,
            },
            OpcodeClass::Strip => {
                Instruction::Strip(StripInstruction::read_body(reader, endian, opcode)?)
            }
            OpcodeClass::End => Instruction::End,
            OpcodeClass::Unrecognized => Instruction::Unrecognized { opcode },
        };
        Ok(instruction)
    }
}

impl BinWrite for Instruction {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.opcode().write_options(writer, endian, ())?;
        match self {
            Instruction::Skip { .. } | Instruction::End | Instruction::Unrecognized { .. } => {}
            Instruction::Attributes { data, .. } | Instruction::Unknown2 { data, .. } => {
                write_sized_bytes(writer, endian, data)?;
            }
            Instruction::Texture { index: value }
            | Instruction::Unknown1 { value, .. }
            | Instruction::UvSize { value } => {
                value.write_options(writer, endian, ())?;
            }
            Instruction::Strip(strip) => strip.write_body(writer, endian)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeState {
    pub opcode: u16,
    pub data: Vec<u8>,
}

/// Render state carried between instructions. Every strip captures a copy of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripState {
    pub attributes: Option<AttributeState>,
    pub texture: u16,
    pub uv_size: u16,
    pub unknown1: u16,
    pub unknown2: Vec<u8>,
}

impl Default for StripState {
    fn default() -> Self {
        Self {
            attributes: None,
            texture: 0,
            uv_size: DEFAULT_UV_SIZE,
            unknown1: 0,
            unknown2: vec![],
        }
    }
}

impl StripState {
    /// State after `instruction` has executed. Instructions that do not touch state
    /// return it unchanged.
    pub fn apply(mut self, instruction: &Instruction) -> Self {
        match instruction {
            Instruction::Attributes { opcode, data } => {
                self.attributes = Some(AttributeState {
                    opcode: *opcode,
                    data: data.clone(),
                });
            }
            Instruction::Texture { index } => self.texture = *index,
            Instruction::Unknown1 { value, .. } => self.unknown1 = *value,
            Instruction::UvSize { value } => {
                self.uv_size = if *value == 0 { DEFAULT_UV_SIZE } else { *value };
            }
            Instruction::Unknown2 { data, .. } => self.unknown2 = data.clone(),
            Instruction::Skip { .. }
            | Instruction::Strip(_)
            | Instruction::End
            | Instruction::Unrecognized { .. } => {}
        }
        self
    }
}

/// Expand one triangle strip into a triangle list with alternating winding.
/// `reversed` flips the winding of every triangle. Strips shorter than three
/// entries produce nothing.
pub fn strip_to_triangles<T: Copy>(strip: &[T], reversed: bool) -> Vec<[T; 3]> {
    if strip.len() < 3 {
        return vec![];
    }
    (0..strip.len() - 2)
        .map(|i| {
            if (i % 2 == 0) != reversed {
                [strip[i], strip[i + 1], strip[i + 2]]
            } else {
                [strip[i + 1], strip[i], strip[i + 2]]
            }
        })
        .collect()
}
