use std::io::Cursor;

use binrw::{binrw, BinRead};

use crate::error::{DecodeError, Result};
use crate::model::{Texture, TextureId};

pub const TAG_TEXD: [u8; 4] = *b"TEXD";
pub const TAG_NAME: [u8; 4] = *b"NAME";
pub const TAG_TEXL: [u8; 4] = *b"TEXL";
pub const TAG_PTRL: [u8; 4] = *b"PTRL";
pub const TAG_TEXN: [u8; 4] = *b"TEXN";

pub const CHUNK_HEADER_SIZE: u32 = 8;

#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little)]
pub struct ChunkHeader {
    pub tag: [u8; 4],
    /// total chunk size, header included
    pub size: u32,
}

impl ChunkHeader {
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// Texture directory.
#[binrw]
#[derive(Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct Texd {
    pub header: ChunkHeader,
    pub texture_count: u32,
    /// absolute position of the chunk, set by the scanner
    #[brw(ignore)]
    pub offset: u64,
}

/// Texture ids referenced by name only.
#[binrw]
#[derive(Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct NameChunk {
    pub header: ChunkHeader,
    #[br(count = header.size.saturating_sub(CHUNK_HEADER_SIZE) / 8)]
    pub texture_ids: Vec<TextureId>,
}

/// Texture list body, kept opaque.
#[binrw]
#[derive(Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct Texl {
    pub header: ChunkHeader,
    #[br(count = header.size.saturating_sub(CHUNK_HEADER_SIZE))]
    pub data: Vec<u8>,
}

#[binrw]
#[derive(Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct Ptrl {
    pub header: ChunkHeader,
    #[br(count = header.size.saturating_sub(CHUNK_HEADER_SIZE) / 4)]
    pub pointers: Vec<u32>,
}

/// One embedded texture: id followed by the raw image payload.
#[binrw]
#[derive(Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct Texn {
    pub header: ChunkHeader,
    pub id: TextureId,
    #[br(count = header.size.saturating_sub(CHUNK_HEADER_SIZE + 8))]
    pub data: Vec<u8>,
}

/// Every auxiliary chunk found after the node tree.
#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    pub texd: Option<Texd>,
    pub name: Option<NameChunk>,
    pub texl: Option<Texl>,
    pub ptrl: Option<Ptrl>,
    pub texn_entries: Vec<Texn>,
}

impl ChunkSet {
    /// Embedded textures in file order, then the name-only ids.
    pub fn textures(&self) -> Vec<Texture> {
        let embedded = self.texn_entries.iter().map(|t| Texture {
            id: t.id,
            data: Some(t.data.clone()),
        });
        let named = self
            .name
            .iter()
            .flat_map(|n| n.texture_ids.iter())
            .map(|id| Texture { id: *id, data: None });
        embedded.chain(named).collect()
    }

    pub fn discovered_texture_count(&self) -> usize {
        self.texn_entries.len() + self.name.as_ref().map_or(0, |n| n.texture_ids.len())
    }

    /// Compare the directory's declared count with what the chunks actually hold.
    pub fn check_texture_count(&self) -> Result<()> {
        if let Some(texd) = &self.texd {
            let found = self.discovered_texture_count();
            if texd.texture_count as usize != found {
                return Err(DecodeError::TextureCountMismatch {
                    offset: texd.offset,
                    declared: texd.texture_count,
                    found,
                });
            }
        }
        Ok(())
    }
}

fn read_chunk<T>(cursor: &mut Cursor<&[u8]>, offset: u64, what: &'static str) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    cursor.set_position(offset);
    T::read_le(cursor).map_err(|e| DecodeError::from_binrw(e, what, offset))
}

fn store_singleton<T>(slot: &mut Option<T>, value: T, tag: &'static str, offset: u64) -> Result<()> {
    if slot.is_some() {
        return Err(DecodeError::DuplicateChunk { tag, offset });
    }
    *slot = Some(value);
    Ok(())
}

/// Scan the chunk section starting at absolute `start` until the buffer ends.
///
/// A zeroed header is treated as trailing padding and ends the scan.
pub fn read_chunks(data: &[u8], start: u64) -> Result<ChunkSet> {
    let len = data.len() as u64;
    if start > len {
        return Err(DecodeError::OutOfBounds {
            what: "chunk section",
            offset: start,
            len: data.len(),
        });
    }

    let mut cursor = Cursor::new(data);
    let mut chunks = ChunkSet::default();
    let mut offset = start;

    while offset + CHUNK_HEADER_SIZE as u64 <= len {
        let header: ChunkHeader = read_chunk(&mut cursor, offset, "chunk header")?;
        if header.tag == [0; 4] && header.size == 0 {
            break;
        }
        if header.size < CHUNK_HEADER_SIZE {
            return Err(DecodeError::Malformed {
                what: "chunk header",
                offset,
                message: format!("{} chunk declares size {}", header.tag_str(), header.size),
            });
        }
        if offset + header.size as u64 > len {
            return Err(DecodeError::Truncated {
                what: "chunk",
                offset,
            });
        }

        log::debug!(
            "chunk {} at 0x{:X}, {} bytes",
            header.tag_str(),
            offset,
            header.size
        );

        match header.tag {
            TAG_TEXD => {
                if header.size < CHUNK_HEADER_SIZE + 4 {
                    return Err(DecodeError::Malformed {
                        what: "TEXD chunk",
                        offset,
                        message: format!("size {} leaves no room for a texture count", header.size),
                    });
                }
                let texd = Texd {
                    offset,
                    ..read_chunk(&mut cursor, offset, "TEXD chunk")?
                };
                store_singleton(&mut chunks.texd, texd, "TEXD", offset)?;
            }
            TAG_NAME => {
                let name = read_chunk(&mut cursor, offset, "NAME chunk")?;
                store_singleton(&mut chunks.name, name, "NAME", offset)?;
            }
            TAG_TEXL => {
                let texl = read_chunk(&mut cursor, offset, "TEXL chunk")?;
                store_singleton(&mut chunks.texl, texl, "TEXL", offset)?;
            }
            TAG_PTRL => {
                let ptrl = read_chunk(&mut cursor, offset, "PTRL chunk")?;
                store_singleton(&mut chunks.ptrl, ptrl, "PTRL", offset)?;
            }
            TAG_TEXN => {
                if header.size < CHUNK_HEADER_SIZE + 8 {
                    return Err(DecodeError::Malformed {
                        what: "TEXN chunk",
                        offset,
                        message: format!("size {} leaves no room for a texture id", header.size),
                    });
                }
                chunks
                    .texn_entries
                    .push(read_chunk(&mut cursor, offset, "TEXN chunk")?);
            }
            _ => {
                log::warn!(
                    "skipping unknown chunk {:?} at 0x{:X}",
                    header.tag_str(),
                    offset
                );
            }
        }

        offset += header.size as u64;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(body.len() as u32 + 8).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn reads_chunks_in_any_order() {
        let mut data = chunk(b"TEXN", &[1, 2, 3, 4, 5, 6, 7, 8, 0xAA, 0xBB]);
        data.extend(chunk(b"NAME", &[9; 16]));
        data.extend(chunk(b"TEXD", &3u32.to_le_bytes()));

        let chunks = read_chunks(&data, 0).unwrap();
        assert_eq!(chunks.texd.as_ref().unwrap().texture_count, 3);
        assert_eq!(chunks.name.as_ref().unwrap().texture_ids.len(), 2);
        assert_eq!(chunks.texn_entries[0].data, vec![0xAA, 0xBB]);
        chunks.check_texture_count().unwrap();

        let textures = chunks.textures();
        assert_eq!(textures.len(), 3);
        assert!(textures[0].data.is_some());
        assert!(textures[2].data.is_none());
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let mut data = chunk(b"ZZZZ", &[0; 12]);
        data.extend(chunk(b"PTRL", &[4, 0, 0, 0, 8, 0, 0, 0]));
        let chunks = read_chunks(&data, 0).unwrap();
        assert_eq!(chunks.ptrl.unwrap().pointers, vec![4, 8]);
    }

    #[test]
    fn duplicate_singleton_is_rejected() {
        let mut data = chunk(b"TEXL", &[1, 2]);
        data.extend(chunk(b"TEXL", &[3, 4]));
        match read_chunks(&data, 0) {
            Err(DecodeError::DuplicateChunk { tag, offset }) => {
                assert_eq!(tag, "TEXL");
                assert_eq!(offset, 10);
            }
            other => panic!("expected duplicate chunk error, got {:?}", other),
        }
    }

    #[test]
    fn chunk_running_past_the_end_is_truncated() {
        let mut data = chunk(b"TEXL", &[1, 2, 3, 4]);
        data.truncate(10);
        assert!(matches!(
            read_chunks(&data, 0),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn texture_count_mismatch() {
        let mut data = chunk(b"TEXN", &[0; 8]);
        data.extend(chunk(b"TEXD", &2u32.to_le_bytes()));
        let chunks = read_chunks(&data, 0).unwrap();
        assert!(matches!(
            chunks.check_texture_count(),
            Err(DecodeError::TextureCountMismatch {
                offset: 16,
                declared: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn texd_without_a_count_is_malformed() {
        let mut data = chunk(b"TEXN", &[0; 8]);
        data.extend(chunk(b"TEXD", &[]));
        data.extend(chunk(b"TEXL", &[1, 2, 3, 4]));
        match read_chunks(&data, 0) {
            Err(DecodeError::Malformed { what, offset, .. }) => {
                assert_eq!(what, "TEXD chunk");
                assert_eq!(offset, 16);
            }
            other => panic!("expected malformed TEXD, got {:?}", other),
        }
    }
}
