use std::borrow::Cow;
use std::io::Cursor;

use binrw::{binrw, BinRead};

use super::{decompress, ModelSource};
use crate::error::{DecodeError, Result};

pub const IPAC_SIGNATURE: [u8; 4] = *b"IPAC";

#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little)]
pub struct IpacHeader {
    pub signature: [u8; 4],
    pub dictionary_offset: u32,
    pub file_count: u32,
    pub content_size: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little)]
pub struct IpacEntry {
    pub filename: [u8; 8],
    pub extension: [u8; 4],
    pub offset: u32,
    pub size: u32,
}

fn trim_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

impl IpacEntry {
    pub fn name(&self) -> String {
        trim_name(&self.filename)
    }

    pub fn extension(&self) -> String {
        trim_name(&self.extension)
    }

    /// `NAME.EXT`, or just the name when the extension is blank.
    pub fn full_name(&self) -> String {
        let extension = self.extension();
        if extension.is_empty() {
            self.name()
        } else {
            format!("{}.{}", self.name(), extension)
        }
    }

    fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        self.full_name().eq_ignore_ascii_case(selector) || self.name().eq_ignore_ascii_case(selector)
    }
}

/// Indexed container holding model files and other assets. A gzip-wrapped archive is
/// inflated on read; entries inside it may carry their own envelope.
#[derive(Debug, Clone)]
pub struct Ipac<'a> {
    pub header: IpacHeader,
    pub entries: Vec<IpacEntry>,
    data: Cow<'a, [u8]>,
}

impl<'a> Ipac<'a> {
    pub fn read(data: &'a [u8]) -> Result<Self> {
        Self::from_data(decompress(data, "IPAC container")?)
    }

    /// Parse an already inflated archive.
    pub(crate) fn from_data(data: Cow<'a, [u8]>) -> Result<Self> {
        let (header, entries) = Self::read_dictionary(&data)?;
        log::debug!("IPAC with {} entries", entries.len());
        Ok(Self {
            header,
            entries,
            data,
        })
    }

    fn read_dictionary(data: &[u8]) -> Result<(IpacHeader, Vec<IpacEntry>)> {
        let mut cursor = Cursor::new(data);
        let header = IpacHeader::read_le(&mut cursor)
            .map_err(|e| DecodeError::from_binrw(e, "IPAC header", 0))?;
        if header.signature != IPAC_SIGNATURE {
            return Err(DecodeError::BadSignature {
                offset: 0,
                expected: IPAC_SIGNATURE,
                found: header.signature,
            });
        }

        let dictionary = header.dictionary_offset as u64;
        let dictionary_end = dictionary + header.file_count as u64 * 20;
        if dictionary_end > data.len() as u64 {
            return Err(DecodeError::Truncated {
                what: "IPAC dictionary",
                offset: dictionary,
            });
        }

        cursor.set_position(dictionary);
        let mut entries = vec![];
        for _ in 0..header.file_count {
            let offset = cursor.position();
            let entry = IpacEntry::read_le(&mut cursor)
                .map_err(|e| DecodeError::from_binrw(e, "IPAC entry", offset))?;
            entries.push(entry);
        }
        Ok((header, entries))
    }

    pub fn find(&self, selector: &str) -> Option<&IpacEntry> {
        self.entries.iter().find(|e| e.matches(selector))
    }

    pub fn entry_data(&self, entry: &IpacEntry) -> Result<&[u8]> {
        let start = entry.offset as usize;
        let end = start
            .checked_add(entry.size as usize)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeError::OutOfBounds {
                what: "IPAC entry data",
                offset: entry.offset as u64,
                len: self.data.len(),
            })?;
        Ok(&self.data[start..end])
    }
}

impl ModelSource for Ipac<'_> {
    fn extract(&self, selector: &str) -> Result<Cow<'_, [u8]>> {
        let entry = self.find(selector).ok_or_else(|| DecodeError::Malformed {
            what: "IPAC dictionary",
            offset: self.header.dictionary_offset as u64,
            message: format!("no entry named {:?}", selector),
        })?;
        decompress(self.entry_data(entry)?, "IPAC entry data")
    }
}
