use std::borrow::Cow;
use std::io::Cursor;

use binrw::{binrw, BinRead};

use super::{decompress, Ipac, ModelSource};
use crate::error::{DecodeError, Result};

pub const PKS_HEADER_SIZE: usize = 16;

#[binrw]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little)]
pub struct PksHeader {
    pub signature: [u8; 4],
    pub ipac_offset: u32,
    pub unknown1: u32,
    pub unknown2: u32,
}

/// Package wrapper: a fixed header followed directly by an IPAC archive. The whole
/// package may sit inside a gzip envelope.
#[derive(Debug, Clone)]
pub struct Pks<'a> {
    pub header: PksHeader,
    pub ipac: Ipac<'a>,
}

impl<'a> Pks<'a> {
    pub fn read(data: &'a [u8]) -> Result<Self> {
        let data = decompress(data, "PKS package")?;
        let header = PksHeader::read_le(&mut Cursor::new(&data[..]))
            .map_err(|e| DecodeError::from_binrw(e, "PKS header", 0))?;
        log::debug!(
            "PKS {:?}, IPAC offset 0x{:X}",
            String::from_utf8_lossy(&header.signature),
            header.ipac_offset
        );

        let body = match data {
            Cow::Borrowed(d) => Cow::Borrowed(&d[PKS_HEADER_SIZE..]),
            Cow::Owned(mut d) => {
                d.drain(..PKS_HEADER_SIZE);
                Cow::Owned(d)
            }
        };
        let ipac = Ipac::from_data(body)?;
        Ok(Self { header, ipac })
    }
}

impl ModelSource for Pks<'_> {
    fn extract(&self, selector: &str) -> Result<Cow<'_, [u8]>> {
        self.ipac.extract(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ipac::tests::build;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn package(ipac: &[u8]) -> Vec<u8> {
        let mut out = b"PKSF".to_vec();
        out.extend_from_slice(&(PKS_HEADER_SIZE as u32).to_le_bytes());
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(ipac);
        out
    }

    #[test]
    fn entries_are_reached_through_the_archive() {
        let data = package(&build(&[("BODY", "MT5", &b"HRCM-body"[..])]));
        let pks = Pks::read(&data).unwrap();
        assert_eq!(pks.header.ipac_offset, 16);
        assert_eq!(pks.ipac.entries.len(), 1);
        assert_eq!(&*pks.extract("BODY.MT5").unwrap(), b"HRCM-body");
    }

    #[test]
    fn compressed_package_is_inflated() {
        let raw = package(&build(&[("HEAD", "MT5", &b"HRCM-head"[..])]));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let data = encoder.finish().unwrap();

        let pks = Pks::read(&data).unwrap();
        assert_eq!(&*pks.extract("head").unwrap(), b"HRCM-head");
    }

    #[test]
    fn short_header_is_truncated() {
        assert!(matches!(
            Pks::read(b"PKSF\x10\x00"),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn missing_archive_is_a_bad_signature() {
        let data = package(b"NOPE0000111122223333");
        assert!(matches!(
            Pks::read(&data),
            Err(DecodeError::BadSignature { .. })
        ));
    }
}
