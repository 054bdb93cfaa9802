pub mod ipac;
pub mod pks;

use std::borrow::Cow;
use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::{DecodeError, Result};

pub use ipac::Ipac;
pub use pks::Pks;

/// Leading bytes of a gzip stream.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

pub fn is_compressed(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Strip a gzip envelope if there is one. Raw data is returned borrowed.
pub fn decompress<'a>(data: &'a [u8], what: &'static str) -> Result<Cow<'a, [u8]>> {
    if !is_compressed(data) {
        return Ok(Cow::Borrowed(data));
    }

    let mut inflated = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut inflated)
        .map_err(|e| DecodeError::Malformed {
            what,
            offset: 0,
            message: format!("gzip envelope could not be inflated: {}", e),
        })?;
    log::debug!("{}: inflated {} -> {} bytes", what, data.len(), inflated.len());
    Ok(Cow::Owned(inflated))
}

/// Something that hands out the byte range of a model by name.
pub trait ModelSource {
    fn extract(&self, selector: &str) -> Result<Cow<'_, [u8]>>;
}

/// A whole buffer used as a single model; the selector is ignored.
impl ModelSource for [u8] {
    fn extract(&self, _selector: &str) -> Result<Cow<'_, [u8]>> {
        decompress(self, "model buffer")
    }
}

impl ModelSource for Vec<u8> {
    fn extract(&self, selector: &str) -> Result<Cow<'_, [u8]>> {
        self.as_slice().extract(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn raw_buffer_is_its_own_source() {
        let data = b"HRCM".to_vec();
        let extracted = data.extract("anything").unwrap();
        assert!(matches!(extracted, Cow::Borrowed(_)));
        assert_eq!(&*extracted, b"HRCM");
    }

    #[test]
    fn gzip_envelope_is_inflated() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"HRCM model bytes").unwrap();
        let data = encoder.finish().unwrap();
        assert!(is_compressed(&data));
        assert_eq!(&*data.extract("x").unwrap(), b"HRCM model bytes");
    }

    #[test]
    fn broken_envelope_is_malformed() {
        let data = vec![0x1F, 0x8B, 0x08, 0x00];
        assert!(matches!(
            data.extract("x"),
            Err(DecodeError::Malformed { .. })
        ));
    }
}
