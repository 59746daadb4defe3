//! Payload compression schemes.
//!
//! Binary streams may be stored raw, HxByteRLE coded, or zlib deflated
//! (`HxZip`).

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::rle::rle_decode;
use crate::util::{Error, Result};

/// Compression declared for a data stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    None,
    HxByteRle,
    HxZip,
}

impl Compression {
    /// Parse the declaration tag. Absent tag means uncompressed.
    pub fn from_tag(tag: Option<&str>) -> Result<Self> {
        match tag {
            None | Some("") => Ok(Self::None),
            Some("HxByteRLE") => Ok(Self::HxByteRle),
            Some("HxZip") => Ok(Self::HxZip),
            Some(other) => Err(Error::UnsupportedCompression(other.to_string())),
        }
    }

    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::HxByteRle => Some("HxByteRLE"),
            Self::HxZip => Some("HxZip"),
        }
    }

    #[inline]
    pub const fn is_compressed(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Undo this compression, producing exactly `expected` bytes.
    pub fn expand(self, data: &[u8], expected: usize) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::HxByteRle => rle_decode(data, expected),
            Self::HxZip => {
                let out = inflate(data, expected)?;
                if out.len() != expected {
                    return Err(Error::Compression(format!(
                        "HxZip inflated to {} bytes, expected {}",
                        out.len(),
                        expected
                    )));
                }
                Ok(out)
            }
        }
    }
}

/// Inflate a zlib stream.
pub fn inflate(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(size_hint);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Compression(format!("inflate failed: {}", e)))?;
    Ok(out)
}

/// Deflate bytes into a zlib stream.
///
/// `level` is clamped to 0..=9.
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(Compression::from_tag(None).unwrap(), Compression::None);
        assert_eq!(Compression::from_tag(Some("HxZip")).unwrap(), Compression::HxZip);
        assert_eq!(Compression::from_tag(Some("HxByteRLE")).unwrap(), Compression::HxByteRle);
        assert!(matches!(
            Compression::from_tag(Some("LZ4")),
            Err(Error::UnsupportedCompression(t)) if t == "LZ4"
        ));
    }

    #[test]
    fn test_hxzip_expand() {
        let data: Vec<u8> = (0..200u8).collect();
        let packed = deflate(&data, 6).unwrap();
        assert_eq!(Compression::HxZip.expand(&packed, 200).unwrap(), data);
        assert!(matches!(Compression::HxZip.expand(&packed, 199), Err(Error::Compression(_))));
    }

    #[test]
    fn test_garbage_inflate() {
        assert!(matches!(inflate(b"not zlib at all", 16), Err(Error::Compression(_))));
    }
}
