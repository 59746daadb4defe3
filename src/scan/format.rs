//! File designation line and grammar sizing helpers.

use std::fmt;

use crate::util::{Encoding, Error, Result};

/// Container format named on the designation line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Flat `@N` numbered data sections
    AmiraMesh,
    /// Nested, named and counted sections
    HyperSurface,
}

impl FileFormat {
    pub const fn name(self) -> &'static str {
        match self {
            Self::AmiraMesh => "AmiraMesh",
            Self::HyperSurface => "HyperSurface",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed first line of a data file.
///
/// ```text
/// # AmiraMesh 3D BINARY-LITTLE-ENDIAN 2.1
/// # AmiraMesh BINARY 2.0 <hxsurface>
/// # HyperSurface 0.1 ASCII
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Designation {
    pub format: FileFormat,
    pub encoding: Encoding,
    pub version: String,
    /// `3D` when present
    pub dimension: Option<String>,
    /// `<hxsurface>` style trailer, without angle brackets
    pub content_type: Option<String>,
}

fn looks_like_encoding(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    upper.starts_with("BINARY") || upper.starts_with("ASCII")
}

fn is_version(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn encoding_from(word: &str) -> Result<Encoding> {
    Encoding::from_tag(word)
        .ok_or_else(|| Error::corrupt(format!("garbled encoding tag '{}'", word)))
}

/// Parse a designation line.
///
/// An unknown file type is [`Error::InvalidHeader`]; a recognised file type
/// with a malformed encoding tag is [`Error::StructuralCorruption`].
pub fn parse_designation(line: &str) -> Result<Designation> {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix('#')
        .ok_or_else(|| Error::InvalidHeader(format!("missing '#' in designation '{}'", trimmed)))?;
    let mut words = rest.split_whitespace();

    let format = match words.next() {
        Some("AmiraMesh") => FileFormat::AmiraMesh,
        Some("HyperSurface") => FileFormat::HyperSurface,
        Some(other) => return Err(Error::InvalidHeader(format!("unknown file type '{}'", other))),
        None => return Err(Error::InvalidHeader("empty designation".into())),
    };
    let words: Vec<&str> = words.collect();

    match format {
        FileFormat::AmiraMesh => {
            let mut pos = 0;
            let mut dimension = None;
            if words.first() == Some(&"3D") {
                dimension = Some("3D".to_string());
                pos += 1;
            }
            let tag = words
                .get(pos)
                .ok_or_else(|| Error::corrupt("designation lacks encoding tag"))?;
            let encoding = encoding_from(tag)?;
            let version = words
                .get(pos + 1)
                .filter(|v| is_version(v))
                .ok_or_else(|| Error::InvalidHeader(format!("missing version in '{}'", trimmed)))?
                .to_string();
            let content_type = words
                .get(pos + 2)
                .and_then(|w| w.strip_prefix('<'))
                .and_then(|w| w.strip_suffix('>'))
                .map(str::to_string);
            Ok(Designation { format, encoding, version, dimension, content_type })
        }
        FileFormat::HyperSurface => {
            let version = words
                .first()
                .filter(|v| is_version(v))
                .ok_or_else(|| {
                    match words.first() {
                        Some(w) if looks_like_encoding(w) => Error::corrupt(format!("encoding before version in '{}'", trimmed)),
                        _ => Error::InvalidHeader(format!("missing version in '{}'", trimmed)),
                    }
                })?
                .to_string();
            let tag = words
                .get(1)
                .ok_or_else(|| Error::corrupt("designation lacks encoding tag"))?;
            let encoding = encoding_from(tag)?;
            Ok(Designation { format, encoding, version, dimension: None, content_type: None })
        }
    }
}

/// Bytes re-searched after a failed token search: the smallest multiple of
/// 16 that is at least `max_token_len + 15`.
pub const fn rescan_overlap(max_token_len: usize) -> usize {
    (max_token_len + 15).div_ceil(16) * 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amira_designations() {
        let d = parse_designation("# AmiraMesh 3D BINARY-LITTLE-ENDIAN 2.1\n").unwrap();
        assert_eq!(d.format, FileFormat::AmiraMesh);
        assert_eq!(d.encoding, Encoding::BinaryLittle);
        assert_eq!(d.version, "2.1");
        assert_eq!(d.dimension.as_deref(), Some("3D"));

        let d = parse_designation("# AmiraMesh BINARY 2.0 <hxsurface>").unwrap();
        assert_eq!(d.encoding, Encoding::BinaryBig);
        assert_eq!(d.content_type.as_deref(), Some("hxsurface"));
        assert!(d.dimension.is_none());
    }

    #[test]
    fn test_hypersurface_designation() {
        let d = parse_designation("# HyperSurface 0.1 ASCII").unwrap();
        assert_eq!(d.format, FileFormat::HyperSurface);
        assert_eq!(d.encoding, Encoding::Ascii);
        assert_eq!(d.version, "0.1");
    }

    #[test]
    fn test_unknown_file_type() {
        assert!(matches!(parse_designation("# Avizo 3D BINARY 2.0"), Err(Error::InvalidHeader(_))));
        assert!(matches!(parse_designation("AmiraMesh"), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_garbled_encoding() {
        let err = parse_designation("# AmiraMesh 3D BINARY-LITTLE-ENDAN 2.1").unwrap_err();
        assert!(matches!(err, Error::StructuralCorruption(_)));
        let err = parse_designation("# HyperSurface 0.1 BINRY").unwrap_err();
        assert!(matches!(err, Error::StructuralCorruption(_)));
    }

    #[test]
    fn test_overlap() {
        assert_eq!(rescan_overlap(45), 64);
        assert_eq!(rescan_overlap(1), 16);
        assert_eq!(rescan_overlap(17), 32);
    }
}
