//! Element types - the closed set of value types a data stream can carry.
//!
//! A stream declaration names its type with a short tag (`float`, `int`,
//! `byte`, ...). [`TypeCatalog::resolve`] combines that tag with the file
//! [`Encoding`] into an [`ElementDescriptor`] telling the decoder how wide
//! each value is and how to interpret it.

use std::fmt;
use std::str::FromStr;

use super::{Error, Result};

/// Byte order of a binary payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Payload encoding declared on the designation line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Whitespace separated decimal literals
    Ascii,
    /// Big-endian binary (`BINARY`)
    BinaryBig,
    /// Little-endian binary (`BINARY-LITTLE-ENDIAN`)
    BinaryLittle,
}

impl Encoding {
    /// Parse the designation tag. Returns `None` for anything else.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ASCII" => Some(Self::Ascii),
            "BINARY" => Some(Self::BinaryBig),
            "BINARY-LITTLE-ENDIAN" => Some(Self::BinaryLittle),
            _ => None,
        }
    }

    /// The designation tag for this encoding.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Ascii => "ASCII",
            Self::BinaryBig => "BINARY",
            Self::BinaryLittle => "BINARY-LITTLE-ENDIAN",
        }
    }

    #[inline]
    pub const fn is_ascii(self) -> bool {
        matches!(self, Self::Ascii)
    }

    /// Byte order of binary payloads, `None` for ASCII.
    pub const fn byte_order(self) -> Option<ByteOrder> {
        match self {
            Self::Ascii => None,
            Self::BinaryBig => Some(ByteOrder::Big),
            Self::BinaryLittle => Some(ByteOrder::Little),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Element type of a data stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ElementType {
    Int8 = 0,
    Uint8 = 1,
    Int16 = 2,
    Uint16 = 3,
    Int32 = 4,
    Uint32 = 5,
    Int64 = 6,
    Uint64 = 7,
    Float32 = 8,
    Float64 = 9,
    /// Two 32-bit floats (real, imaginary)
    Complex64 = 10,
    /// Opaque single byte (characters / strings)
    Char = 11,
}

/// How the bytes of one element are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Signed,
    Unsigned,
    Float,
    Complex,
    Char,
}

impl ElementType {
    /// Parse a declaration type tag.
    ///
    /// `byte` is unsigned, matching how Amira writes label fields.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Ok(match tag {
            "byte" | "ubyte" => Self::Uint8,
            "sbyte" => Self::Int8,
            "short" => Self::Int16,
            "ushort" => Self::Uint16,
            "int" => Self::Int32,
            "uint" => Self::Uint32,
            "long" => Self::Int64,
            "ulong" | "uint64" => Self::Uint64,
            "float" => Self::Float32,
            "double" => Self::Float64,
            "complex" => Self::Complex64,
            "char" | "string" | "ascii" => Self::Char,
            other => return Err(Error::UnsupportedType(other.to_string())),
        })
    }

    /// Canonical tag of this type.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Int8 => "sbyte",
            Self::Uint8 => "byte",
            Self::Int16 => "short",
            Self::Uint16 => "ushort",
            Self::Int32 => "int",
            Self::Uint32 => "uint",
            Self::Int64 => "long",
            Self::Uint64 => "ulong",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Complex64 => "complex",
            Self::Char => "char",
        }
    }

    /// Size in bytes of one element.
    #[inline]
    pub const fn byte_width(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 | Self::Char => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 | Self::Complex64 => 8,
        }
    }

    pub const fn kind(self) -> ElementKind {
        match self {
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => ElementKind::Signed,
            Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64 => ElementKind::Unsigned,
            Self::Float32 | Self::Float64 => ElementKind::Float,
            Self::Complex64 => ElementKind::Complex,
            Self::Char => ElementKind::Char,
        }
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Fixed-width description of one stream element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub elem_type: ElementType,
    pub byte_width: usize,
    pub kind: ElementKind,
    /// `None` for ASCII payloads, where values are decimal literals.
    pub byte_order: Option<ByteOrder>,
}

/// Maps type tags plus encoding to element descriptors. Stateless.
pub struct TypeCatalog;

impl TypeCatalog {
    /// Resolve a type tag for the given payload encoding.
    pub fn resolve(tag: &str, encoding: Encoding) -> Result<ElementDescriptor> {
        Ok(Self::describe(ElementType::from_tag(tag)?, encoding))
    }

    /// Describe an already parsed element type.
    pub fn describe(elem_type: ElementType, encoding: Encoding) -> ElementDescriptor {
        ElementDescriptor {
            elem_type,
            byte_width: elem_type.byte_width(),
            kind: elem_type.kind(),
            byte_order: encoding.byte_order(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_widths() {
        let d = TypeCatalog::resolve("float", Encoding::BinaryLittle).unwrap();
        assert_eq!(d.byte_width, 4);
        assert_eq!(d.kind, ElementKind::Float);
        assert_eq!(d.byte_order, Some(ByteOrder::Little));

        let d = TypeCatalog::resolve("complex", Encoding::BinaryBig).unwrap();
        assert_eq!(d.byte_width, 8);
        assert_eq!(d.kind, ElementKind::Complex);

        assert_eq!(TypeCatalog::resolve("ushort", Encoding::Ascii).unwrap().byte_width, 2);
        assert_eq!(TypeCatalog::resolve("uint64", Encoding::Ascii).unwrap().elem_type, ElementType::Uint64);
    }

    #[test]
    fn test_ascii_has_no_byte_order() {
        let d = TypeCatalog::resolve("double", Encoding::Ascii).unwrap();
        assert_eq!(d.byte_order, None);
    }

    #[test]
    fn test_byte_is_unsigned() {
        assert_eq!(ElementType::from_tag("byte").unwrap(), ElementType::Uint8);
        assert_eq!(ElementType::from_tag("string").unwrap(), ElementType::Char);
    }

    #[test]
    fn test_unknown_tag() {
        let err = TypeCatalog::resolve("quaternion", Encoding::BinaryBig).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(t) if t == "quaternion"));
    }

    #[test]
    fn test_encoding_tags() {
        assert_eq!(Encoding::from_tag("BINARY-LITTLE-ENDIAN"), Some(Encoding::BinaryLittle));
        assert_eq!(Encoding::from_tag("BINARY"), Some(Encoding::BinaryBig));
        assert_eq!(Encoding::from_tag("ASCII"), Some(Encoding::Ascii));
        assert_eq!(Encoding::from_tag("BINARY-MIDDLE-ENDIAN"), None);
    }
}
