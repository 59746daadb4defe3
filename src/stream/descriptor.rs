//! Stream descriptors with lazily filled payload and decode cells.

use std::fmt;
use std::sync::OnceLock;

use super::arrays::ArrayId;
use super::decoder::StreamDecoder;
use super::ledger::StreamLedger;
use crate::core::Compression;
use crate::util::{ElementType, Encoding, Error, Result, Shape, TypedArray};

/// Payload bytes together with the offset they were read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPayload {
    pub offset: u64,
    pub bytes: Vec<u8>,
}

/// One declared data stream.
///
/// The encoded payload and the decoded array are set at most once. Offset and
/// bytes share a cell, so a descriptor either has both or neither.
pub struct StreamDescriptor {
    name: String,
    array: ArrayId,
    array_name: String,
    index: usize,
    elem_type: ElementType,
    elem_count: usize,
    outer_shape: Shape,
    compression: Compression,
    encoded_len: Option<usize>,
    field_name: Option<String>,
    interpolation: Option<String>,
    encoded: OnceLock<EncodedPayload>,
    decoded: OnceLock<TypedArray>,
}

impl StreamDescriptor {
    pub fn new(
        name: impl Into<String>,
        array: ArrayId,
        array_name: impl Into<String>,
        index: usize,
        elem_type: ElementType,
        elem_count: usize,
        outer_shape: Shape,
    ) -> Self {
        Self {
            name: name.into(),
            array,
            array_name: array_name.into(),
            index,
            elem_type,
            elem_count: elem_count.max(1),
            outer_shape,
            compression: Compression::None,
            encoded_len: None,
            field_name: None,
            interpolation: None,
            encoded: OnceLock::new(),
            decoded: OnceLock::new(),
        }
    }

    pub fn with_compression(mut self, compression: Compression, encoded_len: Option<usize>) -> Self {
        self.compression = compression;
        self.encoded_len = encoded_len;
        self
    }

    /// Record a `Field` alias sharing this stream's index.
    pub fn with_alias(mut self, field_name: Option<String>, interpolation: Option<String>) -> Self {
        if field_name.is_some() {
            self.field_name = field_name;
        }
        if interpolation.is_some() {
            self.interpolation = interpolation;
        }
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn array(&self) -> ArrayId {
        self.array
    }

    pub fn array_name(&self) -> &str {
        &self.array_name
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn elem_type(&self) -> ElementType {
        self.elem_type
    }

    #[inline]
    pub fn elem_count(&self) -> usize {
        self.elem_count
    }

    pub fn outer_shape(&self) -> &Shape {
        &self.outer_shape
    }

    #[inline]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Encoded length declared in the header, compressed streams only.
    pub fn encoded_len(&self) -> Option<usize> {
        self.encoded_len
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    pub fn interpolation(&self) -> Option<&str> {
        self.interpolation.as_deref()
    }

    fn oversized(&self) -> Error {
        Error::corrupt(format!(
            "stream @{} '{}': declared shape {} x {} overflows",
            self.index, self.name, self.outer_shape, self.elem_count
        ))
    }

    /// Number of decoded values (items times elements per item).
    pub fn value_count(&self) -> Result<usize> {
        self.outer_shape
            .product()
            .and_then(|n| n.checked_mul(self.elem_count))
            .ok_or_else(|| self.oversized())
    }

    /// Decoded byte size implied by the declared shape and type.
    pub fn decoded_len(&self) -> Result<usize> {
        self.value_count()?
            .checked_mul(self.elem_type.byte_width())
            .ok_or_else(|| self.oversized())
    }

    /// Payload bytes the marker search may skip for a binary body.
    pub fn length_hint(&self, encoding: Encoding) -> Result<Option<usize>> {
        if encoding.is_ascii() {
            return Ok(None);
        }
        match self.compression {
            Compression::None => self.decoded_len().map(Some),
            _ => Ok(self.encoded_len),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.encoded.get().is_some()
    }

    #[inline]
    pub fn is_decoded(&self) -> bool {
        self.decoded.get().is_some()
    }

    pub fn byte_offset(&self) -> Option<u64> {
        self.encoded.get().map(|p| p.offset)
    }

    pub fn encoded(&self) -> Option<&[u8]> {
        self.encoded.get().map(|p| p.bytes.as_slice())
    }

    pub fn decoded(&self) -> Option<&TypedArray> {
        self.decoded.get()
    }

    /// Store the payload. Returns `false` if one was already attached.
    pub(crate) fn attach(&self, offset: u64, bytes: Vec<u8>) -> bool {
        self.encoded.set(EncodedPayload { offset, bytes }).is_ok()
    }

    /// Encoded payload, scanning `ledger` forward on first use.
    pub fn get_or_load(&self, ledger: &mut StreamLedger) -> Result<&[u8]> {
        if let Some(bytes) = self.encoded() {
            ledger.check_policy()?;
            return Ok(bytes);
        }
        ledger.request(self.index)?;
        self.encoded().ok_or_else(|| {
            Error::other(format!("stream @{} '{}' does not belong to this ledger", self.index, self.name))
        })
    }

    /// Decoded array, loading and decoding on first use.
    pub fn get_or_decode(&self, ledger: &mut StreamLedger) -> Result<&TypedArray> {
        ledger.check_policy()?;
        if let Some(array) = self.decoded() {
            return Ok(array);
        }
        self.get_or_load(ledger)?;
        self.decode_with(ledger.decoder())
    }

    /// Decode an already attached payload.
    pub fn decode_with(&self, decoder: &StreamDecoder) -> Result<&TypedArray> {
        if let Some(array) = self.decoded() {
            return Ok(array);
        }
        let bytes = self.encoded().ok_or_else(|| Error::policy(format!("stream @{} not loaded", self.index)))?;
        let array = decoder.decode(self, bytes)?;
        Ok(self.decoded.get_or_init(|| array))
    }
}

impl fmt::Debug for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDescriptor")
            .field("name", &self.name)
            .field("array", &self.array_name)
            .field("index", &self.index)
            .field("elem_type", &self.elem_type)
            .field("elem_count", &self.elem_count)
            .field("outer_shape", &self.outer_shape)
            .field("compression", &self.compression)
            .field("offset", &self.byte_offset())
            .field("decoded", &self.is_decoded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ArrayArena;

    fn descriptor() -> StreamDescriptor {
        let mut arena = ArrayArena::new();
        let id = arena.insert("Nodes", Some(Shape::d1(4))).unwrap();
        StreamDescriptor::new("Coordinates", id, "Nodes", 1, ElementType::Float32, 3, Shape::d1(4))
    }

    #[test]
    fn test_sizes_and_hints() {
        let d = descriptor();
        assert_eq!(d.value_count().unwrap(), 12);
        assert_eq!(d.decoded_len().unwrap(), 48);
        assert_eq!(d.length_hint(Encoding::BinaryLittle).unwrap(), Some(48));
        assert_eq!(d.length_hint(Encoding::Ascii).unwrap(), None);

        let d = descriptor().with_compression(Compression::HxZip, Some(17));
        assert_eq!(d.length_hint(Encoding::BinaryBig).unwrap(), Some(17));
        let d = descriptor().with_compression(Compression::HxByteRle, None);
        assert_eq!(d.length_hint(Encoding::BinaryBig).unwrap(), None);
    }

    #[test]
    fn test_oversized_shape() {
        let mut arena = ArrayArena::new();
        let id = arena.insert("Lattice", None).unwrap();
        let huge = Shape::from_slice(&[1 << 32, 1 << 32, 2]);
        let d = StreamDescriptor::new("Data", id, "Lattice", 1, ElementType::Uint8, 1, huge);
        assert!(matches!(d.value_count(), Err(Error::StructuralCorruption(_))));
        assert!(matches!(d.length_hint(Encoding::BinaryLittle), Err(Error::StructuralCorruption(_))));

        let wide = Shape::d1(usize::MAX / 2);
        let d = StreamDescriptor::new("Data", id, "Lattice", 2, ElementType::Float64, 1, wide);
        assert_eq!(d.value_count().unwrap(), usize::MAX / 2);
        assert!(matches!(d.decoded_len(), Err(Error::StructuralCorruption(_))));
    }

    #[test]
    fn test_attach_once() {
        let d = descriptor();
        assert!(!d.is_loaded());
        assert_eq!(d.byte_offset(), None);
        assert!(d.attach(10, vec![1, 2, 3]));
        assert!(!d.attach(20, vec![9]));
        assert_eq!(d.byte_offset(), Some(10));
        assert_eq!(d.encoded(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_decode_with_caches() {
        let d = StreamDescriptor::new("Data", descriptor().array(), "Nodes", 1, ElementType::Uint8, 1, Shape::d1(3));
        let decoder = StreamDecoder::new(Encoding::BinaryBig);
        assert!(d.decode_with(&decoder).is_err());
        d.attach(0, vec![4, 5, 6]);
        let first = d.decode_with(&decoder).unwrap() as *const TypedArray;
        let second = d.decode_with(&decoder).unwrap() as *const TypedArray;
        assert_eq!(first, second);
        assert_eq!(d.decoded().unwrap().as_u8(), Some(&[4u8, 5, 6][..]));
    }
}
