//! Payload decoding: decompression plus reinterpretation as typed values.

use std::borrow::Cow;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

use super::descriptor::StreamDescriptor;
use crate::core::Compression;
use crate::util::{
    ArrayData, ByteOrder, Complex32, ElementDescriptor, ElementType, Encoding, Error, Result,
    TypeCatalog, TypedArray,
};

/// Turns encoded stream bytes into typed arrays. Stateless apart from the
/// file encoding, so one decoder may serve many threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamDecoder {
    encoding: Encoding,
}

impl StreamDecoder {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Decode `bytes` as the payload of `desc`.
    pub fn decode(&self, desc: &StreamDescriptor, bytes: &[u8]) -> Result<TypedArray> {
        let elem = TypeCatalog::describe(desc.elem_type(), self.encoding);
        let shape = desc.outer_shape().with_elements(desc.elem_count());
        let data = match elem.byte_order {
            None => decode_ascii(desc, bytes)?,
            Some(order) => {
                let raw = expand(desc, bytes)?;
                reinterpret(&elem, order, &raw)
            }
        };
        tracing::trace!(index = desc.index(), elem = %desc.elem_type(), shape = %shape, "decoded stream");
        Ok(TypedArray::new(shape, data))
    }
}

/// Undo compression and cut raw payloads to the declared size.
fn expand<'a>(desc: &StreamDescriptor, bytes: &'a [u8]) -> Result<Cow<'a, [u8]>> {
    let expected = desc.decoded_len()?;
    match desc.compression() {
        Compression::None => {
            if bytes.len() < expected {
                return Err(Error::TruncatedStream {
                    index: desc.index(),
                    expected,
                    actual: bytes.len(),
                });
            }
            Ok(Cow::Borrowed(&bytes[..expected]))
        }
        compression => Ok(Cow::Owned(compression.expand(bytes, expected)?)),
    }
}

macro_rules! read_numbers {
    ($raw:expr, $order:expr, $t:ty, $read:ident) => {{
        let mut out = vec![<$t>::default(); $raw.len() / std::mem::size_of::<$t>()];
        match $order {
            ByteOrder::Big => BigEndian::$read($raw, &mut out),
            ByteOrder::Little => LittleEndian::$read($raw, &mut out),
        }
        out
    }};
}

fn reinterpret(elem: &ElementDescriptor, order: ByteOrder, raw: &[u8]) -> ArrayData {
    let raw = &raw[..raw.len() - raw.len() % elem.byte_width];
    match elem.elem_type {
        ElementType::Int8 => ArrayData::Int8(raw.iter().map(|&b| b as i8).collect()),
        ElementType::Uint8 => ArrayData::Uint8(raw.to_vec()),
        ElementType::Char => ArrayData::Char(raw.to_vec()),
        ElementType::Int16 => ArrayData::Int16(read_numbers!(raw, order, i16, read_i16_into)),
        ElementType::Uint16 => ArrayData::Uint16(read_numbers!(raw, order, u16, read_u16_into)),
        ElementType::Int32 => ArrayData::Int32(read_numbers!(raw, order, i32, read_i32_into)),
        ElementType::Uint32 => ArrayData::Uint32(read_numbers!(raw, order, u32, read_u32_into)),
        ElementType::Int64 => ArrayData::Int64(read_numbers!(raw, order, i64, read_i64_into)),
        ElementType::Uint64 => ArrayData::Uint64(read_numbers!(raw, order, u64, read_u64_into)),
        ElementType::Float32 => ArrayData::Float32(read_numbers!(raw, order, f32, read_f32_into)),
        ElementType::Float64 => ArrayData::Float64(read_numbers!(raw, order, f64, read_f64_into)),
        ElementType::Complex64 => {
            let parts = read_numbers!(raw, order, f32, read_f32_into);
            ArrayData::Complex64(parts.chunks_exact(2).map(|p| Complex32::new(p[0], p[1])).collect())
        }
    }
}

fn parse_values<T: FromStr>(words: &[&[u8]], index: usize) -> Result<Vec<T>> {
    words
        .iter()
        .map(|w| {
            std::str::from_utf8(w)
                .ok()
                .and_then(|s| s.parse::<T>().ok())
                .ok_or_else(|| {
                    Error::corrupt(format!(
                        "stream @{}: invalid literal '{}'",
                        index,
                        String::from_utf8_lossy(w)
                    ))
                })
        })
        .collect()
}

/// Parse whitespace separated decimal literals. Compression does not apply.
fn decode_ascii(desc: &StreamDescriptor, text: &[u8]) -> Result<ArrayData> {
    let per_value = if desc.elem_type() == ElementType::Complex64 { 2 } else { 1 };
    let expected = desc
        .value_count()?
        .checked_mul(per_value)
        .ok_or_else(|| Error::corrupt(format!("stream @{}: value count out of range", desc.index())))?;
    let words: Vec<&[u8]> = text
        .split(|b| b.is_ascii_whitespace())
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() < expected {
        return Err(Error::TruncatedStream { index: desc.index(), expected, actual: words.len() });
    }
    if words.len() > expected {
        return Err(Error::corrupt(format!(
            "stream @{} holds {} values, {} declared",
            desc.index(),
            words.len(),
            expected
        )));
    }

    let index = desc.index();
    Ok(match desc.elem_type() {
        ElementType::Int8 => ArrayData::Int8(parse_values(&words, index)?),
        ElementType::Uint8 => ArrayData::Uint8(parse_values(&words, index)?),
        ElementType::Char => ArrayData::Char(parse_values(&words, index)?),
        ElementType::Int16 => ArrayData::Int16(parse_values(&words, index)?),
        ElementType::Uint16 => ArrayData::Uint16(parse_values(&words, index)?),
        ElementType::Int32 => ArrayData::Int32(parse_values(&words, index)?),
        ElementType::Uint32 => ArrayData::Uint32(parse_values(&words, index)?),
        ElementType::Int64 => ArrayData::Int64(parse_values(&words, index)?),
        ElementType::Uint64 => ArrayData::Uint64(parse_values(&words, index)?),
        ElementType::Float32 => ArrayData::Float32(parse_values(&words, index)?),
        ElementType::Float64 => ArrayData::Float64(parse_values(&words, index)?),
        ElementType::Complex64 => {
            let parts: Vec<f32> = parse_values(&words, index)?;
            ArrayData::Complex64(parts.chunks_exact(2).map(|p| Complex32::new(p[0], p[1])).collect())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{deflate, rle_encode};
    use crate::stream::ArrayArena;
    use crate::util::Shape;

    fn desc(elem: ElementType, elem_count: usize, items: usize) -> StreamDescriptor {
        let mut arena = ArrayArena::new();
        let id = arena.insert("Lattice", Some(Shape::d1(items))).unwrap();
        StreamDescriptor::new("Data", id, "Lattice", 1, elem, elem_count, Shape::d1(items))
    }

    #[test]
    fn test_binary_endianness() {
        let d = desc(ElementType::Int16, 1, 2);
        let big = StreamDecoder::new(Encoding::BinaryBig).decode(&d, &[0, 1, 1, 0]).unwrap();
        assert_eq!(big.as_i16(), Some(&[1i16, 256][..]));
        let little = StreamDecoder::new(Encoding::BinaryLittle).decode(&d, &[0, 1, 1, 0]).unwrap();
        assert_eq!(little.as_i16(), Some(&[256i16, 1][..]));
    }

    #[test]
    fn test_trailing_axis_and_truncation() {
        let d = desc(ElementType::Float32, 3, 2);
        let mut bytes: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        bytes.push(b'\n');
        let arr = StreamDecoder::new(Encoding::BinaryLittle).decode(&d, &bytes).unwrap();
        assert_eq!(arr.shape().dims(), &[2, 3]);
        assert_eq!(arr.as_f32().unwrap()[5], 6.0);

        let err = StreamDecoder::new(Encoding::BinaryLittle).decode(&d, &bytes[..20]).unwrap_err();
        assert!(matches!(err, Error::TruncatedStream { expected: 24, actual: 20, .. }));
    }

    #[test]
    fn test_compressed_payloads() {
        let values: Vec<u8> = vec![3, 3, 3, 3, 7, 8, 9, 9];
        let d = desc(ElementType::Uint8, 1, 8).with_compression(Compression::HxByteRle, None);
        let arr = StreamDecoder::new(Encoding::BinaryBig).decode(&d, &rle_encode(&values)).unwrap();
        assert_eq!(arr.as_u8(), Some(values.as_slice()));

        let d = desc(ElementType::Uint8, 1, 8).with_compression(Compression::HxZip, None);
        let arr = StreamDecoder::new(Encoding::BinaryBig).decode(&d, &deflate(&values, 6).unwrap()).unwrap();
        assert_eq!(arr.as_u8(), Some(values.as_slice()));
    }

    #[test]
    fn test_complex_binary() {
        let d = desc(ElementType::Complex64, 1, 1);
        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_be_bytes()).collect();
        let arr = StreamDecoder::new(Encoding::BinaryBig).decode(&d, &bytes).unwrap();
        assert_eq!(arr.as_complex(), Some(&[Complex32::new(1.5, -2.0)][..]));
    }

    #[test]
    fn test_ascii_counts() {
        let d = desc(ElementType::Int32, 2, 2);
        let dec = StreamDecoder::new(Encoding::Ascii);
        let arr = dec.decode(&d, b" 1 2\n3\t4\n").unwrap();
        assert_eq!(arr.as_i32(), Some(&[1, 2, 3, 4][..]));
        assert_eq!(arr.shape().dims(), &[2, 2]);

        assert!(matches!(dec.decode(&d, b"1 2 3"), Err(Error::TruncatedStream { expected: 4, actual: 3, .. })));
        assert!(matches!(dec.decode(&d, b"1 2 3 4 5"), Err(Error::StructuralCorruption(_))));
        assert!(matches!(dec.decode(&d, b"1 2 x 4"), Err(Error::StructuralCorruption(_))));
    }

    #[test]
    fn test_ascii_ignores_compression() {
        let d = desc(ElementType::Float64, 1, 2).with_compression(Compression::HxZip, Some(3));
        let arr = StreamDecoder::new(Encoding::Ascii).decode(&d, b"0.5 1e3").unwrap();
        assert_eq!(arr.as_f64(), Some(&[0.5, 1000.0][..]));
    }
}
