//! Decoded, typed arrays.

use bytemuck::{Pod, Zeroable};
use std::fmt;

use super::{ElementType, Shape};

/// Complex value stored as two 32-bit floats.
#[derive(Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

impl Complex32 {
    #[inline]
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

impl fmt::Debug for Complex32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:+}i", self.re, self.im)
    }
}

/// Flat element storage, one variant per [`ElementType`].
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Int16(Vec<i16>),
    Uint16(Vec<u16>),
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Int64(Vec<i64>),
    Uint64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Complex64(Vec<Complex32>),
    Char(Vec<u8>),
}

macro_rules! impl_accessor {
    ($name:ident, $variant:ident, $t:ty) => {
        #[doc = concat!("Elements as `", stringify!($t), "`, if that is the stored type.")]
        pub fn $name(&self) -> Option<&[$t]> {
            match &self.data {
                ArrayData::$variant(v) => Some(v),
                _ => None,
            }
        }
    };
}

/// A decoded data stream: flat row-major storage plus shape.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedArray {
    shape: Shape,
    data: ArrayData,
}

impl TypedArray {
    pub fn new(shape: Shape, data: ArrayData) -> Self {
        Self { shape, data }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        match &self.data {
            ArrayData::Int8(v) => v.len(),
            ArrayData::Uint8(v) | ArrayData::Char(v) => v.len(),
            ArrayData::Int16(v) => v.len(),
            ArrayData::Uint16(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::Uint32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::Uint64(v) => v.len(),
            ArrayData::Float32(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
            ArrayData::Complex64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elem_type(&self) -> ElementType {
        match &self.data {
            ArrayData::Int8(_) => ElementType::Int8,
            ArrayData::Uint8(_) => ElementType::Uint8,
            ArrayData::Int16(_) => ElementType::Int16,
            ArrayData::Uint16(_) => ElementType::Uint16,
            ArrayData::Int32(_) => ElementType::Int32,
            ArrayData::Uint32(_) => ElementType::Uint32,
            ArrayData::Int64(_) => ElementType::Int64,
            ArrayData::Uint64(_) => ElementType::Uint64,
            ArrayData::Float32(_) => ElementType::Float32,
            ArrayData::Float64(_) => ElementType::Float64,
            ArrayData::Complex64(_) => ElementType::Complex64,
            ArrayData::Char(_) => ElementType::Char,
        }
    }

    impl_accessor!(as_i8, Int8, i8);
    impl_accessor!(as_u8, Uint8, u8);
    impl_accessor!(as_i16, Int16, i16);
    impl_accessor!(as_u16, Uint16, u16);
    impl_accessor!(as_i32, Int32, i32);
    impl_accessor!(as_u32, Uint32, u32);
    impl_accessor!(as_i64, Int64, i64);
    impl_accessor!(as_u64, Uint64, u64);
    impl_accessor!(as_f32, Float32, f32);
    impl_accessor!(as_f64, Float64, f64);
    impl_accessor!(as_complex, Complex64, Complex32);
    impl_accessor!(as_chars, Char, u8);

    /// Character payload as text (lossy), trailing NULs removed.
    pub fn as_text(&self) -> Option<String> {
        let bytes = self.as_chars()?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}
