//! Zero-copy typed views over array payload frames.
//!
//! Array payloads arrive as raw little-endian element bytes in their own
//! frame. An [`ArrayView`] borrows those bytes from the owning
//! [`DataPackage`](super::DataPackage) together with the header's shape and
//! element type; nothing is copied until [`ArrayView::to_vec`] is called.

use std::fmt;

use crate::error::{BridgeError, Result};

/// Element type of an array payload.
///
/// Header type names use numpy conventions (`uint16`, `float32`, ...). They
/// are normalized to fixed-width Rust element types when the header is
/// decoded; names without a Rust counterpart are kept verbatim in
/// [`DType::Other`] and can never be materialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Other(String),
}

impl DType {
    /// Normalize a header `dtype` name.
    pub fn from_header(name: &str) -> Self {
        match name {
            "uint8" => DType::U8,
            "uint16" => DType::U16,
            "uint32" => DType::U32,
            "uint64" => DType::U64,
            "int8" => DType::I8,
            "int16" => DType::I16,
            "int32" => DType::I32,
            "int64" => DType::I64,
            "float32" | "float" => DType::F32,
            "float64" | "double" => DType::F64,
            other => DType::Other(other.to_string()),
        }
    }

    /// Normalized type name (`u16`, `f32`, ...).
    pub fn name(&self) -> &str {
        match self {
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::Other(name) => name,
        }
    }

    /// Size in bytes of one element, `None` for unrecognized types.
    pub fn width(&self) -> Option<usize> {
        match self {
            DType::U8 | DType::I8 => Some(1),
            DType::U16 | DType::I16 => Some(2),
            DType::U32 | DType::I32 | DType::F32 => Some(4),
            DType::U64 | DType::I64 | DType::F64 => Some(8),
            DType::Other(_) => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive type an array can be materialized as.
pub trait Element: Copy + Sized {
    /// The dtype this element type matches exactly.
    const DTYPE: DType;

    /// Read one element from exactly `size_of::<Self>()` little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($t:ty => $dtype:expr),* $(,)?) => {$(
        impl Element for $t {
            const DTYPE: DType = $dtype;

            #[inline]
            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_le_bytes(raw)
            }
        }
    )*};
}

impl_element!(
    u8 => DType::U8,
    u16 => DType::U16,
    u32 => DType::U32,
    u64 => DType::U64,
    i8 => DType::I8,
    i16 => DType::I16,
    i32 => DType::I32,
    i64 => DType::I64,
    f32 => DType::F32,
    f64 => DType::F64,
);

/// Number of elements described by `shape`, failing instead of wrapping.
pub fn checked_size(shape: &[usize]) -> Result<usize> {
    shape.iter().try_fold(1usize, |size, &dim| {
        size.checked_mul(dim)
            .ok_or_else(|| BridgeError::Overflow(shape.to_vec()))
    })
}

/// Borrowed, typed window over an array payload.
///
/// The view's lifetime is tied to the [`DataPackage`](super::DataPackage)
/// that retains the payload frame.
#[derive(Debug, Clone, Copy)]
pub struct ArrayView<'a> {
    bytes: &'a [u8],
    shape: &'a [usize],
    dtype: &'a DType,
}

impl<'a> ArrayView<'a> {
    pub(crate) fn new(bytes: &'a [u8], shape: &'a [usize], dtype: &'a DType) -> Self {
        Self {
            bytes,
            shape,
            dtype,
        }
    }

    #[inline]
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    #[inline]
    pub fn dtype(&self) -> &'a DType {
        self.dtype
    }

    /// Number of elements (product of the shape).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Overflow`] if the product exceeds `usize::MAX`.
    pub fn size(&self) -> Result<usize> {
        checked_size(self.shape)
    }

    /// The borrowed payload bytes backing this view.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Copy the elements out into an owned vector.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::TypeMismatch`] unless the dtype is exactly `T`
    /// - [`BridgeError::Overflow`] if the shape is unmanageable
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if *self.dtype != T::DTYPE {
            return Err(BridgeError::type_mismatch(T::DTYPE.name(), self.dtype));
        }
        let width = std::mem::size_of::<T>();
        let size = self.size()?;
        let byte_len = size
            .checked_mul(width)
            .ok_or_else(|| BridgeError::Overflow(self.shape.to_vec()))?;
        let bytes = self.bytes.get(..byte_len).ok_or_else(|| {
            BridgeError::Framing(format!(
                "array payload has {} bytes, shape {:?} needs {}",
                self.bytes.len(),
                self.shape,
                byte_len
            ))
        })?;
        Ok(bytes.chunks_exact(width).map(T::from_le_slice).collect())
    }
}
