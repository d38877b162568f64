use std::fmt;

// DType — Scalar element types a Storage can hold
//
//   U8   — unsigned byte, for image data and labels
//   F16  — 16-bit IEEE half float, for mixed precision
//   F32  — 32-bit float, the default workhorse
//   I32  — signed 32-bit int, for shape tensors and indices
//   I64  — signed 64-bit int, for labels
//
// Every element is exchanged with the rest of the system as f64. Elements
// are kept little-endian in the raw buffers so a buffer can be written to
// disk or memory-mapped back without conversion.

/// Enum of all supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    U8,
    F16,
    F32,
    I32,
    I64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::U8 => 1,
            DType::F16 => 2,
            DType::F32 => 4,
            DType::I32 => 4,
            DType::I64 => 8,
        }
    }

    /// Whether this dtype is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::F32)
    }

    /// Decode one element from the start of `src`.
    ///
    /// # Panics
    /// If `src` is shorter than [`DType::size_in_bytes`].
    pub fn read_f64(&self, src: &[u8]) -> f64 {
        match self {
            DType::U8 => src[0] as f64,
            DType::F16 => half::f16::from_le_bytes([src[0], src[1]]).to_f64(),
            DType::F32 => f32::from_le_bytes([src[0], src[1], src[2], src[3]]) as f64,
            DType::I32 => i32::from_le_bytes([src[0], src[1], src[2], src[3]]) as f64,
            DType::I64 => i64::from_le_bytes([
                src[0], src[1], src[2], src[3], src[4], src[5], src[6], src[7],
            ]) as f64,
        }
    }

    /// Encode `v` into the start of `dst`. Integer types saturate.
    ///
    /// # Panics
    /// If `dst` is shorter than [`DType::size_in_bytes`].
    pub fn write_f64(&self, dst: &mut [u8], v: f64) {
        match self {
            DType::U8 => dst[0] = v as u8,
            DType::F16 => dst[..2].copy_from_slice(&half::f16::from_f64(v).to_le_bytes()),
            DType::F32 => dst[..4].copy_from_slice(&(v as f32).to_le_bytes()),
            DType::I32 => dst[..4].copy_from_slice(&(v as i32).to_le_bytes()),
            DType::I64 => dst[..8].copy_from_slice(&(v as i64).to_le_bytes()),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::U8 => "u8",
            DType::F16 => "f16",
            DType::F32 => "f32",
            DType::I32 => "i32",
            DType::I64 => "i64",
        };
        write!(f, "{}", s)
    }
}

// WithDType — Trait that connects Rust types to DType enum
//
// Lets constructors such as `Tensor::from_slice(&[1i32, 2, 3], ..)` pick the
// storage type from the element type.

/// Trait implemented by Rust types that can be stored in a tensor.
pub trait WithDType: Copy + Send + Sync + 'static + fmt::Debug {
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    /// Convert this value to f64.
    fn as_f64(self) -> f64;
}

impl WithDType for u8 {
    const DTYPE: DType = DType::U8;
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl WithDType for half::f16 {
    const DTYPE: DType = DType::F16;
    fn as_f64(self) -> f64 {
        self.to_f32() as f64
    }
}

impl WithDType for f32 {
    const DTYPE: DType = DType::F32;
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl WithDType for i32 {
    const DTYPE: DType = DType::I32;
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl WithDType for i64 {
    const DTYPE: DType = DType::I64;
    fn as_f64(self) -> f64 {
        self as f64
    }
}
