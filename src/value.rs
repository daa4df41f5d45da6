//! The ten binout/d3plot scalar types, modeled as a sum type indexed by the
//! on-disk tag rather than duplicated per type.

use byteorder::{ByteOrder, LittleEndian};

/// On-disk scalar type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Int64 = 4,
    Uint8 = 5,
    Uint16 = 6,
    Uint32 = 7,
    Uint64 = 8,
    Float32 = 9,
    Float64 = 10,
    Invalid = 255,
}

impl ValueType {
    /// Width in bytes of one element of this type.
    pub fn size(self) -> usize {
        match self {
            ValueType::Int8 | ValueType::Uint8 => 1,
            ValueType::Int16 | ValueType::Uint16 => 2,
            ValueType::Int32 | ValueType::Uint32 | ValueType::Float32 => 4,
            ValueType::Int64 | ValueType::Uint64 | ValueType::Float64 => 8,
            ValueType::Invalid => 0,
        }
    }

    pub fn from_code(code: u64) -> ValueType {
        match code {
            1 => ValueType::Int8,
            2 => ValueType::Int16,
            3 => ValueType::Int32,
            4 => ValueType::Int64,
            5 => ValueType::Uint8,
            6 => ValueType::Uint16,
            7 => ValueType::Uint32,
            8 => ValueType::Uint64,
            9 => ValueType::Float32,
            10 => ValueType::Float64,
            _ => ValueType::Invalid,
        }
    }
}

/// A scalar type readable out of a binout payload.
///
/// One byte-level reader (`from_le_bytes`) is shared by every caller of
/// `Binout::read`; the output buffer, not the read path, carries the type.
pub trait BinoutScalar: Sized + Copy {
    const CODE: ValueType;

    fn from_le_bytes(bytes: &[u8]) -> Self;
}

macro_rules! impl_binout_scalar {
    ($ty:ty, $code:expr, $read:ident) => {
        impl BinoutScalar for $ty {
            const CODE: ValueType = $code;

            fn from_le_bytes(bytes: &[u8]) -> Self {
                LittleEndian::$read(bytes) as $ty
            }
        }
    };
}

impl BinoutScalar for i8 {
    const CODE: ValueType = ValueType::Int8;

    fn from_le_bytes(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }
}

impl BinoutScalar for u8 {
    const CODE: ValueType = ValueType::Uint8;

    fn from_le_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl_binout_scalar!(i16, ValueType::Int16, read_i16);
impl_binout_scalar!(i32, ValueType::Int32, read_i32);
impl_binout_scalar!(i64, ValueType::Int64, read_i64);
impl_binout_scalar!(u16, ValueType::Uint16, read_u16);
impl_binout_scalar!(u32, ValueType::Uint32, read_u32);
impl_binout_scalar!(u64, ValueType::Uint64, read_u64);
impl_binout_scalar!(f32, ValueType::Float32, read_f32);
impl_binout_scalar!(f64, ValueType::Float64, read_f64);

/// Decode a flat little-endian byte buffer into `T` elements.
pub fn decode_elements<T: BinoutScalar>(bytes: &[u8]) -> Vec<T> {
    let width = T::CODE.size();
    bytes
        .chunks_exact(width)
        .map(T::from_le_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_codes() {
        for code in 1u64..=10 {
            let ty = ValueType::from_code(code);
            assert_ne!(ty, ValueType::Invalid);
        }
        assert_eq!(ValueType::from_code(0), ValueType::Invalid);
        assert_eq!(ValueType::from_code(11), ValueType::Invalid);
    }

    #[test]
    fn decodes_i32_elements() {
        let bytes = 7i32.to_le_bytes();
        let mut buf = bytes.to_vec();
        buf.extend_from_slice(&(-3i32).to_le_bytes());
        let values: Vec<i32> = decode_elements(&buf);
        assert_eq!(values, vec![7, -3]);
    }
}
