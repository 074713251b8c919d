//! Byte-level encode/decode for the eleven dtypes' buffer encodings (§6).
//! Multi-byte types use little-endian, a backend-defined choice the spec
//! leaves open as long as it is consistent within a process.

use crate::dtype::DType;
use byteorder::{ByteOrder, LittleEndian};

/// A Rust native type that backs one dtype's flat storage array.
pub(crate) trait CpuElement: Copy + Send + Sync + PartialOrd + 'static {
    const DTYPE: DType;

    fn read(bytes: &[u8]) -> Self;
    fn write(self, bytes: &mut [u8]);
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
    fn to_i128(self) -> i128;
    fn from_i128(v: i128) -> Self;
}

macro_rules! impl_cpu_element_int {
    ($t:ty, $dtype:expr, $read:expr, $write:expr) => {
        impl CpuElement for $t {
            const DTYPE: DType = $dtype;

            fn read(bytes: &[u8]) -> Self {
                $read(bytes)
            }

            fn write(self, bytes: &mut [u8]) {
                $write(self, bytes)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as Self
            }

            fn to_i128(self) -> i128 {
                self as i128
            }

            fn from_i128(v: i128) -> Self {
                v as Self
            }
        }
    };
}

impl CpuElement for bool {
    const DTYPE: DType = DType::Bool;

    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[0] = self as u8;
    }

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(v: f64) -> Self {
        v != 0.0
    }

    fn to_i128(self) -> i128 {
        self as i128
    }

    fn from_i128(v: i128) -> Self {
        v != 0
    }
}

impl_cpu_element_int!(i8, DType::I8, |b: &[u8]| b[0] as i8, |v: i8, b: &mut [u8]| b[0] = v as u8);
impl_cpu_element_int!(u8, DType::U8, |b: &[u8]| b[0], |v: u8, b: &mut [u8]| b[0] = v);
impl_cpu_element_int!(i16, DType::I16, |b: &[u8]| LittleEndian::read_i16(b), |v: i16, b: &mut [u8]| LittleEndian::write_i16(b, v));
impl_cpu_element_int!(u16, DType::U16, |b: &[u8]| LittleEndian::read_u16(b), |v: u16, b: &mut [u8]| LittleEndian::write_u16(b, v));
impl_cpu_element_int!(i32, DType::I32, |b: &[u8]| LittleEndian::read_i32(b), |v: i32, b: &mut [u8]| LittleEndian::write_i32(b, v));
impl_cpu_element_int!(u32, DType::U32, |b: &[u8]| LittleEndian::read_u32(b), |v: u32, b: &mut [u8]| LittleEndian::write_u32(b, v));
impl_cpu_element_int!(i64, DType::I64, |b: &[u8]| LittleEndian::read_i64(b), |v: i64, b: &mut [u8]| LittleEndian::write_i64(b, v));
impl_cpu_element_int!(u64, DType::U64, |b: &[u8]| LittleEndian::read_u64(b), |v: u64, b: &mut [u8]| LittleEndian::write_u64(b, v));

impl CpuElement for f32 {
    const DTYPE: DType = DType::F32;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_f32(bytes)
    }

    fn write(self, bytes: &mut [u8]) {
        LittleEndian::write_f32(bytes, self)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn to_i128(self) -> i128 {
        self as i128
    }

    fn from_i128(v: i128) -> Self {
        v as f32
    }
}

impl CpuElement for f64 {
    const DTYPE: DType = DType::F64;

    fn read(bytes: &[u8]) -> Self {
        LittleEndian::read_f64(bytes)
    }

    fn write(self, bytes: &mut [u8]) {
        LittleEndian::write_f64(bytes, self)
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(v: f64) -> Self {
        v
    }

    fn to_i128(self) -> i128 {
        self as i128
    }

    fn from_i128(v: i128) -> Self {
        v as f64
    }
}
