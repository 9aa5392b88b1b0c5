use std::fmt;
use std::str::FromStr;

use half::f16;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Byte order of multi-byte elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
    /// Single-byte types, written with the `|` sigil.
    NotApplicable,
}

impl Endianness {
    /// The byte order of the target platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    fn sigil(self) -> char {
        match self {
            Endianness::Little => '<',
            Endianness::Big => '>',
            Endianness::NotApplicable => '|',
        }
    }
}

/// The numeric family of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Bool,
    Int,
    UInt,
    Float,
}

impl DataKind {
    fn code(self) -> char {
        match self {
            DataKind::Bool => 'b',
            DataKind::Int => 'i',
            DataKind::UInt => 'u',
            DataKind::Float => 'f',
        }
    }
}

/// Element type descriptor, as written in the `dtype` field of array metadata.
///
/// The string form is `<sigil><kind><bytewidth>`, e.g. `<i4` or `>f2`.
/// The numpy shorthands `b` (int8) and `B` (uint8) are accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataType {
    kind: DataKind,
    size: usize,
    endianness: Endianness,
}

impl DataType {
    pub fn new(kind: DataKind, size: usize, endianness: Endianness) -> crate::Result<Self> {
        let valid = match kind {
            DataKind::Bool => size == 1,
            DataKind::Int | DataKind::UInt => matches!(size, 1 | 2 | 4 | 8),
            DataKind::Float => matches!(size, 2 | 4 | 8),
        };
        if !valid {
            return Err(Error::invalid_metadata(format!(
                "unsupported width {size} for data kind {kind:?}"
            )));
        }
        let endianness = if size == 1 {
            Endianness::NotApplicable
        } else if endianness == Endianness::NotApplicable {
            return Err(Error::invalid_metadata(format!(
                "byte order must be given for {size}-byte data types"
            )));
        } else {
            endianness
        };
        Ok(Self {
            kind,
            size,
            endianness,
        })
    }

    /// A data type of the given kind and width in native byte order.
    pub fn native(kind: DataKind, size: usize) -> crate::Result<Self> {
        Self::new(kind, size, Endianness::native())
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Width of one element in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Whether stored bytes must be reversed to reach native byte order.
    pub fn needs_byte_swap(&self) -> bool {
        self.endianness != Endianness::NotApplicable && self.endianness != Endianness::native()
    }

    /// Convert elements between stored and native byte order.
    ///
    /// The conversion is its own inverse.
    pub fn swap_bytes(&self, bytes: &mut [u8]) {
        if self.needs_byte_swap() {
            bytes
                .chunks_exact_mut(self.size)
                .for_each(|element| element.reverse());
        }
    }

    /// Check that `T` describes the same elements as this data type, ignoring byte order.
    pub fn check_element<T: Element>(&self) -> crate::Result<()> {
        if T::KIND == self.kind && T::SIZE == self.size {
            Ok(())
        } else {
            Err(Error::DataTypeMismatch {
                requested: std::any::type_name::<T>().to_string(),
                actual: self.to_string(),
            })
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.endianness.sigil(),
            self.kind.code(),
            self.size
        )
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::invalid_metadata(format!("unparseable dtype {s:?}"));
        let mut chars = s.chars();
        let endianness = match chars.next() {
            Some('<') => Endianness::Little,
            Some('>') => Endianness::Big,
            Some('|') => Endianness::NotApplicable,
            _ => return Err(invalid()),
        };
        let rest = chars.as_str();
        let (kind, size) = match rest {
            "b" => (DataKind::Int, 1),
            "B" => (DataKind::UInt, 1),
            "?" => (DataKind::Bool, 1),
            _ => {
                let mut chars = rest.chars();
                let kind = match chars.next() {
                    Some('b') => DataKind::Bool,
                    Some('i') => DataKind::Int,
                    Some('u') => DataKind::UInt,
                    Some('f') => DataKind::Float,
                    _ => return Err(invalid()),
                };
                let size: usize = chars.as_str().parse().map_err(|_| invalid())?;
                (kind, size)
            }
        };
        Self::new(kind, size, endianness).map_err(|_| invalid())
    }
}

impl TryFrom<String> for DataType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

/// A Rust scalar which can be stored as an array element.
pub trait Element: Copy + Send + Sync + 'static {
    const KIND: DataKind;
    const SIZE: usize;

    /// Write the native-endian representation into `out`, which is `SIZE` bytes long.
    fn write_ne(&self, out: &mut [u8]);

    /// Read from a native-endian slice of `SIZE` bytes.
    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $kind:ident) => {
        impl Element for $ty {
            const KIND: DataKind = DataKind::$kind;
            const SIZE: usize = size_of::<$ty>();

            fn write_ne(&self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }

            fn read_ne(bytes: &[u8]) -> Self {
                let mut arr = [0u8; size_of::<$ty>()];
                arr.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(arr)
            }
        }
    };
}

impl_element!(i8, Int);
impl_element!(i16, Int);
impl_element!(i32, Int);
impl_element!(i64, Int);
impl_element!(u8, UInt);
impl_element!(u16, UInt);
impl_element!(u32, UInt);
impl_element!(u64, UInt);
impl_element!(f16, Float);
impl_element!(f32, Float);
impl_element!(f64, Float);

impl Element for bool {
    const KIND: DataKind = DataKind::Bool;
    const SIZE: usize = 1;

    fn write_ne(&self, out: &mut [u8]) {
        out[0] = u8::from(*self);
    }

    fn read_ne(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Native-endian bytes of a slice of elements.
pub(crate) fn elements_to_ne_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * T::SIZE];
    for (value, slot) in values.iter().zip(out.chunks_exact_mut(T::SIZE)) {
        value.write_ne(slot);
    }
    out
}

pub(crate) fn elements_from_ne_bytes<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::SIZE).map(T::read_ne).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        for s in ["<i4", ">f2", "|u1", "|b1", "<u8", ">f8", "<i2"] {
            let dt: DataType = s.parse().unwrap();
            assert_eq!(dt.to_string(), s);
        }
    }

    #[test]
    fn single_byte_normalises_sigil() {
        let dt: DataType = "<u1".parse().unwrap();
        assert_eq!(dt.endianness(), Endianness::NotApplicable);
        assert_eq!(dt.to_string(), "|u1");

        let dt: DataType = ">b".parse().unwrap();
        assert_eq!(dt.kind(), DataKind::Int);
        assert_eq!(dt.to_string(), "|i1");

        let dt: DataType = "|B".parse().unwrap();
        assert_eq!(dt.kind(), DataKind::UInt);
    }

    #[test]
    fn rejects_unparseable() {
        for s in ["", "i4", "<x4", "<i3", "|i4", "<f1", "<b2", "<i", "<i4x"] {
            let err = s.parse::<DataType>().unwrap_err();
            assert!(matches!(err, Error::InvalidMetadata(_)), "{s}: {err}");
        }
    }

    #[test]
    fn byte_swap_only_for_foreign_order() {
        let native = DataType::native(DataKind::Int, 4).unwrap();
        assert!(!native.needs_byte_swap());

        let foreign = match Endianness::native() {
            Endianness::Little => ">i4",
            _ => "<i4",
        };
        let dt: DataType = foreign.parse().unwrap();
        let mut bytes = vec![1, 2, 3, 4, 5, 6, 7, 8];
        dt.swap_bytes(&mut bytes);
        assert_eq!(bytes, vec![4, 3, 2, 1, 8, 7, 6, 5]);
    }

    #[test]
    fn element_check() {
        let dt: DataType = ">f2".parse().unwrap();
        assert!(dt.check_element::<f16>().is_ok());
        assert!(matches!(
            dt.check_element::<u16>(),
            Err(Error::DataTypeMismatch { .. })
        ));
    }

    #[test]
    fn serde_as_string() {
        let dt: DataType = serde_json::from_str("\"<f4\"").unwrap();
        assert_eq!(dt.kind(), DataKind::Float);
        assert_eq!(serde_json::to_string(&dt).unwrap(), "\"<f4\"");
    }
}
