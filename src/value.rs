use std::borrow::Cow;

use crate::guid::Guid;

/// One argument of an event call, matched positionally against the template's fields.
///
/// String, array and struct variants carry an `Option`: `None` plays the role of a null
/// pointer and packs to zero bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    /// Packed as a four byte Win32 `BOOL`.
    Bool(bool),
    Pointer(usize),
    /// Raw `FILETIME` ticks.
    FileTime(u64),
    /// `SYSTEMTIME` as its eight `u16` members.
    SystemTime([u16; 8]),
    Guid(Guid),
    /// UTF-16 code units, without terminator. Packing stops at the first embedded NUL.
    WideStr(Option<Cow<'a, [u16]>>),
    /// Narrow string bytes, without terminator. Packing stops at the first embedded NUL.
    NarrowStr(Option<&'a [u8]>),
    /// Raw element bytes of a counted array, in wire order.
    Binary(Option<&'a [u8]>),
    /// Raw struct elements. `element_size` is used unless the schema overrides it.
    Struct {
        element_size: u32,
        data: Option<&'a [u8]>,
    },
}

impl<'a> FieldValue<'a> {
    /// Encodes `s` as UTF-16 code units.
    pub fn wide(s: &str) -> FieldValue<'static> {
        FieldValue::WideStr(Some(Cow::Owned(s.encode_utf16().collect())))
    }

    pub fn wide_units(units: &'a [u16]) -> FieldValue<'a> {
        FieldValue::WideStr(Some(Cow::Borrowed(units)))
    }

    pub fn narrow(s: &'a str) -> FieldValue<'a> {
        FieldValue::NarrowStr(Some(s.as_bytes()))
    }

    pub fn null_wide() -> FieldValue<'static> {
        FieldValue::WideStr(None)
    }

    pub fn null_narrow() -> FieldValue<'static> {
        FieldValue::NarrowStr(None)
    }

    pub fn binary(bytes: &'a [u8]) -> FieldValue<'a> {
        FieldValue::Binary(Some(bytes))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Int8(_) => "Int8",
            FieldValue::UInt8(_) => "UInt8",
            FieldValue::Int16(_) => "Int16",
            FieldValue::UInt16(_) => "UInt16",
            FieldValue::Int32(_) => "Int32",
            FieldValue::UInt32(_) => "UInt32",
            FieldValue::Int64(_) => "Int64",
            FieldValue::UInt64(_) => "UInt64",
            FieldValue::Float(_) => "Float",
            FieldValue::Double(_) => "Double",
            FieldValue::Bool(_) => "Bool",
            FieldValue::Pointer(_) => "Pointer",
            FieldValue::FileTime(_) => "FileTime",
            FieldValue::SystemTime(_) => "SystemTime",
            FieldValue::Guid(_) => "Guid",
            FieldValue::WideStr(_) => "WideStr",
            FieldValue::NarrowStr(_) => "NarrowStr",
            FieldValue::Binary(_) => "Binary",
            FieldValue::Struct { .. } => "Struct",
        }
    }

    /// Integer value usable as an element count.
    pub fn as_count(&self) -> Option<i128> {
        let v = match *self {
            FieldValue::Int8(v) => i128::from(v),
            FieldValue::UInt8(v) => i128::from(v),
            FieldValue::Int16(v) => i128::from(v),
            FieldValue::UInt16(v) => i128::from(v),
            FieldValue::Int32(v) => i128::from(v),
            FieldValue::UInt32(v) => i128::from(v),
            FieldValue::Int64(v) => i128::from(v),
            FieldValue::UInt64(v) => i128::from(v),
            _ => return None,
        };
        Some(v)
    }
}

impl From<u8> for FieldValue<'_> {
    fn from(v: u8) -> Self {
        FieldValue::UInt8(v)
    }
}

impl From<u16> for FieldValue<'_> {
    fn from(v: u16) -> Self {
        FieldValue::UInt16(v)
    }
}

impl From<u32> for FieldValue<'_> {
    fn from(v: u32) -> Self {
        FieldValue::UInt32(v)
    }
}

impl From<u64> for FieldValue<'_> {
    fn from(v: u64) -> Self {
        FieldValue::UInt64(v)
    }
}

impl From<i32> for FieldValue<'_> {
    fn from(v: i32) -> Self {
        FieldValue::Int32(v)
    }
}

impl From<i64> for FieldValue<'_> {
    fn from(v: i64) -> Self {
        FieldValue::Int64(v)
    }
}

impl From<bool> for FieldValue<'_> {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<Guid> for FieldValue<'_> {
    fn from(v: Guid) -> Self {
        FieldValue::Guid(v)
    }
}
