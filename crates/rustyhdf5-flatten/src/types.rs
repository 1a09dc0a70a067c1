//! NetCDF-4 data types, attribute values and data buffers.

/// NetCDF-4 data types corresponding to the standard NetCDF type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NcType {
    /// NC_BYTE: signed 8-bit integer
    Byte,
    /// NC_UBYTE: unsigned 8-bit integer
    UByte,
    /// NC_SHORT: signed 16-bit integer
    Short,
    /// NC_USHORT: unsigned 16-bit integer
    UShort,
    /// NC_INT: signed 32-bit integer
    Int,
    /// NC_UINT: unsigned 32-bit integer
    UInt,
    /// NC_INT64: signed 64-bit integer
    Int64,
    /// NC_UINT64: unsigned 64-bit integer
    UInt64,
    /// NC_FLOAT: 32-bit floating point
    Float,
    /// NC_DOUBLE: 64-bit floating point
    Double,
    /// NC_STRING: variable-length string
    String,
    /// NC_CHAR: fixed-length string / character data
    Char,
}

impl NcType {
    /// Size in bytes of one element as used for slice budgeting.
    ///
    /// Variable-length strings count as one pointer-sized slot.
    pub fn element_size(&self) -> usize {
        match self {
            NcType::Byte | NcType::UByte | NcType::Char => 1,
            NcType::Short | NcType::UShort => 2,
            NcType::Int | NcType::UInt | NcType::Float => 4,
            NcType::Int64 | NcType::UInt64 | NcType::Double | NcType::String => 8,
        }
    }

    /// Whether elements are variable-length strings rather than raw bytes.
    pub fn is_variable_length(&self) -> bool {
        matches!(self, NcType::String)
    }
}

impl std::fmt::Display for NcType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NcType::Byte => write!(f, "NC_BYTE"),
            NcType::UByte => write!(f, "NC_UBYTE"),
            NcType::Short => write!(f, "NC_SHORT"),
            NcType::UShort => write!(f, "NC_USHORT"),
            NcType::Int => write!(f, "NC_INT"),
            NcType::UInt => write!(f, "NC_UINT"),
            NcType::Int64 => write!(f, "NC_INT64"),
            NcType::UInt64 => write!(f, "NC_UINT64"),
            NcType::Float => write!(f, "NC_FLOAT"),
            NcType::Double => write!(f, "NC_DOUBLE"),
            NcType::String => write!(f, "NC_STRING"),
            NcType::Char => write!(f, "NC_CHAR"),
        }
    }
}

/// An attribute value attached to a group or variable.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    F64(f64),
    F64Array(Vec<f64>),
    I64(i64),
    I64Array(Vec<i64>),
    U64(u64),
    String(String),
    StringArray(Vec<String>),
}

impl AttrValue {
    /// The string payload, if this is a scalar string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The string elements, if this is a string array attribute.
    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            AttrValue::StringArray(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

/// A block of variable data moved between backends.
///
/// Fixed-size types travel as little-endian bytes; `NC_STRING` data travels
/// as one `String` per element.
#[derive(Debug, Clone, PartialEq)]
pub enum DataBuffer {
    Raw(Vec<u8>),
    Strings(Vec<String>),
}

impl DataBuffer {
    /// A zero-filled buffer holding `len` elements of `nc_type`.
    pub fn zeroed(nc_type: NcType, len: usize) -> Self {
        if nc_type.is_variable_length() {
            DataBuffer::Strings(vec![String::new(); len])
        } else {
            DataBuffer::Raw(vec![0u8; len * nc_type.element_size()])
        }
    }

    /// Number of elements held, given the element type.
    pub fn num_elements(&self, nc_type: NcType) -> usize {
        match self {
            DataBuffer::Raw(bytes) => bytes.len() / nc_type.element_size(),
            DataBuffer::Strings(v) => v.len(),
        }
    }

    /// Build a buffer from f64 values.
    pub fn from_f64(values: &[f64]) -> Self {
        DataBuffer::Raw(values.iter().flat_map(|v| v.to_le_bytes()).collect())
    }

    /// Build a buffer from i32 values.
    pub fn from_i32(values: &[i32]) -> Self {
        DataBuffer::Raw(values.iter().flat_map(|v| v.to_le_bytes()).collect())
    }

    /// Decode little-endian f64 values. Returns `None` for string data or a
    /// length that is not a multiple of eight.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            DataBuffer::Raw(bytes) if bytes.len() % 8 == 0 => Some(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            _ => None,
        }
    }
}
