//! Element type markers for the document wire format.
//!
//! Each field in an encoded document is prefixed with a single tag byte
//! identifying the value type that follows the field name.

/// 64-bit IEEE 754 floating point
pub const DOUBLE: u8 = 0x01;

/// UTF-8 string (i32 length prefix, NUL terminated)
pub const STRING: u8 = 0x02;

/// Embedded document
pub const DOCUMENT: u8 = 0x03;

/// Array, encoded as a document with "0", "1", ... keys
pub const ARRAY: u8 = 0x04;

/// Byte sequence (i32 length prefix + subtype byte)
pub const BINARY: u8 = 0x05;

/// 12-byte document identifier
pub const OBJECT_ID: u8 = 0x07;

/// Boolean (single byte, 0x00 or 0x01)
pub const BOOLEAN: u8 = 0x08;

/// UTC timestamp (i64 milliseconds since the Unix epoch)
pub const DATE_TIME: u8 = 0x09;

/// Null (no payload)
pub const NULL: u8 = 0x0A;

/// 64-bit signed integer
pub const INT64: u8 = 0x12;

/// Generic binary subtype
pub const BINARY_SUBTYPE_GENERIC: u8 = 0x00;

/// End-of-document terminator
pub const TERMINATOR: u8 = 0x00;

/// Check whether a tag byte names a known element type.
#[inline]
pub fn is_known_element_type(tag: u8) -> bool {
    matches!(
        tag,
        DOUBLE | STRING | DOCUMENT | ARRAY | BINARY | OBJECT_ID | BOOLEAN | DATE_TIME | NULL
            | INT64
    )
}
