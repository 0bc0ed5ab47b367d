//! Document encoder.

use bytes::{BufMut, BytesMut};

use crate::document::{Document, Value};

use super::marker;
use super::{EncodeError, MAX_DOCUMENT_DEPTH};

/// Document encoder that writes the wire format into a byte buffer.
pub struct DocumentEncoder {
    buffer: BytesMut,
}

impl DocumentEncoder {
    /// Create a new encoder with default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new encoder with specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Get the bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Encode a document.
    pub fn encode_document(&mut self, document: &Document) -> Result<(), EncodeError> {
        self.encode_document_at_depth(document, 0)
    }

    fn encode_document_at_depth(
        &mut self,
        document: &Document,
        depth: usize,
    ) -> Result<(), EncodeError> {
        if depth >= MAX_DOCUMENT_DEPTH {
            return Err(EncodeError::DepthExceeded {
                limit: MAX_DOCUMENT_DEPTH,
            });
        }

        // Length prefix is backpatched once the full extent is known.
        let start = self.buffer.len();
        self.buffer.put_i32_le(0);

        for (name, value) in document.iter() {
            self.encode_element(name, value, depth)?;
        }

        self.buffer.put_u8(marker::TERMINATOR);
        self.patch_length(start)?;
        Ok(())
    }

    fn encode_element(&mut self, name: &str, value: &Value, depth: usize) -> Result<(), EncodeError> {
        self.buffer.put_u8(element_type(value));
        self.encode_cstring(name)?;

        match value {
            Value::Null => {}
            Value::Boolean(b) => self.buffer.put_u8(if *b { 0x01 } else { 0x00 }),
            Value::Int64(i) => self.buffer.put_i64_le(*i),
            Value::Double(f) => self.buffer.put_f64_le(*f),
            Value::String(s) => self.encode_string(s)?,
            Value::Binary(b) => {
                if b.len() > i32::MAX as usize {
                    return Err(EncodeError::ValueTooLarge("binary", b.len()));
                }
                self.buffer.put_i32_le(b.len() as i32);
                self.buffer.put_u8(marker::BINARY_SUBTYPE_GENERIC);
                self.buffer.put_slice(b);
            }
            Value::DateTime(dt) => self.buffer.put_i64_le(dt.timestamp_millis()),
            Value::Document(d) => self.encode_document_at_depth(d, depth + 1)?,
            Value::Array(items) => self.encode_array(items, depth)?,
            Value::ObjectId(id) => self.buffer.put_slice(&id.bytes()),
        }

        Ok(())
    }

    /// Encode an array as a document keyed "0", "1", ...
    fn encode_array(&mut self, items: &[Value], depth: usize) -> Result<(), EncodeError> {
        if depth + 1 >= MAX_DOCUMENT_DEPTH {
            return Err(EncodeError::DepthExceeded {
                limit: MAX_DOCUMENT_DEPTH,
            });
        }

        let start = self.buffer.len();
        self.buffer.put_i32_le(0);

        for (index, item) in items.iter().enumerate() {
            self.encode_element(&index.to_string(), item, depth + 1)?;
        }

        self.buffer.put_u8(marker::TERMINATOR);
        self.patch_length(start)?;
        Ok(())
    }

    /// Encode a string value: i32 length (including NUL) + bytes + NUL.
    fn encode_string(&mut self, s: &str) -> Result<(), EncodeError> {
        let len = s.len() + 1;
        if len > i32::MAX as usize {
            return Err(EncodeError::ValueTooLarge("string", s.len()));
        }
        self.buffer.put_i32_le(len as i32);
        self.buffer.put_slice(s.as_bytes());
        self.buffer.put_u8(0x00);
        Ok(())
    }

    /// Encode a NUL-terminated field name.
    fn encode_cstring(&mut self, name: &str) -> Result<(), EncodeError> {
        if name.as_bytes().contains(&0x00) {
            return Err(EncodeError::KeyContainsNul(name.to_string()));
        }
        self.buffer.put_slice(name.as_bytes());
        self.buffer.put_u8(0x00);
        Ok(())
    }

    /// Backpatch the i32 length prefix written at `start`.
    fn patch_length(&mut self, start: usize) -> Result<(), EncodeError> {
        let total = self.buffer.len() - start;
        if total > i32::MAX as usize {
            return Err(EncodeError::ValueTooLarge("document", total));
        }
        self.buffer[start..start + 4].copy_from_slice(&(total as i32).to_le_bytes());
        Ok(())
    }
}

impl Default for DocumentEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the element tag byte for a value.
fn element_type(value: &Value) -> u8 {
    match value {
        Value::Null => marker::NULL,
        Value::Boolean(_) => marker::BOOLEAN,
        Value::Int64(_) => marker::INT64,
        Value::Double(_) => marker::DOUBLE,
        Value::String(_) => marker::STRING,
        Value::Binary(_) => marker::BINARY,
        Value::DateTime(_) => marker::DATE_TIME,
        Value::Document(_) => marker::DOCUMENT,
        Value::Array(_) => marker::ARRAY,
        Value::ObjectId(_) => marker::OBJECT_ID,
    }
}

/// Convenience function to encode a single document.
pub fn encode_document(document: &Document) -> Result<BytesMut, EncodeError> {
    let mut encoder = DocumentEncoder::new();
    encoder.encode_document(document)?;
    Ok(encoder.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_encode_empty_document() {
        let bytes = encode_document(&Document::new()).unwrap();
        // i32 length 5 + terminator
        assert_eq!(&bytes[..], &[0x05, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_int64() {
        let bytes = encode_document(&doc! { "n" => 1 }).unwrap();
        // len(4) + tag(1) + "n\0"(2) + i64(8) + term(1) = 16
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 16);
        assert_eq!(bytes[4], marker::INT64);
        assert_eq!(&bytes[5..7], b"n\x00");
        assert_eq!(&bytes[7..15], &1i64.to_le_bytes());
        assert_eq!(bytes[15], marker::TERMINATOR);
    }

    #[test]
    fn test_encode_string() {
        let bytes = encode_document(&doc! { "s" => "hi" }).unwrap();
        assert_eq!(bytes[4], marker::STRING);
        // string payload: i32 len 3 + "hi\0"
        assert_eq!(&bytes[7..11], &3i32.to_le_bytes());
        assert_eq!(&bytes[11..14], b"hi\x00");
    }

    #[test]
    fn test_encode_preserves_field_order() {
        let bytes = encode_document(&doc! { "zz" => 1, "aa" => 2 }).unwrap();
        let zz = bytes.windows(2).position(|w| w == b"zz").unwrap();
        let aa = bytes.windows(2).position(|w| w == b"aa").unwrap();
        assert!(zz < aa);
    }

    #[test]
    fn test_encode_object_id_fixed_width() {
        let id = crate::document::ObjectId::new();
        let bytes = encode_document(&doc! { "_id" => id }).unwrap();
        assert_eq!(bytes[4], marker::OBJECT_ID);
        // len(4) + tag(1) + "_id\0"(4) + 12 bytes + term(1)
        assert_eq!(bytes.len(), 22);
        assert_eq!(&bytes[9..21], &id.bytes());
    }

    #[test]
    fn test_encode_array_keys() {
        let bytes =
            encode_document(&doc! { "a" => vec![Value::Int64(7), Value::Int64(8)] }).unwrap();
        assert_eq!(bytes[4], marker::ARRAY);
        // Inner document uses "0" and "1" keys.
        assert!(bytes.windows(2).any(|w| w == b"0\x00"));
        assert!(bytes.windows(2).any(|w| w == b"1\x00"));
    }

    #[test]
    fn test_encode_key_with_nul_rejected() {
        let mut doc = Document::new();
        doc.insert("bad\0key", 1);
        let err = encode_document(&doc).unwrap_err();
        assert!(matches!(err, EncodeError::KeyContainsNul(_)));
    }

    #[test]
    fn test_encode_depth_limit() {
        let mut doc = doc! { "leaf" => 1 };
        for _ in 0..MAX_DOCUMENT_DEPTH {
            doc = doc! { "nested" => doc };
        }
        let err = encode_document(&doc).unwrap_err();
        assert!(matches!(err, EncodeError::DepthExceeded { .. }));
    }

}
