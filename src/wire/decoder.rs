//! Document decoder.

use chrono::{DateTime, Utc};

use crate::document::{Document, ObjectId, Value};

use super::marker;
use super::{DecodeError, DecodeErrorKind, MAX_DOCUMENT_DEPTH};

/// Document decoder that reads the wire format from a byte buffer.
///
/// Every error carries the byte offset at which decoding failed.
pub struct DocumentDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DocumentDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Get the current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes count.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Decode the next document.
    pub fn decode_document(&mut self) -> Result<Document, DecodeError> {
        self.decode_document_at_depth(0)
    }

    fn decode_document_at_depth(&mut self, depth: usize) -> Result<Document, DecodeError> {
        if depth >= MAX_DOCUMENT_DEPTH {
            return Err(self.error(DecodeErrorKind::DepthExceeded {
                limit: MAX_DOCUMENT_DEPTH,
            }));
        }

        let start = self.pos;
        let declared = self.read_i32()?;
        if declared < 5 {
            return Err(DecodeError {
                offset: start,
                kind: DecodeErrorKind::BadLength(declared as i64),
            });
        }
        let end = start + declared as usize;
        if end > self.data.len() {
            return Err(DecodeError {
                offset: start,
                kind: DecodeErrorKind::UnexpectedEof,
            });
        }

        let mut document = Document::new();
        loop {
            let tag = self.read_u8()?;
            if tag == marker::TERMINATOR {
                break;
            }

            let tag_offset = self.pos - 1;
            if !marker::is_known_element_type(tag) {
                return Err(DecodeError {
                    offset: tag_offset,
                    kind: DecodeErrorKind::UnknownElementType(tag),
                });
            }

            let name = self.read_cstring()?;
            let value = self.decode_value(tag, depth)?;
            document.insert(name, value);
        }

        if self.pos != end {
            return Err(DecodeError {
                offset: self.pos,
                kind: DecodeErrorKind::BadLength(declared as i64),
            });
        }

        Ok(document)
    }

    fn decode_value(&mut self, tag: u8, depth: usize) -> Result<Value, DecodeError> {
        match tag {
            marker::NULL => Ok(Value::Null),
            marker::BOOLEAN => Ok(Value::Boolean(self.read_u8()? != 0x00)),
            marker::INT64 => Ok(Value::Int64(self.read_i64()?)),
            marker::DOUBLE => Ok(Value::Double(self.read_f64()?)),
            marker::STRING => self.decode_string(),
            marker::BINARY => self.decode_binary(),
            marker::DATE_TIME => {
                let offset = self.pos;
                let millis = self.read_i64()?;
                let dt = DateTime::<Utc>::from_timestamp_millis(millis).ok_or(DecodeError {
                    offset,
                    kind: DecodeErrorKind::BadLength(millis),
                })?;
                Ok(Value::DateTime(dt))
            }
            marker::OBJECT_ID => {
                let raw = self.read_bytes(12)?;
                let mut bytes = [0u8; 12];
                bytes.copy_from_slice(raw);
                Ok(Value::ObjectId(ObjectId::from_bytes(bytes)))
            }
            marker::DOCUMENT => Ok(Value::Document(self.decode_document_at_depth(depth + 1)?)),
            marker::ARRAY => {
                let items = self
                    .decode_document_at_depth(depth + 1)?
                    .into_iter()
                    .map(|(_, value)| value)
                    .collect();
                Ok(Value::Array(items))
            }
            _ => Err(DecodeError {
                offset: self.pos - 1,
                kind: DecodeErrorKind::UnknownElementType(tag),
            }),
        }
    }

    fn decode_string(&mut self) -> Result<Value, DecodeError> {
        let offset = self.pos;
        let len = self.read_i32()?;
        if len < 1 {
            return Err(DecodeError {
                offset,
                kind: DecodeErrorKind::BadLength(len as i64),
            });
        }
        let bytes = self.read_bytes(len as usize)?;
        let (content, terminator) = bytes.split_at(bytes.len() - 1);
        if terminator[0] != 0x00 {
            return Err(DecodeError {
                offset,
                kind: DecodeErrorKind::MissingTerminator,
            });
        }
        let s = std::str::from_utf8(content).map_err(|_| DecodeError {
            offset,
            kind: DecodeErrorKind::InvalidUtf8,
        })?;
        Ok(Value::String(s.to_string()))
    }

    fn decode_binary(&mut self) -> Result<Value, DecodeError> {
        let offset = self.pos;
        let len = self.read_i32()?;
        if len < 0 {
            return Err(DecodeError {
                offset,
                kind: DecodeErrorKind::BadLength(len as i64),
            });
        }
        let _subtype = self.read_u8()?;
        let bytes = self.read_bytes(len as usize)?;
        Ok(Value::Binary(bytes.to_vec()))
    }

    /// Read a NUL-terminated field name.
    fn read_cstring(&mut self) -> Result<String, DecodeError> {
        let offset = self.pos;
        let rest = &self.data[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0x00)
            .ok_or(DecodeError {
                offset,
                kind: DecodeErrorKind::UnexpectedEof,
            })?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| DecodeError {
            offset,
            kind: DecodeErrorKind::InvalidUtf8,
        })?;
        self.pos += nul + 1;
        Ok(s.to_string())
    }

    // Low-level read methods

    fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            offset: self.pos,
            kind,
        }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.remaining() < 1 {
            return Err(self.error(DecodeErrorKind::UnexpectedEof));
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(self.error(DecodeErrorKind::UnexpectedEof));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

/// Convenience function to decode a single document from bytes.
pub fn decode_document(data: &[u8]) -> Result<Document, DecodeError> {
    let mut decoder = DocumentDecoder::new(data);
    decoder.decode_document()
}
