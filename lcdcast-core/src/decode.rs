use thiserror::Error;

use crate::encode::{FIELD_SEPARATOR, RECORD_SEPARATOR};
use crate::format::{ChangeRecord, Rgb565};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not ASCII")]
    NotAscii,

    #[error("record {record}: expected 3 fields, found {found}")]
    FieldCount { record: usize, found: usize },

    #[error("record {record}: field {field} is not a 16-bit hex number: {text:?}")]
    BadField {
        record: usize,
        field: usize,
        text: String,
    },
}

/// Parse one datagram payload back into change records, in wire order.
pub fn decode_datagram(payload: &[u8]) -> Result<Vec<ChangeRecord>, DecodeError> {
    if !payload.is_ascii() {
        return Err(DecodeError::NotAscii);
    }
    // ASCII is always valid UTF-8
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotAscii)?;
    decode_batch(text)
}

/// Parse a `#`-joined batch. The empty string is a valid, empty batch.
pub fn decode_batch(text: &str) -> Result<Vec<ChangeRecord>, DecodeError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(RECORD_SEPARATOR)
        .enumerate()
        .map(|(record, raw)| decode_record(record, raw))
        .collect()
}

fn decode_record(record: usize, raw: &str) -> Result<ChangeRecord, DecodeError> {
    let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
    if fields.len() != 3 {
        return Err(DecodeError::FieldCount {
            record,
            found: fields.len(),
        });
    }
    let x = parse_hex(record, 0, fields[0])?;
    let y = parse_hex(record, 1, fields[1])?;
    let color = parse_hex(record, 2, fields[2])?;
    Ok(ChangeRecord::new(x, y, Rgb565(color)))
}

fn parse_hex(record: usize, field: usize, text: &str) -> Result<u16, DecodeError> {
    let bad = || DecodeError::BadField {
        record,
        field,
        text: text.to_string(),
    };
    // from_str_radix accepts a leading '+', the wire format does not
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(bad());
    }
    u16::from_str_radix(text, 16).map_err(|_| bad())
}
