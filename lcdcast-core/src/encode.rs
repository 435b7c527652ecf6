use std::fmt::Write;

use crate::format::ChangeRecord;

/// Separates records inside one datagram.
pub const RECORD_SEPARATOR: char = '#';
/// Separates the x, y and colour fields of one record.
pub const FIELD_SEPARATOR: char = '.';

/// Serialize a batch as `x.y.color` records joined by `#`.
///
/// All fields are bare lower-case hex. An empty batch gives an empty payload.
pub fn encode_batch(records: &[ChangeRecord]) -> String {
    let mut out = String::with_capacity(records.len() * 12);
    encode_batch_into(records, &mut out);
    out
}

/// Same as [`encode_batch`] but reuses `out`, which is cleared first.
pub fn encode_batch_into(records: &[ChangeRecord], out: &mut String) {
    out.clear();
    for (i, rec) in records.iter().enumerate() {
        if i > 0 {
            out.push(RECORD_SEPARATOR);
        }
        // writing into a String cannot fail
        let _ = write!(out, "{rec}");
    }
}
