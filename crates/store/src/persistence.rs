//! Library container: a JSON list of show records.
//!
//! Record fields are written in declaration order, so equal libraries encode
//! to identical bytes.

use serde_json::Value;
use showsync_core::Show;

use crate::StoreError;
use crate::codec::{Codec, DecodeReport, ShowRecord, decode_all};

/// Encode a library. Serde's writer API is fallible, so this returns a
/// `Result`; for these records it never fails in practice.
pub fn encode_shows(shows: &[Show]) -> Result<Vec<u8>, StoreError> {
    let records: Vec<ShowRecord> = shows.iter().map(Codec::to_record).collect();
    serde_json::to_vec_pretty(&records).map_err(|e| StoreError::Format(format!("encode: {e}")))
}

/// Decode a library blob. Only a blob that is not a list at all is an error;
/// individual bad shows are listed in the report.
pub fn decode_shows(blob: &[u8]) -> Result<DecodeReport<Show>, StoreError> {
    let value: Value = serde_json::from_slice(blob)
        .map_err(|e| StoreError::Format(format!("parse JSON: {e}")))?;
    match value {
        Value::Array(items) => Ok(decode_all(items)),
        _ => Err(StoreError::Format("expected a list of shows".into())),
    }
}
