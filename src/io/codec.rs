//! Snapshot encoding and decoding.
//!
//! Decoding runs in three passes: the raw JSON is parsed, `formatVersion` is
//! checked before any typed parsing, then the typed snapshot goes through the
//! [`SnapshotValidator`].

use crate::io::snapshot::{ExportKind, SUPPORTED_VERSIONS, Snapshot};
use crate::io::validation::{SnapshotValidator, ValidationIssue};
use crate::{Error, Result};
use chrono::{NaiveDate, Utc};
use serde_json::Value;

/// A decoded snapshot with its non-fatal issues.
#[derive(Debug, Clone)]
pub struct DecodedSnapshot {
    /// The snapshot.
    pub snapshot: Snapshot,
    /// Warnings raised during validation.
    pub warnings: Vec<ValidationIssue>,
}

/// Serializes a snapshot to pretty-printed JSON bytes.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(snapshot).map_err(|e| Error::OperationFailed {
        operation: "encode_snapshot".to_string(),
        cause: e.to_string(),
    })
}

/// Parses and validates snapshot bytes.
pub fn decode(data: &[u8]) -> Result<Snapshot> {
    decode_with_warnings(data).map(|decoded| decoded.snapshot)
}

/// Parses and validates snapshot bytes, keeping the validation warnings.
pub fn decode_with_warnings(data: &[u8]) -> Result<DecodedSnapshot> {
    let value: Value =
        serde_json::from_slice(data).map_err(|e| Error::MalformedSnapshot(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(Error::MalformedSnapshot(
            "expected a JSON object at the top level".to_string(),
        ));
    };
    let version = match object.get("formatVersion") {
        Some(Value::String(v)) => v.clone(),
        Some(_) => {
            return Err(Error::MalformedSnapshot(
                "formatVersion must be a string".to_string(),
            ));
        },
        None => return Err(Error::MalformedSnapshot("missing formatVersion".to_string())),
    };
    if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
        return Err(Error::UnsupportedVersion {
            found: version,
            supported: SUPPORTED_VERSIONS.join(", "),
        });
    }

    let snapshot: Snapshot =
        serde_json::from_value(value).map_err(|e| Error::MalformedSnapshot(e.to_string()))?;
    let warnings = SnapshotValidator::new().validate(&snapshot)?;

    Ok(DecodedSnapshot { snapshot, warnings })
}

/// Returns the conventional file name for an export made on `date`.
#[must_use]
pub fn file_name_for(kind: ExportKind, date: NaiveDate) -> String {
    format!("themes-export-{kind}-{}.json", date.format("%Y-%m-%d"))
}

/// Returns the conventional file name for an export made today (UTC).
#[must_use]
pub fn suggested_file_name(kind: ExportKind) -> String {
    file_name_for(kind, Utc::now().date_naive())
}
