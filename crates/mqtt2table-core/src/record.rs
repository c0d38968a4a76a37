use crate::watermark::Watermark;
use serde_json::Value;

/// One accepted inbound message: the decoded JSON object plus the numeric
/// timestamp extracted from it, when the configured field was present.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRecord {
    pub timestamp: Option<f64>,
    /// Always a `Value::Object`; non-object payloads are rejected at decode.
    pub payload: Value,
}

/// Why an inbound payload was dropped instead of accepted.
#[derive(Debug)]
pub enum DropReason {
    /// Payload did not decode as JSON.
    Malformed(serde_json::Error),
    /// Payload decoded, but to a bare array or scalar.
    NotAnObject,
    /// Timestamp at or below the prior watermark (redelivery of an
    /// already-checkpointed message).
    Stale { ts: f64 },
}

/// Per-window drop accounting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DropCounts {
    pub malformed: usize,
    pub non_object: usize,
    pub stale: usize,
}

impl DropCounts {
    pub fn record(&mut self, reason: &DropReason) {
        match reason {
            DropReason::Malformed(_) => self.malformed += 1,
            DropReason::NotAnObject => self.non_object += 1,
            DropReason::Stale { .. } => self.stale += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.malformed + self.non_object + self.stale
    }

    pub fn has_drops(&self) -> bool {
        self.total() > 0
    }
}

/// Decode one raw payload against the prior watermark.
///
/// The timestamp field is optional; a message without it (or with a
/// non-numeric or non-finite value there) is accepted with no timestamp and
/// can never be classified as stale.
pub fn decode_payload(
    raw: &[u8],
    timestamp_field: &str,
    watermark: Watermark,
) -> Result<SyncRecord, DropReason> {
    let value: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => return Err(DropReason::Malformed(e)),
    };

    if !value.is_object() {
        return Err(DropReason::NotAnObject);
    }

    let timestamp = value
        .get(timestamp_field)
        .and_then(Value::as_f64)
        .filter(|ts| ts.is_finite());

    if let Some(ts) = timestamp {
        if watermark.covers(ts) {
            return Err(DropReason::Stale { ts });
        }
    }

    Ok(SyncRecord {
        timestamp,
        payload: value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_object_is_accepted() {
        let record =
            decode_payload(br#"{"msg":"hello","ts":150.0}"#, "ts", Watermark::at(100.0)).unwrap();
        assert_eq!(record.timestamp, Some(150.0));
        assert_eq!(record.payload, json!({"msg": "hello", "ts": 150.0}));
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let err = decode_payload(b"{not json", "ts", Watermark::default()).unwrap_err();
        assert!(matches!(err, DropReason::Malformed(_)));
    }

    #[test]
    fn non_object_payloads_are_dropped() {
        for raw in [&b"[1,2,3]"[..], b"42", b"\"hello\"", b"null"] {
            let err = decode_payload(raw, "ts", Watermark::default()).unwrap_err();
            assert!(matches!(err, DropReason::NotAnObject));
        }
    }

    #[test]
    fn timestamp_at_or_below_watermark_is_stale() {
        let wm = Watermark::at(100.0);
        assert!(matches!(
            decode_payload(br#"{"ts":50}"#, "ts", wm),
            Err(DropReason::Stale { ts }) if ts == 50.0
        ));
        assert!(matches!(
            decode_payload(br#"{"ts":100}"#, "ts", wm),
            Err(DropReason::Stale { ts }) if ts == 100.0
        ));
        assert!(decode_payload(br#"{"ts":100.5}"#, "ts", wm).is_ok());
    }

    #[test]
    fn missing_or_unusable_timestamp_is_accepted_without_one() {
        let wm = Watermark::at(100.0);
        for raw in [
            &br#"{"msg":"x"}"#[..],
            br#"{"ts":"yesterday"}"#,
            br#"{"ts":null}"#,
        ] {
            let record = decode_payload(raw, "ts", wm).unwrap();
            assert_eq!(record.timestamp, None);
        }
    }

    #[test]
    fn timestamp_field_name_is_configurable() {
        let record = decode_payload(
            br#"{"event_time":42.0,"ts":1.0}"#,
            "event_time",
            Watermark::default(),
        )
        .unwrap();
        assert_eq!(record.timestamp, Some(42.0));
    }

    #[test]
    fn drop_counts_aggregate_by_reason() {
        let mut counts = DropCounts::default();
        counts.record(&DropReason::NotAnObject);
        counts.record(&DropReason::Stale { ts: 1.0 });
        counts.record(&DropReason::Stale { ts: 2.0 });
        assert_eq!(counts.non_object, 1);
        assert_eq!(counts.stale, 2);
        assert_eq!(counts.total(), 3);
        assert!(counts.has_drops());
        assert!(!DropCounts::default().has_drops());
    }
}
