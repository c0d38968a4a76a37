use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest message timestamp known to have been durably handed to the sink.
///
/// `None` means no run has checkpointed anything yet, so every timestamp is
/// fresh. Values are epoch seconds; fractional parts are preserved.
///
/// Invariant: a watermark never moves backwards. `advanced` is the only way
/// to produce a new value from an old one, and it takes the maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(Option<f64>);

impl Watermark {
    pub fn at(seconds: f64) -> Self {
        Self(Some(seconds))
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    /// True when a message carrying `ts` was already covered by a previous
    /// run and must be dropped as a replay.
    pub fn covers(&self, ts: f64) -> bool {
        matches!(self.0, Some(w) if ts <= w)
    }

    #[must_use]
    pub fn advanced(self, ts: f64) -> Self {
        match self.0 {
            Some(w) if w >= ts => self,
            _ => Self(Some(ts)),
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(w) => write!(f, "{}", w),
            None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_watermark_covers_nothing() {
        let wm = Watermark::default();
        assert!(!wm.covers(0.0));
        assert!(!wm.covers(-100.0));
        assert!(!wm.covers(1e12));
    }

    #[test]
    fn covers_is_inclusive() {
        let wm = Watermark::at(100.0);
        assert!(wm.covers(50.0));
        assert!(wm.covers(100.0));
        assert!(!wm.covers(100.5));
    }

    #[test]
    fn advanced_never_moves_backwards() {
        let wm = Watermark::at(200.0);
        assert_eq!(wm.advanced(150.0), Watermark::at(200.0));
        assert_eq!(wm.advanced(200.0), Watermark::at(200.0));
        assert_eq!(wm.advanced(250.0), Watermark::at(250.0));
        assert_eq!(Watermark::default().advanced(1.5), Watermark::at(1.5));
    }

    #[test]
    fn serde_round_trip() {
        let wm = Watermark::at(1_700_000_000.25);
        let s = serde_json::to_string(&wm).unwrap();
        assert_eq!(s, "1700000000.25");
        let back: Watermark = serde_json::from_str(&s).unwrap();
        assert_eq!(wm, back);

        let none: Watermark = serde_json::from_str("null").unwrap();
        assert_eq!(none, Watermark::default());
    }
}
