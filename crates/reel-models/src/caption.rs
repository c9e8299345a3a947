//! Word-level caption timing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One timed word or phrase produced by alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Word or phrase
    #[serde(alias = "word")]
    pub text: String,
}

impl CaptionSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// `end > start` with finite, non-negative times.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.end > self.start
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(CaptionSegment::new(0.0, 1.0, "hi").is_valid());
        assert!(!CaptionSegment::new(1.0, 1.0, "hi").is_valid());
        assert!(!CaptionSegment::new(2.0, 1.0, "hi").is_valid());
        assert!(!CaptionSegment::new(f64::NAN, 1.0, "hi").is_valid());
    }

    #[test]
    fn test_word_alias() {
        let seg: CaptionSegment =
            serde_json::from_str(r#"{"start": 0.5, "end": 0.9, "word": "hello"}"#).unwrap();
        assert_eq!(seg.text, "hello");
    }
}
