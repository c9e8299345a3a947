//! ASS (SubStation Alpha v4+) caption track builder.
//!
//! One `Dialogue:` event per word segment, rendered centered on a 1080x1920
//! canvas. Output is a pure function of the segments.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use reel_models::encoding::{OUTPUT_HEIGHT, OUTPUT_WIDTH};
use reel_models::CaptionSegment;
use tracing::warn;

use crate::error::MediaResult;

/// Everything that is not a word character or whitespace.
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

/// White fill, black outline, half-transparent black shadow, centered (numpad 5).
const DEFAULT_STYLE: &str =
    "Style: Default,Bangers,110,&H00FFFFFF,&H000000FF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,6,3,5,40,40,0,1";

const EVENT_FORMAT: &str = "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// Format seconds as `H:MM:SS.cc`, truncating to centiseconds.
pub fn format_ass_timestamp(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    // Epsilon absorbs binary float error such as 0.29 * 100 = 28.999...
    let total_cs = (seconds * 100.0 + 1e-6).floor() as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    format!(
        "{}:{:02}:{:02}.{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        cs
    )
}

/// Escape ASS override characters.
pub fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('{', "\\{").replace('}', "\\}")
}

/// Strip punctuation and collapse whitespace.
pub fn clean_caption_text(text: &str) -> String {
    let stripped = PUNCTUATION.replace_all(text, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

fn header() -> String {
    format!(
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         PlayResX: {OUTPUT_WIDTH}\n\
         PlayResY: {OUTPUT_HEIGHT}\n\
         WrapStyle: 0\n\
         ScaledBorderAndShadow: yes\n\
         \n\
         [V4+ Styles]\n\
         {STYLE_FORMAT}\n\
         {DEFAULT_STYLE}\n\
         \n\
         [Events]\n\
         {EVENT_FORMAT}\n"
    )
}

/// Build the caption document for `segments`.
///
/// Segments with `end <= start` (or non-finite times) are skipped; the rest
/// are emitted in `start` order. Segments whose text is empty after cleaning
/// produce no event.
pub fn build_caption_track(segments: &[CaptionSegment]) -> String {
    let mut valid: Vec<&CaptionSegment> = segments
        .iter()
        .filter(|seg| {
            let ok = seg.is_valid();
            if !ok {
                warn!(start = seg.start, end = seg.end, text = %seg.text, "Skipping invalid caption segment");
            }
            ok
        })
        .collect();
    valid.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut doc = header();
    for seg in valid {
        let text = clean_caption_text(&seg.text);
        if text.is_empty() {
            continue;
        }
        let _ = writeln!(
            doc,
            "Dialogue: 0,{},{},Default,,0,0,0,,{}",
            format_ass_timestamp(seg.start),
            format_ass_timestamp(seg.end),
            escape_ass_text(&text)
        );
    }
    doc
}

/// Build and write the caption document to `path`.
pub async fn write_caption_track(segments: &[CaptionSegment], path: impl AsRef<Path>) -> MediaResult<()> {
    let doc = build_caption_track(segments);
    tokio::fs::write(path.as_ref(), doc).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_ass_timestamp(0.0), "0:00:00.00");
        assert_eq!(format_ass_timestamp(1.0), "0:00:01.00");
        assert_eq!(format_ass_timestamp(0.29), "0:00:00.29");
        assert_eq!(format_ass_timestamp(61.239), "0:01:01.23");
        assert_eq!(format_ass_timestamp(3725.5), "1:02:05.50");
        assert_eq!(format_ass_timestamp(-3.0), "0:00:00.00");
    }

    #[test]
    fn test_hello_segment() {
        let doc = build_caption_track(&[CaptionSegment::new(0.0, 1.0, "hello!")]);
        let events: Vec<&str> = doc.lines().filter(|l| l.starts_with("Dialogue:")).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], "Dialogue: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,hello");
    }

    #[test]
    fn test_header_written_once() {
        let doc = build_caption_track(&[
            CaptionSegment::new(0.0, 0.5, "one"),
            CaptionSegment::new(0.5, 1.0, "two"),
        ]);
        assert_eq!(doc.matches("[Script Info]").count(), 1);
        assert!(doc.contains("PlayResX: 1080"));
        assert!(doc.contains("PlayResY: 1920"));
        assert!(doc.contains("Style: Default,Bangers,110,"));
    }

    #[test]
    fn test_deterministic() {
        let segments = vec![
            CaptionSegment::new(0.3, 0.9, "world"),
            CaptionSegment::new(0.0, 0.3, "Hello,"),
        ];
        assert_eq!(build_caption_track(&segments), build_caption_track(&segments));
    }

    #[test]
    fn test_invalid_segments_skipped_and_sorted() {
        let doc = build_caption_track(&[
            CaptionSegment::new(2.0, 2.5, "late"),
            CaptionSegment::new(1.0, 1.0, "zero"),
            CaptionSegment::new(0.5, 0.2, "backwards"),
            CaptionSegment::new(0.0, 0.5, "early"),
            CaptionSegment::new(0.6, 0.8, "?!"),
        ]);
        let events: Vec<&str> = doc.lines().filter(|l| l.starts_with("Dialogue:")).collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].ends_with(",early"));
        assert!(events[1].ends_with(",late"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_ass_text(r"a\b{c}"), r"a\\b\{c\}");
        assert_eq!(clean_caption_text("  don't   stop!  "), "dont stop");
    }

    #[tokio::test]
    async fn test_write_caption_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtitles.ass");
        write_caption_track(&[CaptionSegment::new(0.0, 1.0, "hi")], &path)
            .await
            .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Dialogue: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,hi"));
    }
}
