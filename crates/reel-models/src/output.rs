//! Job artifact kinds and their canonical file names.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of artifact a job can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Synthesized (or placeholder) voiceover, temp dir
    Audio,
    /// Caption track, temp dir
    Subtitles,
    /// Final render
    Video,
    Thumbnail,
    /// Bitrate-capped secondary render
    Compressed,
    /// Structured job log
    Log,
    Metadata,
}

impl OutputKind {
    /// Fixed file name inside the job workspace.
    pub fn file_name(&self) -> &'static str {
        match self {
            OutputKind::Audio => "voice.wav",
            OutputKind::Subtitles => "subtitles.ass",
            OutputKind::Video => "final.mp4",
            OutputKind::Thumbnail => "thumbnail.png",
            OutputKind::Compressed => "final_compressed.mp4",
            OutputKind::Log => "log.json",
            OutputKind::Metadata => "metadata.json",
        }
    }

    /// Whether the artifact lives in the temp workspace.
    pub fn is_intermediate(&self) -> bool {
        matches!(self, OutputKind::Audio | OutputKind::Subtitles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert_eq!(OutputKind::Video.file_name(), "final.mp4");
        assert_eq!(OutputKind::Compressed.file_name(), "final_compressed.mp4");
        assert!(OutputKind::Audio.is_intermediate());
        assert!(!OutputKind::Log.is_intermediate());
    }

    #[test]
    fn test_map_key_serialization() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(OutputKind::Video, "out/final.mp4");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"video":"out/final.mp4"}"#);
    }
}
