//! FFmpeg CLI wrapper and caption track builder.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A runner with timeout and stderr diagnostics
//! - The ASS caption track builder
//! - Compositing of background, voiceover, captions and watermark
//! - Thumbnail and compressed-render post stages
//! - WAV helpers (silent placeholder, duration, transcoding)

pub mod audio;
pub mod captions;
pub mod command;
pub mod compositor;
pub mod compress;
pub mod error;
pub mod thumbnail;
pub mod watermark;

pub use audio::{transcode_to_wav, wav_duration, write_silent_wav};
pub use captions::{build_caption_track, format_ass_timestamp, write_caption_track};
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner, DEFAULT_FFMPEG_TIMEOUT_SECS};
pub use compositor::{composite, CompositeRequest};
pub use compress::compress_video;
pub use error::{MediaError, MediaInput, MediaResult};
pub use thumbnail::generate_thumbnail;
pub use watermark::{WatermarkConfig, DEFAULT_WATERMARK_PATH};
