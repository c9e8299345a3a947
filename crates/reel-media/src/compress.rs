//! Bitrate-capped secondary render for sharing.

use std::path::Path;

use reel_models::encoding::{
    COMPRESS_AUDIO_BITRATE, COMPRESS_BUFFER_SIZE, COMPRESS_VIDEO_BITRATE, DEFAULT_AUDIO_CODEC, DEFAULT_PIXEL_FORMAT,
    DEFAULT_PRESET, DEFAULT_VIDEO_CODEC,
};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{require_file, MediaInput, MediaResult};

fn compress_args() -> Vec<String> {
    [
        "-c:v",
        DEFAULT_VIDEO_CODEC,
        "-preset",
        DEFAULT_PRESET,
        "-b:v",
        COMPRESS_VIDEO_BITRATE,
        "-maxrate",
        COMPRESS_VIDEO_BITRATE,
        "-bufsize",
        COMPRESS_BUFFER_SIZE,
        "-pix_fmt",
        DEFAULT_PIXEL_FORMAT,
        "-c:a",
        DEFAULT_AUDIO_CODEC,
        "-b:a",
        COMPRESS_AUDIO_BITRATE,
        "-movflags",
        "+faststart",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Re-encode `input` into `output` with capped bitrates.
pub async fn compress_video(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();
    require_file(MediaInput::Video, input)?;

    let cmd = FfmpegCommand::new(input, output).output_args(compress_args());
    if let Err(e) = runner.run(&cmd).await {
        let _ = tokio::fs::remove_file(output).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_args_cap_bitrate() {
        let args = compress_args().join(" ");
        assert!(args.contains("-b:v 1M -maxrate 1M -bufsize 2M"));
        assert!(args.contains("-b:a 96k"));
    }
}
