//! Thumbnail generation.

use std::path::Path;

use reel_models::encoding::{THUMBNAIL_SCALE_WIDTH, THUMBNAIL_TIMESTAMP};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{require_file, MediaInput, MediaResult};

/// Escape text for a `drawtext` `text='...'` option.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\u{2019}")
        .replace(':', "\\:")
        .replace('%', "\\%")
        .replace(',', "\\,")
}

fn thumbnail_filter(title: &str) -> String {
    let mut filter = format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH);
    let title = title.trim();
    if !title.is_empty() {
        filter.push_str(&format!(
            ",drawtext=text='{}':fontcolor=white:fontsize=36:borderw=3:bordercolor=black:x=(w-text_w)/2:y=h-text_h-40",
            escape_drawtext(title)
        ));
    }
    filter
}

/// Grab the frame at 1s, scale it and draw `title` near the bottom.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    title: &str,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();
    require_file(MediaInput::Video, video_path)?;

    let cmd = FfmpegCommand::new(video_path, output_path)
        .seek(THUMBNAIL_TIMESTAMP)
        .single_frame()
        .video_filter(thumbnail_filter(title));

    if let Err(e) = runner.run(&cmd).await {
        let _ = tokio::fs::remove_file(output_path).await;
        return Err(e);
    }
    Ok(())
}
