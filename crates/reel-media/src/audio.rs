//! Voiceover WAV helpers.

use std::path::Path;

use reel_models::encoding::{AUDIO_BITS_PER_SAMPLE, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{require_file, MediaError, MediaInput, MediaResult};

fn canonical_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: AUDIO_CHANNELS,
        sample_rate: AUDIO_SAMPLE_RATE,
        bits_per_sample: AUDIO_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write `seconds` of silence as mono 16-bit PCM at 44.1 kHz.
pub fn write_silent_wav(path: impl AsRef<Path>, seconds: f64) -> MediaResult<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(MediaError::InvalidAudio(format!("invalid silence length: {seconds}")));
    }

    let frames = (seconds * AUDIO_SAMPLE_RATE as f64).round() as u64;
    let mut writer = hound::WavWriter::create(path.as_ref(), canonical_spec())?;
    {
        let mut samples = writer.get_i16_writer((frames * AUDIO_CHANNELS as u64) as u32);
        for _ in 0..frames * AUDIO_CHANNELS as u64 {
            samples.write_sample(0i16);
        }
        samples.flush()?;
    }
    writer.finalize()?;

    debug!(path = %path.as_ref().display(), seconds, "Wrote silent WAV");
    Ok(())
}

/// Duration in seconds: frames / sample rate.
pub fn wav_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let reader = hound::WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(MediaError::InvalidAudio("zero sample rate".to_string()));
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Transcode any audio ffmpeg understands into the canonical voiceover WAV.
pub async fn transcode_to_wav(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();
    require_file(MediaInput::Audio, input)?;

    let cmd = FfmpegCommand::new(input, output).output_args([
        "-vn".to_string(),
        "-ac".to_string(),
        AUDIO_CHANNELS.to_string(),
        "-ar".to_string(),
        AUDIO_SAMPLE_RATE.to_string(),
        "-c:a".to_string(),
        "pcm_s16le".to_string(),
    ]);

    if let Err(e) = runner.run(&cmd).await {
        let _ = tokio::fs::remove_file(output).await;
        return Err(e);
    }
    Ok(())
}
