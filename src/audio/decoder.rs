use rubato::{FftFixedIn, Resampler};
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AnalysisError;

/// Sample rate every clip is brought to before analysis.
/// 22050Hz keeps frame sizes and mel band edges identical regardless of the source file.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22_050;

/// Only the first minute of a clip is analyzed.
pub const MAX_CLIP_SECONDS: f64 = 60.0;

/// Input frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;

/// Mono clip ready for DSP analysis (tempo, key, energy, onset strength, MFCC).
#[derive(Debug, Clone)]
pub struct MonoAudio {
    /// Mono audio samples in range [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate of `samples`
    pub sample_rate: u32,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl MonoAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_ms = if sample_rate > 0 {
            samples.len() as u64 * 1000 / sample_rate as u64
        } else {
            0
        };
        Self {
            samples,
            sample_rate,
            duration_ms,
        }
    }
}

/// Decode at most `max_seconds` of an audio file to mono f32 at [`ANALYSIS_SAMPLE_RATE`].
///
/// Reads packets until the limit is reached, mixes every channel down to mono
/// and resamples the result. Corrupted packets are skipped.
pub fn decode_clip(path: &Path, max_seconds: f64) -> Result<MonoAudio, AnalysisError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AnalysisError::Decode(format!("Failed to probe audio format: {}", e)))?;

    let mut format_reader = probed.format;

    let track = format_reader
        .default_track()
        .ok_or_else(|| AnalysisError::Decode("No audio tracks found".to_string()))?;

    let track_id = track.id;
    let source_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let max_samples = (max_seconds * source_rate as f64) as usize;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AnalysisError::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut all_samples: Vec<f32> = Vec::new();

    while all_samples.len() < max_samples {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AnalysisError::Decode(format!("Error reading packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                tracing::warn!("Skipping corrupted packet: {}", msg);
                decoder.reset();
                continue;
            }
            Err(e) => return Err(AnalysisError::Decode(e.to_string())),
        };

        all_samples.extend_from_slice(&convert_to_mono_f32(&decoded));
    }

    all_samples.truncate(max_samples);

    if all_samples.is_empty() {
        return Err(AnalysisError::Empty);
    }

    let samples = resample(&all_samples, source_rate, ANALYSIS_SAMPLE_RATE)?;
    tracing::debug!(
        "Decoded {:?}: {} samples at {}Hz -> {} samples at {}Hz",
        path,
        all_samples.len(),
        source_rate,
        samples.len(),
        ANALYSIS_SAMPLE_RATE
    );

    Ok(MonoAudio::new(samples, ANALYSIS_SAMPLE_RATE))
}

/// Band-limited resampling of mono `samples` from `source_rate` to `target_rate`.
///
/// The output is aligned with the input (the resampler delay is dropped) and
/// holds `len * target_rate / source_rate` samples.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, AnalysisError> {
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(source_rate as usize, target_rate as usize, RESAMPLE_CHUNK, 1, 1)
        .map_err(|e| AnalysisError::Resample(format!("Failed to create resampler: {}", e)))?;

    let expected = (samples.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut output = vec![vec![0.0f32; resampler.output_frames_max()]; 1];
    let mut resampled = Vec::with_capacity(expected + delay + resampler.output_frames_max());

    let mut chunks = samples.chunks_exact(resampler.input_frames_next());
    for chunk in &mut chunks {
        let (_, out_len) = resampler
            .process_into_buffer(&[chunk], &mut output, None)
            .map_err(|e| AnalysisError::Resample(e.to_string()))?;
        resampled.extend_from_slice(&output[0][..out_len]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let (_, out_len) = resampler
            .process_partial_into_buffer(Some(&[rest][..]), &mut output, None)
            .map_err(|e| AnalysisError::Resample(e.to_string()))?;
        resampled.extend_from_slice(&output[0][..out_len]);
    }

    // Flush the delayed tail.
    while resampled.len() < expected + delay {
        let (_, out_len) = resampler
            .process_partial_into_buffer(None::<&[&[f32]]>, &mut output, None)
            .map_err(|e| AnalysisError::Resample(e.to_string()))?;
        if out_len == 0 {
            break;
        }
        resampled.extend_from_slice(&output[0][..out_len]);
    }

    Ok(resampled.into_iter().skip(delay).take(expected).collect())
}

/// Convert decoded audio buffer to mono f32 samples.
/// If stereo/multichannel, averages all channels to produce mono output.
fn convert_to_mono_f32(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => mix_to_mono(buf),
        AudioBufferRef::U8(buf) => mix_to_mono(buf),
        AudioBufferRef::U16(buf) => mix_to_mono(buf),
        AudioBufferRef::U24(buf) => mix_to_mono(buf),
        AudioBufferRef::U32(buf) => mix_to_mono(buf),
        AudioBufferRef::S8(buf) => mix_to_mono(buf),
        AudioBufferRef::S16(buf) => mix_to_mono(buf),
        AudioBufferRef::S24(buf) => mix_to_mono(buf),
        AudioBufferRef::S32(buf) => mix_to_mono(buf),
        AudioBufferRef::F64(buf) => mix_to_mono(buf),
    }
}

fn mix_to_mono<S>(buf: &symphonia::core::audio::AudioBuffer<S>) -> Vec<f32>
where
    S: symphonia::core::sample::Sample,
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();

    if channels == 0 || frames == 0 {
        return Vec::new();
    }

    if channels == 1 {
        buf.chan(0).iter().map(|&s| f32::from_sample(s)).collect()
    } else {
        let mut mono = vec![0.0f32; frames];
        let scale = 1.0 / channels as f32;
        for ch in 0..channels {
            for (i, &sample) in buf.chan(ch).iter().enumerate() {
                mono[i] += f32::from_sample(sample) * scale;
            }
        }
        mono
    }
}
