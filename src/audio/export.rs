//! WAV import and export.
//!
//! Loads WAV files into [`AudioData`] and renders MIDI documents through the
//! synthesizer into 16-bit stereo WAV files.

use crate::audio::{AudioData, AudioFormat, SampleType};
use crate::midi::{MidiDocument, MidiPlayer};
use crate::synth::SampleBasedSynth;
use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Seconds rendered after the last event while notes are still sounding.
const RELEASE_TAIL_SECONDS: f64 = 2.0;

/// Reads a WAV file.
///
/// Integer samples keep their bit depth as signed little-endian PCM; 8-bit
/// files are re-centred to signed values by `hound`.
///
/// # Arguments
///
/// * `path` - Path of the WAV file
///
/// # Errors
///
/// Returns error if the file can't be opened or decoded
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path = path.as_ref();
    let mut reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();

    let mut buffer = Vec::new();
    let sample_type = match spec.sample_format {
        SampleFormat::Int => {
            let width = usize::from(spec.bits_per_sample / 8);
            for sample in reader.samples::<i32>() {
                let sample = sample.context("Failed to read WAV sample")?;
                buffer.extend_from_slice(&sample.to_le_bytes()[..width]);
            }
            SampleType::Signed
        }
        SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                bail!("Unsupported float WAV bit depth: {}", spec.bits_per_sample);
            }
            for sample in reader.samples::<f32>() {
                let sample = sample.context("Failed to read WAV sample")?;
                buffer.extend_from_slice(&sample.to_le_bytes());
            }
            SampleType::Float
        }
    };

    let format = AudioFormat::new(
        spec.bits_per_sample,
        spec.channels,
        spec.sample_rate,
        sample_type,
    );
    tracing::info!("Loaded {} ({})", path.display(), format);
    Ok(AudioData::new(format, buffer))
}

/// Writes audio as 32-bit float WAV.
///
/// # Errors
///
/// Returns error if the audio can't be decoded or the file can't be written
pub fn save_wav<P: AsRef<Path>>(audio: &AudioData, path: P) -> Result<()> {
    let path = path.as_ref();
    let samples = audio.samples()?;
    let spec = WavSpec {
        channels: audio.format().channels,
        sample_rate: audio.format().frames_per_second,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
    for &sample in samples.iter() {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Renders a document through a synthesizer into a WAV file.
///
/// Plays the document with a [`MidiPlayer`] one synth buffer at a time and
/// writes interleaved 16-bit stereo. After the last event, rendering goes on
/// until every note has died away or two seconds have passed.
///
/// # Arguments
///
/// * `document` - The document to render
/// * `synth` - A synthesizer with a wavetable library attached
/// * `output_path` - Path for the output WAV file
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
///
/// # Errors
///
/// Returns error if:
/// - The document can't be played
/// - The synthesizer fails
/// - The output file can't be written
pub fn render_to_wav<P, F>(
    document: &MidiDocument,
    synth: &mut SampleBasedSynth,
    output_path: P,
    mut progress_callback: Option<F>,
) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(f32),
{
    let output_path = output_path.as_ref();
    let sample_rate = synth.settings().sample_rate;
    let buffer_seconds = synth.settings().buffer_seconds();

    let mut player = MidiPlayer::new(document);
    player.setup().context("Failed to set up MIDI playback")?;

    let expected_seconds = player
        .tracks_to_play()
        .filter_map(|track| document.calculate_track_length_seconds(track).ok())
        .fold(0.0, f64::max)
        + RELEASE_TAIL_SECONDS;

    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(output_path, spec).with_context(|| {
        format!(
            "Failed to create output WAV file: {}",
            output_path.display()
        )
    })?;

    // Events at time zero sound in the first buffer
    player.advance(0.0, synth)?;

    let mut tail_seconds = 0.0;
    loop {
        synth.process()?;
        let (left, right) = synth.output();
        for (&l, &r) in left.iter().zip(right) {
            writer.write_sample(to_i16(l))?;
            writer.write_sample(to_i16(r))?;
        }

        if player.is_finished() {
            tail_seconds += buffer_seconds;
            if synth.active_note_count() == 0 || tail_seconds >= RELEASE_TAIL_SECONDS {
                break;
            }
        } else {
            player.advance(buffer_seconds, synth)?;
        }

        if let Some(ref mut callback) = progress_callback {
            let elapsed = player.time_seconds() + tail_seconds;
            callback((elapsed / expected_seconds).min(1.0) as f32);
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    tracing::info!(
        "Rendered {:.2}s of audio to {}",
        player.time_seconds() + tail_seconds,
        output_path.display()
    );
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}
