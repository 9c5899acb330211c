//! wavesynth - Command-line front end for the wavesynth library.
//!
//! # Usage
//!
//! ```bash
//! wavesynth info song.mid                       # Describe a MIDI file, bank or WAV
//! wavesynth analyze note.wav                    # Estimate pitch and volume
//! wavesynth render song.mid bank.sf2 out.wav    # Render MIDI through a library
//! wavesynth extract bank.sf2 bank.wtl           # Convert a SoundFont to .wtl
//! wavesynth tone bank.sf2 A4 out.wav            # Render a single note
//! ```
//!
//! Set `RUST_LOG=debug` for diagnostic output.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wavesynth::audio::{
    load_wav, render_to_wav, save_wav, AudioData, FrequencyGraph, WaveForm,
    DEFAULT_STRENGTH_THRESHOLD,
};
use wavesynth::midi::{name_to_note, note_to_name, MidiDocument};
use wavesynth::synth::{SampleBasedSynth, SynthSettings};
use wavesynth::wavetable::{load_soundfont, WavetableLibrary};

/// Default FFT window for `analyze`.
const ANALYZE_FFT_SIZE: usize = 16384;

/// Subcommand and its positional arguments.
enum Command {
    Info(PathBuf),
    Analyze(PathBuf),
    Render {
        midi: PathBuf,
        library: PathBuf,
        output: PathBuf,
    },
    Extract {
        soundfont: PathBuf,
        output: PathBuf,
    },
    Tone {
        library: PathBuf,
        note: String,
        output: PathBuf,
    },
}

/// Command-line options for the application.
struct CliOptions {
    command: Command,
    /// JSON file overriding the default synth settings.
    settings: Option<PathBuf>,
    /// Channel analysed by `analyze`.
    channel: u16,
    /// FFT window of `analyze`; must be a power of two.
    fft_size: usize,
    /// Length of the note rendered by `tone`.
    seconds: f64,
    /// Velocity of the note rendered by `tone`.
    velocity: u8,
    /// CSV report written by `extract`.
    csv: Option<PathBuf>,
}

fn print_help(program: &str) {
    eprintln!("wavesynth - MIDI, wavetable and audio analysis tool");
    eprintln!();
    eprintln!("Usage: {} <COMMAND> [OPTIONS]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  info <file>                          Describe a .mid, .sf2, .wtl or .wav file");
    eprintln!("  analyze <wav>                        Estimate pitch and volume of a WAV file");
    eprintln!("  render <mid> <library> <out.wav>     Render a MIDI file through a library");
    eprintln!("  extract <sf2> <out.wtl>              Convert a SoundFont to a .wtl library");
    eprintln!("  tone <library> <note> <out.wav>      Render one note (e.g. A4 or 69)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --settings PATH    Synth settings as JSON (render, tone)");
    eprintln!("  --channel N        Channel to analyse (default 0)");
    eprintln!("  --fft-size N       FFT window for analyze (default {})", ANALYZE_FFT_SIZE);
    eprintln!("  --seconds S        Note length for tone (default 1.0)");
    eprintln!("  --velocity V       Note velocity for tone (default 100)");
    eprintln!("  --csv PATH         Write a per-sample report when extracting");
    eprintln!("  -h, --help         Print this help message");
    eprintln!();
    eprintln!("A library is a .sf2, .wtl or .wav file.");
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map_or("wavesynth", String::as_str);

        let mut positional = Vec::new();
        let mut settings = None;
        let mut channel = 0;
        let mut fft_size = ANALYZE_FFT_SIZE;
        let mut seconds = 1.0;
        let mut velocity = 100;
        let mut csv = None;

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut value = || {
                i += 1;
                args.get(i)
                    .map(String::as_str)
                    .with_context(|| format!("{} requires a value", flag))
            };
            match flag {
                "--settings" => settings = Some(PathBuf::from(value()?)),
                "--channel" => channel = value()?.parse().context("Invalid --channel")?,
                "--fft-size" => fft_size = value()?.parse().context("Invalid --fft-size")?,
                "--seconds" => seconds = value()?.parse().context("Invalid --seconds")?,
                "--velocity" => velocity = value()?.parse().context("Invalid --velocity")?,
                "--csv" => csv = Some(PathBuf::from(value()?)),
                "--help" | "-h" => {
                    print_help(program);
                    std::process::exit(0);
                }
                other if other.starts_with("--") => {
                    bail!("Unknown option: {} (use --help for usage information)", other)
                }
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        let mut next = |what: &str| -> Result<String> {
            positional
                .next()
                .with_context(|| format!("Missing {} argument", what))
        };
        let command = match next("command")?.as_str() {
            "info" => Command::Info(next("file")?.into()),
            "analyze" => Command::Analyze(next("WAV file")?.into()),
            "render" => Command::Render {
                midi: next("MIDI file")?.into(),
                library: next("library")?.into(),
                output: next("output")?.into(),
            },
            "extract" => Command::Extract {
                soundfont: next("SoundFont")?.into(),
                output: next("output")?.into(),
            },
            "tone" => Command::Tone {
                library: next("library")?.into(),
                note: next("note")?,
                output: next("output")?.into(),
            },
            other => bail!("Unknown command: {} (use --help for usage information)", other),
        };

        Ok(Self {
            command,
            settings,
            channel,
            fft_size,
            seconds,
            velocity,
            csv,
        })
    }

    fn synth_settings(&self) -> Result<SynthSettings> {
        match &self.settings {
            Some(path) => SynthSettings::load(path)
                .with_context(|| format!("Failed to load settings: {}", path.display())),
            None => Ok(SynthSettings::default()),
        }
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Loads a library from a SoundFont, a saved library or a WAV clip.
fn load_library(path: &Path) -> Result<WavetableLibrary> {
    let library = match extension(path).as_str() {
        "sf2" => load_soundfont(path)?,
        "wtl" => WavetableLibrary::load(path)?,
        "wav" => {
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("sample");
            WavetableLibrary::from_audio(name, load_wav(path)?)?
        }
        other => bail!("Unsupported library format: .{}", other),
    };
    Ok(library)
}

fn ready_synth(options: &CliOptions, library_path: &Path) -> Result<SampleBasedSynth> {
    let library = load_library(library_path)
        .with_context(|| format!("Failed to load library: {}", library_path.display()))?;
    let mut synth = SampleBasedSynth::new(options.synth_settings()?);
    synth.set_wavetable_library(Arc::new(library));
    synth.initialize().context("Wavetable library is not playable")?;
    Ok(synth)
}

fn info(path: &Path) -> Result<()> {
    match extension(path).as_str() {
        "mid" | "midi" => {
            let document = MidiDocument::load(path)?;
            println!("{}", document);
            for index in 0..document.num_tracks() {
                let seconds = document.calculate_track_length_seconds(index)?;
                println!("Track {}: {:.2}s", index, seconds);
            }
        }
        "wav" => {
            let audio = load_wav(path)?;
            println!("{}", audio.format());
            println!("Duration: {:.3}s", audio.duration_seconds());
        }
        _ => {
            let library = load_library(path)?;
            println!("{}", library.info);
            println!("Samples: {}", library.len());
            for sample in library.samples() {
                println!("  {}", sample);
            }
        }
    }
    Ok(())
}

fn analyze(path: &Path, channel: u16, fft_size: usize) -> Result<()> {
    let audio: AudioData = load_wav(path)?;
    let wave = WaveForm::from_audio_data(&audio, channel)?;
    let graph = FrequencyGraph::from_waveform(&wave, fft_size)
        .with_context(|| format!("Failed to analyse {}", path.display()))?;

    println!("Duration:       {:.3}s", wave.timespan());
    println!("Average volume: {:.4}", wave.average_volume());
    if let Some(plot) = graph.strongest() {
        println!("Strongest bin:  {:.2} Hz ({:.1})", plot.frequency, plot.strength);
    }
    match graph.estimate_fundamental_frequency(DEFAULT_STRENGTH_THRESHOLD) {
        Some(hz) => {
            let pitch = wavesynth::midi::frequency_to_pitch(hz);
            let nearest = pitch.round().clamp(0.0, 127.0) as u8;
            println!(
                "Fundamental:    {:.2} Hz (nearest note {}, {:+.0} cents)",
                hz,
                note_to_name(nearest),
                (pitch - f64::from(nearest)) * 100.0
            );
        }
        None => println!("Fundamental:    none found"),
    }
    Ok(())
}

fn render(options: &CliOptions, midi: &Path, library: &Path, output: &Path) -> Result<()> {
    let document = MidiDocument::load(midi)
        .with_context(|| format!("Failed to load MIDI file: {}", midi.display()))?;
    let mut synth = ready_synth(options, library)?;

    let mut last_reported = -1;
    render_to_wav(
        &document,
        &mut synth,
        output,
        Some(|progress: f32| {
            let percent = (progress * 100.0) as i32;
            if percent / 10 != last_reported / 10 {
                eprintln!("Rendering... {}%", percent);
                last_reported = percent;
            }
        }),
    )?;
    synth.finalize();
    println!("Wrote {}", output.display());
    Ok(())
}

fn extract(soundfont: &Path, output: &Path, csv: Option<&Path>) -> Result<()> {
    let library = load_soundfont(soundfont)
        .with_context(|| format!("Failed to load SoundFont: {}", soundfont.display()))?;
    let report = library.validate();
    if !report.is_empty() {
        tracing::warn!("{}", report);
    }
    library.save(output)?;

    if let Some(csv) = csv {
        let mut file = std::fs::File::create(csv)
            .with_context(|| format!("Failed to create {}", csv.display()))?;
        library.write_csv(&mut file)?;
    }
    println!("Extracted {} sample(s) to {}", library.len(), output.display());
    Ok(())
}

fn tone(options: &CliOptions, library: &Path, note: &str, output: &Path) -> Result<()> {
    let key = name_to_note(note)
        .or_else(|| note.parse().ok().filter(|&key: &u8| key <= 127))
        .with_context(|| format!("Invalid note: {}", note))?;
    let mut synth = ready_synth(options, library)?;
    let settings = synth.settings().clone();

    let hold_buffers = (options.seconds / settings.buffer_seconds()).ceil() as usize;
    let tail_buffers = (1.0 / settings.buffer_seconds()).ceil() as usize;

    synth.note_on(0, key, options.velocity)?;
    let mut interleaved = Vec::new();
    for buffer in 0..hold_buffers + tail_buffers {
        if buffer == hold_buffers {
            synth.note_off(0, key)?;
        }
        synth.process()?;
        let (left, right) = synth.output();
        for (&l, &r) in left.iter().zip(right) {
            interleaved.push(l);
            interleaved.push(r);
        }
        if buffer >= hold_buffers && synth.active_note_count() == 0 {
            break;
        }
    }

    let audio = AudioData::from_f32_samples(2, settings.sample_rate, &interleaved);
    save_wav(&audio, output)?;
    println!(
        "Wrote {:.2}s of {} to {}",
        audio.duration_seconds(),
        note_to_name(key),
        output.display()
    );
    Ok(())
}

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = CliOptions::parse()?;
    match &options.command {
        Command::Info(path) => info(path),
        Command::Analyze(path) => analyze(path, options.channel, options.fft_size),
        Command::Render {
            midi,
            library,
            output,
        } => render(&options, midi, library, output),
        Command::Extract { soundfont, output } => {
            extract(soundfont, output, options.csv.as_deref())
        }
        Command::Tone {
            library,
            note,
            output,
        } => tone(&options, library, note, output),
    }
}
