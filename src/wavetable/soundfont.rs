//! SoundFont 2 (`.sf2`) loading.
//!
//! Reads the INFO list, the 16-bit `smpl` PCM and the `pdta` hydra. Every
//! instrument zone reachable from a bank-0 preset becomes one
//! [`AudioSampleData`] whose instrument number is the preset number.
//!
//! # Limitations
//!
//! - 24-bit sample data (`sm24`) is not supported
//! - ROM samples are skipped
//! - Preset-level generators other than the instrument link are ignored

use super::{
    AudioSampleData, Chunk, ChannelType, GeneralInfo, Loop, Mode, Range, VersionTag,
    WavetableError, WavetableLibrary,
};
use crate::audio::{AudioData, AudioFormat, SampleType};
use crate::stream::{ByteOrderResolver, ByteReader, Endianness};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const SAMPLE_HEADER_LEN: usize = 46;
const PRESET_HEADER_LEN: usize = 38;
const INSTRUMENT_HEADER_LEN: usize = 22;
const BAG_LEN: usize = 4;
const GENERATOR_LEN: usize = 4;
const NAME_LEN: usize = 20;

const GEN_INSTRUMENT: u16 = 41;
const GEN_KEY_RANGE: u16 = 43;
const GEN_VEL_RANGE: u16 = 44;
const GEN_FINE_TUNE: u16 = 52;
const GEN_SAMPLE_ID: u16 = 53;
const GEN_SAMPLE_MODES: u16 = 54;
const GEN_ROOT_KEY: u16 = 58;

const SAMPLE_TYPE_RIGHT: u16 = 0x0002;
const SAMPLE_TYPE_LEFT: u16 = 0x0004;
const SAMPLE_TYPE_ROM: u16 = 0x8000;

fn little_endian() -> ByteOrderResolver {
    ByteOrderResolver::for_stream(Endianness::Little)
}

fn id_name(id: &'static [u8; 4]) -> &'static str {
    std::str::from_utf8(id).unwrap_or("????")
}

/// Decodes a NUL-padded fixed-width or chunk string.
fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

#[derive(Debug, Clone)]
struct SampleHeader {
    name: String,
    start: u32,
    end: u32,
    loop_start: u32,
    loop_end: u32,
    sample_rate: u32,
    original_pitch: u8,
    pitch_correction: i8,
    sample_type: u16,
}

impl SampleHeader {
    fn decode(record: &[u8]) -> Result<Self, WavetableError> {
        let order = little_endian();
        let mut reader = ByteReader::new(record);
        let name = text(reader.read_bytes(NAME_LEN)?);
        let start = reader.read_u32(order)?;
        let end = reader.read_u32(order)?;
        let loop_start = reader.read_u32(order)?;
        let loop_end = reader.read_u32(order)?;
        let sample_rate = reader.read_u32(order)?;
        let original_pitch = reader.read_u8()?;
        let pitch_correction = reader.read_u8()? as i8;
        let _sample_link = reader.read_u16(order)?;
        let sample_type = reader.read_u16(order)?;
        Ok(Self {
            name,
            start,
            end,
            loop_start,
            loop_end,
            sample_rate,
            original_pitch,
            pitch_correction,
            sample_type,
        })
    }

    fn channel_type(&self) -> ChannelType {
        if self.sample_type & SAMPLE_TYPE_LEFT != 0 {
            ChannelType::LeftEar
        } else if self.sample_type & SAMPLE_TYPE_RIGHT != 0 {
            ChannelType::RightEar
        } else {
            ChannelType::Mono
        }
    }

    /// Copies the sample's frames out of the `smpl` data.
    fn extract_audio(&self, pcm: &[u8]) -> Result<AudioData, WavetableError> {
        let available = pcm.len() / 2;
        if !(self.start <= self.end && self.end as usize <= available) {
            return Err(WavetableError::SampleBounds {
                name: self.name.clone(),
                start: self.start,
                end: self.end,
                available,
            });
        }
        let span = self.start..=self.end;
        if !span.contains(&self.loop_start) || !span.contains(&self.loop_end) {
            return Err(WavetableError::LoopBounds(self.name.clone()));
        }

        let bytes = pcm[self.start as usize * 2..self.end as usize * 2].to_vec();
        let format = AudioFormat::new(16, 1, self.sample_rate, SampleType::Signed);
        Ok(AudioData::new(format, bytes))
    }
}

#[derive(Debug, Clone, Copy)]
struct Generator {
    oper: u16,
    amount: [u8; 2],
}

impl Generator {
    fn decode(record: &[u8]) -> Result<Self, WavetableError> {
        let mut reader = ByteReader::new(record);
        let oper = reader.read_u16(little_endian())?;
        let amount = reader.read_array::<2>()?;
        Ok(Self { oper, amount })
    }

    fn unsigned(&self) -> u16 {
        u16::from_le_bytes(self.amount)
    }

    fn signed(&self) -> i16 {
        i16::from_le_bytes(self.amount)
    }

    fn range(&self) -> (u8, u8) {
        (self.amount[0], self.amount[1])
    }
}

/// Generator values of one zone that matter to the library.
#[derive(Debug, Clone, Copy, Default)]
struct ZoneSettings {
    key_range: Option<(u8, u8)>,
    vel_range: Option<(u8, u8)>,
    fine_tune: Option<i16>,
    root_key: Option<i16>,
    sample_modes: Option<u16>,
}

impl ZoneSettings {
    fn or(self, global: ZoneSettings) -> ZoneSettings {
        ZoneSettings {
            key_range: self.key_range.or(global.key_range),
            vel_range: self.vel_range.or(global.vel_range),
            fine_tune: self.fine_tune.or(global.fine_tune),
            root_key: self.root_key.or(global.root_key),
            sample_modes: self.sample_modes.or(global.sample_modes),
        }
    }
}

/// A zone and what it points at: a sample for instrument zones, an
/// instrument for preset zones.
#[derive(Debug, Clone, Copy)]
struct Zone {
    settings: ZoneSettings,
    target: u16,
}

/// Splits a chunk into fixed-size records.
fn records<'a>(
    root: &Chunk<'a>,
    id: &'static [u8; 4],
    record_len: usize,
) -> Result<Vec<&'a [u8]>, WavetableError> {
    let chunk = root
        .find(id)
        .ok_or(WavetableError::MissingChunk(id_name(id)))?;
    if chunk.data.len() % record_len != 0 {
        return Err(WavetableError::ChunkSize {
            id: id_name(id),
            len: chunk.data.len(),
            record: record_len,
        });
    }
    Ok(chunk.data.chunks_exact(record_len).collect())
}

fn read_u16_at(record: &[u8], offset: usize) -> Result<u16, WavetableError> {
    let mut reader = ByteReader::new(record);
    reader.skip(offset)?;
    Ok(reader.read_u16(little_endian())?)
}

/// Reads the zones of every header record but the terminal one.
///
/// A first zone without the `target_oper` generator is the global zone; its
/// settings become the defaults of the other zones.
fn read_zones<'a>(
    headers: &[&'a [u8]],
    bag_offset: usize,
    bag_id: &'static [u8; 4],
    bags: &[&[u8]],
    generators: &[Generator],
    target_oper: u16,
) -> Result<Vec<Vec<Zone>>, WavetableError> {
    let bag_index = |header: &[u8]| read_u16_at(header, bag_offset).map(usize::from);
    let generator_index = |bag: usize| -> Result<usize, WavetableError> {
        let record = bags.get(bag).ok_or(WavetableError::ZoneIndexOutOfRange {
            id: id_name(bag_id),
            index: bag,
        })?;
        Ok(usize::from(read_u16_at(record, 0)?))
    };

    let mut all_zones = Vec::new();
    for pair in headers.windows(2) {
        let (first_bag, end_bag) = (bag_index(pair[0])?, bag_index(pair[1])?);

        let mut global = ZoneSettings::default();
        let mut zones = Vec::new();
        for bag in first_bag..end_bag {
            let (first_gen, end_gen) = (generator_index(bag)?, generator_index(bag + 1)?);
            let gens = generators.get(first_gen..end_gen).ok_or(
                WavetableError::ZoneIndexOutOfRange {
                    id: id_name(bag_id),
                    index: bag,
                },
            )?;

            let mut settings = ZoneSettings::default();
            let mut target = None;
            for gen in gens {
                match gen.oper {
                    GEN_KEY_RANGE => settings.key_range = Some(gen.range()),
                    GEN_VEL_RANGE => settings.vel_range = Some(gen.range()),
                    GEN_FINE_TUNE => settings.fine_tune = Some(gen.signed()),
                    GEN_ROOT_KEY => settings.root_key = Some(gen.signed()),
                    GEN_SAMPLE_MODES => settings.sample_modes = Some(gen.unsigned()),
                    oper if oper == target_oper => target = Some(gen.unsigned()),
                    _ => {}
                }
            }

            match target {
                Some(target) => zones.push(Zone { settings, target }),
                None if bag == first_bag => global = settings,
                None => {}
            }
        }

        for zone in &mut zones {
            zone.settings = zone.settings.or(global);
        }
        all_zones.push(zones);
    }
    Ok(all_zones)
}

fn read_generators(root: &Chunk<'_>, id: &'static [u8; 4]) -> Result<Vec<Generator>, WavetableError> {
    records(root, id, GENERATOR_LEN)?
        .into_iter()
        .map(Generator::decode)
        .collect()
}

fn read_version(chunk: &Chunk<'_>, id: &'static str) -> Result<VersionTag, WavetableError> {
    if chunk.data.len() != 4 {
        return Err(WavetableError::ChunkLength {
            id,
            expected: 4,
            actual: chunk.data.len(),
        });
    }
    Ok(VersionTag {
        major: read_u16_at(chunk.data, 0)?,
        minor: read_u16_at(chunk.data, 2)?,
    })
}

fn read_info(root: &Chunk<'_>) -> Result<GeneralInfo, WavetableError> {
    let string = |id: &[u8; 4]| root.find(id).map(|c| text(c.data)).unwrap_or_default();

    let ifil = root
        .find(b"ifil")
        .ok_or(WavetableError::MissingChunk("ifil"))?;
    let bank_name = root
        .find(b"INAM")
        .ok_or(WavetableError::MissingChunk("INAM"))?;

    Ok(GeneralInfo {
        version: read_version(ifil, "ifil")?,
        rom_version: match root.find(b"iver") {
            Some(iver) => read_version(iver, "iver")?,
            None => VersionTag::default(),
        },
        sound_engine: string(b"isng"),
        rom_name: string(b"irom"),
        bank_name: text(bank_name.data),
        creation_date: string(b"ICRD"),
        engineers: string(b"IENG"),
        product: string(b"IPRD"),
        copyright: string(b"ICOP"),
        comments: string(b"ICMT"),
        tool: string(b"ISFT"),
    })
}

fn read_sample_headers(root: &Chunk<'_>) -> Result<Vec<SampleHeader>, WavetableError> {
    let mut headers = Vec::new();
    for record in records(root, b"shdr", SAMPLE_HEADER_LEN)? {
        let header = SampleHeader::decode(record)?;
        if header.name == "EOS" {
            return Ok(headers);
        }
        headers.push(header);
    }
    Err(WavetableError::UnterminatedSampleHeaders)
}

fn build_sample(
    header: &SampleHeader,
    settings: &ZoneSettings,
    instrument: u8,
    audio: AudioData,
) -> AudioSampleData {
    let original_pitch = settings
        .root_key
        .filter(|key| (0..=127).contains(key))
        .map(|key| key as i8)
        .or_else(|| i8::try_from(header.original_pitch).ok())
        .unwrap_or(-1);
    let (min_key, max_key) = settings.key_range.unwrap_or((0, 127));
    let (min_vel, max_vel) = settings.vel_range.unwrap_or((0, 127));

    let mut sample = AudioSampleData::new(header.name.clone(), audio);
    sample.character.instrument = instrument;
    sample.character.original_pitch = original_pitch;
    sample.character.fine_tune_cents =
        settings.fine_tune.unwrap_or(0) + i16::from(header.pitch_correction);
    sample.loop_points = Loop::new(
        u64::from(header.loop_start - header.start),
        u64::from(header.loop_end - header.start),
    );
    sample.mode = Mode::from_bits(settings.sample_modes.unwrap_or(0));
    sample.range = Range::new(min_key, max_key, min_vel, max_vel);
    sample.channel_type = header.channel_type();
    sample
}

/// Parses a SoundFont 2 bank held in memory.
///
/// # Arguments
///
/// * `data` - The file contents
///
/// # Returns
///
/// A library with one sample per instrument zone of every bank-0 preset
///
/// # Errors
///
/// Fails if the file isn't an `sfbk` RIFF, a required chunk is missing or
/// malformed, an index points outside its table, or a sample header lies
/// outside the sample data
pub fn read_soundfont(data: &[u8]) -> Result<WavetableLibrary, WavetableError> {
    let root = Chunk::parse(data)?;
    if root.form_type != Some(*b"sfbk") {
        return Err(WavetableError::UnexpectedForm {
            expected: "sfbk",
            found: root.form_name().unwrap_or_default(),
        });
    }

    let mut library = WavetableLibrary::new();
    library.info = read_info(&root)?;

    if root.find(b"sm24").is_some() {
        return Err(WavetableError::NotImplemented("24-bit sample data (sm24)"));
    }
    let pcm = root.find(b"smpl").map_or(&[][..], |chunk| chunk.data);

    let headers = read_sample_headers(&root)?;

    let instrument_headers = records(&root, b"inst", INSTRUMENT_HEADER_LEN)?;
    let instrument_bags = records(&root, b"ibag", BAG_LEN)?;
    let instrument_gens = read_generators(&root, b"igen")?;
    let instruments = read_zones(
        &instrument_headers,
        NAME_LEN,
        b"ibag",
        &instrument_bags,
        &instrument_gens,
        GEN_SAMPLE_ID,
    )?;

    let preset_headers = records(&root, b"phdr", PRESET_HEADER_LEN)?;
    let preset_bags = records(&root, b"pbag", BAG_LEN)?;
    let preset_gens = read_generators(&root, b"pgen")?;
    let presets = read_zones(
        &preset_headers,
        NAME_LEN + 4,
        b"pbag",
        &preset_bags,
        &preset_gens,
        GEN_INSTRUMENT,
    )?;

    let mut audio_cache: HashMap<u16, AudioData> = HashMap::new();
    for (header, zones) in preset_headers.iter().zip(&presets) {
        let name = text(&header[..NAME_LEN]);
        let number = read_u16_at(header, NAME_LEN)?;
        let bank = read_u16_at(header, NAME_LEN + 2)?;
        let instrument = match (bank, u8::try_from(number)) {
            (0, Ok(instrument)) if instrument <= 127 => instrument,
            _ => {
                tracing::debug!("Skipping preset \"{}\" (bank {}, number {})", name, bank, number);
                continue;
            }
        };

        for preset_zone in zones {
            let instrument_zones = instruments
                .get(usize::from(preset_zone.target))
                .ok_or(WavetableError::InstrumentIdOutOfRange(preset_zone.target))?;

            for zone in instrument_zones {
                let sample_header = headers
                    .get(usize::from(zone.target))
                    .ok_or(WavetableError::SampleIdOutOfRange(zone.target))?;
                if sample_header.sample_type & SAMPLE_TYPE_ROM != 0 {
                    tracing::debug!("Skipping ROM sample \"{}\"", sample_header.name);
                    continue;
                }

                let audio = match audio_cache.get(&zone.target) {
                    Some(audio) => audio.clone(),
                    None => {
                        let audio = sample_header.extract_audio(pcm)?;
                        audio_cache.insert(zone.target, audio.clone());
                        audio
                    }
                };
                library.add_sample(build_sample(
                    sample_header,
                    &zone.settings,
                    instrument,
                    audio,
                ));
            }
        }
    }

    tracing::info!(
        "Loaded SoundFont \"{}\" with {} sample(s) across {} instrument(s)",
        library.info.bank_name,
        library.len(),
        library.instruments().len()
    );
    Ok(library)
}

/// Loads a SoundFont 2 bank from a file.
///
/// # Errors
///
/// Fails if the file can't be read or parsed
pub fn load_soundfont<P: AsRef<Path>>(path: P) -> Result<WavetableLibrary, WavetableError> {
    let data = fs::read(path.as_ref())?;
    tracing::debug!("Read {} bytes from {}", data.len(), path.as_ref().display());
    read_soundfont(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavetable::riff::tests::{leaf, list};

    fn name_field(name: &str) -> Vec<u8> {
        let mut field = name.as_bytes().to_vec();
        field.resize(NAME_LEN, 0);
        field
    }

    #[allow(clippy::too_many_arguments)]
    fn shdr(
        name: &str,
        start: u32,
        end: u32,
        loop_start: u32,
        loop_end: u32,
        rate: u32,
        pitch: u8,
        correction: i8,
        sample_type: u16,
    ) -> Vec<u8> {
        let mut record = name_field(name);
        for value in [start, end, loop_start, loop_end, rate] {
            record.extend_from_slice(&value.to_le_bytes());
        }
        record.push(pitch);
        record.push(correction as u8);
        record.extend_from_slice(&0u16.to_le_bytes());
        record.extend_from_slice(&sample_type.to_le_bytes());
        record
    }

    fn phdr(name: &str, number: u16, bank: u16, bag: u16) -> Vec<u8> {
        let mut record = name_field(name);
        for value in [number, bank, bag] {
            record.extend_from_slice(&value.to_le_bytes());
        }
        record.extend_from_slice(&[0; 12]);
        record
    }

    fn inst(name: &str, bag: u16) -> Vec<u8> {
        let mut record = name_field(name);
        record.extend_from_slice(&bag.to_le_bytes());
        record
    }

    fn bags(indices: &[u16]) -> Vec<u8> {
        indices
            .iter()
            .flat_map(|&i| [i.to_le_bytes(), [0, 0]].concat())
            .collect()
    }

    fn gens(entries: &[(u16, [u8; 2])]) -> Vec<u8> {
        entries
            .iter()
            .flat_map(|(oper, amount)| [oper.to_le_bytes(), *amount].concat())
            .collect()
    }

    fn info(with_name: bool) -> Vec<u8> {
        let mut children = vec![leaf(b"ifil", &[2, 0, 1, 0])];
        if with_name {
            children.push(leaf(b"INAM", b"Test Bank\0"));
        }
        children.push(leaf(b"ICOP", b"Nobody\0"));
        list(b"LIST", b"INFO", &children)
    }

    fn pcm() -> Vec<u8> {
        (0..100i16).flat_map(|i| (i * 300).to_le_bytes()).collect()
    }

    fn headers() -> Vec<u8> {
        [
            shdr("sine", 0, 40, 10, 30, 22050, 60, 0, 1),
            shdr("left", 40, 100, 40, 40, 44100, 72, -5, 4),
            shdr("right", 40, 100, 40, 40, 44100, 72, -5, 2),
            shdr("EOS", 0, 0, 0, 0, 0, 0, 0, 0),
        ]
        .concat()
    }

    fn hydra(shdr_data: Vec<u8>) -> Vec<u8> {
        let presets = [
            phdr("Lead", 5, 0, 0),
            phdr("Drums", 0, 128, 1),
            phdr("Pad", 7, 0, 2),
            phdr("EOP", 0, 0, 3),
        ]
        .concat();
        let instruments = [inst("Sine", 0), inst("Stereo", 2), inst("EOI", 4)].concat();
        list(
            b"LIST",
            b"pdta",
            &[
                leaf(b"phdr", &presets),
                leaf(b"pbag", &bags(&[0, 1, 2, 3])),
                leaf(
                    b"pgen",
                    &gens(&[(41, [0, 0]), (41, [1, 0]), (41, [1, 0]), (0, [0, 0])]),
                ),
                leaf(b"inst", &instruments),
                leaf(b"ibag", &bags(&[0, 2, 6, 8, 9])),
                leaf(
                    b"igen",
                    &gens(&[
                        (54, [1, 0]),
                        (52, [3, 0]),
                        (43, [40, 80]),
                        (44, [10, 100]),
                        (58, [62, 0]),
                        (53, [0, 0]),
                        (54, [3, 0]),
                        (53, [1, 0]),
                        (53, [2, 0]),
                        (0, [0, 0]),
                    ]),
                ),
                leaf(b"shdr", &shdr_data),
            ],
        )
    }

    fn bank(info_list: Vec<u8>, sdta_children: &[Vec<u8>], shdr_data: Vec<u8>) -> Vec<u8> {
        list(
            b"RIFF",
            b"sfbk",
            &[
                info_list,
                list(b"LIST", b"sdta", sdta_children),
                hydra(shdr_data),
            ],
        )
    }

    fn good_bank() -> Vec<u8> {
        bank(info(true), &[leaf(b"smpl", &pcm())], headers())
    }

    #[test]
    fn test_reads_info() {
        let library = read_soundfont(&good_bank()).unwrap();
        assert_eq!(library.info.bank_name, "Test Bank");
        assert_eq!(library.info.copyright, "Nobody");
        assert_eq!(library.info.version, VersionTag { major: 2, minor: 1 });
        assert_eq!(library.info.comments, "");
    }

    #[test]
    fn test_maps_presets_to_instruments() {
        let library = read_soundfont(&good_bank()).unwrap();
        // The bank-128 preset is skipped
        assert_eq!(library.len(), 3);
        assert_eq!(library.instruments().into_iter().collect::<Vec<_>>(), vec![5, 7]);

        let sine = &library.samples()[0];
        assert_eq!(sine.name, "sine");
        assert_eq!(sine.character.instrument, 5);
        assert_eq!(sine.character.original_pitch, 62);
        assert_eq!(sine.character.fine_tune_cents, 3);
        assert_eq!(sine.mode, Mode::GetsTrappedInLoop);
        assert_eq!(sine.range, Range::new(40, 80, 10, 100));
        assert_eq!(sine.loop_points, Loop::new(10, 30));
        assert_eq!(sine.channel_type, ChannelType::Mono);
        assert_eq!(sine.frame_count(), 40);
        assert_eq!(sine.audio.format().frames_per_second, 22050);
        assert_eq!(&sine.audio.buffer()[2..4], &300i16.to_le_bytes());

        let left = &library.samples()[1];
        assert_eq!(left.character.instrument, 7);
        assert_eq!(left.character.original_pitch, 72);
        assert_eq!(left.character.fine_tune_cents, -5);
        assert_eq!(left.mode, Mode::ExitLoopOnRelease);
        assert_eq!(left.channel_type, ChannelType::LeftEar);
        assert_eq!(left.range, Range::default());
        assert_eq!(left.loop_points, Loop::new(0, 0));

        let right = &library.samples()[2];
        assert_eq!(right.mode, Mode::NotLooped);
        assert_eq!(right.channel_type, ChannelType::RightEar);
        assert_eq!(right.frame_count(), 60);

        assert!(library.validate().is_empty());
    }

    #[test]
    fn test_missing_bank_name() {
        let data = bank(info(false), &[leaf(b"smpl", &pcm())], headers());
        assert!(matches!(
            read_soundfont(&data),
            Err(WavetableError::MissingChunk("INAM"))
        ));
    }

    #[test]
    fn test_sample_outside_data() {
        let short_pcm = pcm()[..100].to_vec();
        let data = bank(info(true), &[leaf(b"smpl", &short_pcm)], headers());
        assert!(matches!(
            read_soundfont(&data),
            Err(WavetableError::SampleBounds { available: 50, .. })
        ));
    }

    #[test]
    fn test_bad_loop() {
        let shdr_data = [
            shdr("sine", 0, 40, 10, 50, 22050, 60, 0, 1),
            shdr("left", 40, 100, 40, 40, 44100, 72, 0, 4),
            shdr("right", 40, 100, 40, 40, 44100, 72, 0, 2),
            shdr("EOS", 0, 0, 0, 0, 0, 0, 0, 0),
        ]
        .concat();
        let data = bank(info(true), &[leaf(b"smpl", &pcm())], shdr_data);
        assert!(matches!(read_soundfont(&data), Err(WavetableError::LoopBounds(name)) if name == "sine"));
    }

    #[test]
    fn test_unterminated_headers() {
        let shdr_data = shdr("sine", 0, 40, 10, 30, 22050, 60, 0, 1);
        let data = bank(info(true), &[leaf(b"smpl", &pcm())], shdr_data);
        assert!(matches!(
            read_soundfont(&data),
            Err(WavetableError::UnterminatedSampleHeaders)
        ));
    }

    #[test]
    fn test_sm24_unsupported() {
        let data = bank(
            info(true),
            &[leaf(b"smpl", &pcm()), leaf(b"sm24", &[0; 100])],
            headers(),
        );
        assert!(matches!(
            read_soundfont(&data),
            Err(WavetableError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_wrong_form_type() {
        let data = list(b"RIFF", b"WAVE", &[leaf(b"fmt ", &[0; 16])]);
        assert!(matches!(
            read_soundfont(&data),
            Err(WavetableError::UnexpectedForm { expected: "sfbk", .. })
        ));
    }

    #[test]
    fn test_rom_samples_skipped() {
        let shdr_data = [
            shdr("sine", 0, 40, 10, 30, 22050, 60, 0, 0x8001),
            shdr("left", 40, 100, 40, 40, 44100, 72, 0, 4),
            shdr("right", 40, 100, 40, 40, 44100, 72, 0, 2),
            shdr("EOS", 0, 0, 0, 0, 0, 0, 0, 0),
        ]
        .concat();
        let data = bank(info(true), &[leaf(b"smpl", &pcm())], shdr_data);
        let library = read_soundfont(&data).unwrap();
        assert_eq!(library.len(), 2);
        assert!(library.find_audio_sample(5, 60, 64).is_none());
    }
}
