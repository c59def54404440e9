//! Minimal RIFF/WAVE reader.
//!
//! Handles uncompressed PCM (8/16/24/32-bit integer) and 32-bit IEEE float,
//! including `WAVE_FORMAT_EXTENSIBLE` headers wrapping either. Samples come
//! out interleaved as `f32` in `[-1, 1]`. Anything else is rejected; there is
//! no decoder for compressed formats.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use crate::audio::PlaybackError;
use crate::core::model::extension_of;

const FORMAT_PCM: u16 = 1;
const FORMAT_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;
/// Real fmt chunks are 16, 18 or 40 bytes.
const MAX_FMT_CHUNK: u64 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    Int,
    Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub format: SampleFormat,
}

impl WavSpec {
    /// Bytes per sample.
    pub fn sample_width(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> usize {
        self.sample_width() as usize * self.channels as usize
    }
}

pub struct WavReader<R> {
    reader: R,
    spec: WavSpec,
    data_len: u64,
    consumed: u64,
}

impl WavReader<BufReader<File>> {
    /// Open a file, refusing anything without a `.wav` extension.
    pub fn open(path: &Path) -> Result<Self, PlaybackError> {
        let ext = extension_of(path);
        if ext != "wav" && ext != "wave" {
            return Err(PlaybackError::Unsupported(if ext.is_empty() {
                path.display().to_string()
            } else {
                ext
            }));
        }
        WavReader::new(BufReader::new(File::open(path)?))
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn parse_fmt(chunk: &[u8]) -> Result<WavSpec, PlaybackError> {
    if chunk.len() < 16 {
        return Err(PlaybackError::Malformed("fmt chunk too short".into()));
    }
    let mut tag = read_u16(chunk, 0);
    let channels = read_u16(chunk, 2);
    let sample_rate = read_u32(chunk, 4);
    let bits_per_sample = read_u16(chunk, 14);

    if tag == FORMAT_EXTENSIBLE {
        // Sub-format GUID starts at 24; its first two bytes are the real tag.
        if chunk.len() < 26 {
            return Err(PlaybackError::Malformed("extensible fmt chunk too short".into()));
        }
        tag = read_u16(chunk, 24);
    }

    let format = match (tag, bits_per_sample) {
        (FORMAT_PCM, 8 | 16 | 24 | 32) => SampleFormat::Int,
        (FORMAT_FLOAT, 32) => SampleFormat::Float,
        (tag, bits) => {
            return Err(PlaybackError::Unsupported(format!(
                "WAV format tag {tag:#06x} with {bits} bits per sample"
            )));
        }
    };
    if channels == 0 || sample_rate == 0 {
        return Err(PlaybackError::Malformed(format!(
            "{channels} channels at {sample_rate} Hz"
        )));
    }

    Ok(WavSpec {
        sample_rate,
        channels,
        bits_per_sample,
        format,
    })
}

impl<R: Read + Seek> WavReader<R> {
    /// Parse the header and position the reader at the first sample.
    pub fn new(mut reader: R) -> Result<Self, PlaybackError> {
        let mut riff = [0u8; 12];
        reader
            .read_exact(&mut riff)
            .map_err(|_| PlaybackError::Malformed("missing RIFF header".into()))?;
        if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
            return Err(PlaybackError::Malformed("not a RIFF/WAVE file".into()));
        }

        let mut spec = None;
        loop {
            let mut header = [0u8; 8];
            reader
                .read_exact(&mut header)
                .map_err(|_| PlaybackError::Malformed("no data chunk".into()))?;
            let size = read_u32(&header, 4) as u64;
            // Chunks are word-aligned.
            let padded = size + (size & 1);

            match &header[0..4] {
                b"fmt " => {
                    if size > MAX_FMT_CHUNK {
                        return Err(PlaybackError::Malformed(format!(
                            "fmt chunk of {size} bytes"
                        )));
                    }
                    let mut chunk = vec![0u8; size as usize];
                    reader.read_exact(&mut chunk).map_err(|_| {
                        PlaybackError::Malformed("truncated fmt chunk".into())
                    })?;
                    if size & 1 == 1 {
                        reader.seek(SeekFrom::Current(1))?;
                    }
                    spec = Some(parse_fmt(&chunk)?);
                }
                b"data" => {
                    let spec = spec.ok_or_else(|| {
                        PlaybackError::Malformed("data chunk before fmt chunk".into())
                    })?;
                    return Ok(Self {
                        reader,
                        spec,
                        data_len: size,
                        consumed: 0,
                    });
                }
                _ => {
                    reader.seek(SeekFrom::Current(padded as i64))?;
                }
            }
        }
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn frame_count(&self) -> u64 {
        self.data_len / self.spec.block_align() as u64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.frame_count() * 1_000_000_000 / self.spec.sample_rate as u64)
    }

    /// Read up to `max_frames` frames into `out` (cleared first). Returns
    /// the number of frames read; 0 means end of data.
    pub fn read_frames(&mut self, max_frames: usize, out: &mut Vec<f32>) -> Result<usize, PlaybackError> {
        out.clear();
        let block = self.spec.block_align();
        let remaining = self.data_len.saturating_sub(self.consumed);
        let want = (max_frames as u64 * block as u64).min(remaining);
        if want == 0 {
            return Ok(0);
        }

        let mut bytes = Vec::with_capacity(want as usize);
        (&mut self.reader).take(want).read_to_end(&mut bytes)?;
        self.consumed += bytes.len() as u64;
        // A truncated file may end mid-frame.
        let frames = bytes.len() / block;
        bytes.truncate(frames * block);

        let width = self.spec.sample_width() as usize;
        out.reserve(frames * self.spec.channels as usize);
        for sample in bytes.chunks_exact(width) {
            out.push(self.convert(sample));
        }
        if frames == 0 {
            // Header promised more data than the file holds.
            self.consumed = self.data_len;
        }
        Ok(frames)
    }

    fn convert(&self, s: &[u8]) -> f32 {
        match (self.spec.format, s.len()) {
            (SampleFormat::Float, 4) => f32::from_le_bytes([s[0], s[1], s[2], s[3]]),
            (SampleFormat::Int, 1) => (s[0] as f32 - 128.0) / 128.0,
            (SampleFormat::Int, 2) => i16::from_le_bytes([s[0], s[1]]) as f32 / 32_768.0,
            (SampleFormat::Int, 3) => {
                let v = i32::from_le_bytes([0, s[0], s[1], s[2]]) >> 8;
                v as f32 / 8_388_608.0
            }
            (SampleFormat::Int, 4) => {
                i32::from_le_bytes([s[0], s[1], s[2], s[3]]) as f32 / 2_147_483_648.0
            }
            _ => 0.0,
        }
    }
}

/// Duration of a WAV file, read from its header.
pub fn read_duration(path: &Path) -> Result<Duration, PlaybackError> {
    Ok(WavReader::open(path)?.duration())
}
