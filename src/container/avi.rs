//! RIFF AVI writer with OpenDML extensions
//!
//! The header is written up front with placeholder sizes and patched in
//! `finish()`. Chunks are appended to the current `movi` list in the order
//! they are written, so callers that interleave audio and video simply write
//! them as they arrive.
//!
//! A file starts with a `RIFF 'AVI '` part carrying the legacy `idx1` index.
//! When a part reaches `part_limit` it is closed and writing continues in a
//! `RIFF 'AVIX'` part. Every part ends with one `ix##` standard index per
//! stream, and the `indx` super index in each stream header points at them,
//! so recordings are not bound by the 4 GiB RIFF size.

use super::ContainerError;
use crate::capture::traits::AudioFormat;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// Index flag marking a chunk decodable on its own
pub const AVIIF_KEYFRAME: u32 = 0x10;

/// Size at which a RIFF part is closed and the next one begins
pub const DEFAULT_PART_LIMIT: u64 = 1 << 30;

/// Super index slots reserved per stream; one is used per RIFF part
pub const SUPER_INDEX_SLOTS: u32 = 256;

/// Set on a standard index entry's size when the chunk is not a key frame
pub const STD_INDEX_DELTA_FRAME: u32 = 0x8000_0000;

const AVIF_HASINDEX: u32 = 0x10;
const AVIF_ISINTERLEAVED: u32 = 0x100;

const AVI_INDEX_OF_INDEXES: u8 = 0x00;
const AVI_INDEX_OF_CHUNKS: u8 = 0x01;

const MAIN_HEADER_SIZE: u32 = 56;
const STREAM_HEADER_SIZE: u32 = 56;
const BITMAP_INFO_SIZE: u32 = 40;
const WAVE_FORMAT_SIZE: u32 = 18;
const DMLH_SIZE: u32 = 248;
const INDEX_HEADER_SIZE: u32 = 24;
const SUPER_INDEX_ENTRY_SIZE: u32 = 16;
const STD_INDEX_ENTRY_SIZE: u32 = 8;
const IDX1_ENTRY_SIZE: u64 = 16;

const WAVE_FORMAT_PCM: u16 = 1;

/// Declaration of one stream in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSpec {
    /// Uncompressed 32 bpp video
    Video { width: u32, height: u32 },
    /// PCM audio
    Audio(AudioFormat),
}

/// Container-level settings
#[derive(Debug, Clone)]
pub struct AviConfig {
    /// Nominal frame rate written to the headers
    pub frames_per_second: u32,
    pub streams: Vec<StreamSpec>,
    /// RIFF part size that triggers a new `AVIX` part
    pub part_limit: u64,
}

impl AviConfig {
    pub fn new(frames_per_second: u32, streams: Vec<StreamSpec>) -> Self {
        Self {
            frames_per_second,
            streams,
            part_limit: DEFAULT_PART_LIMIT,
        }
    }
}

/// Index of a declared stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub usize);

/// Totals reported when the container is finalized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Chunks written per stream
    pub chunks: Vec<u32>,
    /// Payload bytes written per stream
    pub bytes: Vec<u64>,
    /// Video frames in the first video stream
    pub total_frames: u32,
    /// RIFF parts in the file, the first `AVI ` part included
    pub riff_parts: u32,
    pub file_bytes: u64,
}

/// Bytes in one uncompressed 32 bpp frame
fn frame_bytes(width: u32, height: u32) -> u64 {
    width as u64 * height as u64 * 4
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// A chunk of the part being written, as the standard index sees it
#[derive(Debug, Clone, Copy)]
struct ChunkRef {
    /// Absolute offset of the chunk payload
    offset: u64,
    size: u32,
    key_frame: bool,
}

#[derive(Debug, Clone, Copy)]
struct SuperIndexEntry {
    offset: u64,
    size: u32,
    duration: u32,
}

#[derive(Debug)]
struct StreamState {
    spec: StreamSpec,
    chunk_id: [u8; 4],
    index_id: [u8; 4],
    length_pos: u64,
    buffer_size_pos: u64,
    super_index_pos: u64,
    chunks: u32,
    bytes: u64,
    max_chunk: u32,
    part: Vec<ChunkRef>,
    super_index: Vec<SuperIndexEntry>,
}

impl StreamState {
    /// Stream length in `strh` units: frames for video, sample frames for audio
    fn duration_of(&self, chunks: u64, bytes: u64) -> u32 {
        match self.spec {
            StreamSpec::Video { .. } => clamp_u32(chunks),
            StreamSpec::Audio(format) => clamp_u32(bytes / format.block_align().max(1) as u64),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    chunk_id: [u8; 4],
    flags: u32,
    offset: u32,
    size: u32,
}

/// Streaming AVI writer over any seekable sink
pub struct AviWriter<W: Write + Seek> {
    out: W,
    streams: Vec<StreamState>,
    /// `idx1` entries, kept only while the first part is open
    legacy_index: Vec<IndexEntry>,
    part_limit: u64,
    parts: u32,
    part_start: u64,
    riff_size_pos: u64,
    movi_size_pos: u64,
    movi_fourcc_pos: u64,
    total_frames_pos: u64,
    odml_frames_pos: u64,
    main_buffer_size_pos: u64,
    first_part_frames: u32,
    position: u64,
}

impl AviWriter<BufWriter<File>> {
    /// Create the file at `path` and write the stream headers
    pub fn create(path: &Path, config: &AviConfig) -> Result<Self, ContainerError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), config)
    }
}

impl<W: Write + Seek> AviWriter<W> {
    /// Write the RIFF header, stream declarations, and open the `movi` list
    pub fn new(mut out: W, config: &AviConfig) -> Result<Self, ContainerError> {
        if config.frames_per_second == 0 {
            return Err(ContainerError::Invalid("frame rate must be non-zero".to_string()));
        }
        if config.streams.is_empty() || config.streams.len() > 99 {
            return Err(ContainerError::Invalid(format!(
                "unsupported stream count {}",
                config.streams.len()
            )));
        }
        if config.part_limit == 0 || config.part_limit > u32::MAX as u64 {
            return Err(ContainerError::Invalid(format!(
                "RIFF part limit {} out of range",
                config.part_limit
            )));
        }
        for spec in &config.streams {
            if let StreamSpec::Video { width, height } = spec {
                if frame_bytes(*width, *height) > u32::MAX as u64 {
                    return Err(ContainerError::Invalid(format!(
                        "{}x{} frames do not fit in a chunk",
                        width, height
                    )));
                }
            }
        }

        let (width, height) = config
            .streams
            .iter()
            .find_map(|s| match s {
                StreamSpec::Video { width, height } => Some((*width, *height)),
                StreamSpec::Audio(_) => None,
            })
            .unwrap_or((0, 0));

        let start = out.stream_position()?;
        let mut header = Vec::new();

        put_fourcc(&mut header, b"RIFF");
        let riff_size_pos = start + header.len() as u64;
        put_u32(&mut header, 0);
        put_fourcc(&mut header, b"AVI ");

        // hdrl list
        put_fourcc(&mut header, b"LIST");
        let hdrl_size_idx = header.len();
        put_u32(&mut header, 0);
        put_fourcc(&mut header, b"hdrl");

        put_fourcc(&mut header, b"avih");
        put_u32(&mut header, MAIN_HEADER_SIZE);
        put_u32(&mut header, 1_000_000 / config.frames_per_second);
        let max_bytes_per_sec = config
            .streams
            .iter()
            .map(|s| match s {
                StreamSpec::Video { width, height } => {
                    frame_bytes(*width, *height).saturating_mul(config.frames_per_second as u64)
                }
                StreamSpec::Audio(format) => format.bytes_per_second() as u64,
            })
            .fold(0u64, u64::saturating_add);
        put_u32(&mut header, clamp_u32(max_bytes_per_sec));
        put_u32(&mut header, 0); // padding granularity
        put_u32(&mut header, AVIF_HASINDEX | AVIF_ISINTERLEAVED);
        let total_frames_pos = start + header.len() as u64;
        put_u32(&mut header, 0);
        put_u32(&mut header, 0); // initial frames
        put_u32(&mut header, config.streams.len() as u32);
        let main_buffer_size_pos = start + header.len() as u64;
        put_u32(&mut header, 0);
        put_u32(&mut header, width);
        put_u32(&mut header, height);
        for _ in 0..4 {
            put_u32(&mut header, 0);
        }

        let indx_size = INDEX_HEADER_SIZE + SUPER_INDEX_SLOTS * SUPER_INDEX_ENTRY_SIZE;

        let mut streams = Vec::with_capacity(config.streams.len());
        for (index, spec) in config.streams.iter().enumerate() {
            let suffix: &[u8; 2] = match spec {
                StreamSpec::Video { .. } => b"db",
                StreamSpec::Audio(_) => b"wb",
            };
            let digits = format!("{:02}", index);
            let digits = digits.as_bytes();
            let chunk_id = [digits[0], digits[1], suffix[0], suffix[1]];
            let index_id = [b'i', b'x', digits[0], digits[1]];

            put_fourcc(&mut header, b"LIST");
            let strf_size = match spec {
                StreamSpec::Video { .. } => BITMAP_INFO_SIZE,
                StreamSpec::Audio(_) => WAVE_FORMAT_SIZE,
            };
            put_u32(
                &mut header,
                4 + 8 + STREAM_HEADER_SIZE + 8 + strf_size + 8 + indx_size,
            );
            put_fourcc(&mut header, b"strl");

            put_fourcc(&mut header, b"strh");
            put_u32(&mut header, STREAM_HEADER_SIZE);
            let (length_pos, buffer_size_pos) = match spec {
                StreamSpec::Video { width, height } => {
                    put_fourcc(&mut header, b"vids");
                    put_fourcc(&mut header, b"DIB ");
                    put_u32(&mut header, 0); // flags
                    put_u16(&mut header, 0); // priority
                    put_u16(&mut header, 0); // language
                    put_u32(&mut header, 0); // initial frames
                    put_u32(&mut header, 1); // scale
                    put_u32(&mut header, config.frames_per_second); // rate
                    put_u32(&mut header, 0); // start
                    let length_pos = start + header.len() as u64;
                    put_u32(&mut header, 0);
                    let buffer_size_pos = start + header.len() as u64;
                    put_u32(&mut header, 0);
                    put_u32(&mut header, u32::MAX); // quality: default
                    put_u32(&mut header, 0); // sample size: variable
                    put_rect(&mut header, *width, *height);
                    (length_pos, buffer_size_pos)
                }
                StreamSpec::Audio(format) => {
                    put_fourcc(&mut header, b"auds");
                    put_u32(&mut header, 0); // handler
                    put_u32(&mut header, 0);
                    put_u16(&mut header, 0);
                    put_u16(&mut header, 0);
                    put_u32(&mut header, 0);
                    put_u32(&mut header, format.block_align() as u32);
                    put_u32(&mut header, format.bytes_per_second());
                    put_u32(&mut header, 0);
                    let length_pos = start + header.len() as u64;
                    put_u32(&mut header, 0);
                    let buffer_size_pos = start + header.len() as u64;
                    put_u32(&mut header, 0);
                    put_u32(&mut header, u32::MAX);
                    put_u32(&mut header, format.block_align() as u32);
                    put_rect(&mut header, 0, 0);
                    (length_pos, buffer_size_pos)
                }
            };

            put_fourcc(&mut header, b"strf");
            put_u32(&mut header, strf_size);
            match spec {
                StreamSpec::Video { width, height } => {
                    put_u32(&mut header, BITMAP_INFO_SIZE);
                    put_u32(&mut header, *width);
                    // Positive height: rows are stored bottom-up
                    put_u32(&mut header, *height);
                    put_u16(&mut header, 1); // planes
                    put_u16(&mut header, 32); // bit count
                    put_u32(&mut header, 0); // BI_RGB
                    put_u32(&mut header, clamp_u32(frame_bytes(*width, *height)));
                    for _ in 0..4 {
                        put_u32(&mut header, 0);
                    }
                }
                StreamSpec::Audio(format) => {
                    put_u16(&mut header, WAVE_FORMAT_PCM);
                    put_u16(&mut header, format.channels);
                    put_u32(&mut header, format.sample_rate);
                    put_u32(&mut header, format.bytes_per_second());
                    put_u16(&mut header, format.block_align());
                    put_u16(&mut header, format.bits_per_sample);
                    put_u16(&mut header, 0); // cbSize
                }
            }

            // Super index, entries filled in by finish()
            put_fourcc(&mut header, b"indx");
            put_u32(&mut header, indx_size);
            let super_index_pos = start + header.len() as u64;
            put_u16(&mut header, 4); // longs per entry
            header.push(0); // sub type
            header.push(AVI_INDEX_OF_INDEXES);
            put_u32(&mut header, 0); // entries in use
            put_fourcc(&mut header, &chunk_id);
            for _ in 0..3 {
                put_u32(&mut header, 0);
            }
            header.resize(header.len() + (SUPER_INDEX_SLOTS * SUPER_INDEX_ENTRY_SIZE) as usize, 0);

            streams.push(StreamState {
                spec: *spec,
                chunk_id,
                index_id,
                length_pos,
                buffer_size_pos,
                super_index_pos,
                chunks: 0,
                bytes: 0,
                max_chunk: 0,
                part: Vec::new(),
                super_index: Vec::new(),
            });
        }

        // OpenDML extended header: total frames across all parts
        put_fourcc(&mut header, b"LIST");
        put_u32(&mut header, 4 + 8 + DMLH_SIZE);
        put_fourcc(&mut header, b"odml");
        put_fourcc(&mut header, b"dmlh");
        put_u32(&mut header, DMLH_SIZE);
        let odml_frames_pos = start + header.len() as u64;
        header.resize(header.len() + DMLH_SIZE as usize, 0);

        let hdrl_size = (header.len() - hdrl_size_idx - 4) as u32;
        header[hdrl_size_idx..hdrl_size_idx + 4].copy_from_slice(&hdrl_size.to_le_bytes());

        put_fourcc(&mut header, b"LIST");
        let movi_size_pos = start + header.len() as u64;
        put_u32(&mut header, 0);
        let movi_fourcc_pos = start + header.len() as u64;
        put_fourcc(&mut header, b"movi");

        out.write_all(&header)?;
        let position = start + header.len() as u64;

        Ok(Self {
            out,
            streams,
            legacy_index: Vec::new(),
            part_limit: config.part_limit,
            parts: 1,
            part_start: start,
            riff_size_pos,
            movi_size_pos,
            movi_fourcc_pos,
            total_frames_pos,
            odml_frames_pos,
            main_buffer_size_pos,
            first_part_frames: 0,
            position,
        })
    }

    /// Append one video frame (bottom-up rows, `width * height * 4` bytes)
    pub fn write_video_frame(
        &mut self,
        stream: StreamId,
        data: &[u8],
        key_frame: bool,
    ) -> Result<(), ContainerError> {
        let state = self
            .streams
            .get(stream.0)
            .ok_or(ContainerError::UnknownStream(stream.0))?;
        match state.spec {
            StreamSpec::Video { width, height } => {
                let expected = frame_bytes(width, height);
                if data.len() as u64 != expected {
                    return Err(ContainerError::InvalidFrame(format!(
                        "expected {} bytes, got {}",
                        expected,
                        data.len()
                    )));
                }
            }
            StreamSpec::Audio(_) => return Err(ContainerError::StreamKind(stream.0)),
        }
        self.write_chunk(stream, data, key_frame)
    }

    /// Append a block of PCM audio
    pub fn write_audio(&mut self, stream: StreamId, data: &[u8]) -> Result<(), ContainerError> {
        let state = self
            .streams
            .get(stream.0)
            .ok_or(ContainerError::UnknownStream(stream.0))?;
        if !matches!(state.spec, StreamSpec::Audio(_)) {
            return Err(ContainerError::StreamKind(stream.0));
        }
        if data.is_empty() {
            return Ok(());
        }
        self.write_chunk(stream, data, true)
    }

    /// Bytes the current part would hold after a chunk of `padded` bytes,
    /// counting the indexes that close it
    fn projected_part_size(&self, padded: u64) -> u64 {
        let mut size = self.position - self.part_start + 8 + padded;
        for state in &self.streams {
            if !state.part.is_empty() {
                size += 8 + INDEX_HEADER_SIZE as u64
                    + state.part.len() as u64 * STD_INDEX_ENTRY_SIZE as u64;
            }
        }
        // The new chunk's own index entry, possibly in a fresh ix chunk
        size += 8 + INDEX_HEADER_SIZE as u64 + STD_INDEX_ENTRY_SIZE as u64;
        if self.parts == 1 {
            size += 8 + (self.legacy_index.len() as u64 + 1) * IDX1_ENTRY_SIZE;
        }
        size
    }

    fn write_chunk(
        &mut self,
        stream: StreamId,
        data: &[u8],
        key_frame: bool,
    ) -> Result<(), ContainerError> {
        let size = u32::try_from(data.len()).map_err(|_| ContainerError::TooLarge)?;
        let padded = data.len() as u64 + (data.len() as u64 & 1);

        let part_has_chunks = self.streams.iter().any(|s| !s.part.is_empty());
        if part_has_chunks && self.projected_part_size(padded) > self.part_limit {
            if self.parts >= SUPER_INDEX_SLOTS {
                return Err(ContainerError::TooLarge);
            }
            self.close_part()?;
            self.open_part()?;
        }

        let chunk_id = self.streams[stream.0].chunk_id;
        let chunk_pos = self.position;

        self.out.write_all(&chunk_id)?;
        self.out.write_all(&size.to_le_bytes())?;
        self.out.write_all(data)?;
        if data.len() % 2 == 1 {
            self.out.write_all(&[0])?;
        }
        self.position += 8 + padded;

        if self.parts == 1 {
            self.legacy_index.push(IndexEntry {
                chunk_id,
                flags: if key_frame { AVIIF_KEYFRAME } else { 0 },
                offset: (chunk_pos - self.movi_fourcc_pos) as u32,
                size,
            });
        }

        let state = &mut self.streams[stream.0];
        state.chunks += 1;
        state.bytes += data.len() as u64;
        state.max_chunk = state.max_chunk.max(size);
        state.part.push(ChunkRef {
            offset: chunk_pos + 8,
            size,
            key_frame,
        });
        Ok(())
    }

    /// Write the part's standard indexes (and `idx1` for the first part),
    /// then patch its `movi` and RIFF sizes
    fn close_part(&mut self) -> Result<(), ContainerError> {
        let base = self.movi_fourcc_pos;
        let mut tail = Vec::new();

        for state in &mut self.streams {
            if state.part.is_empty() {
                continue;
            }
            let ix_pos = self.position + tail.len() as u64;
            let body_size = INDEX_HEADER_SIZE + state.part.len() as u32 * STD_INDEX_ENTRY_SIZE;
            put_fourcc(&mut tail, &state.index_id);
            put_u32(&mut tail, body_size);
            put_u16(&mut tail, 2); // longs per entry
            tail.push(0); // sub type
            tail.push(AVI_INDEX_OF_CHUNKS);
            put_u32(&mut tail, state.part.len() as u32);
            put_fourcc(&mut tail, &state.chunk_id);
            put_u64(&mut tail, base);
            put_u32(&mut tail, 0);
            for chunk in &state.part {
                put_u32(&mut tail, (chunk.offset - base) as u32);
                let size = if chunk.key_frame {
                    chunk.size
                } else {
                    chunk.size | STD_INDEX_DELTA_FRAME
                };
                put_u32(&mut tail, size);
            }

            let part_bytes: u64 = state.part.iter().map(|c| c.size as u64).sum();
            let duration = state.duration_of(state.part.len() as u64, part_bytes);
            state.super_index.push(SuperIndexEntry {
                offset: ix_pos,
                size: 8 + body_size,
                duration,
            });
            state.part.clear();
        }

        self.out.write_all(&tail)?;
        self.position += tail.len() as u64;
        let movi_size =
            u32::try_from(self.position - self.movi_fourcc_pos).map_err(|_| ContainerError::TooLarge)?;

        if self.parts == 1 {
            self.first_part_frames = self.video_frames();
            let entries = std::mem::take(&mut self.legacy_index);
            let mut idx1 = Vec::with_capacity(8 + entries.len() * IDX1_ENTRY_SIZE as usize);
            put_fourcc(&mut idx1, b"idx1");
            put_u32(&mut idx1, clamp_u32(entries.len() as u64 * IDX1_ENTRY_SIZE));
            for entry in &entries {
                idx1.extend_from_slice(&entry.chunk_id);
                put_u32(&mut idx1, entry.flags);
                put_u32(&mut idx1, entry.offset);
                put_u32(&mut idx1, entry.size);
            }
            self.out.write_all(&idx1)?;
            self.position += idx1.len() as u64;
        }

        let part_end = self.position;
        let riff_size =
            u32::try_from(part_end - self.riff_size_pos - 4).map_err(|_| ContainerError::TooLarge)?;
        self.patch(self.movi_size_pos, &movi_size.to_le_bytes())?;
        self.patch(self.riff_size_pos, &riff_size.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(part_end))?;

        tracing::trace!("Closed RIFF part {} at {} bytes", self.parts, part_end);
        Ok(())
    }

    /// Start a `RIFF 'AVIX'` part with its own `movi` list
    fn open_part(&mut self) -> Result<(), ContainerError> {
        let start = self.position;
        let mut header = Vec::with_capacity(24);
        put_fourcc(&mut header, b"RIFF");
        put_u32(&mut header, 0);
        put_fourcc(&mut header, b"AVIX");
        put_fourcc(&mut header, b"LIST");
        put_u32(&mut header, 0);
        put_fourcc(&mut header, b"movi");
        self.out.write_all(&header)?;

        self.parts += 1;
        self.part_start = start;
        self.riff_size_pos = start + 4;
        self.movi_size_pos = start + 16;
        self.movi_fourcc_pos = start + 20;
        self.position = start + header.len() as u64;

        tracing::debug!("Continuing recording in RIFF part {} at {} bytes", self.parts, start);
        Ok(())
    }

    fn video_frames(&self) -> u32 {
        self.streams
            .iter()
            .find(|s| matches!(s.spec, StreamSpec::Video { .. }))
            .map(|s| s.chunks)
            .unwrap_or(0)
    }

    /// Close the last part, fill in the super indexes, patch sizes and
    /// counts, and flush.
    ///
    /// Returns the underlying sink so callers can inspect or close it.
    pub fn finish(mut self) -> Result<(W, ContainerSummary), ContainerError> {
        self.close_part()?;
        let end = self.position;

        let total_frames = self.video_frames();
        let max_chunk = self.streams.iter().map(|s| s.max_chunk).max().unwrap_or(0);

        // avih counts the first part only; dmlh counts the whole file
        self.patch(self.total_frames_pos, &self.first_part_frames.to_le_bytes())?;
        self.patch(self.odml_frames_pos, &total_frames.to_le_bytes())?;
        self.patch(self.main_buffer_size_pos, &max_chunk.to_le_bytes())?;

        let mut patches: Vec<(u64, Vec<u8>)> = Vec::new();
        for state in &self.streams {
            let length = state.duration_of(state.chunks as u64, state.bytes);
            patches.push((state.length_pos, length.to_le_bytes().to_vec()));
            patches.push((state.buffer_size_pos, state.max_chunk.to_le_bytes().to_vec()));

            let mut entries = Vec::with_capacity(state.super_index.len() * 16);
            for entry in &state.super_index {
                put_u64(&mut entries, entry.offset);
                put_u32(&mut entries, entry.size);
                put_u32(&mut entries, entry.duration);
            }
            patches.push((
                state.super_index_pos + 4,
                (state.super_index.len() as u32).to_le_bytes().to_vec(),
            ));
            patches.push((state.super_index_pos + INDEX_HEADER_SIZE as u64, entries));
        }
        for (pos, bytes) in patches {
            self.patch(pos, &bytes)?;
        }

        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()?;

        let summary = ContainerSummary {
            chunks: self.streams.iter().map(|s| s.chunks).collect(),
            bytes: self.streams.iter().map(|s| s.bytes).collect(),
            total_frames,
            riff_parts: self.parts,
            file_bytes: end,
        };

        tracing::debug!(
            "AVI finalized: {} frames in {} RIFF parts, {} bytes",
            total_frames,
            self.parts,
            end
        );

        Ok((self.out, summary))
    }

    /// Chunks written so far to a stream
    pub fn chunk_count(&self, stream: StreamId) -> u32 {
        self.streams.get(stream.0).map(|s| s.chunks).unwrap_or(0)
    }

    /// Payload bytes written so far to a stream
    pub fn byte_count(&self, stream: StreamId) -> u64 {
        self.streams.get(stream.0).map(|s| s.bytes).unwrap_or(0)
    }

    fn patch(&mut self, pos: u64, bytes: &[u8]) -> Result<(), ContainerError> {
        self.out.seek(SeekFrom::Start(pos))?;
        self.out.write_all(bytes)?;
        Ok(())
    }
}

fn put_fourcc(buf: &mut Vec<u8>, fourcc: &[u8; 4]) {
    buf.extend_from_slice(fourcc);
}

fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_rect(buf: &mut Vec<u8>, width: u32, height: u32) {
    put_u16(buf, 0);
    put_u16(buf, 0);
    put_u16(buf, width.min(i16::MAX as u32) as u16);
    put_u16(buf, height.min(i16::MAX as u32) as u16);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::probe::parse;
    use std::io::{self, Cursor};

    fn config(width: u32, height: u32) -> AviConfig {
        AviConfig::new(
            20,
            vec![
                StreamSpec::Video { width, height },
                StreamSpec::Audio(AudioFormat::pcm16(44100, 2)),
                StreamSpec::Audio(AudioFormat::pcm16(44100, 1)),
            ],
        )
    }

    /// Seekable sink that only tracks its length
    #[derive(Default)]
    struct NullSink {
        pos: u64,
        len: u64,
    }

    impl Write for NullSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.pos += buf.len() as u64;
            self.len = self.len.max(self.pos);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for NullSink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.pos = match pos {
                SeekFrom::Start(p) => p,
                SeekFrom::End(d) => (self.len as i64 + d) as u64,
                SeekFrom::Current(d) => (self.pos as i64 + d) as u64,
            };
            Ok(self.pos)
        }
    }

    #[test]
    fn test_header_layout() {
        let writer = AviWriter::new(Cursor::new(Vec::new()), &config(4, 2)).unwrap();
        let (cursor, summary) = writer.finish().unwrap();
        let bytes = cursor.into_inner();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        assert_eq!(&bytes[12..16], b"LIST");
        assert_eq!(&bytes[20..24], b"hdrl");
        assert_eq!(&bytes[24..28], b"avih");

        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, bytes.len() - 8);
        assert_eq!(summary.file_bytes as usize, bytes.len());
        assert_eq!(summary.total_frames, 0);
        assert_eq!(summary.riff_parts, 1);

        // Microseconds per frame at 20 fps
        let usec = u32::from_le_bytes(bytes[32..36].try_into().unwrap());
        assert_eq!(usec, 50_000);

        let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"indx"));
        assert!(contains(b"dmlh"));
    }

    #[test]
    fn test_chunk_ids_per_stream() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), &config(2, 2)).unwrap();
        writer.write_video_frame(StreamId(0), &[0u8; 16], true).unwrap();
        writer.write_audio(StreamId(1), &[1u8; 8]).unwrap();
        writer.write_audio(StreamId(2), &[2u8; 4]).unwrap();
        let (cursor, summary) = writer.finish().unwrap();
        let bytes = cursor.into_inner();

        let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
        assert!(contains(b"00db"));
        assert!(contains(b"01wb"));
        assert!(contains(b"02wb"));
        assert!(contains(b"ix00"));
        assert!(contains(b"ix02"));
        assert_eq!(summary.chunks, vec![1, 1, 1]);
        assert_eq!(summary.bytes, vec![16, 8, 4]);
    }

    #[test]
    fn test_odd_chunk_is_padded() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), &config(1, 1)).unwrap();
        writer.write_audio(StreamId(2), &[7u8; 3]).unwrap();
        writer.write_video_frame(StreamId(0), &[0u8; 4], true).unwrap();
        let (cursor, _) = writer.finish().unwrap();
        let info = parse(&cursor.into_inner()).unwrap();
        // Second entry lands on an even offset after the padded 3-byte chunk
        assert_eq!(info.index[1].offset, info.index[0].offset + 8 + 4);
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), &config(4, 4)).unwrap();
        let result = writer.write_video_frame(StreamId(0), &[0u8; 10], true);
        assert!(matches!(result, Err(ContainerError::InvalidFrame(_))));
    }

    #[test]
    fn test_stream_kind_checked() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), &config(1, 1)).unwrap();
        assert!(matches!(
            writer.write_audio(StreamId(0), &[0u8; 4]),
            Err(ContainerError::StreamKind(0))
        ));
        assert!(matches!(
            writer.write_video_frame(StreamId(1), &[0u8; 4], true),
            Err(ContainerError::StreamKind(1))
        ));
        assert!(matches!(
            writer.write_audio(StreamId(9), &[0u8; 4]),
            Err(ContainerError::UnknownStream(9))
        ));
    }

    #[test]
    fn test_zero_fps_rejected() {
        let mut cfg = config(1, 1);
        cfg.frames_per_second = 0;
        assert!(AviWriter::new(Cursor::new(Vec::new()), &cfg).is_err());
    }

    #[test]
    fn test_large_video_at_high_rate_saturates_header_rate() {
        let cfg = AviConfig::new(60, vec![StreamSpec::Video { width: 7680, height: 4320 }]);
        let writer = AviWriter::new(Cursor::new(Vec::new()), &cfg).unwrap();
        let (cursor, _) = writer.finish().unwrap();
        let bytes = cursor.into_inner();

        // avih dwMaxBytesPerSec
        let max_bytes = u32::from_le_bytes(bytes[36..40].try_into().unwrap());
        assert_eq!(max_bytes, u32::MAX);
        let info = parse(&bytes).unwrap();
        assert_eq!(info.streams[0].width, Some(7680));
    }

    #[test]
    fn test_frame_too_big_for_a_chunk_rejected() {
        let cfg = AviConfig::new(20, vec![StreamSpec::Video { width: 65536, height: 65536 }]);
        assert!(matches!(
            AviWriter::new(Cursor::new(Vec::new()), &cfg),
            Err(ContainerError::Invalid(_))
        ));
    }

    #[test]
    fn test_full_hd_recording_continues_past_4_gib() {
        let cfg = AviConfig::new(
            20,
            vec![
                StreamSpec::Video { width: 1920, height: 1080 },
                StreamSpec::Audio(AudioFormat::pcm16(44100, 2)),
            ],
        );
        let mut writer = AviWriter::new(NullSink::default(), &cfg).unwrap();
        let frame = vec![0u8; 1920 * 1080 * 4];
        let audio = vec![0u8; 5880];

        // About 23 seconds at 33 ms sampling
        let frames = 700;
        for _ in 0..frames {
            writer.write_video_frame(StreamId(0), &frame, true).unwrap();
            writer.write_audio(StreamId(1), &audio).unwrap();
        }
        let (sink, summary) = writer.finish().unwrap();

        assert!(summary.file_bytes > 4 << 30);
        assert_eq!(sink.len, summary.file_bytes);
        assert_eq!(summary.total_frames, frames);
        assert!(summary.riff_parts >= 5);
        assert_eq!(summary.bytes[1], frames as u64 * 5880);
    }

    fn small_parts() -> AviConfig {
        let mut cfg = AviConfig::new(
            20,
            vec![
                StreamSpec::Video { width: 2, height: 2 },
                StreamSpec::Audio(AudioFormat::pcm16(44100, 1)),
            ],
        );
        cfg.part_limit = 4096;
        cfg
    }

    #[test]
    fn test_parts_are_indexed_per_stream() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), &small_parts()).unwrap();
        for n in 0..300u32 {
            writer.write_video_frame(StreamId(0), &[n as u8; 16], n % 10 == 0).unwrap();
            writer.write_audio(StreamId(1), &[0u8; 6]).unwrap();
        }
        let (cursor, summary) = writer.finish().unwrap();
        let bytes = cursor.into_inner();
        let info = parse(&bytes).unwrap();

        assert!(summary.riff_parts > 1);
        assert_eq!(info.riff_parts, summary.riff_parts);
        assert_eq!(info.total_frames, 300);
        assert_eq!(info.streams[0].length, 300);
        assert_eq!(info.streams[1].length, 900);

        // idx1 only covers the first part
        let legacy = info.entries_for(0).count();
        assert!(legacy > 0 && legacy < 300);

        let video: Vec<_> = info.chunk_index.iter().filter(|e| e.stream == 0).collect();
        assert_eq!(video.len(), 300);
        for (n, entry) in video.iter().enumerate() {
            let at = entry.offset as usize;
            assert_eq!(&bytes[at - 8..at - 4], b"00db");
            assert_eq!(bytes[at], n as u8);
            assert_eq!(entry.size, 16);
            assert_eq!(entry.key_frame, n % 10 == 0);
        }
        let audio = info.chunk_index.iter().filter(|e| e.stream == 1).count();
        assert_eq!(audio, 300);

        // One super index entry per part the stream has chunks in
        let mut video_parts: Vec<u32> = video.iter().map(|e| e.part).collect();
        video_parts.dedup();
        assert_eq!(info.streams[0].super_index_entries, video_parts.len() as u32);
        assert!(video_parts.len() as u32 + 1 >= summary.riff_parts);
    }

    #[test]
    fn test_super_index_capacity_is_enforced() {
        let mut cfg = small_parts();
        cfg.part_limit = 64;
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), &cfg).unwrap();

        // Every chunk overflows the tiny part, so each gets a part of its own
        for _ in 0..SUPER_INDEX_SLOTS {
            writer.write_video_frame(StreamId(0), &[0u8; 16], true).unwrap();
        }
        assert!(matches!(
            writer.write_video_frame(StreamId(0), &[0u8; 16], true),
            Err(ContainerError::TooLarge)
        ));
    }
}
