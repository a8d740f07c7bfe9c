//! AVI metadata reader
//!
//! Reads back the headers and indexes of a finished recording, mainly to
//! report its dimensions and duration to the UI. The file is walked chunk by
//! chunk; frame and audio payloads are skipped, never loaded.

use super::ContainerError;
use crate::capture::traits::AudioFormat;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Summary of a stream declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    /// "vids" or "auds"
    pub kind: String,
    /// Frames for video, sample frames for audio
    pub length: u32,
    pub width: Option<u32>,
    /// Signed DIB height; positive means bottom-up rows
    pub height: Option<i32>,
    pub audio: Option<AudioFormat>,
    /// Standard indexes referenced by the stream's `indx` super index
    pub super_index_entries: u32,
}

/// One `idx1` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub chunk_id: String,
    pub flags: u32,
    pub offset: u32,
    pub size: u32,
}

/// One entry of an `ix##` standard index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub stream: usize,
    /// RIFF part holding the chunk, 0 for the `AVI ` part
    pub part: u32,
    /// Absolute file offset of the payload
    pub offset: u64,
    pub size: u32,
    pub key_frame: bool,
}

/// Metadata of an AVI file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AviInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u32,
    pub duration_ms: f64,
    pub streams: Vec<StreamInfo>,
    pub has_index: bool,
    pub riff_parts: u32,
    #[serde(skip)]
    pub index: Vec<IndexRecord>,
    #[serde(skip)]
    pub chunk_index: Vec<ChunkRecord>,
}

impl AviInfo {
    /// `idx1` entries belonging to stream `n`
    pub fn entries_for(&self, stream: usize) -> impl Iterator<Item = &IndexRecord> {
        let prefix = format!("{:02}", stream);
        self.index
            .iter()
            .filter(move |entry| entry.chunk_id.starts_with(&prefix))
    }
}

/// Read metadata from an AVI file on disk
pub fn probe(path: &Path) -> Result<AviInfo, ContainerError> {
    let file = File::open(path)?;
    read_info(&mut BufReader::new(file))
}

/// Parse AVI metadata from an in-memory file
pub fn parse(bytes: &[u8]) -> Result<AviInfo, ContainerError> {
    read_info(&mut Cursor::new(bytes))
}

fn invalid(message: impl Into<String>) -> ContainerError {
    ContainerError::Invalid(message.into())
}

fn read_info<R: Read + Seek>(reader: &mut R) -> Result<AviInfo, ContainerError> {
    let end = reader.seek(SeekFrom::End(0))?;
    if end < 12 {
        return Err(invalid("missing RIFF AVI signature"));
    }

    let mut info = AviInfo {
        width: 0,
        height: 0,
        fps: 0.0,
        total_frames: 0,
        duration_ms: 0.0,
        streams: Vec::new(),
        has_index: false,
        riff_parts: 0,
        index: Vec::new(),
        chunk_index: Vec::new(),
    };
    let mut odml_frames = None;

    let mut pos = 0u64;
    while pos + 12 <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let (id, size) = read_header(reader)?;
        let form = read_fourcc(reader)?;
        let expected: &[u8; 4] = if info.riff_parts == 0 { b"AVI " } else { b"AVIX" };
        if &id != b"RIFF" || &form != expected {
            if info.riff_parts == 0 {
                return Err(invalid("missing RIFF AVI signature"));
            }
            // Trailing data after the last part
            break;
        }

        let part_end = pos + 8 + size as u64;
        if part_end > end {
            return Err(invalid(format!("RIFF part {} overruns the file", info.riff_parts)));
        }
        read_part(reader, pos + 12, part_end, &mut info, &mut odml_frames)?;
        info.riff_parts += 1;
        pos = part_end + (size as u64 & 1);
    }

    if let Some(frames) = odml_frames {
        info.total_frames = frames;
    }
    if info.fps > 0.0 {
        info.duration_ms = info.total_frames as f64 / info.fps * 1000.0;
    }
    Ok(info)
}

fn read_part<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    info: &mut AviInfo,
    odml_frames: &mut Option<u32>,
) -> Result<(), ContainerError> {
    let mut pos = start;
    while pos + 8 <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let (id, size) = read_header(reader)?;
        let body_end = pos + 8 + size as u64;
        if body_end > end {
            return Err(invalid(format!(
                "chunk {} overruns its parent",
                String::from_utf8_lossy(&id)
            )));
        }

        match &id {
            b"LIST" if size >= 4 => match &read_fourcc(reader)? {
                b"hdrl" => {
                    let body = read_body(reader, size - 4)?;
                    parse_hdrl(&body, info, odml_frames)?;
                }
                b"movi" => read_movi(reader, pos + 12, body_end, info)?,
                _ => {}
            },
            b"idx1" => {
                let body = read_body(reader, size)?;
                info.has_index = true;
                for entry in body.chunks_exact(16) {
                    info.index.push(IndexRecord {
                        chunk_id: String::from_utf8_lossy(&entry[0..4]).to_string(),
                        flags: read_u32(entry, 4),
                        offset: read_u32(entry, 8),
                        size: read_u32(entry, 12),
                    });
                }
            }
            _ => {}
        }
        pos = body_end + (size as u64 & 1);
    }
    Ok(())
}

/// Collect the `ix##` standard indexes of one `movi` list
fn read_movi<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    info: &mut AviInfo,
) -> Result<(), ContainerError> {
    let mut pos = start;
    while pos + 8 <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let (id, size) = read_header(reader)?;
        if pos + 8 + size as u64 > end {
            return Err(invalid("movi chunk overruns its list"));
        }
        if id.starts_with(b"ix") {
            let body = read_body(reader, size)?;
            parse_standard_index(&body, info)?;
        }
        pos += 8 + size as u64 + (size as u64 & 1);
    }
    Ok(())
}

fn parse_standard_index(body: &[u8], info: &mut AviInfo) -> Result<(), ContainerError> {
    if body.len() < 24 {
        return Err(invalid("truncated standard index"));
    }
    let longs_per_entry = read_u16(body, 0);
    let entries = read_u32(body, 4) as usize;
    let chunk_id = &body[8..12];
    let base = read_u64(body, 12);
    if longs_per_entry != 2 || body.len() < 24 + entries * 8 {
        return Err(invalid("malformed standard index"));
    }
    let stream = std::str::from_utf8(&chunk_id[0..2])
        .ok()
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| invalid("standard index names no stream"))?;

    for entry in body[24..24 + entries * 8].chunks_exact(8) {
        let size = read_u32(entry, 4);
        info.chunk_index.push(ChunkRecord {
            stream,
            part: info.riff_parts,
            offset: base + read_u32(entry, 0) as u64,
            size: size & 0x7fff_ffff,
            key_frame: size & 0x8000_0000 == 0,
        });
    }
    Ok(())
}

fn parse_hdrl(
    body: &[u8],
    info: &mut AviInfo,
    odml_frames: &mut Option<u32>,
) -> Result<(), ContainerError> {
    for (id, chunk) in chunks(body)? {
        match &id {
            b"avih" if chunk.len() >= 40 => {
                let usec_per_frame = read_u32(chunk, 0);
                if usec_per_frame > 0 {
                    info.fps = 1_000_000.0 / usec_per_frame as f64;
                }
                info.total_frames = read_u32(chunk, 16);
                info.width = read_u32(chunk, 32);
                info.height = read_u32(chunk, 36);
            }
            b"LIST" if chunk.len() >= 4 && &chunk[0..4] == b"strl" => {
                let mut stream = StreamInfo {
                    kind: String::new(),
                    length: 0,
                    width: None,
                    height: None,
                    audio: None,
                    super_index_entries: 0,
                };
                for (sub_id, sub) in chunks(&chunk[4..])? {
                    match &sub_id {
                        b"strh" if sub.len() >= 36 => {
                            stream.kind = String::from_utf8_lossy(&sub[0..4]).to_string();
                            stream.length = read_u32(sub, 32);
                        }
                        b"strf" if stream.kind == "vids" && sub.len() >= 12 => {
                            stream.width = Some(read_u32(sub, 4));
                            stream.height = Some(read_u32(sub, 8) as i32);
                        }
                        b"strf" if stream.kind == "auds" && sub.len() >= 16 => {
                            stream.audio = Some(AudioFormat {
                                channels: read_u16(sub, 2),
                                sample_rate: read_u32(sub, 4),
                                bits_per_sample: read_u16(sub, 14),
                            });
                        }
                        b"indx" if sub.len() >= 8 => {
                            stream.super_index_entries = read_u32(sub, 4);
                        }
                        _ => {}
                    }
                }
                info.streams.push(stream);
            }
            b"LIST" if chunk.len() >= 4 && &chunk[0..4] == b"odml" => {
                for (sub_id, sub) in chunks(&chunk[4..])? {
                    if &sub_id == b"dmlh" && sub.len() >= 4 {
                        *odml_frames = Some(read_u32(sub, 0));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn read_fourcc<R: Read>(reader: &mut R) -> Result<[u8; 4], ContainerError> {
    let mut id = [0u8; 4];
    reader.read_exact(&mut id)?;
    Ok(id)
}

fn read_header<R: Read>(reader: &mut R) -> Result<([u8; 4], u32), ContainerError> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    Ok(([header[0], header[1], header[2], header[3]], read_u32(&header, 4)))
}

fn read_body<R: Read>(reader: &mut R, size: u32) -> Result<Vec<u8>, ContainerError> {
    let mut body = vec![0u8; size as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Split a run of RIFF chunks into (id, body) pairs
fn chunks(mut data: &[u8]) -> Result<Vec<([u8; 4], &[u8])>, ContainerError> {
    let mut out = Vec::new();
    while data.len() >= 8 {
        let id = [data[0], data[1], data[2], data[3]];
        let size = read_u32(data, 4) as usize;
        let end = 8 + size;
        if end > data.len() {
            return Err(invalid(format!(
                "chunk {} overruns its parent",
                String::from_utf8_lossy(&id)
            )));
        }
        out.push((id, &data[8..end]));
        let next = end + (size & 1);
        data = &data[next.min(data.len())..];
    }
    Ok(out)
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}
