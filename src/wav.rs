//! WAV encoding and the ICMT metadata round-trip.
//!
//! The encoder writes a canonical 44-byte header followed by interleaved
//! 16-bit LE stereo PCM. Metadata is appended after encoding as a
//! `LIST(INFO(ICMT))` chunk whose payload is the line protocol in
//! [`crate::metadata`]. The outer RIFF size field is deliberately left
//! untouched by the append: the extractor walks top-level chunks and
//! skips the whole original RIFF body in one hop, landing exactly on the
//! appended chunk.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{FormatError, SynapseqError};
use crate::metadata::Metadata;

/// Output channel count (stereo).
pub const WAV_CHANNELS: u16 = 2;

/// Output sample width.
pub const WAV_BITS_PER_SAMPLE: u16 = 16;

/// Build the canonical 44-byte PCM WAV header for `frames` stereo frames.
pub fn wav_header(sample_rate: u32, frames: u64) -> [u8; 44] {
    let bytes_per_frame = WAV_CHANNELS as u32 * (WAV_BITS_PER_SAMPLE as u32 / 8);
    let data_size = frames as u32 * bytes_per_frame;
    let byte_rate = sample_rate * bytes_per_frame;
    let block_align = WAV_CHANNELS * (WAV_BITS_PER_SAMPLE / 8);

    let mut header = [0u8; 44];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&WAV_CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&WAV_BITS_PER_SAMPLE.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// Encode interleaved stereo samples into a complete WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(44 + samples.len() * 2);
    buf.extend_from_slice(&wav_header(sample_rate, (samples.len() / 2) as u64));
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    buf
}

/// Build the `LIST(INFO(ICMT))` chunk bytes for a metadata payload,
/// padded to even length per RIFF alignment.
fn icmt_chunk_bytes(payload: &str) -> Vec<u8> {
    let payload = payload.as_bytes();
    let padded = (payload.len() + 1) & !1;
    let icmt_size = padded as u32;
    let list_size = (4 + 4 + 4 + padded) as u32; // "INFO" + "ICMT" + size + data

    let mut buf = Vec::with_capacity(8 + list_size as usize);
    buf.extend_from_slice(b"LIST");
    buf.extend_from_slice(&list_size.to_le_bytes());
    buf.extend_from_slice(b"INFO");
    buf.extend_from_slice(b"ICMT");
    buf.extend_from_slice(&icmt_size.to_le_bytes());
    buf.extend_from_slice(payload);
    if payload.len() % 2 != 0 {
        buf.push(0);
    }
    buf
}

/// Append the metadata chunk to a finished WAV file.
pub fn write_icmt_chunk(wav_path: &Path, metadata: &Metadata) -> Result<(), SynapseqError> {
    let mut file = OpenOptions::new().append(true).open(wav_path)?;
    let chunk = icmt_chunk_bytes(&metadata.to_icmt_payload());
    file.write_all(&chunk)?;
    debug!(path = %wav_path.display(), bytes = chunk.len(), "metadata chunk appended");
    Ok(())
}

/// Walk the file's top-level chunks, find the `LIST(INFO(ICMT))` metadata,
/// and return the embedded sequence text wrapped in the provenance banner.
///
/// A file without the chunk yields [`FormatError::NoMetadata`]; a chunk
/// with missing fields or undecodable content yields the corresponding
/// typed failure. Both are distinct from I/O errors.
pub fn extract_text_sequence(wav_path: &Path) -> Result<String, SynapseqError> {
    let mut file = std::fs::File::open(wav_path)?;
    let mut header = [0u8; 8];

    loop {
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let chunk_id = &header[..4];
        let chunk_size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let padded_size = (chunk_size as u64 + 1) & !1;

        if chunk_id != b"LIST" {
            file.seek(SeekFrom::Current(padded_size as i64))?;
            continue;
        }

        let mut list_data = vec![0u8; chunk_size as usize];
        file.read_exact(&mut list_data).map_err(|_| {
            SynapseqError::from(FormatError::MalformedChunk(
                "LIST chunk shorter than its declared size".to_string(),
            ))
        })?;
        if chunk_size % 2 != 0 {
            file.seek(SeekFrom::Current(1))?;
        }

        if !list_data.starts_with(b"INFO") {
            continue;
        }

        let mut offset = 4;
        while offset + 8 <= list_data.len() {
            let sub_id = &list_data[offset..offset + 4];
            let sub_size = u32::from_le_bytes([
                list_data[offset + 4],
                list_data[offset + 5],
                list_data[offset + 6],
                list_data[offset + 7],
            ]) as usize;
            offset += 8;

            if sub_id == b"ICMT" {
                if offset + sub_size > list_data.len() {
                    return Err(FormatError::MalformedChunk(
                        "ICMT subchunk size exceeds LIST chunk size".to_string(),
                    )
                    .into());
                }

                let mut data = &list_data[offset..offset + sub_size];
                while data.last() == Some(&0) {
                    data = &data[..data.len() - 1];
                }
                let payload = std::str::from_utf8(data).map_err(|e| {
                    SynapseqError::from(FormatError::InvalidContent(format!(
                        "ICMT payload is not UTF-8: {e}"
                    )))
                })?;

                let metadata = Metadata::from_icmt_payload(payload)?;
                let decoded = metadata.decode_content()?;
                let text = String::from_utf8(decoded).map_err(|e| {
                    SynapseqError::from(FormatError::InvalidContent(format!(
                        "embedded sequence is not UTF-8: {e}"
                    )))
                })?;

                return Ok(format!("{}{}", metadata.banner(), text));
            }

            offset += (sub_size + 1) & !1;
        }
    }

    Err(FormatError::NoMetadata.into())
}
