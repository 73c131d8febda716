//! # WAVE Container Walking
//!
//! Finds where the raw audio starts inside a sample file so only the PCM
//! payload is streamed to the server.
//!
//! ## Layout:
//! ```text
//! offset 0   "RIFF" | u32 LE size | "WAVE"        (12 bytes)
//! offset 12  id (4) | u32 LE size | body (size)   (subchunk, repeated)
//!            ...
//!            "data" | u32 LE size | samples...
//! ```
//!
//! Buffers that are not RIFF/WAVE are treated as headerless raw audio and
//! streamed whole. A container that runs out of bytes before its "data"
//! subchunk is not an error: the walk stops and the offset accumulated so
//! far is used.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use tracing::{debug, info};

/// Size of the outer "RIFF" header: id, size, format.
pub const RIFF_HEADER_LEN: usize = 12;

/// Size of every subchunk header: id, size.
pub const SUBCHUNK_HEADER_LEN: usize = 8;

const DATA_CHUNK: &[u8; 4] = b"data";
const METADATA_CHUNK: &[u8; 4] = b"txts";

/// One subchunk visited during the walk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInfo {
    /// Four-character chunk identifier
    pub id: [u8; 4],

    /// Declared body size (may exceed what is actually in the buffer)
    pub size: u32,

    /// Body of a "txts" chunk, decoded lossily as UTF-8
    pub metadata: Option<String>,
}

impl ChunkInfo {
    /// Chunk identifier as text, for logging.
    pub fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }
}

/// Result of [`locate_payload`]: where the audio starts and what was seen
/// on the way there.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PayloadLocation {
    /// Byte offset of the first audio byte
    pub offset: usize,

    /// Whether the buffer carried a RIFF/WAVE header
    pub is_wave: bool,

    /// Subchunks in the order they were visited (the "data" chunk last, if found)
    pub chunks: Vec<ChunkInfo>,
}

impl PayloadLocation {
    /// Whether the walk reached a "data" subchunk.
    pub fn found_data(&self) -> bool {
        self.chunks.last().map_or(false, |chunk| &chunk.id == DATA_CHUNK)
    }

    /// The audio bytes of `bytes` starting at the located offset.
    ///
    /// A declared chunk size can point past the end of a truncated file, so
    /// the offset is clamped to the buffer length.
    pub fn payload<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.offset.min(bytes.len())..]
    }
}

/// Locate the raw audio payload inside `bytes`.
///
/// ## Offsets:
/// - Non-WAVE input: 0
/// - `data` directly after the header: 12 + 8 = 20
/// - one skipped chunk of size K first: 12 + (8 + K) + 8 = 28 + K
///
/// Never fails and never reads outside `bytes`.
///
/// ## What this does:
/// 1. Reads the 12-byte outer header; anything but `RIFF`/`WAVE` stops here
/// 2. Walks subchunk headers, adding 8 bytes per header
/// 3. Stops at `data`; otherwise adds the declared body size and moves on
/// 4. Logs the body of a `txts` chunk as it passes
///
/// ## Rust Concepts:
/// - **Cursor<&[u8]>**: gives a byte slice a read position, so byteorder's
///   `read_u32::<LittleEndian>()` can be used on it
/// - **Option + `?`**: the header readers return `None` once the buffer runs
///   out, which ends the `while let` loop instead of raising an error
/// - **Borrowing**: only `&[u8]` is taken; the caller slices the payload with
///   [`PayloadLocation::payload`] without any copy
pub fn locate_payload(bytes: &[u8]) -> PayloadLocation {
    let mut cursor = Cursor::new(bytes);

    let is_wave = match read_outer_header(&mut cursor) {
        Some((id, format)) => &id == b"RIFF" && &format == b"WAVE",
        None => false,
    };

    if !is_wave {
        return PayloadLocation::default();
    }

    debug!("Detected WAV audio format");

    let mut offset = RIFF_HEADER_LEN;
    let mut chunks = Vec::new();

    while let Some((id, size)) = read_subchunk_header(&mut cursor) {
        offset += SUBCHUNK_HEADER_LEN;
        debug!("  -> {}", String::from_utf8_lossy(&id));

        if &id == DATA_CHUNK {
            chunks.push(ChunkInfo { id, size, metadata: None });
            break;
        }

        offset += size as usize;

        let metadata = if &id == METADATA_CHUNK {
            let text = read_body_text(&mut cursor, size);
            info!("Metadata: \n{}", text);
            Some(text)
        } else {
            cursor.set_position(cursor.position() + u64::from(size));
            None
        };

        chunks.push(ChunkInfo { id, size, metadata });
    }

    PayloadLocation {
        offset,
        is_wave,
        chunks,
    }
}

/// Read the 12-byte outer header, returning (id, format).
fn read_outer_header(cursor: &mut Cursor<&[u8]>) -> Option<([u8; 4], [u8; 4])> {
    let mut id = [0u8; 4];
    let mut format = [0u8; 4];

    cursor.read_exact(&mut id).ok()?;
    let _riff_size = cursor.read_u32::<LittleEndian>().ok()?;
    cursor.read_exact(&mut format).ok()?;

    Some((id, format))
}

/// Read one 8-byte subchunk header. `None` once fewer than 8 bytes remain.
fn read_subchunk_header(cursor: &mut Cursor<&[u8]>) -> Option<([u8; 4], u32)> {
    let mut id = [0u8; 4];
    cursor.read_exact(&mut id).ok()?;
    let size = cursor.read_u32::<LittleEndian>().ok()?;
    Some((id, size))
}

/// Consume a chunk body as text, taking whatever part of it is present.
fn read_body_text(cursor: &mut Cursor<&[u8]>, size: u32) -> String {
    let bytes = *cursor.get_ref();
    let start = (cursor.position() as usize).min(bytes.len());
    let end = start.saturating_add(size as usize).min(bytes.len());

    cursor.set_position(cursor.position() + u64::from(size));
    String::from_utf8_lossy(&bytes[start..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn riff_header() -> Vec<u8> {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes
    }

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut bytes = id.to_vec();
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_data_chunk_right_after_header() {
        let samples = [1u8, 2, 3, 4, 5, 6];
        let mut wav = riff_header();
        wav.extend(chunk(b"data", &samples));

        let location = locate_payload(&wav);
        assert_eq!(location.offset, 20);
        assert!(location.is_wave);
        assert!(location.found_data());
        assert_eq!(location.payload(&wav), &samples);
    }

    #[test]
    fn test_skipped_chunk_adds_header_and_body() {
        let fmt_body = [0u8; 16];
        let mut wav = riff_header();
        wav.extend(chunk(b"fmt ", &fmt_body));
        wav.extend(chunk(b"data", &[9, 9]));

        let location = locate_payload(&wav);
        assert_eq!(location.offset, 28 + fmt_body.len());
        assert_eq!(location.payload(&wav), &[9u8, 9]);
        assert_eq!(location.chunks.len(), 2);
        assert_eq!(location.chunks[0].id_str(), "fmt ");
    }

    #[test]
    fn test_metadata_chunk_is_surfaced() {
        let mut wav = riff_header();
        wav.extend(chunk(b"txts", b"speaker=alice"));
        wav.extend(chunk(b"data", &[0, 0]));

        let location = locate_payload(&wav);
        assert_eq!(location.offset, 28 + 13);
        assert_eq!(location.chunks[0].metadata.as_deref(), Some("speaker=alice"));
        assert_eq!(location.chunks[1].metadata, None);
    }

    #[test]
    fn test_non_wave_buffer_streams_whole() {
        let mut raw = b"RIFF".to_vec();
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(b"AVI ");
        raw.extend(chunk(b"data", &[1, 2]));
        assert_eq!(locate_payload(&raw).offset, 0);

        let pcm: Vec<u8> = (0..64).collect();
        let location = locate_payload(&pcm);
        assert_eq!(location.offset, 0);
        assert!(!location.is_wave);
        assert_eq!(location.payload(&pcm), pcm.as_slice());
    }

    #[test]
    fn test_short_buffer_is_raw_audio() {
        assert_eq!(locate_payload(&[]).offset, 0);
        assert_eq!(locate_payload(b"RIFF\0\0").offset, 0);
    }

    #[test]
    fn test_truncated_container_keeps_best_offset() {
        // Header only: nothing to walk
        assert_eq!(locate_payload(&riff_header()).offset, 12);

        // One complete chunk, then a partial header
        let mut wav = riff_header();
        wav.extend(chunk(b"LIST", &[0u8; 10]));
        wav.extend_from_slice(b"da");
        let location = locate_payload(&wav);
        assert_eq!(location.offset, 12 + 8 + 10);
        assert!(!location.found_data());
    }

    #[test]
    fn test_declared_size_past_end_is_clamped() {
        let mut wav = riff_header();
        wav.extend_from_slice(b"junk");
        wav.extend_from_slice(&1000u32.to_le_bytes());
        wav.extend_from_slice(&[0u8; 4]);

        let location = locate_payload(&wav);
        assert_eq!(location.offset, 12 + 8 + 1000);
        assert!(location.payload(&wav).is_empty());
    }
}
