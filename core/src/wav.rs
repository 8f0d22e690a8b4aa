//! Raw access to canonical 44-byte-header PCM WAV files
//!
//! The decoder never trusts the `fmt ` chunk for layout: Studybox captures are
//! always 16-bit stereo with a plain 44-byte header, so samples are read at
//! fixed offsets.

use std::io::Cursor;

use crate::error::{Result, StudyboxError};
use crate::{SAMPLE_RATE, STEREO_FRAME_BYTES, WAV_HEADER_SIZE};

const RIFF_SIZE_OFFSET: usize = 0x04;
const CHANNELS_OFFSET: usize = 0x16;
const BYTE_RATE_OFFSET: usize = 0x1C;
const BLOCK_ALIGN_OFFSET: usize = 0x20;
const DATA_SIZE_OFFSET: usize = 0x28;

const MONO_BYTE_RATE: u32 = 88200;
const MONO_BLOCK_ALIGN: u16 = 2;

fn check_header(bytes: &[u8]) -> Result<()> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(StudyboxError::TruncatedHeader(WAV_HEADER_SIZE));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(StudyboxError::NotRiff);
    }
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn put_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Extract the right channel of a 16-bit stereo WAV image.
///
/// A trailing partial frame is ignored.
pub fn right_channel(bytes: &[u8]) -> Result<Vec<i16>> {
    check_header(bytes)?;

    Ok(bytes[WAV_HEADER_SIZE..]
        .chunks_exact(STEREO_FRAME_BYTES)
        .map(|frame| i16::from_le_bytes([frame[2], frame[3]]))
        .collect())
}

/// Build the mono copy embedded in the container's AUDI chunk.
///
/// The original header is kept and patched: one channel, 88200 bytes/s,
/// block align 2, halved data size and a recomputed RIFF size. Only the
/// first (left) sample of every frame is retained.
pub fn mono_copy(bytes: &[u8]) -> Result<Vec<u8>> {
    check_header(bytes)?;

    let frames = bytes[WAV_HEADER_SIZE..].chunks_exact(STEREO_FRAME_BYTES);
    let mut out = Vec::with_capacity(WAV_HEADER_SIZE + frames.len() * 2);
    out.extend_from_slice(&bytes[..WAV_HEADER_SIZE]);
    for frame in frames {
        out.extend_from_slice(&frame[..2]);
    }

    let data_size = read_u32(bytes, DATA_SIZE_OFFSET) / 2;
    put_u16(&mut out, CHANNELS_OFFSET, 1);
    put_u32(&mut out, BYTE_RATE_OFFSET, MONO_BYTE_RATE);
    put_u16(&mut out, BLOCK_ALIGN_OFFSET, MONO_BLOCK_ALIGN);
    put_u32(&mut out, DATA_SIZE_OFFSET, data_size);
    let riff_size = (out.len() - 8) as u32;
    put_u32(&mut out, RIFF_SIZE_OFFSET, riff_size);

    Ok(out)
}

/// Build a 44.1 kHz 16-bit stereo WAV image from two channels.
///
/// The shorter channel is padded with silence.
pub fn stereo_wav(left: &[i16], right: &[i16]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for i in 0..left.len().max(right.len()) {
        writer.write_sample(left.get(i).copied().unwrap_or(0))?;
        writer.write_sample(right.get(i).copied().unwrap_or(0))?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}
