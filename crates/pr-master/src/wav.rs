//! 16-bit stereo PCM WAV encoding.

use pr_engine::Frame;
use std::io::{self, Write};

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;
/// RIFF size field counts everything after itself except the sample data.
const HEADER_TAIL: u32 = 4 + (8 + 16) + 8;

fn too_long() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "too many frames for a WAV file")
}

/// Size of the sample data chunk for `frame_count` frames.
fn data_size(frame_count: usize) -> io::Result<u32> {
    frame_count
        .checked_mul(BLOCK_ALIGN as usize)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .ok_or_else(too_long)
}

/// Value of the RIFF chunk size field for `data_size` bytes of samples.
fn riff_size(data_size: u32) -> io::Result<u32> {
    HEADER_TAIL.checked_add(data_size).ok_or_else(too_long)
}

/// Write a complete RIFF/WAVE file holding `frames`.
pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> io::Result<()> {
    let data_size = data_size(frames.len())?;
    let riff_size = riff_size(data_size)?;
    let byte_rate = sample_rate
        .checked_mul(BLOCK_ALIGN as u32)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "sample rate too high for a WAV file"))?;

    w.write_all(b"RIFF")?;
    w.write_all(&riff_size.to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&CHANNELS.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&BLOCK_ALIGN.to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for frame in frames {
        w.write_all(&frame.left.to_le_bytes())?;
        w.write_all(&frame.right.to_le_bytes())?;
    }
    Ok(())
}

/// Encode `frames` into an in-memory WAV file.
pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(44 + frames.len() * BLOCK_ALIGN as usize);
    write_wav(&mut buf, frames, sample_rate)?;
    Ok(buf)
}
