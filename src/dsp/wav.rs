//! Canonical 44-byte-header PCM WAV encoding.

use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// PCM sample width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    /// Unsigned, offset by 128.
    Eight,
    Sixteen,
    /// Signed, packed into 3 little-endian bytes.
    TwentyFour,
    ThirtyTwo,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
            BitDepth::TwentyFour => 24,
            BitDepth::ThirtyTwo => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// Quantize one sample (clamped to [-1, 1]) and append its bytes.
    fn write_sample(self, sample: f32, out: &mut Vec<u8>) {
        let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) as f64 };
        match self {
            BitDepth::Eight => {
                let v = (s * 127.0).round() as i32 + 128;
                out.push(v as u8);
            }
            BitDepth::Sixteen => {
                let v = (s * i16::MAX as f64).round() as i16;
                out.extend_from_slice(&v.to_le_bytes());
            }
            BitDepth::TwentyFour => {
                let v = (s * 8_388_607.0).round() as i32;
                out.extend_from_slice(&v.to_le_bytes()[..3]);
            }
            BitDepth::ThirtyTwo => {
                let v = (s * i32::MAX as f64).round() as i32;
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = ExportError;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            24 => Ok(BitDepth::TwentyFour),
            32 => Ok(BitDepth::ThirtyTwo),
            other => Err(ExportError::UnsupportedBitDepth(other)),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> u16 {
        depth.bits()
    }
}

/// Size of the canonical header.
pub const HEADER_LEN: usize = 44;

/// Largest data chunk whose RIFF size still fits in a `u32`.
pub const MAX_DATA_LEN: u64 = u32::MAX as u64 - 36;

/// Bytes of PCM data for `frames` frames, or `DataTooLarge` if a WAV file
/// cannot hold them.
pub fn data_len(frames: u64, channels: u16, bit_depth: BitDepth) -> Result<u32, ExportError> {
    let len = frames as u128 * channels as u128 * bit_depth.bytes_per_sample() as u128;
    if len > MAX_DATA_LEN as u128 {
        return Err(ExportError::DataTooLarge(u64::try_from(len).unwrap_or(u64::MAX)));
    }
    Ok(len as u32)
}

/// Encode mono samples as a WAV file with `channels` identical channels.
///
/// Stereo output duplicates each sample into both slots of the frame.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16, bit_depth: BitDepth) -> Result<Vec<u8>, ExportError> {
    if sample_rate == 0 {
        return Err(ExportError::InvalidSampleRate);
    }
    if !(1..=2).contains(&channels) {
        return Err(ExportError::UnsupportedChannelCount(channels));
    }

    let bytes_per_sample = bit_depth.bytes_per_sample();
    let block_align = channels as usize * bytes_per_sample;
    let data_size = data_len(samples.len() as u64, channels, bit_depth)?;
    let data_len = data_size as usize;
    let byte_rate = sample_rate as u64 * block_align as u64;
    let byte_rate = u32::try_from(byte_rate).map_err(|_| ExportError::DataTooLarge(byte_rate))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + data_len);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&(block_align as u16).to_le_bytes());
    buf.extend_from_slice(&bit_depth.bits().to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        for _ in 0..channels {
            bit_depth.write_sample(sample, &mut buf);
        }
    }

    Ok(buf)
}
