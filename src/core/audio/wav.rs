//! Minimal RIFF/WAVE writer for mono 16-bit PCM.

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the canonical PCM WAVE header.
pub const WAV_HEADER_LEN: usize = 44;

/// Frame little-endian 16-bit mono samples in a WAVE container.
///
/// The output is always `44 + 2 * samples.len()` bytes.
pub fn wav_from_pcm16le(samples: &[i16], sample_rate: u32) -> Bytes {
    let data_len = (samples.len() * 2) as u32;
    let mut buf = BytesMut::with_capacity(WAV_HEADER_LEN + samples.len() * 2);

    buf.put_slice(b"RIFF");
    buf.put_u32_le(36 + data_len);
    buf.put_slice(b"WAVE");

    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(1); // PCM
    buf.put_u16_le(1); // mono
    buf.put_u32_le(sample_rate);
    buf.put_u32_le(sample_rate * 2);
    buf.put_u16_le(2);
    buf.put_u16_le(16);

    buf.put_slice(b"data");
    buf.put_u32_le(data_len);
    for sample in samples {
        buf.put_i16_le(*sample);
    }

    buf.freeze()
}
