//! Telephony audio codec.
//!
//! - [`decode_mulaw_to_pcm16`] expands 8-bit µ-law into linear 16-bit samples
//! - [`wav_from_pcm16le`] frames linear samples in a WAVE container for playback
//!   and offline inspection

mod mulaw;
mod wav;

pub use mulaw::{
    MULAW_SILENCE, decode_mulaw_to_pcm16, decode_sample, encode_pcm16_to_mulaw, encode_sample,
};
pub use wav::{WAV_HEADER_LEN, wav_from_pcm16le};

/// Sample rate of Twilio media streams.
pub const NARROWBAND_SAMPLE_RATE: u32 = 8000;

/// Decode raw µ-law bytes straight into a playable WAVE file.
pub fn mulaw_to_wav(bytes: &[u8]) -> bytes::Bytes {
    wav_from_pcm16le(&decode_mulaw_to_pcm16(bytes), NARROWBAND_SAMPLE_RATE)
}
