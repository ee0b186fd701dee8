//! G.711 µ-law companding.
//!
//! Twilio media streams carry 8-bit µ-law samples at 8 kHz. Decoding is total:
//! every byte value maps to exactly one 16-bit linear sample.

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

/// Encoded silence (positive zero).
pub const MULAW_SILENCE: u8 = 0xFF;

/// Expand a single µ-law byte into a linear 16-bit sample.
#[inline]
pub fn decode_sample(byte: u8) -> i16 {
    let u = !byte;
    let sign = u & 0x80;
    let exponent = (u >> 4) & 0x07;
    let mantissa = (u & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Compress a linear 16-bit sample into a µ-law byte.
#[inline]
pub fn encode_sample(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };

    pcm = pcm.min(CLIP) + BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && pcm & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = (pcm >> (exponent + 3)) & 0x0F;
    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Decode a µ-law buffer into linear 16-bit samples, one sample per input byte.
pub fn decode_mulaw_to_pcm16(bytes: &[u8]) -> Vec<i16> {
    bytes.iter().map(|&b| decode_sample(b)).collect()
}

/// Encode linear 16-bit samples into µ-law bytes.
pub fn encode_pcm16_to_mulaw(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode_sample(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_bytes_decode_near_zero() {
        assert!(decode_sample(0xFF).unsigned_abs() < 20);
        assert!(decode_sample(0x7F).unsigned_abs() < 20);
    }

    #[test]
    fn test_decode_extremes() {
        assert_eq!(decode_sample(0x00), -32124);
        assert_eq!(decode_sample(0x80), 32124);
    }

    #[test]
    fn test_decode_is_odd_symmetric() {
        for b in 0u8..0x80 {
            assert_eq!(decode_sample(b), -decode_sample(b | 0x80), "byte {b:#04x}");
        }
    }

    #[test]
    fn test_every_decoded_value_survives_reencoding() {
        for b in 0..=255u8 {
            let sample = decode_sample(b);
            assert_eq!(decode_sample(encode_sample(sample)), sample, "byte {b:#04x}");
        }
    }

    #[test]
    fn test_quantization_error_is_bounded() {
        for x in (-32000i32..=32000).step_by(97) {
            let decoded = decode_sample(encode_sample(x as i16)) as i32;
            let err = (decoded - x).abs();
            assert!(err <= (x.abs() + BIAS) / 16, "sample {x} decoded as {decoded}");
        }
    }

    #[test]
    fn test_buffer_lengths_match() {
        let bytes: Vec<u8> = (0..=255).collect();
        let pcm = decode_mulaw_to_pcm16(&bytes);
        assert_eq!(pcm.len(), bytes.len());
        assert_eq!(encode_pcm16_to_mulaw(&pcm).len(), bytes.len());
        assert!(decode_mulaw_to_pcm16(&[]).is_empty());
    }

    #[test]
    fn test_clipping() {
        assert_eq!(encode_sample(i16::MAX), encode_sample(32635));
        assert_eq!(encode_sample(i16::MIN + 1), encode_sample(-32635));
    }
}
