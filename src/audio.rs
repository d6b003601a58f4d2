//! μ-law sample conversion for the SK6 audio module.

use bytes::{BufMut, BytesMut};

use crate::constants::{AUDIO_FRAME_LEN, AUDIO_PLAYBACK_SELECTOR, RAW_MARKER};

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

/// Length of a host→device audio playback packet (header + samples, no sequence byte).
pub const PLAYBACK_PACKET_LEN: usize = 3 + AUDIO_FRAME_LEN;

pub fn decode_sample(byte: u8) -> i16 {
    let byte = !byte;
    let exponent = (byte >> 4) & 0x07;
    let mantissa = (byte & 0x0F) as i32;
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if byte & 0x80 != 0 { -magnitude as i16 } else { magnitude as i16 }
}

pub fn encode_sample(sample: i16) -> u8 {
    let mut value = sample as i32;
    let sign = if value < 0 {
        value = -value;
        0x80
    } else {
        0
    };
    value = value.min(CLIP) + BIAS;

    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && value & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = (value >> (exponent + 3)) & 0x0F;
    !((sign | (exponent << 4) | mantissa) as u8)
}

pub fn decode_frame(encoded: &[u8]) -> Vec<i16> {
    encoded.iter().map(|&b| decode_sample(b)).collect()
}

/// Build the raw packet that carries one frame of samples to the speaker.
pub fn encode_playback_packet(frame: &[i16; AUDIO_FRAME_LEN]) -> BytesMut {
    let mut packet = BytesMut::with_capacity(PLAYBACK_PACKET_LEN);
    packet.put_slice(&[RAW_MARKER, RAW_MARKER, AUDIO_PLAYBACK_SELECTOR]);
    for &sample in frame {
        packet.put_u8(encode_sample(sample));
    }
    packet
}
