//! Packet type table and header classification.
//!
//! Every packet the SK6 can emit is one [`PacketType`]. The enum discriminants
//! are laid out so that all ASCII kinds form one contiguous range ending at
//! [`PacketType::StartupInfo`]; the raw kinds follow. The per-type wire facts
//! (header code or selector byte, fixed length, checksum eligibility) live in
//! exhaustive `match`es on the enum rather than in parallel arrays.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;

use crate::constants::{ASCII_HEADER_LEN, RAW_HEADER_LEN, RAW_MARKER};
use crate::sensors::Channel;

/// The two wire encodings the SK6 interleaves on one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum WireFormat {
    Ascii,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketType {
    // ASCII data packets
    Acc = 0,
    Gyro,
    Mag,
    Heading,
    Cap0,
    Cap1,
    Analog0,
    Analog1,
    NavUp,
    NavDown,
    NavCentre,
    NavNormal,
    Cap0Upper,
    Cap0Lower,
    Cap1Upper,
    Cap1Lower,
    Shaking,
    HeartRate,
    // ASCII control packets
    Timestamp,
    PlaybackComplete,
    RfidTag,
    Ack,
    Nak,
    /// Last ASCII kind; classification never scans past it.
    StartupInfo,

    // raw packets
    RawAcc,
    RawGyro,
    RawMag,
    RawHeading,
    RawCap0,
    RawCap1,
    RawAnalog0,
    RawAnalog1,
    RawEvent,
    RawShaking,
    RawAudioExp,
    RawAudio,
    RawAudioHeader,
}

impl PacketType {
    /// ASCII kinds in classification order.
    pub const ASCII: [PacketType; 24] = [
        PacketType::Acc,
        PacketType::Gyro,
        PacketType::Mag,
        PacketType::Heading,
        PacketType::Cap0,
        PacketType::Cap1,
        PacketType::Analog0,
        PacketType::Analog1,
        PacketType::NavUp,
        PacketType::NavDown,
        PacketType::NavCentre,
        PacketType::NavNormal,
        PacketType::Cap0Upper,
        PacketType::Cap0Lower,
        PacketType::Cap1Upper,
        PacketType::Cap1Lower,
        PacketType::Shaking,
        PacketType::HeartRate,
        PacketType::Timestamp,
        PacketType::PlaybackComplete,
        PacketType::RfidTag,
        PacketType::Ack,
        PacketType::Nak,
        PacketType::StartupInfo,
    ];

    pub const RAW: [PacketType; 13] = [
        PacketType::RawAcc,
        PacketType::RawGyro,
        PacketType::RawMag,
        PacketType::RawHeading,
        PacketType::RawCap0,
        PacketType::RawCap1,
        PacketType::RawAnalog0,
        PacketType::RawAnalog1,
        PacketType::RawEvent,
        PacketType::RawShaking,
        PacketType::RawAudioExp,
        PacketType::RawAudio,
        PacketType::RawAudioHeader,
    ];

    /// Wire format, decided by which discriminant range the type falls in.
    pub fn format(self) -> WireFormat {
        let value: u8 = self.into();
        if value < u8::from(PacketType::RawAcc) {
            WireFormat::Ascii
        } else {
            WireFormat::Raw
        }
    }

    pub fn is_ascii(self) -> bool {
        self.format() == WireFormat::Ascii
    }

    /// The 4-byte ASCII header, or `None` for raw kinds.
    pub fn ascii_code(self) -> Option<&'static [u8; 4]> {
        let code: &'static [u8; 4] = match self {
            PacketType::Acc => b"$ACC",
            PacketType::Gyro => b"$GYR",
            PacketType::Mag => b"$MAG",
            PacketType::Heading => b"$HED",
            PacketType::Cap0 => b"$CS0",
            PacketType::Cap1 => b"$CS1",
            PacketType::Analog0 => b"$AI0",
            PacketType::Analog1 => b"$AI1",
            PacketType::NavUp => b"$NVU",
            PacketType::NavDown => b"$NVD",
            PacketType::NavCentre => b"$NVC",
            PacketType::NavNormal => b"$NVN",
            PacketType::Cap0Upper => b"$CU0",
            PacketType::Cap0Lower => b"$CL0",
            PacketType::Cap1Upper => b"$CU1",
            PacketType::Cap1Lower => b"$CL1",
            PacketType::Shaking => b"$SHK",
            PacketType::HeartRate => b"$HRB",
            PacketType::Timestamp => b"$TIM",
            PacketType::PlaybackComplete => b"$PLC",
            PacketType::RfidTag => b"$RFI",
            PacketType::Ack => b"$ACK",
            PacketType::Nak => b"$NAK",
            PacketType::StartupInfo => b"\nSHA",
            _ => return None,
        };
        Some(code)
    }

    /// The selector byte following `0x7F 0x7F`, or `None` for ASCII kinds.
    pub fn raw_selector(self) -> Option<u8> {
        let selector = match self {
            PacketType::RawAcc => 0x7E,
            PacketType::RawGyro => 0x7D,
            PacketType::RawMag => 0x7C,
            PacketType::RawHeading => 0x7B,
            PacketType::RawCap0 => 0x7A,
            PacketType::RawCap1 => 0x79,
            PacketType::RawAnalog0 => 0x78,
            PacketType::RawAnalog1 => 0x77,
            PacketType::RawEvent => 0x76,
            PacketType::RawShaking => 0x75,
            PacketType::RawAudioExp => 0x74,
            PacketType::RawAudio => 0x70,
            PacketType::RawAudioHeader => 0x6D,
            _ => return None,
        };
        Some(selector)
    }

    /// Full packet length including header, for a live packet without a
    /// checksum trailer. Raw lengths include the optional sequence byte.
    pub fn wire_len(self) -> usize {
        match self {
            PacketType::Acc | PacketType::Gyro | PacketType::Mag | PacketType::Shaking => 27,
            PacketType::Heading
            | PacketType::Cap0
            | PacketType::Cap1
            | PacketType::Analog0
            | PacketType::Analog1
            | PacketType::HeartRate => 14,
            PacketType::NavUp
            | PacketType::NavDown
            | PacketType::NavCentre
            | PacketType::NavNormal
            | PacketType::Cap0Upper
            | PacketType::Cap0Lower
            | PacketType::Cap1Upper
            | PacketType::Cap1Lower => 9,
            PacketType::Timestamp => 16,
            PacketType::PlaybackComplete => 6,
            PacketType::RfidTag => 23,
            PacketType::Ack | PacketType::Nak => 14,
            PacketType::StartupInfo => ASCII_HEADER_LEN,

            PacketType::RawAcc | PacketType::RawGyro | PacketType::RawMag | PacketType::RawShaking => 10,
            PacketType::RawHeading
            | PacketType::RawCap0
            | PacketType::RawCap1
            | PacketType::RawAnalog0
            | PacketType::RawAnalog1
            | PacketType::RawEvent => 6,
            PacketType::RawAudioExp | PacketType::RawAudio => 36,
            PacketType::RawAudioHeader => 4,
        }
    }

    pub fn header_len(self) -> usize {
        match self.format() {
            WireFormat::Ascii => ASCII_HEADER_LEN,
            WireFormat::Raw => RAW_HEADER_LEN,
        }
    }

    /// Whether the packet may carry the 3-byte ASCII checksum trailer.
    pub fn has_checksum(self) -> bool {
        matches!(
            self,
            PacketType::Acc
                | PacketType::Gyro
                | PacketType::Mag
                | PacketType::Heading
                | PacketType::Cap0
                | PacketType::Cap1
                | PacketType::Analog0
                | PacketType::Analog1
                | PacketType::NavUp
                | PacketType::NavDown
                | PacketType::NavCentre
                | PacketType::NavNormal
                | PacketType::Cap0Upper
                | PacketType::Cap0Lower
                | PacketType::Cap1Upper
                | PacketType::Cap1Lower
                | PacketType::Shaking
                | PacketType::HeartRate
        )
    }

    /// ASCII data packets that can appear inside a `$TIM` playback envelope.
    pub fn is_playback_payload(self) -> bool {
        self.is_ascii() && self.has_checksum()
    }

    /// Sequence counter slot consulted and updated for this packet type.
    pub fn seq_channel(self) -> Option<Channel> {
        let channel = match self {
            PacketType::Acc | PacketType::RawAcc => Channel::Acc,
            PacketType::Gyro | PacketType::RawGyro => Channel::Gyro,
            PacketType::Mag | PacketType::RawMag => Channel::Mag,
            PacketType::Heading | PacketType::RawHeading => Channel::Heading,
            PacketType::Cap0 | PacketType::RawCap0 => Channel::Cap0,
            PacketType::Cap1 | PacketType::RawCap1 => Channel::Cap1,
            PacketType::Analog0 | PacketType::RawAnalog0 => Channel::Analog0,
            PacketType::Analog1 | PacketType::RawAnalog1 => Channel::Analog1,
            PacketType::Shaking | PacketType::RawShaking => Channel::Shaking,
            PacketType::HeartRate => Channel::HeartRate,
            PacketType::RawEvent => Channel::Events,
            PacketType::RawAudio => Channel::Audio,
            PacketType::RawAudioExp => Channel::AudioExp,
            PacketType::RawAudioHeader => Channel::AudioHeader,
            _ => return None,
        };
        Some(channel)
    }
}

/// Identify a packet from its header window.
///
/// ASCII windows must be exactly 4 bytes and match one of the type codes;
/// raw windows must be exactly 3 bytes starting with `0x7F 0x7F`. Anything
/// else is unrecognized.
pub fn classify_header(window: &[u8], format: WireFormat) -> Option<PacketType> {
    match format {
        WireFormat::Ascii => {
            if window.len() != ASCII_HEADER_LEN {
                return None;
            }
            // the table ends at StartupInfo, so control kinds bound the scan
            PacketType::ASCII
                .iter()
                .copied()
                .find(|kind| kind.ascii_code().is_some_and(|code| code.as_slice() == window))
        }
        WireFormat::Raw => {
            if window.len() != RAW_HEADER_LEN || window[0] != RAW_MARKER || window[1] != RAW_MARKER {
                return None;
            }
            PacketType::RAW
                .iter()
                .copied()
                .find(|kind| kind.raw_selector() == Some(window[2]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_range_is_contiguous() {
        for kind in PacketType::ASCII {
            assert_eq!(kind.format(), WireFormat::Ascii, "{kind} should be ASCII");
        }
        for kind in PacketType::RAW {
            assert_eq!(kind.format(), WireFormat::Raw, "{kind} should be raw");
        }
        assert_eq!(
            PacketType::ASCII.len() + PacketType::RAW.len(),
            u8::from(PacketType::RawAudioHeader) as usize + 1
        );
    }

    #[test]
    fn test_classify_every_ascii_code() {
        for kind in PacketType::ASCII {
            let code = kind.ascii_code().unwrap();
            assert_eq!(classify_header(code, WireFormat::Ascii), Some(kind));
        }
    }

    #[test]
    fn test_classify_every_raw_selector() {
        for kind in PacketType::RAW {
            let window = [RAW_MARKER, RAW_MARKER, kind.raw_selector().unwrap()];
            assert_eq!(classify_header(&window, WireFormat::Raw), Some(kind));
        }
    }

    #[test]
    fn test_classify_rejects_bad_windows() {
        assert_eq!(classify_header(b"", WireFormat::Ascii), None);
        assert_eq!(classify_header(b"$AC", WireFormat::Ascii), None);
        assert_eq!(classify_header(b"$ACCX", WireFormat::Ascii), None);
        assert_eq!(classify_header(b"$XYZ", WireFormat::Ascii), None);
        assert_eq!(classify_header(&[0x7F, 0x7E, 0x7E], WireFormat::Raw), None);
        assert_eq!(classify_header(&[0x7F, 0x7F, 0x01], WireFormat::Raw), None);
        assert_eq!(classify_header(&[0x7F, 0x7F], WireFormat::Raw), None);
        // a raw window is never an ASCII header and vice versa
        assert_eq!(classify_header(&[0x7F, 0x7F, 0x7E, 0x00], WireFormat::Ascii), None);
        assert_eq!(classify_header(b"$AC", WireFormat::Raw), None);
    }

    #[test]
    fn test_packets_fit_resync_window() {
        for kind in PacketType::ASCII.iter().chain(PacketType::RAW.iter()) {
            assert!(kind.wire_len() < 40, "{kind} is {} bytes", kind.wire_len());
            assert!(kind.wire_len() >= kind.header_len());
        }
    }
}
