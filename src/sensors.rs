use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use strum_macros::Display;

/// Sequence counter slots. The first eight are the sensor channels and keep
/// the numeric ids written to playback logs; the rest exist so the raw framer
/// can disambiguate trailing bytes for every raw packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Channel {
    #[strum(to_string = "ACC")]
    Acc = 0,
    #[strum(to_string = "GYR")]
    Gyro = 1,
    #[strum(to_string = "MAG")]
    Mag = 2,
    #[strum(to_string = "HED")]
    Heading = 3,
    #[strum(to_string = "CS0")]
    Cap0 = 4,
    #[strum(to_string = "CS1")]
    Cap1 = 5,
    #[strum(to_string = "AI0")]
    Analog0 = 6,
    #[strum(to_string = "AI1")]
    Analog1 = 7,
    #[strum(to_string = "SHK")]
    Shaking = 8,
    #[strum(to_string = "HRB")]
    HeartRate = 9,
    #[strum(to_string = "EVT")]
    Events = 10,
    #[strum(to_string = "AUD")]
    Audio = 11,
    #[strum(to_string = "AUX")]
    AudioExp = 12,
    #[strum(to_string = "AUH")]
    AudioHeader = 13,
}

impl Channel {
    pub const COUNT: usize = 14;

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

/// Discrete events raised by navigation, capacitive and other event packets.
/// ASCII and raw packets resolve to the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ShakeEvent {
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
    RfidTag,
    PlaybackComplete,
}

/// Shaking-event detail reported by the SK6's on-board detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShakingReading {
    pub peak_accel: i16,
    pub direction: i16,
    pub timestamp: i16,
}

/// Latest decoded value of every sensor channel.
///
/// Written only by the reader loop; other threads take snapshots through the
/// device handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorState {
    pub acc: [i16; 3],
    pub gyro: [i16; 3],
    pub mag: [i16; 3],
    /// Tenths of a degree
    pub heading: u16,
    pub cap: [u16; 2],
    pub analog: [u16; 2],
    pub shaking: ShakingReading,
    pub heart_rate: u16,
    pub last_event: Option<ShakeEvent>,
    pub last_rfid: Option<String>,
    /// Playback packets extracted since start-up
    pub playback_packets: u64,
    seq: [u8; Channel::COUNT],
}

impl SensorState {
    pub fn seq(&self, channel: Channel) -> u8 {
        self.seq[channel.index()]
    }

    pub fn set_seq(&mut self, channel: Channel, value: u8) {
        self.seq[channel.index()] = value;
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ACC {:?} GYR {:?} MAG {:?} HED {:.1}° CAP {:?} ANA {:?} HR {} bpm",
            self.acc,
            self.gyro,
            self.mag,
            self.heading as f64 / 10.0,
            self.cap,
            self.analog,
            self.heart_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ids_match_log_format() {
        assert_eq!(Channel::Acc.index(), 0);
        assert_eq!(Channel::Analog1.index(), 7);
        assert_eq!(Channel::Heading.to_string(), "HED");
        assert_eq!(Channel::try_from(4u8).unwrap(), Channel::Cap0);
    }

    #[test]
    fn test_seq_counters_are_independent() {
        let mut state = SensorState::default();
        state.set_seq(Channel::Gyro, 200);
        state.set_seq(Channel::Audio, 7);
        assert_eq!(state.seq(Channel::Gyro), 200);
        assert_eq!(state.seq(Channel::Audio), 7);
        assert_eq!(state.seq(Channel::Acc), 0);
    }
}
