use bytes::Buf;
use tracing::trace;

use crate::audio;
use crate::constants::RAW_HEADER_LEN;
use crate::error::ShakeError;
use crate::notify::{Interest, Notification};
use crate::packet::PacketType;
use crate::raw::RawFrame;
use crate::sensors::{ShakeEvent, ShakingReading};
use crate::session::Session;

/// Map a raw event code onto the shared event space.
pub fn event_from_code(code: u16) -> Option<ShakeEvent> {
    let event = match code {
        1 => ShakeEvent::NavNormal,
        2 => ShakeEvent::NavUp,
        3 => ShakeEvent::NavDown,
        4 => ShakeEvent::NavCentre,
        5 => ShakeEvent::Cap0Upper,
        6 => ShakeEvent::Cap0Lower,
        7 => ShakeEvent::Cap1Upper,
        8 => ShakeEvent::Cap1Lower,
        _ => return None,
    };
    Some(event)
}

/// Apply a raw packet to the session.
pub fn extract(session: &mut Session, frame: &RawFrame) -> Result<(), ShakeError> {
    let kind = frame.kind;
    let mut body = frame.body();
    let expected = kind.wire_len() - RAW_HEADER_LEN - 1;
    if body.remaining() < expected {
        return Err(ShakeError::decode(
            kind,
            format!("body is {} bytes, need {expected}", body.remaining()),
        ));
    }

    let (updated, event) = match kind {
        PacketType::RawAcc | PacketType::RawGyro | PacketType::RawMag | PacketType::RawShaking => {
            let values = [body.get_i16_le(), body.get_i16_le(), body.get_i16_le()];
            let mut sensors = session.sensors();
            match kind {
                PacketType::RawAcc => sensors.acc = values,
                PacketType::RawGyro => sensors.gyro = values,
                PacketType::RawMag => sensors.mag = values,
                _ => {
                    sensors.shaking = ShakingReading {
                        peak_accel: values[0],
                        direction: values[1],
                        timestamp: values[2],
                    }
                }
            }
            let event = (kind == PacketType::RawShaking).then_some(ShakeEvent::Shaking);
            (kind.seq_channel(), event)
        }
        PacketType::RawHeading
        | PacketType::RawCap0
        | PacketType::RawCap1
        | PacketType::RawAnalog0
        | PacketType::RawAnalog1 => {
            let value = body.get_u16_le();
            let mut sensors = session.sensors();
            match kind {
                PacketType::RawHeading => sensors.heading = value,
                PacketType::RawCap0 => sensors.cap[0] = value,
                PacketType::RawCap1 => sensors.cap[1] = value,
                PacketType::RawAnalog0 => sensors.analog[0] = value,
                _ => sensors.analog[1] = value,
            }
            (kind.seq_channel(), None)
        }
        PacketType::RawEvent => {
            let code = body.get_u16_le();
            let event = event_from_code(code)
                .ok_or_else(|| ShakeError::decode(kind, format!("unknown event code {code}")))?;
            (None, Some(event))
        }
        PacketType::RawAudio | PacketType::RawAudioExp => {
            if session.wants(Interest::Audio) {
                session.notify(Notification::AudioSamples {
                    samples: audio::decode_frame(body),
                    expansion: kind == PacketType::RawAudioExp,
                });
            }
            (None, None)
        }
        PacketType::RawAudioHeader => {
            if session.wants(Interest::Audio) {
                session.notify(Notification::AudioRequest);
            }
            (None, None)
        }
        _ => return Err(ShakeError::decode(kind, "ASCII packet in raw extractor")),
    };

    if let (Some(seq), Some(channel)) = (frame.seq(), kind.seq_channel()) {
        trace!(%channel, seq, "sequence");
        session.sensors().set_seq(channel, seq);
    }
    if let Some(channel) = updated {
        session.updated(channel);
    }
    if let Some(event) = event {
        session.raise(event);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use crate::sensors::Channel;
    use bytes::BytesMut;

    struct Silent;

    impl Notifier for Silent {
        fn wants(&self, _: Interest) -> bool {
            false
        }
        fn notify(&self, _: Notification) {}
    }

    fn frame(bytes: &[u8], kind: PacketType, has_seq: bool) -> RawFrame {
        RawFrame {
            kind,
            bytes: BytesMut::from(bytes),
            has_seq,
        }
    }

    #[test]
    fn test_every_event_code_maps() {
        let events: Vec<_> = (1..=8).filter_map(event_from_code).collect();
        assert_eq!(events.len(), 8);
        assert_eq!(event_from_code(0), None);
        assert_eq!(event_from_code(9), None);
    }

    #[test]
    fn test_inertial_values_are_signed() {
        let mut session = Session::new(Box::new(Silent));
        let f = frame(&[0x7F, 0x7F, 0x7C, 0xFF, 0xFF, 0x00, 0x80, 0x10, 0x00, 0x21], PacketType::RawMag, true);
        extract(&mut session, &f).unwrap();
        let s = session.snapshot();
        assert_eq!(s.mag, [-1, i16::MIN, 16]);
        assert_eq!(s.seq(Channel::Mag), 0x21);
    }

    #[test]
    fn test_sequence_untouched_without_trailing_byte() {
        let mut session = Session::new(Box::new(Silent));
        session.sensors().set_seq(Channel::Analog1, 9);
        extract(&mut session, &frame(&[0x7F, 0x7F, 0x77, 0xE8, 0x03], PacketType::RawAnalog1, false)).unwrap();
        let s = session.snapshot();
        assert_eq!(s.analog[1], 1000);
        assert_eq!(s.seq(Channel::Analog1), 9);
    }

    #[test]
    fn test_unknown_event_code_is_decode_error() {
        let mut session = Session::new(Box::new(Silent));
        let err = extract(&mut session, &frame(&[0x7F, 0x7F, 0x76, 0x09, 0x00], PacketType::RawEvent, false));
        assert!(matches!(err, Err(ShakeError::Decode { .. })));
        assert_eq!(session.snapshot().last_event, None);
    }

    #[test]
    fn test_event_is_recorded_without_listener() {
        let mut session = Session::new(Box::new(Silent));
        extract(&mut session, &frame(&[0x7F, 0x7F, 0x76, 0x04, 0x00, 0x01], PacketType::RawEvent, true)).unwrap();
        let s = session.snapshot();
        assert_eq!(s.last_event, Some(ShakeEvent::NavCentre));
        assert_eq!(s.seq(Channel::Events), 1);
    }
}
