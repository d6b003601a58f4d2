use tracing::warn;

use crate::ack::AckResult;
use crate::ascii::{AsciiFrame, AsciiPacket};
use crate::error::ShakeError;
use crate::fields;
use crate::packet::PacketType;
use crate::sensors::{Channel, SensorState, ShakeEvent, ShakingReading};
use crate::session::{Session, lock};

// field offsets within the live layouts
const FIRST: usize = 5;
const SECOND: usize = 11;
const THIRD: usize = 17;
const TRIPLE_SEQ: usize = 23;
const SINGLE_SEQ: usize = 10;
const EVENT_SEQ: usize = 5;
const ACK_ADDRESS: usize = 5;
const ACK_VALUE: usize = 10;

/// Apply an ASCII packet to the session.
pub fn extract(session: &mut Session, packet: AsciiPacket) -> Result<(), ShakeError> {
    match packet {
        AsciiPacket::Frame(frame) => extract_frame(session, &frame),
        AsciiPacket::PlaybackComplete => {
            session.raise(ShakeEvent::PlaybackComplete);
            Ok(())
        }
        AsciiPacket::RfidTag(tag) => {
            session.sensors().last_rfid = Some(tag);
            session.raise(ShakeEvent::RfidTag);
            Ok(())
        }
        AsciiPacket::StartupInfo(info) => {
            *lock(&session.device_info) = Some(info);
            Ok(())
        }
    }
}

fn triple(buf: &[u8]) -> Result<[i16; 3], ShakeError> {
    Ok([
        fields::decimal_i16(buf, FIRST, 5)?,
        fields::decimal_i16(buf, SECOND, 5)?,
        fields::decimal_i16(buf, THIRD, 5)?,
    ])
}

fn seq_field(buf: &[u8], offset: usize) -> Result<u8, ShakeError> {
    let value = fields::decimal(buf, offset, 2)?;
    u8::try_from(value).map_err(|_| ShakeError::InvalidField {
        offset,
        message: format!("sequence {value} out of range"),
    })
}

fn extract_frame(session: &mut Session, frame: &AsciiFrame) -> Result<(), ShakeError> {
    let buf = &frame.bytes[..];
    let kind = frame.kind;

    match kind {
        PacketType::Acc | PacketType::Gyro | PacketType::Mag => {
            let values = triple(buf)?;
            let seq = seq_field(buf, TRIPLE_SEQ)?;
            let channel = update(session, kind, seq, |s| match kind {
                PacketType::Acc => s.acc = values,
                PacketType::Gyro => s.gyro = values,
                _ => s.mag = values,
            });
            if let Some(envelope) = frame.playback {
                session.log_playback(envelope.seconds(), channel, &values.map(i32::from));
            }
        }
        PacketType::Heading | PacketType::Cap0 | PacketType::Cap1 | PacketType::Analog0 | PacketType::Analog1 => {
            let value = fields::decimal_u16(buf, FIRST, 4)?;
            let seq = seq_field(buf, SINGLE_SEQ)?;
            let channel = update(session, kind, seq, |s| match kind {
                PacketType::Heading => s.heading = value,
                PacketType::Cap0 => s.cap[0] = value,
                PacketType::Cap1 => s.cap[1] = value,
                PacketType::Analog0 => s.analog[0] = value,
                _ => s.analog[1] = value,
            });
            if let Some(envelope) = frame.playback {
                session.log_playback(envelope.seconds(), channel, &[i32::from(value)]);
            }
        }
        PacketType::Shaking => {
            let [peak_accel, direction, timestamp] = triple(buf)?;
            let seq = seq_field(buf, TRIPLE_SEQ)?;
            update(session, kind, seq, |s| {
                s.shaking = ShakingReading {
                    peak_accel,
                    direction,
                    timestamp,
                }
            });
            session.raise(ShakeEvent::Shaking);
        }
        PacketType::HeartRate => {
            let bpm = fields::decimal_u16(buf, FIRST, 4)?;
            let seq = seq_field(buf, SINGLE_SEQ)?;
            update(session, kind, seq, |s| s.heart_rate = bpm);
            session.raise(ShakeEvent::HeartRate);
            // TODO: confirm with the firmware owners whether $HRB should count
            // as a failed extraction; older drivers returned an error after
            // storing the value.
        }
        PacketType::NavUp
        | PacketType::NavDown
        | PacketType::NavCentre
        | PacketType::NavNormal
        | PacketType::Cap0Upper
        | PacketType::Cap0Lower
        | PacketType::Cap1Upper
        | PacketType::Cap1Lower => {
            seq_field(buf, EVENT_SEQ)?;
            let event = match kind {
                PacketType::NavUp => ShakeEvent::NavUp,
                PacketType::NavDown => ShakeEvent::NavDown,
                PacketType::NavCentre => ShakeEvent::NavCentre,
                PacketType::NavNormal => ShakeEvent::NavNormal,
                PacketType::Cap0Upper => ShakeEvent::Cap0Upper,
                PacketType::Cap0Lower => ShakeEvent::Cap0Lower,
                PacketType::Cap1Upper => ShakeEvent::Cap1Upper,
                _ => ShakeEvent::Cap1Lower,
            };
            session.raise(event);
        }
        PacketType::Ack | PacketType::Nak => return acknowledge(session, kind, buf),
        PacketType::Timestamp | PacketType::PlaybackComplete | PacketType::RfidTag | PacketType::StartupInfo => {
            return Err(ShakeError::decode(kind, "control packet reached the data extractor"));
        }
        PacketType::RawAcc
        | PacketType::RawGyro
        | PacketType::RawMag
        | PacketType::RawHeading
        | PacketType::RawCap0
        | PacketType::RawCap1
        | PacketType::RawAnalog0
        | PacketType::RawAnalog1
        | PacketType::RawEvent
        | PacketType::RawShaking
        | PacketType::RawAudioExp
        | PacketType::RawAudio
        | PacketType::RawAudioHeader => {
            return Err(ShakeError::decode(kind, "raw packet in ASCII extractor"));
        }
    }

    if frame.playback.is_some() {
        session.sensors().playback_packets += 1;
    }
    Ok(())
}

/// Apply `apply` and the sequence number under one lock, then announce the
/// update. Returns the channel that changed.
fn update(session: &Session, kind: PacketType, seq: u8, apply: impl FnOnce(&mut SensorState)) -> Channel {
    // only called for kinds that have a channel
    let channel = kind.seq_channel().unwrap_or(Channel::Acc);
    {
        let mut sensors = session.sensors();
        apply(&mut *sensors);
        sensors.set_seq(channel, seq);
    }
    session.updated(channel);
    channel
}

fn acknowledge(session: &Session, kind: PacketType, buf: &[u8]) -> Result<(), ShakeError> {
    if !session.acks.is_pending() {
        warn!(packet = %String::from_utf8_lossy(buf).trim_end(), "acknowledgment with no command outstanding");
        return Err(ShakeError::UnexpectedAcknowledgment);
    }
    let result = match kind {
        PacketType::Ack => AckResult::Ack {
            address: fields::hex_u32(buf, ACK_ADDRESS, 4)? as u16,
            value: fields::hex_u32(buf, ACK_VALUE, 2)? as u8,
        },
        _ => AckResult::Nak,
    };
    session.acks.complete(result)
}
