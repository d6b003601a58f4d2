//! The text block the SK6 prints at power-on.
//!
//! It starts with `\nSHA` (classified like an ASCII header), followed by
//! seven lines: banner, copyright, firmware revision, hardware revision,
//! serial number, then the modules fitted in the two expansion slots.

use bytes::BytesMut;
use regex::Regex;
use std::sync::LazyLock;
use strum_macros::Display;
use tracing::{debug, info};

use crate::constants::{INFO_LINE_COUNT, INFO_LINE_MAX, LINE_TERMINATOR};
use crate::error::ShakeError;
use crate::transport::{ByteSource, Link};

static REVISION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").ok());

const FIRMWARE_LINE: usize = 2;
const HARDWARE_LINE: usize = 3;
const SERIAL_LINE: usize = 4;
const SLOT1_LINE: usize = 5;
const SLOT2_LINE: usize = 6;

/// Module fitted in an expansion slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum ExpansionModule {
    #[default]
    None,
    #[strum(to_string = "Gyro 1")]
    Gyro1,
    #[strum(to_string = "Gyro 2")]
    Gyro2,
    #[strum(to_string = "RFID")]
    Rfid,
    Audio,
    Vibration,
    #[strum(to_string = "USB")]
    Usb,
    Expansion,
}

impl ExpansionModule {
    const ALL: [ExpansionModule; 8] = [
        ExpansionModule::None,
        ExpansionModule::Gyro1,
        ExpansionModule::Gyro2,
        ExpansionModule::Rfid,
        ExpansionModule::Audio,
        ExpansionModule::Vibration,
        ExpansionModule::Usb,
        ExpansionModule::Expansion,
    ];

    /// Match the start of a slot line against the known module names.
    pub fn from_line(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|module| line.starts_with(&module.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub firmware_revision: f32,
    pub hardware_revision: f32,
    pub serial: String,
    pub modules: [ExpansionModule; 2],
}

impl DeviceInfo {
    /// Parse the seven info lines (terminators already stripped).
    pub fn parse<L: AsRef<str>>(lines: &[L]) -> Result<Self, ShakeError> {
        if lines.len() < INFO_LINE_COUNT {
            return Err(ShakeError::DeviceInfo(format!(
                "expected {INFO_LINE_COUNT} lines, got {}",
                lines.len()
            )));
        }
        let line = |i: usize| lines[i].as_ref();

        let serial = line(SERIAL_LINE)
            .splitn(3, ' ')
            .nth(2)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ShakeError::DeviceInfo(format!("no serial number in {:?}", line(SERIAL_LINE))))?;

        let module = |i: usize| {
            ExpansionModule::from_line(line(i)).unwrap_or_else(|| {
                debug!(line = line(i), "unknown expansion module");
                ExpansionModule::None
            })
        };

        Ok(DeviceInfo {
            firmware_revision: revision(line(FIRMWARE_LINE))?,
            hardware_revision: revision(line(HARDWARE_LINE))?,
            serial,
            modules: [module(SLOT1_LINE), module(SLOT2_LINE)],
        })
    }
}

fn revision(line: &str) -> Result<f32, ShakeError> {
    REVISION
        .as_ref()
        .and_then(|re| re.captures(line))
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| ShakeError::DeviceInfo(format!("no revision number in {line:?}")))
}

fn read_line<S: ByteSource>(link: &mut Link<S>) -> Result<String, ShakeError> {
    let mut line = BytesMut::with_capacity(INFO_LINE_MAX);
    while line.len() < INFO_LINE_MAX {
        match link.read_byte()? {
            Some(LINE_TERMINATOR) => break,
            Some(byte) => line.extend_from_slice(&[byte]),
            None => return Err(ShakeError::DeviceInfo(format!("line cut short after {} bytes", line.len()))),
        }
    }
    Ok(String::from_utf8_lossy(&line).trim_end_matches('\r').to_string())
}

/// Read the info block that follows a `\nSHA` header, including the
/// trailing blank line.
pub fn read_info<S: ByteSource>(link: &mut Link<S>) -> Result<DeviceInfo, ShakeError> {
    let lines = (0..INFO_LINE_COUNT)
        .map(|_| read_line(link))
        .collect::<Result<Vec<_>, _>>()?;
    link.read_byte()?;

    let info = DeviceInfo::parse(&lines)?;
    info!(
        firmware = info.firmware_revision,
        hardware = info.hardware_revision,
        serial = %info.serial,
        slot1 = %info.modules[0],
        slot2 = %info.modules[1],
        "SK6 start-up info"
    );
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BANNER: &[u8] = b"KE SK6\r\n\
        (c) SAMH Engineering\r\n\
        Firmware Revision: 2.10\r\n\
        Hardware Revision: 1.0\r\n\
        Serial Number: SK6-0042\r\n\
        RFID module\r\n\
        None\r\n\
        \n";

    #[test]
    fn test_read_banner() {
        let mut link = Link::new(Cursor::new(BANNER.to_vec()));
        let info = read_info(&mut link).unwrap();
        assert_eq!(info.firmware_revision, 2.10);
        assert_eq!(info.hardware_revision, 1.0);
        assert_eq!(info.serial, "SK6-0042");
        assert_eq!(info.modules, [ExpansionModule::Rfid, ExpansionModule::None]);
        assert_eq!(link.read_byte().unwrap(), None);
    }

    #[test]
    fn test_module_prefix_match() {
        assert_eq!(ExpansionModule::from_line("Gyro 2 (rev B)"), Some(ExpansionModule::Gyro2));
        assert_eq!(ExpansionModule::from_line("Toaster"), None);
    }

    #[test]
    fn test_missing_serial_is_error() {
        let lines = ["a", "b", "Firmware 1.00", "Hardware 1.0", "Serial", "None", "None"];
        assert!(matches!(DeviceInfo::parse(&lines), Err(ShakeError::DeviceInfo(_))));
    }

    #[test]
    fn test_truncated_block_is_error() {
        let mut link = Link::new(Cursor::new(b"KE SK6\r\nonly two".to_vec()));
        assert!(read_info(&mut link).is_err());
    }
}
