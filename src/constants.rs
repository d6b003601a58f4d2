// Protocol constants for the SHAKE SK6

/// Size of an ASCII packet header (`$` + 3-character type code)
pub const ASCII_HEADER_LEN: usize = 4;

/// Size of a raw packet header (two marker bytes + type selector)
pub const RAW_HEADER_LEN: usize = 3;

/// Lead character of every ASCII packet
pub const ASCII_LEAD: u8 = b'$';

/// First byte of the start-up banner, classified as an ASCII header
pub const STARTUP_LEAD: u8 = b'\n';

/// Raw packet marker, repeated twice at the start of every raw header
pub const RAW_MARKER: u8 = 0x7F;

/// Line terminator ending ASCII packets
pub const LINE_TERMINATOR: u8 = b'\n';

/// Length of the optional ASCII checksum trailer
pub const CHECKSUM_LEN: usize = 3;

/// Length of the `,ss` live sequence field, absent from playback packets
pub const PLAYBACK_SEQ_FIELD_LEN: usize = 3;

/// Replaces the final `\r\n` of a playback packet so that field offsets match
/// a live packet
pub const PLAYBACK_SEQ_FILLER: &[u8; 5] = b",00\r\n";

/// Maximum number of bytes examined while hunting for the next header.
/// The largest SK6 packet is under 40 bytes.
pub const RESYNC_SCAN_LIMIT: usize = 50;

/// Working buffer capacity for one framed packet
pub const MAX_PACKET_LEN: usize = 64;

/// Number of μ-law samples carried by one audio packet
pub const AUDIO_FRAME_LEN: usize = 32;

/// Length of an RFID tag identifier in an `$RFI` packet
pub const RFID_TAG_LEN: usize = 16;

/// Width of the decimal timestamp in a `$TIM` envelope
pub const TIMESTAMP_DIGITS: usize = 10;

/// Number of text lines in the start-up info block
pub const INFO_LINE_COUNT: usize = 7;

/// Maximum length of one start-up info line
pub const INFO_LINE_MAX: usize = 64;

/// Selector of the host→device audio playback packet
pub const AUDIO_PLAYBACK_SELECTOR: u8 = 0x6E;
