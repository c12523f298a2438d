//! Command bytes understood by the printer firmware.
//!
//! The command set is an ESC/POS dialect with Phomemo vendor extensions
//! (`1F xx` opcodes). Every constant here was taken from working captures;
//! the printer silently misbehaves if any byte is changed.

/// Most lines a single raster command may address.
pub const MAX_LINES_PER_BLOCK: usize = 255;

/// `GS v 0`: print raster bit image.
const RASTER_OPCODE: [u8; 3] = [0x1D, 0x76, 0x30];
/// Raster mode byte: normal (no double width/height).
const RASTER_MODE_NORMAL: u8 = 0x00;

/// `ESC N 0D 05`: print speed 5 (fast).
const SET_SPEED: [u8; 4] = [0x1B, 0x4E, 0x0D, 0x05];
/// `ESC N 04 0F`: print density 15 (max).
const SET_DENSITY: [u8; 4] = [0x1B, 0x4E, 0x04, 0x0F];
/// Prefix of the 3-byte media type command, followed by the media code.
const MEDIA_TYPE_PREFIX: [u8; 2] = [0x1F, 0x11];

/// `ESC @`, `ESC a 1` (center), then the vendor init `1F 11 02 04`.
const M02_HEADER: [u8; 9] = [0x1B, 0x40, 0x1B, 0x61, 0x01, 0x1F, 0x11, 0x02, 0x04];

const END_SEQUENCE: [u8; 8] = [0x1F, 0xF0, 0x05, 0x00, 0x1F, 0xF0, 0x03, 0x00];
const VENDOR_END_CODES: [u8; 12] = [
    0x1F, 0x11, 0x08, //
    0x1F, 0x11, 0x0E, //
    0x1F, 0x11, 0x07, //
    0x1F, 0x11, 0x09,
];
/// `ESC d n` without its count byte.
const FEED_LINES: [u8; 2] = [0x1B, 0x64];
/// `ESC d 0`.
const FEED_ZERO: [u8; 3] = [0x1B, 0x64, 0x00];
/// `ESC @`.
const RESET: [u8; 2] = [0x1B, 0x40];
/// `FF`.
const FORM_FEED: u8 = 0x0C;
/// `GS V 0`: full cut.
const CUT: [u8; 3] = [0x1D, 0x56, 0x00];

/// Header format, which differs between firmware generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolRevision {
    /// Initialize + center + vendor init. Has no media type.
    M02,
    /// Speed + density + media type, as used by M110/M120/M220 firmware.
    #[default]
    M110,
}

/// Label stock loaded in the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    /// Die-cut labels separated by gaps.
    #[default]
    Gaps,
    Continuous,
    /// Labels with black registration marks.
    Marks,
}

impl MediaType {
    pub fn code(self) -> u8 {
        match self {
            MediaType::Gaps => 0x0A,
            MediaType::Continuous => 0x0B,
            MediaType::Marks => 0x26,
        }
    }
}

/// Trailing command sequence sent after the last raster block.
///
/// Firmware revisions disagree on how a job ends, hence the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FooterVariant {
    /// Two vendor end sequences, plus an optional extra feed.
    #[default]
    Standard,
    None,
    Reset,
    Multi,
    Simple,
    NoFeed,
    FormFeed,
    Cut,
}

impl FooterVariant {
    pub const ALL: [FooterVariant; 8] = [
        FooterVariant::Standard,
        FooterVariant::None,
        FooterVariant::Reset,
        FooterVariant::Multi,
        FooterVariant::Simple,
        FooterVariant::NoFeed,
        FooterVariant::FormFeed,
        FooterVariant::Cut,
    ];

    /// Encodes the footer.
    ///
    /// - `feed_lines`: extra blank lines to feed, only honored by `Standard`
    pub fn encode(self, feed_lines: Option<u8>) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        match self {
            FooterVariant::Standard => {
                out.extend_from_slice(&END_SEQUENCE);
                if let Some(n) = feed_lines {
                    out.extend_from_slice(&FEED_LINES);
                    out.push(n);
                }
            }
            FooterVariant::None => {}
            FooterVariant::Reset => out.extend_from_slice(&RESET),
            FooterVariant::Multi => {
                out.extend_from_slice(&FEED_ZERO);
                out.extend_from_slice(&RESET);
                out.push(FORM_FEED);
            }
            FooterVariant::Simple => out.extend_from_slice(&FEED_ZERO),
            FooterVariant::NoFeed => {
                out.extend_from_slice(&FEED_ZERO);
                out.extend_from_slice(&VENDOR_END_CODES);
            }
            FooterVariant::FormFeed => {
                out.push(FORM_FEED);
                out.extend_from_slice(&VENDOR_END_CODES);
            }
            FooterVariant::Cut => {
                out.extend_from_slice(&CUT);
                out.extend_from_slice(&VENDOR_END_CODES);
            }
        }
        out
    }
}

/// Converts a trailing feed in millimeters to a line count for `ESC d n`.
///
/// Returns `None` when no feed was requested. Counts saturate at 255.
pub fn feed_lines(extra_feed_mm: f32, pixels_per_mm: f32) -> Option<u8> {
    if extra_feed_mm > 0.0 {
        let lines = (extra_feed_mm * pixels_per_mm).round();
        Some(lines.clamp(0.0, u8::MAX as f32) as u8)
    } else {
        None
    }
}

/// Builds the job header.
///
/// `media` is ignored by [`ProtocolRevision::M02`].
pub fn header(revision: ProtocolRevision, media: MediaType) -> Vec<u8> {
    match revision {
        ProtocolRevision::M02 => M02_HEADER.to_vec(),
        ProtocolRevision::M110 => {
            let mut out = Vec::with_capacity(11);
            out.extend_from_slice(&SET_SPEED);
            out.extend_from_slice(&SET_DENSITY);
            out.extend_from_slice(&MEDIA_TYPE_PREFIX);
            out.push(media.code());
            out
        }
    }
}

/// Builds the `GS v 0` marker that precedes a block of raster rows.
///
/// - `bytes_per_row`: row width in bytes
/// - `lines`: rows in the block, clamped to [`MAX_LINES_PER_BLOCK`]
pub fn block_marker(bytes_per_row: u16, lines: usize) -> [u8; 8] {
    let lines = usize::min(lines, MAX_LINES_PER_BLOCK) as u16;
    let [w_lo, w_hi] = bytes_per_row.to_le_bytes();
    let [h_lo, h_hi] = lines.to_le_bytes();
    [
        RASTER_OPCODE[0],
        RASTER_OPCODE[1],
        RASTER_OPCODE[2],
        RASTER_MODE_NORMAL,
        w_lo,
        w_hi,
        h_lo,
        h_hi,
    ]
}

/// Formats bytes as `0x1b 0x4e ...` for debug output.
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("0x{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
