//! # MPEG Audio Frame Headers
//!
//! Parses the 4-byte MPEG-1/2/2.5 audio frame header and derives the frame
//! length, so the engine can cut complete frames out of a byte stream.
//!
//! Free-format streams (bitrate index 0) are not supported and their headers
//! are treated as invalid.

/// Bytes in a frame header.
pub const HEADER_LEN: usize = 4;

/// Longest valid frame: MPEG-2.5 Layer II at 160 kbps and 8 kHz, padded.
pub const MAX_FRAME_LEN: usize = 2881;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    I,
    II,
    III,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    /// A 16-bit CRC follows the header.
    pub crc_protected: bool,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub channel_mode: ChannelMode,
}

// Rows: MPEG-1 L1, MPEG-1 L2, MPEG-1 L3, MPEG-2/2.5 L1, MPEG-2/2.5 L2 & L3
const BITRATES_KBPS: [[u32; 15]; 5] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000],
    [22050, 24000, 16000],
    [11025, 12000, 8000],
];

impl FrameHeader {
    /// Parse a header from the first four bytes of `bytes`.
    ///
    /// Returns `None` if there are fewer than four bytes or any field holds
    /// a reserved or unsupported value.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header: [u8; HEADER_LEN] = bytes.get(..HEADER_LEN)?.try_into().ok()?;

        // 11-bit frame sync
        if header[0] != 0xFF || header[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (header[1] >> 3) & 0b11 {
            0b00 => MpegVersion::Mpeg25,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return None,
        };

        let layer = match (header[1] >> 1) & 0b11 {
            0b01 => Layer::III,
            0b10 => Layer::II,
            0b11 => Layer::I,
            _ => return None,
        };

        let crc_protected = header[1] & 1 == 0;

        let bitrate_index = (header[2] >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let row = match (version, layer) {
            (MpegVersion::Mpeg1, Layer::I) => 0,
            (MpegVersion::Mpeg1, Layer::II) => 1,
            (MpegVersion::Mpeg1, Layer::III) => 2,
            (_, Layer::I) => 3,
            (_, _) => 4,
        };
        let bitrate_kbps = BITRATES_KBPS[row][bitrate_index];

        let rate_index = ((header[2] >> 2) & 0b11) as usize;
        if rate_index == 3 {
            return None;
        }
        let sample_rate = match version {
            MpegVersion::Mpeg1 => SAMPLE_RATES[0][rate_index],
            MpegVersion::Mpeg2 => SAMPLE_RATES[1][rate_index],
            MpegVersion::Mpeg25 => SAMPLE_RATES[2][rate_index],
        };

        let padding = (header[2] >> 1) & 1 == 1;

        let channel_mode = match header[3] >> 6 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        Some(Self {
            version,
            layer,
            crc_protected,
            bitrate_kbps,
            sample_rate,
            padding,
            channel_mode,
        })
    }

    /// Total frame length in bytes, header included.
    pub fn frame_len(&self) -> usize {
        let bitrate = self.bitrate_kbps as usize * 1000;
        let rate = self.sample_rate as usize;
        let padding = self.padding as usize;

        match (self.layer, self.version) {
            (Layer::I, _) => (12 * bitrate / rate + padding) * 4,
            (Layer::II, _) | (Layer::III, MpegVersion::Mpeg1) => 144 * bitrate / rate + padding,
            (Layer::III, _) => 72 * bitrate / rate + padding,
        }
    }

    /// Samples per channel carried by one frame.
    pub fn samples_per_frame(&self) -> usize {
        match (self.layer, self.version) {
            (Layer::I, _) => 384,
            (Layer::II, _) | (Layer::III, MpegVersion::Mpeg1) => 1152,
            (Layer::III, _) => 576,
        }
    }

    pub fn channels(&self) -> u16 {
        match self.channel_mode {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

/// Offset of the first valid frame header in `data`.
///
/// Only positions with four bytes left are examined, so a header split at
/// the end of `data` is not found.
pub fn find_sync(data: &[u8]) -> Option<usize> {
    if data.len() < HEADER_LEN {
        return None;
    }
    (0..=data.len() - HEADER_LEN).find(|&i| data[i] == 0xFF && FrameHeader::parse(&data[i..]).is_some())
}
