//! Core PCM types used throughout narrate
//!
//! Narration audio is always interleaved signed 16-bit linear PCM, mono or
//! stereo, in either byte order. Every byte offset exchanged between the engine and its
//! collaborators must sit on a frame boundary (a multiple of `block_align`).

use thiserror::Error;

/// Bit depth of the only sample encoding the engine decodes
pub const SUPPORTED_BIT_DEPTH: u16 = 16;

/// Errors raised when describing a PCM stream the engine cannot draw
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Only mono and stereo streams are supported
    #[error("Unsupported channel count: {0} (expected 1 or 2)")]
    UnsupportedChannelCount(u16),

    /// Only 16-bit signed samples are supported
    #[error("Unsupported bit depth: {0} (expected 16)")]
    UnsupportedBitDepth(u16),

    /// A zero sample rate makes time conversion meaningless
    #[error("Sample rate must be greater than zero")]
    ZeroSampleRate,
}

/// Result type for format validation
pub type FormatResult<T> = Result<T, FormatError>;

/// Byte order of the samples in a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ByteOrder {
    /// WAVE data chunks
    #[default]
    LittleEndian,
    /// AIFF and raw network captures
    BigEndian,
}

impl ByteOrder {
    pub fn decode(self, bytes: [u8; 2]) -> i16 {
        match self {
            ByteOrder::LittleEndian => i16::from_le_bytes(bytes),
            ByteOrder::BigEndian => i16::from_be_bytes(bytes),
        }
    }

    pub fn encode(self, sample: i16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => sample.to_le_bytes(),
            ByteOrder::BigEndian => sample.to_be_bytes(),
        }
    }
}

/// Descriptor of an interleaved PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    channel_count: u16,
    sample_rate: u32,
    bit_depth: u16,
    byte_order: ByteOrder,
}

impl PcmFormat {
    /// Validate and build a little-endian format descriptor
    pub fn new(channel_count: u16, sample_rate: u32, bit_depth: u16) -> FormatResult<Self> {
        if channel_count != 1 && channel_count != 2 {
            return Err(FormatError::UnsupportedChannelCount(channel_count));
        }
        if bit_depth != SUPPORTED_BIT_DEPTH {
            return Err(FormatError::UnsupportedBitDepth(bit_depth));
        }
        if sample_rate == 0 {
            return Err(FormatError::ZeroSampleRate);
        }
        Ok(Self {
            channel_count,
            sample_rate,
            bit_depth,
            byte_order: ByteOrder::LittleEndian,
        })
    }

    /// Same layout with samples in `byte_order`
    pub fn with_byte_order(self, byte_order: ByteOrder) -> Self {
        Self { byte_order, ..self }
    }

    /// Mono 16-bit at the given rate
    pub fn mono(sample_rate: u32) -> FormatResult<Self> {
        Self::new(1, sample_rate, SUPPORTED_BIT_DEPTH)
    }

    /// Stereo 16-bit at the given rate
    pub fn stereo(sample_rate: u32) -> FormatResult<Self> {
        Self::new(2, sample_rate, SUPPORTED_BIT_DEPTH)
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Bytes per single sample of one channel
    pub fn byte_depth(&self) -> u16 {
        self.bit_depth / 8
    }

    /// Bytes per frame (one sample for every channel)
    pub fn block_align(&self) -> u16 {
        self.channel_count * self.byte_depth()
    }

    /// Bytes consumed per second of audio
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.block_align() as u64
    }

    /// Round a byte offset down to the nearest frame boundary
    pub fn align_to_frame(&self, bytes: u64) -> u64 {
        let align = self.block_align() as u64;
        bytes - bytes % align
    }

    /// Round a fractional byte position (from pixel or time math) down to a frame boundary
    ///
    /// Negative and non-finite inputs map to zero.
    pub fn align_position(&self, bytes: f64) -> u64 {
        if !bytes.is_finite() || bytes <= 0.0 {
            return 0;
        }
        self.align_to_frame(bytes.floor() as u64)
    }

    pub fn is_frame_aligned(&self, bytes: u64) -> bool {
        bytes % self.block_align() as u64 == 0
    }

    /// Duration in milliseconds covered by `bytes` of audio
    pub fn bytes_to_ms(&self, bytes: u64) -> f64 {
        bytes as f64 * 1000.0 / self.byte_rate() as f64
    }

    /// Frame-aligned byte offset for a time in milliseconds
    pub fn ms_to_bytes(&self, ms: f64) -> u64 {
        self.align_position(ms * self.byte_rate() as f64 / 1000.0)
    }
}
