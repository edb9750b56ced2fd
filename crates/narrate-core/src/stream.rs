//! PCM stream source handed to the waveform renderer
//!
//! The session layer owns the real audio file. The renderer only needs a
//! seekable byte stream plus its format and length, which this trait captures.
//! A stream is single-reader: whoever holds the `Box<dyn PcmStreamSource>`
//! has exclusive read/seek access.

use std::io::{Cursor, Read, Seek};

use crate::types::PcmFormat;

/// Read-only, seekable stream of interleaved PCM bytes
///
/// Samples are in the byte order named by `format()`.
pub trait PcmStreamSource: Read + Seek + Send {
    /// Format of the samples in this stream
    fn format(&self) -> PcmFormat;

    /// Total number of PCM bytes (excluding any container header)
    fn data_length(&self) -> u64;
}

/// PCM stream backed by an in-memory buffer
///
/// Used for freshly recorded takes and for tests.
#[derive(Debug, Clone)]
pub struct MemoryPcmSource {
    format: PcmFormat,
    cursor: Cursor<Vec<u8>>,
}

impl MemoryPcmSource {
    /// Wrap raw PCM bytes; a trailing partial frame is dropped
    pub fn new(format: PcmFormat, mut bytes: Vec<u8>) -> Self {
        let aligned = format.align_to_frame(bytes.len() as u64) as usize;
        bytes.truncate(aligned);
        Self {
            format,
            cursor: Cursor::new(bytes),
        }
    }

    /// Build from interleaved samples, encoded in the format's byte order
    pub fn from_samples(format: PcmFormat, samples: &[i16]) -> Self {
        let order = format.byte_order();
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            bytes.extend_from_slice(&order.encode(sample));
        }
        Self::new(format, bytes)
    }

    /// Silence of the given byte length
    pub fn silence(format: PcmFormat, data_length: u64) -> Self {
        Self::new(format, vec![0; data_length as usize])
    }
}

impl Read for MemoryPcmSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryPcmSource {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl PcmStreamSource for MemoryPcmSource {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn data_length(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::SeekFrom;

    #[test]
    fn test_partial_frame_is_dropped() {
        let format = PcmFormat::stereo(44100).unwrap();
        let source = MemoryPcmSource::new(format, vec![0; 10]);
        assert_eq!(source.data_length(), 8);
    }

    #[test]
    fn test_samples_are_little_endian() {
        let format = PcmFormat::mono(8000).unwrap();
        let mut source = MemoryPcmSource::from_samples(format, &[1, -2, i16::MIN]);
        source.seek(SeekFrom::Start(2)).unwrap();
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).unwrap();
        assert_eq!(i16::from_le_bytes([buf[0], buf[1]]), -2);
        assert_eq!(i16::from_le_bytes([buf[2], buf[3]]), i16::MIN);
    }

    #[test]
    fn test_big_endian_samples() {
        let format = PcmFormat::mono(8000)
            .unwrap()
            .with_byte_order(crate::types::ByteOrder::BigEndian);
        let mut source = MemoryPcmSource::from_samples(format, &[0x0102]);
        let mut buf = [0u8; 2];
        source.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x02]);
    }
}
