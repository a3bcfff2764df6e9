//! `BCFZ` bitstream inflation.
//!
//! The framing is a Burrows-Wheeler-style back-reference scheme read
//! MSB-first within each byte. Each step starts with one flag bit:
//!
//! - `1` — a back-reference: a 4-bit word size, then `offset` and `size`
//!   each read as `word_size` bits with the least significant bit first.
//!   `min(offset, size)` bytes are copied from `offset` bytes before the
//!   end of the output.
//! - `0` — a raw run: a 2-bit count (LSB first), then that many whole
//!   bytes.
//!
//! Decoding stops once the output reaches the length declared in the
//! header. When the stream runs out mid-read the reader substitutes zero
//! bytes; the final back-reference of real-world files relies on this to
//! terminate cleanly, so the substitution must stay.

use super::GpxError;

const BCFZ_MAGIC: [u8; 4] = *b"BCFZ";

/// MSB-first bit reader over a byte slice.
///
/// Reads past the end of the input yield zero bits; [`BitReader::exhausted`]
/// reports when that has started happening so the inflate loop can tell a
/// legitimate zero-padded tail from a stream that stalled.
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    index: usize,
    current: u8,
    position: u32,
}

impl<'a> BitReader<'a> {
    pub(crate) const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            index: 0,
            current: 0,
            position: 8,
        }
    }

    pub(crate) fn read_bit(&mut self) -> u32 {
        if self.position >= 8 {
            self.current = self.data.get(self.index).copied().unwrap_or(0);
            self.index += 1;
            self.position = 0;
        }
        let value = (self.current >> (8 - self.position - 1)) & 0x01;
        self.position += 1;
        value as u32
    }

    /// Reads `count` bits, most significant first.
    pub(crate) fn read_bits(&mut self, count: u32) -> u32 {
        let mut result = 0;
        for i in 0..count {
            result |= self.read_bit() << (count - i - 1);
        }
        result
    }

    /// Reads `count` bits, least significant first.
    pub(crate) fn read_bits_reversed(&mut self, count: u32) -> u32 {
        let mut result = 0;
        for i in 0..count {
            result |= self.read_bit() << i;
        }
        result
    }

    pub(crate) fn read_byte(&mut self) -> u8 {
        self.read_bits(8) as u8
    }

    /// True once reads have gone past the end of the input.
    pub(crate) const fn exhausted(&self) -> bool {
        self.index > self.data.len()
    }
}

/// Inflates a `BCFZ`-framed buffer to the declared uncompressed length.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, GpxError> {
    if data.len() < 8 {
        return Err(GpxError::TruncatedHeader(data.len()));
    }
    let magic: [u8; 4] = data[0..4].try_into().expect("sliced four bytes");
    if magic != BCFZ_MAGIC {
        return Err(GpxError::BadMagic {
            expected: BCFZ_MAGIC,
            found: magic,
        });
    }
    let declared = u32::from_le_bytes(data[4..8].try_into().expect("sliced four bytes")) as usize;

    let mut io = BitReader::new(&data[8..]);
    let mut out: Vec<u8> = Vec::with_capacity(declared);

    while out.len() < declared {
        let before = out.len();

        if io.read_bit() == 1 {
            let word_size = io.read_bits(4);
            let offset = io.read_bits_reversed(word_size) as usize;
            let size = io.read_bits_reversed(word_size) as usize;
            if offset == 0 {
                return Err(GpxError::ZeroOffset(out.len()));
            }
            if offset > out.len() {
                return Err(GpxError::LengthNotReachable {
                    declared,
                    produced: out.len(),
                });
            }
            let source = out.len() - offset;
            let to_read = offset.min(size);
            // A copy never overlaps its own output: to_read <= offset.
            out.extend_from_within(source..source + to_read);
        } else {
            let size = io.read_bits_reversed(2);
            for _ in 0..size {
                out.push(io.read_byte());
            }
        }

        if out.len() == before && io.exhausted() {
            return Err(GpxError::LengthNotReachable {
                declared,
                produced: out.len(),
            });
        }
    }

    out.truncate(declared);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a BCFZ stream from a list of bit groups `(value, width, reversed)`.
    struct BitWriter {
        bytes: Vec<u8>,
        current: u8,
        filled: u32,
    }

    impl BitWriter {
        fn new() -> Self {
            Self {
                bytes: vec![],
                current: 0,
                filled: 0,
            }
        }

        fn push_bit(&mut self, bit: u32) {
            self.current |= ((bit & 1) as u8) << (7 - self.filled);
            self.filled += 1;
            if self.filled == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
        }

        fn push_bits(&mut self, value: u32, count: u32) {
            for i in (0..count).rev() {
                self.push_bit((value >> i) & 1);
            }
        }

        fn push_bits_reversed(&mut self, value: u32, count: u32) {
            for i in 0..count {
                self.push_bit((value >> i) & 1);
            }
        }

        fn finish(mut self) -> Vec<u8> {
            if self.filled > 0 {
                self.bytes.push(self.current);
            }
            self.bytes
        }
    }

    fn frame(declared: u32, bits: Vec<u8>) -> Vec<u8> {
        let mut data = b"BCFZ".to_vec();
        data.extend_from_slice(&declared.to_le_bytes());
        data.extend_from_slice(&bits);
        data
    }

    #[test]
    fn raw_runs() {
        let mut w = BitWriter::new();
        // flag 0, size 3 (reversed), bytes 1 2 3
        w.push_bit(0);
        w.push_bits_reversed(3, 2);
        w.push_bits(1, 8);
        w.push_bits(2, 8);
        w.push_bits(3, 8);
        let data = frame(3, w.finish());
        assert_eq!(inflate(&data).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn back_reference_copies_previous_output() {
        let mut w = BitWriter::new();
        w.push_bit(0);
        w.push_bits_reversed(2, 2);
        w.push_bits(0xAB, 8);
        w.push_bits(0xCD, 8);
        // flag 1, word size 2, offset 2, size 2
        w.push_bit(1);
        w.push_bits(2, 4);
        w.push_bits_reversed(2, 2);
        w.push_bits_reversed(2, 2);
        let data = frame(4, w.finish());
        assert_eq!(inflate(&data).unwrap(), vec![0xAB, 0xCD, 0xAB, 0xCD]);
    }

    #[test]
    fn copy_is_clamped_by_offset() {
        let mut w = BitWriter::new();
        w.push_bit(0);
        w.push_bits_reversed(1, 2);
        w.push_bits(0x7F, 8);
        // offset 1, size 3: only one byte available, repeated reads stay
        // within min(offset, size) = 1.
        w.push_bit(1);
        w.push_bits(3, 4);
        w.push_bits_reversed(1, 3);
        w.push_bits_reversed(3, 3);
        let data = frame(2, w.finish());
        assert_eq!(inflate(&data).unwrap(), vec![0x7F, 0x7F]);
    }

    #[test]
    fn eof_substitutes_zero_bytes() {
        // A single raw run of two bytes, but the stream ends after the
        // first: the reader must pad with zeros.
        let mut w = BitWriter::new();
        w.push_bit(0);
        w.push_bits_reversed(2, 2);
        w.push_bits(0x11, 8);
        let data = frame(2, w.finish());
        assert_eq!(inflate(&data).unwrap(), vec![0x11, 0x00]);
    }

    #[test]
    fn zero_offset_is_fatal() {
        let mut w = BitWriter::new();
        w.push_bit(1);
        w.push_bits(2, 4);
        w.push_bits_reversed(0, 2);
        w.push_bits_reversed(2, 2);
        let data = frame(4, w.finish());
        assert_eq!(inflate(&data).unwrap_err(), GpxError::ZeroOffset(0));
    }

    #[test]
    fn wrong_magic_is_fatal() {
        let mut data = b"BCFX".to_vec();
        data.extend_from_slice(&4u32.to_le_bytes());
        assert!(matches!(
            inflate(&data).unwrap_err(),
            GpxError::BadMagic { .. }
        ));
    }

    #[test]
    fn unreachable_length_is_fatal() {
        // Empty bitstream, non-zero declared length: every read comes back
        // zero, which decodes as empty raw runs forever.
        let data = frame(16, vec![]);
        assert!(matches!(
            inflate(&data).unwrap_err(),
            GpxError::LengthNotReachable { declared: 16, .. }
        ));
    }
}
