//! Little-endian readers and writers for configuration images
//!
//! The Bluetooth stack hands over the in-memory image of its C configuration
//! structs, so reads follow natural alignment (each field aligned to its own
//! size). DSP blocks on the other hand are packed.

/// A read past the end of the blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated {
    pub needed: usize,
    pub available: usize,
}

/// Reads fields from a naturally aligned struct image
pub struct BlobReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, size: usize, align: usize) -> Result<&'a [u8], Truncated> {
        let start = self.pos.next_multiple_of(align);
        let end = start + size;
        if end > self.bytes.len() {
            return Err(Truncated {
                needed: end,
                available: self.bytes.len(),
            });
        }
        self.pos = end;
        Ok(&self.bytes[start..end])
    }

    pub fn u8(&mut self) -> Result<u8, Truncated> {
        Ok(self.take(1, 1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, Truncated> {
        let b = self.take(2, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, Truncated> {
        let b = self.take(4, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32, Truncated> {
        let b = self.take(4, 4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn bytes<const N: usize>(&mut self) -> Result<[u8; N], Truncated> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, 1)?);
        Ok(out)
    }

    /// Current offset into the blob
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Builds a little-endian byte image, packed or naturally aligned
#[derive(Debug, Default)]
pub struct BlobWriter {
    bytes: Vec<u8>,
    aligned: bool,
}

impl BlobWriter {
    /// Packed layout, as the DSP expects
    pub fn packed() -> Self {
        Self {
            bytes: Vec::new(),
            aligned: false,
        }
    }

    /// Natural C alignment, as the Bluetooth stack lays out its structs
    pub fn aligned() -> Self {
        Self {
            bytes: Vec::new(),
            aligned: true,
        }
    }

    fn pad_to(&mut self, align: usize) {
        if self.aligned {
            let len = self.bytes.len().next_multiple_of(align);
            self.bytes.resize(len, 0);
        }
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.bytes.push(value);
        self
    }

    pub fn u16(mut self, value: u16) -> Self {
        self.pad_to(2);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        self.pad_to(4);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(mut self, value: i32) -> Self {
        self.pad_to(4);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.bytes.extend_from_slice(value);
        self
    }

    /// Append `count` zero bytes
    pub fn zeros(mut self, count: usize) -> Self {
        self.bytes.resize(self.bytes.len() + count, 0);
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_follows_natural_alignment() {
        // u16, u8, <pad>, u32
        let bytes = [0x44, 0xAC, 0x02, 0x00, 0x10, 0x00, 0x00, 0x00];
        let mut r = BlobReader::new(&bytes);
        assert_eq!(r.u16().unwrap(), 44100);
        assert_eq!(r.u8().unwrap(), 2);
        assert_eq!(r.u32().unwrap(), 16);
        assert_eq!(r.position(), 8);
    }

    #[test]
    fn test_reader_reports_truncation() {
        let bytes = [1, 0, 0];
        let mut r = BlobReader::new(&bytes);
        assert_eq!(
            r.u32(),
            Err(Truncated {
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_aligned_writer_matches_reader() {
        let blob = BlobWriter::aligned()
            .u16(48000)
            .u8(1)
            .u32(352_000)
            .i32(-1)
            .finish();
        assert_eq!(blob.len(), 12);

        let mut r = BlobReader::new(&blob);
        assert_eq!(r.u16().unwrap(), 48000);
        assert_eq!(r.u8().unwrap(), 1);
        assert_eq!(r.u32().unwrap(), 352_000);
        assert_eq!(r.i32().unwrap(), -1);
    }

    #[test]
    fn test_packed_writer_has_no_padding() {
        let blob = BlobWriter::packed().u8(1).u32(2).u16(3).finish();
        assert_eq!(blob, vec![1, 2, 0, 0, 0, 3, 0]);
    }
}
