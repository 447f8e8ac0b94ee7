//! This is a Rust library with the byte-level primitives of the Sigil wire
//! format. The compiler decides structural details (enum widths, field order,
//! presence flags) and every renderer runtime calls into these routines so
//! that all targets produce bit-for-bit identical output.
//!
//! The format rules:
//!
//! - fixed-width integers are big-endian, two's-complement when signed;
//! - floats are IEEE-754, big-endian, 4 or 8 bytes;
//! - booleans are exactly one byte, 0 or 1;
//! - strings carry a 4-byte big-endian byte-length prefix, then that many
//!   bytes (the wide kind is transcoded to UTF-8 for counting and payload);
//! - enums are big-endian unsigned integers of their computed width (1-4).
//!
//! ```
//! use std::borrow::Cow;
//! let mut w = sigil_wire::WireWriter::new();
//! w.write_astring("Hoi");
//! w.write_u16(258);
//! let data = w.data();
//! assert_eq!(data, [0, 0, 0, 3, b'H', b'o', b'i', 1, 2]);
//!
//! let mut r = sigil_wire::WireReader::new(&data);
//! assert_eq!(r.read_astring(), Ok(Cow::Borrowed("Hoi")));
//! assert_eq!(r.read_u16(), Ok(258));
//! ```

use std::borrow::Cow;

/// A wire-format buffer meant for reading.
pub struct WireReader<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> WireReader<'a> {
    /// Create a new WireReader that wraps the provided byte slice. The
    /// lifetime of the returned WireReader must not outlive the lifetime of
    /// the byte slice.
    pub fn new(data: &[u8]) -> WireReader {
        WireReader { data, index: 0 }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice. This
    /// starts off as 0 and ends up as `self.data().len()` when everything has
    /// been read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Try to read a boolean starting at the current index. Exactly one byte;
    /// any value other than 0 or 1 is an error.
    pub fn read_bool(&mut self) -> Result<bool, ()> {
        match self.read_u8() {
            Ok(0) => Ok(false),
            Ok(1) => Ok(true),
            _ => Err(()),
        }
    }

    /// Try to read `len` raw bytes starting at the current index.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ()> {
        if self.index + len > self.data.len() {
            Err(())
        } else {
            let value = &self.data[self.index..self.index + len];
            self.index += len;
            Ok(value)
        }
    }

    /// Try to read a single byte starting at the current index.
    pub fn read_u8(&mut self) -> Result<u8, ()> {
        if self.index >= self.data.len() {
            Err(())
        } else {
            let value = self.data[self.index];
            self.index += 1;
            Ok(value)
        }
    }

    /// Try to read a big-endian unsigned 16-bit integer.
    pub fn read_u16(&mut self) -> Result<u16, ()> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Try to read a big-endian unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> Result<u32, ()> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Try to read a big-endian unsigned 64-bit integer.
    pub fn read_u64(&mut self) -> Result<u64, ()> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    /// Try to read a two's-complement signed 8-bit integer.
    pub fn read_i8(&mut self) -> Result<i8, ()> {
        Ok(self.read_u8()? as i8)
    }

    /// Try to read a big-endian two's-complement signed 16-bit integer.
    pub fn read_i16(&mut self) -> Result<i16, ()> {
        Ok(self.read_u16()? as i16)
    }

    /// Try to read a big-endian two's-complement signed 32-bit integer.
    pub fn read_i32(&mut self) -> Result<i32, ()> {
        Ok(self.read_u32()? as i32)
    }

    /// Try to read a big-endian two's-complement signed 64-bit integer.
    pub fn read_i64(&mut self) -> Result<i64, ()> {
        Ok(self.read_u64()? as i64)
    }

    /// Try to read a big-endian unsigned integer of exactly `width` bytes,
    /// where `width` is between 1 and 4. This is the encoding used for enums,
    /// whose width is the minimum needed for their largest declared value.
    pub fn read_uint(&mut self, width: usize) -> Result<u32, ()> {
        if width < 1 || width > 4 {
            return Err(());
        }
        let mut value: u32 = 0;
        for &byte in self.read_bytes(width)? {
            value = (value << 8) | byte as u32;
        }
        Ok(value)
    }

    /// Try to read a big-endian IEEE-754 32-bit float.
    pub fn read_f32(&mut self) -> Result<f32, ()> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Try to read a big-endian IEEE-754 64-bit float.
    pub fn read_f64(&mut self) -> Result<f64, ()> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Try to read a narrow string: a 4-byte big-endian byte-length prefix
    /// followed by that many bytes. The string is returned as a slice where
    /// possible so it just aliases the underlying memory.
    pub fn read_astring(&mut self) -> Result<Cow<'a, str>, ()> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes))
    }

    /// Try to read a wide string. On the wire this is identical to a narrow
    /// string except that the payload is wide text transcoded to UTF-8; the
    /// length prefix counts the transcoded bytes.
    pub fn read_wstring(&mut self) -> Result<Cow<'a, str>, ()> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes))
    }
}

/// A wire-format buffer meant for writing.
pub struct WireWriter {
    data: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty WireWriter ready for writing.
    pub fn new() -> WireWriter {
        WireWriter { data: vec![] }
    }

    /// Consumes this buffer and returns the underlying backing store. Use
    /// this to get the data out when you're done writing to the buffer.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a boolean as a single byte, 0 for false and 1 for true.
    pub fn write_bool(&mut self, value: bool) {
        self.data.push(if value { 1 } else { 0 });
    }

    /// Write a raw byte slice to the end of the buffer.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    /// Write a single byte to the end of the buffer.
    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Write a big-endian unsigned 16-bit integer.
    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian unsigned 32-bit integer.
    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian unsigned 64-bit integer.
    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a two's-complement signed 8-bit integer.
    pub fn write_i8(&mut self, value: i8) {
        self.data.push(value as u8);
    }

    /// Write a big-endian two's-complement signed 16-bit integer.
    pub fn write_i16(&mut self, value: i16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian two's-complement signed 32-bit integer.
    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian two's-complement signed 64-bit integer.
    pub fn write_i64(&mut self, value: i64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Write the least-significant `width` bytes of `value` big-endian first,
    /// where `width` is between 1 and 4. This is the encoding used for enums.
    pub fn write_uint(&mut self, value: u32, width: usize) {
        debug_assert!((1..=4).contains(&width));
        for shift in (0..width).rev() {
            self.data.push((value >> (8 * shift)) as u8);
        }
    }

    /// Write a big-endian IEEE-754 32-bit float.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Write a big-endian IEEE-754 64-bit float.
    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    /// Write a narrow string: a 4-byte big-endian byte-length prefix followed
    /// by the string bytes.
    pub fn write_astring(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.data.extend_from_slice(value.as_bytes());
    }

    /// Write a wide string, transcoded to UTF-8. The length prefix counts the
    /// transcoded bytes, not the characters.
    pub fn write_wstring(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.data.extend_from_slice(value.as_bytes());
    }
}

impl Default for WireWriter {
    fn default() -> WireWriter {
        WireWriter::new()
    }
}

#[cfg(test)]
fn write_once(cb: fn(&mut WireWriter)) -> Vec<u8> {
    let mut w = WireWriter::new();
    cb(&mut w);
    w.data()
}

#[test]
fn read_bool() {
    let read = |bytes: &[u8]| WireReader::new(bytes).read_bool();
    assert_eq!(read(&[]), Err(()));
    assert_eq!(read(&[0]), Ok(false));
    assert_eq!(read(&[1]), Ok(true));
    assert_eq!(read(&[2]), Err(()));
}

#[test]
fn read_fixed_ints() {
    assert_eq!(WireReader::new(&[]).read_u8(), Err(()));
    assert_eq!(WireReader::new(&[255]).read_u8(), Ok(255));
    assert_eq!(WireReader::new(&[255]).read_i8(), Ok(-1));
    assert_eq!(WireReader::new(&[1, 2]).read_u16(), Ok(258));
    assert_eq!(WireReader::new(&[0xFF, 0xFE]).read_i16(), Ok(-2));
    assert_eq!(WireReader::new(&[0, 0, 1, 0]).read_u32(), Ok(256));
    assert_eq!(
        WireReader::new(&[0xFF, 0xFF, 0xFF, 0xFF]).read_i32(),
        Ok(-1)
    );
    assert_eq!(
        WireReader::new(&[0, 0, 0, 0, 0, 0, 0, 9]).read_u64(),
        Ok(9)
    );
    assert_eq!(
        WireReader::new(&[0x80, 0, 0, 0, 0, 0, 0, 0]).read_i64(),
        Ok(i64::MIN)
    );
    assert_eq!(WireReader::new(&[1, 2]).read_u32(), Err(()));
}

#[test]
fn read_uint_widths() {
    assert_eq!(WireReader::new(&[7]).read_uint(1), Ok(7));
    assert_eq!(WireReader::new(&[1, 0]).read_uint(2), Ok(256));
    assert_eq!(WireReader::new(&[1, 0, 0]).read_uint(3), Ok(65536));
    assert_eq!(
        WireReader::new(&[1, 0, 0, 0]).read_uint(4),
        Ok(16777216)
    );
    assert_eq!(WireReader::new(&[1]).read_uint(0), Err(()));
    assert_eq!(WireReader::new(&[1]).read_uint(5), Err(()));
    assert_eq!(WireReader::new(&[1]).read_uint(2), Err(()));
}

#[test]
fn read_floats() {
    assert_eq!(WireReader::new(&[0x3F, 0x80, 0, 0]).read_f32(), Ok(1.0));
    assert_eq!(
        WireReader::new(&[0x3F, 0xF0, 0, 0, 0, 0, 0, 0]).read_f64(),
        Ok(1.0)
    );
    assert_eq!(WireReader::new(&[0x3F, 0x80]).read_f32(), Err(()));
}

#[test]
fn read_strings() {
    fn read(bytes: &[u8]) -> Result<Cow<'_, str>, ()> {
        WireReader::new(bytes).read_astring()
    }
    assert_eq!(read(&[]), Err(()));
    assert_eq!(read(&[0, 0, 0, 0]), Ok(Cow::Borrowed("")));
    assert_eq!(read(&[0, 0, 0, 3, b'H', b'o', b'i']), Ok(Cow::Borrowed("Hoi")));
    assert_eq!(read(&[0, 0, 0, 4, b'H', b'o', b'i']), Err(()));

    let mut r = WireReader::new(&[0, 0, 0, 6, 0xCE, 0xB1, 0xC3, 0x9F, 0xC2, 0xA2]);
    assert_eq!(r.read_wstring(), Ok(Cow::Borrowed("αß¢")));
    assert_eq!(r.index(), 10);
}

#[test]
fn write_bool_bytes() {
    assert_eq!(write_once(|w| w.write_bool(false)), [0]);
    assert_eq!(write_once(|w| w.write_bool(true)), [1]);
}

#[test]
fn write_fixed_ints() {
    assert_eq!(write_once(|w| w.write_u8(255)), [255]);
    assert_eq!(write_once(|w| w.write_i8(-1)), [255]);
    assert_eq!(write_once(|w| w.write_u16(258)), [1, 2]);
    assert_eq!(write_once(|w| w.write_i16(-2)), [0xFF, 0xFE]);
    assert_eq!(write_once(|w| w.write_u32(256)), [0, 0, 1, 0]);
    assert_eq!(write_once(|w| w.write_i32(-1)), [0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(write_once(|w| w.write_u64(9)), [0, 0, 0, 0, 0, 0, 0, 9]);
    assert_eq!(
        write_once(|w| w.write_i64(i64::MIN)),
        [0x80, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn write_uint_widths() {
    assert_eq!(write_once(|w| w.write_uint(7, 1)), [7]);
    assert_eq!(write_once(|w| w.write_uint(256, 2)), [1, 0]);
    assert_eq!(write_once(|w| w.write_uint(65536, 3)), [1, 0, 0]);
    assert_eq!(write_once(|w| w.write_uint(16777216, 4)), [1, 0, 0, 0]);
}

#[test]
fn write_floats() {
    assert_eq!(write_once(|w| w.write_f32(1.0)), [0x3F, 0x80, 0, 0]);
    assert_eq!(
        write_once(|w| w.write_f64(1.0)),
        [0x3F, 0xF0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn write_strings() {
    assert_eq!(write_once(|w| w.write_astring("")), [0, 0, 0, 0]);
    assert_eq!(
        write_once(|w| w.write_astring("Hoi")),
        [0, 0, 0, 3, b'H', b'o', b'i']
    );
    assert_eq!(
        write_once(|w| w.write_wstring("αß¢")),
        [0, 0, 0, 6, 0xCE, 0xB1, 0xC3, 0x9F, 0xC2, 0xA2]
    );
}

#[test]
fn write_read_sequence() {
    let mut w = WireWriter::new();
    w.write_u32(2);
    w.write_astring("ab");
    w.write_bool(true);
    w.write_uint(300, 2);
    let data = w.data();

    let mut r = WireReader::new(&data);
    assert_eq!(r.read_u32(), Ok(2));
    assert_eq!(r.read_astring(), Ok(Cow::Borrowed("ab")));
    assert_eq!(r.read_bool(), Ok(true));
    assert_eq!(r.read_uint(2), Ok(300));
    assert_eq!(r.index(), data.len());
}
