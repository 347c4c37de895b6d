use crate::error::{Result, SnapshotError};

/// Builder for a little-endian state stream.
///
/// Scalars are appended in call order; the matching [`Decoder`] must read
/// them back in exactly the same order. `f32` travels as its IEEE-754 bit
/// pattern, `bool` as a single `0`/`1` byte, strings and markers as `u32`
/// length-prefixed UTF-8.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(self, v: i32) -> Self {
        self.u32(v as u32)
    }

    pub fn i64(self, v: i64) -> Self {
        self.u64(v as u64)
    }

    pub fn f32(self, v: f32) -> Self {
        self.u32(v.to_bits())
    }

    pub fn bool(self, v: bool) -> Self {
        self.u8(v as u8)
    }

    pub fn string(mut self, v: &str) -> Self {
        self = self.u32(v.len() as u32);
        self.buf.extend_from_slice(v.as_bytes());
        self
    }

    /// Append a literal token the decoder will verify in place.
    pub fn marker(self, token: &str) -> Self {
        self.string(token)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a state stream produced by [`Encoder`].
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(SnapshotError::UnexpectedEof {
                wanted: n,
                remaining: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    pub fn i64(&mut self) -> Result<i64> {
        Ok(self.u64()? as i64)
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SnapshotError::Corrupt("boolean field was neither 0 nor 1")),
        }
    }

    pub fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SnapshotError::InvalidUtf8)
    }

    /// Read a token written by [`Encoder::marker`] and verify it matches.
    pub fn marker(&mut self, expected: &'static str) -> Result<()> {
        let found = self.string()?;
        if found != expected {
            return Err(SnapshotError::MarkerMismatch { expected, found });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip() {
        let bytes = Encoder::new()
            .u8(0xab)
            .u32(0xdead_beef)
            .u64(0x0123_4567_89ab_cdef)
            .i32(-20_000)
            .i64(-1)
            .f32(2.5)
            .bool(true)
            .bool(false)
            .finish();

        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.u8().unwrap(), 0xab);
        assert_eq!(dec.u32().unwrap(), 0xdead_beef);
        assert_eq!(dec.u64().unwrap(), 0x0123_4567_89ab_cdef);
        assert_eq!(dec.i32().unwrap(), -20_000);
        assert_eq!(dec.i64().unwrap(), -1);
        assert_eq!(dec.f32().unwrap(), 2.5);
        assert!(dec.bool().unwrap());
        assert!(!dec.bool().unwrap());
        assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn string_roundtrip() {
        let bytes = Encoder::new().string("").string("timer_slice").finish();
        let mut dec = Decoder::new(&bytes);
        assert_eq!(dec.string().unwrap(), "");
        assert_eq!(dec.string().unwrap(), "timer_slice");
    }

    #[test]
    fn marker_mismatch_is_detected() {
        let bytes = Encoder::new().marker("SectionA").finish();
        let mut dec = Decoder::new(&bytes);
        let err = dec.marker("SectionB").unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::MarkerMismatch {
                expected: "SectionB",
                ..
            }
        ));
    }

    #[test]
    fn truncated_stream_reports_eof() {
        let bytes = Encoder::new().u32(7).finish();
        let mut dec = Decoder::new(&bytes[..2]);
        let err = dec.u32().unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnexpectedEof {
                wanted: 4,
                remaining: 2
            }
        ));
    }

    #[test]
    fn string_longer_than_stream_reports_eof() {
        // Length prefix claims 100 bytes but the stream ends first.
        let bytes = Encoder::new().u32(100).finish();
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(
            dec.string(),
            Err(SnapshotError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn invalid_bool_byte_is_corrupt() {
        let bytes = Encoder::new().u8(2).finish();
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(dec.bool(), Err(SnapshotError::Corrupt(_))));
    }

    #[test]
    fn f32_bits_are_exact() {
        let bytes = Encoder::new().f32(1.0).finish();
        assert_eq!(bytes, 0x3f80_0000u32.to_le_bytes());
    }
}
