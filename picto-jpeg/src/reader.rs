//! Buffered byte access and the MSB-first bit accumulator used by entropy
//! decoding.

use std::io::{self, Read};

use crate::error::{BitstreamError, DecodeError, Result, bail, err};

const BUFFER_SIZE: usize = 4096;

/// A byte read from entropy-coded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stuffed {
    /// A data byte, with `0xFF00` already collapsed into `0xFF`.
    Byte(u8),
    /// A `0xFF` followed by anything other than `0x00`, i.e. a marker.
    Marker,
}

/// The outcome of topping up the bit accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    Ready,
    /// The entropy-coded segment ended at a marker.
    Marker,
    /// The input ended.
    Exhausted,
}

pub(crate) struct Reader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    end: usize,
    /// How many bytes the last stuffed read consumed and may give back.
    unreadable: usize,
    acc: u32,
    /// Number of unread bits in the low end of `acc`.
    count: u32,
}

impl<R: Read> Reader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0; BUFFER_SIZE],
            pos: 0,
            end: 0,
            unreadable: 0,
            acc: 0,
            count: 0,
        }
    }

    fn fill(&mut self) -> Result<()> {
        debug_assert_eq!(self.pos, self.end);

        // Keep the last two bytes so that a stuffed read can still be undone.
        if self.end > 2 {
            self.buf.copy_within(self.end - 2..self.end, 0);
            self.pos = 2;
            self.end = 2;
        }

        loop {
            match self.inner.read(&mut self.buf[self.end..]) {
                Ok(0) => bail!(DecodeError::Truncated),
                Ok(n) => {
                    self.end += n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub(crate) fn read_byte(&mut self) -> Result<u8> {
        while self.pos == self.end {
            self.fill()?;
        }

        let byte = self.buf[self.pos];
        self.pos += 1;
        self.unreadable = 0;

        Ok(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes([self.read_byte()?, self.read_byte()?]))
    }

    pub(crate) fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        let mut written = 0;

        while written < out.len() {
            if self.pos == self.end {
                self.fill()?;
            }

            let n = (self.end - self.pos).min(out.len() - written);
            out[written..written + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
        }

        self.unreadable = 0;

        Ok(())
    }

    pub(crate) fn skip(&mut self, mut n: usize) -> Result<()> {
        while n > 0 {
            if self.pos == self.end {
                self.fill()?;
            }

            let step = (self.end - self.pos).min(n);
            self.pos += step;
            n -= step;
        }

        self.unreadable = 0;

        Ok(())
    }

    /// Read a byte of entropy-coded data, removing byte stuffing.
    pub(crate) fn read_byte_stuffed(&mut self) -> Result<Stuffed> {
        if self.pos + 2 <= self.end {
            let byte = self.buf[self.pos];
            self.pos += 1;
            self.unreadable = 1;

            if byte != 0xFF {
                return Ok(Stuffed::Byte(byte));
            }

            if self.buf[self.pos] != 0x00 {
                return Ok(Stuffed::Marker);
            }

            self.pos += 1;
            self.unreadable = 2;

            return Ok(Stuffed::Byte(0xFF));
        }

        self.unreadable = 0;
        let byte = self.read_byte()?;
        self.unreadable = 1;

        if byte != 0xFF {
            return Ok(Stuffed::Byte(byte));
        }

        let next = self.read_byte();
        // `read_byte` resets the counter, but on failure the 0xFF stays undoable.
        self.unreadable = if next.is_ok() { 2 } else { 1 };

        match next? {
            0x00 => Ok(Stuffed::Byte(0xFF)),
            _ => Ok(Stuffed::Marker),
        }
    }

    /// Give back the bytes consumed by the last stuffed read.
    pub(crate) fn unread_stuffed(&mut self) {
        self.pos -= self.unreadable;
        self.unreadable = 0;
    }

    /// Pull stuffed bytes into the accumulator until it holds at least `n`
    /// bits, reporting a marker or the end of input instead of failing.
    pub(crate) fn fill_bits(&mut self, n: u32) -> Result<Fill> {
        while self.count < n {
            let byte = match self.read_byte_stuffed() {
                Ok(Stuffed::Byte(byte)) => byte,
                Ok(Stuffed::Marker) => return Ok(Fill::Marker),
                Err(DecodeError::Truncated) => return Ok(Fill::Exhausted),
                Err(e) => return Err(e),
            };

            self.acc = (self.acc << 8) | u32::from(byte);
            self.count += 8;
        }

        Ok(Fill::Ready)
    }

    pub(crate) fn ensure_bits(&mut self, n: u32) -> Result<()> {
        match self.fill_bits(n)? {
            Fill::Ready => Ok(()),
            Fill::Marker => err!(BitstreamError::MissingStuffing),
            Fill::Exhausted => err!(DecodeError::Truncated),
        }
    }

    pub(crate) fn decode_bit(&mut self) -> Result<bool> {
        if self.count == 0 {
            self.ensure_bits(1)?;
        }

        self.count -= 1;

        Ok((self.acc >> self.count) & 1 != 0)
    }

    pub(crate) fn decode_bits(&mut self, n: u32) -> Result<u32> {
        if self.count < n {
            self.ensure_bits(n)?;
        }

        self.count -= n;

        Ok((self.acc >> self.count) & ((1 << n) - 1))
    }

    /// Read `t` bits and sign-extend them ("RECEIVE" and "EXTEND", F.2.2.1).
    pub(crate) fn receive_extend(&mut self, t: u8) -> Result<i32> {
        if t == 0 {
            return Ok(0);
        }

        let t = u32::from(t);
        let x = self.decode_bits(t)? as i32;
        let s = 1_i32 << t;

        if x < s >> 1 {
            Ok(x + (-1_i32 << t) + 1)
        } else {
            Ok(x)
        }
    }

    /// The number of bits currently buffered.
    pub(crate) fn bit_count(&self) -> u32 {
        self.count
    }

    /// The next eight buffered bits. Requires `bit_count() >= 8`.
    pub(crate) fn peek_byte_bits(&self) -> u8 {
        (self.acc >> (self.count - 8)) as u8
    }

    pub(crate) fn consume_bits(&mut self, n: u32) {
        self.count -= n;
    }

    /// Drop any buffered bits, as required at the start of a scan and after a
    /// restart marker.
    pub(crate) fn reset_bits(&mut self) {
        self.acc = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A source that hands out one byte per call and is interrupted in between.
    struct Trickle<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;

            if self.interrupt {
                return Err(io::ErrorKind::Interrupted.into());
            }

            match self.data.split_first() {
                Some((first, rest)) if !buf.is_empty() => {
                    buf[0] = *first;
                    self.data = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn short_reads() {
        let data = [1, 2, 3, 4, 5, 6, 7];
        let mut reader = Reader::new(Trickle {
            data: &data,
            interrupt: false,
        });

        let mut out = [0; 5];
        reader.read_exact(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5]);
        assert_eq!(reader.read_u16().unwrap(), 0x0607);
        assert_eq!(reader.read_byte(), Err(DecodeError::Truncated));
    }

    #[test]
    fn stuffing() {
        let data = [0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD9];
        let mut reader = Reader::new(&data[..]);

        assert_eq!(reader.read_byte_stuffed().unwrap(), Stuffed::Byte(0x12));
        assert_eq!(reader.read_byte_stuffed().unwrap(), Stuffed::Byte(0xFF));
        assert_eq!(reader.read_byte_stuffed().unwrap(), Stuffed::Byte(0x34));
        assert_eq!(reader.read_byte_stuffed().unwrap(), Stuffed::Marker);

        reader.unread_stuffed();
        assert_eq!(reader.read_u16().unwrap(), 0xFFD9);
    }

    #[test]
    fn stuffing_across_refills() {
        let data = [0xFF, 0x00, 0xFF, 0xD0];
        let mut reader = Reader::new(Trickle {
            data: &data,
            interrupt: false,
        });

        assert_eq!(reader.read_byte_stuffed().unwrap(), Stuffed::Byte(0xFF));
        assert_eq!(reader.read_byte_stuffed().unwrap(), Stuffed::Marker);

        reader.unread_stuffed();
        assert_eq!(reader.read_byte().unwrap(), 0xFF);
        assert_eq!(reader.read_byte().unwrap(), 0xD0);
    }

    #[test]
    fn bits_stop_at_marker() {
        let data = [0b1011_0000, 0xFF, 0xD9];
        let mut reader = Reader::new(&data[..]);

        assert_eq!(reader.decode_bits(3).unwrap(), 0b101);
        assert!(reader.decode_bit().unwrap());
        assert_eq!(reader.decode_bits(4).unwrap(), 0);
        assert_eq!(
            reader.decode_bit(),
            Err(DecodeError::Bitstream(BitstreamError::MissingStuffing))
        );
    }

    #[test]
    fn bits_at_end_of_input() {
        let data = [0xAA];
        let mut reader = Reader::new(&data[..]);

        assert_eq!(reader.fill_bits(16).unwrap(), Fill::Exhausted);
        assert_eq!(reader.bit_count(), 8);
        assert_eq!(reader.decode_bits(8).unwrap(), 0xAA);
        assert_eq!(reader.decode_bit(), Err(DecodeError::Truncated));
    }

    #[test]
    fn receive_extend() {
        // 1 | 0 | 010 | 101 | 0000_0000 (t = 8)
        let data = [0b1001_0101, 0b0000_0000, 0b0000_0000];
        let mut reader = Reader::new(&data[..]);

        assert_eq!(reader.receive_extend(1).unwrap(), 1);
        assert_eq!(reader.receive_extend(1).unwrap(), -1);
        assert_eq!(reader.receive_extend(3).unwrap(), -5);
        assert_eq!(reader.receive_extend(3).unwrap(), 5);
        assert_eq!(reader.receive_extend(8).unwrap(), -255);
        assert_eq!(reader.receive_extend(0).unwrap(), 0);
    }
}
