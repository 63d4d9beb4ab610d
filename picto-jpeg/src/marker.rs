//! Marker codes (Table B.1) and marker scanning.

use std::io::Read;

use crate::error::Result;
use crate::reader::Reader;

pub(crate) const SOF0: u8 = 0xC0;
pub(crate) const SOF1: u8 = 0xC1;
pub(crate) const SOF2: u8 = 0xC2;
pub(crate) const DHT: u8 = 0xC4;
pub(crate) const RST0: u8 = 0xD0;
pub(crate) const RST7: u8 = 0xD7;
pub(crate) const SOI: u8 = 0xD8;
pub(crate) const EOI: u8 = 0xD9;
pub(crate) const SOS: u8 = 0xDA;
pub(crate) const DQT: u8 = 0xDB;
pub(crate) const DRI: u8 = 0xDD;
pub(crate) const APP0: u8 = 0xE0;
pub(crate) const APP2: u8 = 0xE2;
pub(crate) const APP14: u8 = 0xEE;
pub(crate) const APP15: u8 = 0xEF;
pub(crate) const COM: u8 = 0xFE;

pub(crate) fn is_restart(marker: u8) -> bool {
    (RST0..=RST7).contains(&marker)
}

pub(crate) fn is_app(marker: u8) -> bool {
    (APP0..=APP15).contains(&marker)
}

pub(crate) fn name(marker: u8) -> &'static str {
    match marker {
        SOF0 | SOF1 | SOF2 => "SOF",
        DHT => "DHT",
        SOS => "SOS",
        DQT => "DQT",
        DRI => "DRI",
        m if is_app(m) => "APPn",
        COM => "COM",
        _ => "marker",
    }
}

impl<R: Read> Reader<R> {
    /// Read the next marker code, skipping fill bytes and extraneous data.
    pub(crate) fn next_marker(&mut self) -> Result<u8> {
        loop {
            let mut prev = self.read_byte()?;
            let mut skipped = 0_usize;

            // Bytes that do not start with 0xFF are not valid between segments,
            // but encoders emit them often enough that they are skipped.
            let mut marker = loop {
                let next = self.read_byte()?;

                if prev == 0xFF {
                    break next;
                }

                prev = next;
                skipped += 1;
            };

            if skipped > 0 {
                lwarn!("skipped {} bytes of extraneous data", skipped);
            }

            // A stuffed 0xFF00 outside of entropy-coded data is extraneous too.
            if marker == 0x00 {
                ltrace!("ignoring 0xFF00 outside of a scan");
                continue;
            }

            // "Any marker may optionally be preceded by any number of fill
            // bytes, which are bytes assigned code X'FF'." (B.1.1.2)
            while marker == 0xFF {
                marker = self.read_byte()?;
            }

            return Ok(marker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    fn markers(data: &[u8]) -> Vec<u8> {
        let mut reader = Reader::new(data);
        let mut out = Vec::new();

        loop {
            match reader.next_marker() {
                Ok(marker) => out.push(marker),
                Err(DecodeError::Truncated) => return out,
                Err(e) => panic!("{e}"),
            }
        }
    }

    #[test]
    fn plain_markers() {
        assert_eq!(markers(&[0xFF, SOI, 0xFF, EOI]), vec![SOI, EOI]);
    }

    #[test]
    fn fill_bytes() {
        assert_eq!(markers(&[0xFF, 0xFF, 0xFF, DQT]), vec![DQT]);
    }

    #[test]
    fn extraneous_bytes() {
        assert_eq!(
            markers(&[0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, DHT]),
            vec![DHT]
        );
    }
}
