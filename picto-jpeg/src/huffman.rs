//! Canonical Huffman tables, as specified in Annex C and F.2.2.3.

use std::io::Read;

use crate::error::{BitstreamError, FormatError, Result, bail, err};
use crate::reader::{Fill, Reader};

pub(crate) const MAX_CODE_LENGTH: usize = 16;
pub(crate) const MAX_CODES: usize = 256;
const LUT_BITS: u32 = 8;

/// A decoding table for one DHT destination.
#[derive(Clone)]
pub(crate) struct HuffmanTable {
    /// Maps the next 8 bits to `symbol << 8 | (length + 1)`, or 0 if the code
    /// is longer than 8 bits.
    lut: [u16; 1 << LUT_BITS],
    values: Vec<u8>,
    /// Smallest code of each length, or -1 if there is none.
    min_codes: [i32; MAX_CODE_LENGTH],
    /// Largest code of each length, or -1 if there is none.
    max_codes: [i32; MAX_CODE_LENGTH],
    /// Index into `values` of the first symbol of each length.
    value_indices: [i32; MAX_CODE_LENGTH],
}

impl HuffmanTable {
    /// Build a table from the code counts of each length and the symbols in
    /// order of increasing code length.
    pub(crate) fn new(counts: &[u8; MAX_CODE_LENGTH], values: &[u8]) -> Result<Self> {
        let total: usize = counts.iter().map(|c| usize::from(*c)).sum();

        if total == 0 {
            bail!(FormatError::EmptyHuffmanTable);
        }

        if total > MAX_CODES || total != values.len() {
            bail!(FormatError::InvalidHuffmanTable);
        }

        let mut table = Self {
            lut: [0; 1 << LUT_BITS],
            values: values.to_vec(),
            min_codes: [-1; MAX_CODE_LENGTH],
            max_codes: [-1; MAX_CODE_LENGTH],
            value_indices: [-1; MAX_CODE_LENGTH],
        };

        // "Codes are generated starting with the shortest length; within a
        // length the code value is incremented by one for each symbol, and the
        // value is shifted left by one when moving to the next length." (C.2)
        let mut code = 0_i32;
        let mut index = 0_i32;

        for (i, &count) in counts.iter().enumerate() {
            let count = i32::from(count);

            if count > 0 {
                if code + count > 1 << (i + 1) {
                    bail!(FormatError::OversubscribedHuffmanTable);
                }

                table.min_codes[i] = code;
                table.max_codes[i] = code + count - 1;
                table.value_indices[i] = index;

                if i < LUT_BITS as usize {
                    let shift = LUT_BITS as usize - 1 - i;

                    for j in 0..count {
                        let base = ((code + j) << shift) as usize;
                        let symbol = u16::from(values[(index + j) as usize]);
                        let entry = (symbol << 8) | (i as u16 + 2);

                        table.lut[base..base + (1 << shift)].fill(entry);
                    }
                }

                code += count;
                index += count;
            }

            code <<= 1;
        }

        Ok(table)
    }

    fn lookup_slow(&self, length: usize, code: i32) -> Option<u8> {
        if code > self.max_codes[length] {
            return None;
        }

        let index = self.value_indices[length] + code - self.min_codes[length];

        usize::try_from(index)
            .ok()
            .and_then(|i| self.values.get(i).copied())
    }
}

impl<R: Read> Reader<R> {
    /// Decode one Huffman-coded symbol.
    pub(crate) fn decode_huffman(&mut self, table: &HuffmanTable) -> Result<u8> {
        let fast = if self.bit_count() < LUT_BITS {
            match self.fill_bits(LUT_BITS)? {
                Fill::Ready => true,
                // The next symbol may still fit into the bits that are already
                // buffered, so undo the failed read and take the slow path.
                Fill::Marker | Fill::Exhausted => {
                    self.unread_stuffed();
                    false
                }
            }
        } else {
            true
        };

        if fast {
            let entry = table.lut[usize::from(self.peek_byte_bits())];

            if entry != 0 {
                self.consume_bits(u32::from(entry & 0xFF) - 1);

                return Ok((entry >> 8) as u8);
            }
        }

        let mut code = 0_i32;

        for length in 0..MAX_CODE_LENGTH {
            code |= i32::from(self.decode_bit()?);

            if let Some(symbol) = table.lookup_slow(length, code) {
                return Ok(symbol);
            }

            code <<= 1;
        }

        err!(BitstreamError::BadHuffmanCode)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::DecodeError;

    /// Standard luminance DC table from Annex K.3.
    pub(crate) const LUMA_DC_COUNTS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    pub(crate) const LUMA_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    /// Standard luminance AC table from Annex K.3.
    const LUMA_AC_COUNTS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
    const LUMA_AC_VALUES: [u8; 162] = [
        0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
        0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52,
        0xd1, 0xf0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25,
        0x26, 0x27, 0x28, 0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45,
        0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64,
        0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83,
        0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
        0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
        0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3,
        0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8,
        0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
    ];

    /// Canonical `(code, length)` pairs in symbol-list order.
    fn canonical_codes(counts: &[u8; 16]) -> Vec<(u32, u32)> {
        let mut codes = Vec::new();
        let mut code = 0_u32;

        for (i, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                codes.push((code, i as u32 + 1));
                code += 1;
            }

            code <<= 1;
        }

        codes
    }

    /// Pack codes MSB-first, stuff 0xFF bytes and pad with one bits.
    fn pack(codes: &[(u32, u32)]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut acc = 0_u64;
        let mut count = 0;

        for &(code, length) in codes {
            acc = (acc << length) | u64::from(code);
            count += length;

            while count >= 8 {
                count -= 8;
                let byte = (acc >> count) as u8;
                out.push(byte);

                if byte == 0xFF {
                    out.push(0x00);
                }
            }
        }

        if count > 0 {
            let byte = ((acc << (8 - count)) as u8) | ((1 << (8 - count)) - 1);
            out.push(byte);

            if byte == 0xFF {
                out.push(0x00);
            }
        }

        out
    }

    fn decode_all(counts: &[u8; 16], values: &[u8]) {
        let table = HuffmanTable::new(counts, values).unwrap();
        let codes = canonical_codes(counts);

        let mut data = pack(&codes);
        data.extend_from_slice(&[0xFF, 0xD9]);

        let mut reader = Reader::new(&data[..]);

        for &expected in values {
            assert_eq!(reader.decode_huffman(&table).unwrap(), expected);
        }
    }

    #[test]
    fn standard_tables_round_trip() {
        decode_all(&LUMA_DC_COUNTS, &LUMA_DC_VALUES);
        decode_all(&LUMA_AC_COUNTS, &LUMA_AC_VALUES);
    }

    #[test]
    fn long_codes_use_slow_path() {
        // 254 codes of length 8 and two of length 9.
        let mut counts = [0; 16];
        counts[7] = 254;
        counts[8] = 2;
        let values: Vec<u8> = (0..=255).rev().collect();

        decode_all(&counts, &values);
    }

    #[test]
    fn single_short_code() {
        let mut counts = [0; 16];
        counts[0] = 1;

        decode_all(&counts, &[42]);
    }

    #[test]
    fn reversed_symbol_order() {
        decode_all(&LUMA_DC_COUNTS, &[11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn invalid_tables() {
        assert_eq!(
            HuffmanTable::new(&[0; 16], &[]).err(),
            Some(DecodeError::Format(FormatError::EmptyHuffmanTable))
        );

        let mut counts = [0; 16];
        counts[0] = 3;
        assert_eq!(
            HuffmanTable::new(&counts, &[0, 1, 2]).err(),
            Some(DecodeError::Format(FormatError::OversubscribedHuffmanTable))
        );
    }

    #[test]
    fn unknown_code() {
        // Codes 0 and 10; the bit pattern 11... matches nothing.
        let mut counts = [0; 16];
        counts[0] = 1;
        counts[1] = 1;
        let table = HuffmanTable::new(&counts, &[1, 2]).unwrap();

        let data = [0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00];
        let mut reader = Reader::new(&data[..]);

        assert_eq!(
            reader.decode_huffman(&table),
            Err(DecodeError::Bitstream(BitstreamError::BadHuffmanCode))
        );
    }
}
