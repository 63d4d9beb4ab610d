//! Parsing of marker segments (Annex B.2).

use std::io::Read;

use crate::error::{FormatError, Result, bail};
use crate::huffman::{HuffmanTable, MAX_CODE_LENGTH, MAX_CODES};
use crate::reader::Reader;

pub(crate) const MAX_COMPONENTS: usize = 4;

/// Quantization table entries in zig-zag order.
pub(crate) type QuantTable = [u16; 64];

/// A frame component specification (B.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Component {
    pub(crate) id: u8,
    pub(crate) h: u8,
    pub(crate) v: u8,
    pub(crate) tq: u8,
}

#[derive(Debug, Clone)]
pub(crate) struct FrameHeader {
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) components: Vec<Component>,
    /// Baseline sequential (SOF0), which restricts table destinations to 0 and 1.
    pub(crate) baseline: bool,
    pub(crate) progressive: bool,
}

impl FrameHeader {
    pub(crate) fn max_h(&self) -> usize {
        self.components.iter().map(|c| usize::from(c.h)).max().unwrap_or(1)
    }

    pub(crate) fn max_v(&self) -> usize {
        self.components.iter().map(|c| usize::from(c.v)).max().unwrap_or(1)
    }

    pub(crate) fn mcus_wide(&self) -> usize {
        usize::from(self.width).div_ceil(8 * self.max_h())
    }

    pub(crate) fn mcus_high(&self) -> usize {
        usize::from(self.height).div_ceil(8 * self.max_v())
    }

    /// The size of a component's sample grid, before any padding to whole
    /// blocks (A.1.1).
    pub(crate) fn component_size(&self, index: usize) -> (usize, usize) {
        let c = &self.components[index];

        (
            (usize::from(self.width) * usize::from(c.h)).div_ceil(self.max_h()),
            (usize::from(self.height) * usize::from(c.v)).div_ceil(self.max_v()),
        )
    }

    /// The number of blocks a non-interleaved scan of the component codes.
    pub(crate) fn component_blocks(&self, index: usize) -> (usize, usize) {
        let (w, h) = self.component_size(index);

        (w.div_ceil(8), h.div_ceil(8))
    }

    /// The number of blocks per row of the component, including the padding
    /// of partial MCUs.
    pub(crate) fn blocks_per_line(&self, index: usize) -> usize {
        self.mcus_wide() * usize::from(self.components[index].h)
    }

    /// The number of block rows of the component, including padding.
    pub(crate) fn block_lines(&self, index: usize) -> usize {
        self.mcus_high() * usize::from(self.components[index].v)
    }
}

/// Huffman and quantization tables, indexed by destination.
#[derive(Default, Clone)]
pub(crate) struct Tables {
    pub(crate) dc: [Option<HuffmanTable>; 4],
    pub(crate) ac: [Option<HuffmanTable>; 4],
    pub(crate) quant: [Option<QuantTable>; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanComponent {
    /// Index into the frame's components.
    pub(crate) index: usize,
    pub(crate) dc_table: u8,
    pub(crate) ac_table: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScanHeader {
    pub(crate) components: Vec<ScanComponent>,
    pub(crate) zig_start: u8,
    pub(crate) zig_end: u8,
    pub(crate) ah: u8,
    pub(crate) al: u8,
}

/// One APP2 chunk of an embedded ICC profile.
#[derive(Debug, Clone)]
pub(crate) struct IccChunk {
    pub(crate) sequence: u8,
    pub(crate) count: u8,
    pub(crate) data: Vec<u8>,
}

/// Parse a frame header (B.2.2).
pub(crate) fn read_sof<R: Read>(
    reader: &mut Reader<R>,
    len: usize,
    marker: u8,
) -> Result<FrameHeader> {
    let count = match len {
        9 => 1,
        15 => 3,
        18 => 4,
        _ => bail!(FormatError::UnsupportedComponentCount),
    };

    let mut buf = [0_u8; 6 + 3 * MAX_COMPONENTS];
    let data = &mut buf[..len];
    reader.read_exact(data)?;

    if data[0] != 8 {
        bail!(FormatError::UnsupportedPrecision(data[0]));
    }

    let height = u16::from_be_bytes([data[1], data[2]]);
    let width = u16::from_be_bytes([data[3], data[4]]);

    if usize::from(data[5]) != count {
        bail!(FormatError::SegmentLength("SOF"));
    }

    // Defining the height through a DNL marker is not supported.
    if width == 0 || height == 0 {
        bail!(FormatError::InvalidDimensions);
    }

    let mut components: Vec<Component> = Vec::with_capacity(count);

    for (i, entry) in data[6..].chunks_exact(3).enumerate() {
        let (id, hv, tq) = (entry[0], entry[1], entry[2]);

        // "The value of C_i shall be different from the values of C_1 through
        // C_(i-1)." (B.2.2)
        if components.iter().any(|c| c.id == id) {
            bail!(FormatError::RepeatedComponentId);
        }

        if tq > 3 {
            bail!(FormatError::InvalidQuantizationTable);
        }

        let (mut h, mut v) = (hv >> 4, hv & 0x0F);

        if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
            bail!(FormatError::InvalidSamplingFactor);
        }

        if h == 3 || v == 3 {
            bail!(FormatError::UnsupportedSubsampling);
        }

        match count {
            // A single component is non-interleaved by definition, so its data
            // units are in raster order whatever the sampling factors (A.2).
            1 => (h, v) = (1, 1),
            // Luma at 1x1 to 4x2, chroma dividing luma and both chroma
            // components sampled alike.
            3 => {
                let unsupported = match i {
                    0 => v == 4,
                    1 => components[0].h % h != 0 || components[0].v % v != 0,
                    _ => components[1].h != h || components[1].v != v,
                };

                if unsupported {
                    bail!(FormatError::UnsupportedSubsampling);
                }
            }
            // CMYK or YCCK with either no subsampling or 2x2 subsampled middle
            // channels.
            _ => {
                let unsupported = match i {
                    0 => hv != 0x11 && hv != 0x22,
                    1 | 2 => hv != 0x11,
                    _ => components[0].h != h || components[0].v != v,
                };

                if unsupported {
                    bail!(FormatError::UnsupportedSubsampling);
                }
            }
        }

        components.push(Component { id, h, v, tq });
    }

    // An MCU may hold at most 10 blocks (B.2.3).
    if count > 1 {
        let blocks: usize = components
            .iter()
            .map(|c| usize::from(c.h) * usize::from(c.v))
            .sum();

        if blocks > 10 {
            bail!(FormatError::SamplingTooLarge);
        }
    }

    Ok(FrameHeader {
        width,
        height,
        components,
        baseline: marker == crate::marker::SOF0,
        progressive: marker == crate::marker::SOF2,
    })
}

/// Parse one or more Huffman tables (B.2.4.2).
pub(crate) fn read_dht<R: Read>(
    reader: &mut Reader<R>,
    mut len: usize,
    baseline: bool,
    tables: &mut Tables,
) -> Result<()> {
    while len > 0 {
        if len < 17 {
            bail!(FormatError::SegmentLength("DHT"));
        }

        let mut header = [0_u8; 1 + MAX_CODE_LENGTH];
        reader.read_exact(&mut header)?;
        len -= header.len();

        let class = header[0] >> 4;
        let id = header[0] & 0x0F;

        if class > 1 || id > 3 || (baseline && id > 1) {
            bail!(FormatError::InvalidHuffmanTable);
        }

        let mut counts = [0_u8; MAX_CODE_LENGTH];
        counts.copy_from_slice(&header[1..]);
        let total: usize = counts.iter().map(|c| usize::from(*c)).sum();

        if total == 0 {
            bail!(FormatError::EmptyHuffmanTable);
        }

        if total > MAX_CODES {
            bail!(FormatError::InvalidHuffmanTable);
        }

        if total > len {
            bail!(FormatError::SegmentLength("DHT"));
        }

        let mut values = [0_u8; MAX_CODES];
        reader.read_exact(&mut values[..total])?;
        len -= total;

        let table = HuffmanTable::new(&counts, &values[..total])?;
        ltrace!("DHT class {} id {} with {} codes", class, id, total);

        let slot = if class == 0 {
            &mut tables.dc
        } else {
            &mut tables.ac
        };
        slot[usize::from(id)] = Some(table);
    }

    Ok(())
}

/// Parse one or more quantization tables (B.2.4.1).
pub(crate) fn read_dqt<R: Read>(
    reader: &mut Reader<R>,
    mut len: usize,
    tables: &mut Tables,
) -> Result<()> {
    while len > 0 {
        len -= 1;
        let pq_tq = reader.read_byte()?;
        let id = pq_tq & 0x0F;

        if id > 3 {
            bail!(FormatError::InvalidQuantizationTable);
        }

        let mut table = [0_u16; 64];

        match pq_tq >> 4 {
            0 => {
                if len < 64 {
                    break;
                }

                let mut raw = [0_u8; 64];
                reader.read_exact(&mut raw)?;
                len -= raw.len();

                for (q, r) in table.iter_mut().zip(raw) {
                    *q = u16::from(r);
                }
            }
            1 => {
                if len < 128 {
                    break;
                }

                let mut raw = [0_u8; 128];
                reader.read_exact(&mut raw)?;
                len -= raw.len();

                for (q, r) in table.iter_mut().zip(raw.chunks_exact(2)) {
                    *q = u16::from_be_bytes([r[0], r[1]]);
                }
            }
            _ => bail!(FormatError::InvalidQuantizationTable),
        }

        tables.quant[usize::from(id)] = Some(table);
    }

    if len != 0 {
        bail!(FormatError::SegmentLength("DQT"));
    }

    Ok(())
}

/// Parse a restart interval definition (B.2.4.4).
pub(crate) fn read_dri<R: Read>(reader: &mut Reader<R>, len: usize) -> Result<u16> {
    if len != 2 {
        bail!(FormatError::SegmentLength("DRI"));
    }

    reader.read_u16()
}

/// Parse a scan header (B.2.3).
pub(crate) fn read_sos<R: Read>(
    reader: &mut Reader<R>,
    len: usize,
    frame: &FrameHeader,
) -> Result<ScanHeader> {
    let frame_count = frame.components.len();

    if len < 6 || len > 4 + 2 * frame_count || len % 2 != 0 {
        bail!(FormatError::SegmentLength("SOS"));
    }

    let mut buf = [0_u8; 4 + 2 * MAX_COMPONENTS];
    let data = &mut buf[..len];
    reader.read_exact(data)?;

    let count = usize::from(data[0]);

    if len != 4 + 2 * count {
        bail!(FormatError::SegmentLength("SOS"));
    }

    let mut components: Vec<ScanComponent> = Vec::with_capacity(count);

    for entry in data[1..1 + 2 * count].chunks_exact(2) {
        let (selector, tables) = (entry[0], entry[1]);

        let Some(index) = frame.components.iter().position(|c| c.id == selector) else {
            bail!(FormatError::UnknownComponentSelector);
        };

        if components.iter().any(|c| c.index == index) {
            bail!(FormatError::RepeatedComponentSelector);
        }

        let (dc_table, ac_table) = (tables >> 4, tables & 0x0F);
        let limit = if frame.baseline { 1 } else { 3 };

        if dc_table > limit || ac_table > limit {
            bail!(FormatError::InvalidHuffmanTable);
        }

        components.push(ScanComponent {
            index,
            dc_table,
            ac_table,
        });
    }

    let mut scan = ScanHeader {
        components,
        zig_start: 0,
        zig_end: 63,
        ah: 0,
        al: 0,
    };

    // Sequential scans always cover the full band with Ss = 0, Se = 63 and
    // Ah = Al = 0, whatever the header says.
    if frame.progressive {
        let params = &data[1 + 2 * count..];
        scan.zig_start = params[0];
        scan.zig_end = params[1];
        scan.ah = params[2] >> 4;
        scan.al = params[2] & 0x0F;

        if (scan.zig_start == 0 && scan.zig_end != 0)
            || scan.zig_start > scan.zig_end
            || scan.zig_end >= 64
        {
            bail!(FormatError::InvalidSpectralSelection);
        }

        // AC scans are always non-interleaved (G.1.1.1.1).
        if scan.zig_start != 0 && count != 1 {
            bail!(FormatError::InvalidSpectralSelection);
        }

        if scan.ah != 0 && scan.ah != scan.al + 1 {
            bail!(FormatError::InvalidSuccessiveApproximation);
        }
    }

    Ok(scan)
}

/// Check the JFIF signature of an APP0 segment.
pub(crate) fn read_app0<R: Read>(reader: &mut Reader<R>, len: usize) -> Result<bool> {
    if len < 5 {
        reader.skip(len)?;
        return Ok(false);
    }

    let mut signature = [0_u8; 5];
    reader.read_exact(&mut signature)?;
    reader.skip(len - signature.len())?;

    Ok(&signature == b"JFIF\0")
}

/// Read the color transform of an Adobe APP14 segment.
pub(crate) fn read_app14<R: Read>(reader: &mut Reader<R>, len: usize) -> Result<Option<u8>> {
    if len < 12 {
        reader.skip(len)?;
        return Ok(None);
    }

    let mut data = [0_u8; 12];
    reader.read_exact(&mut data)?;
    reader.skip(len - data.len())?;

    if &data[..5] == b"Adobe" {
        Ok(Some(data[11]))
    } else {
        Ok(None)
    }
}

/// Read an ICC profile chunk from an APP2 segment.
pub(crate) fn read_app2<R: Read>(reader: &mut Reader<R>, len: usize) -> Result<Option<IccChunk>> {
    const SIGNATURE: &[u8; 12] = b"ICC_PROFILE\0";

    if len < SIGNATURE.len() + 2 {
        reader.skip(len)?;
        return Ok(None);
    }

    let mut header = [0_u8; 14];
    reader.read_exact(&mut header)?;
    let rest = len - header.len();

    if &header[..12] != SIGNATURE {
        reader.skip(rest)?;
        return Ok(None);
    }

    let mut data = vec![0; rest];
    reader.read_exact(&mut data)?;

    Ok(Some(IccChunk {
        sequence: header[12],
        count: header[13],
        data,
    }))
}

/// Concatenate ICC chunks in sequence order, if they form a complete profile.
pub(crate) fn assemble_icc(mut chunks: Vec<IccChunk>) -> Option<Vec<u8>> {
    let count = chunks.first()?.count;

    if usize::from(count) != chunks.len() || chunks.iter().any(|c| c.count != count) {
        lwarn!("ignoring ICC profile with inconsistent chunk count");
        return None;
    }

    chunks.sort_by_key(|c| c.sequence);

    if chunks
        .iter()
        .enumerate()
        .any(|(i, c)| usize::from(c.sequence) != i + 1)
    {
        lwarn!("ignoring ICC profile with invalid chunk sequence");
        return None;
    }

    Some(chunks.into_iter().flat_map(|c| c.data).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::marker::{SOF0, SOF2};

    fn sof(data: &[u8], marker: u8) -> Result<FrameHeader> {
        let mut reader = Reader::new(data);
        read_sof(&mut reader, data.len(), marker)
    }

    fn format_err<T>(result: Result<T>) -> FormatError {
        match result {
            Err(DecodeError::Format(e)) => e,
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    const YCBCR_420: [u8; 15] = [
        8, 0, 24, 0, 17, 3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1,
    ];

    #[test]
    fn frame_420() {
        let frame = sof(&YCBCR_420, SOF2).unwrap();

        assert!(frame.progressive);
        assert!(!frame.baseline);
        assert_eq!((frame.width, frame.height), (17, 24));
        assert_eq!((frame.mcus_wide(), frame.mcus_high()), (2, 2));
        assert_eq!(frame.component_size(0), (17, 24));
        assert_eq!(frame.component_size(1), (9, 12));
        assert_eq!(frame.component_blocks(0), (3, 3));
        assert_eq!(frame.component_blocks(1), (2, 2));
        assert_eq!(frame.blocks_per_line(0), 4);
        assert_eq!(frame.blocks_per_line(2), 2);
        assert_eq!(frame.block_lines(0), 4);
    }

    #[test]
    fn single_component_ignores_sampling() {
        let frame = sof(&[8, 0, 8, 0, 8, 1, 1, 0x22, 0], SOF0).unwrap();

        assert!(frame.baseline);
        assert_eq!((frame.components[0].h, frame.components[0].v), (1, 1));
    }

    #[test]
    fn invalid_frames() {
        let mut data = YCBCR_420;
        data[0] = 12;
        assert_eq!(
            format_err(sof(&data, SOF0)),
            FormatError::UnsupportedPrecision(12)
        );

        let mut data = YCBCR_420;
        data[9] = 1;
        assert_eq!(format_err(sof(&data, SOF0)), FormatError::RepeatedComponentId);

        let mut data = YCBCR_420;
        data[7] = 0x33;
        assert_eq!(format_err(sof(&data, SOF0)), FormatError::UnsupportedSubsampling);

        let mut data = YCBCR_420;
        data[7] = 0x50;
        assert_eq!(format_err(sof(&data, SOF0)), FormatError::InvalidSamplingFactor);

        let mut data = YCBCR_420;
        data[13] = 0x21;
        assert_eq!(format_err(sof(&data, SOF0)), FormatError::UnsupportedSubsampling);

        // 4x2 luma with 2x2 chroma needs 16 blocks per MCU.
        let mut data = YCBCR_420;
        data[7] = 0x42;
        data[10] = 0x22;
        data[13] = 0x22;
        assert_eq!(format_err(sof(&data, SOF2)), FormatError::SamplingTooLarge);

        // 4x2 luma with 1x1 chroma fills exactly 10 blocks.
        let mut data = YCBCR_420;
        data[7] = 0x42;
        assert!(sof(&data, SOF2).is_ok());

        let mut data = YCBCR_420;
        data[5] = 1;
        assert_eq!(format_err(sof(&data, SOF0)), FormatError::SegmentLength("SOF"));

        let mut data = YCBCR_420;
        data[1] = 0;
        data[2] = 0;
        assert_eq!(format_err(sof(&data, SOF0)), FormatError::InvalidDimensions);

        assert_eq!(
            format_err(sof(&YCBCR_420[..12], SOF0)),
            FormatError::UnsupportedComponentCount
        );
    }

    #[test]
    fn sixteen_bit_quantization() {
        let mut data = vec![0x12];
        data.extend((0..64_u16).flat_map(|i| (i * 300).to_be_bytes()));
        let mut reader = Reader::new(&data[..]);
        let mut tables = Tables::default();

        read_dqt(&mut reader, data.len(), &mut tables).unwrap();

        let table = tables.quant[2].unwrap();
        assert_eq!(table[0], 0);
        assert_eq!(table[63], 63 * 300);
    }

    #[test]
    fn short_quantization_table() {
        let data = [0x00; 40];
        let mut reader = Reader::new(&data[..]);
        let mut tables = Tables::default();

        assert_eq!(
            format_err(read_dqt(&mut reader, data.len(), &mut tables)),
            FormatError::SegmentLength("DQT")
        );
    }

    #[test]
    fn huffman_segment_length() {
        let mut data = vec![0x10, 0, 3];
        data.extend([0; 14]);
        data.extend([1, 2]);
        let mut reader = Reader::new(&data[..]);
        let mut tables = Tables::default();

        assert_eq!(
            format_err(read_dht(&mut reader, data.len(), false, &mut tables)),
            FormatError::SegmentLength("DHT")
        );
    }

    #[test]
    fn baseline_table_destinations() {
        let mut data = vec![0x02, 1];
        data.extend([0; 15]);
        data.push(0);
        let mut reader = Reader::new(&data[..]);
        let mut tables = Tables::default();

        assert_eq!(
            format_err(read_dht(&mut reader, data.len(), true, &mut tables)),
            FormatError::InvalidHuffmanTable
        );

        let mut reader = Reader::new(&data[..]);
        read_dht(&mut reader, data.len(), false, &mut tables).unwrap();
        assert!(tables.dc[2].is_some());
    }

    fn sos(data: &[u8], frame: &FrameHeader) -> Result<ScanHeader> {
        let mut reader = Reader::new(data);
        read_sos(&mut reader, data.len(), frame)
    }

    #[test]
    fn scans() {
        let frame = sof(&YCBCR_420, SOF2).unwrap();

        let scan = sos(&[3, 1, 0x00, 2, 0x11, 3, 0x11, 0, 0, 0x01], &frame).unwrap();
        assert_eq!(scan.components.len(), 3);
        assert_eq!(scan.components[2].index, 2);
        assert_eq!((scan.zig_start, scan.zig_end, scan.ah, scan.al), (0, 0, 0, 1));

        let scan = sos(&[1, 3, 0x01, 1, 63, 0x21], &frame).unwrap();
        assert_eq!(scan.components[0].index, 2);
        assert_eq!(scan.components[0].ac_table, 1);
        assert_eq!((scan.zig_start, scan.zig_end, scan.ah, scan.al), (1, 63, 2, 1));
    }

    #[test]
    fn invalid_scans() {
        let frame = sof(&YCBCR_420, SOF2).unwrap();

        assert_eq!(
            format_err(sos(&[1, 9, 0x00, 0, 0, 0], &frame)),
            FormatError::UnknownComponentSelector
        );
        assert_eq!(
            format_err(sos(&[2, 1, 0x00, 1, 0x00, 0, 0, 0], &frame)),
            FormatError::RepeatedComponentSelector
        );
        assert_eq!(
            format_err(sos(&[2, 1, 0x00, 2, 0x00, 1, 5, 0], &frame)),
            FormatError::InvalidSpectralSelection
        );
        assert_eq!(
            format_err(sos(&[1, 1, 0x00, 0, 5, 0], &frame)),
            FormatError::InvalidSpectralSelection
        );
        assert_eq!(
            format_err(sos(&[1, 1, 0x00, 1, 64, 0], &frame)),
            FormatError::InvalidSpectralSelection
        );
        assert_eq!(
            format_err(sos(&[1, 1, 0x00, 1, 5, 0x31], &frame)),
            FormatError::InvalidSuccessiveApproximation
        );

        // More components than the frame declares.
        let gray = sof(&[8, 0, 8, 0, 8, 1, 1, 0x11, 0], SOF2).unwrap();
        assert_eq!(
            format_err(sos(&[2, 1, 0x00, 2, 0x00, 0, 0, 0], &gray)),
            FormatError::SegmentLength("SOS")
        );
    }

    #[test]
    fn application_segments() {
        let data = *b"JFIF\0\x01\x02";
        let mut reader = Reader::new(&data[..]);
        assert!(read_app0(&mut reader, data.len()).unwrap());

        let data = *b"Adobe\0\x64\0\0\0\0\x02";
        let mut reader = Reader::new(&data[..]);
        assert_eq!(read_app14(&mut reader, data.len()).unwrap(), Some(2));

        let data = *b"Exif\0\0";
        let mut reader = Reader::new(&data[..]);
        assert_eq!(read_app14(&mut reader, data.len()).unwrap(), None);
    }

    #[test]
    fn icc_chunks() {
        let chunk = |sequence, data: &[u8]| IccChunk {
            sequence,
            count: 2,
            data: data.to_vec(),
        };

        assert_eq!(
            assemble_icc(vec![chunk(2, b"cd"), chunk(1, b"ab")]),
            Some(b"abcd".to_vec())
        );
        assert_eq!(assemble_icc(vec![chunk(1, b"ab")]), None);
        assert_eq!(assemble_icc(vec![chunk(1, b"ab"), chunk(1, b"cd")]), None);
    }
}
