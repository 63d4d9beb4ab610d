//! The marker-level state machine: header parsing, one entropy-decoding pass
//! per scan, and the final reconstruction once EOI is reached.

use std::io::Read;

use crate::color::{self, Plane};
use crate::error::{FormatError, Result, bail};
use crate::idct::{self, Block};
use crate::marker::{
    APP0, APP2, APP14, COM, DHT, DQT, DRI, EOI, SOF0, SOF1, SOF2, SOI, SOS, is_app, is_restart,
    name,
};
use crate::reader::Reader;
use crate::scan::{self, Output};
use crate::segment::{
    FrameHeader, IccChunk, ScanHeader, Tables, assemble_icc, read_app0, read_app2, read_app14,
    read_dht, read_dqt, read_dri, read_sof, read_sos,
};
use crate::{DecodeSettings, Image, ImageInfo};

pub(crate) struct Decoder<R> {
    reader: Reader<R>,
    settings: DecodeSettings,
    frame: Option<FrameHeader>,
    tables: Tables,
    restart_interval: u16,
    jfif: bool,
    adobe_transform: Option<u8>,
    icc_chunks: Vec<IccChunk>,
    /// Sample planes of sequential images, filled scan by scan.
    planes: Vec<Plane>,
    /// Coefficients of progressive images, one store per component.
    coefficients: Vec<Vec<Block>>,
    seen_scan: bool,
}

impl<R: Read> Decoder<R> {
    pub(crate) fn new(reader: R, settings: &DecodeSettings) -> Self {
        Self {
            reader: Reader::new(reader),
            settings: *settings,
            frame: None,
            tables: Tables::default(),
            restart_interval: 0,
            jfif: false,
            adobe_transform: None,
            icc_chunks: Vec::new(),
            planes: Vec::new(),
            coefficients: Vec::new(),
            seen_scan: false,
        }
    }

    /// Parse the header segments without decoding any scan.
    pub(crate) fn read_info(mut self) -> Result<ImageInfo> {
        self.run(true)?;

        let Some(frame) = &self.frame else {
            bail!(FormatError::MissingSof);
        };

        Ok(ImageInfo {
            width: u32::from(frame.width),
            height: u32::from(frame.height),
            num_components: frame.components.len() as u8,
            progressive: frame.progressive,
            color_space: color::resolve(&frame.components, self.jfif, self.adobe_transform),
        })
    }

    pub(crate) fn decode(mut self) -> Result<Image> {
        self.run(false)?;
        self.finish()
    }

    /// Process segments until EOI. With `headers_only`, stop at the first SOS,
    /// or right after the frame header if a JFIF segment preceded it.
    fn run(&mut self, headers_only: bool) -> Result<()> {
        if self.reader.read_u16()? != u16::from_be_bytes([0xFF, SOI]) {
            bail!(FormatError::MissingSoi);
        }

        loop {
            let marker = self.reader.next_marker()?;

            if marker == EOI {
                return Ok(());
            }

            // Restart markers carry no length and only belong inside a scan.
            if is_restart(marker) {
                ltrace!("ignoring stray RST{} marker", marker & 7);
                continue;
            }

            let Some(len) = usize::from(self.reader.read_u16()?).checked_sub(2) else {
                bail!(FormatError::SegmentLength(name(marker)));
            };

            ltrace!("{} segment (0x{:02X}) with {} bytes", name(marker), marker, len);

            match marker {
                SOF0 | SOF1 | SOF2 => {
                    if self.frame.is_some() {
                        bail!(FormatError::DuplicateSof);
                    }

                    let frame = read_sof(&mut self.reader, len, marker)?;
                    let pixels = u64::from(frame.width) * u64::from(frame.height);

                    if !headers_only && pixels > self.settings.max_pixels {
                        bail!(FormatError::ImageTooLarge);
                    }

                    ldebug!(
                        "{}x{} frame with {} components, progressive: {}",
                        frame.width,
                        frame.height,
                        frame.components.len(),
                        frame.progressive
                    );

                    self.coefficients = vec![Vec::new(); frame.components.len()];
                    self.frame = Some(frame);

                    if headers_only && self.jfif {
                        return Ok(());
                    }
                }
                DHT if headers_only => self.reader.skip(len)?,
                DHT => {
                    let baseline = self.frame.as_ref().is_some_and(|f| f.baseline);
                    read_dht(&mut self.reader, len, baseline, &mut self.tables)?;
                }
                DQT if headers_only => self.reader.skip(len)?,
                DQT => read_dqt(&mut self.reader, len, &mut self.tables)?,
                DRI => {
                    self.restart_interval = read_dri(&mut self.reader, len)?;
                    ltrace!("restart interval {}", self.restart_interval);
                }
                SOS => {
                    let Some(frame) = &self.frame else {
                        bail!(FormatError::MissingSof);
                    };

                    if headers_only {
                        return Ok(());
                    }

                    let header = read_sos(&mut self.reader, len, frame)?;
                    self.read_scan(&header)?;
                }
                APP0 => self.jfif |= read_app0(&mut self.reader, len)?,
                APP2 => {
                    if let Some(chunk) = read_app2(&mut self.reader, len)? {
                        self.icc_chunks.push(chunk);
                    }
                }
                APP14 => {
                    if let Some(transform) = read_app14(&mut self.reader, len)? {
                        self.adobe_transform = Some(transform);
                    }
                }
                m if is_app(m) || m == COM => self.reader.skip(len)?,
                m if m < 0xC0 => bail!(FormatError::UnknownMarker(m)),
                // Arithmetic coding, lossless and hierarchical processes, DNL
                // and the reserved JPG markers.
                m => bail!(FormatError::UnsupportedMarker(m)),
            }
        }
    }

    fn read_scan(&mut self, header: &ScanHeader) -> Result<()> {
        let Some(frame) = &self.frame else {
            bail!(FormatError::MissingSof);
        };

        ldebug!(
            "scan of {} components, Ss={} Se={} Ah={} Al={}",
            header.components.len(),
            header.zig_start,
            header.zig_end,
            header.ah,
            header.al
        );

        let units = scan::scan_units(frame, &self.tables, header)?;

        let output = if frame.progressive {
            for unit in &units {
                let store = &mut self.coefficients[unit.index];

                if store.is_empty() {
                    let blocks =
                        frame.blocks_per_line(unit.index) * frame.block_lines(unit.index);
                    *store = vec![[0; 64]; blocks];
                }
            }

            Output::Coefficients(&mut self.coefficients)
        } else {
            if self.planes.is_empty() {
                self.planes = allocate_planes(frame);
            }

            Output::Planes(&mut self.planes)
        };

        scan::decode_scan(
            &mut self.reader,
            frame,
            header,
            &units,
            self.restart_interval,
            output,
        )?;
        self.seen_scan = true;

        Ok(())
    }

    fn finish(mut self) -> Result<Image> {
        let Some(frame) = self.frame.take() else {
            bail!(FormatError::MissingSof);
        };

        if !self.seen_scan {
            bail!(FormatError::MissingSos);
        }

        if frame.progressive {
            self.planes = allocate_planes(&frame);

            for (index, store) in self.coefficients.iter().enumerate() {
                // A component that no scan referenced stays blank.
                if store.is_empty() {
                    continue;
                }

                let tq = usize::from(frame.components[index].tq);
                let Some(quant) = &self.tables.quant[tq] else {
                    bail!(FormatError::MissingQuantizationTable);
                };

                let (blocks_wide, blocks_high) = frame.component_blocks(index);
                let blocks_per_line = frame.blocks_per_line(index);
                let plane = &mut self.planes[index];
                let stride = plane.stride;

                for by in 0..blocks_high {
                    for bx in 0..blocks_wide {
                        let block = &store[by * blocks_per_line + bx];
                        idct::reconstruct(block, quant, plane.block_mut(bx, by), stride);
                    }
                }
            }
        }

        let width = usize::from(frame.width);
        let height = usize::from(frame.height);
        let color_space = color::resolve(&frame.components, self.jfif, self.adobe_transform);
        let (layout, data) = color::assemble(
            &self.planes,
            width,
            height,
            color_space,
            self.adobe_transform.is_some(),
        );

        ldebug!("decoded {}x{} image as {:?}", width, height, color_space);

        Ok(Image {
            width: u32::from(frame.width),
            height: u32::from(frame.height),
            color_space,
            layout,
            data,
            icc_profile: assemble_icc(self.icc_chunks),
        })
    }
}

fn allocate_planes(frame: &FrameHeader) -> Vec<Plane> {
    (0..frame.components.len())
        .map(|index| Plane::new(frame, index))
        .collect()
}
