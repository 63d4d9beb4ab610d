//! Entropy decoding of a single scan (Annex F and G).
//!
//! Sequential scans are reconstructed block by block straight into the
//! component planes. Progressive scans only update the coefficient store; the
//! blocks are reconstructed once all scans have been read.

use std::io::Read;

use crate::color::Plane;
use crate::error::{BitstreamError, FormatError, RestartError, Result, bail};
use crate::huffman::HuffmanTable;
use crate::idct::{self, Block, UNZIG};
use crate::marker::RST0;
use crate::reader::Reader;
use crate::segment::{FrameHeader, MAX_COMPONENTS, QuantTable, ScanHeader, Tables};

/// A scan component with everything it needs resolved up front.
#[derive(Clone, Copy)]
pub(crate) struct ScanUnit<'a> {
    /// Index into the frame's components.
    pub(crate) index: usize,
    h: usize,
    v: usize,
    blocks_per_line: usize,
    dc: Option<&'a HuffmanTable>,
    ac: Option<&'a HuffmanTable>,
    quant: Option<&'a QuantTable>,
}

/// Look up the tables of every scan component.
///
/// Sequential scans reconstruct blocks as they go, so they also need the
/// quantization tables now.
pub(crate) fn scan_units<'a>(
    frame: &FrameHeader,
    tables: &'a Tables,
    scan: &ScanHeader,
) -> Result<Vec<ScanUnit<'a>>> {
    let needs_dc = scan.zig_start == 0 && scan.ah == 0;
    let needs_ac = scan.zig_end > 0;

    scan.components
        .iter()
        .map(|sc| -> Result<ScanUnit<'a>> {
            let component = &frame.components[sc.index];

            let dc = match &tables.dc[usize::from(sc.dc_table)] {
                Some(table) => Some(table),
                None if needs_dc => bail!(FormatError::MissingHuffmanTable),
                None => None,
            };

            let ac = match &tables.ac[usize::from(sc.ac_table)] {
                Some(table) => Some(table),
                None if needs_ac => bail!(FormatError::MissingHuffmanTable),
                None => None,
            };

            let quant = match &tables.quant[usize::from(component.tq)] {
                Some(table) => Some(table),
                None if !frame.progressive => bail!(FormatError::MissingQuantizationTable),
                None => None,
            };

            Ok(ScanUnit {
                index: sc.index,
                h: usize::from(component.h),
                v: usize::from(component.v),
                blocks_per_line: frame.blocks_per_line(sc.index),
                dc,
                ac,
                quant,
            })
        })
        .collect()
}

/// Where decoded blocks go.
pub(crate) enum Output<'a> {
    /// Reconstruct every block into its component plane.
    Planes(&'a mut [Plane]),
    /// Accumulate coefficients for later reconstruction.
    Coefficients(&'a mut [Vec<Block>]),
}

impl Output<'_> {
    fn block<R: Read>(
        &mut self,
        entropy: &mut Entropy<'_, R>,
        unit: &ScanUnit<'_>,
        scan: &ScanHeader,
        bx: usize,
        by: usize,
    ) -> Result<()> {
        match self {
            Self::Planes(planes) => {
                let mut block = [0; 64];
                entropy.decode_block(unit, scan, &mut block)?;

                let Some(quant) = unit.quant else {
                    bail!(FormatError::MissingQuantizationTable);
                };

                let plane = &mut planes[unit.index];
                let stride = plane.stride;
                idct::reconstruct(&block, quant, plane.block_mut(bx, by), stride);
            }
            Self::Coefficients(store) => {
                let block = &mut store[unit.index][by * unit.blocks_per_line + bx];
                entropy.decode_block(unit, scan, block)?;
            }
        }

        Ok(())
    }
}

/// Decode the entropy-coded segments of one scan, including restart markers.
pub(crate) fn decode_scan<R: Read>(
    reader: &mut Reader<R>,
    frame: &FrameHeader,
    scan: &ScanHeader,
    units: &[ScanUnit<'_>],
    restart_interval: u16,
    mut output: Output<'_>,
) -> Result<()> {
    let mut entropy = Entropy::new(reader);
    let interval = usize::from(restart_interval);

    let restart_due = |mcu: usize| interval > 0 && mcu > 0 && mcu % interval == 0;

    if let [unit] = units {
        // A non-interleaved scan codes every block of the component's own
        // grid, one block per MCU (A.2.2).
        let (blocks_wide, blocks_high) = frame.component_blocks(unit.index);

        for by in 0..blocks_high {
            for bx in 0..blocks_wide {
                if restart_due(by * blocks_wide + bx) {
                    entropy.restart()?;
                }

                output.block(&mut entropy, unit, scan, bx, by)?;
            }
        }
    } else {
        let mcus_wide = frame.mcus_wide();

        for my in 0..frame.mcus_high() {
            for mx in 0..mcus_wide {
                if restart_due(my * mcus_wide + mx) {
                    entropy.restart()?;
                }

                for unit in units {
                    for j in 0..unit.h * unit.v {
                        let bx = unit.h * mx + j % unit.h;
                        let by = unit.v * my + j / unit.h;
                        output.block(&mut entropy, unit, scan, bx, by)?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// The mutable state of entropy decoding, reset at every scan and restart.
struct Entropy<'a, R> {
    reader: &'a mut Reader<R>,
    /// Remaining blocks (or refinement bands) of the current end-of-band run.
    eob_run: u16,
    dc_pred: [i32; MAX_COMPONENTS],
    next_restart: u8,
}

impl<'a, R: Read> Entropy<'a, R> {
    fn new(reader: &'a mut Reader<R>) -> Self {
        reader.reset_bits();

        Self {
            reader,
            eob_run: 0,
            dc_pred: [0; MAX_COMPONENTS],
            next_restart: RST0,
        }
    }

    /// Consume the restart marker that must follow a restart interval.
    fn restart(&mut self) -> Result<()> {
        let mut found = [0_u8; 2];
        self.reader.read_exact(&mut found)?;

        if found != [0xFF, self.next_restart] {
            bail!(RestartError {
                expected: self.next_restart,
                found,
            });
        }

        ltrace!("RST{}", self.next_restart - RST0);

        self.next_restart = RST0 + (self.next_restart - RST0 + 1) % 8;
        self.reader.reset_bits();
        self.eob_run = 0;
        self.dc_pred = [0; MAX_COMPONENTS];

        Ok(())
    }

    fn decode_block(
        &mut self,
        unit: &ScanUnit<'_>,
        scan: &ScanHeader,
        block: &mut Block,
    ) -> Result<()> {
        let zig_start = usize::from(scan.zig_start);
        let zig_end = usize::from(scan.zig_end);

        if scan.ah != 0 {
            let delta = 1_i32 << scan.al;

            return if zig_start == 0 {
                if self.reader.decode_bit()? {
                    block[0] |= delta;
                }

                Ok(())
            } else {
                self.refine_ac(unit.ac, block, zig_start, zig_end, delta)
            };
        }

        let mut zig = zig_start;

        if zig == 0 {
            zig += 1;
            self.decode_dc(unit, scan.al, block)?;
        }

        if zig > zig_end {
            return Ok(());
        }

        if self.eob_run > 0 {
            self.eob_run -= 1;
            return Ok(());
        }

        let Some(table) = unit.ac else {
            bail!(FormatError::MissingHuffmanTable);
        };

        while zig <= zig_end {
            let symbol = self.reader.decode_huffman(table)?;
            let (run, size) = (symbol >> 4, symbol & 0x0F);

            if size != 0 {
                zig += usize::from(run);

                if zig > zig_end {
                    break;
                }

                let value = self.reader.receive_extend(size)?;
                block[UNZIG[zig]] = value << scan.al;
            } else if run == 0x0F {
                // ZRL: sixteen zeros, counting the one skipped by the loop.
                zig += 15;
            } else {
                self.eob_run = self.read_eob_run(run)? - 1;
                break;
            }

            zig += 1;
        }

        Ok(())
    }

    fn decode_dc(&mut self, unit: &ScanUnit<'_>, al: u8, block: &mut Block) -> Result<()> {
        let Some(table) = unit.dc else {
            bail!(FormatError::MissingHuffmanTable);
        };

        let size = self.reader.decode_huffman(table)?;

        if size > 16 {
            bail!(BitstreamError::ExcessiveDcComponent);
        }

        let diff = self.reader.receive_extend(size)?;
        let pred = &mut self.dc_pred[unit.index];
        *pred = pred.wrapping_add(diff);
        block[0] = pred.wrapping_shl(u32::from(al));

        Ok(())
    }

    /// The length of an end-of-band run starting with `EOBn` (G.1.2.2).
    fn read_eob_run(&mut self, run: u8) -> Result<u16> {
        let mut eob_run = 1_u16 << run;

        if run != 0 {
            eob_run |= self.reader.decode_bits(u32::from(run))? as u16;
        }

        Ok(eob_run)
    }

    /// Successive approximation of the AC coefficients in `zig_start..=zig_end`
    /// (G.1.2.3).
    fn refine_ac(
        &mut self,
        table: Option<&HuffmanTable>,
        block: &mut Block,
        zig_start: usize,
        zig_end: usize,
        delta: i32,
    ) -> Result<()> {
        let mut zig = zig_start;

        if self.eob_run == 0 {
            let Some(table) = table else {
                bail!(FormatError::MissingHuffmanTable);
            };

            while zig <= zig_end {
                let symbol = self.reader.decode_huffman(table)?;
                let (run, size) = (symbol >> 4, symbol & 0x0F);

                let value = match size {
                    0 if run != 0x0F => {
                        self.eob_run = self.read_eob_run(run)?;
                        break;
                    }
                    0 => 0,
                    1 => {
                        if self.reader.decode_bit()? {
                            delta
                        } else {
                            -delta
                        }
                    }
                    _ => bail!(BitstreamError::UnexpectedRefinementCode),
                };

                zig = self.refine_non_zeroes(block, zig, zig_end, Some(run), delta)?;

                // A ZRL may run past the band, a new coefficient may not.
                if zig > zig_end {
                    if value != 0 {
                        bail!(BitstreamError::TooManyCoefficients);
                    }

                    break;
                }

                if value != 0 {
                    block[UNZIG[zig]] = value;
                }

                zig += 1;
            }
        }

        if self.eob_run > 0 {
            self.eob_run -= 1;
            self.refine_non_zeroes(block, zig, zig_end, None, delta)?;
        }

        Ok(())
    }

    /// Apply correction bits to the non-zero coefficients from `zig` onwards,
    /// stopping at the zero coefficient that follows `zeros` skipped ones.
    /// Without a limit the whole rest of the band is refined.
    ///
    /// Returns the position where refinement stopped.
    fn refine_non_zeroes(
        &mut self,
        block: &mut Block,
        mut zig: usize,
        zig_end: usize,
        mut zeros: Option<u8>,
        delta: i32,
    ) -> Result<usize> {
        while zig <= zig_end {
            let coefficient = &mut block[UNZIG[zig]];

            if *coefficient == 0 {
                match zeros {
                    Some(0) => break,
                    Some(n) => zeros = Some(n - 1),
                    None => {}
                }
            } else if self.reader.decode_bit()? {
                *coefficient = if *coefficient >= 0 {
                    coefficient.wrapping_add(delta)
                } else {
                    coefficient.wrapping_sub(delta)
                };
            }

            zig += 1;
        }

        Ok(zig)
    }
}
