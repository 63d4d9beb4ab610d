//! Component planes and their conversion into gray or RGBA pixels.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::segment::{Component, FrameHeader, MAX_COMPONENTS};

/// The color model of the encoded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// A single luminance component.
    Gray,
    /// Luminance and two chrominance components.
    YCbCr,
    /// Three components that are stored as RGB without a transform.
    Rgb,
    /// Four components holding cyan, magenta, yellow and black.
    Cmyk,
    /// YCbCr-coded CMY with a separate black component.
    Ycck,
}

/// The memory layout of decoded pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// One byte per pixel.
    Gray,
    /// Four bytes per pixel with an opaque alpha channel.
    Rgba,
}

impl PixelLayout {
    /// The number of bytes a single pixel occupies.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgba => 4,
        }
    }
}

/// Pick the color model from the component count and the hints of the APP0
/// and APP14 segments.
pub(crate) fn resolve(components: &[Component], jfif: bool, adobe: Option<u8>) -> ColorSpace {
    match components.len() {
        1 => ColorSpace::Gray,
        4 => match adobe {
            Some(transform) if transform != 0 => ColorSpace::Ycck,
            _ => ColorSpace::Cmyk,
        },
        _ => {
            if jfif {
                return ColorSpace::YCbCr;
            }

            match adobe {
                Some(0) => ColorSpace::Rgb,
                Some(1) => ColorSpace::YCbCr,
                _ if components.iter().map(|c| c.id).eq(*b"RGB") => ColorSpace::Rgb,
                _ => ColorSpace::YCbCr,
            }
        }
    }
}

/// The decoded samples of one component, padded to whole MCUs.
pub(crate) struct Plane {
    pub(crate) data: Vec<u8>,
    pub(crate) stride: usize,
    /// How many output pixels share one sample horizontally.
    h_ratio: usize,
    /// How many output rows share one sample row.
    v_ratio: usize,
}

impl Plane {
    pub(crate) fn new(frame: &FrameHeader, index: usize) -> Self {
        let component = &frame.components[index];
        let stride = frame.blocks_per_line(index) * 8;
        let rows = frame.block_lines(index) * 8;

        Self {
            data: vec![0; stride * rows],
            stride,
            h_ratio: frame.max_h() / usize::from(component.h),
            v_ratio: frame.max_v() / usize::from(component.v),
        }
    }

    /// The output area of the block at block coordinates `(bx, by)`.
    pub(crate) fn block_mut(&mut self, bx: usize, by: usize) -> &mut [u8] {
        &mut self.data[by * 8 * self.stride + bx * 8..]
    }

    /// The samples that cover output row `y`.
    fn row(&self, y: usize) -> &[u8] {
        let start = (y / self.v_ratio) * self.stride;
        &self.data[start..start + self.stride]
    }
}

/// Convert one sample triple with the JFIF equations, in 16.16 fixed point.
pub(crate) fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    // 1.40200 * 65536 = 91881, 0.34414 * 65536 = 22554, 0.71414 * 65536 =
    // 46802 and 1.77200 * 65536 = 116130. Multiplying y by 0x10101 instead of
    // 0x10000 rounds to the nearest value for the neutral chroma case.
    let yy = i32::from(y) * 0x10101;
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    let clamp = |v: i32| (v >> 16).clamp(0, 255) as u8;

    [
        clamp(yy + 91881 * cr),
        clamp(yy - 22554 * cb - 46802 * cr),
        clamp(yy + 116130 * cb),
    ]
}

/// Convert ink amounts to RGB.
pub(crate) fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let w = 0xFFFF - u32::from(k) * 0x101;
    let channel = |v: u8| (((0xFFFF - u32::from(v) * 0x101) * w / 0xFFFF) >> 8) as u8;

    [channel(c), channel(m), channel(y)]
}

/// Interleave the component planes into the output buffer.
///
/// `inverted` marks CMYK written with the Adobe convention of storing
/// `255 - ink`.
pub(crate) fn assemble(
    planes: &[Plane],
    width: usize,
    height: usize,
    color_space: ColorSpace,
    inverted: bool,
) -> (PixelLayout, Vec<u8>) {
    let layout = match color_space {
        ColorSpace::Gray => PixelLayout::Gray,
        _ => PixelLayout::Rgba,
    };
    let row_len = width * layout.bytes_per_pixel();
    let mut data = vec![0; row_len * height];

    let convert = |(y, out): (usize, &mut [u8])| {
        convert_row(planes, color_space, inverted, y, out);
    };

    #[cfg(feature = "rayon")]
    data.par_chunks_mut(row_len).enumerate().for_each(convert);
    #[cfg(not(feature = "rayon"))]
    data.chunks_mut(row_len).enumerate().for_each(convert);

    (layout, data)
}

fn convert_row(planes: &[Plane], color_space: ColorSpace, inverted: bool, y: usize, out: &mut [u8]) {
    let empty: &[u8] = &[];
    let mut rows = [(empty, 1); MAX_COMPONENTS];

    for (row, plane) in rows.iter_mut().zip(planes) {
        *row = (plane.row(y), plane.h_ratio);
    }

    let sample = |c: usize, x: usize| {
        let (row, ratio) = rows[c];
        row[x / ratio]
    };

    match color_space {
        ColorSpace::Gray => {
            let width = out.len();
            out.copy_from_slice(&rows[0].0[..width]);
        }
        ColorSpace::YCbCr => {
            for (x, px) in out.chunks_exact_mut(4).enumerate() {
                let [r, g, b] = ycbcr_to_rgb(sample(0, x), sample(1, x), sample(2, x));
                px.copy_from_slice(&[r, g, b, 255]);
            }
        }
        ColorSpace::Rgb => {
            for (x, px) in out.chunks_exact_mut(4).enumerate() {
                px.copy_from_slice(&[sample(0, x), sample(1, x), sample(2, x), 255]);
            }
        }
        ColorSpace::Cmyk => {
            let ink = |v: u8| if inverted { 255 - v } else { v };

            for (x, px) in out.chunks_exact_mut(4).enumerate() {
                let [r, g, b] = cmyk_to_rgb(
                    ink(sample(0, x)),
                    ink(sample(1, x)),
                    ink(sample(2, x)),
                    ink(sample(3, x)),
                );
                px.copy_from_slice(&[r, g, b, 255]);
            }
        }
        ColorSpace::Ycck => {
            // The YCbCr part decodes to the ink amounts directly, while the
            // black channel keeps the Adobe inversion.
            for (x, px) in out.chunks_exact_mut(4).enumerate() {
                let [c, m, ye] = ycbcr_to_rgb(sample(0, x), sample(1, x), sample(2, x));
                let [r, g, b] = cmyk_to_rgb(c, m, ye, 255 - sample(3, x));
                px.copy_from_slice(&[r, g, b, 255]);
            }
        }
    }
}
