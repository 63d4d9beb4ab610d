//! Test suite for picto-jpeg.
//!
//! The streams are built by a small writer in `writer.rs` from known
//! coefficients, so most expectations are exact.

#![allow(missing_docs)]



use picto_jpeg::{DecodeSettings, Image, PixelLayout, Result};

use writer::Frame;

/// A quantization table with a step of 8 everywhere, which makes the
/// sample of a DC-only block `128 + dc`.
const FLAT: [u8; 64] = [8; 64];

/// Quantization steps growing with frequency.
fn graded() -> [u8; 64] {
    std::array::from_fn(|i| 2 + (i / 4) as u8)
}

fn decode(data: &[u8]) -> Result<Image> {
    picto_jpeg::decode(data, &DecodeSettings::default())
}

/// Blocks that only carry the given DC coefficients, one per block in
/// raster order of each component.
fn dc_blocks(frame: &Frame, dc: &[&[i32]]) -> Vec<Vec<writer::Block>> {
    let mut blocks = frame.blocks();

    for (component, values) in blocks.iter_mut().zip(dc) {
        for (block, &value) in component.iter_mut().zip(values.iter()) {
            block[0] = value;
        }
    }

    blocks
}

fn assert_gray(image: &Image, width: u32, height: u32) {
    assert_eq!((image.width, image.height), (width, height));
    assert_eq!(image.layout, PixelLayout::Gray);
    assert_eq!(image.data.len(), (width * height) as usize);
}
