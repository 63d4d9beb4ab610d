/*!
A memory-safe, pure-Rust JPEG decoder.

`picto-jpeg` decodes baseline, extended sequential and progressive JPEG
images with Huffman coding and 8-bit samples, as specified in ITU T.81 (also
known as ISO/IEC 10918-1). Grayscale images decode to one byte per pixel,
everything else to RGBA.

The input is consumed sequentially from any [`Read`] source, so it does not
need to be loaded into memory up front.

# Example
```rust,no_run
use picto_jpeg::{DecodeSettings, decode};

let file = std::fs::File::open("image.jpg").unwrap();
let image = decode(std::io::BufReader::new(file), &DecodeSettings::default()).unwrap();

println!("{}x{} image ({:?})", image.width, image.height, image.color_space);
```

# Cargo features
- `simd` (default): vectorized inverse DCT through `fearless_simd`.
- `rayon` (default): color conversion in parallel over rows.
- `image` (default): an [`image`](https://docs.rs/image) decoder.
- `logging`: emit diagnostics through the `log` crate.

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]

#[macro_use]
mod log;

mod color;
mod decoder;
mod error;
mod huffman;
mod idct;
mod marker;
mod math;
mod reader;
mod scan;
mod segment;

#[cfg(feature = "image")]
pub mod integration;

use std::io::Read;

use decoder::Decoder;

pub use color::{ColorSpace, PixelLayout};
pub use error::{BitstreamError, DecodeError, FormatError, RestartError, Result};

/// Settings that apply to decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSettings {
    /// The largest number of pixels (`width * height`) a frame may have.
    /// Larger frames are rejected before any sample memory is allocated.
    pub max_pixels: u64,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            max_pixels: 1 << 28,
        }
    }
}

/// A decoded JPEG image.
#[derive(Debug, Clone)]
pub struct Image {
    /// The width of the image in pixels.
    pub width: u32,
    /// The height of the image in pixels.
    pub height: u32,
    /// The color model of the encoded samples.
    pub color_space: ColorSpace,
    /// The layout of `data`.
    pub layout: PixelLayout,
    /// The pixels in row-major order without any padding.
    pub data: Vec<u8>,
    /// The embedded ICC profile, if any.
    pub icc_profile: Option<Vec<u8>>,
}

/// Information from the header segments of a JPEG image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// The width of the image in pixels.
    pub width: u32,
    /// The height of the image in pixels.
    pub height: u32,
    /// The number of color components in the frame (1, 3 or 4).
    pub num_components: u8,
    /// Whether the frame uses progressive coding (SOF2).
    pub progressive: bool,
    /// The color model as far as the segments before the first scan tell.
    pub color_space: ColorSpace,
}

/// A receiver of decoded pixels.
pub trait PixelSink {
    /// Take ownership of the decoded image. `pixels` holds `width * height`
    /// pixels in the given layout.
    fn set_image(&mut self, width: u32, height: u32, layout: PixelLayout, pixels: Vec<u8>);
}

/// Decode a JPEG image from the given reader.
///
/// # Example
/// ```rust,no_run
/// let data = std::fs::read("image.jpg").unwrap();
/// let image = picto_jpeg::decode(&data[..], &Default::default()).unwrap();
/// println!("{}x{} image", image.width, image.height);
/// ```
pub fn decode<R: Read>(reader: R, settings: &DecodeSettings) -> Result<Image> {
    Decoder::new(reader, settings).decode()
}

/// Decode a JPEG image and hand the pixels to `sink`.
///
/// The sink is called exactly once if decoding succeeds and never otherwise.
pub fn decode_into<R: Read, S: PixelSink>(
    reader: R,
    settings: &DecodeSettings,
    sink: &mut S,
) -> Result<()> {
    let image = decode(reader, settings)?;
    sink.set_image(image.width, image.height, image.layout, image.data);

    Ok(())
}

/// Read the image dimensions and color model without decoding any scan.
pub fn read_info<R: Read>(reader: R) -> Result<ImageInfo> {
    Decoder::new(reader, &DecodeSettings::default()).read_info()
}
