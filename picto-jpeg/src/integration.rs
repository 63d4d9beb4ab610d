//! Integration with the [image] crate

use std::io::{self, Read};

use ::image::error::{DecodingError, ImageFormatHint};
use ::image::{ColorType, ExtendedColorType, ImageDecoder, ImageError, ImageFormat, ImageResult};

use crate::{ColorSpace, DecodeError, DecodeSettings, Image, PixelLayout};

/// A JPEG decoder for use with [`image`](::image).
///
/// The image is decoded when the decoder is created, so that the dimensions
/// and the ICC profile are available right away.
pub struct JpegDecoder {
    image: Image,
}

impl JpegDecoder {
    /// Create a new decoder that decodes from the stream `r`.
    pub fn new<R: Read>(r: R) -> ImageResult<Self> {
        Self::with_settings(r, &DecodeSettings::default())
    }

    /// Create a new decoder with custom settings.
    pub fn with_settings<R: Read>(r: R, settings: &DecodeSettings) -> ImageResult<Self> {
        Ok(Self {
            image: crate::decode(r, settings)?,
        })
    }

    fn copy_into(self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.image.data);
    }
}

impl ImageDecoder for JpegDecoder {
    fn dimensions(&self) -> (u32, u32) {
        (self.image.width, self.image.height)
    }

    fn color_type(&self) -> ColorType {
        match self.image.layout {
            PixelLayout::Gray => ColorType::L8,
            PixelLayout::Rgba => ColorType::Rgba8,
        }
    }

    fn original_color_type(&self) -> ExtendedColorType {
        match self.image.color_space {
            ColorSpace::Gray => ExtendedColorType::L8,
            ColorSpace::YCbCr | ColorSpace::Rgb => ExtendedColorType::Rgb8,
            ColorSpace::Cmyk | ColorSpace::Ycck => ExtendedColorType::Cmyk8,
        }
    }

    fn icc_profile(&mut self) -> ImageResult<Option<Vec<u8>>> {
        Ok(self.image.icc_profile.clone())
    }

    fn read_image(self, buf: &mut [u8]) -> ImageResult<()>
    where
        Self: Sized,
    {
        self.copy_into(buf);

        Ok(())
    }

    fn read_image_boxed(self: Box<Self>, buf: &mut [u8]) -> ImageResult<()> {
        self.copy_into(buf);

        Ok(())
    }
}

impl From<DecodeError> for ImageError {
    fn from(value: DecodeError) -> Self {
        match value {
            DecodeError::Io(kind) => Self::IoError(io::Error::from(kind)),
            _ => Self::Decoding(DecodingError::new(
                ImageFormatHint::Exact(ImageFormat::Jpeg),
                value,
            )),
        }
    }
}
