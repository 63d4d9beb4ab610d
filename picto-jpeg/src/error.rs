//! Error types for JPEG decoding.

use core::fmt;
use std::io;

/// The main error type for JPEG decoding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Errors related to the marker structure and segment contents.
    Format(FormatError),
    /// Errors inside entropy-coded data.
    Bitstream(BitstreamError),
    /// An expected restart marker was absent or out of sequence.
    Restart(RestartError),
    /// The input ended before the end-of-image marker.
    Truncated,
    /// The underlying reader failed.
    Io(io::ErrorKind),
}

/// Errors related to the marker structure and segment contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The stream does not start with an SOI marker.
    MissingSoi,
    /// More than one SOF marker was found.
    DuplicateSof,
    /// A scan or the end of the image was reached without a frame header.
    MissingSof,
    /// The image ended without any scan.
    MissingSos,
    /// A segment's declared length does not match its contents.
    SegmentLength(&'static str),
    /// Sample precision other than 8 bits.
    UnsupportedPrecision(u8),
    /// Component count other than 1, 3 or 4.
    UnsupportedComponentCount,
    /// Two frame components share an identifier.
    RepeatedComponentId,
    /// A sampling factor outside of 1, 2 and 4.
    InvalidSamplingFactor,
    /// A valid but unsupported combination of sampling factors.
    UnsupportedSubsampling,
    /// The sum of `h * v` over the components of an MCU exceeds 10.
    SamplingTooLarge,
    /// A frame with a zero width or height.
    InvalidDimensions,
    /// A frame above the configured pixel limit.
    ImageTooLarge,
    /// A quantization table with an invalid precision or destination.
    InvalidQuantizationTable,
    /// A Huffman table with an invalid class or destination.
    InvalidHuffmanTable,
    /// A Huffman table without any code.
    EmptyHuffmanTable,
    /// A Huffman table whose code counts cannot form a prefix code.
    OversubscribedHuffmanTable,
    /// A scan references a Huffman table that was never defined.
    MissingHuffmanTable,
    /// A component references a quantization table that was never defined.
    MissingQuantizationTable,
    /// A scan component selector that does not match any frame component.
    UnknownComponentSelector,
    /// A scan component selector that occurs twice.
    RepeatedComponentSelector,
    /// Invalid spectral selection bounds.
    InvalidSpectralSelection,
    /// Invalid successive approximation bit positions.
    InvalidSuccessiveApproximation,
    /// A marker code that is not assigned by ITU T.81.
    UnknownMarker(u8),
    /// A marker for a coding process that is not supported.
    UnsupportedMarker(u8),
}

/// Errors inside entropy-coded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitstreamError {
    /// A `0xFF` byte that is not followed by a stuffed `0x00`.
    MissingStuffing,
    /// No code of up to 16 bits matched the Huffman table.
    BadHuffmanCode,
    /// A DC magnitude category above 16.
    ExcessiveDcComponent,
    /// A refinement symbol whose size is neither 0 nor 1.
    UnexpectedRefinementCode,
    /// A refinement scan placed a coefficient past the end of its band.
    TooManyCoefficients,
}

/// An expected restart marker was absent or out of sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartError {
    /// The restart marker that should have followed the interval.
    pub expected: u8,
    /// The two bytes that were found instead.
    pub found: [u8; 2],
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "{e}"),
            Self::Bitstream(e) => write!(f, "{e}"),
            Self::Restart(e) => write!(f, "{e}"),
            Self::Truncated => write!(f, "unexpected end of data"),
            Self::Io(kind) => write!(f, "read error: {kind}"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSoi => write!(f, "missing SOI marker"),
            Self::DuplicateSof => write!(f, "multiple SOF markers"),
            Self::MissingSof => write!(f, "missing SOF marker"),
            Self::MissingSos => write!(f, "missing SOS marker"),
            Self::SegmentLength(marker) => write!(f, "{marker} segment has wrong length"),
            Self::UnsupportedPrecision(p) => write!(f, "unsupported sample precision {p}"),
            Self::UnsupportedComponentCount => write!(f, "unsupported number of components"),
            Self::RepeatedComponentId => write!(f, "repeated component identifier"),
            Self::InvalidSamplingFactor => write!(f, "invalid sampling factor"),
            Self::UnsupportedSubsampling => write!(f, "unsupported subsampling ratio"),
            Self::SamplingTooLarge => write!(f, "total sampling factors too large"),
            Self::InvalidDimensions => write!(f, "invalid image dimensions"),
            Self::ImageTooLarge => write!(f, "image is too large"),
            Self::InvalidQuantizationTable => write!(f, "invalid quantization table"),
            Self::InvalidHuffmanTable => write!(f, "invalid Huffman table"),
            Self::EmptyHuffmanTable => write!(f, "Huffman table has zero length"),
            Self::OversubscribedHuffmanTable => write!(f, "Huffman table is oversubscribed"),
            Self::MissingHuffmanTable => write!(f, "missing Huffman table"),
            Self::MissingQuantizationTable => write!(f, "missing quantization table"),
            Self::UnknownComponentSelector => write!(f, "unknown component selector"),
            Self::RepeatedComponentSelector => write!(f, "repeated component selector"),
            Self::InvalidSpectralSelection => write!(f, "bad spectral selection bounds"),
            Self::InvalidSuccessiveApproximation => {
                write!(f, "bad successive approximation values")
            }
            Self::UnknownMarker(m) => write!(f, "unknown marker 0x{m:02X}"),
            Self::UnsupportedMarker(m) => write!(f, "unsupported marker 0x{m:02X}"),
        }
    }
}

impl fmt::Display for BitstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStuffing => write!(f, "missing 0xFF00 sequence"),
            Self::BadHuffmanCode => write!(f, "bad Huffman code"),
            Self::ExcessiveDcComponent => write!(f, "excessive DC component"),
            Self::UnexpectedRefinementCode => write!(f, "unexpected Huffman code"),
            Self::TooManyCoefficients => write!(f, "too many coefficients"),
        }
    }
}

impl fmt::Display for RestartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected RST{} marker, found 0x{:02X}{:02X}",
            self.expected & 7,
            self.found[0],
            self.found[1]
        )
    }
}

impl std::error::Error for DecodeError {}
impl std::error::Error for FormatError {}
impl std::error::Error for BitstreamError {}
impl std::error::Error for RestartError {}

impl From<FormatError> for DecodeError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<BitstreamError> for DecodeError {
    fn from(e: BitstreamError) -> Self {
        Self::Bitstream(e)
    }
}

impl From<RestartError> for DecodeError {
    fn from(e: RestartError) -> Self {
        Self::Restart(e)
    }
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Self::Truncated,
            kind => Self::Io(kind),
        }
    }
}

/// Result type for JPEG decoding operations.
pub type Result<T> = core::result::Result<T, DecodeError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

macro_rules! err {
    ($err:expr) => {
        Err($err.into())
    };
}

pub(crate) use bail;
pub(crate) use err;
