//! Error types for image decoding.

use core::fmt;

/// The reasons an image decode can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Width or height is zero or exceeds the maximum image dimension.
    BadDimensions,
    /// `BitsPerComponent` is outside the allowed set and no filter override applies.
    BadBitsPerComponent,
    /// The color space could not be resolved, or its component count is
    /// inconsistent with the stream.
    BadColorSpace,
    /// A pitch or total-size computation overflowed 32 bits.
    ArithmeticOverflow,
    /// The terminal codec refused the stream.
    DecoderInit,
    /// The codec reported an error while decoding.
    DecoderCorrupt,
    /// The raw buffer is shorter than the declared image needs.
    ShortRead,
    /// The recursive mask sub-decoder failed.
    MaskRecursionFail,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadDimensions => write!(f, "image dimensions out of bounds"),
            Self::BadBitsPerComponent => write!(f, "invalid bits per component"),
            Self::BadColorSpace => write!(f, "unresolved or inconsistent color space"),
            Self::ArithmeticOverflow => write!(f, "arithmetic overflow in size calculation"),
            Self::DecoderInit => write!(f, "failed to initialize stream decoder"),
            Self::DecoderCorrupt => write!(f, "stream decoder reported corrupt data"),
            Self::ShortRead => write!(f, "stream data shorter than expected"),
            Self::MaskRecursionFail => write!(f, "mask sub-decoder failed"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for image decoding operations.
pub type Result<T> = core::result::Result<T, Error>;
