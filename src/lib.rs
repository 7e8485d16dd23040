/*!
A decoder for PDF image streams.

`pdf-raster` turns a raw encoded PDF image object (an image XObject or an
inline image) into device-independent raster scanlines in a canonical
BGR-ordered form, together with any companion soft mask or stencil mask.

The crate composes the pieces an image dictionary can ask for:

- interpretation of the dictionary itself (bit depth, decode arrays, color
  spaces, color-key masks, indexed palettes);
- the terminal stream codecs (CCITT fax, Flate, RunLength, DCT/JPEG,
  JPX/JPEG 2000, JBIG2), with JBIG2 running as a resumable decoder that can
  yield to a caller-supplied pause indicator;
- bit-exact unpacking of packed sample rows at 1, 2, 4, 8 or 16 bits per
  component;
- per-pixel conversion into sRGB with optional transparency-key alpha;
- recursive loading of an associated soft mask, which is itself a full PDF
  image decoded through the same pipeline.

The entry point is [`ImageDecoder`]. Input is attacker-controlled by nature;
malformed streams fail with an error state instead of panicking.

# Example
```no_run
use pdf_raster::{Dict, Document, ImageDecoder, Object, Stream};

let document = Document::new();
let dict = Dict::from_entries([
    ("Width", Object::from(2)),
    ("Height", Object::from(1)),
    ("BitsPerComponent", Object::from(8)),
    ("ColorSpace", Object::name("DeviceRGB")),
]);
let stream = Stream::new(dict, vec![10, 20, 30, 40, 50, 60]);

let mut image = ImageDecoder::load(&document, &stream).unwrap();
let row = image.scanline(0).unwrap();
println!("first pixel (B, G, R): {:?}", &row[..3]);
```

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]

pub mod bit;
mod bitmap;
mod codec;
pub mod color;
mod document;
mod error;
mod filter;
mod image;
mod jbig2;
mod jpx;
mod mask;
mod object;
mod palette;
mod params;
pub mod pitch;
mod scanline;

pub use color::{ColorSpace, Family};
pub use document::Document;
pub use error::{Error, Result};
pub use image::{ImageDecoder, LoadState, PixelFormat};
pub use object::{keys, Array, Dict, FromObject, Name, Object, Stream};

/// A caller-supplied pause indicator.
///
/// Resumable codecs consult it periodically; when it reports `true`, the
/// decoder returns [`LoadState::Continue`] and can be resumed later with
/// [`ImageDecoder::continue_decode`].
pub trait Pause {
    /// Whether the decoder should yield control back to the caller now.
    fn need_to_pause_now(&self) -> bool;
}

pub(crate) fn need_pause(pause: Option<&dyn Pause>) -> bool {
    pause.map(|p| p.need_to_pause_now()).unwrap_or(false)
}
