//! The resumable JBIG2 pipeline.
//!
//! JBIG2 decoding is driven as an explicit state machine: `start_decode`
//! stores the inputs and may yield to the pause indicator before any heavy
//! work, `continue_decode` finishes the page and blits it into the 1-bit
//! target. Decoded pages are cached in the document's codec context, keyed by
//! the source and globals object numbers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::{need_pause, Pause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Jbig2Status {
    Error,
    ToBeContinued,
    Done,
}

/// A decoded bi-level page. `true` is black.
pub(crate) struct Jbig2Page {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

/// The document-wide codec context.
#[derive(Default)]
pub(crate) struct CodecContext {
    pages: RefCell<HashMap<(u32, u32), Arc<Jbig2Page>>>,
}

impl CodecContext {
    fn get_or_decode(
        &self,
        src: &[u8],
        src_obj: u32,
        globals: Option<&[u8]>,
        globals_obj: u32,
    ) -> Option<Arc<Jbig2Page>> {
        let key = (src_obj, globals_obj);

        if src_obj != 0 {
            if let Some(page) = self.pages.borrow().get(&key) {
                return Some(page.clone());
            }
        }

        let image = hayro_jbig2::decode_embedded(src, globals).ok()?;
        let page = Arc::new(Jbig2Page {
            width: image.width,
            height: image.height,
            data: image.data,
        });

        if src_obj != 0 {
            self.pages.borrow_mut().insert(key, page.clone());
        }

        Some(page)
    }
}

/// The per-image decode state.
pub(crate) struct Jbig2Context {
    src: Arc<[u8]>,
    src_obj: u32,
    globals: Option<Arc<[u8]>>,
    globals_obj: u32,
}

impl Jbig2Context {
    pub(crate) fn new(
        src: Arc<[u8]>,
        src_obj: u32,
        globals: Option<Arc<[u8]>>,
        globals_obj: u32,
    ) -> Self {
        Self {
            src,
            src_obj,
            globals,
            globals_obj,
        }
    }

    /// Begin decoding into `out`. Yields before the page decode when the
    /// caller asked for a pause.
    pub(crate) fn start_decode(
        &mut self,
        codec: &CodecContext,
        out: &mut Bitmap,
        pause: Option<&dyn Pause>,
    ) -> Jbig2Status {
        if need_pause(pause) {
            return Jbig2Status::ToBeContinued;
        }

        self.decode_page(codec, out)
    }

    /// Continue a paused decode.
    pub(crate) fn continue_decode(
        &mut self,
        codec: &CodecContext,
        out: &mut Bitmap,
        pause: Option<&dyn Pause>,
    ) -> Jbig2Status {
        if need_pause(pause) {
            return Jbig2Status::ToBeContinued;
        }

        self.decode_page(codec, out)
    }

    fn decode_page(&mut self, codec: &CodecContext, out: &mut Bitmap) -> Jbig2Status {
        let Some(page) = codec.get_or_decode(
            &self.src,
            self.src_obj,
            self.globals.as_deref(),
            self.globals_obj,
        ) else {
            return Jbig2Status::Error;
        };

        blit_page(&page, out);

        Jbig2Status::Done
    }
}

/// Pack the page into a 1-bit bitmap. Black pixels become 0 bits, matching
/// the bi-level gray convention of the scanline renderer.
fn blit_page(page: &Jbig2Page, out: &mut Bitmap) {
    let width = out.width.min(page.width);

    for y in 0..out.height {
        let row = out.row_mut(y);
        row.fill(0xFF);

        if y >= page.height {
            continue;
        }

        let line = y as usize * page.width as usize;
        for x in 0..width as usize {
            if page.data.get(line + x).copied().unwrap_or(false) {
                row[x / 8] &= !(1 << (7 - x % 8));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_clears_black_bits() {
        let page = Jbig2Page {
            width: 4,
            height: 2,
            data: vec![true, false, true, false, false, false, false, true],
        };
        let mut out = Bitmap::new(4, 3, 1, 0).unwrap();

        blit_page(&page, &mut out);
        assert_eq!(out.row(0)[0], 0b0101_1111);
        assert_eq!(out.row(1)[0], 0b1110_1111);
        // Rows past the page stay white.
        assert_eq!(out.row(2)[0], 0xFF);
    }

    #[test]
    fn corrupt_stream_is_an_error() {
        let mut ctx = Jbig2Context::new(Arc::from(vec![0u8; 8]), 0, None, 0);
        let codec = CodecContext::default();
        let mut out = Bitmap::new(4, 4, 1, 0).unwrap();

        assert_eq!(
            ctx.start_decode(&codec, &mut out, None),
            Jbig2Status::Error
        );
    }

    struct AlwaysPause;

    impl Pause for AlwaysPause {
        fn need_to_pause_now(&self) -> bool {
            true
        }
    }

    #[test]
    fn pause_defers_the_decode() {
        let mut ctx = Jbig2Context::new(Arc::from(vec![0u8; 8]), 0, None, 0);
        let codec = CodecContext::default();
        let mut out = Bitmap::new(4, 4, 1, 0).unwrap();

        assert_eq!(
            ctx.start_decode(&codec, &mut out, Some(&AlwaysPause)),
            Jbig2Status::ToBeContinued
        );
        assert_eq!(
            ctx.continue_decode(&codec, &mut out, None),
            Jbig2Status::Error
        );
    }
}
