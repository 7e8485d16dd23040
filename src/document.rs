//! The document handle shared by all decoders of one PDF.

use crate::jbig2::CodecContext;

/// Document-wide state the image decoders share.
///
/// The document owns the codec context (decoded JBIG2 pages are cached there,
/// keyed by object numbers) and must outlive every decoder created from it.
#[derive(Default)]
pub struct Document {
    codec: CodecContext,
}

impl Document {
    /// Create a new document handle.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn codec_context(&self) -> &CodecContext {
        &self.codec
    }
}
