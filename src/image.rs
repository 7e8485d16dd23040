//! The image decoder driver.
//!
//! [`ImageDecoder`] sequences the whole pipeline: dictionary interpretation,
//! stream defiltering, terminal codec construction, palette precomputation
//! and mask loading. Decoding is a turn-based state machine: `start` either
//! finishes outright or returns [`LoadState::Continue`], after which
//! [`continue_decode`](ImageDecoder::continue_decode) is polled until a
//! terminal state is reached.

use std::sync::Arc;

use log::warn;

use crate::bitmap::Bitmap;
use crate::codec::{ccitt, dct, flate, run_length, ScanlineDecoder};
use crate::color::{components_for_family, is_valid_icc_components, Family};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::filter;
use crate::jbig2::{Jbig2Context, Jbig2Status};
use crate::jpx::{self, JpxInlineMask};
use crate::object::keys::*;
use crate::object::{Dict, Name, Stream};
use crate::palette::build_palette;
use crate::params::{self, ColorInfo};
use crate::pitch;
use crate::Pause;

/// The result of driving the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Canonical output is available.
    Success,
    /// The caller must invoke `continue_decode` again.
    Continue,
    /// Terminal; the decoder is unusable and its buffers are released.
    Fail,
}

/// The pixel format of the canonical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 1 bit per pixel: a stencil mask or a bi-level image (a palette may
    /// supply its two colors).
    Mask1,
    /// 8 bits per pixel, grayscale or palette-indexed.
    Gray8,
    /// 24 bits per pixel, stored B, G, R.
    Bgr24,
    /// 32 bits per pixel, stored B, G, R, A. Produced by color-key masks.
    Bgra32,
}

impl PixelFormat {
    pub(crate) fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Mask1 => 1,
            PixelFormat::Gray8 => 8,
            PixelFormat::Bgr24 => 24,
            PixelFormat::Bgra32 => 32,
        }
    }
}

/// Which continuation `continue_decode` has to drive next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    None,
    Jbig2,
    Mask,
}

/// A decoder for one PDF image stream.
pub struct ImageDecoder<'a> {
    pub(crate) document: &'a Document,
    pub(crate) dict: Dict,
    stream: Stream,
    pub(crate) stream_data: Arc<[u8]>,
    terminal_filter: Option<Name>,
    filter_params: Dict,
    pub(crate) info: ColorInfo,
    pub(crate) width: u32,
    pub(crate) height: u32,
    format: PixelFormat,
    pub(crate) pitch: u32,
    pub(crate) line_buf: Vec<u8>,
    pub(crate) masked_line: Vec<u8>,
    pub(crate) palette: Option<Vec<u32>>,
    pub(crate) decoder: Option<Box<dyn ScanlineDecoder>>,
    pub(crate) cached_bitmap: Option<Bitmap>,
    jbig2: Option<Jbig2Context>,
    pub(crate) jpx_inline_mask: Option<JpxInlineMask>,
    pub(crate) mask: Option<Box<ImageDecoder<'a>>>,
    pub(crate) matte_color: u32,
    pub(crate) pending: Pending,
    pub(crate) failed: bool,
    pub(crate) error: Option<Error>,
    std_cs: bool,
    group_family: Family,
    load_mask: bool,
    has_mask: bool,
}

impl<'a> ImageDecoder<'a> {
    fn new_empty(document: &'a Document, stream: &Stream) -> Self {
        Self {
            document,
            dict: stream.dict().clone(),
            stream: stream.clone(),
            stream_data: Arc::from(Vec::new()),
            terminal_filter: None,
            filter_params: Dict::empty(),
            info: ColorInfo::unloaded(),
            width: 0,
            height: 0,
            format: PixelFormat::Gray8,
            pitch: 0,
            line_buf: Vec::new(),
            masked_line: Vec::new(),
            palette: None,
            decoder: None,
            cached_bitmap: None,
            jbig2: None,
            jpx_inline_mask: None,
            mask: None,
            matte_color: 0xFFFF_FFFF,
            pending: Pending::None,
            failed: false,
            error: None,
            std_cs: false,
            group_family: Family::Unknown,
            load_mask: false,
            has_mask: false,
        }
    }

    /// Begin decoding an image stream.
    ///
    /// `has_mask` requests loading of an associated `SMask`/`Mask` stream;
    /// `std_cs` switches the color space into standard-conversion mode for
    /// the duration of the decode; `group_family` and `load_mask` control the
    /// transparency-mask derivation for CMYK groups. On
    /// [`LoadState::Continue`], poll [`continue_decode`](Self::continue_decode).
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        document: &'a Document,
        stream: &Stream,
        has_mask: bool,
        form_resources: Option<&Dict>,
        page_resources: Option<&Dict>,
        std_cs: bool,
        group_family: Family,
        load_mask: bool,
    ) -> (Self, LoadState) {
        let mut decoder = Self::new_empty(document, stream);
        decoder.has_mask = has_mask;
        decoder.std_cs = std_cs;
        decoder.group_family = group_family;
        decoder.load_mask = load_mask;

        let state = match decoder.start_inner(form_resources, page_resources) {
            Ok(state) => state,
            Err(error) => {
                decoder.fail(error);

                LoadState::Fail
            }
        };

        (decoder, state)
    }

    /// Decode an image stream without progressive driving or mask loading.
    pub fn load(document: &'a Document, stream: &Stream) -> Option<ImageDecoder<'a>> {
        let (mut decoder, mut state) = Self::start(
            document,
            stream,
            false,
            None,
            None,
            false,
            Family::Unknown,
            false,
        );

        while state == LoadState::Continue {
            state = decoder.continue_decode(None);
        }

        (state == LoadState::Success).then_some(decoder)
    }

    fn start_inner(
        &mut self,
        form_resources: Option<&Dict>,
        page_resources: Option<&Dict>,
    ) -> Result<LoadState> {
        let width = self.dict.get::<i64>(WIDTH).unwrap_or(0);
        let height = self.dict.get::<i64>(HEIGHT).unwrap_or(0);
        if !params::is_valid_dimension(width) || !params::is_valid_dimension(height) {
            return Err(Error::BadDimensions);
        }
        self.width = width as u32;
        self.height = height as u32;

        let chain = filter::decoder_chain(&self.dict)?;
        let terminal_name = filter::terminal_entry(&chain).map(|(name, _)| name.clone());

        self.info = params::load_color_info(
            &self.dict,
            terminal_name.as_ref(),
            if self.stream.is_inline() {
                form_resources
            } else {
                None
            },
            page_resources,
        )?;

        if self.info.bpc_check && (self.info.bpc == 0 || self.info.n_components == 0) {
            return Err(Error::BadBitsPerComponent);
        }

        // The whole source must fit in 32 bits before anything is loaded.
        let src_row = pitch::bytes_per_row(self.info.bpc, self.info.n_components, self.width)
            .ok_or(Error::ArithmeticOverflow)?;
        (src_row as u64)
            .checked_mul(self.height as u64)
            .filter(|size| u32::try_from(*size).is_ok())
            .ok_or(Error::ArithmeticOverflow)?;

        let (data, terminal, filter_params) = self.stream.image_data()?;
        if data.is_empty() {
            return Err(Error::ShortRead);
        }
        self.stream_data = data;
        self.terminal_filter = terminal;
        self.filter_params = filter_params;

        let created = self.create_decoder()?;

        self.prepare_output()?;

        let mask_state = if self.has_mask {
            self.start_load_mask()
        } else {
            LoadState::Success
        };

        if created == LoadState::Continue || mask_state == LoadState::Continue {
            return Ok(LoadState::Continue);
        }

        self.disable_std_conversion();

        Ok(LoadState::Success)
    }

    /// Continue a paused decode (a JBIG2 image or a progressive mask load).
    pub fn continue_decode(&mut self, pause: Option<&dyn Pause>) -> LoadState {
        if self.failed {
            return LoadState::Fail;
        }

        if self.pending == Pending::Mask {
            return self.continue_load_mask(pause);
        }

        match self.terminal_filter.as_ref().map(|f| f.as_str()) {
            Some("JPXDecode") => LoadState::Fail,
            Some("JBIG2Decode") => self.continue_jbig2(pause),
            _ => LoadState::Success,
        }
    }

    fn continue_jbig2(&mut self, pause: Option<&dyn Pause>) -> LoadState {
        if self.pending != Pending::Jbig2 {
            return LoadState::Success;
        }

        let first_call = self.jbig2.is_none();
        if first_call {
            let (globals, globals_obj) = match self.filter_params.get::<Stream>(JBIG2_GLOBALS) {
                Some(globals_stream) => match globals_stream.decoded() {
                    Ok(decoded) => (Some(Arc::from(decoded)), globals_stream.obj_num()),
                    Err(_) => {
                        warn!("failed to decode JBIG2 globals stream");

                        (None, 0)
                    }
                },
                None => (None, 0),
            };

            self.jbig2 = Some(Jbig2Context::new(
                self.stream_data.clone(),
                self.stream.obj_num(),
                globals,
                globals_obj,
            ));
        }

        let status = match (self.jbig2.as_mut(), self.cached_bitmap.as_mut()) {
            (Some(context), Some(out)) => {
                if first_call {
                    context.start_decode(self.document.codec_context(), out, pause)
                } else {
                    context.continue_decode(self.document.codec_context(), out, pause)
                }
            }
            _ => Jbig2Status::Error,
        };

        match status {
            Jbig2Status::Error => {
                self.jbig2 = None;
                self.cached_bitmap = None;
                self.fail(Error::DecoderCorrupt);

                LoadState::Fail
            }
            Jbig2Status::ToBeContinued => LoadState::Continue,
            Jbig2Status::Done => {
                self.pending = Pending::None;

                if self.has_mask && self.continue_load_mask(pause) == LoadState::Continue {
                    self.pending = Pending::Mask;

                    return LoadState::Continue;
                }

                self.disable_std_conversion();

                LoadState::Success
            }
        }
    }

    fn create_decoder(&mut self) -> Result<LoadState> {
        let Some(name) = self.terminal_filter.clone() else {
            // The raw bytes already are the pixel buffer.
            return Ok(LoadState::Success);
        };

        if self.info.bpc_check && self.info.bpc == 0 {
            return Err(Error::BadBitsPerComponent);
        }

        match name.as_str() {
            "JPXDecode" => {
                let smask_in_data = self.dict.get::<i64>(SMASK_IN_DATA).unwrap_or(0) == 1;
                let (bitmap, inline_mask) = jpx::load_jpx_bitmap(
                    &self.stream_data,
                    self.width,
                    self.height,
                    &mut self.info,
                    smask_in_data,
                )?;

                self.cached_bitmap = Some(bitmap);
                self.jpx_inline_mask = inline_mask;

                return Ok(LoadState::Success);
            }
            "JBIG2Decode" => {
                self.cached_bitmap = Some(Bitmap::new(self.width, self.height, 1, 0)?);
                self.pending = Pending::Jbig2;

                return Ok(LoadState::Continue);
            }
            "CCITTFaxDecode" => {
                let decoder = ccitt::create(&self.stream_data, self.height, &self.filter_params)?;
                self.decoder = Some(Box::new(decoder));
            }
            "FlateDecode" => {
                let decoder = flate::create(
                    &self.stream_data,
                    self.width,
                    self.height,
                    self.info.n_components,
                    self.info.bpc,
                    &self.filter_params,
                )?;
                self.decoder = Some(Box::new(decoder));
            }
            "RunLengthDecode" => {
                let decoder = run_length::create(
                    &self.stream_data,
                    self.width,
                    self.height,
                    self.info.n_components,
                    self.info.bpc,
                )?;
                self.decoder = Some(Box::new(decoder));
            }
            "DCTDecode" => self.create_dct_decoder()?,
            _ => return Err(Error::DecoderInit),
        }

        let Some(decoder) = self.decoder.as_ref() else {
            return Err(Error::DecoderInit);
        };

        // The codec may over-pad rows, never under-pad them.
        let requested = pitch::bytes_per_row(self.info.bpc, self.info.n_components, self.width)
            .ok_or(Error::ArithmeticOverflow)?;
        let provided = pitch::bytes_per_row(decoder.bpc(), decoder.components(), decoder.width())
            .ok_or(Error::ArithmeticOverflow)?;
        if provided < requested {
            return Err(Error::DecoderInit);
        }

        Ok(LoadState::Success)
    }

    fn create_dct_decoder(&mut self) -> Result<()> {
        let color_transform = self.filter_params.get::<i64>(COLOR_TRANSFORM).unwrap_or(1) != 0;

        if let Some(decoder) =
            dct::create(&self.stream_data, self.info.n_components, color_transform)
        {
            self.decoder = Some(Box::new(decoder));

            return Ok(());
        }

        // The stream disagrees with the dictionary; re-read the header and
        // adopt its geometry.
        let header = dct::load_info(&self.stream_data).ok_or(Error::DecoderInit)?;
        self.width = header.width;
        self.height = header.height;

        if !dct::is_valid_jpeg_component_count(header.num_components)
            || !dct::is_valid_jpeg_bpc(header.bits_per_component)
        {
            return Err(Error::DecoderInit);
        }

        if self.info.n_components == header.num_components {
            self.info.bpc = header.bits_per_component;
            let decoder =
                dct::create(&self.stream_data, self.info.n_components, header.color_transform)
                    .ok_or(Error::DecoderInit)?;
            self.decoder = Some(Box::new(decoder));

            return Ok(());
        }

        self.info.n_components = header.num_components;
        self.info.comp_data.clear();

        if let Some(color_space) = &self.info.color_space {
            let cs_components = color_space.components();

            match self.info.family {
                Family::DeviceGray | Family::DeviceRgb | Family::DeviceCmyk => {
                    let min_components = components_for_family(self.info.family);
                    if cs_components < min_components || self.info.n_components < min_components {
                        return Err(Error::BadColorSpace);
                    }
                }
                Family::Lab => {
                    if self.info.n_components != 3 || cs_components < 3 {
                        return Err(Error::BadColorSpace);
                    }
                }
                Family::IccBased => {
                    if !is_valid_icc_components(cs_components)
                        || !is_valid_icc_components(self.info.n_components)
                        || cs_components < self.info.n_components
                    {
                        return Err(Error::BadColorSpace);
                    }
                }
                _ => {
                    if cs_components != self.info.n_components {
                        return Err(Error::BadColorSpace);
                    }
                }
            }
        } else if self.info.family == Family::Lab && self.info.n_components != 3 {
            return Err(Error::BadColorSpace);
        }

        params::decode_and_mask(&mut self.info, &self.dict)?;

        self.info.bpc = header.bits_per_component;
        let decoder = dct::create(&self.stream_data, self.info.n_components, header.color_transform)
            .ok_or(Error::DecoderInit)?;
        self.decoder = Some(Box::new(decoder));

        Ok(())
    }

    fn prepare_output(&mut self) -> Result<()> {
        if self.info.image_mask {
            self.info.bpc = 1;
            self.info.n_components = 1;
            self.format = PixelFormat::Mask1;
        } else {
            if self.info.bpc == 0 || self.info.n_components == 0 {
                return Err(Error::BadBitsPerComponent);
            }

            let bits = self.info.bpc.saturating_mul(self.info.n_components);
            self.format = if bits == 1 {
                PixelFormat::Mask1
            } else if bits <= 8 {
                PixelFormat::Gray8
            } else {
                PixelFormat::Bgr24
            };
        }

        let pitch = pitch::bytes_per_row_32aligned(self.format.bits_per_pixel(), self.width)
            .ok_or(Error::ArithmeticOverflow)?;
        self.line_buf = vec![0; pitch as usize];
        self.pitch = pitch;

        if let Some(color_space) = &self.info.color_space {
            if self.std_cs {
                color_space.set_std_conversion(true);
            }
        }

        self.palette = build_palette(&self.info);

        if self.info.color_key {
            self.format = PixelFormat::Bgra32;
            let pitch = pitch::bytes_per_row_32aligned(32, self.width)
                .ok_or(Error::ArithmeticOverflow)?;
            self.masked_line = vec![0; pitch as usize];
            self.pitch = pitch;
        }

        Ok(())
    }

    pub(crate) fn disable_std_conversion(&mut self) {
        if let Some(color_space) = &self.info.color_space {
            if self.std_cs {
                color_space.set_std_conversion(false);
            }
        }
    }

    pub(crate) fn fail(&mut self, error: Error) {
        self.failed = true;
        self.error = Some(error);
        self.pending = Pending::None;
        self.decoder = None;
        self.cached_bitmap = None;
        self.jbig2 = None;
        self.palette = None;
        self.mask = None;
        self.line_buf = Vec::new();
        self.masked_line = Vec::new();
        self.stream_data = Arc::from(Vec::new());
    }

    /// Whether the group transparency derivation applies to this image.
    pub(crate) fn trans_mask(&self) -> bool {
        self.load_mask
            && self.group_family == Family::DeviceCmyk
            && self.info.family == Family::DeviceCmyk
    }

    /// The image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The canonical output format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The length in bytes of every scanline.
    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    /// The precomputed ARGB palette, if the image has one.
    pub fn palette(&self) -> Option<&[u32]> {
        if self.failed {
            return None;
        }

        self.palette.as_deref()
    }

    /// The fully cached bitmap, present only for JPX and JBIG2 images.
    pub fn buffer(&self) -> Option<&[u8]> {
        if self.failed {
            return None;
        }

        self.cached_bitmap.as_ref().map(|b| b.data.as_slice())
    }

    /// Whether the image is JBIG2 encoded.
    pub fn is_jbig_image(&self) -> bool {
        self.terminal_filter
            .as_ref()
            .map(|f| f.as_str() == "JBIG2Decode")
            .unwrap_or(false)
    }

    /// The matte color of the soft mask, or `0xFFFFFFFF` when none applies.
    /// An alpha byte of 0 marks a real matte.
    pub fn matte_color(&self) -> u32 {
        self.matte_color
    }

    /// Transfer ownership of the mask sub-decoder out of this image.
    pub fn detach_mask(&mut self) -> Option<Box<ImageDecoder<'a>>> {
        self.mask.take()
    }

    /// The error the decoder recorded, if any. Every kind is terminal except
    /// [`Error::MaskRecursionFail`], which only means the mask was dropped.
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// Advance a lazy codec towards `line`. Returns `true` when the codec
    /// paused and the caller must call again.
    pub fn skip_to_scanline(&mut self, line: u32, pause: Option<&dyn Pause>) -> bool {
        self.decoder
            .as_mut()
            .map(|decoder| decoder.skip_to_scanline(line, pause))
            .unwrap_or(false)
    }
}
