//! Loading of the companion soft mask or stencil mask.
//!
//! A mask is itself a complete PDF image, decoded recursively through a
//! sub-decoder. Mask loading is best-effort: when the sub-decoder fails, the
//! mask is dropped and the primary image still succeeds.

use log::warn;

use crate::color::Family;
use crate::error::Error;
use crate::image::{ImageDecoder, LoadState, Pending};
use crate::object::keys::*;
use crate::object::{Array, Dict, Object, Stream};
use crate::palette::argb;
use crate::Pause;

impl<'a> ImageDecoder<'a> {
    /// Kick off loading of the mask associated with this image, if any.
    pub(crate) fn start_load_mask(&mut self) -> LoadState {
        self.matte_color = 0xFFFF_FFFF;

        // A soft mask extracted from the codestream's alpha channel becomes
        // a synthesized grayscale image.
        if let Some(inline) = self.jpx_inline_mask.take() {
            let dict = Dict::from_entries([
                (TYPE, Object::name("XObject")),
                (SUBTYPE, Object::name("Image")),
                (COLORSPACE, Object::name("DeviceGray")),
                (BITS_PER_COMPONENT, Object::from(8)),
                (WIDTH, Object::from(inline.width as i64)),
                (HEIGHT, Object::from(inline.height as i64)),
            ]);

            return self.start_load_mask_dib(Stream::new(dict, inline.data));
        }

        if let Some(smask) = self.dict.get::<Stream>(SMASK) {
            self.load_matte_color(&smask);

            return self.start_load_mask_dib(smask);
        }

        match self.dict.get::<Stream>(MASK) {
            Some(mask) => self.start_load_mask_dib(mask),
            None => LoadState::Success,
        }
    }

    /// The matte color records what the masked pixels were premultiplied
    /// against; its zero alpha byte marks it as present.
    fn load_matte_color(&mut self, smask: &Stream) {
        let Some(matte) = smask.dict().get::<Array>(MATTE) else {
            return;
        };
        let Some(color_space) = &self.info.color_space else {
            return;
        };

        if self.info.family == Family::Pattern
            || matte.len() != self.info.n_components as usize
            || color_space.components() > self.info.n_components
        {
            return;
        }

        let colors: Vec<f32> = (0..self.info.n_components as usize)
            .map(|i| matte.get::<f32>(i).unwrap_or(0.0))
            .collect();

        self.matte_color = argb(0, color_space.to_rgb(&colors));
    }

    fn start_load_mask_dib(&mut self, stream: Stream) -> LoadState {
        let (mask, state) = ImageDecoder::start(
            self.document,
            &stream,
            false,
            None,
            None,
            true,
            Family::Unknown,
            false,
        );

        match state {
            LoadState::Continue => {
                self.mask = Some(Box::new(mask));
                if self.pending == Pending::None {
                    self.pending = Pending::Mask;
                }

                LoadState::Continue
            }
            // Best effort: a failed mask never demotes the image.
            LoadState::Fail => {
                warn!("dropping mask that failed to decode");
                self.error = Some(Error::MaskRecursionFail);

                LoadState::Success
            }
            LoadState::Success => {
                self.mask = Some(Box::new(mask));

                LoadState::Success
            }
        }
    }

    /// Drive a progressive mask load one step further.
    pub(crate) fn continue_load_mask(&mut self, pause: Option<&dyn Pause>) -> LoadState {
        let Some(mask) = self.mask.as_mut() else {
            self.disable_std_conversion();
            self.pending = Pending::None;

            return LoadState::Success;
        };

        match mask.continue_decode(pause) {
            LoadState::Continue => LoadState::Continue,
            state => {
                self.disable_std_conversion();
                self.pending = Pending::None;

                if state == LoadState::Fail {
                    warn!("dropping mask that failed to decode");
                    self.error = Some(Error::MaskRecursionFail);
                    self.mask = None;
                }

                LoadState::Success
            }
        }
    }
}
