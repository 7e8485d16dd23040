//! The JPX (JPEG 2000) pipeline.
//!
//! JPX decodes in one shot into a cached bitmap. The PDF color space and the
//! codestream must be reconciled first: the codestream may disagree on the
//! component count, supply its own color space, or carry the soft mask inside
//! its alpha channel (`SMaskInData`).

use hayro_jpeg2000::DecodeSettings;
use log::warn;

use crate::bitmap::Bitmap;
use crate::color::{ColorSpace, Family};
use crate::error::{Error, Result};
use crate::params::{self, ColorInfo};

/// A soft mask harvested from the codestream's alpha channel.
#[derive(Debug, Clone)]
pub(crate) struct JpxInlineMask {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JpxDecodeAction {
    Fail,
    DoNothing,
    UseRgb,
    UseCmyk,
    ConvertArgbToRgb,
}

/// Reconcile the PDF color space with what the codestream reports.
pub(crate) fn decode_action(
    pdf_components: Option<u32>,
    pdf_is_device_rgb: bool,
    jpx_components: u32,
    jpx_is_rgb: bool,
) -> JpxDecodeAction {
    if let Some(n) = pdf_components {
        if jpx_components != n {
            // Some producers write a fourth (alpha) component while the
            // dictionary declares a three-component space.
            if n == 3 && jpx_components == 4 && jpx_is_rgb {
                return JpxDecodeAction::ConvertArgbToRgb;
            }

            return JpxDecodeAction::Fail;
        }

        if pdf_is_device_rgb {
            return JpxDecodeAction::UseRgb;
        }

        return JpxDecodeAction::DoNothing;
    }

    match jpx_components {
        3 => JpxDecodeAction::UseRgb,
        4 => JpxDecodeAction::UseCmyk,
        _ => JpxDecodeAction::DoNothing,
    }
}

/// Decode the codestream into a cached bitmap, updating `info` with the
/// negotiated color space, component count and bit depth.
pub(crate) fn load_jpx_bitmap(
    data: &[u8],
    declared_width: u32,
    declared_height: u32,
    info: &mut ColorInfo,
    smask_in_data: bool,
) -> Result<(Bitmap, Option<JpxInlineMask>)> {
    let settings = DecodeSettings {
        // For an indexed PDF space the palette indices are the samples.
        resolve_palette_indices: info.family != Family::Indexed,
        ..DecodeSettings::default()
    };

    let image = hayro_jpeg2000::decode(data, &settings).map_err(|_| Error::DecoderInit)?;

    let width = image.width;
    let height = image.height;
    if width < declared_width || height < declared_height {
        return Err(Error::DecoderInit);
    }

    let channels = image.color_space.num_channels() as u32;
    let jpx_components = channels + u32::from(image.has_alpha);
    let jpx_is_rgb = matches!(image.color_space, hayro_jpeg2000::ColorSpace::RGB);

    let action = decode_action(
        info.color_space.as_ref().map(|cs| cs.components()),
        info.color_space
            .as_ref()
            .map(|cs| cs.is_device_rgb())
            .unwrap_or(false),
        jpx_components,
        jpx_is_rgb,
    );

    let mut swap_rgb = false;
    let mut convert_argb = false;
    match action {
        JpxDecodeAction::Fail => return Err(Error::DecoderInit),
        JpxDecodeAction::DoNothing => {}
        JpxDecodeAction::UseRgb => {
            swap_rgb = true;
            info.color_space = None;
        }
        JpxDecodeAction::UseCmyk => {
            let cmyk = ColorSpace::stock(Family::DeviceCmyk);
            info.comp_data = params::default_comp_data(&cmyk, 8, 4);
            info.color_space = Some(cmyk);
        }
        JpxDecodeAction::ConvertArgbToRgb => {
            swap_rgb = true;
            convert_argb = true;
            info.color_space = None;
        }
    }

    if info.n_components == 0 {
        info.n_components = jpx_components;
    }

    let decoded = &image.data;
    let sample = |i: usize| decoded.get(i).copied().unwrap_or(0);

    let (bitmap, inline_mask) = if convert_argb {
        let mut bitmap = Bitmap::new(width, height, 24, 0xFF)?;
        let mut mask_data = if smask_in_data {
            Vec::with_capacity(width as usize * height as usize)
        } else {
            Vec::new()
        };

        for y in 0..height {
            let row = bitmap.row_mut(y);

            for x in 0..width {
                let src = (y * width + x) as usize * 4;
                let (r, g, b, a) = (sample(src), sample(src + 1), sample(src + 2), sample(src + 3));
                let px = &mut row[x as usize * 3..x as usize * 3 + 3];

                if smask_in_data {
                    mask_data.push(a);

                    // The color channels were composed against white.
                    let na = 255 - a as u32;
                    px[0] = ((b as u32 * a as u32 + 255 * na) / 255) as u8;
                    px[1] = ((g as u32 * a as u32 + 255 * na) / 255) as u8;
                    px[2] = ((r as u32 * a as u32 + 255 * na) / 255) as u8;
                } else {
                    px[0] = b;
                    px[1] = g;
                    px[2] = r;
                }
            }
        }

        let inline_mask = if smask_in_data {
            Some(JpxInlineMask {
                width,
                height,
                data: mask_data,
            })
        } else {
            None
        };

        (bitmap, inline_mask)
    } else if jpx_components >= 5 {
        // Non-standard component counts are repacked into a wider
        // three-channel bitmap.
        warn!("repacking JPX image with {jpx_components} components");

        let packed_width = (width * jpx_components + 2) / 3;
        let mut bitmap = Bitmap::new(packed_width, height, 24, 0xFF)?;

        for y in 0..height {
            let row = bitmap.row_mut(y);
            let row_samples = (width * jpx_components) as usize;
            let src = (y * width * jpx_components) as usize;

            for i in 0..row_samples {
                row[i] = sample(src + i);
            }
        }

        (bitmap, None)
    } else {
        let bpp = match jpx_components {
            1 => 8,
            2 | 3 => 24,
            _ => 32,
        };
        let mut bitmap = Bitmap::new(width, height, bpp, 0xFF)?;
        let shift = if info.family == Family::Indexed && info.bpc > 0 && info.bpc < 8 {
            8 - info.bpc
        } else {
            0
        };

        for y in 0..height {
            let row = bitmap.row_mut(y);
            let bytes_per_px = (bpp / 8) as usize;

            for x in 0..width {
                let src = (y * width + x) as usize * jpx_components as usize;
                let px = &mut row[x as usize * bytes_per_px..(x as usize + 1) * bytes_per_px];

                match jpx_components {
                    1 => px[0] = sample(src) >> shift,
                    3 if swap_rgb => {
                        px[0] = sample(src + 2);
                        px[1] = sample(src + 1);
                        px[2] = sample(src);
                    }
                    _ => {
                        for (i, slot) in px.iter_mut().take(jpx_components as usize).enumerate() {
                            *slot = sample(src + i);
                        }
                    }
                }
            }
        }

        (bitmap, None)
    };

    // Whatever the codestream carried, the cached bitmap now holds one byte
    // per channel.
    info.bpc = 8;

    Ok((bitmap, inline_mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_with_matching_colorspace() {
        assert_eq!(
            decode_action(Some(3), false, 3, true),
            JpxDecodeAction::DoNothing
        );
        assert_eq!(
            decode_action(Some(3), true, 3, true),
            JpxDecodeAction::UseRgb
        );
    }

    #[test]
    fn action_with_component_mismatch() {
        assert_eq!(
            decode_action(Some(3), false, 4, true),
            JpxDecodeAction::ConvertArgbToRgb
        );
        assert_eq!(decode_action(Some(3), false, 4, false), JpxDecodeAction::Fail);
        assert_eq!(decode_action(Some(4), false, 3, true), JpxDecodeAction::Fail);
        assert_eq!(decode_action(Some(1), false, 2, false), JpxDecodeAction::Fail);
    }

    #[test]
    fn action_without_colorspace() {
        assert_eq!(decode_action(None, false, 3, true), JpxDecodeAction::UseRgb);
        assert_eq!(decode_action(None, false, 4, false), JpxDecodeAction::UseCmyk);
        assert_eq!(
            decode_action(None, false, 1, false),
            JpxDecodeAction::DoNothing
        );
        assert_eq!(
            decode_action(None, false, 5, false),
            JpxDecodeAction::DoNothing
        );
    }
}
