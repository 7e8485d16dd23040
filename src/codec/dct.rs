//! DCTDecode (JPEG) as a terminal image filter.

use log::warn;
use zune_jpeg::zune_core::colorspace::ColorSpace;
use zune_jpeg::zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

use super::BufferDecoder;

/// The facts the factory needs from a JPEG header to re-negotiate image
/// parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JpegInfo {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) num_components: u32,
    pub(crate) bits_per_component: u32,
    pub(crate) color_transform: bool,
}

pub(crate) fn is_valid_jpeg_component_count(n: u32) -> bool {
    matches!(n, 1 | 3 | 4)
}

pub(crate) fn is_valid_jpeg_bpc(bpc: u32) -> bool {
    bpc == 8
}

/// Parse just the JPEG header.
pub(crate) fn load_info(data: &[u8]) -> Option<JpegInfo> {
    let mut decoder = JpegDecoder::new(data);
    decoder.decode_headers().ok()?;

    let info = decoder.info()?;
    let input = decoder.get_input_colorspace()?;

    Some(JpegInfo {
        width: info.width as u32,
        height: info.height as u32,
        num_components: info.components as u32,
        bits_per_component: 8,
        color_transform: matches!(input, ColorSpace::YCbCr | ColorSpace::YCCK),
    })
}

/// Construct a scanline decoder for the JPEG stream, requiring the header to
/// agree with the expected component count.
pub(crate) fn create(
    data: &[u8],
    n_components: u32,
    _color_transform: bool,
) -> Option<BufferDecoder> {
    let mut decoder = JpegDecoder::new(data);
    decoder.decode_headers().ok()?;

    let info = decoder.info()?;
    if info.components as u32 != n_components {
        return None;
    }

    let input = decoder.get_input_colorspace()?;
    let mut out_colorspace = match input {
        ColorSpace::RGB | ColorSpace::RGBA | ColorSpace::YCbCr => ColorSpace::RGB,
        ColorSpace::Luma | ColorSpace::LumaA => ColorSpace::Luma,
        ColorSpace::CMYK => ColorSpace::CMYK,
        ColorSpace::YCCK => ColorSpace::YCCK,
        _ => ColorSpace::RGB,
    };

    decoder.set_options(DecoderOptions::default().jpeg_set_out_colorspace(out_colorspace));
    let mut decoded = match decoder.decode() {
        Ok(data) => data,
        Err(_) => {
            // An APP14 marker may have made the input colorspace guess wrong,
            // so retry with the other interpretation.
            if matches!(out_colorspace, ColorSpace::YCCK | ColorSpace::CMYK) {
                out_colorspace = ColorSpace::RGB;
            } else {
                out_colorspace = ColorSpace::CMYK;
            }

            let mut decoder = JpegDecoder::new(data);
            decoder.decode_headers().ok()?;
            decoder.set_options(DecoderOptions::default().jpeg_set_out_colorspace(out_colorspace));
            decoder.decode().ok()?
        }
    };

    if out_colorspace == ColorSpace::YCCK {
        for c in decoded.chunks_exact_mut(4) {
            let y = c[0] as f32;
            let cb = c[1] as f32;
            let cr = c[2] as f32;
            c[0] = (434.456 - y - 1.402 * cr) as u8;
            c[1] = (119.541 - y + 0.344 * cb + 0.714 * cr) as u8;
            c[2] = (481.816 - y - 1.772 * cb) as u8;
        }
    }

    let out_components = match out_colorspace {
        ColorSpace::Luma => 1,
        ColorSpace::CMYK | ColorSpace::YCCK => 4,
        _ => 3,
    };

    if out_components != n_components {
        warn!("JPEG output component count diverged from the header");

        return None;
    }

    let width = info.width as u32;
    let height = info.height as u32;
    let pitch = width.checked_mul(out_components)?;

    Some(BufferDecoder::new(
        decoded,
        width,
        height,
        8,
        out_components,
        pitch,
    ))
}
