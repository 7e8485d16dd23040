//! Canonical scanline rendering.
//!
//! Every row leaves this module in the decoder's declared output format:
//! 1-bit stencils, 8-bit indexed/gray rows, BGR triples, or BGRA quads when a
//! color key produces per-pixel alpha. Missing source data yields an all-0xFF
//! row so downstream consumers never see a short read.

use smallvec::SmallVec;

use crate::bit::{bit_at, BitReader};
use crate::color::Family;
use crate::image::ImageDecoder;
use crate::params::{ColorInfo, CompData};
use crate::pitch;

impl ImageDecoder<'_> {
    /// The canonical scanline at `line`.
    ///
    /// The returned slice is `pitch()` bytes long and stays valid until the
    /// next call or destruction. Rows the source cannot provide come back
    /// filled with 0xFF.
    pub fn scanline(&mut self, line: u32) -> Option<&[u8]> {
        if self.failed || self.info.bpc == 0 {
            return None;
        }

        let src_pitch =
            pitch::bytes_per_row(self.info.bpc, self.info.n_components, self.width)? as usize;
        let pitch = self.pitch as usize;
        let width = self.width;
        let trans_mask = self.trans_mask();

        let this = &mut *self;

        // Source acquisition: a cached bitmap, a lazy codec, or the raw
        // stream bytes themselves.
        let src: Option<&[u8]> = if let Some(bitmap) = this
            .cached_bitmap
            .as_ref()
            .filter(|b| src_pitch <= b.pitch as usize && b.height > 0)
        {
            Some(bitmap.row(line.min(bitmap.height - 1)))
        } else if let Some(decoder) = this.decoder.as_mut() {
            decoder.scanline(line)
        } else if this.stream_data.len() as u64 >= (line as u64 + 1) * src_pitch as u64 {
            Some(&this.stream_data[line as usize * src_pitch..][..src_pitch])
        } else {
            None
        };

        let Some(src) = src else {
            let blank = if this.masked_line.is_empty() {
                &mut this.line_buf
            } else {
                &mut this.masked_line
            };
            blank.fill(0xFF);

            return Some(&blank[..pitch]);
        };

        if this.info.bpc * this.info.n_components == 1 {
            if this.info.image_mask && this.info.default_decode {
                // Stencil convention: invert the raw bits.
                for (dest, byte) in this.line_buf[..src_pitch.min(src.len())]
                    .iter_mut()
                    .zip(src)
                {
                    *dest = !byte;
                }

                return Some(&this.line_buf[..pitch]);
            }

            if !this.info.color_key {
                let n = src_pitch.min(src.len());
                this.line_buf[..n].copy_from_slice(&src[..n]);

                return Some(&this.line_buf[..pitch]);
            }

            let set_argb = one_bit_set_value(&this.info, this.palette.as_deref());
            let reset_argb = one_bit_reset_value(&this.info, this.palette.as_deref());

            for col in 0..width as usize {
                let argb = if bit_at(src, col as u32) {
                    set_argb
                } else {
                    reset_argb
                };
                this.masked_line[col * 4..col * 4 + 4].copy_from_slice(&argb.to_le_bytes());
            }

            return Some(&this.masked_line[..pitch]);
        }

        if this.info.bpc * this.info.n_components <= 8 {
            if this.info.bpc == 8 {
                let n = src_pitch.min(src.len());
                this.line_buf[..n].copy_from_slice(&src[..n]);
            } else {
                let mut reader = BitReader::new(src);

                for col in 0..width as usize {
                    let mut index = 0u32;

                    for comp in 0..this.info.n_components {
                        let code = reader.read(this.info.bpc as u8).unwrap_or(0);
                        index |= code << (comp * this.info.bpc);
                    }

                    this.line_buf[col] = index as u8;
                }
            }

            if !this.info.color_key {
                return Some(&this.line_buf[..pitch]);
            }

            let comp = this.info.comp_data.first().copied().unwrap_or_default();
            for col in 0..width as usize {
                let index = this.line_buf[col];
                let px = &mut this.masked_line[col * 4..col * 4 + 4];

                match this.palette.as_deref() {
                    Some(palette) => {
                        let argb = palette.get(index as usize).copied().unwrap_or(0);
                        px[0] = argb as u8;
                        px[1] = (argb >> 8) as u8;
                        px[2] = (argb >> 16) as u8;
                    }
                    None => {
                        px[0] = index;
                        px[1] = index;
                        px[2] = index;
                    }
                }

                px[3] = if index_out_of_bounds(index, &comp) {
                    0xFF
                } else {
                    0
                };
            }

            return Some(&this.masked_line[..pitch]);
        }

        // 24-bpp path.
        if this.info.color_key {
            if this.info.n_components == 3 && this.info.bpc == 8 {
                for col in 0..width as usize {
                    let out_of_bounds = this.info.comp_data.iter().take(3).enumerate().any(
                        |(i, comp)| {
                            let code = src.get(col * 3 + i).copied().unwrap_or(0);

                            index_out_of_bounds(code, comp)
                        },
                    );

                    this.masked_line[col * 4 + 3] = if out_of_bounds { 0xFF } else { 0 };
                }
            } else {
                this.masked_line.fill(0xFF);
            }
        }

        if this.info.color_space.is_some() {
            translate_scanline_24bpp(&this.info, width, trans_mask, &mut this.line_buf, src);
        } else {
            let n = this.line_buf.len().min(src.len());
            this.line_buf[..n].copy_from_slice(&src[..n]);
        }

        if !this.info.color_key {
            return Some(&this.line_buf[..pitch]);
        }

        for col in 0..width as usize {
            this.masked_line[col * 4..col * 4 + 3]
                .copy_from_slice(&this.line_buf[col * 3..col * 3 + 3]);
        }

        Some(&this.masked_line[..pitch])
    }
}

/// A code inside every component's key interval becomes transparent; outside
/// any of them it stays opaque.
fn index_out_of_bounds(index: u8, comp: &CompData) -> bool {
    (index as u32) < comp.key_min || (index as u32) > comp.key_max
}

fn one_bit_set_value(info: &ColorInfo, palette: Option<&[u32]>) -> u32 {
    if info.comp_data.first().map(|c| c.key_max) == Some(1) {
        return 0;
    }

    palette.and_then(|p| p.get(1).copied()).unwrap_or(0xFFFF_FFFF)
}

fn one_bit_reset_value(info: &ColorInfo, palette: Option<&[u32]>) -> u32 {
    if info.comp_data.first().map(|c| c.key_min) == Some(0) {
        return 0;
    }

    palette.and_then(|p| p.first().copied()).unwrap_or(0xFF00_0000)
}

/// Convert one packed source row into BGR bytes.
pub(crate) fn translate_scanline_24bpp(
    info: &ColorInfo,
    width: u32,
    trans_mask: bool,
    dest: &mut [u8],
    src: &[u8],
) {
    if info.bpc == 0 {
        return;
    }

    if translate_default_decode(info, width, trans_mask, dest, src) {
        return;
    }

    let Some(color_space) = info.color_space.as_ref() else {
        return;
    };

    let mut reader = BitReader::new(src);
    let mut values: SmallVec<[f32; 4]> = SmallVec::new();

    for col in 0..width as usize {
        values.clear();

        for comp in info.comp_data.iter() {
            let code = reader.read(info.bpc as u8).unwrap_or(0);
            values.push(comp.decode_min + comp.decode_step * code as f32);
        }

        let [r, g, b] = if trans_mask {
            let k = 1.0 - values.get(3).copied().unwrap_or(0.0);

            [
                (1.0 - values.first().copied().unwrap_or(0.0)) * k,
                (1.0 - values.get(1).copied().unwrap_or(0.0)) * k,
                (1.0 - values.get(2).copied().unwrap_or(0.0)) * k,
            ]
        } else if info.family != Family::Pattern {
            color_space.to_rgb(&values)
        } else {
            [0.0, 0.0, 0.0]
        };

        dest[col * 3] = (b.clamp(0.0, 1.0) * 255.0) as u8;
        dest[col * 3 + 1] = (g.clamp(0.0, 1.0) * 255.0) as u8;
        dest[col * 3 + 2] = (r.clamp(0.0, 1.0) * 255.0) as u8;
    }
}

/// The fast paths for default-decoded images. Returns `false` when the slow
/// per-pixel path has to run instead.
fn translate_default_decode(
    info: &ColorInfo,
    width: u32,
    trans_mask: bool,
    dest: &mut [u8],
    src: &[u8],
) -> bool {
    if !info.default_decode {
        return false;
    }

    if info.family != Family::DeviceRgb && info.family != Family::CalRgb {
        if info.bpc != 8 {
            return false;
        }

        if let Some(color_space) = &info.color_space {
            if info.n_components == color_space.components() {
                color_space.translate_image_line(dest, src, width, trans_mask);
            }
        }

        return true;
    }

    if info.n_components != 3 {
        return true;
    }

    let sample = |i: usize| src.get(i).copied().unwrap_or(0);

    match info.bpc {
        8 => {
            for col in 0..width as usize {
                dest[col * 3] = sample(col * 3 + 2);
                dest[col * 3 + 1] = sample(col * 3 + 1);
                dest[col * 3 + 2] = sample(col * 3);
            }
        }
        16 => {
            // Big-endian samples; keep the high byte of each.
            for col in 0..width as usize {
                dest[col * 3] = sample(col * 6 + 4);
                dest[col * 3 + 1] = sample(col * 6 + 2);
                dest[col * 3 + 2] = sample(col * 6);
            }
        }
        _ => {
            let max_data = (1u32 << info.bpc) - 1;
            let mut reader = BitReader::new(src);

            for col in 0..width as usize {
                let r = reader.read(info.bpc as u8).unwrap_or(0).min(max_data);
                let g = reader.read(info.bpc as u8).unwrap_or(0).min(max_data);
                let b = reader.read(info.bpc as u8).unwrap_or(0).min(max_data);

                dest[col * 3] = (b * 255 / max_data) as u8;
                dest[col * 3 + 1] = (g * 255 / max_data) as u8;
                dest[col * 3 + 2] = (r * 255 / max_data) as u8;
            }
        }
    }

    true
}
