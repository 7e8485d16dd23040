//! Precomputed ARGB palettes for low-depth images.
//!
//! When the total bit depth is at most 8, every possible pixel code can be
//! converted up front. The palette then subsumes both the decode array and
//! the color-space conversion.

use smallvec::SmallVec;

use crate::color::Family;
use crate::params::ColorInfo;

pub(crate) fn argb(a: u32, rgb: [f32; 3]) -> u32 {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;

    a << 24 | to_byte(rgb[0]) << 16 | to_byte(rgb[1]) << 8 | to_byte(rgb[2])
}

/// Build the palette for the image, or `None` when a palette does not apply.
pub(crate) fn build_palette(info: &ColorInfo) -> Option<Vec<u32>> {
    let color_space = info.color_space.as_ref()?;

    if info.family == Family::Pattern || info.bpc == 0 {
        return None;
    }

    let bits = info.bpc.checked_mul(info.n_components)?;
    if bits > 8 {
        return None;
    }

    if bits == 1 {
        // The natural black/white mapping needs no palette.
        if info.default_decode
            && matches!(info.family, Family::DeviceGray | Family::DeviceRgb)
        {
            return None;
        }
        if color_space.components() > 3 {
            return None;
        }

        let comp = info.comp_data.first()?;
        let low = [comp.decode_min; 3];
        let high = [comp.decode_min + comp.decode_step; 3];

        let argb0 = argb(255, color_space.to_rgb(&low));
        let argb1 = argb(255, color_space.to_rgb(&high));

        if argb0 == 0xFF000000 && argb1 == 0xFFFFFFFF {
            return None;
        }

        return Some(vec![argb0, argb1]);
    }

    if info.bpc == 8 && info.default_decode && color_space.is_device_gray() {
        return None;
    }

    let count = 1usize << bits;
    let mut palette = Vec::with_capacity(count);

    for i in 0..count {
        let mut color_data = i as u32;
        let mut values: SmallVec<[f32; 4]> = SmallVec::new();

        for comp in info.comp_data.iter() {
            let code = color_data % (1 << info.bpc);
            color_data /= 1 << info.bpc;
            values.push(comp.decode_min + comp.decode_step * code as f32);
        }

        // A single-component profile-backed space may expect more internal
        // components; broadcast the code to all of them.
        let rgb = if info.n_components == 1
            && info.family == Family::IccBased
            && color_space.components() > 1
        {
            let spread = vec![values[0]; color_space.components() as usize];

            color_space.to_rgb(&spread)
        } else {
            color_space.to_rgb(&values)
        };

        palette.push(argb(255, rgb));
    }

    Some(palette)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::keys::*;
    use crate::object::{Array, Dict, Object};
    use crate::params::load_color_info;

    fn info_for(dict: Dict) -> ColorInfo {
        load_color_info(&dict, None, None, None).unwrap()
    }

    #[test]
    fn gray_1bit_default_needs_no_palette() {
        let info = info_for(Dict::from_entries([
            (BITS_PER_COMPONENT, Object::from(1)),
            (COLORSPACE, Object::name("DeviceGray")),
        ]));

        assert!(build_palette(&info).is_none());
    }

    #[test]
    fn gray_1bit_inverted_decode_builds_two_entries() {
        let info = info_for(Dict::from_entries([
            (BITS_PER_COMPONENT, Object::from(1)),
            (COLORSPACE, Object::name("DeviceGray")),
            (
                DECODE,
                Object::Array(Array::from_objects([Object::from(1), Object::from(0)])),
            ),
        ]));

        let palette = build_palette(&info).unwrap();
        assert_eq!(palette, vec![0xFFFFFFFF, 0xFF000000]);
    }

    #[test]
    fn gray_8bit_default_needs_no_palette() {
        let info = info_for(Dict::from_entries([
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("DeviceGray")),
        ]));

        assert!(build_palette(&info).is_none());
    }

    #[test]
    fn gray_8bit_inverted_decode_builds_256_entries() {
        let info = info_for(Dict::from_entries([
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("DeviceGray")),
            (
                DECODE,
                Object::Array(Array::from_objects([Object::from(1), Object::from(0)])),
            ),
        ]));

        let palette = build_palette(&info).unwrap();
        assert_eq!(palette.len(), 256);
        assert_eq!(palette[0], 0xFFFFFFFF);
        assert_eq!(palette[255], 0xFF000000);
    }

    #[test]
    fn indexed_4bit_palette() {
        let mut lookup = Vec::new();
        for i in 0..16u8 {
            lookup.extend_from_slice(&[i * 17, 0, 255 - i * 17]);
        }

        let cs = Array::from_objects([
            Object::name("Indexed"),
            Object::name("DeviceRGB"),
            Object::from(15),
            Object::string(lookup),
        ]);
        let info = info_for(Dict::from_entries([
            (BITS_PER_COMPONENT, Object::from(4)),
            (COLORSPACE, Object::Array(cs)),
        ]));

        let palette = build_palette(&info).unwrap();
        assert_eq!(palette.len(), 16);
        assert_eq!(palette[0], 0xFF0000FF);
        assert_eq!(palette[15], 0xFFFF0000);
    }

    #[test]
    fn rgb_24bit_has_no_palette() {
        let info = info_for(Dict::from_entries([
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("DeviceRGB")),
        ]));

        assert!(build_palette(&info).is_none());
    }

    #[test]
    fn palette_cardinality_matches_depth() {
        for bpc in [1u32, 2, 4] {
            let info = info_for(Dict::from_entries([
                (BITS_PER_COMPONENT, Object::from(bpc as i64)),
                (COLORSPACE, Object::name("DeviceCMYK")),
            ]));

            if let Some(palette) = build_palette(&info) {
                assert_eq!(palette.len(), 1 << (bpc * 4).min(8));
            } else {
                // CMYK needs 4 components; bpc * 4 > 8 means no palette.
                assert!(bpc * 4 > 8);
            }
        }
    }
}
