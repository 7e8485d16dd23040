//! Interpretation of the image dictionary into a validated parameter record.

use smallvec::{smallvec, SmallVec};

use crate::color::{ColorSpace, Family};
use crate::error::{Error, Result};
use crate::object::keys::*;
use crate::object::{Array, Dict, Name, Object};

/// The largest width or height an image may declare.
pub(crate) const MAX_IMAGE_DIMENSION: u32 = 0x1FFFF;

pub(crate) fn is_valid_dimension(value: i64) -> bool {
    value > 0 && value <= MAX_IMAGE_DIMENSION as i64
}

fn is_maybe_valid_bpc(bpc: i64) -> bool {
    (0..=16).contains(&bpc)
}

pub(crate) fn is_allowed_bpc(bpc: u32) -> bool {
    matches!(bpc, 1 | 2 | 4 | 8 | 16)
}

/// Per-component decode mapping and color-key interval.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CompData {
    pub(crate) decode_min: f32,
    pub(crate) decode_step: f32,
    pub(crate) key_min: u32,
    pub(crate) key_max: u32,
}

/// The validated color parameters of an image.
#[derive(Debug, Clone)]
pub(crate) struct ColorInfo {
    pub(crate) bpc_declared: u32,
    pub(crate) bpc: u32,
    pub(crate) n_components: u32,
    pub(crate) color_space: Option<ColorSpace>,
    pub(crate) family: Family,
    pub(crate) image_mask: bool,
    pub(crate) default_decode: bool,
    pub(crate) color_key: bool,
    pub(crate) comp_data: SmallVec<[CompData; 4]>,
    pub(crate) bpc_check: bool,
}

impl ColorInfo {
    /// The state before any dictionary has been interpreted.
    pub(crate) fn unloaded() -> Self {
        Self {
            bpc_declared: 0,
            bpc: 0,
            n_components: 0,
            color_space: None,
            family: Family::Unknown,
            image_mask: false,
            default_decode: true,
            color_key: false,
            comp_data: SmallVec::new(),
            bpc_check: true,
        }
    }
}

fn get_flag(dict: &Dict, key: &str) -> bool {
    match dict.get_object(key) {
        Some(Object::Bool(b)) => *b,
        Some(Object::Int(i)) => *i != 0,
        _ => false,
    }
}

/// Interpret the color-related entries of the image dictionary.
///
/// `terminal_filter` is the last entry of the filter chain, if it is an image
/// codec. Inline images resolve named color spaces through the form resources
/// first, then the page resources; other images only use the page resources.
pub(crate) fn load_color_info(
    dict: &Dict,
    terminal_filter: Option<&Name>,
    form_resources: Option<&Dict>,
    page_resources: Option<&Dict>,
) -> Result<ColorInfo> {
    let mut info = ColorInfo::unloaded();

    let bpc_declared = dict.get::<i64>(BITS_PER_COMPONENT).unwrap_or(0);
    if !is_maybe_valid_bpc(bpc_declared) {
        return Err(Error::BadBitsPerComponent);
    }
    info.bpc_declared = bpc_declared as u32;

    info.image_mask = get_flag(dict, IMAGE_MASK);

    if info.image_mask || !dict.contains_key(COLORSPACE) {
        if !info.image_mask && terminal_filter.map(|f| f.as_str()) == Some("JPXDecode") {
            // The codec supplies the component count and bit depth.
            info.bpc_check = false;

            return Ok(info);
        }

        info.image_mask = true;
        info.bpc = 1;
        info.n_components = 1;
        info.default_decode = dict
            .get::<Array>(DECODE)
            .and_then(|d| d.get::<i64>(0))
            .unwrap_or(0)
            == 0;
        info.comp_data = smallvec![CompData::default()];

        return Ok(info);
    }

    let cs_obj = dict.get_object(COLORSPACE).ok_or(Error::BadColorSpace)?;

    let mut resources: SmallVec<[&Dict; 2]> = SmallVec::new();
    if let Some(form) = form_resources {
        resources.push(form);
    }
    if let Some(page) = page_resources {
        resources.push(page);
    }

    let color_space = ColorSpace::new(cs_obj, &resources).ok_or(Error::BadColorSpace)?;

    info.n_components = color_space.components();
    info.family = color_space.family();

    // A named space can resolve to an ICC profile through the resources; the
    // device name still pins the component count.
    if info.family == Family::IccBased {
        if let Object::Name(name) = cs_obj {
            match name.as_str() {
                "DeviceGray" => info.n_components = 1,
                "DeviceRGB" => info.n_components = 3,
                "DeviceCMYK" => info.n_components = 4,
                _ => {}
            }
        }
    }

    info.color_space = Some(color_space);

    validate_dict_param(&mut info, terminal_filter);
    decode_and_mask(&mut info, dict)?;

    Ok(info)
}

/// Apply filter-specific overrides to the declared bit depth and component
/// count.
pub(crate) fn validate_dict_param(info: &mut ColorInfo, terminal_filter: Option<&Name>) {
    info.bpc = info.bpc_declared;

    // RunLengthDecode images should always carry 8 bits per component, but
    // too many documents do not conform, so that is not enforced.

    match terminal_filter.map(|f| f.as_str()) {
        Some("JPXDecode") => {
            info.bpc_check = false;

            return;
        }
        Some("CCITTFaxDecode") | Some("JBIG2Decode") => {
            info.bpc = 1;
            info.n_components = 1;
        }
        Some("DCTDecode") => {
            info.bpc = 8;
        }
        _ => {}
    }

    if !is_allowed_bpc(info.bpc) {
        info.bpc = 0;
    }
}

/// Build the per-component decode array and parse an array-typed color key.
pub(crate) fn decode_and_mask(info: &mut ColorInfo, dict: &Dict) -> Result<()> {
    let color_space = info.color_space.as_ref().ok_or(Error::BadColorSpace)?;

    info.default_decode = true;
    info.color_key = false;
    info.comp_data = smallvec![CompData::default(); info.n_components as usize];

    let max_data = ((1u32 << info.bpc.min(16)) - 1) as f32;

    if let Some(decode) = dict.get::<Array>(DECODE) {
        for (i, comp) in info.comp_data.iter_mut().enumerate() {
            comp.decode_min = decode.get::<f32>(i * 2).unwrap_or(0.0);
            let max = decode.get::<f32>(i * 2 + 1).unwrap_or(0.0);
            comp.decode_step = (max - comp.decode_min) / max_data;

            let (_, def_min, mut def_max) = color_space.default_value(i as u32);
            if info.family == Family::Indexed {
                def_max = max_data;
            }
            if def_min != comp.decode_min || def_max != max {
                info.default_decode = false;
            }
        }
    } else {
        for (i, comp) in info.comp_data.iter_mut().enumerate() {
            let (_, def_min, mut def_max) = color_space.default_value(i as u32);
            if info.family == Family::Indexed {
                def_max = max_data;
            }
            comp.decode_min = def_min;
            comp.decode_step = (def_max - def_min) / max_data;
        }
    }

    // A stream-typed mask is a full sub-image, handled by the mask loader.
    if dict.contains_key(SMASK) {
        return Ok(());
    }

    let Some(mask) = dict.get_object(MASK) else {
        return Ok(());
    };

    if let Object::Array(array) = mask {
        if array.len() >= info.n_components as usize * 2 {
            for (i, comp) in info.comp_data.iter_mut().enumerate() {
                let min = array.get::<i64>(i * 2).unwrap_or(0);
                let max = array.get::<i64>(i * 2 + 1).unwrap_or(0);
                comp.key_min = min.max(0) as u32;
                comp.key_max = (max.max(0) as u32).min(max_data as u32);
            }
        }
        info.color_key = true;
    }

    Ok(())
}

/// Default-decode component data for a color space the dictionary never
/// described (a codec-supplied space).
pub(crate) fn default_comp_data(
    color_space: &ColorSpace,
    bpc: u32,
    n_components: u32,
) -> SmallVec<[CompData; 4]> {
    let max_data = ((1u32 << bpc.min(16)) - 1) as f32;

    (0..n_components)
        .map(|i| {
            let (_, def_min, def_max) = color_space.default_value(i);

            CompData {
                decode_min: def_min,
                decode_step: (def_max - def_min) / max_data,
                key_min: 0,
                key_max: 0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Stream;

    fn image_dict(entries: Vec<(&'static str, Object)>) -> Dict {
        Dict::from_entries(entries)
    }

    #[test]
    fn plain_rgb() {
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("DeviceRGB")),
        ]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert_eq!(info.bpc, 8);
        assert_eq!(info.n_components, 3);
        assert_eq!(info.family, Family::DeviceRgb);
        assert!(info.default_decode);
        assert!(!info.color_key);
        assert_eq!(info.comp_data.len(), 3);
        assert_eq!(info.comp_data[0].decode_min, 0.0);
        assert_eq!(info.comp_data[0].decode_step, 1.0 / 255.0);
    }

    #[test]
    fn image_mask_defaults() {
        let dict = image_dict(vec![(IMAGE_MASK, Object::from(true))]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert!(info.image_mask);
        assert_eq!(info.bpc, 1);
        assert_eq!(info.n_components, 1);
        assert!(info.default_decode);
    }

    #[test]
    fn image_mask_inverted_decode() {
        let dict = image_dict(vec![
            (IMAGE_MASK, Object::from(true)),
            (
                DECODE,
                Object::Array(Array::from_objects([Object::from(1), Object::from(0)])),
            ),
        ]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert!(info.image_mask);
        assert!(!info.default_decode);
    }

    #[test]
    fn missing_colorspace_becomes_mask() {
        let dict = image_dict(vec![(BITS_PER_COMPONENT, Object::from(8))]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert!(info.image_mask);
        assert_eq!(info.bpc, 1);
    }

    #[test]
    fn jpx_without_colorspace_defers() {
        let dict = image_dict(vec![(BITS_PER_COMPONENT, Object::from(8))]);

        let name = Name::new("JPXDecode");
        let info = load_color_info(&dict, Some(&name), None, None).unwrap();
        assert!(!info.image_mask);
        assert!(!info.bpc_check);
        assert_eq!(info.n_components, 0);
    }

    #[test]
    fn dct_forces_8_bpc() {
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(4)),
            (COLORSPACE, Object::name("DeviceRGB")),
        ]);

        let name = Name::new("DCTDecode");
        let info = load_color_info(&dict, Some(&name), None, None).unwrap();
        assert_eq!(info.bpc, 8);
    }

    #[test]
    fn ccitt_forces_bilevel() {
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("DeviceGray")),
        ]);

        let name = Name::new("CCITTFaxDecode");
        let info = load_color_info(&dict, Some(&name), None, None).unwrap();
        assert_eq!(info.bpc, 1);
        assert_eq!(info.n_components, 1);
    }

    #[test]
    fn disallowed_bpc_becomes_zero() {
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(3)),
            (COLORSPACE, Object::name("DeviceGray")),
        ]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert_eq!(info.bpc, 0);
    }

    #[test]
    fn out_of_range_bpc_is_fatal() {
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(17)),
            (COLORSPACE, Object::name("DeviceGray")),
        ]);

        assert_eq!(
            load_color_info(&dict, None, None, None).unwrap_err(),
            Error::BadBitsPerComponent
        );
    }

    #[test]
    fn unresolved_colorspace_is_fatal() {
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("NoSuchSpace")),
        ]);

        assert_eq!(
            load_color_info(&dict, None, None, None).unwrap_err(),
            Error::BadColorSpace
        );
    }

    #[test]
    fn decode_array_marks_non_default() {
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("DeviceGray")),
            (
                DECODE,
                Object::Array(Array::from_objects([Object::from(1), Object::from(0)])),
            ),
        ]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert!(!info.default_decode);
        assert_eq!(info.comp_data[0].decode_min, 1.0);
        assert_eq!(info.comp_data[0].decode_step, -1.0 / 255.0);
    }

    #[test]
    fn indexed_decode_uses_code_range() {
        let lookup = Object::string(vec![0u8; 48]);
        let cs = Array::from_objects([
            Object::name("Indexed"),
            Object::name("DeviceRGB"),
            Object::from(15),
            lookup,
        ]);
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(4)),
            (COLORSPACE, Object::Array(cs)),
        ]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert_eq!(info.family, Family::Indexed);
        assert_eq!(info.n_components, 1);
        // Codes 0..=15 map onto themselves.
        assert_eq!(info.comp_data[0].decode_min, 0.0);
        assert_eq!(info.comp_data[0].decode_step, 1.0);
        assert!(info.default_decode);
    }

    #[test]
    fn color_key_is_clamped() {
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("DeviceRGB")),
            (
                MASK,
                Object::Array(Array::from_objects([
                    Object::from(-4),
                    Object::from(999),
                    Object::from(0),
                    Object::from(0),
                    Object::from(10),
                    Object::from(20),
                ])),
            ),
        ]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert!(info.color_key);
        assert_eq!(info.comp_data[0].key_min, 0);
        assert_eq!(info.comp_data[0].key_max, 255);
        assert_eq!(info.comp_data[2].key_min, 10);
        assert_eq!(info.comp_data[2].key_max, 20);
    }

    #[test]
    fn stream_mask_is_not_a_color_key() {
        let mask = Stream::new(Dict::empty(), Vec::new());
        let dict = image_dict(vec![
            (BITS_PER_COMPONENT, Object::from(8)),
            (COLORSPACE, Object::name("DeviceGray")),
            (MASK, Object::Stream(mask)),
        ]);

        let info = load_color_info(&dict, None, None, None).unwrap();
        assert!(!info.color_key);
    }
}
