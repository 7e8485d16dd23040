//! Color spaces, as far as the image pipeline consumes them.
//!
//! The pipeline only relies on a narrow contract: component counts, family
//! tags, default decode ranges, per-pixel conversion to sRGB and full-row
//! translation of 8-bit samples into BGR. Calibrated conversions follow the
//! formulas commonly used by PDF viewers; ICC-based spaces resolve through
//! their alternate space or the component-count device fallback.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use log::warn;

use crate::object::keys::*;
use crate::object::{Array, Dict, Name, Object, Stream};

/// The family of a color space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    CalGray,
    CalRgb,
    Lab,
    IccBased,
    Indexed,
    Pattern,
    Separation,
    DeviceN,
    Unknown,
}

/// The minimum component count required by a device family, or 0 when the
/// family does not constrain it.
pub(crate) fn components_for_family(family: Family) -> u32 {
    match family {
        Family::DeviceGray => 1,
        Family::DeviceRgb => 3,
        Family::DeviceCmyk => 4,
        _ => 0,
    }
}

/// Whether `n` is a component count an ICC profile can carry in PDF.
pub(crate) fn is_valid_icc_components(n: u32) -> bool {
    matches!(n, 1 | 3 | 4)
}

/// A resolved color space.
#[derive(Debug, Clone)]
pub struct ColorSpace(Arc<Repr>);

#[derive(Debug)]
struct Repr {
    kind: Kind,
    // Nesting counter for the standard-conversion mode; while positive,
    // calibrated spaces convert as their device counterparts.
    std_conversion: AtomicU32,
}

#[derive(Debug)]
enum Kind {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Pattern,
    CalGray(CalGray),
    CalRgb(CalRgb),
    Lab(Lab),
    Icc {
        n: u32,
        alternate: Option<ColorSpace>,
    },
    Indexed {
        base: ColorSpace,
        hival: u32,
        lookup: Vec<u8>,
    },
    Separation {
        alternate: ColorSpace,
    },
    DeviceN {
        n: u32,
        alternate: ColorSpace,
    },
}

#[derive(Debug)]
struct CalGray {
    white_point: [f32; 3],
    gamma: f32,
}

#[derive(Debug)]
struct CalRgb {
    white_point: [f32; 3],
    black_point: [f32; 3],
    matrix: [f32; 9],
    gamma: [f32; 3],
}

#[derive(Debug)]
struct Lab {
    white_point: [f32; 3],
    range: [f32; 4],
}

const MAX_NESTING: u32 = 8;

impl ColorSpace {
    /// Resolve a color space object, looking named spaces up through the
    /// given resource dictionaries in order.
    pub fn new(object: &Object, resources: &[&Dict]) -> Option<ColorSpace> {
        Self::new_inner(object, resources, 0)
    }

    /// A stock device color space for the given family.
    pub fn stock(family: Family) -> ColorSpace {
        match family {
            Family::DeviceRgb => Self::from_kind(Kind::DeviceRgb),
            Family::DeviceCmyk => Self::from_kind(Kind::DeviceCmyk),
            _ => Self::from_kind(Kind::DeviceGray),
        }
    }

    fn from_kind(kind: Kind) -> ColorSpace {
        ColorSpace(Arc::new(Repr {
            kind,
            std_conversion: AtomicU32::new(0),
        }))
    }

    fn new_inner(object: &Object, resources: &[&Dict], depth: u32) -> Option<ColorSpace> {
        if depth > MAX_NESTING {
            warn!("color space nesting too deep");

            return None;
        }

        match object {
            Object::Name(name) => Self::new_from_name(name, resources, depth),
            Object::Array(array) => Self::new_from_array(array, resources, depth),
            _ => None,
        }
    }

    fn new_from_name(name: &Name, resources: &[&Dict], depth: u32) -> Option<ColorSpace> {
        match name.as_str() {
            "DeviceGray" | "G" | "CalGray" => Some(Self::from_kind(Kind::DeviceGray)),
            "DeviceRGB" | "RGB" => Some(Self::from_kind(Kind::DeviceRgb)),
            "DeviceCMYK" | "CMYK" | "CalCMYK" => Some(Self::from_kind(Kind::DeviceCmyk)),
            "Pattern" => Some(Self::from_kind(Kind::Pattern)),
            _ => {
                for res in resources {
                    let cs_entry = res
                        .get::<Dict>(COLORSPACE)
                        .and_then(|d| d.get::<Object>(name.as_str()));

                    if let Some(obj) = cs_entry {
                        return Self::new_inner(&obj, resources, depth + 1);
                    }
                }

                warn!("could not resolve color space {}", name.as_str());

                None
            }
        }
    }

    fn new_from_array(array: &Array, resources: &[&Dict], depth: u32) -> Option<ColorSpace> {
        let name = array.get::<Name>(0)?;

        match name.as_str() {
            "ICCBased" => {
                let stream = array.get::<Stream>(1)?;
                let dict = stream.dict().clone();

                let alternate = dict
                    .get_object(ALTERNATE)
                    .and_then(|o| Self::new_inner(o, resources, depth + 1));

                let n = dict
                    .get::<u32>(N)
                    .filter(|n| is_valid_icc_components(*n))
                    .or_else(|| alternate.as_ref().map(|a| a.components()))?;

                Some(Self::from_kind(Kind::Icc { n, alternate }))
            }
            "Indexed" | "I" => {
                let base = Self::new_inner(array.objects().nth(1)?, resources, depth + 1)?;
                let hival = array.get::<u32>(2)?.min(255);

                let mut lookup = match array.objects().nth(3)? {
                    Object::String(s) => s.to_vec(),
                    Object::Stream(s) => s.decoded().ok()?,
                    _ => return None,
                };

                let needed = (hival as usize + 1) * base.components() as usize;
                lookup.resize(needed.max(lookup.len()), 0);

                Some(Self::from_kind(Kind::Indexed {
                    base,
                    hival,
                    lookup,
                }))
            }
            "CalGray" => {
                let dict = array.get::<Dict>(1)?;

                Some(Self::from_kind(Kind::CalGray(CalGray {
                    white_point: get_floats(&dict, WHITE_POINT, [1.0, 1.0, 1.0]),
                    gamma: dict.get::<f32>(GAMMA).unwrap_or(1.0),
                })))
            }
            "CalRGB" => {
                let dict = array.get::<Dict>(1)?;

                Some(Self::from_kind(Kind::CalRgb(CalRgb {
                    white_point: get_floats(&dict, WHITE_POINT, [1.0, 1.0, 1.0]),
                    black_point: get_floats(&dict, BLACK_POINT, [0.0, 0.0, 0.0]),
                    matrix: get_floats(
                        &dict,
                        "Matrix",
                        [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                    ),
                    gamma: get_floats(&dict, GAMMA, [1.0, 1.0, 1.0]),
                })))
            }
            "Lab" => {
                let dict = array.get::<Dict>(1)?;

                Some(Self::from_kind(Kind::Lab(Lab {
                    white_point: get_floats(&dict, WHITE_POINT, [1.0, 1.0, 1.0]),
                    range: get_floats(&dict, RANGE, [-100.0, 100.0, -100.0, 100.0]),
                })))
            }
            "CalCMYK" => Some(Self::from_kind(Kind::DeviceCmyk)),
            "Separation" => {
                let alternate = Self::new_inner(array.objects().nth(2)?, resources, depth + 1)?;

                Some(Self::from_kind(Kind::Separation { alternate }))
            }
            "DeviceN" => {
                let n = array.get::<Array>(1)?.len() as u32;
                let alternate = Self::new_inner(array.objects().nth(2)?, resources, depth + 1)?;

                if n == 0 {
                    return None;
                }

                Some(Self::from_kind(Kind::DeviceN { n, alternate }))
            }
            "Pattern" => Some(Self::from_kind(Kind::Pattern)),
            "DeviceGray" | "DeviceRGB" | "DeviceCMYK" => {
                Self::new_from_name(&name, resources, depth)
            }
            _ => {
                warn!("unsupported color space: {}", name.as_str());

                None
            }
        }
    }

    /// The family tag.
    pub fn family(&self) -> Family {
        match &self.0.kind {
            Kind::DeviceGray => Family::DeviceGray,
            Kind::DeviceRgb => Family::DeviceRgb,
            Kind::DeviceCmyk => Family::DeviceCmyk,
            Kind::Pattern => Family::Pattern,
            Kind::CalGray(_) => Family::CalGray,
            Kind::CalRgb(_) => Family::CalRgb,
            Kind::Lab(_) => Family::Lab,
            Kind::Icc { .. } => Family::IccBased,
            Kind::Indexed { .. } => Family::Indexed,
            Kind::Separation { .. } => Family::Separation,
            Kind::DeviceN { .. } => Family::DeviceN,
        }
    }

    /// The number of components of a color in this space.
    pub fn components(&self) -> u32 {
        match &self.0.kind {
            Kind::DeviceGray | Kind::CalGray(_) => 1,
            Kind::DeviceRgb | Kind::CalRgb(_) | Kind::Lab(_) => 3,
            Kind::DeviceCmyk => 4,
            Kind::Pattern => 1,
            Kind::Icc { n, .. } => *n,
            Kind::Indexed { .. } => 1,
            Kind::Separation { .. } => 1,
            Kind::DeviceN { n, .. } => *n,
        }
    }

    /// The default (value, min, max) for component `i`.
    pub fn default_value(&self, i: u32) -> (f32, f32, f32) {
        match &self.0.kind {
            Kind::Lab(lab) => match i {
                0 => (0.0, 0.0, 100.0),
                1 => (0.0, lab.range[0], lab.range[1]),
                _ => (0.0, lab.range[2], lab.range[3]),
            },
            Kind::Indexed { hival, .. } => (0.0, 0.0, *hival as f32),
            _ => (0.0, 0.0, 1.0),
        }
    }

    /// Whether this is the plain device RGB space.
    pub(crate) fn is_device_rgb(&self) -> bool {
        matches!(self.0.kind, Kind::DeviceRgb)
    }

    /// Whether this is the plain device gray space.
    pub(crate) fn is_device_gray(&self) -> bool {
        matches!(self.0.kind, Kind::DeviceGray)
    }

    /// Switch the standard-conversion mode on or off. Enabling nests.
    pub fn set_std_conversion(&self, enable: bool) {
        if enable {
            self.0.std_conversion.fetch_add(1, Ordering::Relaxed);
        } else {
            let _ = self.0.std_conversion.fetch_update(
                Ordering::Relaxed,
                Ordering::Relaxed,
                |v| v.checked_sub(1),
            );
        }

        match &self.0.kind {
            Kind::Icc {
                alternate: Some(alt),
                ..
            } => alt.set_std_conversion(enable),
            Kind::Indexed { base, .. } => base.set_std_conversion(enable),
            Kind::Separation { alternate } | Kind::DeviceN { alternate, .. } => {
                alternate.set_std_conversion(enable)
            }
            _ => {}
        }
    }

    fn std_conversion(&self) -> bool {
        self.0.std_conversion.load(Ordering::Relaxed) > 0
    }

    /// Convert decoded component values into sRGB, each channel in [0, 1].
    pub fn to_rgb(&self, values: &[f32]) -> [f32; 3] {
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);

        match &self.0.kind {
            Kind::DeviceGray => {
                let g = at(0).clamp(0.0, 1.0);

                [g, g, g]
            }
            Kind::DeviceRgb => [
                at(0).clamp(0.0, 1.0),
                at(1).clamp(0.0, 1.0),
                at(2).clamp(0.0, 1.0),
            ],
            Kind::DeviceCmyk => cmyk_to_rgb(at(0), at(1), at(2), at(3)),
            Kind::Pattern => [0.0, 0.0, 0.0],
            Kind::CalGray(cal) => {
                if self.std_conversion() {
                    let g = at(0).clamp(0.0, 1.0);

                    [g, g, g]
                } else {
                    let g = cal.to_gray(at(0).clamp(0.0, 1.0));

                    [g, g, g]
                }
            }
            Kind::CalRgb(cal) => {
                if self.std_conversion() {
                    [
                        at(0).clamp(0.0, 1.0),
                        at(1).clamp(0.0, 1.0),
                        at(2).clamp(0.0, 1.0),
                    ]
                } else {
                    cal.to_rgb([at(0), at(1), at(2)])
                }
            }
            Kind::Lab(lab) => lab.to_rgb([at(0), at(1), at(2)]),
            Kind::Icc { n, alternate } => match alternate {
                Some(alt) => alt.to_rgb(values),
                None => match n {
                    1 => {
                        let g = at(0).clamp(0.0, 1.0);

                        [g, g, g]
                    }
                    4 => cmyk_to_rgb(at(0), at(1), at(2), at(3)),
                    _ => [
                        at(0).clamp(0.0, 1.0),
                        at(1).clamp(0.0, 1.0),
                        at(2).clamp(0.0, 1.0),
                    ],
                },
            },
            Kind::Indexed {
                base,
                hival,
                lookup,
            } => {
                let index = at(0).clamp(0.0, *hival as f32) as usize;
                let n = base.components() as usize;

                let mut components = [0.0f32; 8];
                for (i, slot) in components.iter_mut().enumerate().take(n.min(8)) {
                    *slot = lookup.get(index * n + i).copied().unwrap_or(0) as f32 / 255.0;
                }

                base.to_rgb(&components[..n.min(8)])
            }
            Kind::Separation { alternate } => {
                let tint = at(0).clamp(0.0, 1.0);
                let spread = vec![tint; alternate.components() as usize];

                alternate.to_rgb(&spread)
            }
            Kind::DeviceN { n, alternate } => {
                if *n == alternate.components() {
                    alternate.to_rgb(values)
                } else {
                    let tint = at(0).clamp(0.0, 1.0);
                    let spread = vec![tint; alternate.components() as usize];

                    alternate.to_rgb(&spread)
                }
            }
        }
    }

    /// Convert a full row of 8-bit samples into BGR bytes.
    ///
    /// `src` holds `pixels * components()` samples; `dest` receives 3 bytes
    /// per pixel in B, G, R order. Missing source samples read as 0.
    pub fn translate_image_line(&self, dest: &mut [u8], src: &[u8], pixels: u32, trans_mask: bool) {
        let n = self.components() as usize;
        let sample = |i: usize| src.get(i).copied().unwrap_or(0);

        match &self.0.kind {
            Kind::DeviceGray | Kind::CalGray(_) => {
                for (col, px) in dest.chunks_exact_mut(3).take(pixels as usize).enumerate() {
                    let g = sample(col);
                    px[0] = g;
                    px[1] = g;
                    px[2] = g;
                }
            }
            Kind::DeviceRgb | Kind::CalRgb(_) => {
                for (col, px) in dest.chunks_exact_mut(3).take(pixels as usize).enumerate() {
                    px[0] = sample(col * 3 + 2);
                    px[1] = sample(col * 3 + 1);
                    px[2] = sample(col * 3);
                }
            }
            Kind::DeviceCmyk => {
                // The transparency-mask derivation for CMYK groups uses the
                // same complement product as the plain conversion.
                let _ = trans_mask;

                for (col, px) in dest.chunks_exact_mut(3).take(pixels as usize).enumerate() {
                    let c = sample(col * 4) as f32 / 255.0;
                    let m = sample(col * 4 + 1) as f32 / 255.0;
                    let y = sample(col * 4 + 2) as f32 / 255.0;
                    let k = sample(col * 4 + 3) as f32 / 255.0;

                    let [r, g, b] = cmyk_to_rgb(c, m, y, k);
                    px[0] = to_byte(b);
                    px[1] = to_byte(g);
                    px[2] = to_byte(r);
                }
            }
            Kind::Lab(lab) => {
                for (col, px) in dest.chunks_exact_mut(3).take(pixels as usize).enumerate() {
                    let l = sample(col * 3) as f32 * 100.0 / 255.0;
                    let a = sample(col * 3 + 1) as f32 - 128.0;
                    let b_comp = sample(col * 3 + 2) as f32 - 128.0;

                    let [r, g, b] = lab.to_rgb([l, a, b_comp]);
                    px[0] = to_byte(b);
                    px[1] = to_byte(g);
                    px[2] = to_byte(r);
                }
            }
            Kind::Pattern => {}
            _ => {
                let mut components = vec![0.0f32; n];

                for (col, px) in dest.chunks_exact_mut(3).take(pixels as usize).enumerate() {
                    for (i, slot) in components.iter_mut().enumerate() {
                        *slot = sample(col * n + i) as f32 / 255.0;
                    }

                    let components = if matches!(self.0.kind, Kind::Indexed { .. }) {
                        // Indexed rows carry raw palette indices, not
                        // normalized values.
                        vec![sample(col) as f32]
                    } else {
                        components.clone()
                    };

                    let [r, g, b] = self.to_rgb(&components);
                    px[0] = to_byte(b);
                    px[1] = to_byte(g);
                    px[2] = to_byte(r);
                }
            }
        }
    }
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> [f32; 3] {
    let c = c.clamp(0.0, 1.0);
    let m = m.clamp(0.0, 1.0);
    let y = y.clamp(0.0, 1.0);
    let k = k.clamp(0.0, 1.0);

    [(1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)]
}

fn get_floats<const N: usize>(dict: &Dict, key: &str, default: [f32; N]) -> [f32; N] {
    let Some(array) = dict.get::<Array>(key) else {
        return default;
    };

    let mut out = default;
    for (slot, value) in out.iter_mut().zip(array.iter::<f32>()) {
        *slot = value;
    }

    out
}

impl CalGray {
    fn to_gray(&self, c: f32) -> f32 {
        let yw = self.white_point[1];
        let ag = c.powf(self.gamma);
        let l = yw * ag;

        (0.0f32.max(295.8 * l.powf(1.0 / 3.0) - 40.8) / 255.0).clamp(0.0, 1.0)
    }
}

impl CalRgb {
    const BRADFORD: [f32; 9] = [
        0.8951, 0.2664, -0.1614, -0.7502, 1.7135, 0.0367, 0.0389, -0.0685, 1.0296,
    ];

    const BRADFORD_INVERSE: [f32; 9] = [
        0.9869929, -0.1470543, 0.1599627, 0.4323053, 0.5183603, 0.0492912, -0.0085287, 0.0400428,
        0.9684867,
    ];

    const SRGB_D65_XYZ_TO_RGB: [f32; 9] = [
        3.2404542, -1.5371385, -0.4985314, -0.969_266, 1.8760108, 0.0415560, 0.0556434, -0.2040259,
        1.0572252,
    ];

    const D65_WHITEPOINT: [f32; 3] = [0.95047, 1.0, 1.08883];

    fn matrix_product(a: &[f32; 9], b: &[f32; 3]) -> [f32; 3] {
        [
            a[0] * b[0] + a[1] * b[1] + a[2] * b[2],
            a[3] * b[0] + a[4] * b[1] + a[5] * b[2],
            a[6] * b[0] + a[7] * b[1] + a[8] * b[2],
        ]
    }

    fn srgb_transfer(color: f32) -> f32 {
        if color <= 0.0031308 {
            (12.92 * color).clamp(0.0, 1.0)
        } else if color >= 0.99554525 {
            1.0
        } else {
            (1.055 * color.powf(1.0 / 2.4) - 0.055).clamp(0.0, 1.0)
        }
    }

    fn decode_l(l: f32) -> f32 {
        if l < 0.0 {
            -Self::decode_l(-l)
        } else if l > 8.0 {
            ((l + 16.0) / 116.0).powi(3)
        } else {
            l * (((8.0f32 + 16.0) / 116.0).powi(3) / 8.0)
        }
    }

    fn adapt_white_point(xyz: &[f32; 3], source: &[f32; 3], target: Option<&[f32; 3]>) -> [f32; 3] {
        let lms = Self::matrix_product(&Self::BRADFORD, xyz);
        let scaled = match target {
            Some(t) => [
                lms[0] * t[0] / source[0],
                lms[1] * t[1] / source[1],
                lms[2] * t[2] / source[2],
            ],
            None => [lms[0] / source[0], lms[1] / source[1], lms[2] / source[2]],
        };

        Self::matrix_product(&Self::BRADFORD_INVERSE, &scaled)
    }

    fn compensate_black_point(source: &[f32; 3], xyz: &[f32; 3]) -> [f32; 3] {
        if source == &[0.0, 0.0, 0.0] {
            return *xyz;
        }

        let zero = Self::decode_l(0.0);

        let mut out = [0.0; 3];
        for i in 0..3 {
            let src = Self::decode_l(source[i]);
            let scale = (1.0 - zero) / (1.0 - src);
            out[i] = xyz[i] * scale + (1.0 - scale);
        }

        out
    }

    fn to_rgb(&self, mut c: [f32; 3]) -> [f32; 3] {
        for v in &mut c {
            *v = v.clamp(0.0, 1.0);
        }

        let powed = [
            if c[0] == 1.0 { 1.0 } else { c[0].powf(self.gamma[0]) },
            if c[1] == 1.0 { 1.0 } else { c[1].powf(self.gamma[1]) },
            if c[2] == 1.0 { 1.0 } else { c[2].powf(self.gamma[2]) },
        ];

        let m = &self.matrix;
        let xyz = [
            m[0] * powed[0] + m[3] * powed[1] + m[6] * powed[2],
            m[1] * powed[0] + m[4] * powed[1] + m[7] * powed[2],
            m[2] * powed[0] + m[5] * powed[1] + m[8] * powed[2],
        ];

        let flat = if self.white_point[0] == 1.0 && self.white_point[2] == 1.0 {
            xyz
        } else {
            Self::adapt_white_point(&xyz, &self.white_point, None)
        };
        let black = Self::compensate_black_point(&self.black_point, &flat);
        let d65 = Self::adapt_white_point(&black, &[1.0, 1.0, 1.0], Some(&Self::D65_WHITEPOINT));
        let srgb = Self::matrix_product(&Self::SRGB_D65_XYZ_TO_RGB, &d65);

        [
            Self::srgb_transfer(srgb[0]),
            Self::srgb_transfer(srgb[1]),
            Self::srgb_transfer(srgb[2]),
        ]
    }
}

impl Lab {
    fn fn_g(x: f32) -> f32 {
        if x >= 6.0 / 29.0 {
            x.powi(3)
        } else {
            (108.0 / 841.0) * (x - 4.0 / 29.0)
        }
    }

    fn to_rgb(&self, c: [f32; 3]) -> [f32; 3] {
        let (l, a, b) = (c[0], c[1], c[2]);

        let m = (l + 16.0) / 116.0;
        let l_term = m + a / 500.0;
        let n = m - b / 200.0;

        let x = self.white_point[0] * Self::fn_g(l_term);
        let y = self.white_point[1] * Self::fn_g(m);
        let z = self.white_point[2] * Self::fn_g(n);

        let (r, g, b) = if self.white_point[2] < 1.0 {
            (
                x * 3.1339 + y * -1.617 + z * -0.4906,
                x * -0.9785 + y * 1.916 + z * 0.0333,
                x * 0.072 + y * -0.229 + z * 1.4057,
            )
        } else {
            (
                x * 3.2406 + y * -1.5372 + z * -0.4986,
                x * -0.9689 + y * 1.8758 + z * 0.0415,
                x * 0.0557 + y * -0.204 + z * 1.057,
            )
        };

        let conv = |v: f32| v.max(0.0).sqrt().clamp(0.0, 1.0);

        [conv(r), conv(g), conv(b)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_names_resolve_directly() {
        let cs = ColorSpace::new(&Object::name("DeviceRGB"), &[]).unwrap();
        assert_eq!(cs.family(), Family::DeviceRgb);
        assert_eq!(cs.components(), 3);

        let cs = ColorSpace::new(&Object::name("DeviceCMYK"), &[]).unwrap();
        assert_eq!(cs.components(), 4);
    }

    #[test]
    fn named_space_resolves_through_resources() {
        let cs_dict = Dict::from_entries([("CS0", Object::name("DeviceCMYK"))]);
        let resources = Dict::from_entries([(COLORSPACE, Object::Dict(cs_dict))]);

        let cs = ColorSpace::new(&Object::name("CS0"), &[&resources]).unwrap();
        assert_eq!(cs.family(), Family::DeviceCmyk);

        assert!(ColorSpace::new(&Object::name("CS1"), &[&resources]).is_none());
    }

    #[test]
    fn icc_based_falls_back_to_n() {
        let icc_dict = Dict::from_entries([(N, Object::from(4))]);
        let stream = Stream::new(icc_dict, Vec::new());
        let array =
            Array::from_objects([Object::name("ICCBased"), Object::Stream(stream)]);

        let cs = ColorSpace::new(&Object::Array(array), &[]).unwrap();
        assert_eq!(cs.family(), Family::IccBased);
        assert_eq!(cs.components(), 4);

        let rgb = cs.to_rgb(&[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(rgb, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn indexed_lookup() {
        let array = Array::from_objects([
            Object::name("Indexed"),
            Object::name("DeviceRGB"),
            Object::from(1),
            Object::string(vec![255u8, 0, 0, 0, 255, 0]),
        ]);

        let cs = ColorSpace::new(&Object::Array(array), &[]).unwrap();
        assert_eq!(cs.family(), Family::Indexed);
        assert_eq!(cs.components(), 1);

        assert_eq!(cs.to_rgb(&[0.0]), [1.0, 0.0, 0.0]);
        assert_eq!(cs.to_rgb(&[1.0]), [0.0, 1.0, 0.0]);
        // Out-of-range indices clamp to hival.
        assert_eq!(cs.to_rgb(&[9.0]), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn cmyk_conversion() {
        let cs = ColorSpace::stock(Family::DeviceCmyk);
        assert_eq!(cs.to_rgb(&[0.0, 0.0, 0.0, 0.0]), [1.0, 1.0, 1.0]);
        assert_eq!(cs.to_rgb(&[0.0, 0.0, 0.0, 1.0]), [0.0, 0.0, 0.0]);
        assert_eq!(cs.to_rgb(&[1.0, 0.0, 0.0, 0.0]), [0.0, 1.0, 1.0]);
    }

    #[test]
    fn std_conversion_nests() {
        let dict = Dict::from_entries([(GAMMA, Object::from(2.2f32))]);
        let array = Array::from_objects([Object::name("CalGray"), Object::Dict(dict)]);
        let cs = ColorSpace::new(&Object::Array(array), &[]).unwrap();

        let calibrated = cs.to_rgb(&[0.5]);

        cs.set_std_conversion(true);
        cs.set_std_conversion(true);
        assert_eq!(cs.to_rgb(&[0.5]), [0.5, 0.5, 0.5]);

        cs.set_std_conversion(false);
        assert_eq!(cs.to_rgb(&[0.5]), [0.5, 0.5, 0.5]);

        cs.set_std_conversion(false);
        assert_eq!(cs.to_rgb(&[0.5]), calibrated);
    }

    #[test]
    fn translate_rgb_line_swaps_to_bgr() {
        let cs = ColorSpace::stock(Family::DeviceRgb);
        let src = [10, 20, 30, 40, 50, 60];
        let mut dest = [0u8; 6];

        cs.translate_image_line(&mut dest, &src, 2, false);
        assert_eq!(dest, [30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn translate_gray_line_replicates() {
        let cs = ColorSpace::stock(Family::DeviceGray);
        let mut dest = [0u8; 6];

        cs.translate_image_line(&mut dest, &[0x11, 0xEE], 2, false);
        assert_eq!(dest, [0x11, 0x11, 0x11, 0xEE, 0xEE, 0xEE]);
    }

    #[test]
    fn translate_cmyk_line() {
        let cs = ColorSpace::stock(Family::DeviceCmyk);
        let mut dest = [0u8; 3];

        cs.translate_image_line(&mut dest, &[0, 0, 0, 0], 1, false);
        assert_eq!(dest, [255, 255, 255]);

        cs.translate_image_line(&mut dest, &[0, 0, 0, 255], 1, true);
        assert_eq!(dest, [0, 0, 0]);
    }
}
