//! The stream-access layer.
//!
//! Image streams may carry a chain of filters. Everything before the terminal
//! image filter (the codec the decoder pipeline drives) is applied here, so
//! the pipeline always starts from a contiguous byte span that only the last
//! filter still encodes.

use std::sync::Arc;

use log::warn;

use crate::error::{Error, Result};
use crate::object::keys::*;
use crate::object::{Dict, Name, Object, Stream};

/// A stream filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Filter {
    AsciiHex,
    Ascii85,
    Lzw,
    Flate,
    RunLength,
    CcittFax,
    Jbig2,
    Dct,
    Jpx,
    Crypt,
}

impl Filter {
    pub(crate) fn from_name(name: &Name) -> Option<Self> {
        match name.as_str() {
            "ASCIIHexDecode" | "AHx" => Some(Filter::AsciiHex),
            "ASCII85Decode" | "A85" => Some(Filter::Ascii85),
            "LZWDecode" | "LZW" => Some(Filter::Lzw),
            "FlateDecode" | "Fl" => Some(Filter::Flate),
            "RunLengthDecode" | "RL" => Some(Filter::RunLength),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CcittFax),
            "JBIG2Decode" => Some(Filter::Jbig2),
            "DCTDecode" | "DCT" => Some(Filter::Dct),
            "JPXDecode" => Some(Filter::Jpx),
            "Crypt" => Some(Filter::Crypt),
            _ => {
                warn!("unknown filter: {}", name.as_str());

                None
            }
        }
    }

    /// Whether this filter, when terminal, is decoded by the image pipeline
    /// rather than by the stream layer.
    fn is_image_codec(self) -> bool {
        matches!(
            self,
            Filter::CcittFax
                | Filter::Jbig2
                | Filter::Dct
                | Filter::Jpx
                | Filter::Flate
                | Filter::RunLength
        )
    }

    fn apply(self, data: &[u8], params: &Dict) -> Result<Vec<u8>> {
        match self {
            Filter::AsciiHex => ascii_hex(data),
            Filter::Ascii85 => ascii_85(data),
            Filter::Lzw => {
                let decoded = lzw(data, params.get::<i32>(EARLY_CHANGE).unwrap_or(1) != 0)?;
                apply_predictor(decoded, &PredictorParams::from_dict(params))
            }
            Filter::Flate => {
                let decoded = flate(data)?;
                apply_predictor(decoded, &PredictorParams::from_dict(params))
            }
            Filter::RunLength => run_length(data),
            _ => {
                warn!("filter cannot be applied by the stream layer");

                Err(Error::DecoderInit)
            }
        }
    }
}

/// The filter chain of a stream: each entry is the filter name plus its
/// parameter dictionary.
pub(crate) fn decoder_chain(dict: &Dict) -> Result<Vec<(Name, Dict)>> {
    let params_at = |i: usize| -> Dict {
        match dict.get_object(DECODE_PARMS) {
            Some(Object::Dict(d)) if i == 0 => d.clone(),
            Some(Object::Array(a)) => a.get::<Dict>(i).unwrap_or_default(),
            _ => Dict::empty(),
        }
    };

    match dict.get_object(FILTER) {
        None => Ok(Vec::new()),
        Some(Object::Name(name)) => Ok(vec![(name.clone(), params_at(0))]),
        Some(Object::Array(filters)) => Ok(filters
            .objects()
            .enumerate()
            .filter_map(|(i, o)| o.cast::<Name>().map(|n| (n, params_at(i))))
            .collect()),
        _ => Err(Error::DecoderInit),
    }
}

/// The terminal entry of a filter chain, if its last filter is an image
/// codec the decoder pipeline has to drive itself.
pub(crate) fn terminal_entry<'c>(chain: &'c [(Name, Dict)]) -> Option<(&'c Name, &'c Dict)> {
    let (name, params) = chain.last()?;
    let filter = Filter::from_name(name)?;

    filter.is_image_codec().then_some((name, params))
}

impl Stream {
    /// Fully decode the stream through its whole filter chain.
    pub fn decoded(&self) -> Result<Vec<u8>> {
        let mut data = self.raw_data().to_vec();

        for (name, params) in decoder_chain(self.dict())? {
            let filter = Filter::from_name(&name).ok_or(Error::DecoderInit)?;
            data = filter.apply(&data, &params)?;
        }

        Ok(data)
    }

    /// Decode the stream up to (but excluding) the terminal image filter.
    ///
    /// Returns the resulting byte span, the terminal filter name (if the last
    /// chain entry is an image codec) and that filter's parameter dictionary.
    pub(crate) fn image_data(&self) -> Result<(Arc<[u8]>, Option<Name>, Dict)> {
        let chain = decoder_chain(self.dict())?;

        let terminal = terminal_entry(&chain).map(|(name, params)| (name.clone(), params.clone()));

        let applied = if terminal.is_some() {
            chain.len() - 1
        } else {
            chain.len()
        };

        let mut data: Option<Vec<u8>> = None;
        for (name, params) in chain.iter().take(applied) {
            let filter = Filter::from_name(name).ok_or(Error::DecoderInit)?;
            let input = data.as_deref().unwrap_or(self.raw_data());
            data = Some(filter.apply(input, params)?);
        }

        let data = match data {
            Some(owned) => Arc::from(owned),
            None => Arc::from(self.raw_data().to_vec()),
        };

        let (name, params) = match terminal {
            Some((name, params)) => (Some(name), params),
            None => (None, Dict::empty()),
        };

        Ok((data, name, params))
    }
}

fn ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    let mut high: Option<u8> = None;

    for byte in data {
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            b'>' => break,
            _ if byte.is_ascii_whitespace() => continue,
            _ => return Err(Error::DecoderCorrupt),
        };

        match high.take() {
            Some(h) => decoded.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }

    // An odd trailing digit behaves as if followed by 0.
    if let Some(h) = high {
        decoded.push(h << 4);
    }

    Ok(decoded)
}

fn ascii_85(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    let mut group = [0u8; 5];
    let mut count = 0;

    for &byte in data {
        match byte {
            b'~' => break,
            b'z' if count == 0 => decoded.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = byte - b'!';
                count += 1;

                if count == 5 {
                    let value = group.iter().fold(0u32, |acc, &d| {
                        acc.wrapping_mul(85).wrapping_add(d as u32)
                    });
                    decoded.extend_from_slice(&value.to_be_bytes());
                    count = 0;
                }
            }
            _ if byte.is_ascii_whitespace() => {}
            _ => return Err(Error::DecoderCorrupt),
        }
    }

    if count == 1 {
        return Err(Error::DecoderCorrupt);
    }

    if count > 1 {
        for slot in group.iter_mut().skip(count) {
            *slot = 84;
        }

        let value = group
            .iter()
            .fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
        decoded.extend_from_slice(&value.to_be_bytes()[..count - 1]);
    }

    Ok(decoded)
}

fn flate(data: &[u8]) -> Result<Vec<u8>> {
    miniz_oxide::inflate::decompress_to_vec_zlib(data)
        .or_else(|_| miniz_oxide::inflate::decompress_to_vec(data))
        .map_err(|_| Error::DecoderCorrupt)
}

pub(crate) fn run_length(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    let mut pos = 0;

    loop {
        let Some(&length) = data.get(pos) else {
            warn!("run-length stream ended without EOD marker");

            return Ok(decoded);
        };
        pos += 1;

        match length {
            128 => return Ok(decoded),
            0..=127 => {
                let count = length as usize + 1;
                let run = data.get(pos..pos + count).ok_or(Error::ShortRead)?;
                decoded.extend_from_slice(run);
                pos += count;
            }
            _ => {
                let count = 257 - length as usize;
                let byte = *data.get(pos).ok_or(Error::ShortRead)?;
                decoded.extend(std::iter::repeat(byte).take(count));
                pos += 1;
            }
        }
    }
}

mod lzw_table {
    pub(super) const CLEAR_TABLE: usize = 256;
    pub(super) const EOD: usize = 257;
    pub(super) const MAX_ENTRIES: usize = 4096;
    pub(super) const INITIAL_SIZE: usize = 258;

    pub(super) struct Table {
        early_change: bool,
        entries: Vec<Vec<u8>>,
    }

    impl Table {
        pub(super) fn new(early_change: bool) -> Self {
            let mut entries: Vec<_> = (0..=255u8).map(|b| vec![b]).collect();

            // Clear-table and EOD carry no data.
            entries.push(vec![0]);
            entries.push(vec![0]);

            Self {
                early_change,
                entries,
            }
        }

        pub(super) fn get(&self, index: usize) -> Option<&[u8]> {
            self.entries.get(index).map(|v| &**v)
        }

        pub(super) fn register(&mut self, prev: usize, new_byte: u8) -> Option<&[u8]> {
            let prev_entry = self.get(prev)?;

            let mut new_entry = Vec::with_capacity(prev_entry.len() + 1);
            new_entry.extend_from_slice(prev_entry);
            new_entry.push(new_byte);

            if self.entries.len() >= MAX_ENTRIES {
                None
            } else {
                self.entries.push(new_entry);
                self.entries.last().map(|v| &**v)
            }
        }

        pub(super) fn clear(&mut self) {
            self.entries.truncate(INITIAL_SIZE);
        }

        pub(super) fn code_length(&self) -> u8 {
            let adjusted = self.entries.len() + usize::from(self.early_change);

            if adjusted >= 2048 {
                12
            } else if adjusted >= 1024 {
                11
            } else if adjusted >= 512 {
                10
            } else {
                9
            }
        }
    }
}

fn lzw(data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    use lzw_table::*;

    let mut table = Table::new(early_change);
    let mut reader = crate::bit::BitReader::new(data);
    let mut decoded = Vec::new();
    let mut prev: Option<usize> = None;

    loop {
        let Some(next) = reader.read(table.code_length()) else {
            return Ok(decoded);
        };
        let next = next as usize;

        match next {
            CLEAR_TABLE => {
                table.clear();
                prev = None;
            }
            EOD => return Ok(decoded),
            new => {
                if let Some(entry) = table.get(new).map(|e| e.to_vec()) {
                    decoded.extend_from_slice(&entry);

                    if let Some(prev) = prev {
                        table.register(prev, entry[0]).ok_or(Error::DecoderCorrupt)?;
                    }
                } else {
                    let prev_code = prev.ok_or(Error::DecoderCorrupt)?;
                    let new_byte = table.get(prev_code).ok_or(Error::DecoderCorrupt)?[0];
                    let entry = table
                        .register(prev_code, new_byte)
                        .ok_or(Error::DecoderCorrupt)?
                        .to_vec();

                    decoded.extend_from_slice(&entry);
                }

                prev = Some(next);
            }
        }
    }
}

pub(crate) struct PredictorParams {
    pub(crate) predictor: u8,
    pub(crate) colors: u8,
    pub(crate) bits_per_component: u8,
    pub(crate) columns: usize,
}

impl PredictorParams {
    pub(crate) fn from_dict(dict: &Dict) -> Self {
        Self {
            predictor: dict.get::<i32>(PREDICTOR).unwrap_or(1).clamp(0, 255) as u8,
            colors: dict.get::<i32>(COLORS).unwrap_or(1).clamp(1, 255) as u8,
            bits_per_component: dict.get::<i32>(BITS_PER_COMPONENT).unwrap_or(8).clamp(1, 16)
                as u8,
            columns: dict.get::<i32>(COLUMNS).unwrap_or(1).max(1) as usize,
        }
    }

    fn row_length_in_bytes(&self) -> usize {
        let bits_per_pixel = self.bits_per_component as usize * self.colors as usize;
        self.columns * ((bits_per_pixel + 7) / 8)
    }
}

pub(crate) fn apply_predictor(data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        0 | 1 => Ok(data),
        2 => {
            warn!("TIFF predictor is not supported, passing data through");

            Ok(data)
        }
        _ => {
            if params.bits_per_component != 8 {
                warn!(
                    "PNG predictor with {} bits per component is not supported",
                    params.bits_per_component
                );

                return Ok(data);
            }

            apply_png_predictor(data, params)
        }
    }
}

fn apply_png_predictor(data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>> {
    use itertools::izip;

    let row_len = params.row_length_in_bytes();
    // Each encoded row leads with the predictor used for it.
    let total_row_len = row_len + 1;
    let num_rows = data.len() / total_row_len;

    if num_rows * total_row_len != data.len() {
        return Err(Error::DecoderCorrupt);
    }

    let colors = params.colors as usize;
    let zero_row = vec![0u8; row_len];

    let mut out = vec![0u8; num_rows * row_len];
    let mut prev_row_start = None;

    for row in 0..num_rows {
        let in_row = &data[row * total_row_len..(row + 1) * total_row_len];
        let predictor = in_row[0];
        let in_data = &in_row[1..];

        let (before, out_tail) = out.split_at_mut(row * row_len);
        let out_row = &mut out_tail[..row_len];
        let prev_row: &[u8] = match prev_row_start {
            Some(start) => &before[start..start + row_len],
            None => &zero_row,
        };

        let mut prev_col = vec![0u8; colors];
        let mut top_left = vec![0u8; colors];

        match predictor {
            0 => out_row.copy_from_slice(in_data),
            1..=4 => {
                for (in_px, prev_px, out_px) in izip!(
                    in_data.chunks(colors),
                    prev_row.chunks(colors),
                    out_row.chunks_mut(colors)
                ) {
                    for (i, (cur, up)) in in_px.iter().zip(prev_px.iter()).enumerate() {
                        out_px[i] = match predictor {
                            1 => cur.wrapping_add(prev_col[i]),
                            2 => cur.wrapping_add(*up),
                            3 => cur
                                .wrapping_add(((prev_col[i] as u16 + *up as u16) / 2) as u8),
                            _ => cur.wrapping_add(paeth(prev_col[i], *up, top_left[i])),
                        };
                    }

                    prev_col[..in_px.len()].copy_from_slice(&out_px[..in_px.len()]);
                    top_left[..prev_px.len()].copy_from_slice(prev_px);
                }
            }
            _ => return Err(Error::DecoderCorrupt),
        }

        prev_row_start = Some(row * row_len);
    }

    Ok(out)
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let a = left as i16;
    let b = up as i16;
    let c = up_left as i16;

    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Array;

    #[test]
    fn ascii_hex_pairs() {
        assert_eq!(ascii_hex(b"48 65 6C 6C 6F>").unwrap(), b"Hello");
        assert_eq!(ascii_hex(b"7>").unwrap(), vec![0x70]);
        assert!(ascii_hex(b"4G>").is_err());
    }

    #[test]
    fn ascii_85_groups() {
        assert_eq!(ascii_85(b"87cUR~>").unwrap(), b"Hell");
        assert_eq!(ascii_85(b"z~>").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(ascii_85(b"87cUs~>").unwrap()[..3], b"Hel"[..]);
    }

    #[test]
    fn run_length_runs() {
        let input = vec![4, 10, 11, 12, 13, 14, 253, 3, 128];
        assert_eq!(
            run_length(&input).unwrap(),
            vec![10, 11, 12, 13, 14, 3, 3, 3, 3]
        );
    }

    #[test]
    fn run_length_truncated_literal() {
        assert!(run_length(&[4, 1, 2]).is_err());
    }

    #[test]
    fn flate_zlib_and_raw() {
        let input = [
            0x78, 0x9c, 0xf3, 0x48, 0xcd, 0xc9, 0xc9, 0x07, 0x00, 0x05, 0x8c, 0x01, 0xf5,
        ];
        assert_eq!(flate(&input).unwrap(), b"Hello");

        let raw = [0xf3, 0x48, 0xcd, 0xc9, 0xc9, 0x07, 0x00];
        assert_eq!(flate(&raw).unwrap(), b"Hello");
    }

    #[test]
    fn lzw_stream() {
        let input = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        assert_eq!(
            lzw(&input, true).unwrap(),
            vec![45, 45, 45, 45, 45, 65, 45, 45, 45, 66]
        );
    }

    fn predictor_expected() -> Vec<u8> {
        vec![
            127, 127, 127, 125, 129, 127, 123, 130, 128, //
            128, 129, 126, 126, 132, 124, 121, 127, 126, //
            131, 130, 122, 133, 129, 128, 127, 100, 126,
        ]
    }

    fn predictor_test(predictor: u8, input: &[u8]) {
        let params = PredictorParams {
            predictor,
            colors: 3,
            bits_per_component: 8,
            columns: 3,
        };

        assert_eq!(
            apply_predictor(input.to_vec(), &params).unwrap(),
            predictor_expected()
        );
    }

    #[test]
    fn predictor_none() {
        let mut rows = Vec::new();
        for row in predictor_expected().chunks(9) {
            rows.push(0);
            rows.extend_from_slice(row);
        }
        predictor_test(10, &rows);
    }

    #[test]
    fn predictor_up() {
        predictor_test(
            12,
            &[
                2, 127, 127, 127, 125, 129, 127, 123, 130, 128, //
                2, 1, 2, 255, 1, 3, 253, 254, 253, 254, //
                2, 3, 1, 252, 7, 253, 4, 6, 229, 0,
            ],
        );
    }

    #[test]
    fn predictor_sub() {
        predictor_test(
            11,
            &[
                1, 127, 127, 127, 254, 2, 0, 254, 1, 1, //
                1, 128, 129, 126, 254, 3, 254, 251, 251, 2, //
                1, 131, 130, 122, 2, 255, 6, 250, 227, 254,
            ],
        );
    }

    #[test]
    fn predictor_paeth() {
        predictor_test(
            14,
            &[
                4, 127, 127, 127, 254, 2, 0, 254, 1, 1, //
                4, 1, 2, 255, 1, 3, 254, 254, 251, 2, //
                4, 3, 1, 252, 5, 253, 6, 1, 229, 254,
            ],
        );
    }

    #[test]
    fn chain_applies_all_but_terminal() {
        let payload = b"raw pixel bytes".to_vec();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&payload, 6);

        let dict = Dict::from_entries([(
            FILTER,
            Object::Array(Array::from_objects([
                Object::name("FlateDecode"),
                Object::name("DCTDecode"),
            ])),
        )]);
        let stream = Stream::new(dict, compressed);

        let (data, terminal, _) = stream.image_data().unwrap();
        assert_eq!(&*data, payload.as_slice());
        assert_eq!(terminal.unwrap().as_str(), "DCTDecode");
    }

    #[test]
    fn terminal_flate_is_left_encoded() {
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(b"pixels", 6);

        let dict = Dict::from_entries([(FILTER, Object::name("FlateDecode"))]);
        let stream = Stream::new(dict, compressed.clone());

        let (data, terminal, _) = stream.image_data().unwrap();
        assert_eq!(&*data, compressed.as_slice());
        assert_eq!(terminal.unwrap().as_str(), "FlateDecode");
    }

    #[test]
    fn non_image_terminal_is_fully_decoded() {
        let dict = Dict::from_entries([(FILTER, Object::name("ASCIIHexDecode"))]);
        let stream = Stream::new(dict, b"414243>".to_vec());

        let (data, terminal, _) = stream.image_data().unwrap();
        assert_eq!(&*data, b"ABC");
        assert!(terminal.is_none());
    }
}
