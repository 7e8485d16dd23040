//! CCITTFaxDecode (Group 3/4) as a terminal image filter.

use fax::decoder;
use log::warn;

use crate::error::{Error, Result};
use crate::object::keys::*;
use crate::object::Dict;

use super::BufferDecoder;

/// Decode the fax stream into packed 1-bit rows.
pub(crate) fn create(data: &[u8], height: u32, params: &Dict) -> Result<BufferDecoder> {
    let k = params.get::<i32>(K).unwrap_or(0);
    let columns = params.get::<i64>(COLUMNS).unwrap_or(1728).clamp(1, 0xFFFF) as u32;
    let rows = params.get::<u32>(ROWS).unwrap_or(0);
    let black_is_1 = params.get::<bool>(BLACK_IS_1).unwrap_or(false);

    if params.get::<bool>(ENCODED_BYTE_ALIGN).unwrap_or(false) {
        warn!("EncodedByteAlign is not supported, rows may misalign");
    }
    if params.get::<bool>(END_OF_LINE).unwrap_or(false) {
        warn!("EndOfLine markers are not enforced");
    }

    let max_rows = if rows > 0 { rows } else { height };
    let row_bytes = (columns as usize + 7) / 8;

    let mut output: Vec<u8> = Vec::new();
    let mut decoded_rows = 0u32;

    let mut push_row = |transitions: &[u16]| {
        if decoded_rows < max_rows {
            output.extend(transitions_to_row(transitions, columns as usize, black_is_1));
            decoded_rows += 1;
        }
    };

    let status = if k < 0 {
        decoder::decode_g4(
            data.iter().copied(),
            columns as u16,
            u16::try_from(max_rows).ok(),
            &mut push_row,
        )
    } else {
        if k > 0 {
            warn!("mixed two-dimensional fax data is decoded as Group 3 one-dimensional");
        }

        decoder::decode_g3(data.iter().copied(), &mut push_row)
    };

    // Keep whatever decoded before a stream error; an entirely empty result
    // means the stream never was fax data.
    if status.is_none() && output.is_empty() {
        return Err(Error::DecoderInit);
    }

    let produced = (output.len() / row_bytes) as u32;

    Ok(BufferDecoder::new(
        output,
        columns,
        produced.min(height),
        1,
        1,
        row_bytes as u32,
    ))
}

/// Expand color-change positions into a packed row. Runs alternate starting
/// with white; `black_is_1` selects which color maps to a set bit.
fn transitions_to_row(transitions: &[u16], columns: usize, black_is_1: bool) -> Vec<u8> {
    let row_bytes = (columns + 7) / 8;

    // Fill with the white value, then paint the black runs.
    let mut row = if black_is_1 {
        vec![0u8; row_bytes]
    } else {
        vec![0xFFu8; row_bytes]
    };

    let mut paint_black = |from: usize, to: usize| {
        for px in from..to.min(columns) {
            let byte = px / 8;
            let bit = 7 - px % 8;

            if black_is_1 {
                row[byte] |= 1 << bit;
            } else {
                row[byte] &= !(1 << bit);
            }
        }
    };

    let mut is_black = false;
    let mut start = 0usize;

    for &t in transitions {
        let t = t as usize;

        if is_black {
            paint_black(start, t);
        }

        is_black = !is_black;
        start = t;
    }

    if is_black {
        paint_black(start, columns);
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_paint_black_runs() {
        // White 0-2, black 3-4, white 5-7.
        let row = transitions_to_row(&[3, 5], 8, false);
        assert_eq!(row, vec![0b1110_0111]);

        let row = transitions_to_row(&[3, 5], 8, true);
        assert_eq!(row, vec![0b0001_1000]);
    }

    #[test]
    fn trailing_black_run() {
        let row = transitions_to_row(&[4], 8, true);
        assert_eq!(row, vec![0b0000_1111]);
    }

    #[test]
    fn all_white_line() {
        let row = transitions_to_row(&[], 12, false);
        assert_eq!(row, vec![0xFF, 0xFF]);
    }

    #[test]
    fn garbage_fails() {
        let params = Dict::from_entries([(K, crate::object::Object::from(-1))]);
        assert!(create(&[0x00, 0x01, 0x02], 4, &params).is_err());
    }
}
