//! FlateDecode as a terminal image filter.

use crate::error::{Error, Result};
use crate::filter::{apply_predictor, PredictorParams};
use crate::object::Dict;
use crate::pitch;

use super::BufferDecoder;

/// Inflate the stream and serve it as packed sample rows.
pub(crate) fn create(
    data: &[u8],
    width: u32,
    height: u32,
    n_components: u32,
    bpc: u32,
    params: &Dict,
) -> Result<BufferDecoder> {
    let decoded = miniz_oxide::inflate::decompress_to_vec_zlib(data)
        .or_else(|_| miniz_oxide::inflate::decompress_to_vec(data))
        .map_err(|_| Error::DecoderInit)?;

    let decoded = apply_predictor(decoded, &PredictorParams::from_dict(params))?;

    let row = pitch::bytes_per_row(bpc, n_components, width).ok_or(Error::ArithmeticOverflow)?;

    Ok(BufferDecoder::new(
        decoded,
        width,
        height,
        bpc,
        n_components,
        row,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ScanlineDecoder;
    use crate::object::keys::*;
    use crate::object::Object;

    #[test]
    fn rows_after_inflate() {
        let payload = vec![1u8, 2, 3, 4, 5, 6];
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&payload, 6);

        let mut decoder = create(&compressed, 3, 2, 1, 8, &Dict::empty()).unwrap();
        assert_eq!(decoder.scanline(0), Some(&[1, 2, 3][..]));
        assert_eq!(decoder.scanline(1), Some(&[4, 5, 6][..]));
    }

    #[test]
    fn predictor_rows() {
        // Two 3-byte rows, both Up-predicted.
        let raw = vec![2u8, 10, 20, 30, 2, 1, 1, 1];
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);

        let params = Dict::from_entries([
            (PREDICTOR, Object::from(12)),
            (COLORS, Object::from(3)),
            (COLUMNS, Object::from(1)),
        ]);

        let mut decoder = create(&compressed, 1, 2, 3, 8, &params).unwrap();
        assert_eq!(decoder.scanline(0), Some(&[10, 20, 30][..]));
        assert_eq!(decoder.scanline(1), Some(&[11, 21, 31][..]));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(create(&[0xAA, 0xBB], 1, 1, 1, 8, &Dict::empty()).is_err());
    }
}
