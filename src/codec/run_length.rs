//! RunLengthDecode as a terminal image filter.

use crate::error::{Error, Result};
use crate::filter;
use crate::pitch;

use super::BufferDecoder;

pub(crate) fn create(
    data: &[u8],
    width: u32,
    height: u32,
    n_components: u32,
    bpc: u32,
) -> Result<BufferDecoder> {
    let decoded = filter::run_length(data)?;
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

    #[test]
    fn runs_become_rows() {
        // 4 literal bytes, then a run of 4 zeros.
        let encoded = vec![3, 1, 2, 3, 4, 253, 0, 128];

        let mut decoder = create(&encoded, 4, 2, 1, 8).unwrap();
        assert_eq!(decoder.scanline(0), Some(&[1, 2, 3, 4][..]));
        assert_eq!(decoder.scanline(1), Some(&[0, 0, 0, 0][..]));
    }
}
