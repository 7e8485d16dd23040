//! Checked row-pitch arithmetic.
//!
//! All pitch math is performed in 64 bits and rejected if the result does not
//! fit in a `u32`. Callers must treat `None` as fatal.

/// Number of bytes needed for one packed row of `width` samples with
/// `n_components` components of `bpc` bits each.
pub fn bytes_per_row(bpc: u32, n_components: u32, width: u32) -> Option<u32> {
    let bits = (bpc as u64)
        .checked_mul(n_components as u64)?
        .checked_mul(width as u64)?;

    u32::try_from((bits + 7) / 8).ok()
}

/// Number of bytes in a row of `bpp`-bit pixels, rounded up to a 32-bit
/// boundary.
pub fn bytes_per_row_32aligned(bpp: u32, width: u32) -> Option<u32> {
    let bits = (bpp as u64).checked_mul(width as u64)?;
    let aligned = (bits + 31) / 32 * 4;

    u32::try_from(aligned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_row() {
        assert_eq!(bytes_per_row(8, 3, 2), Some(6));
        assert_eq!(bytes_per_row(1, 1, 8), Some(1));
        assert_eq!(bytes_per_row(1, 1, 9), Some(2));
        assert_eq!(bytes_per_row(4, 1, 3), Some(2));
        assert_eq!(bytes_per_row(16, 3, 1), Some(6));
    }

    #[test]
    fn aligned_row() {
        assert_eq!(bytes_per_row_32aligned(1, 8), Some(4));
        assert_eq!(bytes_per_row_32aligned(8, 1), Some(4));
        assert_eq!(bytes_per_row_32aligned(24, 2), Some(8));
        assert_eq!(bytes_per_row_32aligned(32, 3), Some(12));
    }

    #[test]
    fn overflow_is_rejected() {
        assert_eq!(bytes_per_row(16, u32::MAX, u32::MAX), None);
        assert_eq!(bytes_per_row(16, 4, u32::MAX), None);
        assert_eq!(bytes_per_row_32aligned(32, u32::MAX), None);
    }
}
