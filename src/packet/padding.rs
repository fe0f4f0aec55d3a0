//! Block padding for fixed-size transport writes.
//!
//! Frames are padded up to the smallest standard block that holds them.
//! Every pad byte carries the pad length (PKCS#7 style), so the pad run is
//! self-describing and `decode` can verify it.

/// Standard block sizes, smallest first.
pub const BLOCK_SIZES: [usize; 4] = [256, 512, 1024, 2048];

/// Smallest block size that fits `len` bytes, if any.
pub fn optimal_block_size(len: usize) -> Option<usize> {
    BLOCK_SIZES.iter().copied().find(|&size| size >= len)
}

/// Pad `buf` in place to the next block size.
///
/// Leaves the buffer untouched when it already fills a block exactly, is
/// larger than the biggest block, or would need more than 255 pad bytes.
pub fn pad(buf: &mut Vec<u8>) {
    let Some(target) = optimal_block_size(buf.len()) else {
        return;
    };
    let needed = target - buf.len();
    if needed == 0 || needed > u8::MAX as usize {
        return;
    }
    buf.resize(target, needed as u8);
}

/// Whether `trailing` is exactly one well-formed pad run.
pub fn is_valid_padding(trailing: &[u8]) -> bool {
    let Some(&last) = trailing.last() else {
        return false;
    };
    last as usize == trailing.len() && trailing.iter().all(|&b| b == last)
}
