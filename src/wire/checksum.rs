//! Fletcher-16 checksum

/// Compute Fletcher-16 over the concatenation of `chunks`.
///
/// Two mod-255 accumulators; the result is `(sum2 << 8) | sum1`. Taking the
/// input in chunks lets callers checksum a header prefix and a payload slice
/// without copying them into one buffer.
pub fn fletcher16(chunks: &[&[u8]]) -> u16 {
    let mut sum1: u16 = 0;
    let mut sum2: u16 = 0;
    for chunk in chunks {
        for &byte in chunk.iter() {
            sum1 = (sum1 + byte as u16) % 255;
            sum2 = (sum2 + sum1) % 255;
        }
    }
    (sum2 << 8) | sum1
}
