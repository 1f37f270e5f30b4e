/*!
Small byte-level helpers shared by the binary decoders.
*/

/// Interprets the given slice as a signed 32-bit big endian integer and
/// returns it.
///
/// # Panics
///
/// When `bytes.len() != 4`.
pub(crate) fn from_be_bytes_i32(bytes: &[u8]) -> i32 {
    i32::from_be_bytes(bytes.try_into().unwrap())
}

/// Splits the given slice at `at`, or returns `what` if the slice is too
/// short.
pub(crate) fn try_split_at<'b, E>(
    what: E,
    bytes: &'b [u8],
    at: usize,
) -> Result<(&'b [u8], &'b [u8]), E> {
    if at > bytes.len() {
        Err(what)
    } else {
        Ok(bytes.split_at(at))
    }
}
