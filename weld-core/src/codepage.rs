//! Windows-1251 decoding for the metadata text stands send in WRITE_DATA.

use encoding_rs::WINDOWS_1251;

/// Decode a Windows-1251 byte string. Unmapped bytes become U+FFFD.
pub fn decode_cp1251(bytes: &[u8]) -> String {
    let (text, _had_errors) = WINDOWS_1251.decode_without_bom_handling(bytes);
    text.into_owned()
}
