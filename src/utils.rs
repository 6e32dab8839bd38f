#[inline(always)]
pub(crate) fn le_u32(d: &[u8]) -> u32 {
    u32::from_le_bytes([d[0], d[1], d[2], d[3]])
}

#[inline(always)]
pub(crate) fn le_u16(d: &[u8]) -> u16 {
    u16::from_le_bytes([d[0], d[1]])
}

/// Renders external attributes as a zero padded, 32 digit binary string so
/// that mode bits line up when compared by eye.
pub(crate) fn attribute_bits(attrs: u32) -> String {
    format!("{:032b}", attrs)
}
