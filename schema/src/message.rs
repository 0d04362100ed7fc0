use crate::arrays::{
    validate_asciz_array, validate_message_array, validate_text_array, AscizArray, BoolArray,
    Int16Array, Int32Array, Int64Array, Int8Array, MessageArray, TextArray, Uint16Array,
    Uint32Array, Uint64Array, Uint8Array,
};
use crate::{le_u16, le_u32, le_u64, Asciz, Text, MAX_MESSAGE_SIZE};
use thiserror::Error;

/// A structural fault found while validating an encoded message buffer.
///
/// Validation is all-or-nothing: a buffer that fails any check is unusable
/// for every field access.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message buffer is too small ({0} bytes, minimum 8)")]
    TooSmall(usize),

    #[error("message length {0} is not a multiple of 8")]
    Unaligned(usize),

    #[error("message length {0} exceeds maximum message size {MAX_MESSAGE_SIZE}")]
    TooLarge(usize),

    #[error("header size field {header} does not match buffer length {buffer}")]
    SizeMismatch { header: u32, buffer: u32 },

    #[error("header flags must be zero (got {0:#06X})")]
    NonZeroFlags(u16),

    #[error("thunk table overruns the message")]
    ThunkTableOverrun,

    #[error("invalid thunk for tag {0}")]
    InvalidThunk(u16),

    #[error("invalid handle thunk for tag {0}")]
    InvalidHandle(u16),

    #[error("indirect data for tag {0} overruns the message")]
    DataOverrun(u16),

    #[error("non-zero padding after indirect data for tag {0}")]
    NonZeroPadding(u16),

    #[error("indirect data region does not fill the message")]
    TrailingData,

    #[error("invalid dynamic array")]
    InvalidArray,

    #[error("invalid text value (missing or interior NUL terminator)")]
    InvalidText,
}

/// Checks the fixed header and returns the message size.
fn check_header(buf: &[u8]) -> Result<u32, DecodeError> {
    if buf.len() < 8 {
        return Err(DecodeError::TooSmall(buf.len()));
    }
    if buf.len() % 8 != 0 {
        return Err(DecodeError::Unaligned(buf.len()));
    }
    if buf.len() > MAX_MESSAGE_SIZE as usize {
        return Err(DecodeError::TooLarge(buf.len()));
    }
    let message_size = le_u32(&buf[0..4]);
    if message_size as usize != buf.len() {
        return Err(DecodeError::SizeMismatch {
            header: message_size,
            buffer: buf.len() as u32,
        });
    }
    let message_flags = le_u16(&buf[4..6]);
    if message_flags != 0x0000 {
        return Err(DecodeError::NonZeroFlags(message_flags));
    }
    Ok(message_size)
}

/// Walks the thunk table, validating every entry and the data region layout.
fn validate_thunks(buf: &[u8], message_size: u64) -> Result<(), DecodeError> {
    let thunk_count = le_u16(&buf[6..8]) as u64;
    let data_off = 8 + thunk_count * 8;
    if data_off > message_size {
        return Err(DecodeError::ThunkTableOverrun);
    }

    let mut value_off = data_off;
    for tag in 1..=thunk_count {
        let thunk_start = (tag * 8) as usize;
        let thunk = &buf[thunk_start..thunk_start + 8];
        let flags = le_u16(&thunk[2..4]);
        if flags & 0x8000 == 0x0000 {
            if le_u64(thunk) == 0 {
                continue;
            }
            return Err(DecodeError::InvalidThunk(tag as u16));
        }
        if flags & 0x3FFF != 0x0000 {
            return Err(DecodeError::InvalidThunk(tag as u16));
        }
        if flags & 0x4000 == 0x4000 {
            let value_size = le_u32(&thunk[4..8]) as u64;
            let padded_size = (value_size + 0b111) & !0b111;
            if value_off + padded_size > message_size {
                return Err(DecodeError::DataOverrun(tag as u16));
            }
            let pad_start = (value_off + value_size) as usize;
            let pad_end = (value_off + padded_size) as usize;
            if buf[pad_start..pad_end].iter().any(|&pad| pad != 0x00) {
                return Err(DecodeError::NonZeroPadding(tag as u16));
            }
            value_off += padded_size;
            continue;
        }
        let handles = le_u16(&thunk[0..2]);
        if handles > 0 {
            if handles != 1 {
                return Err(DecodeError::InvalidHandle(tag as u16));
            }
            if le_u32(&thunk[4..8]) != 0xFFFF_FFFF {
                return Err(DecodeError::InvalidHandle(tag as u16));
            }
        }
    }

    if value_off != message_size {
        return Err(DecodeError::TrailingData);
    }
    Ok(())
}

/// Rewrites each indirect thunk's first four bytes to hold
/// `(dataOffset >> 3) | (flags << 16)`. Only called on validated buffers.
fn cache_offsets(buf: &mut [u8]) {
    let thunk_count = le_u16(&buf[6..8]) as usize;
    let mut value_off = (8 + thunk_count * 8) as u64;
    for tag in 1..=thunk_count {
        let thunk_start = tag * 8;
        let flags = le_u16(&buf[thunk_start + 2..thunk_start + 4]);
        if flags & 0xC000 != 0xC000 {
            continue;
        }
        let value_size = le_u32(&buf[thunk_start + 4..thunk_start + 8]) as u64;
        let thunk_offset = (value_off as u32 >> 3) | ((flags as u32) << 16);
        buf[thunk_start..thunk_start + 4].copy_from_slice(&thunk_offset.to_le_bytes());
        value_off += (value_size + 0b111) & !0b111;
    }
}

/// Validates `buf` in place and caches each indirect thunk's data offset so
/// later reads through [`Message`] are O(1).
pub fn decode_in_place(buf: &mut [u8]) -> Result<(), DecodeError> {
    let message_size = check_header(buf)?;
    validate_thunks(buf, message_size as u64)?;
    cache_offsets(buf);
    Ok(())
}

/// A validated, read-only view over an encoded message buffer.
///
/// Construction via [`Message::new`] runs the full structural validation; a
/// buffer rejected there is rejected for every field. Accessors borrow from
/// the underlying buffer and never copy.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    buf: &'a [u8],
}

impl<'a> Message<'a> {
    /// Validates `buf` and wraps it. The buffer is not modified; if it was
    /// previously run through [`decode_in_place`], the cached offsets are
    /// used for field reads.
    pub fn new(buf: &'a [u8]) -> Result<Message<'a>, DecodeError> {
        let message_size = check_header(buf)?;
        validate_thunks(buf, message_size as u64)?;
        Ok(Message { buf })
    }

    /// Wraps a buffer that has already been validated, e.g. an element of a
    /// validated message array.
    pub(crate) fn from_validated(buf: &'a [u8]) -> Message<'a> {
        Message { buf }
    }

    /// The underlying buffer.
    pub fn data(&self) -> &'a [u8] {
        self.buf
    }

    /// Total encoded size in bytes, including the header.
    pub fn size(&self) -> u32 {
        le_u32(&self.buf[0..4])
    }

    fn thunk_count(&self) -> u16 {
        le_u16(&self.buf[6..8])
    }

    fn thunk(&self, tag: u16) -> &'a [u8] {
        let start = tag as usize * 8;
        &self.buf[start..start + 8]
    }

    /// Reports whether the field with the given tag is present.
    pub fn has(&self, tag: u16) -> bool {
        if tag == 0 || tag > self.thunk_count() {
            return false;
        }
        self.buf[tag as usize * 8 + 3] != 0x00
    }

    /// The tags of all present fields, in ascending order.
    pub fn present_tags(&self) -> impl Iterator<Item = u16> + 'a {
        let buf = self.buf;
        let thunk_count = self.thunk_count();
        (1..=thunk_count).filter(move |&tag| buf[tag as usize * 8 + 3] != 0x00)
    }

    fn indirect_offset(&self, tag: u16) -> usize {
        // Only the low 28 bits of the thunk's first word hold the cached
        // offset; the upper byte overlays the flags after [`decode_in_place`]
        // rewrites the thunk. Encoders leave the offset bits zero, and a real
        // offset is never zero (the data region starts past the header and
        // thunk table), so a nonzero value means the cache is populated.
        let thunk = self.thunk(tag);
        let cached = le_u32(&thunk[0..4]) & 0x0FFF_FFFF;
        if cached != 0 {
            return (cached as usize) << 3;
        }
        let mut off = 8 + self.thunk_count() as usize * 8;
        for t in 1..tag {
            let th = self.thunk(t);
            if th[3] & 0x40 == 0x00 {
                continue;
            }
            off += crate::padded_size(le_u32(&th[4..8])) as usize;
        }
        off
    }

    /// The raw bytes of an indirect field. Empty for absent or scalar fields.
    pub fn get_indirect(&self, tag: u16) -> &'a [u8] {
        if !self.has(tag) {
            return &[];
        }
        let thunk = self.thunk(tag);
        if thunk[3] & 0x40 == 0x00 {
            return &[];
        }
        let size = le_u32(&thunk[4..8]) as usize;
        if size == 0 {
            return &[];
        }
        let off = self.indirect_offset(tag);
        &self.buf[off..off + size]
    }

    /// An inline scalar value. 0 for absent or indirect fields.
    pub fn get_u32(&self, tag: u16) -> u32 {
        if !self.has(tag) {
            return 0;
        }
        let thunk = self.thunk(tag);
        if thunk[3] & 0x40 != 0x00 {
            return 0;
        }
        le_u32(&thunk[4..8])
    }

    pub fn get_bool(&self, tag: u16) -> bool {
        self.get_u32(tag) == 1
    }

    /// A 64-bit value stored as an 8-byte indirect payload.
    pub fn get_u64(&self, tag: u16) -> u64 {
        let buf = self.get_indirect(tag);
        if buf.len() >= 8 {
            le_u64(buf)
        } else {
            0
        }
    }

    /// A `text` value: the stored bytes minus the trailing NUL.
    pub fn get_text(&self, tag: u16) -> Text<'a> {
        let buf = self.get_indirect(tag);
        if buf.is_empty() {
            return "";
        }
        std::str::from_utf8(&buf[..buf.len() - 1]).unwrap_or("")
    }

    /// An `asciz` value: the stored bytes including the trailing NUL. Absent
    /// fields read as a lone NUL.
    pub fn get_asciz(&self, tag: u16) -> Asciz<'a> {
        let buf = self.get_indirect(tag);
        if buf.is_empty() {
            return "\x00";
        }
        std::str::from_utf8(buf).unwrap_or("\x00")
    }

    pub fn get_bool_array(&self, tag: u16) -> BoolArray<'a> {
        BoolArray::new(self.get_indirect(tag))
    }

    pub fn get_u8_array(&self, tag: u16) -> Uint8Array<'a> {
        Uint8Array::new(self.get_indirect(tag))
    }

    pub fn get_i8_array(&self, tag: u16) -> Int8Array<'a> {
        Int8Array::new(self.get_indirect(tag))
    }

    pub fn get_u16_array(&self, tag: u16) -> Uint16Array<'a> {
        Uint16Array::new(self.get_indirect(tag))
    }

    pub fn get_i16_array(&self, tag: u16) -> Int16Array<'a> {
        Int16Array::new(self.get_indirect(tag))
    }

    pub fn get_u32_array(&self, tag: u16) -> Uint32Array<'a> {
        Uint32Array::new(self.get_indirect(tag))
    }

    pub fn get_i32_array(&self, tag: u16) -> Int32Array<'a> {
        Int32Array::new(self.get_indirect(tag))
    }

    pub fn get_u64_array(&self, tag: u16) -> Uint64Array<'a> {
        Uint64Array::new(self.get_indirect(tag))
    }

    pub fn get_i64_array(&self, tag: u16) -> Int64Array<'a> {
        Int64Array::new(self.get_indirect(tag))
    }

    /// A text array view. The element layout is validated before the view is
    /// returned.
    pub fn get_text_array(&self, tag: u16) -> Result<TextArray<'a>, DecodeError> {
        let buf = self.get_indirect(tag);
        validate_text_array(buf)?;
        Ok(TextArray::new(buf))
    }

    /// An asciz array view. The element layout is validated before the view
    /// is returned.
    pub fn get_asciz_array(&self, tag: u16) -> Result<AscizArray<'a>, DecodeError> {
        let buf = self.get_indirect(tag);
        validate_asciz_array(buf)?;
        Ok(AscizArray::new(buf))
    }

    /// A nested message field, validated. `None` when absent or empty.
    pub fn get_message(&self, tag: u16) -> Result<Option<Message<'a>>, DecodeError> {
        let buf = self.get_indirect(tag);
        if buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(Message::new(buf)?))
    }

    /// A message array view. Every element is validated as a message before
    /// the view is returned.
    pub fn get_message_array<T: From<Message<'a>>>(
        &self,
        tag: u16,
    ) -> Result<MessageArray<'a, T>, DecodeError> {
        let buf = self.get_indirect(tag);
        validate_message_array(buf)?;
        Ok(MessageArray::new(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_short_buffer() {
        assert_eq!(Message::new(&[]).err(), Some(DecodeError::TooSmall(0)));
        assert_eq!(
            Message::new(&[8, 0, 0, 0]).err(),
            Some(DecodeError::TooSmall(4))
        );
    }

    #[test]
    fn reject_unaligned_buffer() {
        let buf = [12u8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            Message::new(&buf[..9]).err(),
            Some(DecodeError::Unaligned(9))
        );
    }

    #[test]
    fn reject_size_mismatch() {
        let buf = [16u8, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            Message::new(&buf).err(),
            Some(DecodeError::SizeMismatch {
                header: 16,
                buffer: 8
            })
        );
    }

    #[test]
    fn reject_nonzero_header_flags() {
        let buf = [8u8, 0, 0, 0, 1, 0, 0, 0];
        assert_eq!(
            Message::new(&buf).err(),
            Some(DecodeError::NonZeroFlags(0x0001))
        );
    }

    #[test]
    fn reject_reserved_thunk_flags() {
        let buf = [
            16u8, 0, 0, 0, 0, 0, 1, 0, //
            0, 0, 0x01, 0x80, 1, 0, 0, 0,
        ];
        assert_eq!(Message::new(&buf).err(), Some(DecodeError::InvalidThunk(1)));
    }

    #[test]
    fn reject_absent_thunk_with_payload_bits() {
        let buf = [
            16u8, 0, 0, 0, 0, 0, 1, 0, //
            0, 0, 0, 0, 7, 0, 0, 0,
        ];
        assert_eq!(Message::new(&buf).err(), Some(DecodeError::InvalidThunk(1)));
    }

    #[test]
    fn reject_nonzero_padding() {
        let buf = [
            24u8, 0, 0, 0, 0, 0, 1, 0, //
            0, 0, 0, 0xC0, 6, 0, 0, 0, //
            b'H', b'e', b'l', b'l', b'o', 0, 0, 1,
        ];
        assert_eq!(
            Message::new(&buf).err(),
            Some(DecodeError::NonZeroPadding(1))
        );
    }

    #[test]
    fn reject_short_data_region() {
        let buf = [
            16u8, 0, 0, 0, 0, 0, 1, 0, //
            0, 0, 0, 0xC0, 16, 0, 0, 0,
        ];
        assert_eq!(Message::new(&buf).err(), Some(DecodeError::DataOverrun(1)));
    }

    #[test]
    fn reject_incomplete_data_region() {
        let buf = [
            24u8, 0, 0, 0, 0, 0, 1, 0, //
            0, 0, 0, 0x80, 1, 0, 0, 0, //
            0, 0, 0, 0, 0, 0, 0, 0,
        ];
        assert_eq!(Message::new(&buf).err(), Some(DecodeError::TrailingData));
    }

    #[test]
    fn empty_message_is_minimal() {
        let buf = [8u8, 0, 0, 0, 0, 0, 0, 0];
        let msg = Message::new(&buf).unwrap();
        assert_eq!(msg.size(), 8);
        assert!(!msg.has(1));
        assert_eq!(msg.get_u32(1), 0);
        assert_eq!(msg.get_text(1), "");
        assert_eq!(msg.get_asciz(1), "\x00");
    }

    #[test]
    fn handle_thunk_requires_sentinel() {
        let ok = [
            16u8, 0, 0, 0, 0, 0, 1, 0, //
            1, 0, 0, 0x80, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        assert!(Message::new(&ok).is_ok());

        let bad_value = [
            16u8, 0, 0, 0, 0, 0, 1, 0, //
            1, 0, 0, 0x80, 0xFE, 0xFF, 0xFF, 0xFF,
        ];
        assert_eq!(
            Message::new(&bad_value).err(),
            Some(DecodeError::InvalidHandle(1))
        );

        let bad_count = [
            16u8, 0, 0, 0, 0, 0, 1, 0, //
            2, 0, 0, 0x80, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        assert_eq!(
            Message::new(&bad_count).err(),
            Some(DecodeError::InvalidHandle(1))
        );
    }

    #[test]
    fn uncached_indirect_reads_walk_preceding_thunks() {
        // No decode_in_place: the offset bits of every thunk are still zero,
        // so reads must recompute offsets from the preceding thunks.
        let buf = [
            40u8, 0, 0, 0, 0, 0, 2, 0, //
            0, 0, 0, 0xC0, 2, 0, 0, 0, //
            0, 0, 0, 0xC0, 5, 0, 0, 0, //
            1, 2, 0, 0, 0, 0, 0, 0, //
            3, 4, 5, 6, 7, 0, 0, 0,
        ];
        let msg = Message::new(&buf).unwrap();
        assert_eq!(msg.get_indirect(1), &[1, 2]);
        assert_eq!(msg.get_indirect(2), &[3, 4, 5, 6, 7]);
    }

    #[test]
    fn decode_in_place_caches_offsets() {
        let mut buf = vec![
            40u8, 0, 0, 0, 0, 0, 2, 0, //
            0, 0, 0, 0xC0, 2, 0, 0, 0, //
            0, 0, 0, 0xC0, 5, 0, 0, 0, //
            1, 2, 0, 0, 0, 0, 0, 0, //
            3, 4, 5, 6, 7, 0, 0, 0,
        ];
        decode_in_place(&mut buf).unwrap();

        // Tag 1's payload starts at byte 24 (24 >> 3 == 3), tag 2's at 32.
        assert_eq!(le_u32(&buf[8..12]) & 0x0FFF_FFFF, 3);
        assert_eq!(le_u32(&buf[16..20]) & 0x0FFF_FFFF, 4);

        let msg = Message::new(&buf).unwrap();
        assert_eq!(msg.get_indirect(1), &[1, 2]);
        assert_eq!(msg.get_indirect(2), &[3, 4, 5, 6, 7]);
    }
}
