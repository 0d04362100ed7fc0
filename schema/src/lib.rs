//! Runtime support for the Idol binary message format.
//!
//! An encoded message is a contiguous byte buffer: a fixed header, a table of
//! 8-byte per-field thunks, and an 8-byte-aligned indirect data region. This
//! crate provides the encoder ([`MessageBuilder`] plus per-field builders),
//! the validating decoder ([`Message`]), and zero-copy typed views over the
//! data region ([`Uint32Array`], [`TextArray`], [`MessageArray`], ...).
//!
//! ```
//! use idol_schema::{encode_message, Message, Uint32FieldBuilder};
//!
//! let mut field = Uint32FieldBuilder::default();
//! field.set(0x0403_0201);
//! let mut buf = Vec::new();
//! encode_message(&[(1, &field)], &mut buf);
//!
//! let msg = Message::new(&buf).unwrap();
//! assert!(msg.has(1));
//! assert_eq!(msg.get_u32(1), 0x0403_0201);
//! ```

pub mod arrays;
pub mod builders;
pub mod message;

pub use arrays::*;
pub use builders::*;
pub use message::*;

/// Upper bound on the size of a single encoded message, in bytes.
pub const MAX_MESSAGE_SIZE: u32 = 0x7FF0_0000;

/// A `text` value: UTF-8, no interior NUL. The trailing NUL present on the
/// wire is not part of the value.
pub type Text<'a> = &'a str;

/// An `asciz` value: the stored bytes *include* the single trailing NUL.
pub type Asciz<'a> = &'a str;

pub(crate) fn le_u16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

pub(crate) fn le_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

pub(crate) fn le_u64(buf: &[u8]) -> u64 {
    u64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Rounds a payload size up to the next multiple of 8.
pub(crate) fn padded_size(size: u32) -> u32 {
    (size + 0b111) & 0xFFFF_FFF8
}
