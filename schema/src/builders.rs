//! Per-field builders and the message encoder.
//!
//! A message builder owns one field builder per tag. Each field builder
//! reports whether it is present, how many (padded) bytes it contributes to
//! the indirect data region, and knows how to fill in its 8-byte thunk and
//! stream its payload. [`encode_message`] assembles the header, thunk table,
//! and data region from a tag-ordered field list.

use crate::arrays::TextArray;
use crate::padded_size;

/// Common interface of all per-field builders.
pub trait FieldBuilder {
    /// Absent fields contribute an all-zero thunk and no data.
    fn is_present(&self) -> bool;

    /// Size of this field's indirect payload, padded to a multiple of 8.
    /// Zero for inline scalar fields.
    fn data_size(&self) -> u32 {
        0
    }

    /// Fills in the field's thunk. Only called when the field is present.
    fn put_thunk(&self, thunk: &mut [u8; 8]);

    /// Appends the field's indirect payload, including its zero padding.
    /// Only called when the field is present.
    fn encode_data(&self, out: &mut Vec<u8>) {
        let _ = out;
    }
}

fn put_scalar_thunk(thunk: &mut [u8; 8], value: u32) {
    thunk[2..4].copy_from_slice(&0x8000u16.to_le_bytes());
    thunk[4..8].copy_from_slice(&value.to_le_bytes());
}

fn put_indirect_thunk(thunk: &mut [u8; 8], value_size: u32) {
    thunk[2..4].copy_from_slice(&0xC000u16.to_le_bytes());
    thunk[4..8].copy_from_slice(&value_size.to_le_bytes());
}

fn pad_to_8(out: &mut Vec<u8>, content_size: u32) {
    let padded = padded_size(content_size);
    for _ in content_size..padded {
        out.push(0x00);
    }
}

// Bool {{{

#[derive(Debug, Default, Clone)]
pub struct BoolFieldBuilder {
    value: bool,
}

impl BoolFieldBuilder {
    pub fn get(&self) -> bool {
        self.value
    }

    pub fn set(&mut self, value: bool) {
        self.value = value;
    }
}

impl FieldBuilder for BoolFieldBuilder {
    fn is_present(&self) -> bool {
        self.value
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_scalar_thunk(thunk, 1);
    }
}

// }}}

// Enum {{{

/// Implemented by generated enum types stored as inline scalars.
pub trait EnumScalar: Copy + Default {
    fn to_scalar(self) -> u32;
}

#[derive(Debug, Default, Clone)]
pub struct EnumFieldBuilder<T: EnumScalar> {
    value: T,
}

impl<T: EnumScalar> EnumFieldBuilder<T> {
    pub fn get(&self) -> T {
        self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }
}

impl<T: EnumScalar> FieldBuilder for EnumFieldBuilder<T> {
    fn is_present(&self) -> bool {
        self.value.to_scalar() != 0
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_scalar_thunk(thunk, self.value.to_scalar());
    }
}

// }}}

// Uint16 / Uint32 {{{

#[derive(Debug, Default, Clone)]
pub struct Uint16FieldBuilder {
    value: u16,
}

impl Uint16FieldBuilder {
    pub fn get(&self) -> u16 {
        self.value
    }

    pub fn set(&mut self, value: u16) {
        self.value = value;
    }
}

impl FieldBuilder for Uint16FieldBuilder {
    fn is_present(&self) -> bool {
        self.value != 0
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_scalar_thunk(thunk, self.value as u32);
    }
}

#[derive(Debug, Default, Clone)]
pub struct Uint32FieldBuilder {
    value: u32,
}

impl Uint32FieldBuilder {
    pub fn get(&self) -> u32 {
        self.value
    }

    pub fn set(&mut self, value: u32) {
        self.value = value;
    }
}

impl FieldBuilder for Uint32FieldBuilder {
    fn is_present(&self) -> bool {
        self.value != 0
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_scalar_thunk(thunk, self.value);
    }
}

// }}}

// Uint64 {{{

/// 64-bit values do not fit a thunk's inline slot; they are stored as an
/// 8-byte indirect payload.
#[derive(Debug, Default, Clone)]
pub struct Uint64FieldBuilder {
    value: u64,
}

impl Uint64FieldBuilder {
    pub fn get(&self) -> u64 {
        self.value
    }

    pub fn set(&mut self, value: u64) {
        self.value = value;
    }
}

impl FieldBuilder for Uint64FieldBuilder {
    fn is_present(&self) -> bool {
        self.value != 0
    }

    fn data_size(&self) -> u32 {
        if self.value == 0 {
            0
        } else {
            8
        }
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_indirect_thunk(thunk, 8);
    }

    fn encode_data(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
    }
}

// }}}

// Text {{{

#[derive(Debug, Default, Clone)]
pub struct TextFieldBuilder {
    value: String,
}

impl TextFieldBuilder {
    pub fn get(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: &str) {
        self.value = value.to_owned();
    }
}

impl FieldBuilder for TextFieldBuilder {
    fn is_present(&self) -> bool {
        !self.value.is_empty()
    }

    fn data_size(&self) -> u32 {
        if self.value.is_empty() {
            return 0;
        }
        padded_size(self.value.len() as u32 + 1)
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_indirect_thunk(thunk, self.value.len() as u32 + 1);
    }

    fn encode_data(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.value.as_bytes());
        out.push(0x00);
        pad_to_8(out, self.value.len() as u32 + 1);
    }
}

// }}}

// Uint8Array {{{

#[derive(Debug, Default, Clone)]
pub struct Uint8ArrayFieldBuilder {
    value: Vec<u8>,
}

impl Uint8ArrayFieldBuilder {
    pub fn get(&self) -> &[u8] {
        &self.value
    }

    pub fn set_bytes(&mut self, value: &[u8]) {
        self.value = value.to_vec();
    }

    pub fn extend(&mut self, value: &[u8]) {
        self.value.extend_from_slice(value);
    }
}

impl FieldBuilder for Uint8ArrayFieldBuilder {
    fn is_present(&self) -> bool {
        !self.value.is_empty()
    }

    fn data_size(&self) -> u32 {
        padded_size(self.value.len() as u32)
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_indirect_thunk(thunk, self.value.len() as u32);
    }

    fn encode_data(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value);
        pad_to_8(out, self.value.len() as u32);
    }
}

// }}}

// TextArray {{{

#[derive(Debug, Default, Clone)]
pub struct TextArrayFieldBuilder {
    values: Vec<String>,
    values_size: u32,
}

impl TextArrayFieldBuilder {
    pub fn add(&mut self, value: &str) {
        self.values.push(value.to_owned());
        self.values_size += value.len() as u32 + 1;
    }

    pub fn set(&mut self, values: &[&str]) {
        self.values.clear();
        self.values_size = 0;
        for value in values {
            self.add(value);
        }
    }

    pub fn extend(&mut self, values: TextArray<'_>) {
        for value in values.iter() {
            self.add(value);
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn content_size(&self) -> u32 {
        4 + 4 * self.values.len() as u32 + self.values_size
    }
}

impl FieldBuilder for TextArrayFieldBuilder {
    fn is_present(&self) -> bool {
        !self.values.is_empty()
    }

    fn data_size(&self) -> u32 {
        if self.values.is_empty() {
            return 0;
        }
        padded_size(self.content_size())
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_indirect_thunk(thunk, self.content_size());
    }

    fn encode_data(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.values.len() as u32).to_le_bytes());
        for value in &self.values {
            out.extend_from_slice(&(value.len() as u32 + 1).to_le_bytes());
        }
        for value in &self.values {
            out.extend_from_slice(value.as_bytes());
            out.push(0x00);
        }
        pad_to_8(out, self.content_size());
    }
}

// }}}

// Message {{{

#[derive(Debug, Default, Clone)]
pub struct MessageFieldBuilder<B: MessageBuilder> {
    value: Option<B>,
}

impl<B: MessageBuilder> MessageFieldBuilder<B> {
    pub fn get(&self) -> Option<&B> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut B> {
        self.value.as_mut()
    }

    pub fn set(&mut self, value: B) {
        self.value = Some(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }
}

impl<B: MessageBuilder> FieldBuilder for MessageFieldBuilder<B> {
    fn is_present(&self) -> bool {
        self.value.is_some()
    }

    fn data_size(&self) -> u32 {
        match &self.value {
            Some(value) => value.size(),
            None => 0,
        }
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        if let Some(value) = &self.value {
            put_indirect_thunk(thunk, value.size());
        }
    }

    fn encode_data(&self, out: &mut Vec<u8>) {
        if let Some(value) = &self.value {
            value.encode_to(out);
        }
    }
}

// }}}

// MessageArray {{{

#[derive(Debug, Default, Clone)]
pub struct MessageArrayFieldBuilder<B: MessageBuilder> {
    values: Vec<B>,
}

impl<B: MessageBuilder> MessageArrayFieldBuilder<B> {
    pub fn add(&mut self, value: B) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[B] {
        &self.values
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<B: MessageBuilder> FieldBuilder for MessageArrayFieldBuilder<B> {
    fn is_present(&self) -> bool {
        !self.values.is_empty()
    }

    fn data_size(&self) -> u32 {
        if self.values.is_empty() {
            return 0;
        }
        let mut data_size = 4 + 4 * self.values.len() as u32;
        if self.values.len() & 0x01 == 0x00 {
            data_size += 4;
        }
        for value in &self.values {
            data_size += value.size();
        }
        data_size
    }

    fn put_thunk(&self, thunk: &mut [u8; 8]) {
        put_indirect_thunk(thunk, self.data_size());
    }

    fn encode_data(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.values.len() as u32).to_le_bytes());
        for value in &self.values {
            out.extend_from_slice(&value.size().to_le_bytes());
        }
        if self.values.len() & 0x01 == 0x00 {
            out.extend_from_slice(&[0, 0, 0, 0]);
        }
        for value in &self.values {
            value.encode_to(out);
        }
    }
}

// }}}

/// Accumulates the total size of a message being laid out. Field tags must be
/// reported in ascending order; the data size saturates rather than wrapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageSizeBuilder {
    data_size: u32,
    thunks_len: u16,
}

impl MessageSizeBuilder {
    pub fn scalar(&mut self, tag: u16) {
        self.thunks_len = tag;
    }

    pub fn indirect(&mut self, tag: u16, data_size: u32) {
        self.thunks_len = tag;
        if data_size > 0 {
            self.data_size = self.data_size.saturating_add(data_size);
        }
    }

    /// Total message size and thunk count. A message with no present fields
    /// has size zero: it encodes to nothing.
    pub fn finish(self) -> (u32, u16) {
        if self.thunks_len == 0 {
            return (0, 0);
        }
        let size = 8u64 + self.thunks_len as u64 * 8 + self.data_size as u64;
        (u64::min(size, u32::MAX as u64) as u32, self.thunks_len)
    }
}

/// A complete per-message encoder: typically a struct of field builders.
pub trait MessageBuilder: Default {
    /// Total encoded size in bytes. Zero when no field is present.
    fn size(&self) -> u32;

    /// Appends the encoded message to `out`.
    fn encode_to(&self, out: &mut Vec<u8>);
}

/// Computes `(size, thunkCount)` for a tag-ordered field list.
pub fn message_size(fields: &[(u16, &dyn FieldBuilder)]) -> (u32, u16) {
    let mut sb = MessageSizeBuilder::default();
    for &(tag, field) in fields {
        if !field.is_present() {
            continue;
        }
        let mut thunk = [0u8; 8];
        field.put_thunk(&mut thunk);
        if thunk[3] & 0x40 != 0x00 {
            sb.indirect(tag, field.data_size());
        } else {
            sb.scalar(tag);
        }
    }
    sb.finish()
}

/// Encodes a message from a tag-ordered field list: header, thunk table,
/// then each present field's indirect payload in tag order.
pub fn encode_message(fields: &[(u16, &dyn FieldBuilder)], out: &mut Vec<u8>) {
    let (size, thunk_count) = message_size(fields);
    if thunk_count == 0 {
        return;
    }
    out.reserve(size as usize);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&thunk_count.to_le_bytes());
    for &(tag, field) in fields {
        if tag > thunk_count {
            break;
        }
        let mut thunk = [0u8; 8];
        if field.is_present() {
            field.put_thunk(&mut thunk);
        }
        out.extend_from_slice(&thunk);
    }
    for &(tag, field) in fields {
        if tag > thunk_count {
            break;
        }
        if field.is_present() {
            field.encode_data(out);
        }
    }
}

/// Encodes a builder into a fresh buffer.
pub fn encode<B: MessageBuilder>(builder: &B) -> Vec<u8> {
    let mut out = Vec::with_capacity(builder.size() as usize);
    builder.encode_to(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn scalar_field_thunk() {
        let mut field = Uint32FieldBuilder::default();
        assert!(!field.is_present());
        field.set(0x0403_0201);
        let mut thunk = [0u8; 8];
        field.put_thunk(&mut thunk);
        assert_eq!(thunk, [0, 0, 0x00, 0x80, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn text_field_data() {
        let mut field = TextFieldBuilder::default();
        field.set("Hello");
        assert_eq!(field.data_size(), 8);
        let mut out = Vec::new();
        field.encode_data(&mut out);
        assert_eq!(out, b"Hello\x00\x00\x00");
    }

    #[test]
    fn text_array_field_data() {
        let mut field = TextArrayFieldBuilder::default();
        field.set(&["Hello", "", ", ", "world!"]);
        let mut out = Vec::new();
        field.encode_data(&mut out);
        assert_eq!(
            out,
            [
                4, 0, 0, 0, //
                6, 0, 0, 0, //
                1, 0, 0, 0, //
                3, 0, 0, 0, //
                7, 0, 0, 0, //
                72, 101, 108, 108, 111, 0, //
                0, //
                44, 32, 0, //
                119, 111, 114, 108, 100, 33, 0, //
                0, 0, 0, // final alignment padding
            ]
        );
        assert_eq!(out.len() % 8, 0);
    }

    #[test]
    fn empty_builder_encodes_to_nothing() {
        #[derive(Default)]
        struct Empty {
            a: Uint32FieldBuilder,
        }
        impl MessageBuilder for Empty {
            fn size(&self) -> u32 {
                message_size(&[(1, &self.a)]).0
            }
            fn encode_to(&self, out: &mut Vec<u8>) {
                encode_message(&[(1, &self.a)], out);
            }
        }
        assert_eq!(encode(&Empty::default()), Vec::<u8>::new());
    }

    #[test]
    fn trailing_absent_fields_drop_thunks() {
        let mut a = Uint32FieldBuilder::default();
        a.set(7);
        let b = Uint32FieldBuilder::default();
        let mut out = Vec::new();
        encode_message(&[(1, &a), (2, &b)], &mut out);
        assert_eq!(out.len(), 16);
        let msg = Message::new(&out).unwrap();
        assert!(msg.has(1));
        assert!(!msg.has(2));
    }
}
