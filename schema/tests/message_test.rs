use idol_schema::{
    decode_in_place, encode, encode_message, message_size, Message, MessageArrayFieldBuilder,
    MessageBuilder, MessageFieldBuilder, TextArrayFieldBuilder, TextFieldBuilder,
    Uint32FieldBuilder, Uint64FieldBuilder,
};

/// A two-field message: `a @1 : u32`, `b @3 : text` (tag 2 unused).
#[derive(Default)]
struct Sample {
    a: Uint32FieldBuilder,
    unused: Uint32FieldBuilder,
    b: TextFieldBuilder,
}

impl Sample {
    fn fields(&self) -> [(u16, &dyn idol_schema::FieldBuilder); 3] {
        [(1, &self.a), (2, &self.unused), (3, &self.b)]
    }
}

impl MessageBuilder for Sample {
    fn size(&self) -> u32 {
        message_size(&self.fields()).0
    }

    fn encode_to(&self, out: &mut Vec<u8>) {
        encode_message(&self.fields(), out);
    }
}

#[test]
fn two_field_layout() {
    let mut builder = Sample::default();
    builder.a.set(0x0403_0201);
    builder.b.set("Hello");

    let buf = encode(&builder);
    assert_eq!(
        buf,
        [
            40, 0, 0, 0, // messageSize
            0, 0, // messageFlags
            3, 0, // thunkCount
            0, 0, 0x00, 0x80, 0x01, 0x02, 0x03, 0x04, // tag 1: scalar
            0, 0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // tag 2: absent
            0, 0, 0x00, 0xC0, 6, 0, 0, 0, // tag 3: indirect, 6 bytes
            b'H', b'e', b'l', b'l', b'o', 0, 0, 0, // "Hello\0" + padding
        ]
    );

    let msg = Message::new(&buf).unwrap();
    assert_eq!(msg.size(), buf.len() as u32);
    assert!(msg.has(1));
    assert!(!msg.has(2));
    assert!(msg.has(3));
    assert_eq!(msg.get_u32(1), 0x0403_0201);
    assert_eq!(msg.get_text(3), "Hello");
}

#[test]
fn decode_in_place_round_trip() {
    let mut builder = Sample::default();
    builder.a.set(7);
    builder.b.set("cached offsets stay readable");

    let mut buf = encode(&builder);
    decode_in_place(&mut buf).unwrap();
    let msg = Message::new(&buf).unwrap();
    assert_eq!(msg.get_u32(1), 7);
    assert_eq!(msg.get_text(3), "cached offsets stay readable");
}

#[test]
fn alignment_invariant() {
    for text in ["", "x", "xy", "seven b", "eight by", "long enough to pad"] {
        let mut builder = Sample::default();
        builder.a.set(1);
        builder.b.set(text);
        let buf = encode(&builder);
        assert_eq!(buf.len() % 8, 0, "text {:?}", text);
        Message::new(&buf).unwrap();
    }
}

/// A message holding every indirect field shape used by the compiled schema.
#[derive(Default)]
struct Outer {
    name: TextFieldBuilder,
    tag64: Uint64FieldBuilder,
    names: TextArrayFieldBuilder,
    child: MessageFieldBuilder<Sample>,
    children: MessageArrayFieldBuilder<Sample>,
}

impl Outer {
    fn fields(&self) -> [(u16, &dyn idol_schema::FieldBuilder); 5] {
        [
            (1, &self.name),
            (2, &self.tag64),
            (3, &self.names),
            (4, &self.child),
            (5, &self.children),
        ]
    }
}

impl MessageBuilder for Outer {
    fn size(&self) -> u32 {
        message_size(&self.fields()).0
    }

    fn encode_to(&self, out: &mut Vec<u8>) {
        encode_message(&self.fields(), out);
    }
}

#[derive(Clone, Copy)]
struct SampleView<'a>(Message<'a>);

impl<'a> From<Message<'a>> for SampleView<'a> {
    fn from(msg: Message<'a>) -> Self {
        SampleView(msg)
    }
}

#[test]
fn nested_messages_round_trip() {
    let mut builder = Outer::default();
    builder.name.set("outer");
    builder.tag64.set(0x0102_0304_0506_0708);
    builder.names.set(&["Hello", "", ", ", "world!"]);

    let mut child = Sample::default();
    child.a.set(11);
    child.b.set("inner");
    builder.child.set(child);

    for value in [21u32, 22] {
        let mut element = Sample::default();
        element.a.set(value);
        builder.children.add(element);
    }

    let buf = encode(&builder);
    assert_eq!(buf.len() % 8, 0);
    let msg = Message::new(&buf).unwrap();

    assert_eq!(msg.get_text(1), "outer");
    assert_eq!(msg.get_u64(2), 0x0102_0304_0506_0708);

    let names = msg.get_text_array(3).unwrap();
    assert_eq!(names.collect(), vec!["Hello", "", ", ", "world!"]);

    let child = msg.get_message(4).unwrap().unwrap();
    assert_eq!(child.get_u32(1), 11);
    assert_eq!(child.get_text(3), "inner");

    let children = msg
        .get_message_array::<SampleView<'_>>(5)
        .unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children.get(0).unwrap().0.get_u32(1), 21);
    assert_eq!(children.get(1).unwrap().0.get_u32(1), 22);
}

#[test]
fn validation_is_all_or_nothing() {
    let mut builder = Outer::default();
    builder.name.set("x");
    let mut buf = encode(&builder);

    // Corrupt the padding after the text payload; the buffer must be
    // rejected before any field is readable.
    let last = buf.len() - 1;
    buf[last] = 0xFF;
    assert!(Message::new(&buf).is_err());
    assert!(decode_in_place(&mut buf.clone()).is_err());
}
