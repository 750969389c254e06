use std::sync::OnceLock;

use bytes::Bytes;
use proptest::prelude::*;
use typed_codec::{
    this, Const, ConstructExt, Container, Context, ContextValue, DefaultPolicy, Defaulted, Error,
    FieldSpec, Int16ub, Int8ub, Padding, Pass, Record, RecordAdapter, RecordBuilder,
    RecordDefinition, RecordOptions, RecordValue, Result, Terminated, ToValue, Value,
};

macro_rules! roundtrip {
    ($adapter:expr, $val:expr, $bytes:expr) => {
        assert_eq!($adapter.build(&$val), Ok($bytes.to_vec()));
        assert_eq!($adapter.parse(&$bytes[..]), Ok($val));
    };
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Image {
    #[subcon(Int8ub)]
    width: u8,
    #[subcon(Int8ub)]
    height: u8,
    #[subcon(typed_codec::Bytes::new(this("width") * this("height")))]
    pixels: Bytes,
}

#[test]
fn test_image() {
    let adapter = RecordAdapter::<Image>::new().unwrap();
    let image = Image {
        width: 1,
        height: 2,
        pixels: Bytes::from_static(b"12"),
    };
    roundtrip!(adapter, image.clone(), b"\x01\x02\x31\x32");

    assert!(adapter.sizeof().unwrap_err().is_size_indeterminate());
    assert_eq!(adapter.sizeof_for(&image), Ok(4));
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Frame {
    #[subcon(Int8ub)]
    id: u8,
    #[subcon(RecordAdapter::<Image>::new())]
    image: Image,
}

#[test]
fn test_nested_sizeof_for() {
    let adapter = RecordAdapter::<Frame>::new().unwrap();
    let frame = Frame {
        id: 9,
        image: Image {
            width: 1,
            height: 2,
            pixels: Bytes::from_static(b"12"),
        },
    };
    roundtrip!(adapter, frame.clone(), b"\x09\x01\x02\x31\x32");
    assert_eq!(adapter.sizeof_for(&frame), Ok(5));

    let err = adapter.sizeof().unwrap_err();
    assert!(matches!(
        err,
        Error::SizeIndeterminate { ref path, .. } if path == "(sizeof) -> image -> pixels"
    ));
}

#[test]
fn test_image_pixel_count_checked() {
    let adapter = RecordAdapter::<Image>::new().unwrap();
    let image = Image {
        width: 2,
        height: 2,
        pixels: Bytes::from_static(b"12"),
    };
    assert!(matches!(
        adapter.build(&image),
        Err(Error::Count { expected: 4, found: 2, .. })
    ));
    assert_eq!(
        adapter.parse(b"\x02\x02\x31"),
        Err(Error::InsufficientData(3))
    );
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Pair {
    #[subcon(Int16ub)]
    a: u16,
    #[subcon(Int8ub)]
    b: u8,
}

#[derive(Record, Debug, Clone, PartialEq)]
#[record(reverse)]
struct BackwardsPair {
    #[subcon(Int16ub)]
    a: u16,
    #[subcon(Int8ub)]
    b: u8,
}

#[test]
fn test_field_order() {
    let pair = Pair { a: 1, b: 2 };
    roundtrip!(RecordAdapter::<Pair>::new().unwrap(), pair.clone(), b"\x00\x01\x02");
    roundtrip!(RecordAdapter::<Pair>::reversed().unwrap(), pair, b"\x02\x00\x01");

    let backwards = RecordAdapter::<BackwardsPair>::new().unwrap();
    assert!(backwards.codec().reversed());
    roundtrip!(backwards, BackwardsPair { a: 1, b: 2 }, b"\x02\x00\x01");
    assert_eq!(
        backwards.definition().fields().iter().map(|f| f.name()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );

    // options that leave the order alone keep the declared one
    let marked =
        RecordAdapter::<BackwardsPair>::with_options(RecordOptions::zero().markers(true)).unwrap();
    assert!(marked.codec().reversed());
    assert_eq!(
        marked.codec().names().collect::<Vec<_>>(),
        vec!["@<b", "b", "@>b", "@<a", "a", "@>a"]
    );
    assert_eq!(marked.build(&BackwardsPair { a: 1, b: 2 }), Ok(vec![2, 0, 1]));

    let forward =
        RecordAdapter::<BackwardsPair>::with_options(RecordOptions::zero().reverse(false)).unwrap();
    roundtrip!(forward, BackwardsPair { a: 1, b: 2 }, b"\x00\x01\x02");
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Bitmap {
    #[subcon(Const::new(&b"BMP"[..]))]
    signature: Bytes,
    #[subcon(Int8ub)]
    width: u8,
}

#[test]
fn test_const_excluded_from_construction() {
    let adapter = RecordAdapter::<Bitmap>::new().unwrap();
    let bitmap = RecordBuilder::<Bitmap>::new().set("width", 3u8).build().unwrap();
    assert_eq!(bitmap.signature, Bytes::from_static(b"BMP"));
    roundtrip!(adapter, bitmap.clone(), b"BMP\x03");

    let mut tampered = bitmap;
    tampered.signature = Bytes::from_static(b"BMX");
    assert!(matches!(adapter.build(&tampered), Err(Error::Const { .. })));
    assert!(matches!(adapter.parse(b"BMX\x03"), Err(Error::Const { .. })));
}

#[test]
fn test_constructor_arguments() {
    let err = RecordBuilder::<Bitmap>::new()
        .set("width", 3u8)
        .set("signature", Bytes::from_static(b"BMP"))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Construction { .. }));

    let err = RecordBuilder::<Bitmap>::new().build().unwrap_err();
    assert!(matches!(err, Error::Construction { reason, .. } if reason.contains("width")));

    let err = RecordBuilder::<Bitmap>::new()
        .set("width", 3u8)
        .set("height", 3u8)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Construction { reason, .. } if reason.contains("height")));
}

fn blank_pixels(ctx: &Context) -> Result<Value> {
    let n = ctx.get_int("width")? * ctx.get_int("height")?;
    Ok(Value::Bytes(Bytes::from(vec![0u8; n as usize])))
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Canvas {
    #[subcon(Int8ub)]
    width: u8,
    #[subcon(Int8ub)]
    height: u8,
    #[subcon(Defaulted::new(
        typed_codec::Bytes::new(this("width") * this("height")),
        ContextValue::func(blank_pixels),
    ))]
    pixels: Option<Bytes>,
}

#[test]
fn test_context_dependent_default() {
    let adapter = RecordAdapter::<Canvas>::new().unwrap();
    let pixels = Canvas::definition().unwrap().field("pixels").unwrap();
    assert!(!pixels.init());
    assert_eq!(pixels.default(), None);

    let canvas = RecordBuilder::<Canvas>::new()
        .set("width", 2u8)
        .set("height", 3u8)
        .build()
        .unwrap();
    assert_eq!(canvas.pixels, None);
    let data = adapter.build(&canvas).unwrap();
    assert_eq!(data, vec![2, 3, 0, 0, 0, 0, 0, 0]);

    let parsed = adapter.parse(&data).unwrap();
    assert_eq!(parsed.pixels, Some(Bytes::from(vec![0u8; 6])));
    assert_eq!(adapter.build(&parsed), Ok(data));
}

#[derive(Record, Debug, Clone, PartialEq)]
struct StrictCanvas {
    #[subcon(Int8ub)]
    width: u8,
    #[subcon(Defaulted::new(Int8ub, this("width") * 2), default_policy = DefaultPolicy::LiteralOnly)]
    stride: Option<u8>,
}

#[derive(Record, Debug, Clone, PartialEq)]
struct LiteralDefault {
    #[subcon(Int8ub)]
    width: u8,
    #[subcon(Defaulted::new(Int8ub, Value::Int(7)), default_policy = DefaultPolicy::LiteralOnly)]
    stride: u8,
}

#[test]
fn test_literal_only_default_policy() {
    let err = RecordAdapter::<StrictCanvas>::new().unwrap_err();
    assert!(err.is_type_constraint());
    // the failed definition is cached
    assert_eq!(StrictCanvas::definition().unwrap_err(), err);

    let adapter = RecordAdapter::<LiteralDefault>::new().unwrap();
    let record = RecordBuilder::<LiteralDefault>::new().set("width", 1u8).build().unwrap();
    assert_eq!(record.stride, 7);
    roundtrip!(adapter, record, b"\x01\x07");
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Header {
    #[subcon(Int8ub)]
    version: u8,
    #[subcon(Padding::new(2))]
    _reserved: (),
    #[subcon(Pass)]
    _nothing: (),
    #[subcon(Terminated)]
    _end: (),
}

#[test]
fn test_fields_without_values() {
    let adapter = RecordAdapter::<Header>::new().unwrap();
    let header = RecordBuilder::<Header>::new().set("version", 1u8).build().unwrap();
    roundtrip!(adapter, header.clone(), b"\x01\x00\x00");

    assert_eq!(adapter.parse(b"\x01\x00\x00\x00"), Err(Error::NotTerminated(1)));
    assert!(adapter.sizeof().unwrap_err().is_size_indeterminate());
    assert_eq!(
        Value::Record(RecordValue::new(header)).to_string(),
        "Header: \n    version = 1"
    );
}

fn reject_zero(value: &Value, _ctx: &Context) -> Result<()> {
    match value.as_int() {
        Some(0) => Err(Error::Custom("height must not be zero".to_string())),
        _ => Ok(()),
    }
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Documented {
    /// Number of pixels
    /// per row.
    #[subcon(Int8ub)]
    width: u8,
    #[subcon(Int8ub, doc = "Number of rows.", parsed = reject_zero)]
    height: u8,
}

#[test]
fn test_docs_and_parsed_hook() {
    let definition = Documented::definition().unwrap();
    assert_eq!(
        definition.field("width").unwrap().docs(),
        Some("Number of pixels\nper row.")
    );
    let height = definition.field("height").unwrap();
    assert_eq!(height.docs(), Some("Number of rows."));
    assert!(height.parsed().is_some());
    assert!(height.init());

    let adapter = RecordAdapter::<Documented>::new().unwrap();
    assert_eq!(adapter.parse(b"\x04\x02"), Ok(Documented { width: 4, height: 2 }));
    assert_eq!(
        adapter.parse(b"\x04\x00"),
        Err(Error::Custom("height must not be zero".to_string()))
    );
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Point {
    #[subcon(Int8ub)]
    x: u8,
    #[subcon(Int8ub)]
    y: u8,
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Line {
    #[subcon(RecordAdapter::<Point>::new())]
    start: Point,
    #[subcon(RecordAdapter::<Point>::new())]
    end: Point,
}

#[test]
fn test_nested_records() {
    let line = Line {
        start: Point { x: 1, y: 2 },
        end: Point { x: 3, y: 4 },
    };
    roundtrip!(RecordAdapter::<Line>::new().unwrap(), line.clone(), b"\x01\x02\x03\x04");
    assert_eq!(typed_codec::encode_to_bytes(&line), Ok(vec![1, 2, 3, 4]));
    assert_eq!(typed_codec::decode_from_bytes::<Line>(b"\x01\x02\x03\x04"), Ok(line));
}

#[test]
fn test_encode_wrong_record_type() {
    let adapter = RecordAdapter::<Point>::new().unwrap();
    assert_eq!(
        ConstructExt::build(&adapter, &Point { x: 1, y: 2 }.to_value()),
        Ok(vec![1, 2])
    );

    let err = ConstructExt::build(&adapter, &Pair { a: 1, b: 2 }.to_value()).unwrap_err();
    assert!(err.is_encode_type());
    assert!(ConstructExt::build(&adapter, &Value::Int(1)).unwrap_err().is_encode_type());
}

#[test]
fn test_stream_helpers() {
    let mut out = typed_codec::BuildStream::new();
    typed_codec::encode_to_stream(&Point { x: 1, y: 2 }, &mut out).unwrap();
    typed_codec::encode_to_stream(&Point { x: 3, y: 4 }, &mut out).unwrap();
    let data = out.into_vec();

    let mut stream = typed_codec::ParseStream::new(&data);
    assert_eq!(typed_codec::decode_from_stream(&mut stream), Ok(Point { x: 1, y: 2 }));
    assert_eq!(typed_codec::decode_from_stream(&mut stream), Ok(Point { x: 3, y: 4 }));
    assert!(stream.is_at_end());
}

// Claims the definition of another type.
#[derive(Debug, Clone, PartialEq)]
struct Impostor;

impl Record for Impostor {
    fn definition() -> Result<&'static RecordDefinition> {
        static DEFINITION: OnceLock<RecordDefinition> = OnceLock::new();
        Ok(DEFINITION.get_or_init(|| {
            RecordDefinition::builder::<Point>()
                .field(FieldSpec::new("x", Int8ub).unwrap())
                .finish()
        }))
    }

    fn from_fields(_fields: Container) -> Result<Self> {
        Ok(Impostor)
    }

    fn get_field(&self, name: &str) -> Result<Value> {
        Err(Error::Custom(name.to_string()))
    }

    fn set_field(&mut self, name: &str, _value: Value) -> Result<()> {
        Err(Error::Custom(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Duplicated;

impl Record for Duplicated {
    fn definition() -> Result<&'static RecordDefinition> {
        static DEFINITION: OnceLock<RecordDefinition> = OnceLock::new();
        Ok(DEFINITION.get_or_init(|| {
            RecordDefinition::builder::<Duplicated>()
                .field(FieldSpec::new("a", Int8ub).unwrap())
                .field(FieldSpec::new("a", Int16ub).unwrap())
                .finish()
        }))
    }

    fn from_fields(_fields: Container) -> Result<Self> {
        Ok(Duplicated)
    }

    fn get_field(&self, _name: &str) -> Result<Value> {
        Ok(Value::Int(0))
    }

    fn set_field(&mut self, _name: &str, _value: Value) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_definition_time_rejection() {
    assert!(RecordAdapter::<Impostor>::new().unwrap_err().is_type_constraint());
    assert!(RecordAdapter::<Duplicated>::new().unwrap_err().is_type_constraint());
    let no_extras = RecordAdapter::<Point>::with_options(RecordOptions::zero().pass_through(true));
    assert!(no_extras.unwrap_err().is_type_constraint());
}

#[derive(Record, Debug, Clone, PartialEq)]
struct Tagged {
    #[subcon(Int8ub)]
    a: u8,
    #[subcon(Int16ub)]
    b: u16,
    #[record(extras)]
    extras: Container,
}

#[test]
fn test_position_markers() {
    let options = RecordOptions::zero().markers(true).pass_through(true);
    let adapter = RecordAdapter::<Tagged>::with_options(options).unwrap();
    assert_eq!(
        adapter.codec().names().collect::<Vec<_>>(),
        vec!["@<a", "a", "@>a", "@<b", "b", "@>b"]
    );

    let tagged = adapter.parse(b"\x01\x00\x02").unwrap();
    assert_eq!((tagged.a, tagged.b), (1, 2));
    let offsets: Vec<_> = ["@<a", "@>a", "@<b", "@>b"]
        .iter()
        .map(|k| tagged.extras.get(k).cloned())
        .collect();
    assert_eq!(
        offsets,
        vec![
            Some(Value::Int(0)),
            Some(Value::Int(1)),
            Some(Value::Int(1)),
            Some(Value::Int(3))
        ]
    );
    assert_eq!(adapter.build(&tagged), Ok(vec![1, 0, 2]));

    let plain = RecordAdapter::<Tagged>::new().unwrap().parse(b"\x01\x00\x02").unwrap();
    assert!(plain.extras.is_empty());
}

proptest! {
    #[test]
    fn prop_pair_roundtrip(a in any::<u16>(), b in any::<u8>()) {
        let pair = Pair { a, b };
        for adapter in [RecordAdapter::<Pair>::new().unwrap(), RecordAdapter::<Pair>::reversed().unwrap()] {
            let data = adapter.build(&pair).unwrap();
            let decoded = adapter.parse(&data).unwrap();
            prop_assert_eq!(&decoded, &pair);
            prop_assert_eq!(adapter.build(&decoded).unwrap(), data);
        }
    }

    #[test]
    fn prop_image_roundtrip(width in 0u8..8, height in 0u8..8, seed in any::<u8>()) {
        let pixels: Vec<u8> = (0..width as usize * height as usize)
            .map(|i| seed.wrapping_add(i as u8))
            .collect();
        let image = Image { width, height, pixels: Bytes::from(pixels) };
        let adapter = RecordAdapter::<Image>::new().unwrap();
        let data = adapter.build(&image).unwrap();
        prop_assert_eq!(adapter.sizeof_for(&image).unwrap(), data.len());
        prop_assert_eq!(adapter.parse(&data).unwrap(), image);
    }
}
