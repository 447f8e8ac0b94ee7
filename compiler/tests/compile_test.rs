use sigil_compiler::types::DefKind;
use sigil_compiler::value::{decode, encode, Value};
use sigil_compiler::{compile_str, Registry};
use sigil_wire::{WireReader, WireWriter};

fn encode_value(registry: &Registry, name: &str, value: &Value) -> Vec<u8> {
    let def = registry.lookup(name).expect(name);
    let mut writer = WireWriter::new();
    encode(registry, def, value, &mut writer).expect(name);
    writer.data()
}

fn decode_value(registry: &Registry, name: &str, bytes: &[u8]) -> Value {
    let def = registry.lookup(name).expect(name);
    let mut reader = WireReader::new(bytes);
    let value = decode(registry, def, &mut reader).expect(name);
    assert_eq!(reader.index(), bytes.len(), "{} left trailing bytes", name);
    value
}

#[test]
fn shape_schema_compiles_and_round_trips() {
    let registry = compile_str(
        r#"
        ShapeType = enum { ST_NONE ST_LINE ST_POLYGON }
        Coord = struct { float64 x float64 y }
        Line = struct { Coord from Coord to }
        Polygon = array(Coord point)
        Shape = union(ShapeType shape_type) {
            ST_LINE:    Line    line
            ST_POLYGON: Polygon polygon
            ST_NONE:    void
        }
        Drawing = struct {
            astring title
            opt astring author
            Shape shape
        }
        "#,
        "shapes.tgr",
    )
    .unwrap();

    match &registry.get(registry.lookup("Shape").unwrap()).kind {
        DefKind::Union { arms, .. } => {
            assert_eq!(arms.len(), 3);
            assert_eq!(arms[2].value, "ST_NONE");
            assert_eq!(arms[2].name, None);
        }
        kind => panic!("not a union: {:?}", kind),
    }

    let drawing = Value::Struct(vec![
        ("title".to_string(), Value::Str("doodle".to_string())),
        ("author".to_string(), Value::Str("me".to_string())),
        (
            "shape".to_string(),
            Value::Union {
                discr: 2,
                value: Some(Box::new(Value::Array(vec![
                    Value::Struct(vec![
                        ("x".to_string(), Value::Float(0.0)),
                        ("y".to_string(), Value::Float(0.0)),
                    ]),
                    Value::Struct(vec![
                        ("x".to_string(), Value::Float(1.0)),
                        ("y".to_string(), Value::Float(2.5)),
                    ]),
                ]))),
            },
        ),
    ]);
    let bytes = encode_value(&registry, "Drawing", &drawing);
    assert_eq!(decode_value(&registry, "Drawing", &bytes), drawing);

    // Omitting the optional author drops it from both wire and value.
    let anonymous = Value::Struct(vec![
        ("title".to_string(), Value::Str("doodle".to_string())),
        (
            "shape".to_string(),
            Value::Union {
                discr: 0,
                value: None,
            },
        ),
    ]);
    let bytes = encode_value(&registry, "Drawing", &anonymous);
    assert_eq!(decode_value(&registry, "Drawing", &bytes), anonymous);
}

#[test]
fn enum_width_follows_the_largest_value() {
    let narrow = compile_str("E = enum { A B C = 255 }", "t.tgr").unwrap();
    let wide = compile_str("E = enum { A B = 256 }", "t.tgr").unwrap();

    assert_eq!(encode_value(&narrow, "E", &Value::Int(255)), vec![255]);
    assert_eq!(encode_value(&wide, "E", &Value::Int(256)), vec![1, 0]);
    // Even small values of a wide enum take the full width.
    assert_eq!(encode_value(&wide, "E", &Value::Int(0)), vec![0, 0]);
}

#[test]
fn alias_chains_are_wire_equivalent_to_their_base() {
    let registry = compile_str("C = int32\nB = C\nA = B", "t.tgr").unwrap();
    let direct = encode_value(&registry, "int32", &Value::Int(-7));
    for name in ["A", "B", "C"] {
        assert_eq!(encode_value(&registry, name, &Value::Int(-7)), direct);
        assert_eq!(decode_value(&registry, name, &direct), Value::Int(-7));
    }
}

#[test]
fn every_kind_round_trips() {
    let registry = compile_str(
        r#"
        Flag = enum { F_OFF F_ON }
        Pair = struct { int16 a uint64 b }
        Pairs = array(Pair pair)
        Record = struct {
            bool ok
            float32 ratio
            wstring note
            Flag flag
            Pairs pairs
            opt int8 hint
        }
        "#,
        "t.tgr",
    )
    .unwrap();

    let record = Value::Struct(vec![
        ("ok".to_string(), Value::Bool(true)),
        ("ratio".to_string(), Value::Float(0.25)),
        ("note".to_string(), Value::Str("größe".to_string())),
        ("flag".to_string(), Value::Int(1)),
        (
            "pairs".to_string(),
            Value::Array(vec![Value::Struct(vec![
                ("a".to_string(), Value::Int(-300)),
                ("b".to_string(), Value::Int(12)),
            ])]),
        ),
        ("hint".to_string(), Value::Int(-1)),
    ]);
    let bytes = encode_value(&registry, "Record", &record);
    assert_eq!(decode_value(&registry, "Record", &bytes), record);
}

#[test]
fn definitions_keep_schema_order() {
    let registry = compile_str("B = int32\nA = B\nC = enum { X }", "t.tgr").unwrap();
    let names: Vec<&str> = registry
        .iter()
        .filter(|(_, d)| !d.builtin)
        .map(|(_, d)| d.name.as_str())
        .collect();
    assert_eq!(names, vec!["B", "A", "C"]);
}

#[test]
fn error_positions_point_at_the_offending_token() {
    let err = compile_str("Foo = struct { void x }", "schema.tgr").unwrap_err();
    assert_eq!(
        err.to_string(),
        "schema.tgr:1:16: can not have void as structure element."
    );

    let err = compile_str("X = struct { opt opt int8 y }", "schema.tgr").unwrap_err();
    assert_eq!(
        err.to_string(),
        "schema.tgr:1:18: duplicate \"opt\" modifier."
    );

    let err = compile_str("A = int32\nB = Unknown\n", "schema.tgr").unwrap_err();
    assert_eq!(
        err.to_string(),
        "schema.tgr:2:5: unknown base type \"Unknown\"."
    );
}

#[test]
fn linemarkers_relocate_diagnostics() {
    let text = concat!(
        "# 1 \"top.tgr\"\n",
        "A = int32\n",
        "# 1 \"inc.tgr\" 1\n",
        "B = Unknown\n",
    );
    let err = compile_str(text, "top.tgr").unwrap_err();
    assert_eq!(err.to_string(), "inc.tgr:1:5: unknown base type \"Unknown\".");
}

#[test]
fn included_definitions_are_usable_from_the_top_level() {
    let text = concat!(
        "# 1 \"top.tgr\"\n",
        "# 1 \"common.tgr\" 1\n",
        "Id = uint32\n",
        "# 2 \"top.tgr\" 2\n",
        "User = struct { Id id astring name }\n",
    );
    let registry = compile_str(text, "top.tgr").unwrap();

    let id = registry.get(registry.lookup("Id").unwrap());
    assert_eq!((id.file.as_str(), id.depth), ("common.tgr", 1));
    let user = registry.get(registry.lookup("User").unwrap());
    assert_eq!((user.file.as_str(), user.depth), ("top.tgr", 0));

    let value = Value::Struct(vec![
        ("id".to_string(), Value::Int(9)),
        ("name".to_string(), Value::Str("ada".to_string())),
    ]);
    let bytes = encode_value(&registry, "User", &value);
    assert_eq!(bytes[..4], [0, 0, 0, 9]);
    assert_eq!(decode_value(&registry, "User", &bytes), value);
}
