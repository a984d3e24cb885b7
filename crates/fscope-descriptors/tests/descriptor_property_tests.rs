use fscope_descriptors::{parse_descriptors, FieldKind};
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    // Keep identifiers small and compatible with the descriptor grammar.
    proptest::string::string_regex("[a-z_][a-z0-9_]{0,12}").unwrap()
}

fn kind() -> impl Strategy<Value = FieldKind> {
    prop_oneof![
        Just(FieldKind::Char),
        Just(FieldKind::UChar),
        Just(FieldKind::Short),
        Just(FieldKind::UShort),
        Just(FieldKind::Long),
        Just(FieldKind::ULong),
    ]
}

fn field_line() -> impl Strategy<Value = (FieldKind, String, usize)> {
    (kind(), ident(), 1usize..=32)
}

proptest! {
    /// Offsets are always the running sum of the preceding field sizes, and
    /// the struct size is the total.
    #[test]
    fn offsets_are_running_size_sums(fields in proptest::collection::vec(field_line(), 1..16)) {
        let mut text = String::from("struct generated {\n");
        for (kind, name, count) in &fields {
            if *count == 1 {
                text.push_str(&format!("\t{} {};\n", kind.keyword(), name));
            } else {
                text.push_str(&format!("\t{} {}[{}];\n", kind.keyword(), name, count));
            }
        }
        text.push_str("}\n");

        let structs = parse_descriptors(&text).expect("generated descriptor parses");
        prop_assert_eq!(structs.len(), 1);
        let desc = &structs[0];
        prop_assert_eq!(desc.fields.len(), fields.len());

        let mut expected_offset = 0usize;
        for (parsed, (kind, _, count)) in desc.fields.iter().zip(&fields) {
            prop_assert_eq!(parsed.offset, expected_offset);
            prop_assert_eq!(parsed.kind, *kind);
            prop_assert_eq!(parsed.count, *count);
            expected_offset += kind.width() * count;
        }
        prop_assert_eq!(desc.size(), expected_offset);
    }

    /// Scalar write-then-read round-trips modulo field width.
    #[test]
    fn scalar_round_trip(kind in kind(), value in any::<u64>()) {
        let field = fscope_descriptors::FieldDescriptor {
            name: "v".to_string(),
            kind,
            count: 1,
            offset: 3,
        };
        let mut buf = vec![0u8; 16];
        prop_assert!(field.write_scalar(&mut buf, value));
        let mask = if kind.width() == 8 { u64::MAX } else { (1u64 << (8 * kind.width())) - 1 };
        prop_assert_eq!(field.read_scalar(&buf), Some(value & mask));
    }
}
