use proptest::prelude::*;
use qsnap_binary::{read_value, write_value, BinaryError, BinaryStream};
use qsnap_types::{
    BaseType, Cardinality, DirectedPair, Duration, Pair, Point, Record, Scalar, Value,
};

const CONCRETE: [BaseType; 10] = [
    BaseType::Identifier,
    BaseType::Boolean,
    BaseType::Integer,
    BaseType::Float,
    BaseType::String,
    BaseType::Point,
    BaseType::Pair,
    BaseType::DirectedPair,
    BaseType::Duration,
    BaseType::Uri,
];

fn ident() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_-]{0,8}"
}

fn scalar(bt: BaseType) -> BoxedStrategy<Scalar> {
    match bt {
        BaseType::Boolean => any::<bool>().prop_map(Scalar::Boolean).boxed(),
        BaseType::Integer => any::<i32>().prop_map(Scalar::Integer).boxed(),
        BaseType::Float => (-1.0e12f64..1.0e12).prop_map(Scalar::Float).boxed(),
        BaseType::String => "\\PC{0,24}".prop_map(Scalar::String).boxed(),
        BaseType::Identifier => ident().prop_map(Scalar::Identifier).boxed(),
        BaseType::Uri => "https://[a-z]{1,8}\\.test/[a-z0-9/]{0,12}"
            .prop_map(Scalar::Uri)
            .boxed(),
        BaseType::Duration => (0u64..100_000_000)
            .prop_map(|secs| Scalar::Duration(Duration::from_seconds(secs)))
            .boxed(),
        BaseType::Point => (any::<u16>(), any::<u16>())
            .prop_map(|(x, y)| Scalar::Point(Point::new(x, y)))
            .boxed(),
        BaseType::Pair => (ident(), ident())
            .prop_map(|(a, b)| Scalar::Pair(Pair::new(a, b)))
            .boxed(),
        BaseType::DirectedPair => (ident(), ident())
            .prop_map(|(a, b)| Scalar::DirectedPair(DirectedPair::new(a, b)))
            .boxed(),
        BaseType::IntOrIdentifier => prop_oneof![
            any::<i32>().prop_map(Scalar::Integer),
            ident().prop_map(Scalar::Identifier),
        ]
        .boxed(),
    }
}

fn base_type() -> impl Strategy<Value = BaseType> {
    let mut all = CONCRETE.to_vec();
    all.push(BaseType::IntOrIdentifier);
    prop::sample::select(all)
}

fn record() -> impl Strategy<Value = Record> {
    let entry = prop::sample::select(CONCRETE.to_vec())
        .prop_flat_map(|bt| prop::option::of(scalar(bt)));
    prop::collection::vec((ident(), entry), 0..6).prop_map(|entries| entries.into_iter().collect())
}

/// A declaration together with a value (possibly absent) that conforms to it.
fn declared_value() -> impl Strategy<Value = (Cardinality, Option<BaseType>, Option<Value>)> {
    prop_oneof![
        base_type().prop_flat_map(|bt| {
            prop::option::of(scalar(bt))
                .prop_map(move |v| (Cardinality::Single, Some(bt), v.map(Value::Single)))
        }),
        (base_type(), any::<bool>()).prop_flat_map(|(bt, ordered)| {
            prop::option::of(prop::collection::vec(prop::option::of(scalar(bt)), 0..8)).prop_map(
                move |items| {
                    if ordered {
                        (Cardinality::Ordered, Some(bt), items.map(Value::Ordered))
                    } else {
                        (Cardinality::Multiple, Some(bt), items.map(Value::Multiple))
                    }
                },
            )
        }),
        prop::option::of(record())
            .prop_map(|r| (Cardinality::Record, None, r.map(Value::Record))),
    ]
}

proptest! {
    #[test]
    fn values_round_trip((cardinality, base_type, value) in declared_value()) {
        let mut stream = BinaryStream::new();
        write_value(&mut stream, cardinality, base_type, value.as_ref()).unwrap();
        stream.rewind();
        let decoded = read_value(&mut stream, cardinality, base_type).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn every_truncation_underflows((cardinality, base_type, value) in declared_value()) {
        let mut stream = BinaryStream::new();
        write_value(&mut stream, cardinality, base_type, value.as_ref()).unwrap();
        let bytes = stream.into_inner();
        for len in 0..bytes.len() {
            let mut prefix = BinaryStream::from_bytes(&bytes[..len]);
            let res = read_value(&mut prefix, cardinality, base_type);
            prop_assert!(
                matches!(res, Err(BinaryError::Underflow { .. })),
                "prefix {} gave {:?}",
                len,
                res
            );
            prop_assert_eq!(prefix.position(), 0);
        }
    }

    #[test]
    fn values_are_self_delimiting(
        (c1, b1, v1) in declared_value(),
        (c2, b2, v2) in declared_value(),
    ) {
        let mut stream = BinaryStream::new();
        write_value(&mut stream, c1, b1, v1.as_ref()).unwrap();
        write_value(&mut stream, c2, b2, v2.as_ref()).unwrap();
        stream.rewind();
        prop_assert_eq!(read_value(&mut stream, c1, b1).unwrap(), v1);
        prop_assert_eq!(read_value(&mut stream, c2, b2).unwrap(), v2);
    }
}

#[test]
fn absent_value_overrides_any_previous_content() {
    // A single integer that held 45 in memory but was persisted as absent.
    let mut stream = BinaryStream::from_bytes(vec![0x01]);
    assert_eq!(
        read_value(&mut stream, Cardinality::Single, Some(BaseType::Integer)).unwrap(),
        None
    );
}

#[test]
fn string_boundary() {
    let bt = Some(BaseType::String);
    let fits = Value::Single(Scalar::String("x".repeat(65_535)));
    let mut stream = BinaryStream::new();
    write_value(&mut stream, Cardinality::Single, bt, Some(&fits)).unwrap();
    assert_eq!(stream.len(), 2 + 2 + 65_535);

    let too_long = Value::Single(Scalar::String("x".repeat(65_536)));
    let mut stream = BinaryStream::new();
    assert_eq!(
        write_value(&mut stream, Cardinality::Single, bt, Some(&too_long)),
        Err(BinaryError::Truncation { len: 65_536 })
    );
    assert!(stream.is_empty());
}

#[test]
fn record_key_boundary() {
    let mut record = Record::new();
    record.insert("k".repeat(65_536), None);
    let mut stream = BinaryStream::new();
    assert_eq!(
        write_value(&mut stream, Cardinality::Record, None, Some(&Value::Record(record))),
        Err(BinaryError::Truncation { len: 65_536 })
    );
}
