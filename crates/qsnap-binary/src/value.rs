//! Value codec.
//!
//! Layout of one value:
//!
//! ```text
//! null flag u8                      1 = absent, nothing follows
//! Single:    discriminator u8, payload
//! Multiple / Ordered:
//!            reserved u8 (0), count u16,
//!            count x { null flag u8, [discriminator u8, payload] }
//! Record:    reserved u8 (0), count u16,
//!            count x { null flag u8, key string, [base type tag u8, payload] }
//! ```
//!
//! The discriminator only carries information for `IntOrIdentifier` (1 = integer,
//! 0 = identifier). Every other base type writes 1 and ignores it on read.

use qsnap_types::{
    BaseType, Cardinality, DirectedPair, Duration, Pair, Point, Record, Scalar, Value,
};

use crate::error::{BinaryError, Result};
use crate::stream::BinaryStream;

const DISCRIMINATOR_IDENTIFIER: u8 = 0;
const DISCRIMINATOR_INTEGER: u8 = 1;
const CONTAINER_RESERVED: u8 = 0;

/// Append `value` to `stream` as a value declared with `cardinality` and `base_type`.
///
/// On error nothing is appended.
pub fn write_value(
    stream: &mut BinaryStream,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    value: Option<&Value>,
) -> Result<()> {
    let mark = stream.len();
    let res = write_value_inner(stream, cardinality, base_type, value);
    if res.is_err() {
        stream.truncate(mark);
    }
    res
}

/// Read one value declared with `cardinality` and `base_type`.
///
/// On error the cursor is left where the value began.
pub fn read_value(
    stream: &mut BinaryStream,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
) -> Result<Option<Value>> {
    let mark = stream.position();
    let res = read_value_inner(stream, cardinality, base_type);
    if res.is_err() {
        stream.seek_to(mark);
    }
    res
}

fn declared_base_type(cardinality: Cardinality, base_type: Option<BaseType>) -> Result<BaseType> {
    match (cardinality, base_type) {
        (Cardinality::Record, _) => Err(BinaryError::TypeMismatch(
            "record values have no single base type",
        )),
        (_, Some(bt)) => Ok(bt),
        (_, None) => Err(BinaryError::TypeMismatch("declaration has no base type")),
    }
}

fn write_value_inner(
    stream: &mut BinaryStream,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
    value: Option<&Value>,
) -> Result<()> {
    let Some(value) = value else {
        stream.write_u8(1);
        return Ok(());
    };
    if value.cardinality() != cardinality {
        return Err(BinaryError::TypeMismatch("cardinality differs from declaration"));
    }
    if cardinality == Cardinality::Record && base_type.is_some() {
        return Err(BinaryError::TypeMismatch("record declared with a base type"));
    }

    stream.write_u8(0);
    match value {
        Value::Single(scalar) => {
            let bt = declared_base_type(cardinality, base_type)?;
            write_discriminated(stream, bt, scalar)
        }
        Value::Multiple(items) | Value::Ordered(items) => {
            let bt = declared_base_type(cardinality, base_type)?;
            write_container_header(stream, items.len())?;
            for item in items {
                match item {
                    None => stream.write_u8(1),
                    Some(scalar) => {
                        stream.write_u8(0);
                        write_discriminated(stream, bt, scalar)?;
                    }
                }
            }
            Ok(())
        }
        Value::Record(record) => {
            write_container_header(stream, record.len())?;
            for entry in record.iter() {
                stream.write_u8(u8::from(entry.value.is_none()));
                stream.write_string(&entry.key)?;
                if let Some(scalar) = &entry.value {
                    stream.write_u8(scalar.base_type().tag());
                    write_scalar(stream, scalar)?;
                }
            }
            Ok(())
        }
    }
}

fn write_container_header(stream: &mut BinaryStream, len: usize) -> Result<()> {
    let count: u16 = len
        .try_into()
        .map_err(|_| BinaryError::Truncation { len })?;
    stream.write_u8(CONTAINER_RESERVED);
    stream.write_u16(count);
    Ok(())
}

fn write_discriminated(stream: &mut BinaryStream, bt: BaseType, scalar: &Scalar) -> Result<()> {
    if !scalar.conforms_to(bt) {
        return Err(BinaryError::TypeMismatch("scalar differs from declared base type"));
    }
    let discriminator = match scalar {
        Scalar::Identifier(_) if bt.is_polymorphic() => DISCRIMINATOR_IDENTIFIER,
        _ => DISCRIMINATOR_INTEGER,
    };
    stream.write_u8(discriminator);
    write_scalar(stream, scalar)
}

fn write_scalar(stream: &mut BinaryStream, scalar: &Scalar) -> Result<()> {
    match scalar {
        Scalar::Boolean(v) => stream.write_bool(*v),
        Scalar::Integer(v) => stream.write_i32(*v),
        Scalar::Float(v) => stream.write_f64(*v),
        Scalar::String(s) | Scalar::Identifier(s) | Scalar::Uri(s) => stream.write_string(s)?,
        Scalar::Duration(d) => stream.write_string(&d.to_string())?,
        Scalar::Point(p) => {
            stream.write_u16(p.x);
            stream.write_u16(p.y);
        }
        Scalar::Pair(p) => {
            stream.write_string(&p.first)?;
            stream.write_string(&p.second)?;
        }
        Scalar::DirectedPair(p) => {
            stream.write_string(&p.source)?;
            stream.write_string(&p.destination)?;
        }
    }
    Ok(())
}

fn read_flag(stream: &mut BinaryStream) -> Result<bool> {
    match stream.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(BinaryError::Corrupt("null flag is neither 0 nor 1")),
    }
}

fn read_value_inner(
    stream: &mut BinaryStream,
    cardinality: Cardinality,
    base_type: Option<BaseType>,
) -> Result<Option<Value>> {
    if cardinality == Cardinality::Record && base_type.is_some() {
        return Err(BinaryError::TypeMismatch("record declared with a base type"));
    }
    if read_flag(stream)? {
        return Ok(None);
    }
    let value = match cardinality {
        Cardinality::Single => {
            let bt = declared_base_type(cardinality, base_type)?;
            Value::Single(read_discriminated(stream, bt)?)
        }
        Cardinality::Multiple | Cardinality::Ordered => {
            let bt = declared_base_type(cardinality, base_type)?;
            let count = read_container_header(stream)?;
            let mut items = Vec::with_capacity(count.min(stream.remaining()));
            for _ in 0..count {
                if read_flag(stream)? {
                    items.push(None);
                } else {
                    items.push(Some(read_discriminated(stream, bt)?));
                }
            }
            if cardinality == Cardinality::Multiple {
                Value::Multiple(items)
            } else {
                Value::Ordered(items)
            }
        }
        Cardinality::Record => {
            let count = read_container_header(stream)?;
            let mut record = Record::new();
            for _ in 0..count {
                let is_null = read_flag(stream)?;
                let key = stream.read_string()?;
                if record.contains_key(&key) {
                    return Err(BinaryError::Corrupt("duplicate record key"));
                }
                let value = if is_null {
                    None
                } else {
                    let tag = stream.read_u8()?;
                    let bt = BaseType::from_record_tag(tag)
                        .ok_or(BinaryError::UnsupportedType(tag))?;
                    Some(read_scalar(stream, bt)?)
                };
                record.insert(key, value);
            }
            Value::Record(record)
        }
    };
    Ok(Some(value))
}

fn read_container_header(stream: &mut BinaryStream) -> Result<usize> {
    if stream.read_u8()? != CONTAINER_RESERVED {
        return Err(BinaryError::Corrupt("container reserved byte is not 0"));
    }
    Ok(usize::from(stream.read_u16()?))
}

fn read_discriminated(stream: &mut BinaryStream, bt: BaseType) -> Result<Scalar> {
    let discriminator = stream.read_u8()?;
    if !bt.is_polymorphic() {
        return read_scalar(stream, bt);
    }
    match discriminator {
        DISCRIMINATOR_INTEGER => read_scalar(stream, BaseType::Integer),
        DISCRIMINATOR_IDENTIFIER => read_scalar(stream, BaseType::Identifier),
        _ => Err(BinaryError::Corrupt("unknown int-or-identifier discriminator")),
    }
}

fn read_scalar(stream: &mut BinaryStream, bt: BaseType) -> Result<Scalar> {
    Ok(match bt {
        BaseType::Boolean => Scalar::Boolean(stream.read_bool()?),
        BaseType::Integer => Scalar::Integer(stream.read_i32()?),
        BaseType::Float => Scalar::Float(stream.read_f64()?),
        BaseType::String => Scalar::String(stream.read_string()?),
        BaseType::Identifier => Scalar::Identifier(stream.read_string()?),
        BaseType::Uri => Scalar::Uri(stream.read_string()?),
        BaseType::Duration => Scalar::Duration(
            stream
                .read_string()?
                .parse::<Duration>()
                .map_err(|_| BinaryError::Corrupt("invalid duration text"))?,
        ),
        BaseType::Point => {
            let x = stream.read_u16()?;
            let y = stream.read_u16()?;
            Scalar::Point(Point::new(x, y))
        }
        BaseType::Pair => {
            let first = stream.read_string()?;
            let second = stream.read_string()?;
            Scalar::Pair(Pair::new(first, second))
        }
        BaseType::DirectedPair => {
            let source = stream.read_string()?;
            let destination = stream.read_string()?;
            Scalar::DirectedPair(DirectedPair::new(source, destination))
        }
        BaseType::IntOrIdentifier => {
            return Err(BinaryError::UnsupportedType(BaseType::IntOrIdentifier.tag()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    fn s(text: &str) -> Vec<u8> {
        let mut out = (text.len() as u16).to_le_bytes().to_vec();
        out.extend_from_slice(text.as_bytes());
        out
    }

    fn encode(c: Cardinality, bt: Option<BaseType>, v: Option<&Value>) -> Vec<u8> {
        let mut stream = BinaryStream::new();
        write_value(&mut stream, c, bt, v).unwrap();
        stream.into_inner()
    }

    fn decode(c: Cardinality, bt: Option<BaseType>, data: Vec<u8>) -> Option<Value> {
        let mut stream = BinaryStream::from_bytes(data);
        let v = read_value(&mut stream, c, bt).unwrap();
        assert_eq!(stream.remaining(), 0);
        v
    }

    #[test]
    fn absent_single_is_one_byte() {
        let bt = Some(BaseType::Integer);
        assert_eq!(encode(Cardinality::Single, bt, None), [1]);
        assert_eq!(decode(Cardinality::Single, bt, vec![1]), None);
    }

    #[test]
    fn single_integer_layout() {
        let v = Value::Single(Scalar::Integer(45));
        let expected = bytes(&[&[0, 1], &45i32.to_le_bytes()]);
        let bt = Some(BaseType::Integer);
        assert_eq!(encode(Cardinality::Single, bt, Some(&v)), expected);
        assert_eq!(decode(Cardinality::Single, bt, expected), Some(v));
    }

    #[test]
    fn int_or_identifier_discriminator() {
        let bt = Some(BaseType::IntOrIdentifier);
        let int = Value::Single(Scalar::Integer(45));
        let int_bytes = bytes(&[&[0, 1], &45i32.to_le_bytes()]);
        assert_eq!(encode(Cardinality::Single, bt, Some(&int)), int_bytes);

        let ident = Value::Single(Scalar::Identifier("Identifier".into()));
        let ident_bytes = bytes(&[&[0, 0], &s("Identifier")]);
        assert_eq!(encode(Cardinality::Single, bt, Some(&ident)), ident_bytes);
        assert_eq!(decode(Cardinality::Single, bt, ident_bytes), Some(ident));

        let mut stream = BinaryStream::from_bytes(vec![0, 7, 0, 0, 0, 0]);
        assert!(matches!(
            read_value(&mut stream, Cardinality::Single, bt),
            Err(BinaryError::Corrupt(_))
        ));
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn multiple_with_hole_keeps_positions() {
        let v = Value::Multiple(vec![
            Some(Scalar::Integer(0)),
            None,
            Some(Scalar::Integer(65000)),
        ]);
        let expected = bytes(&[
            &[0, 0],
            &3u16.to_le_bytes(),
            &[0, 1],
            &0i32.to_le_bytes(),
            &[1],
            &[0, 1],
            &65000i32.to_le_bytes(),
        ]);
        let bt = Some(BaseType::Integer);
        assert_eq!(encode(Cardinality::Multiple, bt, Some(&v)), expected);
        assert_eq!(decode(Cardinality::Multiple, bt, expected), Some(v));
    }

    #[test]
    fn empty_container_is_not_absent() {
        let bt = Some(BaseType::Integer);
        let empty = Value::Multiple(Vec::new());
        let encoded = encode(Cardinality::Multiple, bt, Some(&empty));
        assert_eq!(encoded, [0, 0, 0, 0]);
        assert_ne!(encoded, encode(Cardinality::Multiple, bt, None));
        assert_eq!(decode(Cardinality::Multiple, bt, encoded), Some(empty));
    }

    #[test]
    fn heterogeneous_record() {
        let record: Record = [
            ("key1", Some(Scalar::Integer(1337))),
            ("key2", None),
            ("key3", Some(Scalar::String("String!".into()))),
        ]
        .into_iter()
        .collect();
        let v = Value::Record(record);
        let expected = bytes(&[
            &[0, 0],
            &3u16.to_le_bytes(),
            &[0],
            &s("key1"),
            &[2],
            &1337i32.to_le_bytes(),
            &[1],
            &s("key2"),
            &[0],
            &s("key3"),
            &[4],
            &s("String!"),
        ]);
        assert_eq!(encode(Cardinality::Record, None, Some(&v)), expected);
        assert_eq!(decode(Cardinality::Record, None, expected), Some(v));
    }

    #[test]
    fn unknown_record_tag_is_unsupported() {
        let data = bytes(&[&[0, 0], &1u16.to_le_bytes(), &[0], &s("k"), &[9], &s("x")]);
        let mut stream = BinaryStream::from_bytes(data);
        assert_eq!(
            read_value(&mut stream, Cardinality::Record, None),
            Err(BinaryError::UnsupportedType(9))
        );
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn point_pair_and_duration_payloads() {
        let bt = Some(BaseType::Point);
        let v = Value::Ordered(vec![Some(Scalar::Point(Point::new(6, 1234)))]);
        let expected = bytes(&[
            &[0, 0],
            &1u16.to_le_bytes(),
            &[0, 1],
            &6u16.to_le_bytes(),
            &1234u16.to_le_bytes(),
        ]);
        assert_eq!(encode(Cardinality::Ordered, bt, Some(&v)), expected);

        let bt = Some(BaseType::DirectedPair);
        let v = Value::Single(Scalar::DirectedPair(DirectedPair::new("A", "B")));
        let expected = bytes(&[&[0, 1], &s("A"), &s("B")]);
        assert_eq!(decode(Cardinality::Single, bt, expected), Some(v));

        let bt = Some(BaseType::Duration);
        let d: Duration = "PT2M2S".parse().unwrap();
        let expected = bytes(&[&[0, 1], &s("PT2M2S")]);
        assert_eq!(
            encode(Cardinality::Single, bt, Some(&Value::Single(d.into()))),
            expected
        );
    }

    #[test]
    fn failed_encode_leaves_stream_untouched() {
        let mut stream = BinaryStream::new();
        stream.write_u8(0xaa);
        let long = "x".repeat(65_536);
        let v = Value::Ordered(vec![
            Some(Scalar::String("ok".into())),
            Some(Scalar::String(long)),
        ]);
        assert_eq!(
            write_value(&mut stream, Cardinality::Ordered, Some(BaseType::String), Some(&v)),
            Err(BinaryError::Truncation { len: 65_536 })
        );
        assert_eq!(stream.as_bytes(), [0xaa]);
    }

    #[test]
    fn encode_rejects_values_that_do_not_match_the_declaration() {
        let mut stream = BinaryStream::new();
        let v = Value::Single(Scalar::Float(1.5));
        assert!(matches!(
            write_value(&mut stream, Cardinality::Single, Some(BaseType::Integer), Some(&v)),
            Err(BinaryError::TypeMismatch(_))
        ));
        assert!(matches!(
            write_value(&mut stream, Cardinality::Multiple, Some(BaseType::Float), Some(&v)),
            Err(BinaryError::TypeMismatch(_))
        ));
        assert!(stream.is_empty());
    }

    #[test]
    fn non_zero_reserved_byte_is_corrupt() {
        let mut stream = BinaryStream::from_bytes(vec![0, 5, 0, 0]);
        assert!(matches!(
            read_value(&mut stream, Cardinality::Multiple, Some(BaseType::Integer)),
            Err(BinaryError::Corrupt(_))
        ));
    }

    #[test]
    fn truncated_input_underflows() {
        let mut stream = BinaryStream::from_bytes(vec![0, 1, 45, 0]);
        assert!(matches!(
            read_value(&mut stream, Cardinality::Single, Some(BaseType::Integer)),
            Err(BinaryError::Underflow { .. })
        ));
        assert_eq!(stream.position(), 0);
    }
}
