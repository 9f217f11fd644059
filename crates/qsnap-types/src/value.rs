use core::fmt;

use serde::{Deserialize, Serialize};

use crate::duration::Duration;

/// Shape of a runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Multiple,
    Ordered,
    Record,
}

impl Cardinality {
    pub fn is_container(self) -> bool {
        !matches!(self, Cardinality::Single)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
            Cardinality::Record => "record",
        })
    }
}

/// Scalar kind of a value.
///
/// The discriminants are the stable tag bytes used on the wire for record entries.
/// `IntOrIdentifier` is polymorphic: its values are either [`Scalar::Integer`] or
/// [`Scalar::Identifier`], so it never appears as a record entry tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BaseType {
    Identifier = 0,
    Boolean = 1,
    Integer = 2,
    Float = 3,
    String = 4,
    Point = 5,
    Pair = 6,
    DirectedPair = 7,
    Duration = 8,
    Uri = 10,
    IntOrIdentifier = 11,
}

impl BaseType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Resolve a record entry tag. Only concrete scalar types are valid here.
    pub fn from_record_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => BaseType::Identifier,
            1 => BaseType::Boolean,
            2 => BaseType::Integer,
            3 => BaseType::Float,
            4 => BaseType::String,
            5 => BaseType::Point,
            6 => BaseType::Pair,
            7 => BaseType::DirectedPair,
            8 => BaseType::Duration,
            10 => BaseType::Uri,
            _ => return None,
        })
    }

    pub fn is_polymorphic(self) -> bool {
        matches!(self, BaseType::IntOrIdentifier)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BaseType::Identifier => "identifier",
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Point => "point",
            BaseType::Pair => "pair",
            BaseType::DirectedPair => "directed_pair",
            BaseType::Duration => "duration",
            BaseType::Uri => "uri",
            BaseType::IntOrIdentifier => "int_or_identifier",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Unordered association between two identifiers.
///
/// Equality ignores endpoint order; the wire keeps the order the endpoints were given in.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub first: String,
    pub second: String,
}

impl Pair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        (self.first == other.first && self.second == other.second)
            || (self.first == other.second && self.second == other.first)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectedPair {
    pub source: String,
    pub destination: String,
}

impl DirectedPair {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// A single non-null value of a concrete base type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Boolean(bool),
    Integer(i32),
    Float(f64),
    String(String),
    Identifier(String),
    Uri(String),
    Duration(Duration),
    Point(Point),
    Pair(Pair),
    DirectedPair(DirectedPair),
}

impl Scalar {
    /// The concrete base type of this scalar (never `IntOrIdentifier`).
    pub fn base_type(&self) -> BaseType {
        match self {
            Scalar::Boolean(_) => BaseType::Boolean,
            Scalar::Integer(_) => BaseType::Integer,
            Scalar::Float(_) => BaseType::Float,
            Scalar::String(_) => BaseType::String,
            Scalar::Identifier(_) => BaseType::Identifier,
            Scalar::Uri(_) => BaseType::Uri,
            Scalar::Duration(_) => BaseType::Duration,
            Scalar::Point(_) => BaseType::Point,
            Scalar::Pair(_) => BaseType::Pair,
            Scalar::DirectedPair(_) => BaseType::DirectedPair,
        }
    }

    pub fn conforms_to(&self, base_type: BaseType) -> bool {
        match base_type {
            BaseType::IntOrIdentifier => {
                matches!(self, Scalar::Integer(_) | Scalar::Identifier(_))
            }
            other => self.base_type() == other,
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Boolean(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<Duration> for Scalar {
    fn from(v: Duration) -> Self {
        Scalar::Duration(v)
    }
}

impl From<Point> for Scalar {
    fn from(v: Point) -> Self {
        Scalar::Point(v)
    }
}

impl From<Pair> for Scalar {
    fn from(v: Pair) -> Self {
        Scalar::Pair(v)
    }
}

impl From<DirectedPair> for Scalar {
    fn from(v: DirectedPair) -> Self {
        Scalar::DirectedPair(v)
    }
}

/// One `(key, value)` entry of a [`Record`]. A `None` value is a null entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub key: String,
    pub value: Option<Scalar>,
}

/// Keyed heterogeneous container.
///
/// Keys are unique. Insertion order is kept (it is the encoding order) but does not take
/// part in equality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RecordEntry>", into = "Vec<RecordEntry>")]
pub struct Record {
    entries: Vec<RecordEntry>,
}

impl From<Vec<RecordEntry>> for Record {
    fn from(entries: Vec<RecordEntry>) -> Self {
        entries.into_iter().map(|e| (e.key, e.value)).collect()
    }
}

impl From<Record> for Vec<RecordEntry> {
    fn from(record: Record) -> Self {
        record.entries
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<Scalar>) {
        let key = key.into();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(RecordEntry { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Option<Scalar>> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordEntry> {
        self.entries.iter()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|e| other.get(&e.key) == Some(&e.value))
    }
}

impl<K: Into<String>> FromIterator<(K, Option<Scalar>)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Option<Scalar>)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

/// A non-absent runtime value.
///
/// Absence of the whole value is modelled by `Option<Value>` at the variable level. An
/// empty `Multiple`/`Ordered`/`Record` is a present value with zero elements, and a `None`
/// element inside a container is a hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Single(Scalar),
    Multiple(Vec<Option<Scalar>>),
    Ordered(Vec<Option<Scalar>>),
    Record(Record),
}

impl Value {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Value::Single(_) => Cardinality::Single,
            Value::Multiple(_) => Cardinality::Multiple,
            Value::Ordered(_) => Cardinality::Ordered,
            Value::Record(_) => Cardinality::Record,
        }
    }

    /// Whether this value may be held by a variable declared with `cardinality` and
    /// `base_type`. Records ignore `base_type`; every other cardinality requires one.
    pub fn conforms_to(&self, cardinality: Cardinality, base_type: Option<BaseType>) -> bool {
        if self.cardinality() != cardinality {
            return false;
        }
        match (self, base_type) {
            (Value::Record(_), _) => true,
            (Value::Single(scalar), Some(bt)) => scalar.conforms_to(bt),
            (Value::Multiple(items) | Value::Ordered(items), Some(bt)) => items
                .iter()
                .flatten()
                .all(|scalar| scalar.conforms_to(bt)),
            (_, None) => false,
        }
    }

    pub fn as_single(&self) -> Option<&Scalar> {
        match self {
            Value::Single(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Single(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}
