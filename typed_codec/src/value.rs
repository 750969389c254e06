//! Dynamic values exchanged between codecs, and the conversions between
//! them and typed Rust values.

use std::any::{Any, TypeId};
use std::fmt;

use bytes::Bytes;

use crate::record::Record;
use crate::tenum::{EnumBase, EnumDomain, Member};
use crate::{Error, Result};

/// A value produced by parsing, or consumed by building.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Bytes(Bytes),
    Str(String),
    /// A plain ordered sequence.
    List(Vec<Value>),
    /// The sequence type produced by [`crate::Array`].
    ListContainer(ListContainer),
    Container(Container),
    Enum(EnumValue),
    Record(RecordValue),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::ListContainer(_) => "list container",
            Value::Container(_) => "container",
            Value::Enum(_) => "enum",
            Value::Record(_) => "record",
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(*b as i128),
            Value::Enum(e) => Some(e.value()),
            _ => None,
        }
    }

    /// Elements of either sequence representation.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::ListContainer(items) => Some(&items.0),
            _ => None,
        }
    }

    pub fn into_container(self) -> Result<Container> {
        match self {
            Value::Container(c) => Ok(c),
            other => Err(Error::value_type("container", other)),
        }
    }

    pub fn into_record<T: Record>(self) -> Result<T> {
        match self {
            Value::Record(r) => r.downcast::<T>().map_err(|r| {
                Error::value_type(std::any::type_name::<T>(), r.type_name())
            }),
            other => Err(Error::value_type(std::any::type_name::<T>(), other)),
        }
    }
}

/// Insertion-ordered mapping from field name to value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    entries: Vec<(String, Value)>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: Container) {
        for (k, v) in other {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for Container {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Container {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut c = Container::new();
        for (k, v) in iter {
            c.insert(k, v);
        }
        c
    }
}

/// Builds a [`Container`] from `name => value` pairs, converting each value
/// with [`ToValue`].
#[macro_export]
macro_rules! container {
    () => { $crate::Container::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut c = $crate::Container::new();
        $( c.insert($name, $crate::ToValue::to_value(&$value)); )+
        c
    }};
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListContainer(pub Vec<Value>);

impl ListContainer {
    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

/// A symbol of some [`EnumBase`] domain, erased to travel through codecs.
#[derive(Clone, Copy)]
pub struct EnumValue {
    type_id: TypeId,
    domain: &'static EnumDomain,
    member: Member,
}

impl EnumValue {
    pub fn of<E: EnumBase>(symbol: E) -> Self {
        EnumValue {
            type_id: TypeId::of::<E>(),
            domain: E::domain(),
            member: symbol.member(),
        }
    }

    pub fn is<E: EnumBase>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }

    pub fn downcast<E: EnumBase>(&self) -> Option<E> {
        if self.is::<E>() {
            Some(E::from_member(self.member))
        } else {
            None
        }
    }

    pub fn domain(&self) -> &'static EnumDomain {
        self.domain
    }

    pub fn member(&self) -> Member {
        self.member
    }

    pub fn value(&self) -> i128 {
        self.member.value()
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.member.value() == other.member.value()
    }
}

impl fmt::Debug for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain.name(), self.domain.describe(self.member))
    }
}

/// Object-safe view of a [`Record`], so typed records can sit inside a [`Value`].
pub trait DynRecord: Any + Send + Sync + fmt::Debug {
    fn clone_box(&self) -> Box<dyn DynRecord>;
    fn eq_dyn(&self, other: &dyn DynRecord) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn type_name(&self) -> &'static str;
    fn field_values(&self) -> Vec<(String, Value)>;
}

impl<T: Record> DynRecord for T {
    fn clone_box(&self) -> Box<dyn DynRecord> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn DynRecord) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn field_values(&self) -> Vec<(String, Value)> {
        let definition = match T::definition() {
            Ok(d) => d,
            Err(_) => return vec![],
        };
        definition
            .fields()
            .iter()
            .filter_map(|f| Some((f.name().to_string(), self.get_field(f.name()).ok()?)))
            .collect()
    }
}

pub struct RecordValue(Box<dyn DynRecord>);

impl RecordValue {
    pub fn new<T: Record>(record: T) -> Self {
        RecordValue(Box::new(record))
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn downcast<T: Record>(self) -> std::result::Result<T, Self> {
        if self.downcast_ref::<T>().is_none() {
            return Err(self);
        }
        match self.0.into_any().downcast::<T>() {
            Ok(record) => Ok(*record),
            // checked above
            Err(_) => unreachable!(),
        }
    }
}

impl Clone for RecordValue {
    fn clone(&self) -> Self {
        RecordValue(self.0.clone_box())
    }
}

impl PartialEq for RecordValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl fmt::Debug for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

const BYTES_PRINTING_CAP: usize = 16;
const STR_PRINTING_CAP: usize = 32;

fn fmt_entries<'a>(
    f: &mut fmt::Formatter<'_>,
    header: &str,
    entries: impl Iterator<Item = (&'a str, &'a Value)>,
) -> fmt::Result {
    write!(f, "{}: ", header)?;
    for (k, v) in entries {
        if k.starts_with('_') {
            continue;
        }
        let text = v.to_string().replace('\n', "\n    ");
        write!(f, "\n    {} = {}", k, text)?;
    }
    Ok(())
}

fn fmt_bytes(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    let shown = &data[..data.len().min(BYTES_PRINTING_CAP)];
    write!(f, "b'")?;
    for &b in shown {
        match b {
            b'\\' => write!(f, "\\\\")?,
            b'\'' => write!(f, "\\'")?,
            0x20..=0x7e => write!(f, "{}", b as char)?,
            _ => write!(f, "\\x{:02x}", b)?,
        }
    }
    if data.len() > BYTES_PRINTING_CAP {
        write!(f, "'... (truncated, total {})", data.len())
    } else {
        write!(f, "' (total {})", data.len())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bytes(b) => fmt_bytes(f, b),
            Value::Str(s) => {
                let count = s.chars().count();
                if count <= STR_PRINTING_CAP {
                    write!(f, "{:?} (total {})", s, count)
                } else {
                    let head: String = s.chars().take(STR_PRINTING_CAP).collect();
                    write!(f, "{:?}... (truncated, total {})", head, count)
                }
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::ListContainer(items) => {
                write!(f, "ListContainer: ")?;
                for item in &items.0 {
                    write!(f, "\n    {}", item.to_string().replace('\n', "\n    "))?;
                }
                Ok(())
            }
            Value::Container(c) => fmt_entries(f, "Container", c.iter()),
            Value::Enum(e) => write!(f, "{}", e.domain.describe(e.member)),
            Value::Record(r) => {
                let name = r.type_name().rsplit("::").next().unwrap_or("Record");
                let fields = r.0.field_values();
                fmt_entries(f, name, fields.iter().map(|(k, v)| (k.as_str(), v)))
            }
        }
    }
}

/// Conversion of a typed value into a [`Value`] for building.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion of a parsed [`Value`] into a typed value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! impl_int_value {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(*self as i128)
                }
            }
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(v) => Ok(<$ty>::try_from(v)?),
                        other => Err(Error::value_type(stringify!($ty), other)),
                    }
                }
            }
        )*
    };
}
impl_int_value!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl ToValue for i128 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}
impl FromValue for i128 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(Error::value_type("i128", other)),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}
impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(Error::value_type("bool", other)),
        }
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}
impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(Error::value_type("f64", other)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }
}
impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v as f32),
            other => Err(Error::value_type("f32", other)),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}
impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}
impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(Error::value_type("string", other)),
        }
    }
}

impl ToValue for Bytes {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}
impl FromValue for Bytes {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(Error::value_type("bytes", other)),
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(ToValue::to_value).collect())
    }
}
impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        let items = match value {
            Value::List(items) => items,
            Value::ListContainer(items) => items.into_inner(),
            other => return Err(Error::value_type("list", other)),
        };
        items.into_iter().map(T::from_value).collect()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::None,
        }
    }
}
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::None => Ok(None),
            other => Ok(Some(T::from_value(other)?)),
        }
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::None
    }
}
impl FromValue for () {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::None => Ok(()),
            other => Err(Error::value_type("none", other)),
        }
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}
impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl ToValue for Container {
    fn to_value(&self) -> Value {
        Value::Container(self.clone())
    }
}
impl FromValue for Container {
    fn from_value(value: Value) -> Result<Self> {
        value.into_container()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_keeps_insertion_order() {
        let mut c = Container::new();
        c.insert("b", Value::Int(1));
        c.insert("a", Value::Int(2));
        assert_eq!(c.insert("b", Value::Int(3)), Some(Value::Int(1)));
        assert_eq!(c.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(c.get("b"), Some(&Value::Int(3)));
        assert_eq!(c.remove("b"), Some(Value::Int(3)));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_int_conversion_range() {
        assert_eq!(u8::from_value(Value::Int(255)), Ok(255));
        assert!(matches!(
            u8::from_value(Value::Int(256)),
            Err(Error::IntTooLarge(_))
        ));
        assert!(matches!(
            u8::from_value(Value::Bool(true)),
            Err(Error::ValueType { .. })
        ));
        let wide = u64::MAX as i128 + 1;
        assert_eq!(i128::from_value(Value::Int(wide)), Ok(wide));
        assert_eq!(wide.to_value(), Value::Int(wide));
        assert_eq!(u64::MAX.to_value(), Value::Int(u64::MAX as i128));
    }

    #[test]
    fn test_option_and_list_conversion() {
        assert_eq!(Option::<u8>::from_value(Value::None), Ok(None));
        assert_eq!(Some(3u8).to_value(), Value::Int(3));
        let list = Value::ListContainer(ListContainer(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(Vec::<u16>::from_value(list), Ok(vec![1, 2]));
    }

    #[test]
    fn test_container_display() {
        let c = container! {
            "signature" => Bytes::from_static(b"BMP"),
            "width" => 3u8,
            "_hidden" => 1u8,
        };
        assert_eq!(
            Value::Container(c).to_string(),
            "Container: \n    signature = b'BMP' (total 3)\n    width = 3"
        );
    }

    #[test]
    fn test_bytes_display_truncates() {
        let v = Value::Bytes(Bytes::from(vec![0u8; 20]));
        assert!(v.to_string().ends_with("... (truncated, total 20)"));
    }
}
