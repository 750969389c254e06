//! Typed records: structs whose fields each carry a codec.

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::attr::RecordOptions;
use crate::construct::{Construct, ConstructExt};
use crate::context::Context;
use crate::field::FieldSpec;
use crate::stream_rw::{BuildStream, ParseStream};
use crate::subcons::{Struct, Tell};
use crate::value::{Container, RecordValue, ToValue, Value};
use crate::{Error, Result};

/// A struct that can be parsed and built through a [`RecordAdapter`].
///
/// Usually implemented with `#[derive(Record)]`. Fields whose codec builds
/// from nothing (constants, padding, computed values) are not constructor
/// arguments; [`Record::from_fields`] fills them from their defaults and the
/// adapter assigns their parsed values afterwards with [`Record::set_field`].
pub trait Record: fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    fn definition() -> Result<&'static RecordDefinition>;

    /// Constructs the record from its constructor arguments, by name.
    fn from_fields(fields: Container) -> Result<Self>;

    fn get_field(&self, name: &str) -> Result<Value>;

    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;

    /// Storage for aggregate entries that are not declared fields.
    fn extras(&self) -> Option<&Container> {
        None
    }

    fn extras_mut(&mut self) -> Option<&mut Container> {
        None
    }
}

/// Ordered field table of a record type.
#[derive(Debug)]
pub struct RecordDefinition {
    type_id: TypeId,
    type_name: &'static str,
    fields: Vec<FieldSpec>,
    reverse: bool,
    extras: bool,
}

impl RecordDefinition {
    pub fn builder<T: 'static>() -> RecordDefinitionBuilder {
        RecordDefinitionBuilder {
            definition: RecordDefinition {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                fields: vec![],
                reverse: false,
                extras: false,
            },
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Default wire order.
    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn has_extras(&self) -> bool {
        self.extras
    }

    /// Removes the constructor argument for `name` from `args`.
    ///
    /// Required fields must be present. Excluded fields must be absent and
    /// yield their default, or `Value::None` when they have none.
    pub fn take_argument(&self, args: &mut Container, name: &str) -> Result<Value> {
        let field = self
            .field(name)
            .ok_or_else(|| Error::construction(self.type_name, format!("no field '{}'", name)))?;
        if field.init() {
            args.remove(name).ok_or_else(|| {
                Error::construction(self.type_name, format!("missing required argument '{}'", name))
            })
        } else if args.contains_key(name) {
            Err(Error::construction(
                self.type_name,
                format!("'{}' is not a constructor argument", name),
            ))
        } else {
            Ok(field.default().cloned().unwrap_or_default())
        }
    }

    /// Fails if `args` still holds arguments nobody took.
    pub fn ensure_consumed(&self, args: &Container) -> Result<()> {
        match args.keys().next() {
            Some(name) => Err(Error::construction(
                self.type_name,
                format!("unexpected argument '{}'", name),
            )),
            None => Ok(()),
        }
    }

    fn validate<T: 'static>(&self, options: RecordOptions) -> Result<()> {
        let found = std::any::type_name::<T>();
        if self.type_id != TypeId::of::<T>() {
            return Err(Error::type_constraint(
                found,
                format!("described by its own record definition, not {}'s", self.type_name),
            ));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            let name = field.name();
            if name.is_empty() || name.starts_with('@') {
                return Err(Error::type_constraint(
                    format!("{}.{}", found, name),
                    "a field name that is non-empty and does not start with '@'",
                ));
            }
            if !seen.insert(name) {
                return Err(Error::type_constraint(
                    format!("{}.{}", found, name),
                    "a unique field name",
                ));
            }
        }
        if options.pass_through && !self.extras {
            return Err(Error::type_constraint(
                found,
                "a record with an extras field to pass values through",
            ));
        }
        Ok(())
    }
}

pub struct RecordDefinitionBuilder {
    definition: RecordDefinition,
}

impl RecordDefinitionBuilder {
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.definition.fields.push(field);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.definition.reverse = reverse;
        self
    }

    pub fn extras(mut self, extras: bool) -> Self {
        self.definition.extras = extras;
        self
    }

    pub fn finish(self) -> RecordDefinition {
        self.definition
    }
}

/// The aggregate codec of a record: a [`Struct`] over its fields in wire
/// order, optionally with `@<name`/`@>name` offset markers around each field.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    inner: Struct,
    reversed: bool,
    markers: bool,
}

impl RecordCodec {
    pub fn new(fields: &[FieldSpec], reversed: bool, markers: bool) -> Self {
        let mut ordered: Vec<&FieldSpec> = fields.iter().collect();
        if reversed {
            ordered.reverse();
        }
        let mut inner = Struct::new();
        for field in ordered {
            if markers {
                inner = inner.field(format!("@<{}", field.name()), Tell);
            }
            inner = inner.push(field.name(), field.subcon().clone());
            if markers {
                inner = inner.field(format!("@>{}", field.name()), Tell);
            }
        }
        RecordCodec {
            inner,
            reversed,
            markers,
        }
    }

    pub fn reversed(&self) -> bool {
        self.reversed
    }

    pub fn markers(&self) -> bool {
        self.markers
    }

    /// Names in wire order, markers included.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.names()
    }

    pub fn sizeof_with(&self, bound: Container, ctx: &Context) -> Result<usize> {
        self.inner.sizeof_with(bound, ctx)
    }
}

impl Construct for RecordCodec {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        self.inner.parse_stream(stream, ctx)
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        self.inner.build_stream(obj, stream, ctx)
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.inner.sizeof_ctx(ctx)
    }

    fn sizeof_value(&self, obj: &Value, ctx: &Context) -> Result<usize> {
        self.inner.sizeof_value(obj, ctx)
    }
}

/// Converts between a record type `T` and the bytes of its [`RecordCodec`].
///
/// Nests like any other codec: on the dynamic path it parses to, and builds
/// from, `Value::Record` holding exactly a `T`.
pub struct RecordAdapter<T: Record> {
    definition: &'static RecordDefinition,
    codec: RecordCodec,
    pass_through: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RecordAdapter<T> {
    pub fn new() -> Result<Self> {
        Self::with_options(RecordOptions::zero())
    }

    pub fn reversed() -> Result<Self> {
        Self::with_options(RecordOptions::zero().reverse(true))
    }

    pub fn with_options(options: RecordOptions) -> Result<Self> {
        let definition = T::definition()?;
        definition.validate::<T>(options)?;
        let reversed = options.reverse.unwrap_or(definition.reverse());
        let codec = RecordCodec::new(definition.fields(), reversed, options.markers);
        debug!(
            record = definition.type_name(),
            fields = definition.fields().len(),
            reversed,
            markers = options.markers,
            pass_through = options.pass_through,
            "created record adapter"
        );
        Ok(RecordAdapter {
            definition,
            codec,
            pass_through: options.pass_through,
            _marker: PhantomData,
        })
    }

    pub fn definition(&self) -> &'static RecordDefinition {
        self.definition
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// Aggregate parse result to record.
    pub fn decode(&self, mut aggregate: Container) -> Result<T> {
        let mut args = Container::new();
        let mut assigned = vec![];
        for field in self.definition.fields() {
            let value = aggregate.remove(field.name()).ok_or_else(|| Error::MissingField {
                name: field.name().to_string(),
                path: "(decoding)".to_string(),
            })?;
            if field.init() {
                args.insert(field.name(), value);
            } else {
                assigned.push((field.name(), value));
            }
        }

        let mut record = T::from_fields(args)?;
        for (name, value) in assigned {
            record.set_field(name, value)?;
        }
        if self.pass_through {
            if let Some(extras) = record.extras_mut() {
                extras.extend(aggregate);
            }
        }
        Ok(record)
    }

    /// Record to the aggregate its codec builds from. Every declared field is
    /// read, including those excluded from construction.
    pub fn encode(&self, record: &T) -> Result<Container> {
        let mut aggregate = Container::new();
        for field in self.definition.fields() {
            aggregate.insert(field.name(), record.get_field(field.name())?);
        }
        Ok(aggregate)
    }

    pub fn parse(&self, data: &[u8]) -> Result<T> {
        let aggregate = self.codec.parse(data)?.into_container()?;
        self.decode(aggregate)
    }

    pub fn build(&self, record: &T) -> Result<Vec<u8>> {
        self.codec.build(&Value::Container(self.encode(record)?))
    }

    pub fn sizeof(&self) -> Result<usize> {
        self.codec.sizeof()
    }

    /// Size of `record` on the wire, resolving sizes that depend on its
    /// field values.
    pub fn sizeof_for(&self, record: &T) -> Result<usize> {
        self.codec.sizeof_with(self.encode(record)?, &Context::sizing())
    }
}

impl<T: Record> fmt::Debug for RecordAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordAdapter")
            .field("record", &self.definition.type_name())
            .field("codec", &self.codec)
            .field("pass_through", &self.pass_through)
            .finish()
    }
}

impl<T: Record> Construct for RecordAdapter<T> {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        let aggregate = self.codec.parse_stream(stream, ctx)?.into_container()?;
        Ok(Value::Record(RecordValue::new(self.decode(aggregate)?)))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        let record = match obj {
            Value::Record(r) => r.downcast_ref::<T>(),
            _ => None,
        };
        let record = record.ok_or_else(|| Error::EncodeType {
            value: format!("{:?}", obj),
            expected: self.definition.type_name().to_string(),
            path: ctx.path(),
        })?;
        let aggregate = Value::Container(self.encode(record)?);
        self.codec.build_stream(&aggregate, stream, ctx)?;
        Ok(obj.clone())
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.codec.sizeof_ctx(ctx)
    }

    fn sizeof_value(&self, obj: &Value, ctx: &Context) -> Result<usize> {
        match obj {
            Value::Record(r) => match r.downcast_ref::<T>() {
                Some(record) => self.codec.sizeof_with(self.encode(record)?, ctx),
                None => self.sizeof_ctx(ctx),
            },
            _ => self.sizeof_ctx(ctx),
        }
    }
}

/// Constructs a record from its constructor arguments only.
pub struct RecordBuilder<T: Record> {
    args: Container,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RecordBuilder<T> {
    pub fn new() -> Self {
        RecordBuilder {
            args: Container::new(),
            _marker: PhantomData,
        }
    }

    pub fn set(mut self, name: &str, value: impl ToValue) -> Self {
        self.args.insert(name, value.to_value());
        self
    }

    pub fn build(self) -> Result<T> {
        T::from_fields(self.args)
    }
}

impl<T: Record> Default for RecordBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
