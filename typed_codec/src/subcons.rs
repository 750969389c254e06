//! Codecs that wrap or compose other codecs.

use std::sync::Arc;

use tracing::trace;

use crate::construct::{Construct, DeclaredDefault, Subcon};
use crate::context::{Context, ContextValue, Expr};
use crate::field::ParsedHook;
use crate::impls::Bytes;
use crate::stream_rw::{BuildStream, ParseStream};
use crate::value::{Container, ListContainer, Value};
use crate::{Error, Result};

/// Named sequential composition. Parses to, and builds from, a
/// [`Container`] keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct Struct {
    fields: Vec<(String, Subcon)>,
}

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<C: Construct + 'static>(self, name: impl Into<String>, subcon: C) -> Self {
        self.push(name, Arc::new(subcon))
    }

    pub fn push(mut self, name: impl Into<String>, subcon: Subcon) -> Self {
        self.fields.push((name.into(), subcon));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    fn parse_fields(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<()> {
        for (name, subcon) in &self.fields {
            ctx.enter(name);
            let parsed = subcon.parse_stream(stream, ctx);
            ctx.leave();
            let value = parsed?;
            trace!(field = name.as_str(), position = stream.position(), "parsed field");
            ctx.insert(name, value);
        }
        Ok(())
    }

    fn build_fields(&self, stream: &mut BuildStream, ctx: &mut Context) -> Result<()> {
        for (name, subcon) in &self.fields {
            let value = match ctx.get(name) {
                Some(v) => v.clone(),
                None if subcon.flag_build_none() => Value::None,
                None => {
                    return Err(Error::MissingField {
                        name: name.clone(),
                        path: ctx.path(),
                    })
                }
            };
            ctx.enter(name);
            let built = subcon.build_stream(&value, stream, ctx);
            ctx.leave();
            let built = built?;
            trace!(field = name.as_str(), position = stream.position(), "built field");
            ctx.insert(name, built);
        }
        Ok(())
    }

    /// Size with `bound` standing in for the values of the struct's fields.
    /// Each field is sized from its bound value, so nested records and
    /// arrays resolve their own context-dependent sizes.
    pub fn sizeof_with(&self, bound: Container, ctx: &Context) -> Result<usize> {
        let mut ctx = ctx.clone();
        ctx.push_frame(bound);
        let mut total = 0;
        for (name, subcon) in &self.fields {
            let value = ctx.get(name).cloned().unwrap_or_default();
            ctx.enter(name);
            let size = subcon.sizeof_value(&value, &ctx);
            ctx.leave();
            total += size?;
        }
        Ok(total)
    }
}

impl Construct for Struct {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        ctx.push_frame(Container::new());
        let result = self.parse_fields(stream, ctx);
        let frame = ctx.pop_frame();
        result?;
        Ok(Value::Container(frame))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        let seed = match obj {
            Value::Container(c) => c.clone(),
            Value::None => Container::new(),
            other => return Err(Error::value_type("container", other)),
        };
        ctx.push_frame(seed);
        let result = self.build_fields(stream, ctx);
        let frame = ctx.pop_frame();
        result?;
        Ok(Value::Container(frame))
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.sizeof_with(Container::new(), ctx)
    }

    fn sizeof_value(&self, obj: &Value, ctx: &Context) -> Result<usize> {
        match obj {
            Value::Container(c) => self.sizeof_with(c.clone(), ctx),
            _ => self.sizeof_ctx(ctx),
        }
    }
}

/// Repeats `subcon` a fixed or context-computed number of times.
#[derive(Debug, Clone)]
pub struct Array {
    count: Expr,
    subcon: Subcon,
    discard: bool,
}

impl Array {
    pub fn new<C: Construct + 'static>(count: impl Into<Expr>, subcon: C) -> Self {
        Array {
            count: count.into(),
            subcon: Arc::new(subcon),
            discard: false,
        }
    }

    /// Parse elements but keep none of them.
    pub fn discard(mut self) -> Self {
        self.discard = true;
        self
    }
}

impl Construct for Array {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        let count = self.count.eval_len(ctx)?;
        let mut items = vec![];
        for _ in 0..count {
            let item = self.subcon.parse_stream(stream, ctx)?;
            if !self.discard {
                items.push(item);
            }
        }
        Ok(Value::ListContainer(ListContainer(items)))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        let items = obj.as_list().ok_or_else(|| Error::value_type("list", obj))?;
        let count = self.count.eval_len(ctx)?;
        if items.len() != count {
            return Err(Error::Count {
                expected: count,
                found: items.len(),
                path: ctx.path(),
            });
        }
        let built = items
            .iter()
            .map(|item| self.subcon.build_stream(item, stream, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::ListContainer(ListContainer(built)))
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        let count = self.count.eval_len(ctx).map_err(|e| Error::SizeIndeterminate {
            reason: e.to_string(),
            path: ctx.path(),
        })?;
        Ok(count * self.subcon.sizeof_ctx(ctx)?)
    }

    fn sizeof_value(&self, obj: &Value, ctx: &Context) -> Result<usize> {
        match obj.as_list() {
            Some(items) => items
                .iter()
                .map(|item| self.subcon.sizeof_value(item, ctx))
                .sum(),
            None => self.sizeof_ctx(ctx),
        }
    }
}

/// A field that must always hold `value`.
#[derive(Debug, Clone)]
pub struct Const {
    subcon: Subcon,
    value: Value,
}

impl Const {
    /// A constant byte string, e.g. a file signature.
    pub fn new(data: impl Into<bytes::Bytes>) -> Self {
        let data = data.into();
        Const {
            subcon: Arc::new(Bytes::new(data.len())),
            value: Value::Bytes(data),
        }
    }

    pub fn with<C: Construct + 'static>(subcon: C, value: Value) -> Self {
        Const {
            subcon: Arc::new(subcon),
            value,
        }
    }

    fn mismatch(&self, found: &Value, ctx: &Context) -> Error {
        Error::Const {
            expected: self.value.to_string(),
            found: found.to_string(),
            path: ctx.path(),
        }
    }
}

impl Construct for Const {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        let v = self.subcon.parse_stream(stream, ctx)?;
        if v != self.value {
            return Err(self.mismatch(&v, ctx));
        }
        Ok(v)
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        if !obj.is_none() && *obj != self.value {
            return Err(self.mismatch(obj, ctx));
        }
        self.subcon.build_stream(&self.value, stream, ctx)
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.subcon.sizeof_ctx(ctx)
    }

    fn sizeof_value(&self, _obj: &Value, ctx: &Context) -> Result<usize> {
        self.subcon.sizeof_value(&self.value, ctx)
    }

    fn flag_build_none(&self) -> bool {
        true
    }

    fn declared_default(&self) -> DeclaredDefault<'_> {
        DeclaredDefault::Const(&self.value)
    }
}

/// Builds `value` when given nothing.
#[derive(Debug, Clone)]
pub struct Defaulted {
    subcon: Subcon,
    value: ContextValue,
}

impl Defaulted {
    pub fn new<C: Construct + 'static>(subcon: C, value: impl Into<ContextValue>) -> Self {
        Defaulted {
            subcon: Arc::new(subcon),
            value: value.into(),
        }
    }
}

impl Construct for Defaulted {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        self.subcon.parse_stream(stream, ctx)
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        if obj.is_none() {
            let value = self.value.resolve(ctx)?;
            self.subcon.build_stream(&value, stream, ctx)
        } else {
            self.subcon.build_stream(obj, stream, ctx)
        }
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.subcon.sizeof_ctx(ctx)
    }

    fn sizeof_value(&self, obj: &Value, ctx: &Context) -> Result<usize> {
        if obj.is_none() {
            self.subcon.sizeof_ctx(ctx)
        } else {
            self.subcon.sizeof_value(obj, ctx)
        }
    }

    fn flag_build_none(&self) -> bool {
        true
    }

    fn declared_default(&self) -> DeclaredDefault<'_> {
        DeclaredDefault::Default(&self.value)
    }
}

/// `len` zero bytes, skipped on parse.
#[derive(Debug, Copy, Clone)]
pub struct Padding {
    len: usize,
}

impl Padding {
    pub fn new(len: usize) -> Self {
        Padding { len }
    }
}

impl Construct for Padding {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        stream.skip(self.len)?;
        Ok(Value::None)
    }

    fn build_stream(&self, _obj: &Value, stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        stream.write_zeros(self.len);
        Ok(Value::None)
    }

    fn sizeof_ctx(&self, _ctx: &Context) -> Result<usize> {
        Ok(self.len)
    }

    fn flag_build_none(&self) -> bool {
        true
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Pass;

impl Construct for Pass {
    fn parse_stream(&self, _stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        Ok(Value::None)
    }

    fn build_stream(&self, _obj: &Value, _stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        Ok(Value::None)
    }

    fn sizeof_ctx(&self, _ctx: &Context) -> Result<usize> {
        Ok(0)
    }

    fn flag_build_none(&self) -> bool {
        true
    }
}

/// Asserts that the stream has been fully consumed.
#[derive(Debug, Copy, Clone)]
pub struct Terminated;

impl Construct for Terminated {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        if !stream.is_at_end() {
            return Err(Error::NotTerminated(stream.remaining()));
        }
        Ok(Value::None)
    }

    fn build_stream(&self, _obj: &Value, _stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        Ok(Value::None)
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        Err(Error::SizeIndeterminate {
            reason: "Terminated depends on the stream length".to_string(),
            path: ctx.path(),
        })
    }

    fn flag_build_none(&self) -> bool {
        true
    }
}

/// A value derived from the context. Occupies no bytes.
#[derive(Debug, Clone)]
pub struct Computed {
    value: ContextValue,
}

impl Computed {
    pub fn new(value: impl Into<ContextValue>) -> Self {
        Computed {
            value: value.into(),
        }
    }
}

impl Construct for Computed {
    fn parse_stream(&self, _stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        self.value.resolve(ctx)
    }

    fn build_stream(&self, _obj: &Value, _stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        self.value.resolve(ctx)
    }

    fn sizeof_ctx(&self, _ctx: &Context) -> Result<usize> {
        Ok(0)
    }

    fn flag_build_none(&self) -> bool {
        true
    }
}

/// Current stream offset.
#[derive(Debug, Copy, Clone)]
pub struct Tell;

impl Construct for Tell {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        Ok(Value::Int(stream.position() as i128))
    }

    fn build_stream(&self, _obj: &Value, stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        Ok(Value::Int(stream.position() as i128))
    }

    fn sizeof_ctx(&self, _ctx: &Context) -> Result<usize> {
        Ok(0)
    }

    fn flag_build_none(&self) -> bool {
        true
    }
}

/// Attaches documentation and a post-parse hook to a codec.
#[derive(Clone)]
pub struct Renamed {
    subcon: Subcon,
    docs: Option<String>,
    parsed: Option<ParsedHook>,
}

impl Renamed {
    pub fn new(subcon: Subcon, docs: Option<String>, parsed: Option<ParsedHook>) -> Self {
        Renamed {
            subcon,
            docs,
            parsed,
        }
    }
}

impl std::fmt::Debug for Renamed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renamed")
            .field("subcon", &self.subcon)
            .field("docs", &self.docs)
            .field("parsed", &self.parsed.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl Construct for Renamed {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        let value = self.subcon.parse_stream(stream, ctx)?;
        if let Some(hook) = &self.parsed {
            hook(&value, ctx)?;
        }
        Ok(value)
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        self.subcon.build_stream(obj, stream, ctx)
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.subcon.sizeof_ctx(ctx)
    }

    fn sizeof_value(&self, obj: &Value, ctx: &Context) -> Result<usize> {
        self.subcon.sizeof_value(obj, ctx)
    }

    fn flag_build_none(&self) -> bool {
        self.subcon.flag_build_none()
    }

    fn declared_default(&self) -> DeclaredDefault<'_> {
        self.subcon.declared_default()
    }

    fn docs(&self) -> Option<&str> {
        self.docs.as_deref().or_else(|| self.subcon.docs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::ConstructExt;
    use crate::container;
    use crate::context::this;
    use crate::impls::{Int16ub, Int8ub};

    fn image() -> Struct {
        Struct::new()
            .field("width", Int8ub)
            .field("height", Int8ub)
            .field("pixels", Bytes::new(this("width") * this("height")))
    }

    #[test]
    fn test_struct_parse_and_build() {
        let parsed = image().parse(b"\x01\x02\x31\x32").unwrap();
        let expected = container! {
            "width" => 1u8,
            "height" => 2u8,
            "pixels" => bytes::Bytes::from_static(b"12"),
        };
        assert_eq!(parsed, Value::Container(expected.clone()));
        assert_eq!(
            image().build(&Value::Container(expected)).unwrap(),
            b"\x01\x02\x31\x32".to_vec()
        );
    }

    #[test]
    fn test_struct_missing_field() {
        let err = image()
            .build(&Value::Container(container! { "width" => 1u8 }))
            .unwrap_err();
        assert_eq!(
            err,
            Error::MissingField {
                name: "height".to_string(),
                path: "(building)".to_string()
            }
        );
    }

    #[test]
    fn test_struct_sizeof() {
        assert!(image().sizeof().unwrap_err().is_size_indeterminate());
        let bound = container! { "width" => 2u8, "height" => 3u8 };
        assert_eq!(image().sizeof_with(bound, &Context::sizing()).unwrap(), 8);
    }

    #[test]
    fn test_sizeof_value_nested() {
        let outer = Struct::new()
            .field("count", Int8ub)
            .field("images", Array::new(this("count"), image()));
        assert!(outer.sizeof().unwrap_err().is_size_indeterminate());

        let images = Value::List(vec![
            Value::Container(container! { "width" => 2u8, "height" => 2u8 }),
            Value::Container(container! { "width" => 1u8, "height" => 3u8 }),
        ]);
        let bound = container! { "count" => 2u8, "images" => images };
        assert_eq!(outer.sizeof_with(bound, &Context::sizing()).unwrap(), 1 + 6 + 5);
    }

    #[test]
    fn test_error_path() {
        let err = image().parse(b"\x01").unwrap_err();
        assert_eq!(err, Error::InsufficientData(1));
        let err = Struct::new()
            .field("magic", Const::new(&b"BM"[..]))
            .parse(b"XX")
            .unwrap_err();
        assert!(matches!(err, Error::Const { path, .. } if path == "(parsing) -> magic"));
    }

    #[test]
    fn test_array_count() {
        let array = Array::new(2, Int16ub);
        assert_eq!(array.sizeof().unwrap(), 4);
        let err = array
            .build(&Value::List(vec![Value::Int(1)]))
            .unwrap_err();
        assert!(matches!(err, Error::Count { expected: 2, found: 1, .. }));
        assert_eq!(
            Array::new(2, Int8ub).discard().parse(b"\x01\x02").unwrap(),
            Value::ListContainer(ListContainer(vec![]))
        );
    }

    #[test]
    fn test_defaulted_from_context() {
        let s = Struct::new()
            .field("count", Int8ub)
            .field("total", Defaulted::new(Int8ub, this("count") * 2));
        let out = s
            .build(&Value::Container(container! { "count" => 3u8 }))
            .unwrap();
        assert_eq!(out, vec![3, 6]);
    }

    #[test]
    fn test_tell_and_terminated() {
        let s = Struct::new()
            .field("a", Int16ub)
            .field("end", Tell)
            .field("_", Terminated);
        let parsed = s.parse(b"\x00\x01").unwrap().into_container().unwrap();
        assert_eq!(parsed.get("end"), Some(&Value::Int(2)));
        assert_eq!(s.parse(b"\x00\x01\x02").unwrap_err(), Error::NotTerminated(1));
    }
}
