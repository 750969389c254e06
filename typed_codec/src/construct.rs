use std::fmt;
use std::sync::Arc;

use crate::context::{Context, ContextValue};
use crate::stream_rw::{BuildStream, ParseStream};
use crate::value::Value;
use crate::Result;

/// What a codec would build when handed no value.
#[derive(Debug, Clone, Copy)]
pub enum DeclaredDefault<'a> {
    None,
    /// The codec always builds this exact value.
    Const(&'a Value),
    Default(&'a ContextValue),
}

/// A bidirectional binary codec.
///
/// `build_stream` returns the value that was actually written, which may
/// differ from `obj` (a constant or default filling in for `Value::None`).
/// Struct-like codecs record that value in the context so later fields can
/// refer to it.
pub trait Construct: fmt::Debug + Send + Sync {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value>;

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value>;

    /// Fails with [`crate::Error::SizeIndeterminate`] when the size depends on
    /// data that `ctx` does not carry.
    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize>;

    /// Size of `obj` once built. Codecs whose size depends on the value they
    /// hold (records, arrays) resolve it from `obj`; the rest ignore it.
    fn sizeof_value(&self, _obj: &Value, ctx: &Context) -> Result<usize> {
        self.sizeof_ctx(ctx)
    }

    /// Whether building from `Value::None` is meaningful.
    fn flag_build_none(&self) -> bool {
        false
    }

    fn declared_default(&self) -> DeclaredDefault<'_> {
        DeclaredDefault::None
    }

    fn docs(&self) -> Option<&str> {
        None
    }
}

impl<C: Construct + ?Sized> Construct for Arc<C> {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        (**self).parse_stream(stream, ctx)
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        (**self).build_stream(obj, stream, ctx)
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        (**self).sizeof_ctx(ctx)
    }

    fn sizeof_value(&self, obj: &Value, ctx: &Context) -> Result<usize> {
        (**self).sizeof_value(obj, ctx)
    }

    fn flag_build_none(&self) -> bool {
        (**self).flag_build_none()
    }

    fn declared_default(&self) -> DeclaredDefault<'_> {
        (**self).declared_default()
    }

    fn docs(&self) -> Option<&str> {
        (**self).docs()
    }
}

/// A shared, type-erased codec.
pub type Subcon = Arc<dyn Construct>;

/// Anything usable as a field codec: a codec, or the fallible creation of one
/// (nested record adapters validate their record type when created).
pub trait IntoSubcon {
    fn into_subcon(self) -> Result<Subcon>;
}

impl<C: Construct + 'static> IntoSubcon for C {
    fn into_subcon(self) -> Result<Subcon> {
        Ok(Arc::new(self))
    }
}

impl<C: Construct + 'static> IntoSubcon for Result<C> {
    fn into_subcon(self) -> Result<Subcon> {
        Ok(Arc::new(self?))
    }
}

/// Whole-buffer entry points for any codec.
pub trait ConstructExt: Construct {
    fn parse(&self, data: &[u8]) -> Result<Value> {
        let mut stream = ParseStream::new(data);
        self.parse_stream(&mut stream, &mut Context::parsing())
    }

    fn build(&self, obj: &Value) -> Result<Vec<u8>> {
        let mut stream = BuildStream::new();
        self.build_stream(obj, &mut stream, &mut Context::building())?;
        Ok(stream.into_vec())
    }

    fn sizeof(&self) -> Result<usize> {
        self.sizeof_ctx(&Context::sizing())
    }
}

impl<C: Construct + ?Sized> ConstructExt for C {}
