use std::fmt;
use std::marker::PhantomData;

use crate::construct::{Construct, ConstructExt};
use crate::context::{Context, Expr};
use crate::stream_rw::{BuildStream, ParseStream};
use crate::subcons::Array;
use crate::value::{FromValue, ToValue, Value};
use crate::Result;

/// An [`Array`] whose parsed value is a plain `Value::List`, and whose typed
/// surface is `Vec<T>`.
pub struct TArray<T> {
    inner: Array,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromValue + ToValue> TArray<T> {
    pub fn new<C: Construct + 'static>(count: impl Into<Expr>, subcon: C) -> Self {
        TArray {
            inner: Array::new(count, subcon),
            _marker: PhantomData,
        }
    }

    pub fn discard(mut self) -> Self {
        self.inner = self.inner.discard();
        self
    }

    pub fn parse(&self, data: &[u8]) -> Result<Vec<T>> {
        Vec::<T>::from_value(ConstructExt::parse(self, data)?)
    }

    pub fn build(&self, items: &[T]) -> Result<Vec<u8>> {
        let items = Value::List(items.iter().map(ToValue::to_value).collect());
        ConstructExt::build(self, &items)
    }

    pub fn sizeof(&self) -> Result<usize> {
        ConstructExt::sizeof(self)
    }
}

impl<T> fmt::Debug for TArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TArray").field(&self.inner).finish()
    }
}

impl<T> Construct for TArray<T> {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        match self.inner.parse_stream(stream, ctx)? {
            Value::ListContainer(items) => Ok(Value::List(items.into_inner())),
            other => Ok(other),
        }
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        self.inner.build_stream(obj, stream, ctx)?;
        Ok(obj.clone())
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.inner.sizeof_ctx(ctx)
    }

    fn sizeof_value(&self, obj: &Value, ctx: &Context) -> Result<usize> {
        self.inner.sizeof_value(obj, ctx)
    }
}
