use crate::attr::Endian;
use crate::construct::Construct;
use crate::context::{Context, Expr};
use crate::stream_rw::{BuildStream, ParseStream};
use crate::value::Value;
use crate::{Error, Result};

fn indeterminate(reason: impl ToString, ctx: &Context) -> Error {
    Error::SizeIndeterminate {
        reason: reason.to_string(),
        path: ctx.path(),
    }
}

fn expect_int(obj: &Value) -> Result<i128> {
    match obj {
        Value::Int(v) => Ok(*v),
        other => Err(Error::value_type("integer", other)),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NumKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

/// Fixed-width integer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FormatField {
    kind: NumKind,
    endian: Endian,
}

impl FormatField {
    pub const fn new(kind: NumKind, endian: Endian) -> Self {
        FormatField { kind, endian }
    }

    pub fn width(&self) -> usize {
        match self.kind {
            NumKind::U8 | NumKind::I8 => 1,
            NumKind::U16 | NumKind::I16 => 2,
            NumKind::U32 | NumKind::I32 => 4,
            NumKind::U64 | NumKind::I64 => 8,
        }
    }
}

impl Construct for FormatField {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        let v = match (self.kind, self.endian) {
            (NumKind::U8, _) => stream.get_u8()? as i128,
            (NumKind::I8, _) => stream.get_i8()? as i128,
            (NumKind::U16, Endian::Big) => stream.get_u16_be()? as i128,
            (NumKind::U16, Endian::Little) => stream.get_u16_le()? as i128,
            (NumKind::I16, Endian::Big) => stream.get_i16_be()? as i128,
            (NumKind::I16, Endian::Little) => stream.get_i16_le()? as i128,
            (NumKind::U32, Endian::Big) => stream.get_u32_be()? as i128,
            (NumKind::U32, Endian::Little) => stream.get_u32_le()? as i128,
            (NumKind::I32, Endian::Big) => stream.get_i32_be()? as i128,
            (NumKind::I32, Endian::Little) => stream.get_i32_le()? as i128,
            (NumKind::U64, Endian::Big) => stream.get_u64_be()? as i128,
            (NumKind::U64, Endian::Little) => stream.get_u64_le()? as i128,
            (NumKind::I64, Endian::Big) => stream.get_i64_be()? as i128,
            (NumKind::I64, Endian::Little) => stream.get_i64_le()? as i128,
        };
        Ok(Value::Int(v))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        let v = expect_int(obj)?;
        match (self.kind, self.endian) {
            (NumKind::U8, _) => stream.put_u8(v.try_into()?),
            (NumKind::I8, _) => stream.put_i8(v.try_into()?),
            (NumKind::U16, Endian::Big) => stream.put_u16_be(v.try_into()?),
            (NumKind::U16, Endian::Little) => stream.put_u16_le(v.try_into()?),
            (NumKind::I16, Endian::Big) => stream.put_i16_be(v.try_into()?),
            (NumKind::I16, Endian::Little) => stream.put_i16_le(v.try_into()?),
            (NumKind::U32, Endian::Big) => stream.put_u32_be(v.try_into()?),
            (NumKind::U32, Endian::Little) => stream.put_u32_le(v.try_into()?),
            (NumKind::I32, Endian::Big) => stream.put_i32_be(v.try_into()?),
            (NumKind::I32, Endian::Little) => stream.put_i32_le(v.try_into()?),
            (NumKind::U64, Endian::Big) => stream.put_u64_be(v.try_into()?),
            (NumKind::U64, Endian::Little) => stream.put_u64_le(v.try_into()?),
            (NumKind::I64, Endian::Big) => stream.put_i64_be(v.try_into()?),
            (NumKind::I64, Endian::Little) => stream.put_i64_le(v.try_into()?),
        }
        Ok(Value::Int(v))
    }

    fn sizeof_ctx(&self, _ctx: &Context) -> Result<usize> {
        Ok(self.width())
    }
}

macro_rules! format_fields {
    ($($name:ident = $kind:ident, $endian:ident;)*) => {
        $(
            #[allow(non_upper_case_globals)]
            pub const $name: FormatField = FormatField::new(NumKind::$kind, Endian::$endian);
        )*
    };
}

format_fields! {
    Byte = U8, Big;
    Int8ub = U8, Big;
    Int8sb = I8, Big;
    Int16ub = U16, Big;
    Int16ul = U16, Little;
    Int16sb = I16, Big;
    Int16sl = I16, Little;
    Int32ub = U32, Big;
    Int32ul = U32, Little;
    Int32sb = I32, Big;
    Int32sl = I32, Little;
    Int64ub = U64, Big;
    Int64ul = U64, Little;
    Int64sb = I64, Big;
    Int64sl = I64, Little;
}

/// IEEE 754 float, single or double precision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FloatField {
    double: bool,
    endian: Endian,
}

impl FloatField {
    pub const fn new(double: bool, endian: Endian) -> Self {
        FloatField { double, endian }
    }
}

impl Construct for FloatField {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        let v = match (self.double, self.endian) {
            (false, Endian::Big) => stream.get_f32_be()? as f64,
            (false, Endian::Little) => stream.get_f32_le()? as f64,
            (true, Endian::Big) => stream.get_f64_be()?,
            (true, Endian::Little) => stream.get_f64_le()?,
        };
        Ok(Value::Float(v))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        let v = match obj {
            Value::Float(v) => *v,
            other => return Err(Error::value_type("float", other)),
        };
        match (self.double, self.endian) {
            (false, Endian::Big) => stream.put_f32_be(v as f32),
            (false, Endian::Little) => stream.put_f32_le(v as f32),
            (true, Endian::Big) => stream.put_f64_be(v),
            (true, Endian::Little) => stream.put_f64_le(v),
        }
        Ok(obj.clone())
    }

    fn sizeof_ctx(&self, _ctx: &Context) -> Result<usize> {
        Ok(if self.double { 8 } else { 4 })
    }
}

#[allow(non_upper_case_globals)]
pub const Float32b: FloatField = FloatField::new(false, Endian::Big);
#[allow(non_upper_case_globals)]
pub const Float32l: FloatField = FloatField::new(false, Endian::Little);
#[allow(non_upper_case_globals)]
pub const Float64b: FloatField = FloatField::new(true, Endian::Big);
#[allow(non_upper_case_globals)]
pub const Float64l: FloatField = FloatField::new(true, Endian::Little);

/// One byte, any non-zero value parses as `true`.
#[derive(Debug, Copy, Clone)]
pub struct Flag;

impl Construct for Flag {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        Ok(Value::Bool(stream.get_u8()? != 0))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        match obj {
            Value::Bool(b) => {
                stream.put_u8(if *b { 1 } else { 0 });
                Ok(obj.clone())
            }
            other => Err(Error::value_type("bool", other)),
        }
    }

    fn sizeof_ctx(&self, _ctx: &Context) -> Result<usize> {
        Ok(1)
    }
}

/// A byte string whose length may refer to earlier fields.
#[derive(Debug, Clone)]
pub struct Bytes {
    length: Expr,
}

impl Bytes {
    pub fn new(length: impl Into<Expr>) -> Self {
        Bytes {
            length: length.into(),
        }
    }
}

impl Construct for Bytes {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        let len = self.length.eval_len(ctx)?;
        Ok(Value::Bytes(stream.read_bytes(len)?))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        let data = match obj {
            Value::Bytes(b) => b,
            other => return Err(Error::value_type("bytes", other)),
        };
        let len = self.length.eval_len(ctx)?;
        if data.len() != len {
            return Err(Error::Count {
                expected: len,
                found: data.len(),
                path: ctx.path(),
            });
        }
        stream.write_bytes(data);
        Ok(obj.clone())
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.length.eval_len(ctx).map_err(|e| indeterminate(e, ctx))
    }
}

/// Everything up to the end of the stream.
#[derive(Debug, Copy, Clone)]
pub struct GreedyBytes;

impl Construct for GreedyBytes {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        Ok(Value::Bytes(stream.read_to_end()))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        match obj {
            Value::Bytes(b) => {
                stream.write_bytes(b);
                Ok(obj.clone())
            }
            other => Err(Error::value_type("bytes", other)),
        }
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        Err(indeterminate("GreedyBytes reads until end of stream", ctx))
    }
}

/// NUL-terminated UTF-8 string.
#[derive(Debug, Copy, Clone)]
pub struct CString;

impl Construct for CString {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, _ctx: &mut Context) -> Result<Value> {
        let mut data = vec![];
        loop {
            match stream.get_u8()? {
                0 => return Ok(Value::Str(String::from_utf8(data)?)),
                v => data.push(v),
            }
        }
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, _ctx: &mut Context) -> Result<Value> {
        match obj {
            Value::Str(s) => {
                stream.write_bytes(s.as_bytes());
                stream.put_u8(0);
                Ok(obj.clone())
            }
            other => Err(Error::value_type("string", other)),
        }
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        Err(indeterminate("CString is terminated by a NUL byte", ctx))
    }
}
