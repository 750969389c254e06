use std::io::Cursor;

use bytes::{Buf, BufMut, BytesMut};

use crate::{Error, Result};

macro_rules! get_stdnum {
    ($name:ident,$ty:ty,$get:ident) => {
        pub fn $name(&mut self) -> Result<$ty> {
            self.req(std::mem::size_of::<$ty>())?;
            Ok(self.cursor.$get())
        }
    };
}

/// Read side of a codec: a byte slice with a position.
pub struct ParseStream<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ParseStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ParseStream {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    pub fn is_at_end(&self) -> bool {
        !self.cursor.has_remaining()
    }

    pub fn req(&self, len: usize) -> Result<()> {
        if self.remaining() < len {
            Err(Error::InsufficientData(len - self.remaining()))
        } else {
            Ok(())
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<bytes::Bytes> {
        self.req(len)?;
        Ok(self.cursor.copy_to_bytes(len))
    }

    pub fn read_to_end(&mut self) -> bytes::Bytes {
        let len = self.remaining();
        self.cursor.copy_to_bytes(len)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.req(len)?;
        self.cursor.advance(len);
        Ok(())
    }

    get_stdnum!(get_f32_be, f32, get_f32);
    get_stdnum!(get_f32_le, f32, get_f32_le);
    get_stdnum!(get_f64_be, f64, get_f64);
    get_stdnum!(get_f64_le, f64, get_f64_le);
    get_stdnum!(get_i8, i8, get_i8);
    get_stdnum!(get_i16_be, i16, get_i16);
    get_stdnum!(get_i16_le, i16, get_i16_le);
    get_stdnum!(get_i32_be, i32, get_i32);
    get_stdnum!(get_i32_le, i32, get_i32_le);
    get_stdnum!(get_i64_be, i64, get_i64);
    get_stdnum!(get_i64_le, i64, get_i64_le);
    get_stdnum!(get_u8, u8, get_u8);
    get_stdnum!(get_u16_be, u16, get_u16);
    get_stdnum!(get_u16_le, u16, get_u16_le);
    get_stdnum!(get_u32_be, u32, get_u32);
    get_stdnum!(get_u32_le, u32, get_u32_le);
    get_stdnum!(get_u64_be, u64, get_u64);
    get_stdnum!(get_u64_le, u64, get_u64_le);
}

macro_rules! put_stdnum {
    ($name:ident,$ty:ty,$put:ident) => {
        pub fn $name(&mut self, v: $ty) {
            self.buf.$put(v)
        }
    };
}

/// Write side of a codec. The position is the number of bytes written so far.
#[derive(Debug, Default)]
pub struct BuildStream {
    buf: BytesMut,
}

impl BuildStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data)
    }

    pub fn write_zeros(&mut self, len: usize) {
        self.buf.put_bytes(0, len)
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    put_stdnum!(put_f32_be, f32, put_f32);
    put_stdnum!(put_f32_le, f32, put_f32_le);
    put_stdnum!(put_f64_be, f64, put_f64);
    put_stdnum!(put_f64_le, f64, put_f64_le);
    put_stdnum!(put_i8, i8, put_i8);
    put_stdnum!(put_i16_be, i16, put_i16);
    put_stdnum!(put_i16_le, i16, put_i16_le);
    put_stdnum!(put_i32_be, i32, put_i32);
    put_stdnum!(put_i32_le, i32, put_i32_le);
    put_stdnum!(put_i64_be, i64, put_i64);
    put_stdnum!(put_i64_le, i64, put_i64_le);
    put_stdnum!(put_u8, u8, put_u8);
    put_stdnum!(put_u16_be, u16, put_u16);
    put_stdnum!(put_u16_le, u16, put_u16_le);
    put_stdnum!(put_u32_be, u32, put_u32);
    put_stdnum!(put_u32_le, u32, put_u32_le);
    put_stdnum!(put_u64_be, u64, put_u64);
    put_stdnum!(put_u64_le, u64, put_u64_le);
}
