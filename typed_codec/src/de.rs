use crate::context::Context;
use crate::record::{Record, RecordAdapter};
use crate::stream_rw::ParseStream;
use crate::{Construct, Result};

pub fn decode_from_bytes<T>(buf: &[u8]) -> Result<T>
where
    T: Record,
{
    RecordAdapter::<T>::new()?.parse(buf)
}

/// Decodes one record and leaves the stream after it.
pub fn decode_from_stream<T>(s: &mut ParseStream<'_>) -> Result<T>
where
    T: Record,
{
    let adapter = RecordAdapter::<T>::new()?;
    let aggregate = adapter
        .codec()
        .parse_stream(s, &mut Context::parsing())?
        .into_container()?;
    adapter.decode(aggregate)
}
