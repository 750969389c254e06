use crate::context::Context;
use crate::record::{Record, RecordAdapter};
use crate::stream_rw::BuildStream;
use crate::value::Value;
use crate::{Construct, Result};

pub fn encode_to_bytes<T>(record: &T) -> Result<Vec<u8>>
where
    T: Record,
{
    RecordAdapter::<T>::new()?.build(record)
}

pub fn encode_to_stream<T>(record: &T, s: &mut BuildStream) -> Result<()>
where
    T: Record,
{
    let adapter = RecordAdapter::<T>::new()?;
    let aggregate = Value::Container(adapter.encode(record)?);
    adapter
        .codec()
        .build_stream(&aggregate, s, &mut Context::building())?;
    Ok(())
}
