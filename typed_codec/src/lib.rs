mod de;
pub use de::{decode_from_bytes, decode_from_stream};

mod ser;
pub use ser::{encode_to_bytes, encode_to_stream};

pub mod attr;
pub use attr::{Endian, RecordOptions};

pub mod error;
pub use error::{Error, Result};

pub mod stream_rw;
pub use stream_rw::{BuildStream, ParseStream};

pub mod value;
pub use value::{Container, EnumValue, FromValue, ListContainer, RecordValue, ToValue, Value};

pub mod context;
pub use context::{parent, this, Context, ContextValue, Expr};

pub mod construct;
pub use construct::{Construct, ConstructExt, DeclaredDefault, IntoSubcon, Subcon};

pub mod impls;
pub use impls::*;

pub mod subcons;
pub use subcons::{
    Array, Computed, Const, Defaulted, Padding, Pass, Renamed, Struct, Tell, Terminated,
};

pub mod field;
pub use field::{DefaultPolicy, FieldOptions, FieldSpec, ParsedHook};

pub mod record;
pub use record::{Record, RecordAdapter, RecordBuilder, RecordCodec, RecordDefinition};

pub mod tenum;
pub use tenum::{EnumAdapter, EnumBase, EnumDomain, EnumFamily, FlagsEnumBase, Member};

mod tarray;
pub use tarray::TArray;

pub use typed_codec_derive::Record;

pub use bytes;
