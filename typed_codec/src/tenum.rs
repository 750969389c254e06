//! Integer-backed symbolic domains that stay total on decode.
//!
//! Decoding an integer that is not a declared member synthesizes a
//! pseudo-member and registers it in the domain, so decoding the same integer
//! again yields an equal symbol. Registered pseudo-members live for the rest of
//! the process; a domain is closed over every integer it has seen.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use parking_lot::RwLock;
use tracing::debug;

use crate::construct::{Construct, ConstructExt, Subcon};
use crate::context::Context;
use crate::stream_rw::{BuildStream, ParseStream};
use crate::value::{EnumValue, Value};
use crate::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnumFamily {
    Plain,
    /// Members are bits that can be combined.
    Flags,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Member {
    Known { name: &'static str, value: i128 },
    Synthetic { value: i128 },
}

impl Member {
    pub fn value(&self) -> i128 {
        match self {
            Member::Known { value, .. } | Member::Synthetic { value } => *value,
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        match self {
            Member::Known { name, .. } => Some(*name),
            Member::Synthetic { .. } => None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Member::Synthetic { .. })
    }
}

/// The members of one enum type and its registry of pseudo-members.
pub struct EnumDomain {
    name: &'static str,
    family: EnumFamily,
    known: &'static [(&'static str, i128)],
    registry: RwLock<BTreeMap<i128, Member>>,
}

impl EnumDomain {
    pub const fn new(
        name: &'static str,
        family: EnumFamily,
        known: &'static [(&'static str, i128)],
    ) -> Self {
        EnumDomain {
            name,
            family,
            known,
            registry: parking_lot::const_rwlock(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn family(&self) -> EnumFamily {
        self.family
    }

    pub fn known(&self) -> impl Iterator<Item = Member> + '_ {
        self.known
            .iter()
            .map(|&(name, value)| Member::Known { name, value })
    }

    pub fn lookup(&self, value: i128) -> Option<Member> {
        self.known()
            .find(|m| m.value() == value)
            .or_else(|| self.registry.read().get(&value).copied())
    }

    /// The member for `value`, registering a pseudo-member on first sight.
    pub fn resolve_or_synthesize(&self, value: i128) -> Member {
        if let Some(member) = self.lookup(value) {
            return member;
        }
        let mut registry = self.registry.write();
        *registry.entry(value).or_insert_with(|| {
            debug!(domain = self.name, %value, "synthesized pseudo-member");
            Member::Synthetic { value }
        })
    }

    /// Pseudo-members registered so far, by value.
    pub fn synthesized(&self) -> Vec<Member> {
        self.registry.read().values().copied().collect()
    }

    /// Display name of `member`. Pseudo-members of a plain enum show their
    /// value; those of a flags enum show the known bits they contain.
    pub fn describe(&self, member: Member) -> String {
        let value = match member {
            Member::Known { name, .. } => return name.to_string(),
            Member::Synthetic { value } => value,
        };
        if self.family == EnumFamily::Plain || value == 0 {
            return value.to_string();
        }
        let mut rest = value;
        let mut parts = vec![];
        for (name, bits) in self.known {
            if *bits != 0 && rest & bits == *bits {
                parts.push(name.to_string());
                rest &= !bits;
            }
        }
        if rest != 0 {
            parts.push(rest.to_string());
        }
        parts.join("|")
    }
}

impl fmt::Debug for EnumDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumDomain")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("known", &self.known)
            .finish()
    }
}

/// A symbol type declared with [`typed_enum!`](crate::typed_enum) or
/// [`typed_flags!`](crate::typed_flags).
pub trait EnumBase: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    fn domain() -> &'static EnumDomain;

    fn from_member(member: Member) -> Self;

    fn member(&self) -> Member;

    fn value(&self) -> i128 {
        self.member().value()
    }

    fn name(&self) -> String {
        Self::domain().describe(self.member())
    }

    /// Total: unknown values become pseudo-members.
    fn from_int(value: i128) -> Self {
        Self::from_member(Self::domain().resolve_or_synthesize(value))
    }
}

pub trait FlagsEnumBase: EnumBase {
    fn bits(&self) -> i128 {
        self.value()
    }

    fn contains(&self, other: Self) -> bool {
        self.bits() & other.bits() == other.bits()
    }

    fn empty() -> Self {
        Self::from_int(0)
    }
}

/// Associated functions of [`EnumBase`] and [`FlagsEnumBase`]. A member const
/// with one of these names would shadow the function on the enum type.
const RESERVED_MEMBER_NAMES: [&str; 9] = [
    "domain",
    "from_member",
    "member",
    "value",
    "name",
    "from_int",
    "bits",
    "contains",
    "empty",
];

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

#[doc(hidden)]
pub const fn is_reserved_member_name(name: &str) -> bool {
    let mut i = 0;
    while i < RESERVED_MEMBER_NAMES.len() {
        if str_eq(RESERVED_MEMBER_NAMES[i], name) {
            return true;
        }
        i += 1;
    }
    false
}

#[doc(hidden)]
#[macro_export]
macro_rules! __typed_enum_impl {
    ($(#[$meta:meta])* $vis:vis $name:ident, $family:ident, { $($member:ident = $value:expr),* }) => {
        $(
            const _: () = ::core::assert!(
                !$crate::tenum::is_reserved_member_name(stringify!($member)),
                concat!("`", stringify!($member), "` is reserved and cannot name an enum member"),
            );
        )*

        $(#[$meta])*
        #[derive(Clone, Copy)]
        $vis struct $name($crate::tenum::Member);

        #[allow(non_upper_case_globals)]
        impl $name {
            $(
                pub const $member: $name = $name($crate::tenum::Member::Known {
                    name: stringify!($member),
                    value: $value,
                });
            )*
        }

        impl $crate::tenum::EnumBase for $name {
            fn domain() -> &'static $crate::tenum::EnumDomain {
                static DOMAIN: $crate::tenum::EnumDomain = $crate::tenum::EnumDomain::new(
                    stringify!($name),
                    $crate::tenum::EnumFamily::$family,
                    &[$((stringify!($member), $value)),*],
                );
                &DOMAIN
            }

            fn from_member(member: $crate::tenum::Member) -> Self {
                $name(member)
            }

            fn member(&self) -> $crate::tenum::Member {
                self.0
            }
        }

        impl ::core::cmp::PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.0.value() == other.0.value()
            }
        }

        impl ::core::cmp::Eq for $name {}

        impl ::core::hash::Hash for $name {
            fn hash<H: ::core::hash::Hasher>(&self, state: &mut H) {
                ::core::hash::Hash::hash(&self.0.value(), state)
            }
        }

        impl ::core::cmp::PartialEq<i128> for $name {
            fn eq(&self, other: &i128) -> bool {
                self.0.value() == *other
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}.{}", stringify!($name), $crate::tenum::EnumBase::name(self))
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&$crate::tenum::EnumBase::name(self))
            }
        }

        impl $crate::ToValue for $name {
            fn to_value(&self) -> $crate::Value {
                $crate::Value::Enum($crate::EnumValue::of(*self))
            }
        }

        impl $crate::FromValue for $name {
            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                match value {
                    $crate::Value::Enum(e) => e
                        .downcast::<Self>()
                        .ok_or_else(|| $crate::Error::value_type(stringify!($name), e)),
                    other => Err($crate::Error::value_type(stringify!($name), other)),
                }
            }
        }
    };
}

/// Declares an integer-backed enum whose unknown values decode to
/// pseudo-members.
///
/// Members cannot be named after the functions of [`EnumBase`] or
/// [`FlagsEnumBase`] (`value`, `name`, `empty`, ...); such a name fails to
/// compile.
///
/// ```
/// typed_codec::typed_enum! {
///     pub enum Number {
///         one = 1,
///         two = 2,
///     }
/// }
/// ```
#[macro_export]
macro_rules! typed_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($member:ident = $value:expr),* $(,)? }) => {
        $crate::__typed_enum_impl!($(#[$meta])* $vis $name, Plain, { $($member = $value),* });
    };
}

/// Like [`typed_enum!`], for bit flags. Symbols combine with `|` and `&`.
#[macro_export]
macro_rules! typed_flags {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($member:ident = $value:expr),* $(,)? }) => {
        $crate::__typed_enum_impl!($(#[$meta])* $vis $name, Flags, { $($member = $value),* });

        impl $crate::tenum::FlagsEnumBase for $name {}

        impl ::core::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                <Self as $crate::tenum::EnumBase>::from_int(self.0.value() | rhs.0.value())
            }
        }

        impl ::core::ops::BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                <Self as $crate::tenum::EnumBase>::from_int(self.0.value() & rhs.0.value())
            }
        }
    };
}

/// Maps an integer codec onto the symbols of `E`.
pub struct EnumAdapter<E: EnumBase> {
    subcon: Subcon,
    _marker: PhantomData<fn() -> E>,
}

impl<E: EnumBase> EnumAdapter<E> {
    /// Adapter for a plain enum. Flags enums are rejected.
    pub fn new<C: Construct + 'static>(subcon: C) -> Result<Self> {
        Self::checked(subcon, EnumFamily::Plain)
    }

    pub fn flags<C: Construct + 'static>(subcon: C) -> Result<Self>
    where
        E: FlagsEnumBase,
    {
        Self::checked(subcon, EnumFamily::Flags)
    }

    fn checked<C: Construct + 'static>(subcon: C, family: EnumFamily) -> Result<Self> {
        let domain = E::domain();
        if domain.family() != family {
            let expected = match family {
                EnumFamily::Plain => "a plain enum",
                EnumFamily::Flags => "a flags enum",
            };
            return Err(Error::type_constraint(domain.name(), expected));
        }
        debug!(domain = domain.name(), ?family, "created enum adapter");
        Ok(EnumAdapter {
            subcon: std::sync::Arc::new(subcon),
            _marker: PhantomData,
        })
    }

    pub fn decode(&self, raw: &Value) -> Result<E> {
        let value = match raw {
            Value::Int(v) => *v,
            other => return Err(Error::value_type("integer", other)),
        };
        Ok(E::from_int(value))
    }

    pub fn parse(&self, data: &[u8]) -> Result<E> {
        self.decode(&self.subcon.parse(data)?)
    }

    pub fn build(&self, symbol: E) -> Result<Vec<u8>> {
        self.subcon.build(&Value::Int(symbol.value()))
    }

    pub fn sizeof(&self) -> Result<usize> {
        self.subcon.sizeof()
    }
}

impl<E: EnumBase> fmt::Debug for EnumAdapter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumAdapter")
            .field("subcon", &self.subcon)
            .field("domain", &E::domain().name())
            .finish()
    }
}

impl<E: EnumBase> Construct for EnumAdapter<E> {
    fn parse_stream(&self, stream: &mut ParseStream<'_>, ctx: &mut Context) -> Result<Value> {
        let raw = self.subcon.parse_stream(stream, ctx)?;
        Ok(Value::Enum(EnumValue::of(self.decode(&raw)?)))
    }

    fn build_stream(&self, obj: &Value, stream: &mut BuildStream, ctx: &mut Context) -> Result<Value> {
        match obj {
            Value::Enum(e) if e.is::<E>() => {
                self.subcon
                    .build_stream(&Value::Int(e.value()), stream, ctx)?;
                Ok(obj.clone())
            }
            other => Err(Error::EncodeType {
                value: format!("{:?}", other),
                expected: E::domain().name().to_string(),
                path: ctx.path(),
            }),
        }
    }

    fn sizeof_ctx(&self, ctx: &Context) -> Result<usize> {
        self.subcon.sizeof_ctx(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::Int8ub;

    crate::typed_enum! {
        enum Color {
            red = 1,
            green = 2,
        }
    }

    crate::typed_flags! {
        enum Perm {
            read = 1,
            write = 2,
            exec = 4,
        }
    }

    #[test]
    fn test_resolve_known_and_synthetic() {
        assert_eq!(Color::from_int(1), Color::red);
        assert!(!Color::from_int(1).member().is_synthetic());

        let first = Color::from_int(77);
        assert!(first.member().is_synthetic());
        assert_eq!(first.to_string(), "77");
        assert_eq!(Color::from_int(77), first);
        assert_eq!(Color::domain().synthesized(), vec![Member::Synthetic { value: 77 }]);
    }

    #[test]
    fn test_flags_describe() {
        let rw = Perm::read | Perm::write;
        assert_eq!(rw, 3);
        assert_eq!(rw.to_string(), "read|write");
        assert!(rw.contains(Perm::write));
        assert!(!rw.contains(Perm::exec));
        assert_eq!((rw & Perm::write), Perm::write);
        assert_eq!(Perm::from_int(9).to_string(), "read|8");
        assert_eq!(Perm::empty().to_string(), "0");
        assert_eq!(format!("{:?}", Perm::exec), "Perm.exec");
    }

    #[test]
    fn test_reserved_member_names() {
        assert!(is_reserved_member_name("empty"));
        assert!(is_reserved_member_name("value"));
        assert!(is_reserved_member_name("contains"));
        assert!(!is_reserved_member_name("values"));
        assert!(!is_reserved_member_name("read"));
        assert!(!is_reserved_member_name(""));
    }

    #[test]
    fn test_family_mismatch() {
        assert!(EnumAdapter::<Perm>::new(Int8ub).unwrap_err().is_type_constraint());
        assert!(EnumAdapter::<Perm>::flags(Int8ub).is_ok());
    }
}
