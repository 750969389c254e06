use std::fmt;
use std::sync::Arc;

use crate::construct::{DeclaredDefault, IntoSubcon, Subcon};
use crate::context::Context;
use crate::subcons::Renamed;
use crate::value::Value;
use crate::{Error, Result};

/// Called with every parsed value of a field, before the record is assembled.
pub type ParsedHook = Arc<dyn Fn(&Value, &Context) -> Result<()> + Send + Sync>;

/// How a field treats a default that can only be computed during parse/build.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DefaultPolicy {
    /// The field simply has no default.
    #[default]
    Lenient,
    /// Such defaults are rejected when the field is defined.
    LiteralOnly,
}

#[derive(Clone, Default)]
pub struct FieldOptions {
    pub doc: Option<String>,
    pub parsed: Option<ParsedHook>,
    pub default_policy: DefaultPolicy,
}

impl FieldOptions {
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn parsed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &Context) -> Result<()> + Send + Sync + 'static,
    {
        self.parsed = Some(Arc::new(hook));
        self
    }

    pub fn default_policy(mut self, policy: DefaultPolicy) -> Self {
        self.default_policy = policy;
        self
    }
}

/// One field of a record: its codec plus construction metadata.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    subcon: Subcon,
    docs: Option<String>,
    parsed: Option<ParsedHook>,
    init: bool,
    default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, subcon: impl IntoSubcon) -> Result<Self> {
        Self::with_options(name, subcon, FieldOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        subcon: impl IntoSubcon,
        options: FieldOptions,
    ) -> Result<Self> {
        let name = name.into();
        let mut subcon = subcon.into_subcon()?;

        let docs = options.doc.as_deref().map(dedent).filter(|d| !d.is_empty());
        if docs.is_some() || options.parsed.is_some() {
            subcon = Arc::new(Renamed::new(subcon, docs, options.parsed.clone()));
        }
        let docs = subcon.docs().map(str::to_string);

        let (init, default) = if subcon.flag_build_none() {
            let default = match subcon.declared_default() {
                DeclaredDefault::Const(v) => Some(v.clone()),
                DeclaredDefault::Default(v) if v.is_context_dependent() => {
                    if options.default_policy == DefaultPolicy::LiteralOnly {
                        return Err(Error::type_constraint(
                            format!("default of field '{}'", name),
                            "a literal, context-dependent default is not supported",
                        ));
                    }
                    None
                }
                DeclaredDefault::Default(v) => Some(v.resolve(&Context::new())?),
                DeclaredDefault::None => None,
            };
            (false, default)
        } else {
            (true, None)
        };

        Ok(FieldSpec {
            name,
            subcon,
            docs,
            parsed: options.parsed,
            init,
            default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subcon(&self) -> &Subcon {
        &self.subcon
    }

    pub fn docs(&self) -> Option<&str> {
        self.docs.as_deref()
    }

    pub fn parsed(&self) -> Option<&ParsedHook> {
        self.parsed.as_ref()
    }

    /// Whether the field is a constructor argument.
    pub fn init(&self) -> bool {
        self.init
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("subcon", &self.subcon)
            .field("docs", &self.docs)
            .field("init", &self.init)
            .field("default", &self.default)
            .finish()
    }
}

/// Strips surrounding blank lines and the indentation common to all lines.
fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) => (f, l),
        _ => return String::new(),
    };
    let lines = &lines[first..=last];
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{this, ContextValue};
    use crate::impls::{Bytes, Int8ub};
    use crate::subcons::{Const, Defaulted, Padding};

    #[test]
    fn test_required_field() {
        let field = FieldSpec::new("width", Int8ub).unwrap();
        assert!(field.init());
        assert_eq!(field.default(), None);
        assert!(field.docs().is_none());
    }

    #[test]
    fn test_const_field_is_excluded() {
        let field = FieldSpec::new("signature", Const::new(&b"BMP"[..])).unwrap();
        assert!(!field.init());
        assert_eq!(
            field.default(),
            Some(&Value::Bytes(bytes::Bytes::from_static(b"BMP")))
        );
    }

    #[test]
    fn test_default_resolution() {
        let literal = FieldSpec::new("a", Defaulted::new(Int8ub, Value::Int(7))).unwrap();
        assert!(!literal.init());
        assert_eq!(literal.default(), Some(&Value::Int(7)));

        let computed = FieldSpec::new("b", Defaulted::new(Int8ub, this("a") + 1)).unwrap();
        assert!(!computed.init());
        assert_eq!(computed.default(), None);

        let padding = FieldSpec::new("_pad", Padding::new(2)).unwrap();
        assert!(!padding.init());
        assert_eq!(padding.default(), None);
    }

    #[test]
    fn test_literal_only_rejects_context_default() {
        let subcon = Defaulted::new(
            Bytes::new(4),
            ContextValue::func(|_| Ok(Value::Bytes(bytes::Bytes::from_static(b"\0\0\0\0")))),
        );
        let options = FieldOptions::default().default_policy(DefaultPolicy::LiteralOnly);
        let err = FieldSpec::with_options("data", subcon, options).unwrap_err();
        assert!(err.is_type_constraint());
    }

    #[test]
    fn test_docs_are_dedented() {
        let options = FieldOptions::default().doc(
            "
                Width of the image.
                  In pixels.
            ",
        );
        let field = FieldSpec::with_options("width", Int8ub, options).unwrap();
        assert_eq!(field.docs(), Some("Width of the image.\n  In pixels."));
        assert!(field.init());
    }
}
