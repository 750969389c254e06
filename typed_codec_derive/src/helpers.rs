use proc_macro2::TokenStream as TokenStream2;
use quote::quote_spanned;
use syn::parse::ParseStream;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, Ident, Lit, LitStr, Meta, Token};

pub(crate) struct SelfAttrs {
    pub reverse: bool,
}

pub(crate) struct FieldAttrs {
    pub subcon: Option<Expr>,
    pub doc: Option<LitStr>,
    pub parsed: Option<Expr>,
    pub default_policy: Option<Expr>,
    pub extras: bool,
    /// `///` comments, used when no `doc = ".."` is given.
    pub doc_comments: Vec<String>,
}

fn illegal(span: proc_macro2::Span, msg: &str) -> TokenStream2 {
    quote_spanned! {span=>
        compile_error!(#msg);
    }
}

pub(crate) fn parse_self_attrs(input: &[Attribute]) -> (SelfAttrs, Vec<TokenStream2>) {
    let mut self_attrs = SelfAttrs { reverse: false };
    let mut errors = vec![];

    for attr in input {
        if attr.path().is_ident("subcon") {
            errors.push(illegal(attr.span(), "illegal attribute target"));
        } else if attr.path().is_ident("record") {
            let res = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("reverse") {
                    self_attrs.reverse = true;
                } else if meta.path.is_ident("extras") {
                    errors.push(illegal(meta.path.span(), "illegal attribute target"));
                } else {
                    errors.push(illegal(meta.path.span(), "unknown attribute"));
                }
                Ok(())
            });
            if let Err(e) = res {
                errors.push(e.to_compile_error());
            }
        }
    }

    (self_attrs, errors)
}

fn parse_subcon_args(input: ParseStream, attrs: &mut FieldAttrs) -> syn::Result<()> {
    attrs.subcon = Some(input.parse()?);
    while !input.is_empty() {
        input.parse::<Token![,]>()?;
        if input.is_empty() {
            break;
        }
        let key: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        if key == "doc" {
            attrs.doc = Some(input.parse()?);
        } else if key == "parsed" {
            attrs.parsed = Some(input.parse()?);
        } else if key == "default_policy" {
            attrs.default_policy = Some(input.parse()?);
        } else {
            return Err(syn::Error::new(key.span(), "unknown attribute"));
        }
    }
    Ok(())
}

pub(crate) fn parse_field_attrs(input: &[Attribute]) -> (FieldAttrs, Vec<TokenStream2>) {
    let mut attrs = FieldAttrs {
        subcon: None,
        doc: None,
        parsed: None,
        default_policy: None,
        extras: false,
        doc_comments: vec![],
    };
    let mut errors = vec![];

    for attr in input {
        if attr.path().is_ident("subcon") {
            if attrs.subcon.is_some() {
                errors.push(illegal(attr.span(), "duplicate subcon attribute"));
                continue;
            }
            if let Err(e) = attr.parse_args_with(|input: ParseStream| parse_subcon_args(input, &mut attrs)) {
                errors.push(e.to_compile_error());
            }
        } else if attr.path().is_ident("record") {
            let res = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("extras") {
                    attrs.extras = true;
                } else if meta.path.is_ident("reverse") {
                    errors.push(illegal(meta.path.span(), "illegal attribute target"));
                } else {
                    errors.push(illegal(meta.path.span(), "unknown attribute"));
                }
                Ok(())
            });
            if let Err(e) = res {
                errors.push(e.to_compile_error());
            }
        } else if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let Expr::Lit(syn::ExprLit {
                    lit: Lit::Str(s), ..
                }) = &nv.value
                {
                    attrs.doc_comments.push(s.value());
                }
            }
        }
    }

    if attrs.extras && attrs.subcon.is_some() {
        errors.push(illegal(
            input[0].span(),
            "an extras field cannot have a subcon",
        ));
    }

    (attrs, errors)
}
