use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

mod helpers;
use helpers::{parse_field_attrs, parse_self_attrs};

/// Implements `typed_codec::Record`, `ToValue` and `FromValue` for a struct
/// with named fields.
///
/// Every field carries `#[subcon(CODEC)]`, optionally followed by
/// `doc = "..."`, `parsed = HOOK` and `default_policy = POLICY`. One
/// `Container` field may be marked `#[record(extras)]` instead.
/// `#[record(reverse)]` on the struct lays its fields out in reverse order.
#[proc_macro_derive(Record, attributes(subcon, record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let s = match expand(input) {
        Ok(s) => s,
        Err(e) => e,
    };
    #[cfg(feature = "debug_prints")]
    eprintln!("{}", s);
    s.into()
}

fn expand(input: DeriveInput) -> Result<TokenStream2, TokenStream2> {
    let ident = &input.ident;
    let span = input.span();
    let fields = match input.data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            _ => {
                return Err(quote_spanned! {span=>
                    compile_error!("Record requires a struct with named fields");
                })
            }
        },
        Data::Enum(_) | Data::Union(_) => {
            return Err(quote_spanned! {span=>
                compile_error!("Record can only be derived for structs");
            })
        }
    };
    if !input.generics.params.is_empty() {
        let span = input.generics.span();
        return Err(quote_spanned! {span=>
            compile_error!("Record cannot be derived for generic structs");
        });
    }

    let (self_attrs, mut attr_errors) = parse_self_attrs(&input.attrs);
    let reverse = self_attrs.reverse;

    let mut specs = vec![];
    let mut inits = vec![];
    let mut getters = vec![];
    let mut setters = vec![];
    let mut extras = None;

    for f in &fields {
        let span = f.span();
        let (attrs, errors) = parse_field_attrs(&f.attrs);
        attr_errors.extend(errors);
        let Some(field) = &f.ident else { continue };
        let name = field.unraw().to_string();

        if attrs.extras {
            if extras.is_some() {
                attr_errors.push(quote_spanned! {span=>
                    compile_error!("only one field can hold the extras");
                });
            }
            extras = Some(field.clone());
            inits.push(quote! { #field: ::core::default::Default::default(), });
            continue;
        }

        let subcon = match &attrs.subcon {
            Some(s) => s,
            None => {
                attr_errors.push(quote_spanned! {span=>
                    compile_error!("field requires a #[subcon(...)] attribute");
                });
                continue;
            }
        };

        let mut options = vec![];
        match (&attrs.doc, attrs.doc_comments.is_empty()) {
            (Some(doc), _) => options.push(quote! { .doc(#doc) }),
            (None, false) => {
                let doc = attrs.doc_comments.join("\n");
                options.push(quote! { .doc(#doc) });
            }
            (None, true) => {}
        }
        if let Some(parsed) = &attrs.parsed {
            options.push(quote! { .parsed(#parsed) });
        }
        if let Some(policy) = &attrs.default_policy {
            options.push(quote! { .default_policy(#policy) });
        }

        specs.push(quote_spanned! {span=>
            .field(::typed_codec::FieldSpec::with_options(
                #name,
                #subcon,
                ::typed_codec::FieldOptions::default() #(#options)*,
            )?)
        });
        inits.push(quote! {
            #field: ::typed_codec::FromValue::from_value(
                definition.take_argument(&mut fields, #name)?,
            )?,
        });
        getters.push(quote! {
            #name => ::core::result::Result::Ok(::typed_codec::ToValue::to_value(&self.#field)),
        });
        setters.push(quote! {
            #name => {
                self.#field = ::typed_codec::FromValue::from_value(value)?;
                ::core::result::Result::Ok(())
            }
        });
    }

    let has_extras = extras.is_some();
    let extras_impl = extras.map(|field| {
        quote! {
            fn extras(&self) -> ::core::option::Option<&::typed_codec::Container> {
                ::core::option::Option::Some(&self.#field)
            }

            fn extras_mut(&mut self) -> ::core::option::Option<&mut ::typed_codec::Container> {
                ::core::option::Option::Some(&mut self.#field)
            }
        }
    });

    Ok(quote! {
        #[automatically_derived]
        impl ::typed_codec::Record for #ident {
            fn definition() -> ::typed_codec::Result<&'static ::typed_codec::RecordDefinition> {
                static DEFINITION: ::std::sync::OnceLock<
                    ::typed_codec::Result<::typed_codec::RecordDefinition>,
                > = ::std::sync::OnceLock::new();
                DEFINITION
                    .get_or_init(|| -> ::typed_codec::Result<::typed_codec::RecordDefinition> {
                        ::core::result::Result::Ok(
                            ::typed_codec::RecordDefinition::builder::<#ident>()
                                .reverse(#reverse)
                                .extras(#has_extras)
                                #(#specs)*
                                .finish(),
                        )
                    })
                    .as_ref()
                    .map_err(::core::clone::Clone::clone)
            }

            #[allow(unused_mut)]
            fn from_fields(mut fields: ::typed_codec::Container) -> ::typed_codec::Result<Self> {
                let definition = <#ident as ::typed_codec::Record>::definition()?;
                let record = #ident {
                    #(#inits)*
                };
                definition.ensure_consumed(&fields)?;
                ::core::result::Result::Ok(record)
            }

            fn get_field(&self, name: &str) -> ::typed_codec::Result<::typed_codec::Value> {
                match name {
                    #(#getters)*
                    _ => ::core::result::Result::Err(::typed_codec::Error::construction(
                        ::core::any::type_name::<#ident>(),
                        ::std::format!("no field '{}'", name),
                    )),
                }
            }

            fn set_field(&mut self, name: &str, value: ::typed_codec::Value) -> ::typed_codec::Result<()> {
                match name {
                    #(#setters)*
                    _ => ::core::result::Result::Err(::typed_codec::Error::construction(
                        ::core::any::type_name::<#ident>(),
                        ::std::format!("no field '{}'", name),
                    )),
                }
            }

            #extras_impl
        }

        #[automatically_derived]
        impl ::typed_codec::ToValue for #ident {
            fn to_value(&self) -> ::typed_codec::Value {
                ::typed_codec::Value::Record(::typed_codec::RecordValue::new(
                    ::core::clone::Clone::clone(self),
                ))
            }
        }

        #[automatically_derived]
        impl ::typed_codec::FromValue for #ident {
            fn from_value(value: ::typed_codec::Value) -> ::typed_codec::Result<Self> {
                value.into_record::<#ident>()
            }
        }

        #(#attr_errors)*
    })
}
