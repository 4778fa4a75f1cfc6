use crate::model::{EnumValue, Member, Operation, ScalarKind, Shape, ShapeKind};
use crate::symbol::RustType;
use crate::util::{field_ident, fn_ident, tok_id, type_ident, type_name};
use crate::{Context, GenError};
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use std::collections::HashMap;

pub(crate) fn builder_ident(shape: &str) -> Ident {
    tok_id(&format!("{}Builder", type_name(shape)))
}

pub(crate) fn error_enum_ident(operation: &str) -> Ident {
    tok_id(&format!("{}Error", type_name(operation)))
}

pub(crate) fn doc_attrs(doc: Option<&str>) -> TokenStream {
    let lines = doc.into_iter().flat_map(str::lines).map(|line| format!(" {}", line.trim()));
    quote! { #(#[doc = #lines])* }
}

/// Hands out identifiers within one namespace, rejecting the second owner
/// of any identifier.
pub(crate) struct Idents<'s> {
    shape: &'s str,
    seen: HashMap<String, String>,
}

impl<'s> Idents<'s> {
    pub(crate) fn new(shape: &'s str) -> Idents<'s> {
        Idents {
            shape,
            seen: HashMap::new(),
        }
    }

    pub(crate) fn claim(&mut self, ident: &Ident, owner: &str) -> Result<(), GenError> {
        let key = ident.to_string();
        if let Some(other) = self.seen.get(&key) {
            return Err(GenError::DuplicateIdent {
                shape: self.shape.to_owned(),
                name: owner.to_owned(),
                other: other.clone(),
                ident: key,
            });
        }
        self.seen.insert(key, owner.to_owned());
        Ok(())
    }
}

fn check_variant(shape: &Shape, name: &str, reserved: &str) -> Result<Ident, GenError> {
    let variant = type_name(name);
    if variant == reserved {
        return Err(GenError::ReservedVariant {
            shape: shape.name.clone(),
            name: name.to_owned(),
        });
    }
    Ok(tok_id(&variant))
}

/// Data types for every struct, union and enum, plus one error enum per
/// operation.
pub(crate) fn types(ctx: &Context<'_>) -> Result<TokenStream, GenError> {
    check_type_names(ctx)?;
    let mut out = TokenStream::new();
    for shape in ctx.model.shapes.values() {
        let tokens = match &shape.kind {
            ShapeKind::Struct(members) => gen_struct(ctx, shape, members)?,
            ShapeKind::Union(members) => gen_union(ctx, shape, members)?,
            ShapeKind::Enum(values) => gen_enum(shape, values)?,
            ShapeKind::Scalar(_) | ShapeKind::List { .. } | ShapeKind::Map { .. } => continue,
        };
        tracing::debug!(shape = %shape.name, "generated type");
        out.extend(tokens);
    }
    for operation in &ctx.model.operations {
        out.extend(gen_operation_error(ctx, operation)?);
    }
    Ok(out)
}

fn check_type_names(ctx: &Context<'_>) -> Result<(), GenError> {
    let mut idents = Idents::new("model");
    for shape in ctx.model.shapes.values() {
        match shape.kind {
            ShapeKind::Struct(_) => {
                idents.claim(&type_ident(&shape.name), &shape.name)?;
                idents.claim(&builder_ident(&shape.name), &shape.name)?;
            }
            ShapeKind::Union(_) | ShapeKind::Enum(_) => {
                idents.claim(&type_ident(&shape.name), &shape.name)?;
            }
            _ => {}
        }
    }
    for operation in &ctx.model.operations {
        idents.claim(&error_enum_ident(&operation.name), &operation.name)?;
    }
    Ok(())
}

fn gen_struct(ctx: &Context<'_>, shape: &Shape, members: &[Member]) -> Result<TokenStream, GenError> {
    let name = type_ident(&shape.name);
    let builder = builder_ident(&shape.name);
    let shape_name = shape.name.as_str();
    let desc = doc_attrs(shape.doc.as_deref());

    let mut methods = Idents::new(&shape.name);
    methods.claim(&tok_id("build"), "build")?;

    let mut fields = Vec::with_capacity(members.len());
    let mut builder_fields = Vec::with_capacity(members.len());
    let mut setters = Vec::with_capacity(members.len());
    let mut build_fields = Vec::with_capacity(members.len());
    for member in members {
        let field = field_ident(&member.name);
        let set = fn_ident("set_", &member.name, "");
        let get = fn_ident("get_", &member.name, "");
        for ident in [&field, &set, &get] {
            methods.claim(ident, &member.name)?;
        }
        let ty = ctx.member_type(shape, &member.target)?.ty;
        let member_doc = doc_attrs(member.doc.as_deref());
        let member_name = member.name.as_str();

        if member.required {
            fields.push(quote! { #member_doc pub #field: #ty, });
            build_fields.push(quote! {
                #field: self.#field.ok_or(::xml_wire::BuildError::MissingMember {
                    shape: #shape_name,
                    member: #member_name,
                })?,
            });
        } else {
            fields.push(quote! { #member_doc pub #field: ::std::option::Option<#ty>, });
            build_fields.push(quote! { #field: self.#field, });
        }
        builder_fields.push(quote! { #field: ::std::option::Option<#ty>, });
        setters.push(quote! {
            #member_doc
            pub fn #field(mut self, value: #ty) -> Self {
                self.#field = Some(value);
                self
            }
            pub fn #set(mut self, value: ::std::option::Option<#ty>) -> Self {
                self.#field = value;
                self
            }
            pub fn #get(&self) -> &::std::option::Option<#ty> {
                &self.#field
            }
        });

        let target = ctx.target(shape, &member.target)?;
        match &target.kind {
            ShapeKind::List { member: item } => {
                let push = fn_ident("push_", &member.name, "");
                methods.claim(&push, &member.name)?;
                let item = ctx.member_type(target, &item.target)?.ty;
                setters.push(quote! {
                    pub fn #push(mut self, item: #item) -> Self {
                        self.#field.get_or_insert_with(::std::default::Default::default).push(item);
                        self
                    }
                });
            }
            ShapeKind::Map { key, value } => {
                let insert = fn_ident("insert_", &member.name, "");
                methods.claim(&insert, &member.name)?;
                let key = ctx.member_type(target, &key.target)?.ty;
                let value = ctx.member_type(target, &value.target)?.ty;
                setters.push(quote! {
                    pub fn #insert(mut self, key: #key, value: #value) -> Self {
                        self.#field.get_or_insert_with(::std::default::Default::default).insert(key, value);
                        self
                    }
                });
            }
            _ => {}
        }
    }

    let error_impls = if ctx.is_error(shape) {
        gen_error_display(ctx, shape, members)?
    } else {
        quote! {}
    };

    Ok(quote! {
        #desc
        #[derive(Debug, Clone, PartialEq)]
        pub struct #name {
            #(#fields)*
        }
        impl #name {
            pub fn builder() -> #builder {
                <#builder as ::std::default::Default>::default()
            }
        }
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct #builder {
            #(#builder_fields)*
        }
        impl #builder {
            #(#setters)*
            pub fn build(self) -> ::std::result::Result<#name, ::xml_wire::BuildError> {
                Ok(#name {
                    #(#build_fields)*
                })
            }
        }
        #error_impls
    })
}

/// `Display` and `Error` for structs that describe a failure. The message
/// member, when the shape has a string one, follows the shape name.
fn gen_error_display(ctx: &Context<'_>, shape: &Shape, members: &[Member]) -> Result<TokenStream, GenError> {
    let name = type_ident(&shape.name);
    let shape_name = shape.name.as_str();
    let mut message = quote! {};
    for member in members {
        let is_string = matches!(ctx.target(shape, &member.target)?.kind, ShapeKind::Scalar(ScalarKind::String));
        if !member.name.eq_ignore_ascii_case("message") || !is_string || member.target.indirect {
            continue;
        }
        let field = field_ident(&member.name);
        message = if member.required {
            quote! { write!(f, ": {}", self.#field)?; }
        } else {
            quote! {
                if let Some(message) = &self.#field {
                    write!(f, ": {}", message)?;
                }
            }
        };
        break;
    }
    Ok(quote! {
        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(#shape_name)?;
                #message
                Ok(())
            }
        }
        impl ::std::error::Error for #name {}
    })
}

fn gen_union(ctx: &Context<'_>, shape: &Shape, members: &[Member]) -> Result<TokenStream, GenError> {
    let name = type_ident(&shape.name);
    let desc = doc_attrs(shape.doc.as_deref());
    let mut variants = Idents::new(&shape.name);
    let mut methods = Idents::new(&shape.name);
    methods.claim(&tok_id("is_unknown"), "Unknown")?;

    let mut cases = Vec::with_capacity(members.len());
    let mut accessors = Vec::with_capacity(members.len());
    for member in members {
        let variant = check_variant(shape, &member.name, "Unknown")?;
        variants.claim(&variant, &member.name)?;
        let as_fn = fn_ident("as_", &member.name, "");
        let is_fn = fn_ident("is_", &member.name, "");
        methods.claim(&as_fn, &member.name)?;
        methods.claim(&is_fn, &member.name)?;

        let ty = ctx.member_type(shape, &member.target)?.ty;
        let member_doc = doc_attrs(member.doc.as_deref());
        cases.push(quote! { #member_doc #variant(#ty), });
        accessors.push(quote! {
            pub fn #as_fn(&self) -> ::std::result::Result<&#ty, &Self> {
                if let #name::#variant(value) = self {
                    Ok(value)
                } else {
                    Err(self)
                }
            }
            pub fn #is_fn(&self) -> bool {
                self.#as_fn().is_ok()
            }
        });
    }

    Ok(quote! {
        #desc
        #[derive(Debug, Clone, PartialEq)]
        pub enum #name {
            #(#cases)*
            /// A member this version of the model does not know about.
            Unknown,
        }
        impl #name {
            #(#accessors)*
            pub fn is_unknown(&self) -> bool {
                matches!(self, #name::Unknown)
            }
        }
    })
}

fn gen_enum(shape: &Shape, values: &[EnumValue]) -> Result<TokenStream, GenError> {
    let name = type_ident(&shape.name);
    let desc = doc_attrs(shape.doc.as_deref());
    let mut idents = Idents::new(&shape.name);

    let mut variants = Vec::with_capacity(values.len());
    let mut docs = Vec::with_capacity(values.len());
    let mut literals = Vec::with_capacity(values.len());
    for value in values {
        let variant = check_variant(shape, &value.name, "Unknown")?;
        idents.claim(&variant, &value.name)?;
        variants.push(variant);
        docs.push(doc_attrs(value.doc.as_deref()));
        literals.push(value.wire_value());
    }

    Ok(quote! {
        #desc
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum #name {
            #(#docs #variants,)*
            /// A value this version of the model does not know about.
            Unknown(::std::string::String),
        }
        impl #name {
            pub fn as_str(&self) -> &str {
                match self {
                    #(#name::#variants => #literals,)*
                    #name::Unknown(value) => value.as_str(),
                }
            }
            /// Every known value, in declaration order.
            pub const fn values() -> &'static [&'static str] {
                &[#(#literals),*]
            }
        }
        impl ::std::convert::From<&str> for #name {
            fn from(s: &str) -> Self {
                match s {
                    #(#literals => #name::#variants,)*
                    other => #name::Unknown(other.to_owned()),
                }
            }
        }
        impl ::std::str::FromStr for #name {
            type Err = ::std::convert::Infallible;
            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                Ok(#name::from(s))
            }
        }
        impl ::std::convert::AsRef<str> for #name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }
        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    })
}

fn gen_operation_error(ctx: &Context<'_>, operation: &Operation) -> Result<TokenStream, GenError> {
    let name = error_enum_ident(&operation.name);
    let desc = doc_attrs(Some(&format!("Errors `{}` can return.", operation.name)));
    let mut idents = Idents::new(&operation.name);
    idents.claim(&tok_id("Unhandled"), "Unhandled")?;

    let mut variants = vec![];
    let mut types = vec![];
    for error in ctx.operation_errors(operation)? {
        let variant = type_ident(&error.name);
        idents.claim(&variant, &error.name)?;
        types.push(RustType::Named(type_name(&error.name)));
        variants.push(variant);
    }

    Ok(quote! {
        #desc
        #[derive(Debug)]
        pub enum #name {
            #(#variants(#types),)*
            /// An error code the model does not describe.
            Unhandled(::xml_wire::ErrorMetadata),
        }
        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#name::#variants(err) => ::std::fmt::Display::fmt(err, f),)*
                    #name::Unhandled(meta) => ::std::fmt::Display::fmt(meta, f),
                }
            }
        }
        impl ::std::error::Error for #name {}
    })
}
