use crate::binding::{root_name, CollectionNames, Envelope, Placement};
use crate::generate::{builder_ident, error_enum_ident, Idents};
use crate::model::{Member, Model, Operation, ScalarKind, Shape, ShapeKind, ShapeRef};
use crate::util::{fn_ident, type_ident};
use crate::{Context, GenError};
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use std::collections::HashSet;

pub(crate) fn de_fn(shape: &str) -> Ident {
    fn_ident("de_", shape, "")
}

pub(crate) fn entry_fn(map: &str) -> Ident {
    fn_ident("de_", map, "_entry")
}

/// Shapes a decoder is needed for: everything reachable from the operations,
/// or the whole model when it has none.
fn reachable(model: &Model) -> HashSet<&str> {
    if model.operations.is_empty() {
        return model.shapes.keys().map(String::as_str).collect();
    }
    let mut seen = HashSet::new();
    let mut stack: Vec<&str> = model.operations.iter().flat_map(Operation::roots).collect();
    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        if let Some(shape) = model.shape(name) {
            stack.extend(shape.refs().into_iter().map(|(_, r)| r.target.as_str()));
        }
    }
    seen
}

/// Decoders for every reachable struct, union, list and map, then the
/// operation entry points.
pub(crate) fn decoders(ctx: &Context<'_>) -> Result<TokenStream, GenError> {
    let reachable = reachable(ctx.model);
    let mut fns = Idents::new("decoders");
    let mut out = TokenStream::new();
    for shape in ctx.model.shapes.values() {
        if !reachable.contains(shape.name.as_str()) {
            continue;
        }
        let tokens = match &shape.kind {
            ShapeKind::Struct(members) => {
                fns.claim(&de_fn(&shape.name), &shape.name)?;
                de_struct(ctx, shape, members)?
            }
            ShapeKind::Union(members) => {
                fns.claim(&de_fn(&shape.name), &shape.name)?;
                de_union(ctx, shape, members)?
            }
            ShapeKind::List { .. } => {
                fns.claim(&de_fn(&shape.name), &shape.name)?;
                de_list(ctx, shape)?
            }
            ShapeKind::Map { .. } => {
                fns.claim(&de_fn(&shape.name), &shape.name)?;
                fns.claim(&entry_fn(&shape.name), &shape.name)?;
                de_map(ctx, shape)?
            }
            ShapeKind::Scalar(_) | ShapeKind::Enum(_) => continue,
        };
        tracing::debug!(shape = %shape.name, "generated decoder");
        out.extend(tokens);
    }
    for operation in &ctx.model.operations {
        out.extend(de_operation(ctx, operation, &mut fns)?);
        tracing::debug!(operation = %operation.name, "generated operation decoders");
    }
    Ok(out)
}

/// Expression decoding the element held in `tag` as a value of `target`.
fn element_value(ctx: &Context<'_>, owner: &Shape, target: &ShapeRef) -> Result<TokenStream, GenError> {
    let shape = ctx.target(owner, target)?;
    let value = match &shape.kind {
        ShapeKind::Scalar(ScalarKind::String) => quote! { tag.read_text()? },
        ShapeKind::Scalar(_) => {
            let ty = ctx.shape_type(shape)?;
            quote! { <#ty as ::xml_wire::Primitive>::parse_wire(&tag.read_text()?)? }
        }
        ShapeKind::Enum(_) => {
            let ty = ctx.shape_type(shape)?;
            quote! { #ty::from(tag.read_text()?.as_str()) }
        }
        ShapeKind::Struct(_) => {
            let de = de_fn(&shape.name);
            let name = type_ident(&shape.name);
            quote! { #de(&mut tag, #name::builder())?.build()? }
        }
        ShapeKind::Union(_) | ShapeKind::List { .. } | ShapeKind::Map { .. } => {
            let de = de_fn(&shape.name);
            quote! { #de(&mut tag)? }
        }
    };
    Ok(boxed(value, target))
}

/// Expression converting the attribute text in `value` to `target`.
fn attribute_value(ctx: &Context<'_>, owner: &Shape, target: &ShapeRef) -> Result<TokenStream, GenError> {
    let shape = ctx.target(owner, target)?;
    let ty = ctx.shape_type(shape)?;
    let value = match &shape.kind {
        ShapeKind::Scalar(ScalarKind::String) => quote! { value.to_owned() },
        ShapeKind::Scalar(_) => quote! { <#ty as ::xml_wire::Primitive>::parse_wire(value)? },
        ShapeKind::Enum(_) => quote! { #ty::from(value) },
        _ => {
            return Err(GenError::InvalidAttribute {
                shape: owner.name.clone(),
                member: target.target.clone(),
                reason: "attributes must target a scalar or an enum",
            })
        }
    };
    Ok(boxed(value, target))
}

fn boxed(value: TokenStream, target: &ShapeRef) -> TokenStream {
    if target.indirect {
        quote! { ::std::boxed::Box::new(#value) }
    } else {
        value
    }
}

fn pattern(ctx: &Context<'_>, owner: &Shape, member: &Member) -> Result<(String, Placement), GenError> {
    let binding = ctx.binding(owner, member)?;
    Ok((binding.name.to_string(), binding.placement))
}

fn child_loop(arms: &[TokenStream]) -> TokenStream {
    if arms.is_empty() {
        return quote! { decoder.skip()?; };
    }
    quote! {
        while let Some(mut tag) = decoder.next_tag()? {
            match tag.start_el() {
                #(#arms)*
                _ => {}
            }
        }
    }
}

fn de_struct(ctx: &Context<'_>, shape: &Shape, members: &[Member]) -> Result<TokenStream, GenError> {
    let de = de_fn(&shape.name);
    let builder = builder_ident(&shape.name);
    let mut attrs = vec![];
    let mut arms = vec![];
    for member in members {
        let (pattern, placement) = pattern(ctx, shape, member)?;
        let set = fn_ident("set_", &member.name, "");
        match placement {
            Placement::Attribute => {
                let value = attribute_value(ctx, shape, &member.target)?;
                attrs.push(quote! {
                    if let Some(value) = decoder.start_el().attr(#pattern) {
                        builder = builder.#set(Some(#value));
                    }
                });
            }
            Placement::Element => {
                let value = element_value(ctx, shape, &member.target)?;
                arms.push(quote! {
                    s if s.matches(#pattern) => {
                        let value = #value;
                        builder = builder.#set(Some(value));
                    }
                });
            }
            Placement::FlattenedElement => {
                let target = ctx.target(shape, &member.target)?;
                match &target.kind {
                    ShapeKind::List { member: item } => {
                        let value = element_value(ctx, target, &item.target)?;
                        let push = fn_ident("push_", &member.name, "");
                        arms.push(quote! {
                            s if s.matches(#pattern) => {
                                let item = #value;
                                builder = builder.#push(item);
                            }
                        });
                    }
                    ShapeKind::Map { .. } => {
                        let entry = entry_fn(&target.name);
                        let insert = fn_ident("insert_", &member.name, "");
                        arms.push(quote! {
                            s if s.matches(#pattern) => {
                                let (key, value) = #entry(&mut tag)?;
                                builder = builder.#insert(key, value);
                            }
                        });
                    }
                    _ => {
                        return Err(GenError::InvalidFlattening {
                            shape: shape.name.clone(),
                            member: member.name.clone(),
                            target: target.name.clone(),
                        })
                    }
                }
            }
        }
    }
    let walk = child_loop(&arms);
    Ok(quote! {
        #[allow(unused_mut)]
        pub fn #de(
            decoder: &mut ::xml_wire::ScopedDecoder<'_, '_>,
            mut builder: #builder,
        ) -> ::std::result::Result<#builder, ::xml_wire::DecodeError> {
            #(#attrs)*
            #walk
            Ok(builder)
        }
    })
}

/// The child element picks the variant. Unrecognized children only count
/// while nothing recognized has been seen; flattened variants gather every
/// matching sibling.
fn de_union(ctx: &Context<'_>, shape: &Shape, members: &[Member]) -> Result<TokenStream, GenError> {
    let de = de_fn(&shape.name);
    let name = type_ident(&shape.name);
    let mut arms = vec![];
    for member in members {
        let (pattern, placement) = pattern(ctx, shape, member)?;
        let variant = type_ident(&member.name);
        let arm = match placement {
            Placement::Attribute => {
                return Err(GenError::InvalidAttribute {
                    shape: shape.name.clone(),
                    member: member.name.clone(),
                    reason: "union members cannot be attributes",
                })
            }
            Placement::Element => {
                let value = element_value(ctx, shape, &member.target)?;
                quote! {
                    let value = #value;
                    base = Some(#name::#variant(value));
                }
            }
            Placement::FlattenedElement => {
                let target = ctx.target(shape, &member.target)?;
                let add = match &target.kind {
                    ShapeKind::List { member: item } => {
                        let value = element_value(ctx, target, &item.target)?;
                        quote! {
                            let item = #value;
                            acc.push(item);
                        }
                    }
                    ShapeKind::Map { .. } => {
                        let entry = entry_fn(&target.name);
                        quote! {
                            let (key, value) = #entry(&mut tag)?;
                            acc.insert(key, value);
                        }
                    }
                    _ => {
                        return Err(GenError::InvalidFlattening {
                            shape: shape.name.clone(),
                            member: member.name.clone(),
                            target: target.name.clone(),
                        })
                    }
                };
                quote! {
                    let mut acc = match base.take() {
                        Some(#name::#variant(acc)) => acc,
                        _ => ::std::default::Default::default(),
                    };
                    #add
                    base = Some(#name::#variant(acc));
                }
            }
        };
        arms.push(quote! {
            s if s.matches(#pattern) => {
                #arm
            }
        });
    }
    let walk = child_loop(&arms);
    Ok(quote! {
        #[allow(unused_mut)]
        pub fn #de(
            decoder: &mut ::xml_wire::ScopedDecoder<'_, '_>,
        ) -> ::std::result::Result<#name, ::xml_wire::DecodeError> {
            let mut base: ::std::option::Option<#name> = None;
            #walk
            Ok(base.unwrap_or(#name::Unknown))
        }
    })
}

fn de_list(ctx: &Context<'_>, shape: &Shape) -> Result<TokenStream, GenError> {
    let ShapeKind::List { member } = &shape.kind else {
        return Ok(quote! {});
    };
    let Some(CollectionNames::List { member: item_name }) = ctx.bindings.collection(&shape.name) else {
        return Ok(quote! {});
    };
    let de = de_fn(&shape.name);
    let ty = ctx.shape_type(shape)?;
    let item = item_name.to_string();
    let value = element_value(ctx, shape, &member.target)?;
    Ok(quote! {
        pub fn #de(
            decoder: &mut ::xml_wire::ScopedDecoder<'_, '_>,
        ) -> ::std::result::Result<#ty, ::xml_wire::DecodeError> {
            let mut out = ::std::vec::Vec::new();
            while let Some(mut tag) = decoder.next_tag()? {
                match tag.start_el() {
                    s if s.matches(#item) => {
                        out.push(#value);
                    }
                    _ => {}
                }
            }
            Ok(out)
        }
    })
}

/// The wrapped map decoder and the entry decoder it shares with flattened
/// map members. Later entries replace earlier ones with the same key.
fn de_map(ctx: &Context<'_>, shape: &Shape) -> Result<TokenStream, GenError> {
    let ShapeKind::Map { key, value } = &shape.kind else {
        return Ok(quote! {});
    };
    let Some(CollectionNames::Map { entry: entry_name, key: key_name, value: value_name }) =
        ctx.bindings.collection(&shape.name)
    else {
        return Ok(quote! {});
    };
    let de = de_fn(&shape.name);
    let entry = entry_fn(&shape.name);
    let ty = ctx.shape_type(shape)?;
    let key_ty = ctx.member_type(shape, &key.target)?.ty;
    let value_ty = ctx.member_type(shape, &value.target)?.ty;
    let key_value = element_value(ctx, shape, &key.target)?;
    let value_value = element_value(ctx, shape, &value.target)?;
    let (entry_name, key_name, value_name) = (entry_name.to_string(), key_name.to_string(), value_name.to_string());
    Ok(quote! {
        pub fn #de(
            decoder: &mut ::xml_wire::ScopedDecoder<'_, '_>,
        ) -> ::std::result::Result<#ty, ::xml_wire::DecodeError> {
            let mut out = ::std::collections::HashMap::new();
            while let Some(mut tag) = decoder.next_tag()? {
                match tag.start_el() {
                    s if s.matches(#entry_name) => {
                        let (key, value) = #entry(&mut tag)?;
                        out.insert(key, value);
                    }
                    _ => {}
                }
            }
            Ok(out)
        }
        pub fn #entry(
            decoder: &mut ::xml_wire::ScopedDecoder<'_, '_>,
        ) -> ::std::result::Result<(#key_ty, #value_ty), ::xml_wire::DecodeError> {
            let mut key = None;
            let mut value = None;
            while let Some(mut tag) = decoder.next_tag()? {
                match tag.start_el() {
                    s if s.matches(#key_name) => {
                        key = Some(#key_value);
                    }
                    s if s.matches(#value_name) => {
                        value = Some(#value_value);
                    }
                    _ => {}
                }
            }
            match (key, value) {
                (Some(key), Some(value)) => Ok((key, value)),
                (None, _) => Err(::xml_wire::DecodeError::IncompleteEntry {
                    entry: decoder.start_el().name().to_string(),
                    missing: #key_name,
                }),
                (_, None) => Err(::xml_wire::DecodeError::IncompleteEntry {
                    entry: decoder.start_el().name().to_string(),
                    missing: #value_name,
                }),
            }
        }
    })
}

fn de_operation(ctx: &Context<'_>, operation: &Operation, fns: &mut Idents<'_>) -> Result<TokenStream, GenError> {
    let mut out = TokenStream::new();

    if let Some(input) = &operation.input {
        let shape = ctx.operation_shape(operation, input)?;
        let parse = fn_ident("parse_", &operation.name, "_input");
        fns.claim(&parse, &operation.name)?;
        let name = type_ident(&shape.name);
        let de = de_fn(&shape.name);
        let root = root_name(shape, ctx.defaults).to_string();
        out.extend(quote! {
            pub fn #parse(input: &[u8]) -> ::std::result::Result<#name, ::xml_wire::DecodeError> {
                let mut doc = ::xml_wire::Document::try_from_bytes(input)?;
                let mut root = doc.root_element()?;
                root.expect_element(#root)?;
                let builder = #de(&mut root, #name::builder())?;
                Ok(builder.build()?)
            }
        });
    }

    if let Some(output) = &operation.output {
        let shape = ctx.operation_shape(operation, output)?;
        let parse = fn_ident("parse_", &operation.name, "_output");
        fns.claim(&parse, &operation.name)?;
        let name = type_ident(&shape.name);
        let de = de_fn(&shape.name);
        let body = match ctx.defaults.envelope {
            Envelope::Bare => {
                let root = root_name(shape, ctx.defaults).to_string();
                quote! {
                    root.expect_element(#root)?;
                    let builder = #de(&mut root, #name::builder())?;
                    Ok(builder.build()?)
                }
            }
            Envelope::Wrapped => {
                let response = format!("{}Response", operation.name);
                let result = format!("{}Result", operation.name);
                quote! {
                    root.expect_element(#response)?;
                    let mut builder = None;
                    while let Some(mut tag) = root.next_tag()? {
                        if tag.start_el().matches(#result) {
                            builder = Some(#de(&mut tag, #name::builder())?);
                        }
                    }
                    match builder {
                        Some(builder) => Ok(builder.build()?),
                        None => Err(::xml_wire::DecodeError::MissingElement(
                            ::std::borrow::Cow::Borrowed(#result),
                        )),
                    }
                }
            }
        };
        out.extend(quote! {
            pub fn #parse(input: &[u8]) -> ::std::result::Result<#name, ::xml_wire::DecodeError> {
                let mut doc = ::xml_wire::Document::try_from_bytes(input)?;
                let mut root = doc.root_element()?;
                #body
            }
        });
    }

    let parse = fn_ident("parse_", &operation.name, "_error");
    fns.claim(&parse, &operation.name)?;
    let error = error_enum_ident(&operation.name);
    let wrapped = ctx.defaults.error_wrapping;
    let mut cases = vec![];
    for shape in ctx.operation_errors(operation)? {
        let code = shape.wire_name();
        let variant = type_ident(&shape.name);
        let de = de_fn(&shape.name);
        cases.push(quote! {
            Some(#code) => {
                let builder = ::xml_wire::within_error(input, #wrapped, |decoder| {
                    #de(decoder, #variant::builder())
                })?;
                #error::#variant(builder.build()?)
            }
        });
    }
    out.extend(quote! {
        pub fn #parse(input: &[u8]) -> ::std::result::Result<#error, ::xml_wire::DecodeError> {
            let meta = ::xml_wire::ErrorMetadata::parse(input, #wrapped)?;
            let code = meta.code().map(str::to_owned);
            Ok(match code.as_deref() {
                #(#cases)*
                _ => #error::Unhandled(meta),
            })
        }
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::model::{CollectionMember, Member, Model, Operation, Shape};
    use crate::{generate, render, Envelope, GenError, ProtocolDefaults};

    fn fn_names(model: &Model, defaults: &ProtocolDefaults) -> Vec<String> {
        let file: syn::File = syn::parse2(generate(model, defaults).unwrap()).unwrap();
        file.items
            .iter()
            .filter_map(|item| match item {
                syn::Item::Fn(f) => Some(f.sig.ident.to_string()),
                _ => None,
            })
            .collect()
    }

    fn tree() -> Model {
        Model::new()
            .with_shape(Shape::structure(
                "Node",
                vec![
                    Member::new("value", "String").required(),
                    Member::new("children", "NodeList"),
                ],
            ))
            .with_shape(Shape::list("NodeList", "Node"))
            .with_shape(Shape::structure("Unused", vec![]))
            .with_shape(Shape::structure("Missing", vec![]).as_error())
            .with_operation(Operation::new("GetTree").output("Node").error("Missing"))
    }

    #[test]
    fn only_reachable_shapes_get_decoders() {
        let names = fn_names(&tree(), &ProtocolDefaults::default());
        assert_eq!(
            names,
            ["de_node", "de_node_list", "de_missing", "parse_get_tree_output", "parse_get_tree_error"]
        );
    }

    #[test]
    fn without_operations_every_shape_gets_a_decoder() {
        let mut model = tree();
        model.operations.clear();
        let names = fn_names(&model, &ProtocolDefaults::default());
        assert!(names.contains(&"de_unused".to_owned()), "{names:?}");
        assert!(!names.iter().any(|n| n.starts_with("parse_")), "{names:?}");
    }

    #[test]
    fn recursion_is_boxed() {
        let src = render(generate(&tree(), &ProtocolDefaults::default()).unwrap()).unwrap();
        assert!(src.contains("::std::vec::Vec<::std::boxed::Box<Node>>"), "{src}");
        assert!(src.contains("::std::boxed::Box::new(de_node("), "{src}");
    }

    #[test]
    fn unknown_children_fall_through() {
        let src = render(generate(&tree(), &ProtocolDefaults::default()).unwrap()).unwrap();
        assert!(src.contains("s if s.matches(\"value\") =>"), "{src}");
        assert!(src.contains("_ => {}"), "{src}");
    }

    #[test]
    fn envelopes() {
        let wrapped = ProtocolDefaults {
            envelope: Envelope::Wrapped,
            ..ProtocolDefaults::default()
        };
        let src = render(generate(&tree(), &wrapped).unwrap()).unwrap();
        assert!(src.contains("root.expect_element(\"GetTreeResponse\")?;"), "{src}");
        assert!(src.contains("\"GetTreeResult\""), "{src}");

        let src = render(generate(&tree(), &ProtocolDefaults::default()).unwrap()).unwrap();
        assert!(src.contains("root.expect_element(\"Node\")?;"), "{src}");
    }

    #[test]
    fn flattened_members() {
        let model = Model::new()
            .with_shape(Shape::list("Items", CollectionMember::new("String")))
            .with_shape(Shape::map("Pairs", "String", "Integer"))
            .with_shape(Shape::structure(
                "Bag",
                vec![
                    Member::new("items", "Items").flattened().xml_name("item"),
                    Member::new("pairs", "Pairs").flattened().xml_name("pair"),
                ],
            ));
        let src = render(generate(&model, &ProtocolDefaults::default()).unwrap()).unwrap();
        assert!(src.contains("builder = builder.push_items(item);"), "{src}");
        assert!(src.contains("let (key, value) = de_pairs_entry(&mut tag)?;"), "{src}");
        assert!(src.contains("builder = builder.insert_pairs(key, value);"), "{src}");
    }

    #[test]
    fn decoder_names_must_not_clash() {
        let model = Model::new()
            .with_shape(Shape::map("Pairs", "String", "String"))
            .with_shape(Shape::structure("PairsEntry", vec![]));
        let err = generate(&model, &ProtocolDefaults::default()).unwrap_err();
        assert!(matches!(err, GenError::DuplicateIdent { .. }), "{err}");
    }
}
