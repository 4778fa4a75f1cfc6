use crate::model::{
    CollectionMember, EnumValue, Member, Model, Namespace, Operation, ScalarKind, Shape, ShapeKind,
};
use crate::ParseError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashSet;

fn find_attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn get_attr(e: &BytesStart<'_>, element: &'static str, name: &'static str) -> Result<String, ParseError> {
    find_attr(e, name)?.ok_or(ParseError::MissingAttr {
        element,
        attr: name,
    })
}

fn flag(e: &BytesStart<'_>, element: &'static str, name: &'static str) -> Result<bool, ParseError> {
    match find_attr(e, name)?.as_deref() {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(ParseError::InvalidAttr {
            element,
            attr: name,
            value: other.to_owned(),
        }),
    }
}

fn unexpected(expected: &'static str, e: &BytesStart<'_>) -> ParseError {
    ParseError::Unexpected {
        expected,
        got: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
    }
}

fn shape(e: &BytesStart<'_>, element: &'static str, kind: ShapeKind) -> Result<Shape, ParseError> {
    let mut shape = Shape::new(get_attr(e, element, "name")?, kind);
    shape.xml_name = find_attr(e, "xml-name")?;
    let uri = find_attr(e, "namespace-uri")?;
    let prefix = find_attr(e, "namespace-prefix")?;
    if uri.is_some() || prefix.is_some() {
        shape.namespace = Some(Namespace {
            uri: uri.unwrap_or_default(),
            prefix,
        });
    }
    shape.error = flag(e, element, "error")?;
    shape.doc = find_attr(e, "doc")?;
    Ok(shape)
}

fn collection_member(
    e: &BytesStart<'_>,
    element: &'static str,
    target: &'static str,
    name: &str,
) -> Result<CollectionMember, ParseError> {
    let mut member = CollectionMember::new(get_attr(e, element, target)?);
    member.xml_name = find_attr(e, name)?;
    Ok(member)
}

fn list(e: &BytesStart<'_>) -> Result<Shape, ParseError> {
    let member = collection_member(e, "list", "member", "member-name")?;
    shape(e, "list", ShapeKind::List { member })
}

fn map(e: &BytesStart<'_>) -> Result<Shape, ParseError> {
    let key = collection_member(e, "map", "key", "key-name")?;
    let value = collection_member(e, "map", "value", "value-name")?;
    shape(e, "map", ShapeKind::Map { key, value })
}

fn scalar(e: &BytesStart<'_>) -> Result<Shape, ParseError> {
    let kind = get_attr(e, "scalar", "kind")?;
    let kind = ScalarKind::from_name(&kind).ok_or(ParseError::InvalidAttr {
        element: "scalar",
        attr: "kind",
        value: kind.clone(),
    })?;
    shape(e, "scalar", ShapeKind::Scalar(kind))
}

fn member(e: &BytesStart<'_>) -> Result<Member, ParseError> {
    let mut member = Member::new(get_attr(e, "member", "name")?, get_attr(e, "member", "target")?);
    member.xml_name = find_attr(e, "xml-name")?;
    member.xml_prefix = find_attr(e, "xml-prefix")?;
    member.attribute = flag(e, "member", "attribute")?;
    member.flattened = flag(e, "member", "flattened")?;
    member.required = flag(e, "member", "required")?;
    member.doc = find_attr(e, "doc")?;
    Ok(member)
}

fn enum_value(e: &BytesStart<'_>) -> Result<EnumValue, ParseError> {
    let mut value = EnumValue::new(get_attr(e, "value", "name")?);
    value.literal = find_attr(e, "literal")?;
    value.doc = find_attr(e, "doc")?;
    Ok(value)
}

fn operation(e: &BytesStart<'_>) -> Result<Operation, ParseError> {
    let mut op = Operation::new(get_attr(e, "operation", "name")?);
    op.input = find_attr(e, "input")?;
    op.output = find_attr(e, "output")?;
    if let Some(errors) = find_attr(e, "errors")? {
        op.errors = errors.split_whitespace().map(str::to_owned).collect();
    }
    op.doc = find_attr(e, "doc")?;
    Ok(op)
}

enum State {
    Start,
    Model(Model),
    /// Inside a structure, union or enum.
    Shape(Model, Shape),
    /// Inside a member or enum value of the current shape.
    Child(Model, Shape),
    /// Inside a list, map or scalar, which have no children.
    Leaf(Model, Shape),
    Operation(Model, Operation),
}

fn declare(mut model: Model, shape: Shape, declared: &mut HashSet<String>) -> Result<Model, ParseError> {
    if !declared.insert(shape.name.clone()) {
        return Err(ParseError::DuplicateShape(shape.name));
    }
    model.insert(shape);
    Ok(model)
}

/// Loads a model document:
///
/// ```xml
/// <model>
///   <structure name="Top" xml-name="Top" namespace-prefix="p" namespace-uri="urn:p">
///     <member name="id" target="String" attribute="true" required="true"/>
///   </structure>
///   <list name="Names" member="String" member-name="item"/>
///   <map name="Index" key="String" value="Integer" key-name="k" value-name="v"/>
///   <enum name="Color"><value name="Red" literal="red"/></enum>
///   <operation name="GetTop" output="Top" errors="NotFound Throttled"/>
/// </model>
/// ```
///
/// Prelude scalars are always present; later declarations of a prelude name
/// replace it.
pub fn parse(xml: &[u8]) -> Result<Model, ParseError> {
    let mut rdr = Reader::from_str(std::str::from_utf8(xml)?);
    rdr.expand_empty_elements(true);
    rdr.trim_text(true);

    let mut declared = HashSet::new();
    let mut state = State::Start;
    loop {
        state = match (state, rdr.read_event()?) {
            (_, Event::Eof) => return Err(ParseError::Eof),
            (state, Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_)) => state,
            (state, Event::Text(txt)) if txt.iter().all(u8::is_ascii_whitespace) => state,

            (State::Start, Event::Start(e)) => match e.name().as_ref() {
                b"model" => State::Model(Model::new()),
                _ => return Err(unexpected("<model>", &e)),
            },

            (State::Model(m), Event::Start(e)) => match e.name().as_ref() {
                b"structure" => State::Shape(m, shape(&e, "structure", ShapeKind::Struct(vec![]))?),
                b"union" => State::Shape(m, shape(&e, "union", ShapeKind::Union(vec![]))?),
                b"enum" => State::Shape(m, shape(&e, "enum", ShapeKind::Enum(vec![]))?),
                b"list" => State::Leaf(m, list(&e)?),
                b"map" => State::Leaf(m, map(&e)?),
                b"scalar" => State::Leaf(m, scalar(&e)?),
                b"operation" => State::Operation(m, operation(&e)?),
                _ => {
                    return Err(unexpected(
                        "<structure>, <union>, <enum>, <list>, <map>, <scalar>, or <operation>",
                        &e,
                    ))
                }
            },
            (State::Model(m), Event::End(_)) => return Ok(m),

            (State::Shape(m, mut s), Event::Start(e)) => {
                match (&mut s.kind, e.name().as_ref()) {
                    (ShapeKind::Struct(members) | ShapeKind::Union(members), b"member") => {
                        members.push(member(&e)?)
                    }
                    (ShapeKind::Enum(values), b"value") => values.push(enum_value(&e)?),
                    _ => return Err(unexpected("<member> or <value>", &e)),
                }
                State::Child(m, s)
            }
            (State::Shape(m, s) | State::Leaf(m, s), Event::End(_)) => {
                State::Model(declare(m, s, &mut declared)?)
            }
            (State::Child(m, s), Event::End(_)) => State::Shape(m, s),
            (State::Operation(mut m, op), Event::End(_)) => {
                m.operations.push(op);
                State::Model(m)
            }

            (_, Event::Start(e)) => return Err(unexpected("a closing tag", &e)),
            (_, event) => {
                return Err(ParseError::Unexpected {
                    expected: "an element",
                    got: format!("{event:?}"),
                })
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const MODEL: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <model>
            <!-- a comment -->
            <structure name="Top" namespace-prefix="p" namespace-uri="urn:p" doc="The top.">
                <member name="id" target="String" attribute="true" required="true"/>
                <member name="tags" target="Tags" flattened="true" xml-name="tag"/>
                <member name="renamed" target="Integer" xml-name="local" xml-prefix="q"/>
            </structure>
            <union name="Choice">
                <member name="s" target="String"/>
            </union>
            <enum name="Color">
                <value name="Red" literal="red"/>
                <value name="Blue"/>
            </enum>
            <list name="Tags" member="String" member-name="item"/>
            <map name="Index" key="String" value="Color" key-name="Name" value-name="Setting"/>
            <scalar name="Amount" kind="Long"/>
            <structure name="Oops" error="true"/>
            <operation name="GetTop" output="Top" errors="Oops Other"/>
        </model>
    "#};

    #[test]
    fn loads_every_kind_of_declaration() {
        let model = parse(MODEL.as_bytes()).unwrap();

        let top = model.shape("Top").unwrap();
        assert_eq!(top.namespace_prefix(), Some("p"));
        assert_eq!(top.doc.as_deref(), Some("The top."));
        let members = top.members();
        assert_eq!(members.len(), 3);
        assert!(members[0].attribute && members[0].required);
        assert!(members[1].flattened);
        assert_eq!(members[1].xml_name.as_deref(), Some("tag"));
        assert_eq!(members[2].xml_prefix.as_deref(), Some("q"));

        assert!(matches!(&model.shape("Choice").unwrap().kind, ShapeKind::Union(m) if m.len() == 1));
        let ShapeKind::Enum(values) = &model.shape("Color").unwrap().kind else {
            panic!("Color is an enum");
        };
        assert_eq!(values.iter().map(EnumValue::wire_value).collect::<Vec<_>>(), ["red", "Blue"]);

        let ShapeKind::Map { key, value } = &model.shape("Index").unwrap().kind else {
            panic!("Index is a map");
        };
        assert_eq!(key.xml_name.as_deref(), Some("Name"));
        assert_eq!(value.target.target, "Color");

        assert_eq!(model.shape("Amount").unwrap().kind, ShapeKind::Scalar(ScalarKind::Long));
        assert!(model.shape("Oops").unwrap().error);

        assert_eq!(model.operations.len(), 1);
        assert_eq!(model.operations[0].output.as_deref(), Some("Top"));
        assert_eq!(model.operations[0].errors, ["Oops", "Other"]);
    }

    #[test]
    fn missing_attributes_are_reported() {
        let err = parse(b"<model><structure/></model>").unwrap_err();
        assert_eq!(err.to_string(), "<structure> is missing attribute `name`");
    }

    #[test]
    fn flags_must_be_booleans() {
        let err = parse(br#"<model><structure name="A"><member name="a" target="String" required="yes"/></structure></model>"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidAttr { attr: "required", .. }));
    }

    #[test]
    fn unknown_elements_are_reported() {
        let err = parse(b"<model><widget/></model>").unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { ref got, .. } if got == "widget"));

        let err = parse(b"<models/>").unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { .. }));
    }

    #[test]
    fn duplicate_shapes_are_reported() {
        let err = parse(br#"<model><structure name="A"/><list name="A" member="String"/></model>"#).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateShape(ref name) if name == "A"));
    }

    #[test]
    fn truncated_models_are_reported() {
        assert!(parse(b"<model><structure name=\"A\">").is_err());
    }
}
