use crate::model::{Member, Model, ScalarKind, Shape, ShapeKind};
use crate::GenError;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Attribute,
    Element,
    FlattenedElement,
}

/// A name on the wire. Its display form, `prefix:local` or `local`, is the
/// pattern the generated code matches against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XmlName {
    pub prefix: Option<String>,
    pub local: String,
}

impl XmlName {
    /// A `p:local` name carries its own prefix, otherwise `prefix` applies.
    fn new(name: &str, prefix: Option<&str>) -> XmlName {
        match name.split_once(':') {
            Some((p, local)) => XmlName {
                prefix: Some(p.to_owned()),
                local: local.to_owned(),
            },
            None => XmlName {
                prefix: prefix.map(str::to_owned),
                local: name.to_owned(),
            },
        }
    }

    /// Whether one element could satisfy both patterns.
    fn overlaps(&self, other: &XmlName) -> bool {
        self.local == other.local
            && match (&self.prefix, &other.prefix) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

impl fmt::Display for XmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Element names used inside a list or map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionNames {
    List { member: XmlName },
    Map { entry: XmlName, key: XmlName, value: XmlName },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireBinding {
    pub name: XmlName,
    pub placement: Placement,
    /// Names inside the target collection, if the member targets one.
    pub collection: Option<CollectionNames>,
}

/// How operation outputs are enclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Envelope {
    /// The output shape is the document root.
    #[default]
    Bare,
    /// `<OpResponse><OpResult>..</OpResult>..</OpResponse>`
    Wrapped,
}

/// Protocol-wide settings that apply wherever the model says nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolDefaults {
    pub envelope: Envelope,
    /// Errors arrive as `<ErrorResponse><Error>..</Error></ErrorResponse>`
    /// rather than a bare `<Error>` root.
    pub error_wrapping: bool,
    pub namespace_prefix: Option<String>,
    pub list_member_name: String,
    pub map_entry_name: String,
    pub map_key_name: String,
    pub map_value_name: String,
}

impl Default for ProtocolDefaults {
    fn default() -> ProtocolDefaults {
        ProtocolDefaults {
            envelope: Envelope::Bare,
            error_wrapping: true,
            namespace_prefix: None,
            list_member_name: "member".to_owned(),
            map_entry_name: "entry".to_owned(),
            map_key_name: "key".to_owned(),
            map_value_name: "value".to_owned(),
        }
    }
}

/// Names inside a collection shape; `None` for anything else.
pub fn collection_names(shape: &Shape, defaults: &ProtocolDefaults) -> Option<CollectionNames> {
    let prefix = shape
        .namespace_prefix()
        .or(defaults.namespace_prefix.as_deref());
    match &shape.kind {
        ShapeKind::List { member } => Some(CollectionNames::List {
            member: XmlName::new(
                member.xml_name.as_deref().unwrap_or(&defaults.list_member_name),
                prefix,
            ),
        }),
        ShapeKind::Map { key, value } => Some(CollectionNames::Map {
            entry: XmlName::new(&defaults.map_entry_name, prefix),
            key: XmlName::new(key.xml_name.as_deref().unwrap_or(&defaults.map_key_name), prefix),
            value: XmlName::new(
                value.xml_name.as_deref().unwrap_or(&defaults.map_value_name),
                prefix,
            ),
        }),
        _ => None,
    }
}

/// Name of `shape` when it is the document root.
pub fn root_name(shape: &Shape, defaults: &ProtocolDefaults) -> XmlName {
    let prefix = shape
        .namespace_prefix()
        .or(defaults.namespace_prefix.as_deref());
    XmlName::new(shape.wire_name(), prefix)
}

/// Wire binding of `member`, declared on `owner`.
pub fn resolve(
    model: &Model,
    owner: &Shape,
    member: &Member,
    defaults: &ProtocolDefaults,
) -> Result<WireBinding, GenError> {
    let target = model
        .shape(&member.target.target)
        .ok_or_else(|| GenError::UnknownShape {
            shape: owner.name.clone(),
            target: member.target.target.clone(),
        })?;
    let is_collection = matches!(target.kind, ShapeKind::List { .. } | ShapeKind::Map { .. });

    let placement = if member.attribute {
        if matches!(owner.kind, ShapeKind::Union(_)) {
            return Err(invalid_attribute(owner, member, "union members cannot be attributes"));
        }
        if !matches!(target.kind, ShapeKind::Scalar(_) | ShapeKind::Enum(_)) {
            return Err(invalid_attribute(owner, member, "attributes must target a scalar or an enum"));
        }
        Placement::Attribute
    } else if member.flattened {
        if !is_collection {
            return Err(GenError::InvalidFlattening {
                shape: owner.name.clone(),
                member: member.name.clone(),
                target: target.name.clone(),
            });
        }
        Placement::FlattenedElement
    } else {
        Placement::Element
    };

    let prefix = member
        .xml_prefix
        .as_deref()
        .or(owner.namespace_prefix())
        .or(defaults.namespace_prefix.as_deref());
    let name = XmlName::new(member.xml_name.as_deref().unwrap_or(&member.name), prefix);

    Ok(WireBinding {
        name,
        placement,
        collection: collection_names(target, defaults),
    })
}

fn invalid_attribute(owner: &Shape, member: &Member, reason: &'static str) -> GenError {
    GenError::InvalidAttribute {
        shape: owner.name.clone(),
        member: member.name.clone(),
        reason,
    }
}

/// Wire bindings of every member and collection in the model.
#[derive(Debug)]
pub struct BindingTable {
    members: HashMap<(String, String), WireBinding>,
    collections: HashMap<String, CollectionNames>,
}

impl BindingTable {
    pub fn resolve(model: &Model, defaults: &ProtocolDefaults) -> Result<BindingTable, GenError> {
        let mut members = HashMap::new();
        let mut collections = HashMap::new();
        for shape in model.shapes.values() {
            match &shape.kind {
                ShapeKind::Struct(list) | ShapeKind::Union(list) => {
                    let mut elements: Vec<(&Member, XmlName)> = vec![];
                    let mut attributes: Vec<(&Member, XmlName)> = vec![];
                    for member in list {
                        let binding = resolve(model, shape, member, defaults)?;
                        let (seen, wire_name) = match binding.placement {
                            Placement::Attribute => (&mut attributes, format!("attribute `{}`", binding.name)),
                            _ => (&mut elements, format!("<{}>", binding.name)),
                        };
                        if let Some((first, _)) = seen.iter().find(|(_, n)| n.overlaps(&binding.name)) {
                            return Err(GenError::AmbiguousBinding {
                                shape: shape.name.clone(),
                                first: first.name.clone(),
                                second: member.name.clone(),
                                wire_name,
                            });
                        }
                        seen.push((member, binding.name.clone()));
                        members.insert((shape.name.clone(), member.name.clone()), binding);
                    }
                }
                ShapeKind::Map { key, .. } => {
                    let key_ok = matches!(
                        model.shape(&key.target.target).map(|s| &s.kind),
                        Some(ShapeKind::Scalar(ScalarKind::String) | ShapeKind::Enum(_))
                    );
                    if !key_ok {
                        return Err(GenError::InvalidMapKey {
                            shape: shape.name.clone(),
                            key: key.target.target.clone(),
                        });
                    }
                    if let Some(names) = collection_names(shape, defaults) {
                        if let CollectionNames::Map { key, value, .. } = &names {
                            if key.overlaps(value) {
                                return Err(GenError::AmbiguousBinding {
                                    shape: shape.name.clone(),
                                    first: "key".to_owned(),
                                    second: "value".to_owned(),
                                    wire_name: format!("<{key}>"),
                                });
                            }
                        }
                        collections.insert(shape.name.clone(), names);
                    }
                }
                ShapeKind::List { .. } => {
                    if let Some(names) = collection_names(shape, defaults) {
                        collections.insert(shape.name.clone(), names);
                    }
                }
                ShapeKind::Scalar(_) | ShapeKind::Enum(_) => {}
            }
        }
        Ok(BindingTable {
            members,
            collections,
        })
    }

    pub fn member(&self, shape: &str, member: &str) -> Option<&WireBinding> {
        self.members.get(&(shape.to_owned(), member.to_owned()))
    }

    pub fn collection(&self, shape: &str) -> Option<&CollectionNames> {
        self.collections.get(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnumValue;

    fn model() -> Model {
        Model::new()
            .with_shape(Shape::list("Tags", crate::model::CollectionMember::new("String").xml_name("item")))
            .with_shape(Shape::map("Settings", "String", "Integer"))
            .with_shape(Shape::enumeration("Color", vec![EnumValue::new("Red")]))
    }

    fn bind(owner: Shape, defaults: &ProtocolDefaults) -> Result<BindingTable, GenError> {
        BindingTable::resolve(&model().with_shape(owner), defaults)
    }

    #[test]
    fn placement_and_names() {
        let owner = Shape::structure(
            "Top",
            vec![
                Member::new("id", "String").attribute(),
                Member::new("tags", "Tags"),
                Member::new("flags", "Tags").flattened().xml_name("flag"),
                Member::new("settings", "Settings").flattened(),
            ],
        );
        let table = bind(owner, &ProtocolDefaults::default()).unwrap();

        let id = table.member("Top", "id").unwrap();
        assert_eq!(id.placement, Placement::Attribute);
        assert_eq!(id.name.to_string(), "id");

        let tags = table.member("Top", "tags").unwrap();
        assert_eq!(tags.placement, Placement::Element);
        assert_eq!(
            tags.collection,
            Some(CollectionNames::List { member: XmlName::new("item", None) })
        );

        let flags = table.member("Top", "flags").unwrap();
        assert_eq!(flags.placement, Placement::FlattenedElement);
        assert_eq!(flags.name.to_string(), "flag");

        let Some(CollectionNames::Map { entry, key, value }) = table.collection("Settings") else {
            panic!("Settings is a map");
        };
        assert_eq!((entry.local.as_str(), key.local.as_str(), value.local.as_str()), ("entry", "key", "value"));
    }

    #[test]
    fn prefix_precedence() {
        let defaults = ProtocolDefaults {
            namespace_prefix: Some("proto".to_owned()),
            ..ProtocolDefaults::default()
        };
        let plain = Shape::structure(
            "Plain",
            vec![Member::new("a", "String"), Member::new("b", "String").xml_prefix("own")],
        );
        let spaced = Shape::structure("Spaced", vec![Member::new("c", "String")])
            .with_namespace("urn:spaced", Some("sp"));
        let table = BindingTable::resolve(&model().with_shape(plain).with_shape(spaced), &defaults).unwrap();
        assert_eq!(table.member("Plain", "a").unwrap().name.to_string(), "proto:a");
        assert_eq!(table.member("Plain", "b").unwrap().name.to_string(), "own:b");
        assert_eq!(table.member("Spaced", "c").unwrap().name.to_string(), "sp:c");
    }

    #[test]
    fn flattening_a_scalar_is_an_error() {
        let owner = Shape::structure("Top", vec![Member::new("s", "String").flattened()]);
        let err = bind(owner, &ProtocolDefaults::default()).unwrap_err();
        assert!(matches!(err, GenError::InvalidFlattening { .. }));
    }

    #[test]
    fn attribute_rules() {
        let on_list = Shape::structure("Top", vec![Member::new("t", "Tags").attribute()]);
        assert!(matches!(
            bind(on_list, &ProtocolDefaults::default()),
            Err(GenError::InvalidAttribute { .. })
        ));

        let on_union = Shape::union("Choice", vec![Member::new("s", "String").attribute()]);
        assert!(matches!(
            bind(on_union, &ProtocolDefaults::default()),
            Err(GenError::InvalidAttribute { .. })
        ));

        let on_enum = Shape::structure("Top", vec![Member::new("c", "Color").attribute()]);
        assert!(bind(on_enum, &ProtocolDefaults::default()).is_ok());
    }

    #[test]
    fn duplicate_wire_names_are_ambiguous() {
        let owner = Shape::structure(
            "Top",
            vec![Member::new("a", "String"), Member::new("b", "String").xml_name("a")],
        );
        let err = bind(owner, &ProtocolDefaults::default()).unwrap_err();
        assert_eq!(err.to_string(), "Top: members `a` and `b` both decode from <a>");

        // attributes and elements live in different spaces
        let owner = Shape::structure(
            "Top",
            vec![Member::new("a", "String"), Member::new("b", "String").xml_name("a").attribute()],
        );
        assert!(bind(owner, &ProtocolDefaults::default()).is_ok());

        let owner = Shape::structure(
            "Top",
            vec![
                Member::new("a", "String").attribute(),
                Member::new("b", "String").xml_name("p:a").attribute(),
            ],
        );
        let err = bind(owner, &ProtocolDefaults::default()).unwrap_err();
        assert_eq!(err.to_string(), "Top: members `a` and `b` both decode from attribute `p:a`");

        let owner = Shape::structure(
            "Top",
            vec![
                Member::new("a", "String").xml_name("p:a").attribute(),
                Member::new("b", "String").xml_name("q:a").attribute(),
            ],
        );
        assert!(bind(owner, &ProtocolDefaults::default()).is_ok());
    }

    #[test]
    fn map_keys_must_be_strings_or_enums() {
        let by_number = Model::new().with_shape(Shape::map("ByNumber", "Integer", "String"));
        let err = BindingTable::resolve(&by_number, &ProtocolDefaults::default()).unwrap_err();
        assert!(matches!(err, GenError::InvalidMapKey { .. }));

        let by_color = model().with_shape(Shape::map("ByColor", "Color", "String"));
        assert!(BindingTable::resolve(&by_color, &ProtocolDefaults::default()).is_ok());
    }
}
