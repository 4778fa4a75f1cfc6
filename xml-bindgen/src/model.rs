use indexmap::IndexMap;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Timestamp,
    Blob,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 10] = [
        ScalarKind::String,
        ScalarKind::Boolean,
        ScalarKind::Byte,
        ScalarKind::Short,
        ScalarKind::Integer,
        ScalarKind::Long,
        ScalarKind::Float,
        ScalarKind::Double,
        ScalarKind::Timestamp,
        ScalarKind::Blob,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::String => "String",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Byte => "Byte",
            ScalarKind::Short => "Short",
            ScalarKind::Integer => "Integer",
            ScalarKind::Long => "Long",
            ScalarKind::Float => "Float",
            ScalarKind::Double => "Double",
            ScalarKind::Timestamp => "Timestamp",
            ScalarKind::Blob => "Blob",
        }
    }

    pub fn from_name(name: &str) -> Option<ScalarKind> {
        ScalarKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A reference to a named shape. `indirect` is only ever set by
/// [`crate::boxing::box_cycles`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeRef {
    pub target: String,
    pub indirect: bool,
}

impl ShapeRef {
    pub fn new(target: impl Into<String>) -> ShapeRef {
        ShapeRef {
            target: target.into(),
            indirect: false,
        }
    }
}

/// The item of a list, or the key or value of a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMember {
    pub target: ShapeRef,
    pub xml_name: Option<String>,
}

impl CollectionMember {
    pub fn new(target: impl Into<String>) -> CollectionMember {
        CollectionMember {
            target: ShapeRef::new(target),
            xml_name: None,
        }
    }

    pub fn xml_name(mut self, name: impl Into<String>) -> CollectionMember {
        self.xml_name = Some(name.into());
        self
    }
}

impl From<&str> for CollectionMember {
    fn from(target: &str) -> CollectionMember {
        CollectionMember::new(target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub target: ShapeRef,
    pub xml_name: Option<String>,
    pub xml_prefix: Option<String>,
    pub attribute: bool,
    pub flattened: bool,
    pub required: bool,
    pub doc: Option<String>,
}

impl Member {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Member {
        Member {
            name: name.into(),
            target: ShapeRef::new(target),
            xml_name: None,
            xml_prefix: None,
            attribute: false,
            flattened: false,
            required: false,
            doc: None,
        }
    }

    pub fn xml_name(mut self, name: impl Into<String>) -> Member {
        self.xml_name = Some(name.into());
        self
    }

    pub fn xml_prefix(mut self, prefix: impl Into<String>) -> Member {
        self.xml_prefix = Some(prefix.into());
        self
    }

    pub fn attribute(mut self) -> Member {
        self.attribute = true;
        self
    }

    pub fn flattened(mut self) -> Member {
        self.flattened = true;
        self
    }

    pub fn required(mut self) -> Member {
        self.required = true;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Member {
        self.doc = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub literal: Option<String>,
    pub doc: Option<String>,
}

impl EnumValue {
    pub fn new(name: impl Into<String>) -> EnumValue {
        EnumValue {
            name: name.into(),
            literal: None,
            doc: None,
        }
    }

    pub fn literal(mut self, literal: impl Into<String>) -> EnumValue {
        self.literal = Some(literal.into());
        self
    }

    /// The text this value has on the wire.
    pub fn wire_value(&self) -> &str {
        self.literal.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeKind {
    Scalar(ScalarKind),
    List { member: CollectionMember },
    Map { key: CollectionMember, value: CollectionMember },
    Struct(Vec<Member>),
    Union(Vec<Member>),
    Enum(Vec<EnumValue>),
}

/// Where a shape reference sits inside its owning shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Member(usize),
    ListMember,
    MapKey,
    MapValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub uri: String,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub name: String,
    pub kind: ShapeKind,
    pub xml_name: Option<String>,
    pub namespace: Option<Namespace>,
    pub error: bool,
    pub doc: Option<String>,
}

impl Shape {
    pub fn new(name: impl Into<String>, kind: ShapeKind) -> Shape {
        Shape {
            name: name.into(),
            kind,
            xml_name: None,
            namespace: None,
            error: false,
            doc: None,
        }
    }

    pub fn structure(name: impl Into<String>, members: Vec<Member>) -> Shape {
        Shape::new(name, ShapeKind::Struct(members))
    }

    pub fn union(name: impl Into<String>, members: Vec<Member>) -> Shape {
        Shape::new(name, ShapeKind::Union(members))
    }

    pub fn list(name: impl Into<String>, member: impl Into<CollectionMember>) -> Shape {
        Shape::new(name, ShapeKind::List { member: member.into() })
    }

    pub fn map(
        name: impl Into<String>,
        key: impl Into<CollectionMember>,
        value: impl Into<CollectionMember>,
    ) -> Shape {
        Shape::new(
            name,
            ShapeKind::Map {
                key: key.into(),
                value: value.into(),
            },
        )
    }

    pub fn enumeration(name: impl Into<String>, values: Vec<EnumValue>) -> Shape {
        Shape::new(name, ShapeKind::Enum(values))
    }

    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Shape {
        Shape::new(name, ShapeKind::Scalar(kind))
    }

    pub fn with_xml_name(mut self, name: impl Into<String>) -> Shape {
        self.xml_name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, uri: impl Into<String>, prefix: Option<&str>) -> Shape {
        self.namespace = Some(Namespace {
            uri: uri.into(),
            prefix: prefix.map(str::to_owned),
        });
        self
    }

    pub fn as_error(mut self) -> Shape {
        self.error = true;
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Shape {
        self.doc = Some(doc.into());
        self
    }

    /// Element name of the shape when it is a document root.
    pub fn wire_name(&self) -> &str {
        self.xml_name.as_deref().unwrap_or(&self.name)
    }

    pub fn namespace_prefix(&self) -> Option<&str> {
        self.namespace.as_ref().and_then(|ns| ns.prefix.as_deref())
    }

    pub fn members(&self) -> &[Member] {
        match &self.kind {
            ShapeKind::Struct(members) | ShapeKind::Union(members) => members,
            _ => &[],
        }
    }

    /// Every outgoing reference in declaration order: members first to last,
    /// list items, map keys before map values.
    pub fn refs(&self) -> Vec<(Slot, &ShapeRef)> {
        match &self.kind {
            ShapeKind::Scalar(_) | ShapeKind::Enum(_) => vec![],
            ShapeKind::List { member } => vec![(Slot::ListMember, &member.target)],
            ShapeKind::Map { key, value } => {
                vec![(Slot::MapKey, &key.target), (Slot::MapValue, &value.target)]
            }
            ShapeKind::Struct(members) | ShapeKind::Union(members) => members
                .iter()
                .enumerate()
                .map(|(i, m)| (Slot::Member(i), &m.target))
                .collect(),
        }
    }

    pub fn slot_mut(&mut self, slot: Slot) -> Option<&mut ShapeRef> {
        match (&mut self.kind, slot) {
            (ShapeKind::Struct(members) | ShapeKind::Union(members), Slot::Member(i)) => {
                members.get_mut(i).map(|m| &mut m.target)
            }
            (ShapeKind::List { member }, Slot::ListMember) => Some(&mut member.target),
            (ShapeKind::Map { key, .. }, Slot::MapKey) => Some(&mut key.target),
            (ShapeKind::Map { value, .. }, Slot::MapValue) => Some(&mut value.target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub input: Option<String>,
    pub output: Option<String>,
    pub errors: Vec<String>,
    pub doc: Option<String>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Operation {
        Operation {
            name: name.into(),
            input: None,
            output: None,
            errors: vec![],
            doc: None,
        }
    }

    pub fn input(mut self, shape: impl Into<String>) -> Operation {
        self.input = Some(shape.into());
        self
    }

    pub fn output(mut self, shape: impl Into<String>) -> Operation {
        self.output = Some(shape.into());
        self
    }

    pub fn error(mut self, shape: impl Into<String>) -> Operation {
        self.errors.push(shape.into());
        self
    }

    /// Shapes decoding starts from.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.input
            .iter()
            .chain(self.output.iter())
            .chain(self.errors.iter())
            .map(String::as_str)
    }
}

/// The shape graph: every named shape in declaration order, prelude scalars
/// first, and the operations that anchor decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub shapes: IndexMap<String, Shape>,
    pub operations: Vec<Operation>,
}

impl Default for Model {
    fn default() -> Model {
        Model::new()
    }
}

impl Model {
    pub fn new() -> Model {
        let shapes = ScalarKind::ALL
            .into_iter()
            .map(|kind| (kind.name().to_owned(), Shape::scalar(kind.name(), kind)))
            .collect();
        Model {
            shapes,
            operations: vec![],
        }
    }

    /// Adds `shape`, returning the shape it replaced, if any.
    pub fn insert(&mut self, shape: Shape) -> Option<Shape> {
        self.shapes.insert(shape.name.clone(), shape)
    }

    pub fn with_shape(mut self, shape: Shape) -> Model {
        self.insert(shape);
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Model {
        self.operations.push(operation);
        self
    }

    pub fn shape(&self, name: &str) -> Option<&Shape> {
        self.shapes.get(name)
    }

    pub fn is_prelude(&self, name: &str) -> bool {
        ScalarKind::from_name(name).is_some()
    }

    /// Moves the shapes and operations of `other` into this model. Prelude
    /// scalars are shared, any other name declared by both is an error.
    pub fn merge(&mut self, other: Model) -> Result<(), ParseError> {
        for (name, shape) in other.shapes {
            if self.is_prelude(&name) && self.shapes.get(&name) == Some(&shape) {
                continue;
            }
            if self.shapes.contains_key(&name) {
                return Err(ParseError::DuplicateShape(name));
            }
            self.shapes.insert(name, shape);
        }
        self.operations.extend(other.operations);
        Ok(())
    }
}
