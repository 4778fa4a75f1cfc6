/// The model cannot be turned into code. Nothing is emitted when this is
/// returned.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("{shape}: reference to unknown shape `{target}`")]
    UnknownShape { shape: String, target: String },
    #[error("{shape}: cycle through collections only, no named type can hold the indirection")]
    AnonymousCycle { shape: String },
    #[error("{shape}.{member}: flattened member must target a list or a map, `{target}` is neither")]
    InvalidFlattening { shape: String, member: String, target: String },
    #[error("{shape}.{member}: {reason}")]
    InvalidAttribute { shape: String, member: String, reason: &'static str },
    #[error("{shape}: members `{first}` and `{second}` both decode from {wire_name}")]
    AmbiguousBinding { shape: String, first: String, second: String, wire_name: String },
    #[error("{shape}: map key `{key}` must be a string or an enum")]
    InvalidMapKey { shape: String, key: String },
    #[error("{shape}: `{name}` would collide with the generated `Unknown` variant")]
    ReservedVariant { shape: String, name: String },
    #[error("{shape}: `{name}` and `{other}` produce the same identifier `{ident}`")]
    DuplicateIdent { shape: String, name: String, other: String, ident: String },
    #[error("operation {operation}: `{target}` is not a structure")]
    InvalidOperationShape { operation: String, target: String },
    #[error("generated code does not parse: {0}")]
    Render(#[from] syn::Error),
}

/// A model file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("model is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("expected {expected}, got <{got}>")]
    Unexpected { expected: &'static str, got: String },
    #[error("<{element}> is missing attribute `{attr}`")]
    MissingAttr { element: &'static str, attr: &'static str },
    #[error("<{element}>: invalid value {value:?} for `{attr}`")]
    InvalidAttr { element: &'static str, attr: &'static str, value: String },
    #[error("shape `{0}` is declared twice")]
    DuplicateShape(String),
    #[error("unexpected end of model")]
    Eof,
}

/// Any failure of [`crate::gen_bindings`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reading model: {0}")]
    Io(#[from] std::io::Error),
    #[error("loading model: {0}")]
    Parse(#[from] ParseError),
    #[error("generating bindings: {0}")]
    Gen(#[from] GenError),
}
