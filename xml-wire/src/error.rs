use std::borrow::Cow;

/// Failure to decode a payload.
///
/// Only structurally malformed input ends up here. Unrecognized element and
/// attribute names are never errors: decoders skip them, and unions/enums fall
/// back to their `Unknown` variant.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("document is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("<{0}> is not terminated")]
    Unterminated(String),
    #[error("elements nest deeper than {0} levels")]
    TooDeep(usize),
    #[error("expected <{expected}>, got <{got}>")]
    UnexpectedElement { expected: Cow<'static, str>, got: String },
    #[error("<{0}> was not found")]
    MissingElement(Cow<'static, str>),
    #[error("invalid {kind}: {text:?}")]
    Primitive { kind: &'static str, text: String },
    #[error("map entry <{entry}> has no <{missing}>")]
    IncompleteEntry { entry: String, missing: &'static str },
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl DecodeError {
    pub fn primitive(kind: &'static str, text: &str) -> DecodeError {
        DecodeError::Primitive { kind, text: text.to_owned() }
    }
}

/// A builder could not produce its value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("{shape}: required member `{member}` was never set")]
    MissingMember { shape: &'static str, member: &'static str },
}
