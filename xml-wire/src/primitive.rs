use crate::DecodeError;
use base64::Engine;
use time::format_description::well_known::Rfc3339;

pub type DateTime = time::OffsetDateTime;

/// Binary data, carried base64 encoded on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Blob {
        Blob(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Scalar values read from element text or attribute values.
pub trait Primitive: Sized {
    fn parse_wire(text: &str) -> Result<Self, DecodeError>;
}

impl Primitive for String {
    fn parse_wire(text: &str) -> Result<Self, DecodeError> {
        Ok(text.to_owned())
    }
}

impl Primitive for bool {
    fn parse_wire(text: &str) -> Result<Self, DecodeError> {
        match text.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(DecodeError::primitive("boolean", text)),
        }
    }
}

macro_rules! integer_primitive {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl Primitive for $ty {
                fn parse_wire(text: &str) -> Result<Self, DecodeError> {
                    text.trim().parse().map_err(|_| DecodeError::primitive($kind, text))
                }
            }
        )*
    };
}

integer_primitive! {
    i8 => "byte",
    i16 => "short",
    i32 => "integer",
    i64 => "long",
}

macro_rules! float_primitive {
    ($($ty:ident => $kind:literal),* $(,)?) => {
        $(
            impl Primitive for $ty {
                fn parse_wire(text: &str) -> Result<Self, DecodeError> {
                    match text.trim() {
                        "NaN" => Ok($ty::NAN),
                        "Infinity" => Ok($ty::INFINITY),
                        "-Infinity" => Ok($ty::NEG_INFINITY),
                        other => other.parse().map_err(|_| DecodeError::primitive($kind, text)),
                    }
                }
            }
        )*
    };
}

float_primitive! {
    f32 => "float",
    f64 => "double",
}

impl Primitive for Blob {
    fn parse_wire(text: &str) -> Result<Self, DecodeError> {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map(Blob)
            .map_err(|_| DecodeError::primitive("blob", text))
    }
}

impl Primitive for DateTime {
    fn parse_wire(text: &str) -> Result<Self, DecodeError> {
        DateTime::parse(text.trim(), &Rfc3339).map_err(|_| DecodeError::primitive("timestamp", text))
    }
}
