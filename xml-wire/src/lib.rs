//! Runtime support for decoders generated by `xml-bindgen`.
//!
//! Generated code walks a [`Document`] through [`ScopedDecoder`]s, parses
//! scalars with [`Primitive`] and reports failures as [`DecodeError`].

mod decode;
mod envelope;
mod error;
mod primitive;

pub use decode::{Attr, Document, Name, ScopedDecoder, StartEl, MAX_DEPTH};
pub use envelope::{within_error, ErrorMetadata};
pub use error::{BuildError, DecodeError};
pub use primitive::{Blob, DateTime, Primitive};
