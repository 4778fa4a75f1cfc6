//! Decoders generated from `model/showcase.xml` for two protocol flavors.

/// The output structure is the document root and errors arrive as a bare
/// `<Error>` element.
pub mod rest {
    #![allow(clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/rest.rs"));
}

/// Outputs are enclosed in `<OpResponse><OpResult>` and errors in
/// `<ErrorResponse><Error>`.
pub mod query {
    #![allow(clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/query.rs"));
}
