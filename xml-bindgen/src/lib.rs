//! Generates Rust types and XML decoders from a shape model.
//!
//! The pipeline runs in two phases. Analysis boxes the recursive references
//! of the model and resolves every type symbol and wire binding; emission
//! then turns the model into a single token stream. Nothing is emitted if
//! analysis fails.

use proc_macro2::TokenStream;
use quote::quote;

pub mod binding;
pub mod boxing;
mod decode;
mod error;
mod generate;
pub mod model;
mod parse;
pub mod symbol;
mod util;

pub use binding::{BindingTable, Envelope, ProtocolDefaults};
pub use error::{Error, GenError, ParseError};
pub use model::Model;
pub use parse::parse;
pub use symbol::SymbolTable;

use binding::WireBinding;
use model::{Member, Operation, Shape, ShapeKind, ShapeRef};
use symbol::{RustType, TypeSymbol};

/// First line of every generated file.
pub const HEADER: &str = "// Code generated by xml-bindgen. DO NOT EDIT.\n";

/// Everything emission reads, resolved up front.
pub(crate) struct Context<'g> {
    model: &'g Model,
    symbols: SymbolTable,
    bindings: BindingTable,
    defaults: &'g ProtocolDefaults,
}

impl<'g> Context<'g> {
    fn target(&self, owner: &Shape, target: &ShapeRef) -> Result<&'g Shape, GenError> {
        self.model
            .shape(&target.target)
            .ok_or_else(|| unknown(owner, target))
    }

    fn member_type(&self, owner: &Shape, target: &ShapeRef) -> Result<TypeSymbol, GenError> {
        self.symbols
            .for_ref(target)
            .ok_or_else(|| unknown(owner, target))
    }

    fn shape_type(&self, shape: &Shape) -> Result<RustType, GenError> {
        self.symbols
            .shape(&shape.name)
            .map(|symbol| symbol.ty.clone())
            .ok_or_else(|| GenError::UnknownShape {
                shape: shape.name.clone(),
                target: shape.name.clone(),
            })
    }

    fn binding(&self, owner: &Shape, member: &Member) -> Result<&WireBinding, GenError> {
        self.bindings
            .member(&owner.name, &member.name)
            .ok_or_else(|| unknown(owner, &member.target))
    }

    fn operation_shape(&self, operation: &Operation, name: &str) -> Result<&'g Shape, GenError> {
        match self.model.shape(name) {
            Some(shape) if matches!(shape.kind, ShapeKind::Struct(_)) => Ok(shape),
            _ => Err(GenError::InvalidOperationShape {
                operation: operation.name.clone(),
                target: name.to_owned(),
            }),
        }
    }

    /// Error structs of `operation`, first occurrence of each.
    fn operation_errors(&self, operation: &Operation) -> Result<Vec<&'g Shape>, GenError> {
        let mut out: Vec<&Shape> = vec![];
        for name in &operation.errors {
            let shape = self.operation_shape(operation, name)?;
            if !out.iter().any(|s| s.name == shape.name) {
                out.push(shape);
            }
        }
        Ok(out)
    }

    /// Flagged as an error in the model, or named as one by an operation.
    fn is_error(&self, shape: &Shape) -> bool {
        shape.error
            || self
                .model
                .operations
                .iter()
                .any(|op| op.errors.iter().any(|e| *e == shape.name))
    }
}

fn unknown(owner: &Shape, target: &ShapeRef) -> GenError {
    GenError::UnknownShape {
        shape: owner.name.clone(),
        target: target.target.clone(),
    }
}

/// Types and decoders for `model` under the protocol `defaults`.
pub fn generate(model: &Model, defaults: &ProtocolDefaults) -> Result<TokenStream, GenError> {
    let model = boxing::box_cycles(model.clone());
    let symbols = SymbolTable::resolve(&model)?;
    let bindings = BindingTable::resolve(&model, defaults)?;
    let ctx = Context {
        model: &model,
        symbols,
        bindings,
        defaults,
    };

    let types = generate::types(&ctx)?;
    let decoders = decode::decoders(&ctx)?;
    tracing::info!(
        shapes = model.shapes.len(),
        operations = model.operations.len(),
        "generated bindings"
    );
    Ok(quote! {
        #types
        #decoders
    })
}

/// Pretty-prints generated tokens as a source file.
pub fn render(tokens: TokenStream) -> Result<String, GenError> {
    let file = syn::parse2::<syn::File>(tokens)?;
    Ok(prettyplease::unparse(&file))
}

/// Reads a model document and returns the formatted bindings for it.
pub fn gen_bindings<R: std::io::Read>(mut r: R, defaults: &ProtocolDefaults) -> Result<String, Error> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    let model = parse(&buf)?;
    Ok(render(generate(&model, defaults)?)?)
}
